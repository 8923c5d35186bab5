use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use tracing::{info, warn};

use planloop_core::config::Config;
use planloop_core::error::PlanloopError;
use planloop_gateway::GatewayState;

mod logging;

#[derive(Parser)]
#[command(
    name = "planloop",
    about = "Single-agent plan/decide/act loop over the Anthropic Messages API",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Config file path
    #[arg(short, long, global = true)]
    config: Option<String>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the HTTP server
    Serve {
        /// Port to listen on (default: 3000)
        #[arg(long)]
        port: Option<u16>,
    },

    /// Run the agent once and print the answer
    Ask {
        /// The question or task
        query: String,

        /// Override the step budget
        #[arg(long)]
        max_steps: Option<u32>,

        /// Print the full run outcome, transcript included, as JSON
        #[arg(long)]
        json: bool,
    },

    /// Configuration management
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },

    /// Show configuration status
    Status,
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Show current configuration (secrets redacted)
    Show,
    /// Get a specific config value
    Get { key: String },
}

/// Refuse to start on configuration errors; log warnings.
fn check_config(config: &Config) -> Result<(), PlanloopError> {
    let (warnings, errors) = config.validate();
    for w in &warnings {
        warn!("{w}");
    }
    if !errors.is_empty() {
        return Err(PlanloopError::Config(errors.join("; ")));
    }
    Ok(())
}

/// Config as JSON with any inline API key masked.
fn redacted(config: &Config) -> anyhow::Result<serde_json::Value> {
    let mut config = config.clone();
    if let Some(provider) = config.provider.as_mut() {
        if provider.api_key.is_some() {
            provider.api_key = Some("[REDACTED]".into());
        }
    }
    Ok(serde_json::to_value(&config)?)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let config_path = cli
        .config
        .map(PathBuf::from)
        .unwrap_or_else(Config::config_path);
    let config = Config::load(&config_path)?;

    logging::init_tracing(&config.logging.clone().unwrap_or_default(), cli.verbose);

    match cli.command {
        Commands::Serve { port } => {
            check_config(&config)?;
            let port = port.unwrap_or_else(|| config.gateway_port());
            info!(port, model = %config.model(), "Starting planloop gateway");

            let state = Arc::new(GatewayState::from_config(Arc::new(config))?);
            planloop_gateway::start_gateway(state, port).await?;
        }
        Commands::Ask {
            query,
            max_steps,
            json,
        } => {
            check_config(&config)?;
            let state = GatewayState::from_config(Arc::new(config))?;
            let mut runtime = state.runtime();
            if let Some(n) = max_steps {
                runtime = runtime.with_max_steps(n);
            }

            let outcome = runtime.run(&query).await?;
            if json {
                println!("{}", serde_json::to_string_pretty(&outcome)?);
            } else {
                println!("{}", outcome.answer);
                if outcome.truncated {
                    eprintln!(
                        "(step budget of {} exhausted; answer built from partial progress)",
                        runtime.max_steps()
                    );
                }
            }
        }
        Commands::Config { action } => match action {
            ConfigAction::Show => {
                println!("{}", serde_json::to_string_pretty(&redacted(&config)?)?);
            }
            ConfigAction::Get { key } => match config.get_path(&key) {
                Some(value) if key.ends_with("api_key") && !value.is_null() => {
                    println!("\"[REDACTED]\"");
                }
                Some(value) => println!("{}", serde_json::to_string_pretty(&value)?),
                None => anyhow::bail!("No config value at '{key}'"),
            },
        },
        Commands::Status => {
            let (warnings, errors) = config.validate();
            println!("planloop v{}", env!("CARGO_PKG_VERSION"));
            println!("Config: {}", config_path.display());
            println!("Model: {}", config.model());
            println!("Max steps: {}", config.max_steps());
            println!(
                "API key: {}",
                if config.api_key().is_some() { "configured" } else { "missing" }
            );
            println!("Gateway: {}:{}", config.gateway_bind(), config.gateway_port());
            match config.audit_path() {
                Some(path) => println!("Audit log: {}", path.display()),
                None => println!("Audit log: disabled"),
            }
            for w in warnings {
                println!("warning: {w}");
            }
            for e in errors {
                println!("error: {e}");
            }
        }
    }

    Ok(())
}
