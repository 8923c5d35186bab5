//! Tracing subscriber setup.

use tracing_subscriber::EnvFilter;

use planloop_core::config::LoggingConfig;

/// Filter directives, by precedence: `RUST_LOG`, then `--verbose`, then the
/// configured level plus per-crate filters.
fn filter_directives(logging: &LoggingConfig, verbose: bool, rust_log: Option<String>) -> String {
    if let Some(env) = rust_log.filter(|v| !v.trim().is_empty()) {
        return env;
    }
    let level = if verbose {
        "debug".to_string()
    } else {
        logging.level.clone().unwrap_or_else(|| "info".to_string())
    };
    std::iter::once(level)
        .chain(logging.filters.iter().cloned())
        .collect::<Vec<_>>()
        .join(",")
}

pub fn init_tracing(logging: &LoggingConfig, verbose: bool) {
    let directives = filter_directives(logging, verbose, std::env::var("RUST_LOG").ok());
    let filter = EnvFilter::try_new(&directives).unwrap_or_else(|_| EnvFilter::new("info"));

    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    let to_stdout = logging.output == "stdout";
    match (logging.format.as_str(), to_stdout) {
        ("json", true) => builder.json().with_writer(std::io::stdout).init(),
        ("json", false) => builder.json().with_writer(std::io::stderr).init(),
        (_, true) => builder.with_writer(std::io::stdout).init(),
        (_, false) => builder.with_writer(std::io::stderr).init(),
    }
}
