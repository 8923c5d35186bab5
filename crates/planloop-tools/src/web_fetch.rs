//! get_html_contents tool: HTTP GET, page rendered as markdown,
//! inline script bodies appended verbatim.

use std::sync::LazyLock;

use async_trait::async_trait;
use html2md::rewrite_html;
use regex::Regex;
use serde::Deserialize;
use tracing::{debug, warn};

use crate::{Tool, ToolContext, ToolOutput, http_client};

pub struct GetHtmlContentsTool;

#[derive(Deserialize)]
struct Payload {
    url: String,
}

static SCRIPT_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)<script\b[^>]*>([\s\S]*?)</script>").unwrap());
static STYLE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)<style\b[^>]*>[\s\S]*?</style>").unwrap());

/// Page text as markdown. Script and style bodies are dropped here; scripts
/// are reported separately by [`extract_scripts`].
fn html_to_markdown(html: &str) -> String {
    let html = SCRIPT_RE.replace_all(html, "");
    let html = STYLE_RE.replace_all(&html, "");
    rewrite_html(&html, false).trim().to_string()
}

/// Script bodies in document order, numbered from 1.
fn extract_scripts(html: &str) -> String {
    SCRIPT_RE
        .captures_iter(html)
        .enumerate()
        .map(|(i, caps)| format!("\n\n--- Script {} ---\n{}", i + 1, &caps[1]))
        .collect()
}

fn render_page(html: &str) -> String {
    format!(
        "{}\n\n--- Script Contents ---{}",
        html_to_markdown(html),
        extract_scripts(html)
    )
}

fn is_blocked(url: &str, blocked: &[String]) -> bool {
    let url = url.trim_end_matches('/');
    blocked.iter().any(|b| b.trim_end_matches('/') == url)
}

#[async_trait]
impl Tool for GetHtmlContentsTool {
    fn name(&self) -> &str {
        "get_html_contents"
    }

    fn description(&self) -> &str {
        "Fetch HTML content of a URL."
    }

    fn instructions(&self) -> &str {
        r#"Required payload: {"url": "URL that needs to be downloaded"} Response format: HTML content of the page."#
    }

    async fn execute(
        &self,
        payload: serde_json::Value,
        context: &ToolContext,
    ) -> anyhow::Result<ToolOutput> {
        let p: Payload = serde_json::from_value(payload)?;

        if is_blocked(&p.url, &context.config.tools_config().blocked_urls) {
            return Ok(ToolOutput::error(
                "You can't browse the main website. Try another URL.",
            ));
        }

        debug!(url = %p.url, "get_html_contents");

        let client = http_client(context)?;
        let resp = match client.get(&p.url).send().await {
            Ok(r) => r,
            Err(e) => {
                warn!(url = %p.url, error = %e, "Fetch failed");
                return Ok(ToolOutput::error(
                    "Failed to fetch the URL, please try again.",
                ));
            }
        };

        let status = resp.status();
        if !status.is_success() {
            return Ok(ToolOutput::error(format!("HTTP {status} for {}", p.url)));
        }

        let body = resp.text().await?;
        Ok(ToolOutput::text(render_page(&body)))
    }
}
