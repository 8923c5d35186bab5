//! upload_text_file tool: multipart upload of a text file to the configured
//! upload service.

use async_trait::async_trait;
use serde::Deserialize;
use tracing::{info, warn};

use crate::{Tool, ToolContext, ToolOutput, http_client};

pub struct UploadTextFileTool;

#[derive(Deserialize)]
struct Payload {
    content: String,
    file_name: String,
}

#[derive(Deserialize)]
struct UploadReply {
    uploaded_file: String,
}

/// Flatten URL-ish names into a single path segment.
fn sanitize_file_name(name: &str) -> String {
    name.replace("://", "_").replace('/', "_")
}

#[async_trait]
impl Tool for UploadTextFileTool {
    fn name(&self) -> &str {
        "upload_text_file"
    }

    fn description(&self) -> &str {
        "Create and upload a text file."
    }

    fn instructions(&self) -> &str {
        r#"Required payload: {"content": "Text content of the file", "file_name": "Name of the file (e.g., document.md)"} Response format: URL of the uploaded file."#
    }

    async fn execute(
        &self,
        payload: serde_json::Value,
        context: &ToolContext,
    ) -> anyhow::Result<ToolOutput> {
        let p: Payload = serde_json::from_value(payload)?;

        let Some(domain) = context.config.tools_config().resolve_upload_domain() else {
            return Ok(ToolOutput::error(
                "ERROR: UPLOAD_DOMAIN environment variable is missing.",
            ));
        };
        let url = format!("{}/upload", domain.trim_end_matches('/'));
        let file_name = sanitize_file_name(&p.file_name);

        let file_part = reqwest::multipart::Part::text(p.content)
            .file_name(file_name.clone())
            .mime_str("text/plain")?;
        let form = reqwest::multipart::Form::new()
            .part("file", file_part)
            .text("file_name", file_name.clone());

        let client = http_client(context)?;
        let resp = match client.post(&url).multipart(form).send().await {
            Ok(r) => r,
            Err(e) => {
                warn!(url = %url, error = %e, "Upload failed");
                return Ok(ToolOutput::error("Upload failed"));
            }
        };

        let status = resp.status();
        if !status.is_success() {
            return Ok(ToolOutput::error(format!("Upload failed: HTTP {status}")));
        }

        let reply: UploadReply = resp.json().await?;
        info!(file_name = %file_name, url = %reply.uploaded_file, "Uploaded text file");
        Ok(ToolOutput::text(format!(
            "Uploaded file to the URL: {}",
            reply.uploaded_file
        )))
    }
}
