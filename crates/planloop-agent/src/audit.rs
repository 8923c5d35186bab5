//! Audit trail: one record per stage, appended in stage order.

use std::path::PathBuf;
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::io::AsyncWriteExt;
use uuid::Uuid;

use planloop_core::error::Result;
use planloop_core::types::Stage;

/// Heading depth of a record in the markdown log.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditLevel {
    /// `##` heading: plan, reflect.
    Basic,
    /// `###` heading: decide, describe.
    Action,
    /// `####` heading with a fenced body: execute, final.
    Result,
}

impl AuditLevel {
    pub fn for_stage(stage: Stage) -> Self {
        match stage {
            Stage::Decide | Stage::Describe => AuditLevel::Action,
            Stage::Execute | Stage::Final => AuditLevel::Result,
            _ => AuditLevel::Basic,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AuditRecord {
    /// Separates interleaved runs sharing one log.
    pub run_id: Uuid,
    pub stage: Stage,
    pub step: u32,
    pub header: String,
    /// Prompt rendered for the stage; empty for execute.
    pub prompt: String,
    pub content: String,
    pub timestamp: DateTime<Utc>,
}

impl AuditRecord {
    pub fn level(&self) -> AuditLevel {
        AuditLevel::for_stage(self.stage)
    }

    /// Heading, a `run <id> step <n>` tag, the content, then the prompt
    /// quoted inside a collapsed block when there is one.
    pub fn to_markdown(&self) -> String {
        let tag = format!("`run {} step {}`", self.run_id, self.step);
        let mut out = match self.level() {
            AuditLevel::Basic => format!("## {}\n{tag}\n\n{}\n\n", self.header, self.content),
            AuditLevel::Action => format!("### {}\n{tag}\n\n{}\n\n", self.header, self.content),
            AuditLevel::Result => {
                format!("#### {}\n{tag}\n```\n{}\n```\n\n", self.header, self.content)
            }
        };

        if !self.prompt.is_empty() {
            out.push_str("<details>\n<summary>Prompt</summary>\n\n");
            for line in self.prompt.lines() {
                out.push_str("> ");
                out.push_str(line);
                out.push('\n');
            }
            out.push_str("\n</details>\n\n");
        }
        out
    }
}

#[async_trait]
pub trait AuditSink: Send + Sync {
    async fn record(&self, record: &AuditRecord) -> Result<()>;
}

/// Appends markdown records to a file.
pub struct MarkdownAuditLog {
    path: PathBuf,
    write_lock: tokio::sync::Mutex<()>,
}

impl MarkdownAuditLog {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: tokio::sync::Mutex::new(()),
        }
    }

    pub fn path(&self) -> &PathBuf {
        &self.path
    }
}

#[async_trait]
impl AuditSink for MarkdownAuditLog {
    async fn record(&self, record: &AuditRecord) -> Result<()> {
        let _guard = self.write_lock.lock().await;

        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }

        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await?;
        file.write_all(record.to_markdown().as_bytes()).await?;
        file.flush().await?;
        Ok(())
    }
}

/// Keeps records in memory.
#[derive(Default)]
pub struct MemoryAuditLog {
    records: Mutex<Vec<AuditRecord>>,
}

impl MemoryAuditLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn records(&self) -> Vec<AuditRecord> {
        self.records.lock().map(|r| r.clone()).unwrap_or_default()
    }

    pub fn stages(&self) -> Vec<Stage> {
        self.records().iter().map(|r| r.stage).collect()
    }
}

#[async_trait]
impl AuditSink for MemoryAuditLog {
    async fn record(&self, record: &AuditRecord) -> Result<()> {
        if let Ok(mut records) = self.records.lock() {
            records.push(record.clone());
        }
        Ok(())
    }
}

/// Discards records. Used when auditing is disabled.
pub struct NoAudit;

#[async_trait]
impl AuditSink for NoAudit {
    async fn record(&self, _record: &AuditRecord) -> Result<()> {
        Ok(())
    }
}
