//! Escalation sinks.
//!
//! The guard produces an [`EscalationRecord`]; a sink takes ownership of it
//! and hands it to whoever collects contact details. Sink failures are the
//! caller's to log, never to surface.

use crate::rag::types::EscalationRecord;
use async_trait::async_trait;
use relnotes_core::{AppError, AppResult};
use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

/// Receives escalation records.
#[async_trait]
pub trait EscalationSink: Send + Sync {
    /// Record one escalation.
    async fn record(&self, record: &EscalationRecord) -> AppResult<()>;
}

/// Append-only JSONL escalation ledger.
pub struct JsonlLedger {
    path: PathBuf,
}

impl JsonlLedger {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Ledger at the workspace's default location.
    pub fn for_workspace(workspace: &Path) -> Self {
        Self::new(crate::config::get_escalations_path(workspace))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Every record in the ledger, oldest first.
    pub fn list(&self) -> AppResult<Vec<EscalationRecord>> {
        read_jsonl(&self.path)
    }
}

#[async_trait]
impl EscalationSink for JsonlLedger {
    async fn record(&self, record: &EscalationRecord) -> AppResult<()> {
        let path = self.path.clone();
        let line = serde_json::to_string(record)
            .map_err(|e| AppError::Ledger(format!("Failed to serialize escalation: {}", e)))?;

        tokio::task::spawn_blocking(move || append_line(&path, &line))
            .await
            .map_err(|e| AppError::Ledger(format!("Ledger write task failed: {}", e)))??;

        tracing::debug!(
            escalation_id = %record.id,
            reason = %record.reason,
            "Recorded escalation"
        );
        Ok(())
    }
}

/// In-memory sink.
#[derive(Default)]
pub struct MemorySink {
    records: Mutex<Vec<EscalationRecord>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn records(&self) -> Vec<EscalationRecord> {
        match self.records.lock() {
            Ok(records) => records.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }
}

#[async_trait]
impl EscalationSink for MemorySink {
    async fn record(&self, record: &EscalationRecord) -> AppResult<()> {
        self.records
            .lock()
            .map_err(|_| AppError::Ledger("Escalation sink lock poisoned".to_string()))?
            .push(record.clone());
        Ok(())
    }
}

/// Append one line to a JSONL file, creating it and its directory on demand.
pub(crate) fn append_line(path: &Path, line: &str) -> AppResult<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let mut file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .map_err(|e| AppError::Ledger(format!("Failed to open {}: {}", path.display(), e)))?;

    writeln!(file, "{}", line)
        .map_err(|e| AppError::Ledger(format!("Failed to write to {}: {}", path.display(), e)))?;

    file.sync_all()
        .map_err(|e| AppError::Ledger(format!("Failed to sync {}: {}", path.display(), e)))?;

    Ok(())
}

/// Read every entry of a JSONL file. A missing file is an empty ledger.
pub(crate) fn read_jsonl<T: serde::de::DeserializeOwned>(path: &Path) -> AppResult<Vec<T>> {
    if !path.exists() {
        return Ok(Vec::new());
    }

    let file = File::open(path)
        .map_err(|e| AppError::Ledger(format!("Failed to open {}: {}", path.display(), e)))?;

    let mut entries = Vec::new();
    for (line_num, line) in BufReader::new(file).lines().enumerate() {
        let line = line.map_err(|e| {
            AppError::Ledger(format!("Failed to read line {}: {}", line_num + 1, e))
        })?;

        if line.trim().is_empty() {
            continue;
        }

        let entry = serde_json::from_str(&line).map_err(|e| {
            AppError::Ledger(format!(
                "Failed to parse line {} in {}: {}",
                line_num + 1,
                path.display(),
                e
            ))
        })?;
        entries.push(entry);
    }

    Ok(entries)
}
