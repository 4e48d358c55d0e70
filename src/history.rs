//! Answer history — append-only JSON-lines file with an in-memory mirror.
//!
//! Best effort by design: a failed append is logged and surfaced as a
//! warning, never a fatal error. The file is only ever appended to or
//! truncated whole; the app is single-instance so there is one writer.

use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One stored answer. A capture that yields several questions appends
/// several records, all sharing the capture's sequence id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnswerRecord {
    pub seq: u64,
    pub timestamp: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub number: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub question: Option<String>,
    pub answer: String,
    pub provider: String,
}

impl AnswerRecord {
    /// Short label for the history view: "13A", or just "A" without a number.
    pub fn label(&self) -> String {
        match &self.number {
            Some(n) => format!("{n}{}", self.answer),
            None => self.answer.clone(),
        }
    }
}

pub struct HistoryStore {
    path: PathBuf,
    records: Mutex<Vec<AnswerRecord>>,
}

impl HistoryStore {
    /// Open the store, loading whatever the file already holds.
    /// Malformed lines are skipped with a warning; a missing file is empty.
    pub fn open(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let records = load_records(&path);
        if !records.is_empty() {
            log::info!("Loaded {} answers from {:?}", records.len(), path);
        }
        Self {
            path,
            records: Mutex::new(records),
        }
    }

    /// Append one record to the file and the in-memory list.
    pub fn append(&self, record: &AnswerRecord) -> Result<()> {
        let mut records = self.records.lock().unwrap();
        if let Some(dir) = self.path.parent() {
            std::fs::create_dir_all(dir)
                .with_context(|| format!("failed to create {:?}", dir))?;
        }
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .with_context(|| format!("failed to open {:?}", self.path))?;
        let line = serde_json::to_string(record)?;
        writeln!(file, "{line}").with_context(|| format!("failed to write {:?}", self.path))?;
        records.push(record.clone());
        Ok(())
    }

    /// Truncate both the file and the in-memory list. Returns how many
    /// records were dropped. Irreversible.
    pub fn clear(&self) -> Result<usize> {
        let mut records = self.records.lock().unwrap();
        if self.path.exists() {
            std::fs::write(&self.path, b"")
                .with_context(|| format!("failed to truncate {:?}", self.path))?;
        }
        let count = records.len();
        records.clear();
        Ok(count)
    }

    /// All records in chronological (append) order.
    pub fn records(&self) -> Vec<AnswerRecord> {
        self.records.lock().unwrap().clone()
    }

    pub fn len(&self) -> usize {
        self.records.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Labels chunked `per_line` to a line, for the history popup.
    pub fn format_lines(&self, per_line: usize) -> String {
        let records = self.records.lock().unwrap();
        let labels: Vec<String> = records.iter().map(AnswerRecord::label).collect();
        labels
            .chunks(per_line.max(1))
            .map(|chunk| chunk.join(" "))
            .collect::<Vec<_>>()
            .join("\n")
    }
}

fn load_records(path: &Path) -> Vec<AnswerRecord> {
    let contents = match std::fs::read_to_string(path) {
        Ok(c) => c,
        Err(_) => return Vec::new(),
    };
    let mut records = Vec::new();
    for (lineno, line) in contents.lines().enumerate() {
        if line.trim().is_empty() {
            continue;
        }
        match serde_json::from_str::<AnswerRecord>(line) {
            Ok(record) => records.push(record),
            Err(e) => log::warn!(
                "Skipping malformed history line {} in {:?}: {e}",
                lineno + 1,
                path
            ),
        }
    }
    records
}
