//! Append-only operation log.
//!
//! One JSON object per line under `logs/operations.log`. Logging is
//! best-effort: a failed append warns and never fails the operation.

use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use chrono::Utc;

/// Append-only JSON-lines operation log
pub struct OperationLog {
    path: PathBuf,
    file: Mutex<Option<std::fs::File>>,
}

impl OperationLog {
    /// Open (creating directories as needed) the log at `path`
    pub fn open(path: &Path) -> std::io::Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let file = std::fs::OpenOptions::new().create(true).append(true).open(path)?;
        Ok(Self {
            path: path.to_path_buf(),
            file: Mutex::new(Some(file)),
        })
    }

    /// Log file path
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append one operation entry
    pub fn record(&self, operation: &str, details: serde_json::Value) {
        let entry = serde_json::json!({
            "ts": Utc::now().to_rfc3339(),
            "op": operation,
            "details": details,
        });

        let mut guard = self.file.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(file) = guard.as_mut() {
            if let Err(e) = writeln!(file, "{}", entry) {
                tracing::warn!("Operation log append failed: {}", e);
            }
        }
    }
}
