use anyhow::{Context, Result};
use serde_json::Value;
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::history::{HistoryKind, HistoryStatus};

/// Get the platform-appropriate cache directory for history details
pub fn get_cache_path() -> PathBuf {
    dirs::cache_dir()
        .map(|p| p.join("pmo-agent/history"))
        .unwrap_or_else(|| {
            PathBuf::from(format!(
                "{}/.cache/pmo-agent/history",
                std::env::var("HOME").unwrap_or_default()
            ))
        })
}

/// Clear the detail cache directory
pub fn clear_cache(cache_path: &Path) -> Result<()> {
    match std::fs::remove_dir_all(cache_path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e).context("Failed to remove cache directory"),
    }
}

/// Disk cache of history detail payloads.
///
/// Completed records never change on the service, so their raw JSON is kept
/// by kind and id. Reads and writes are best effort: a broken cache only
/// costs a refetch.
#[derive(Debug, Clone)]
pub struct DetailCache {
    cache_path: PathBuf,
    enabled: bool,
}

impl DetailCache {
    pub fn new(cache_path: PathBuf, enabled: bool) -> Self {
        Self {
            cache_path,
            enabled,
        }
    }

    /// A cache that never hits and never stores (`--no-cache`).
    pub fn disabled() -> Self {
        Self::new(PathBuf::new(), false)
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    fn key(kind: HistoryKind, id: u64) -> String {
        format!("{}:{}", kind.path(), id)
    }

    pub fn get(&self, kind: HistoryKind, id: u64) -> Option<Value> {
        if !self.enabled {
            return None;
        }
        let bytes = cacache::read_sync(&self.cache_path, Self::key(kind, id)).ok()?;
        let value = serde_json::from_slice(&bytes).ok()?;
        debug!(kind = %kind, id, "detail cache hit");
        Some(value)
    }

    /// Store a detail payload if its `status` says it is final.
    pub fn put(&self, kind: HistoryKind, id: u64, detail: &Value) {
        if !self.enabled || !is_completed(detail) {
            return;
        }
        if let Ok(serialized) = serde_json::to_vec(detail) {
            if let Err(e) = cacache::write_sync(&self.cache_path, Self::key(kind, id), serialized) {
                debug!(kind = %kind, id, error = %e, "failed to write detail cache");
            }
        }
    }
}

fn is_completed(detail: &Value) -> bool {
    detail
        .get("status")
        .and_then(Value::as_str)
        .and_then(HistoryStatus::parse)
        .is_some_and(|status| status.is_final())
}
