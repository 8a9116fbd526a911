//! `stats.json` (spec §6 "Persisted state"): a small snapshot file rewritten
//! after every request so an operator (or a simple health dashboard) can
//! read current activity without scraping the request log.

use std::path::PathBuf;
use std::sync::Mutex;
use std::time::{SystemTime, UNIX_EPOCH};

use serde::Serialize;

#[derive(Debug, Serialize, Clone)]
struct StatsSnapshot {
    #[serde(rename = "startTime")]
    start_time: i64,
    #[serde(rename = "requestCount")]
    request_count: u64,
    #[serde(rename = "lastRequestTime")]
    last_request_time: Option<i64>,
    port: u16,
}

/// Tracks request counts in memory and rewrites `stats.json` under a brief
/// lock on every increment (spec §6: "the file always reflects the most
/// recent request; readers never see a torn write" — achieved here by
/// writing to a temp file and renaming over the target, which is atomic on
/// the same filesystem).
pub struct Stats {
    path: PathBuf,
    inner: Mutex<StatsSnapshot>,
}

impl Stats {
    pub fn new(path: PathBuf, port: u16) -> Self {
        let start_time = SystemTime::now().duration_since(UNIX_EPOCH).map(|d| d.as_secs() as i64).unwrap_or(0);

        Self {
            path,
            inner: Mutex::new(StatsSnapshot {
                start_time,
                request_count: 0,
                last_request_time: None,
                port,
            }),
        }
    }

    /// Record one completed request and persist the new snapshot. Failures
    /// to write are logged, never propagated — stats are advisory, not
    /// load-bearing (spec §6).
    pub fn record_request(&self) {
        let snapshot = {
            let mut guard = self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
            guard.request_count += 1;
            guard.last_request_time = SystemTime::now().duration_since(UNIX_EPOCH).map(|d| d.as_secs() as i64).ok();
            guard.clone()
        };

        if let Err(e) = self.persist(&snapshot) {
            log::warn!("failed to persist stats.json: {e}");
        }
    }

    fn persist(&self, snapshot: &StatsSnapshot) -> std::io::Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let tmp_path = self.path.with_extension("json.tmp");
        let body = serde_json::to_vec_pretty(snapshot)?;
        std::fs::write(&tmp_path, body)?;
        std::fs::rename(&tmp_path, &self.path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recording_a_request_increments_count_and_persists() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("stats.json");
        let stats = Stats::new(path.clone(), 8080);

        stats.record_request();
        stats.record_request();

        let content = std::fs::read_to_string(&path).unwrap();
        let parsed: serde_json::Value = serde_json::from_str(&content).unwrap();
        assert_eq!(parsed["requestCount"], 2);
        assert_eq!(parsed["port"], 8080);
    }
}
