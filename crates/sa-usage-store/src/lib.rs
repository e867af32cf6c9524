//! Persistent, append-only, thread-safe record of every model-call attempt.
//!
//! Grounded on `sa-sessions`'s JSON-file + lock pattern (itself grounded on
//! `crates/sessions/src/store.rs`), generalized from a keyed map to an
//! append-only row vector since usage rows have no natural key.

use chrono::{DateTime, Utc};
use parking_lot::{Mutex, RwLock};
use sa_domain::Result;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UsageRecord {
    pub timestamp_utc: DateTime<Utc>,
    pub model_id: String,
    pub provider: String,
    pub role: String,
    #[serde(default)]
    pub intent: String,
    pub input_tokens: u64,
    pub output_tokens: u64,
    pub elapsed_seconds: f64,
    pub success: bool,
    pub is_cloud: bool,
}

#[derive(Debug, Clone, Default)]
pub struct TokenAggregate {
    pub input_tokens: u64,
    pub output_tokens: u64,
}

pub struct UsageStore {
    path: PathBuf,
    rows: RwLock<Vec<UsageRecord>>,
    write_lock: Mutex<()>,
}

impl UsageStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let rows = std::fs::read_to_string(&path)
            .ok()
            .and_then(|s| serde_json::from_str(&s).ok())
            .unwrap_or_default();
        Self {
            path,
            rows: RwLock::new(rows),
            write_lock: Mutex::new(()),
        }
    }

    pub fn record(&self, record: UsageRecord) -> Result<()> {
        let _guard = self.write_lock.lock();
        {
            let mut rows = self.rows.write();
            rows.push(record);
        }
        self.flush_locked()
    }

    fn flush_locked(&self) -> Result<()> {
        let rows = self.rows.read();
        let text = serde_json::to_string_pretty(&*rows)?;
        if let Some(dir) = self.path.parent() {
            std::fs::create_dir_all(dir)?;
        }
        std::fs::write(&self.path, text)?;
        Ok(())
    }

    pub fn query(
        &self,
        start: Option<DateTime<Utc>>,
        end: Option<DateTime<Utc>>,
        model_id: Option<&str>,
        provider: Option<&str>,
        role: Option<&str>,
    ) -> Vec<UsageRecord> {
        self.rows
            .read()
            .iter()
            .filter(|r| start.map_or(true, |s| r.timestamp_utc >= s))
            .filter(|r| end.map_or(true, |e| r.timestamp_utc <= e))
            .filter(|r| model_id.map_or(true, |m| r.model_id == m))
            .filter(|r| provider.map_or(true, |p| r.provider == p))
            .filter(|r| role.map_or(true, |ro| r.role == ro))
            .cloned()
            .collect()
    }

    /// Token totals grouped by `model_id`.
    pub fn aggregate_tokens(&self) -> std::collections::HashMap<String, TokenAggregate> {
        let mut out: std::collections::HashMap<String, TokenAggregate> =
            std::collections::HashMap::new();
        for row in self.rows.read().iter() {
            let entry = out.entry(row.model_id.clone()).or_default();
            entry.input_tokens += row.input_tokens;
            entry.output_tokens += row.output_tokens;
        }
        out
    }

    pub fn total_tokens(&self) -> TokenAggregate {
        let mut total = TokenAggregate::default();
        for row in self.rows.read().iter() {
            total.input_tokens += row.input_tokens;
            total.output_tokens += row.output_tokens;
        }
        total
    }

    pub fn total_spend_query(
        &self,
        start: Option<DateTime<Utc>>,
        end: Option<DateTime<Utc>>,
    ) -> Vec<UsageRecord> {
        self.query(start, end, None, None, None)
    }

    pub fn purge_before(&self, cutoff: DateTime<Utc>) -> Result<usize> {
        let _guard = self.write_lock.lock();
        let removed;
        {
            let mut rows = self.rows.write();
            let before = rows.len();
            rows.retain(|r| r.timestamp_utc >= cutoff);
            removed = before - rows.len();
        }
        self.flush_locked()?;
        Ok(removed)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    fn rec(model: &str, success: bool) -> UsageRecord {
        UsageRecord {
            timestamp_utc: Utc::now(),
            model_id: model.into(),
            provider: "ollama".into(),
            role: "coding".into(),
            intent: String::new(),
            input_tokens: 10,
            output_tokens: 5,
            elapsed_seconds: 0.5,
            success,
            is_cloud: false,
        }
    }

    #[test]
    fn record_and_query_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let store = UsageStore::new(dir.path().join("usage.json"));
        store.record(rec("m1", true)).unwrap();
        let rows = store.query(None, None, None, None, None);
        assert_eq!(rows.len(), 1);
        assert!(rows[0].success);
    }

    #[test]
    fn aggregate_tokens_groups_by_model() {
        let dir = tempfile::tempdir().unwrap();
        let store = UsageStore::new(dir.path().join("usage.json"));
        store.record(rec("m1", true)).unwrap();
        store.record(rec("m1", false)).unwrap();
        store.record(rec("m2", true)).unwrap();
        let agg = store.aggregate_tokens();
        assert_eq!(agg["m1"].input_tokens, 20);
        assert_eq!(agg["m2"].input_tokens, 10);
    }

    #[test]
    fn purge_before_removes_old_rows() {
        let dir = tempfile::tempdir().unwrap();
        let store = UsageStore::new(dir.path().join("usage.json"));
        store.record(rec("m1", true)).unwrap();
        let cutoff = Utc::now() + chrono::Duration::seconds(1);
        let removed = store.purge_before(cutoff).unwrap();
        assert_eq!(removed, 1);
        assert!(store.query(None, None, None, None, None).is_empty());
    }

    #[test]
    fn concurrent_writers_all_persist() {
        let dir = tempfile::tempdir().unwrap();
        let store = std::sync::Arc::new(UsageStore::new(dir.path().join("usage.json")));
        let mut handles = Vec::new();
        for i in 0..10 {
            let store = store.clone();
            handles.push(thread::spawn(move || {
                store.record(rec(&format!("m{i}"), true)).unwrap();
            }));
        }
        for h in handles {
            h.join().unwrap();
        }
        assert_eq!(store.query(None, None, None, None, None).len(), 10);
    }
}
