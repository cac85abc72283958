use std::collections::HashMap;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;

/// Persisted remediation state for one `(resource, policy)` pair, keyed by
/// `"{resource_key}:{policy_id}"` in the store's map.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RemediationRecord {
    pub policy_id: String,
    pub first_violation: DateTime<Utc>,
    #[serde(default)]
    pub warnings_sent: Vec<String>,
}

/// Durable single-file JSON store for [`RemediationRecord`]s.
///
/// Every transition goes through one of the `*_and_save` methods, each of
/// which takes the map's `tokio::sync::Mutex` for the entire
/// read-modify-write-*and file write*, releasing it only once the new state
/// is durable on disk (spec §4.3/§5: "the store must be mutated under a
/// process-wide mutex covering read+modify+save to preserve atomicity of
/// each transition"). Holding the guard across the `await`ed file write is
/// why this uses a `tokio::sync::Mutex` rather than `std::sync::Mutex` — it
/// is what actually closes the race two concurrent policy loops would
/// otherwise hit: without it, two `save()` calls can interleave and the one
/// that snapshotted earlier can finish writing *later*, silently resurrecting
/// stale state after a restart.
pub struct StateStore {
    path: PathBuf,
    records: Mutex<HashMap<String, RemediationRecord>>,
}

impl StateStore {
    /// Load the store from `path`. A missing or corrupt file is not fatal —
    /// it logs a warning and starts from an empty map, since losing
    /// in-flight remediation timers is recoverable (the next evaluation
    /// tick just restarts the clock).
    pub async fn load(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let records = match tokio::fs::read_to_string(&path).await {
            Ok(contents) => match serde_json::from_str(&contents) {
                Ok(map) => map,
                Err(e) => {
                    tracing::warn!(path = %path.display(), error = %e, "state_file_corrupt");
                    HashMap::new()
                }
            },
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::info!(path = %path.display(), "state_file_absent_starting_empty");
                HashMap::new()
            }
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "state_file_unreadable");
                HashMap::new()
            }
        };

        StateStore {
            path,
            records: Mutex::new(records),
        }
    }

    /// Read-only lookup. Safe to call concurrently with any `*_and_save`
    /// transaction — it simply waits its turn for the same lock, so it can
    /// never observe a half-written transition.
    pub async fn get(&self, key: &str) -> Option<RemediationRecord> {
        self.records.lock().await.get(key).cloned()
    }

    /// All keys currently tracked for `policy_id`, for the stale-record GC
    /// pass in the controller.
    pub async fn keys_for_policy(&self, policy_id: &str) -> Vec<String> {
        self.records
            .lock()
            .await
            .iter()
            .filter(|(_, record)| record.policy_id == policy_id)
            .map(|(key, _)| key.clone())
            .collect()
    }

    /// Insert `record` under `key` and persist the whole map before
    /// releasing the lock — one atomic read-modify-write-save transaction
    /// (spec §3 invariant I5: "state persistence happens before any
    /// externally visible transition is acknowledged as completed").
    pub async fn insert_and_save(&self, key: String, record: RemediationRecord) -> anyhow::Result<()> {
        let mut records = self.records.lock().await;
        records.insert(key, record);
        Self::write_snapshot(&self.path, &records).await
    }

    /// Remove `key` and persist the whole map before releasing the lock.
    pub async fn remove_and_save(&self, key: &str) -> anyhow::Result<()> {
        let mut records = self.records.lock().await;
        records.remove(key);
        Self::write_snapshot(&self.path, &records).await
    }

    /// Remove every key in `keys` and persist once, atomically with the
    /// removal — used by the controller's stale-record GC pass so a batch
    /// of removals costs one file write, not one per key.
    pub async fn remove_all_and_save(&self, keys: &[String]) -> anyhow::Result<()> {
        if keys.is_empty() {
            return Ok(());
        }
        let mut records = self.records.lock().await;
        for key in keys {
            records.remove(key);
        }
        Self::write_snapshot(&self.path, &records).await
    }

    /// Serialize `records` and write it via write-temp + rename so a crash
    /// mid-write never leaves a half-written state file behind. Only ever
    /// called while `records`' lock is held, so concurrent transactions
    /// never race on the shared temp file path.
    async fn write_snapshot(path: &Path, records: &HashMap<String, RemediationRecord>) -> anyhow::Result<()> {
        let contents = serde_json::to_string_pretty(records)?;

        let tmp_path = tmp_path_for(path);
        tokio::fs::write(&tmp_path, &contents)
            .await
            .map_err(|e| anyhow::anyhow!("failed to write state tmp file {}: {e}", tmp_path.display()))?;
        tokio::fs::rename(&tmp_path, path)
            .await
            .map_err(|e| anyhow::anyhow!("failed to rename state tmp file into place: {e}"))?;
        Ok(())
    }
}

fn tmp_path_for(path: &Path) -> PathBuf {
    let mut tmp = path.as_os_str().to_owned();
    tmp.push(".tmp");
    PathBuf::from(tmp)
}
