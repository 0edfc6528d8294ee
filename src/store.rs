//! Local persistence: a key-value blob store holding the archive and the session.

use anyhow::{Context, Result, anyhow, bail};
use flate2::{Compression, read::GzDecoder, write::GzEncoder};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::io::{ErrorKind, Read, Write};
use std::path::PathBuf;
use time::{Duration, OffsetDateTime};

use crate::auth::Role;
use crate::export::ExportSnapshot;

pub const ARCHIVE_KEY: &str = "archive.json.gz";
pub const AUTH_KEY: &str = "auth.json";

/// Byte blobs addressed by key
pub trait BlobStore {
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>>;
    fn put(&mut self, key: &str, value: &[u8]) -> Result<()>;
    /// Deleting a missing key is not an error.
    fn delete(&mut self, key: &str) -> Result<()>;
}

/// One file per key under a directory
#[derive(Debug, Clone)]
pub struct FileStore {
    dir: PathBuf,
}

impl FileStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    fn path(&self, key: &str) -> PathBuf {
        self.dir.join(key)
    }
}

impl BlobStore for FileStore {
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        match fs::read(self.path(key)) {
            Ok(bytes) => Ok(Some(bytes)),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(None),
            Err(err) => Err(err).with_context(|| format!("Failed to read {key}")),
        }
    }

    fn put(&mut self, key: &str, value: &[u8]) -> Result<()> {
        fs::create_dir_all(&self.dir)
            .with_context(|| format!("Failed to create {}", self.dir.display()))?;
        fs::write(self.path(key), value).with_context(|| format!("Failed to write {key}"))
    }

    fn delete(&mut self, key: &str) -> Result<()> {
        match fs::remove_file(self.path(key)) {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(()),
            Err(err) => Err(err).with_context(|| format!("Failed to delete {key}")),
        }
    }
}

/// In-memory store with an optional total size limit.
///
/// Overwriting a key needs room for the old and the new value at once.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    entries: HashMap<String, Vec<u8>>,
    quota: Option<usize>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_quota(quota: usize) -> Self {
        Self {
            entries: HashMap::new(),
            quota: Some(quota),
        }
    }

    /// Bytes stored across all keys
    pub fn usage(&self) -> usize {
        self.entries.values().map(Vec::len).sum()
    }
}

impl BlobStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        Ok(self.entries.get(key).cloned())
    }

    fn put(&mut self, key: &str, value: &[u8]) -> Result<()> {
        if let Some(quota) = self.quota {
            let needed = self.usage() + value.len();
            if needed > quota {
                bail!("quota exceeded: {needed} of {quota} bytes");
            }
        }
        self.entries.insert(key.to_string(), value.to_vec());
        Ok(())
    }

    fn delete(&mut self, key: &str) -> Result<()> {
        self.entries.remove(key);
        Ok(())
    }
}

/// Persisted session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredAuth {
    pub role: Role,
    /// Unix milliseconds of the login
    pub timestamp: i64,
}

impl StoredAuth {
    /// Milliseconds since login, `None` when the timestamp is in the future
    /// or too far off to subtract.
    pub fn age_millis(&self, now: OffsetDateTime) -> Option<i64> {
        unix_millis(now)
            .checked_sub(self.timestamp)
            .filter(|age| *age >= 0)
    }

    pub fn is_expired(&self, age_millis: i64, ttl: Duration) -> bool {
        let ttl = i64::try_from(ttl.whole_milliseconds()).unwrap_or(i64::MAX);
        age_millis > ttl
    }
}

fn unix_millis(at: OffsetDateTime) -> i64 {
    (at.unix_timestamp_nanos() / 1_000_000) as i64
}

fn gzip_compress(data: &[u8]) -> Result<Vec<u8>> {
    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(data)?;
    let compressed = encoder.finish()?;
    Ok(compressed)
}

fn decode_snapshot(bytes: &[u8]) -> Result<ExportSnapshot> {
    let mut decoder = GzDecoder::new(bytes);
    let mut json = String::new();
    decoder
        .read_to_string(&mut json)
        .context("Failed to decompress archive")?;
    serde_json::from_str(&json).context("Failed to parse archive")
}

/// Archive and session persistence over a [`BlobStore`]
#[derive(Debug)]
pub struct Archive<S> {
    store: S,
}

impl<S: BlobStore> Archive<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Save the snapshot as gzip-compressed JSON.
    ///
    /// A failed write clears the key and is retried once.
    pub fn save_snapshot(&mut self, snapshot: &ExportSnapshot) -> Result<()> {
        let json = serde_json::to_vec(snapshot).context("Failed to serialize archive")?;
        let compressed = gzip_compress(&json)?;
        if let Err(err) = self.store.put(ARCHIVE_KEY, &compressed) {
            tracing::warn!(error = %err, "archive write failed, clearing and retrying");
            self.store.delete(ARCHIVE_KEY)?;
            self.store.put(ARCHIVE_KEY, &compressed).map_err(|err| {
                tracing::error!(error = %err, "archive write failed after retry");
                anyhow!("unable to save data - storage may be full")
            })?;
        }
        tracing::debug!(
            raw = json.len(),
            compressed = compressed.len(),
            "archive saved"
        );
        Ok(())
    }

    /// The stored snapshot. A corrupted archive is deleted and reported as absent.
    pub fn load_snapshot(&mut self) -> Result<Option<ExportSnapshot>> {
        let Some(bytes) = self.store.get(ARCHIVE_KEY)? else {
            return Ok(None);
        };
        match decode_snapshot(&bytes) {
            Ok(snapshot) => Ok(Some(snapshot)),
            Err(err) => {
                tracing::warn!(error = %err, "discarding corrupted archive");
                self.store.delete(ARCHIVE_KEY)?;
                Ok(None)
            }
        }
    }

    pub fn has_snapshot(&self) -> Result<bool> {
        Ok(self.store.get(ARCHIVE_KEY)?.is_some())
    }

    pub fn clear_snapshot(&mut self) -> Result<()> {
        self.store.delete(ARCHIVE_KEY)
    }

    pub fn save_auth(&mut self, role: Role, now: OffsetDateTime) -> Result<()> {
        let record = StoredAuth {
            role,
            timestamp: unix_millis(now),
        };
        let json = serde_json::to_vec(&record)?;
        self.store.put(AUTH_KEY, &json)
    }

    /// The stored session role, if present and younger than `ttl`.
    pub fn load_auth(&mut self, now: OffsetDateTime, ttl: Duration) -> Result<Option<Role>> {
        let Some(bytes) = self.store.get(AUTH_KEY)? else {
            return Ok(None);
        };
        match serde_json::from_slice::<StoredAuth>(&bytes) {
            Ok(record) => match record.age_millis(now) {
                Some(age) if !record.is_expired(age, ttl) => Ok(Some(record.role)),
                Some(_) => {
                    tracing::debug!("session expired");
                    self.store.delete(AUTH_KEY)?;
                    Ok(None)
                }
                None => {
                    tracing::warn!(
                        timestamp = record.timestamp,
                        "discarding session with bad timestamp"
                    );
                    self.store.delete(AUTH_KEY)?;
                    Ok(None)
                }
            },
            Err(err) => {
                tracing::warn!(error = %err, "discarding corrupted session");
                self.store.delete(AUTH_KEY)?;
                Ok(None)
            }
        }
    }

    pub fn clear_auth(&mut self) -> Result<()> {
        self.store.delete(AUTH_KEY)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::export::Message;
    use tempfile::tempdir;

    fn snapshot() -> ExportSnapshot {
        let mut snapshot: ExportSnapshot = serde_json::from_str(
            r#"{"channels": [{"id": "C1", "name": "general"}], "users": [{"id": "U1", "name": "ada"}]}"#,
        )
        .unwrap();
        let messages: Vec<Message> =
            serde_json::from_str(r#"[{"ts": "1.0", "user": "U1", "text": "hello"}]"#).unwrap();
        snapshot.messages.insert("general".to_string(), messages);
        snapshot
    }

    fn at(unix: i64) -> OffsetDateTime {
        OffsetDateTime::from_unix_timestamp(unix).unwrap()
    }

    #[test]
    fn snapshot_round_trip_is_compressed() {
        let mut archive = Archive::new(MemoryStore::new());
        assert!(archive.load_snapshot().unwrap().is_none());
        archive.save_snapshot(&snapshot()).unwrap();
        assert!(archive.has_snapshot().unwrap());
        let raw = archive.store().get(ARCHIVE_KEY).unwrap().unwrap();
        assert_eq!(&raw[..2], &[0x1f, 0x8b]);
        assert_eq!(archive.load_snapshot().unwrap(), Some(snapshot()));
    }

    #[test]
    fn corrupted_snapshot_is_deleted() {
        let mut store = MemoryStore::new();
        store.put(ARCHIVE_KEY, b"not gzip").unwrap();
        let mut archive = Archive::new(store);
        assert!(archive.load_snapshot().unwrap().is_none());
        assert!(!archive.has_snapshot().unwrap());
    }

    #[test]
    fn save_retries_after_clearing_old_archive() {
        let mut bigger = snapshot();
        let filler: Vec<Message> = (0..50)
            .map(|i| {
                serde_json::from_value(serde_json::json!({"ts": format!("{i}.0"), "text": "x"}))
                    .unwrap()
            })
            .collect();
        bigger.messages.insert("random".to_string(), filler);
        let needed = gzip_compress(&serde_json::to_vec(&bigger).unwrap())
            .unwrap()
            .len();

        let mut archive = Archive::new(MemoryStore::with_quota(needed));
        archive.save_snapshot(&snapshot()).unwrap();
        // Old and new archive do not fit side by side
        archive.save_snapshot(&bigger).unwrap();
        assert_eq!(archive.load_snapshot().unwrap(), Some(bigger));
    }

    #[test]
    fn save_fails_when_storage_full() {
        let mut archive = Archive::new(MemoryStore::with_quota(10));
        let err = archive.save_snapshot(&snapshot()).unwrap_err();
        assert_eq!(err.to_string(), "unable to save data - storage may be full");
        assert!(!archive.has_snapshot().unwrap());
    }

    #[test]
    fn auth_expires_after_ttl() {
        let mut archive = Archive::new(MemoryStore::new());
        let login = at(1_700_000_000);
        archive.save_auth(Role::Club, login).unwrap();
        let ttl = Duration::hours(24);
        assert_eq!(
            archive.load_auth(login + Duration::hours(23), ttl).unwrap(),
            Some(Role::Club)
        );
        assert_eq!(archive.load_auth(login + Duration::hours(25), ttl).unwrap(), None);
        // Expired record was removed
        assert!(archive.store().get(AUTH_KEY).unwrap().is_none());
    }

    #[test]
    fn auth_record_shape() {
        let mut archive = Archive::new(MemoryStore::new());
        archive.save_auth(Role::Admin, at(1_700_000_000)).unwrap();
        let raw = archive.store().get(AUTH_KEY).unwrap().unwrap();
        let value: serde_json::Value = serde_json::from_slice(&raw).unwrap();
        assert_eq!(value["role"], "admin");
        assert_eq!(value["timestamp"], 1_700_000_000_000_i64);
    }

    #[test]
    fn corrupted_auth_is_deleted() {
        let mut store = MemoryStore::new();
        store.put(AUTH_KEY, b"{\"role\": \"root\"}").unwrap();
        let mut archive = Archive::new(store);
        assert_eq!(
            archive.load_auth(at(0), Duration::hours(24)).unwrap(),
            None
        );
        assert!(archive.store().get(AUTH_KEY).unwrap().is_none());
    }

    #[test]
    fn auth_with_out_of_range_timestamp_is_deleted() {
        let ttl = Duration::hours(24);
        for timestamp in [i64::MIN, i64::MAX] {
            let mut store = MemoryStore::new();
            let record = format!("{{\"role\": \"admin\", \"timestamp\": {timestamp}}}");
            store.put(AUTH_KEY, record.as_bytes()).unwrap();
            let mut archive = Archive::new(store);
            assert_eq!(archive.load_auth(at(1_700_000_000), ttl).unwrap(), None);
            assert!(archive.store().get(AUTH_KEY).unwrap().is_none());
        }
    }

    #[test]
    fn auth_accepts_unbounded_ttl() {
        let mut archive = Archive::new(MemoryStore::new());
        archive.save_auth(Role::Club, at(0)).unwrap();
        assert_eq!(
            archive.load_auth(at(1_700_000_000), Duration::MAX).unwrap(),
            Some(Role::Club)
        );
    }

    #[test]
    fn file_store_round_trip() {
        let dir = tempdir().unwrap();
        let mut store = FileStore::new(dir.path().join("data"));
        assert!(store.get("missing").unwrap().is_none());
        store.put("k", b"value").unwrap();
        assert_eq!(store.get("k").unwrap(), Some(b"value".to_vec()));
        store.delete("k").unwrap();
        store.delete("k").unwrap();
        assert!(store.get("k").unwrap().is_none());
    }

    #[test]
    fn memory_quota_needs_room_for_overwrite() {
        let mut store = MemoryStore::with_quota(8);
        store.put("a", b"1234").unwrap();
        store.put("a", b"4321").unwrap();
        assert!(store.put("a", b"12345").is_err());
        store.delete("a").unwrap();
        store.put("a", b"12345678").unwrap();
        assert_eq!(store.usage(), 8);
    }
}
