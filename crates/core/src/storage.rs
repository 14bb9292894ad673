//! Local key-value storage.
//!
//! Mirrors browser local storage: synchronous, string-valued, no
//! transactions, shared by every tab of an origin. Concurrent writers to the
//! same key are last-write-wins.

use parking_lot::Mutex;
use std::collections::{BTreeMap, HashMap};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, LazyLock};

use crate::error::{Error, Result};

/// Synchronous string key-value store.
pub trait KeyValueStorage: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<String>>;
    fn set(&self, key: &str, value: &str) -> Result<()>;
    fn remove(&self, key: &str) -> Result<()>;
}

/// Shared storage handle.
pub type SharedStorage = Arc<dyn KeyValueStorage>;

fn used_bytes<'a>(entries: impl Iterator<Item = (&'a String, &'a String)>) -> usize {
    entries.map(|(k, v)| k.len() + v.len()).sum()
}

/// In-process storage with an optional quota.
#[derive(Debug, Default)]
pub struct MemoryStorage {
    entries: Mutex<HashMap<String, String>>,
    quota_bytes: Option<usize>,
    disabled: AtomicBool,
    writes: AtomicU64,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Storage that rejects writes pushing total size past `quota_bytes`.
    pub fn with_quota(quota_bytes: usize) -> Self {
        Self {
            quota_bytes: Some(quota_bytes),
            ..Self::default()
        }
    }

    /// Simulates storage being disabled (private browsing, policy).
    pub fn set_disabled(&self, disabled: bool) {
        self.disabled.store(disabled, Ordering::SeqCst);
    }

    /// Number of successful `set` calls.
    pub fn write_count(&self) -> u64 {
        self.writes.load(Ordering::SeqCst)
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }
}

impl KeyValueStorage for MemoryStorage {
    fn get(&self, key: &str) -> Result<Option<String>> {
        if self.disabled.load(Ordering::SeqCst) {
            return Err(Error::storage_read("storage is disabled"));
        }
        Ok(self.entries.lock().get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        if self.disabled.load(Ordering::SeqCst) {
            return Err(Error::storage_write("storage is disabled"));
        }

        let mut entries = self.entries.lock();

        if let Some(quota) = self.quota_bytes {
            let others = used_bytes(entries.iter().filter(|(k, _)| k.as_str() != key));
            if others + key.len() + value.len() > quota {
                return Err(Error::storage_write(format!(
                    "quota of {} bytes exceeded",
                    quota
                )));
            }
        }

        entries.insert(key.to_string(), value.to_string());
        self.writes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<()> {
        if self.disabled.load(Ordering::SeqCst) {
            return Err(Error::storage_write("storage is disabled"));
        }
        self.entries.lock().remove(key);
        Ok(())
    }
}

/// Storage persisted as a single JSON object on disk.
///
/// Every operation re-reads the file, so separate processes opening the same
/// path see each other's writes. Handles in one process that share a path
/// also share a lock, so their read-modify-write cycles never interleave.
/// Writes land in a fresh temp file in the same directory and are renamed
/// over the target, so readers only ever see a complete file.
#[derive(Debug)]
pub struct FileStorage {
    path: PathBuf,
    quota_bytes: usize,
    lock: Arc<Mutex<()>>,
}

static PATH_LOCKS: LazyLock<Mutex<HashMap<PathBuf, Arc<Mutex<()>>>>> =
    LazyLock::new(|| Mutex::new(HashMap::new()));

fn path_lock(path: &Path) -> Arc<Mutex<()>> {
    PATH_LOCKS
        .lock()
        .entry(path.to_path_buf())
        .or_default()
        .clone()
}

impl FileStorage {
    pub fn new(path: impl Into<PathBuf>, quota_bytes: usize) -> Self {
        let path = path.into();
        Self {
            lock: path_lock(&path),
            path,
            quota_bytes,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read_all(&self) -> Result<BTreeMap<String, String>> {
        let content = match std::fs::read_to_string(&self.path) {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(BTreeMap::new()),
            Err(e) => return Err(Error::storage_read(e.to_string())),
        };

        if content.trim().is_empty() {
            return Ok(BTreeMap::new());
        }

        serde_json::from_str(&content).map_err(|e| Error::storage_read(e.to_string()))
    }

    /// Reads the current entries before a write. An unreadable file fails
    /// the write instead of being replaced.
    fn read_for_write(&self) -> Result<BTreeMap<String, String>> {
        self.read_all().map_err(|e| {
            Error::storage_write(format!(
                "existing storage at {} is unreadable: {}",
                self.path.display(),
                e
            ))
        })
    }

    fn write_all(&self, entries: &BTreeMap<String, String>) -> Result<()> {
        let dir = match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };
        std::fs::create_dir_all(dir).map_err(|e| Error::storage_write(e.to_string()))?;

        let body = serde_json::to_string(entries)?;
        let mut tmp = tempfile::NamedTempFile::new_in(dir)
            .map_err(|e| Error::storage_write(format!("failed to create temp file: {}", e)))?;
        tmp.write_all(body.as_bytes())
            .map_err(|e| Error::storage_write(format!("failed to write temp file: {}", e)))?;
        tmp.flush()
            .map_err(|e| Error::storage_write(format!("failed to flush temp file: {}", e)))?;
        tmp.persist(&self.path)
            .map_err(|e| Error::storage_write(format!("failed to persist file: {}", e)))?;
        Ok(())
    }
}

impl KeyValueStorage for FileStorage {
    fn get(&self, key: &str) -> Result<Option<String>> {
        let _guard = self.lock.lock();
        Ok(self.read_all()?.get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        let _guard = self.lock.lock();
        let mut entries = self.read_for_write()?;
        entries.insert(key.to_string(), value.to_string());

        if used_bytes(entries.iter()) > self.quota_bytes {
            return Err(Error::storage_write(format!(
                "quota of {} bytes exceeded",
                self.quota_bytes
            )));
        }

        self.write_all(&entries)
    }

    fn remove(&self, key: &str) -> Result<()> {
        let _guard = self.lock.lock();
        let mut entries = self.read_for_write()?;
        if entries.remove(key).is_some() {
            self.write_all(&entries)?;
        }
        Ok(())
    }
}
