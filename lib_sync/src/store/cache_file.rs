//! # File-Backed Key-Value Store
//!
//! A small persistent map of `key -> typed JSON value` living in one file on
//! local disk. It replaces a remote cache for the one job this service needs:
//! remembering where each sync task stopped paginating.
//!
//! ## Behaviour:
//! - **Buckets**: the file may hold several named buckets; a `FileStore`
//!   handle reads and writes exactly one of them.
//! - **Expiry**: `set` takes a TTL in seconds (`0` = never expires). An
//!   expired entry reads as missing and is removed on that read.
//! - **Tri-state reads**: `get` returns [`Lookup::Found`], [`Lookup::NotFound`]
//!   or [`Lookup::Unreadable`], so callers can tell "no marker yet" apart from
//!   "the stored value cannot be decoded".
//! - **Exclusive ownership**: opening takes an exclusive lock on a sibling
//!   `.lock` file and keeps it for the lifetime of the handle. If the lock is
//!   not obtained within the timeout, opening fails.
//! - **Concurrency**: all reads and writes go through one internal mutex, so
//!   a single `Arc<FileStore>` can be shared by independent tasks.
//! - **Durability**: every mutation is applied to a copy of the state and
//!   written to a temporary file, which is fsynced and renamed over the store
//!   file before the parent directory is fsynced. The copy replaces the
//!   in-memory state only once the write succeeded, so a failed write leaves
//!   both memory and disk at the previous state.

use std::collections::BTreeMap;
use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::thread;
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

use fs2::FileExt;
use parking_lot::Mutex;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// How long `open` waits for the exclusive lock by default.
pub const DEFAULT_LOCK_TIMEOUT: Duration = Duration::from_secs(1);

const LOCK_POLL: Duration = Duration::from_millis(25);

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("I/O error on store file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Timed out after {waited:?} waiting for the lock on {path}")]
    LockTimeout { path: PathBuf, waited: Duration },

    #[error("Store file {path} is corrupt: {source}")]
    Corrupt {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("Failed to serialize value for key '{key}': {source}")]
    Encode {
        key: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("Stored value for key '{key}' does not decode as {expected}: {source}")]
    Decode {
        key: String,
        expected: &'static str,
        #[source]
        source: serde_json::Error,
    },

    #[error("Refusing to store a null value for key '{0}'")]
    NullValue(String),
}

/// Result of a typed read.
#[derive(Debug)]
pub enum Lookup<T> {
    Found(T),
    NotFound,
    Unreadable(StoreError),
}

impl<T> Lookup<T> {
    /// Collapses the lookup into an option, discarding the reason a value is absent.
    pub fn found(self) -> Option<T> {
        match self {
            Lookup::Found(value) => Some(value),
            _ => None,
        }
    }

    pub fn is_found(&self) -> bool {
        matches!(self, Lookup::Found(_))
    }
}

/// One stored value with its type name and absolute expiry (unix seconds, 0 = never).
#[derive(Debug, Clone, Serialize, Deserialize)]
struct StoredItem {
    data_type: String,
    data_value: serde_json::Value,
    expiration: u64,
}

impl StoredItem {
    fn is_expired(&self, now: u64) -> bool {
        self.expiration > 0 && now > self.expiration
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct StoreFile {
    buckets: BTreeMap<String, BTreeMap<String, StoredItem>>,
}

/// Handle on one bucket of the key-value file.
pub struct FileStore {
    path: PathBuf,
    bucket: String,
    state: Mutex<StoreFile>,
    // Held for the lifetime of the handle; the OS releases the lock on drop.
    _lock: File,
}

impl FileStore {
    /// Opens (or creates) the store file and its bucket, waiting up to
    /// [`DEFAULT_LOCK_TIMEOUT`] for the exclusive lock.
    pub fn open(path: impl AsRef<Path>, bucket: &str) -> Result<Self, StoreError> {
        Self::open_with_timeout(path, bucket, DEFAULT_LOCK_TIMEOUT)
    }

    pub fn open_with_timeout(
        path: impl AsRef<Path>,
        bucket: &str,
        timeout: Duration,
    ) -> Result<Self, StoreError> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                fs::create_dir_all(parent)?;
            }
        }

        let lock = acquire_lock(&lock_path(&path), timeout)?;

        let mut file = read_store_file(&path)?;
        let created = !file.buckets.contains_key(bucket);
        file.buckets.entry(bucket.to_string()).or_default();

        let store = Self {
            path,
            bucket: bucket.to_string(),
            state: Mutex::new(file),
            _lock: lock,
        };
        if created {
            let state = store.state.lock();
            store.persist(&state)?;
        }

        log::debug!("Opened store {} [{}]", store.path.display(), store.bucket);
        Ok(store)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Stores `value` under `key`. `ttl_secs == 0` means the entry never expires.
    pub fn set<T: Serialize>(&self, key: &str, value: &T, ttl_secs: u64) -> Result<(), StoreError> {
        let data_value = serde_json::to_value(value).map_err(|source| StoreError::Encode {
            key: key.to_string(),
            source,
        })?;
        if data_value.is_null() {
            return Err(StoreError::NullValue(key.to_string()));
        }

        let expiration = if ttl_secs == 0 { 0 } else { unix_now() + ttl_secs };
        let item = StoredItem {
            data_type: std::any::type_name::<T>().to_string(),
            data_value,
            expiration,
        };

        let mut state = self.state.lock();
        let mut next = state.clone();
        next.buckets
            .entry(self.bucket.clone())
            .or_default()
            .insert(key.to_string(), item);
        self.commit(&mut state, next)
    }

    /// Reads `key` as a `T`. Expired entries are removed and reported as missing.
    pub fn get<T: DeserializeOwned>(&self, key: &str) -> Lookup<T> {
        let mut state = self.state.lock();
        let Some(bucket) = state.buckets.get(&self.bucket) else {
            return Lookup::NotFound;
        };
        let Some(item) = bucket.get(key) else {
            return Lookup::NotFound;
        };

        if item.is_expired(unix_now()) {
            let mut next = state.clone();
            if let Some(bucket) = next.buckets.get_mut(&self.bucket) {
                bucket.remove(key);
            }
            if let Err(e) = self.commit(&mut state, next) {
                log::warn!("Failed to drop expired key '{}' from store: {}", key, e);
            }
            return Lookup::NotFound;
        }

        match serde_json::from_value::<T>(item.data_value.clone()) {
            Ok(value) => Lookup::Found(value),
            Err(source) => Lookup::Unreadable(StoreError::Decode {
                key: key.to_string(),
                expected: std::any::type_name::<T>(),
                source,
            }),
        }
    }

    pub fn delete(&self, key: &str) -> Result<(), StoreError> {
        let mut state = self.state.lock();
        let mut next = state.clone();
        let removed = next
            .buckets
            .get_mut(&self.bucket)
            .and_then(|bucket| bucket.remove(key))
            .is_some();
        if removed {
            self.commit(&mut state, next)?;
        }
        Ok(())
    }

    /// Empties this handle's bucket. Other buckets in the file are untouched.
    pub fn flush(&self) -> Result<(), StoreError> {
        let mut state = self.state.lock();
        let mut next = state.clone();
        next.buckets.insert(self.bucket.clone(), BTreeMap::new());
        self.commit(&mut state, next)
    }

    /// Writes `next` to disk and, only if that succeeds, makes it the live state.
    fn commit(&self, state: &mut StoreFile, next: StoreFile) -> Result<(), StoreError> {
        self.persist(&next)?;
        *state = next;
        Ok(())
    }

    fn persist(&self, state: &StoreFile) -> Result<(), StoreError> {
        let bytes = serde_json::to_vec_pretty(state).map_err(|source| StoreError::Encode {
            key: self.bucket.clone(),
            source,
        })?;
        let tmp = sibling(&self.path, "tmp");
        let mut file = File::create(&tmp)?;
        file.write_all(&bytes)?;
        file.sync_all()?;
        drop(file);

        fs::rename(&tmp, &self.path)?;
        sync_parent_dir(&self.path)
    }
}

/// Fsyncs the directory holding `path` so a completed rename survives a crash.
#[cfg(unix)]
fn sync_parent_dir(path: &Path) -> Result<(), StoreError> {
    let parent = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    File::open(parent)?.sync_all()?;
    Ok(())
}

// NTFS journals metadata; directory handles cannot be fsynced there.
#[cfg(not(unix))]
fn sync_parent_dir(_path: &Path) -> Result<(), StoreError> {
    Ok(())
}

fn acquire_lock(lock_path: &Path, timeout: Duration) -> Result<File, StoreError> {
    let file = OpenOptions::new()
        .read(true)
        .write(true)
        .create(true)
        .truncate(false)
        .open(lock_path)?;

    let started = Instant::now();
    loop {
        match file.try_lock_exclusive() {
            Ok(()) => return Ok(file),
            Err(e) if started.elapsed() >= timeout => {
                log::error!("Store lock {} not acquired: {}", lock_path.display(), e);
                return Err(StoreError::LockTimeout {
                    path: lock_path.to_path_buf(),
                    waited: started.elapsed(),
                });
            }
            Err(_) => thread::sleep(LOCK_POLL),
        }
    }
}

fn read_store_file(path: &Path) -> Result<StoreFile, StoreError> {
    if !path.exists() {
        return Ok(StoreFile::default());
    }
    let raw = fs::read(path)?;
    if raw.iter().all(u8::is_ascii_whitespace) {
        return Ok(StoreFile::default());
    }
    serde_json::from_slice(&raw).map_err(|source| StoreError::Corrupt {
        path: path.to_path_buf(),
        source,
    })
}

fn lock_path(path: &Path) -> PathBuf {
    sibling(path, "lock")
}

fn sibling(path: &Path, suffix: &str) -> PathBuf {
    let mut name = path.as_os_str().to_os_string();
    name.push(".");
    name.push(suffix);
    PathBuf::from(name)
}

fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or_default()
}
