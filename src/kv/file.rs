//! Directory-backed durable key-value store.
//!
//! Each key lives in its own file under `entries/<shard>/<sha256(key)>`.
//! An entry file is:
//!
//! ```text
//! magic "KVE\0" | version u8 | key_len u32 | key | value_len u64 | value | crc32(key ++ value)
//! ```
//!
//! Writes go to a sibling temp file which is synced and renamed over the
//! entry, so a reader sees either the old or the new value, never a mix.

use super::{KvBackend, Result};
use crate::error::KvError;
use fs2::FileExt;
use lru::LruCache;
use parking_lot::Mutex;
use sha2::{Digest, Sha256};
use std::fs::{self, File};
use std::io::{self, Read, Seek, Write};
use std::num::NonZeroUsize;
use std::path::{Path, PathBuf};

/// Magic bytes for the store manifest.
const STORE_MAGIC: &[u8; 4] = b"TKV\0";

/// Current store format version.
const STORE_VERSION: u8 = 1;

/// Magic bytes for entry files.
const ENTRY_MAGIC: &[u8; 4] = b"KVE\0";

/// Current entry format version.
const ENTRY_VERSION: u8 = 1;

/// Suffix for in-flight writes.
const TEMP_SUFFIX: &str = ".tmp";

/// File backend configuration.
#[derive(Clone, Debug)]
pub struct FileBackendConfig {
    /// Base directory for the store.
    pub path: PathBuf,

    /// Read cache size (number of entries).
    pub cache_size: usize,

    /// Whether to create the store if it doesn't exist.
    pub create_if_missing: bool,

    /// Upper bound on bytes held in entry files.
    pub quota_bytes: Option<u64>,
}

impl Default for FileBackendConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("./taskboard-store"),
            cache_size: 256,
            create_if_missing: true,
            quota_bytes: None,
        }
    }
}

/// Durable backend storing one file per key.
pub struct FileBackend {
    config: FileBackendConfig,

    /// Lock file for exclusive access.
    _lock_file: File,

    /// LRU cache for recently read values.
    cache: Mutex<LruCache<String, String>>,

    /// Bytes currently held in entry files. Also serializes writers and cache fills.
    used_bytes: Mutex<u64>,
}

impl FileBackend {
    /// Open an existing store or create a new one.
    pub fn open(config: FileBackendConfig) -> Result<Self> {
        if config.path.join("MANIFEST").exists() {
            Self::verify_manifest(&config.path)?;
        } else if config.create_if_missing {
            fs::create_dir_all(config.path.join("entries"))?;
            Self::write_manifest(&config.path)?;
        } else {
            return Err(KvError::Unavailable(format!(
                "no store at {}",
                config.path.display()
            )));
        }

        let lock_file = Self::acquire_lock(&config.path)?;
        fs::create_dir_all(config.path.join("entries"))?;

        let cache_size = NonZeroUsize::new(config.cache_size.max(1)).unwrap_or(NonZeroUsize::MIN);
        let backend = Self {
            _lock_file: lock_file,
            cache: Mutex::new(LruCache::new(cache_size)),
            used_bytes: Mutex::new(0),
            config,
        };

        let used = backend.scan_usage()?;
        *backend.used_bytes.lock() = used;

        Ok(backend)
    }

    /// Get the store path.
    pub fn path(&self) -> &Path {
        &self.config.path
    }

    /// Bytes currently held in entry files.
    pub fn used_bytes(&self) -> u64 {
        *self.used_bytes.lock()
    }

    fn entries_dir(&self) -> PathBuf {
        self.config.path.join("entries")
    }

    fn key_hash(key: &str) -> String {
        let mut hasher = Sha256::new();
        hasher.update(key.as_bytes());
        hex::encode(hasher.finalize())
    }

    fn entry_path(&self, key: &str) -> PathBuf {
        let hash = Self::key_hash(key);
        self.entries_dir().join(&hash[..2]).join(hash)
    }

    fn encode_entry(key: &str, value: &str) -> Vec<u8> {
        let mut buf = Vec::with_capacity(4 + 1 + 4 + key.len() + 8 + value.len() + 4);
        buf.extend_from_slice(ENTRY_MAGIC);
        buf.push(ENTRY_VERSION);
        buf.extend_from_slice(&(key.len() as u32).to_le_bytes());
        buf.extend_from_slice(key.as_bytes());
        buf.extend_from_slice(&(value.len() as u64).to_le_bytes());
        buf.extend_from_slice(value.as_bytes());

        let mut hasher = crc32fast::Hasher::new();
        hasher.update(key.as_bytes());
        hasher.update(value.as_bytes());
        buf.extend_from_slice(&hasher.finalize().to_le_bytes());
        buf
    }

    /// Read an entry file, returning `(key, value)`.
    fn read_entry(path: &Path) -> Result<(String, String)> {
        let mut file = File::open(path)?;

        let mut magic = [0u8; 4];
        file.read_exact(&mut magic)?;
        if &magic != ENTRY_MAGIC {
            return Err(KvError::InvalidFormat("Invalid entry magic".into()));
        }

        let mut version = [0u8; 1];
        file.read_exact(&mut version)?;
        if version[0] != ENTRY_VERSION {
            return Err(KvError::InvalidFormat(format!(
                "Unsupported entry version: {}",
                version[0]
            )));
        }

        let file_len = file.metadata()?.len();

        let mut key_len_bytes = [0u8; 4];
        file.read_exact(&mut key_len_bytes)?;
        let key_len = u32::from_le_bytes(key_len_bytes) as u64;
        let key_bytes = Self::read_field(&mut file, file_len, key_len, "key")?;

        let mut value_len_bytes = [0u8; 8];
        file.read_exact(&mut value_len_bytes)?;
        let value_len = u64::from_le_bytes(value_len_bytes);
        let value_bytes = Self::read_field(&mut file, file_len, value_len, "value")?;

        let mut checksum_bytes = [0u8; 4];
        file.read_exact(&mut checksum_bytes)?;
        let stored_checksum = u32::from_le_bytes(checksum_bytes);

        let mut hasher = crc32fast::Hasher::new();
        hasher.update(&key_bytes);
        hasher.update(&value_bytes);
        let computed_checksum = hasher.finalize();

        if stored_checksum != computed_checksum {
            return Err(KvError::ChecksumMismatch {
                expected: stored_checksum,
                got: computed_checksum,
            });
        }

        let key = String::from_utf8(key_bytes)
            .map_err(|e| KvError::InvalidFormat(format!("key is not UTF-8: {}", e)))?;
        let value = String::from_utf8(value_bytes)
            .map_err(|e| KvError::InvalidFormat(format!("value is not UTF-8: {}", e)))?;

        Ok((key, value))
    }

    /// Read a length-prefixed field. Lengths are not covered by the checksum,
    /// so they are checked against what is left in the file before allocating.
    fn read_field(file: &mut File, file_len: u64, len: u64, what: &str) -> Result<Vec<u8>> {
        let remaining = file_len.saturating_sub(file.stream_position()?);
        if len > remaining {
            return Err(KvError::InvalidFormat(format!(
                "{} length {} exceeds remaining {} bytes",
                what, len, remaining
            )));
        }

        let mut bytes = vec![0u8; len as usize];
        file.read_exact(&mut bytes)?;
        Ok(bytes)
    }

    /// Paths of all entry files, collected before any is read.
    fn entry_paths(&self) -> Result<Vec<PathBuf>> {
        let mut paths = Vec::new();

        for shard in fs::read_dir(self.entries_dir())? {
            let shard = shard?;
            if !shard.file_type()?.is_dir() {
                continue;
            }
            for entry in fs::read_dir(shard.path())? {
                let entry = entry?;
                let name = entry.file_name();
                let name = name.to_string_lossy();
                if name.len() == 64 && name.chars().all(|c| c.is_ascii_hexdigit()) {
                    paths.push(entry.path());
                }
            }
        }

        Ok(paths)
    }

    fn scan_usage(&self) -> Result<u64> {
        let mut total = 0u64;
        for path in self.entry_paths()? {
            match fs::metadata(&path) {
                Ok(meta) => total += meta.len(),
                Err(e) if e.kind() == io::ErrorKind::NotFound => {}
                Err(e) => return Err(e.into()),
            }
        }
        Ok(total)
    }

    fn existing_len(path: &Path) -> Result<u64> {
        match fs::metadata(path) {
            Ok(meta) => Ok(meta.len()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(0),
            Err(e) => Err(e.into()),
        }
    }

    fn write_manifest(path: &Path) -> Result<()> {
        let mut file = File::create(path.join("MANIFEST"))?;
        file.write_all(STORE_MAGIC)?;
        file.write_all(&[STORE_VERSION])?;
        file.sync_all()?;
        Ok(())
    }

    fn verify_manifest(path: &Path) -> Result<()> {
        let mut file = File::open(path.join("MANIFEST"))?;

        let mut magic = [0u8; 4];
        file.read_exact(&mut magic)?;
        if &magic != STORE_MAGIC {
            return Err(KvError::InvalidFormat("Invalid store magic".into()));
        }

        let mut version = [0u8; 1];
        file.read_exact(&mut version)?;
        if version[0] != STORE_VERSION {
            return Err(KvError::InvalidFormat(format!(
                "Unsupported store version: {}",
                version[0]
            )));
        }

        Ok(())
    }

    fn acquire_lock(path: &Path) -> Result<File> {
        let lock_file = File::create(path.join("LOCK"))?;
        lock_file.try_lock_exclusive().map_err(|_| KvError::Locked)?;
        Ok(lock_file)
    }
}

impl KvBackend for FileBackend {
    fn get(&self, key: &str) -> Result<Option<String>> {
        if let Some(value) = self.cache.lock().get(key).cloned() {
            return Ok(Some(value));
        }

        // Writers hold this too, so a miss cannot cache a value older than a concurrent set
        let _writers = self.used_bytes.lock();
        if let Some(value) = self.cache.lock().get(key).cloned() {
            return Ok(Some(value));
        }

        let path = self.entry_path(key);
        let (stored_key, value) = match Self::read_entry(&path) {
            Ok(entry) => entry,
            Err(KvError::Io(e)) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e),
        };

        // A hash collision would surface here
        if stored_key != key {
            return Ok(None);
        }

        self.cache.lock().put(key.to_string(), value.clone());
        Ok(Some(value))
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        let mut used = self.used_bytes.lock();

        let path = self.entry_path(key);
        let encoded = Self::encode_entry(key, value);
        let old_len = Self::existing_len(&path)?;
        let requested = *used - old_len.min(*used) + encoded.len() as u64;

        if let Some(limit) = self.config.quota_bytes {
            if requested > limit {
                return Err(KvError::QuotaExceeded { limit, requested });
            }
        }

        if let Some(shard) = path.parent() {
            fs::create_dir_all(shard)?;
        }

        let mut temp_name = path.as_os_str().to_owned();
        temp_name.push(TEMP_SUFFIX);
        let temp_path = PathBuf::from(temp_name);

        {
            let mut file = File::create(&temp_path)?;
            file.write_all(&encoded)?;
            file.sync_all()?;
        }
        fs::rename(&temp_path, &path)?;

        *used = requested;
        self.cache.lock().put(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<()> {
        let mut used = self.used_bytes.lock();
        self.cache.lock().pop(key);

        let path = self.entry_path(key);
        let old_len = Self::existing_len(&path)?;
        match fs::remove_file(&path) {
            Ok(()) => {
                *used = used.saturating_sub(old_len);
                Ok(())
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    fn keys(&self) -> Result<Vec<String>> {
        let mut keys = Vec::new();

        for path in self.entry_paths()? {
            match Self::read_entry(&path) {
                Ok((key, _)) => keys.push(key),
                // Removed after the directory snapshot was taken
                Err(KvError::Io(e)) if e.kind() == io::ErrorKind::NotFound => {}
                Err(e) => {
                    tracing::warn!(path = %path.display(), error = %e, "skipping unreadable entry");
                }
            }
        }

        keys.sort();
        Ok(keys)
    }
}
