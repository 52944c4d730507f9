//! Cache of parsed years.
//!
//! A cache is an explicit handle passed into the pipeline. Entries are keyed
//! by `(year, dataset kind, output shape)` and hold the JSON-serialised
//! result for that key. Writes replace whole files, so a reader never sees a
//! partial entry.

use crate::config::PipelineConfig;
use crate::error::EnrollmentError;
use crate::output::{DatasetKind, OutputShape};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::collections::HashMap;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::SystemTime;
use tracing::{debug, warn};

// ── Keys ─────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CacheKey {
    pub year: u16,
    pub kind: DatasetKind,
    pub shape: OutputShape,
}

impl CacheKey {
    pub fn new(year: u16, kind: DatasetKind, shape: OutputShape) -> Self {
        Self { year, kind, shape }
    }

    /// `enr_{shape}_{kind}_{year}.json`
    pub fn file_name(&self) -> String {
        format!(
            "enr_{}_{}_{}.json",
            self.shape.as_str(),
            self.kind.as_str(),
            self.year
        )
    }

    /// Inverse of [`CacheKey::file_name`].
    pub fn from_file_name(name: &str) -> Option<Self> {
        let stem = name.strip_prefix("enr_")?.strip_suffix(".json")?;
        let (shape, rest) = stem.split_once('_')?;
        let (kind, year) = rest.rsplit_once('_')?;
        let shape = match shape {
            "wide" => OutputShape::Wide,
            "tidy" => OutputShape::Tidy,
            _ => return None,
        };
        let kind = match kind {
            "grade_detail" => DatasetKind::GradeDetail,
            "headcount" => DatasetKind::Headcount,
            _ => return None,
        };
        Some(Self::new(year.parse().ok()?, kind, shape))
    }
}

/// One stored entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheEntry {
    pub key: CacheKey,
    pub bytes: u64,
    pub modified: Option<SystemTime>,
}

// ── Trait ────────────────────────────────────────────────────────────────

pub trait Cache: Send + Sync {
    /// Stored bytes, or `None` on a miss. Read failures count as misses.
    fn get(&self, key: &CacheKey) -> Option<Vec<u8>>;

    /// Store `bytes`, replacing any previous entry.
    fn put(&self, key: &CacheKey, bytes: &[u8]) -> Result<(), EnrollmentError>;

    /// Entries sorted by key.
    fn entries(&self) -> Result<Vec<CacheEntry>, EnrollmentError>;

    /// Remove entries for one year, or all entries; returns how many.
    fn clear(&self, year: Option<u16>) -> Result<usize, EnrollmentError>;
}

/// Read and decode a JSON entry. An entry that fails to decode is treated as
/// a miss.
pub fn get_json<T: DeserializeOwned>(cache: &dyn Cache, key: &CacheKey) -> Option<T> {
    let bytes = cache.get(key)?;
    match serde_json::from_slice(&bytes) {
        Ok(value) => Some(value),
        Err(e) => {
            warn!("Ignoring unreadable cache entry {}: {e}", key.file_name());
            None
        }
    }
}

pub fn put_json<T: Serialize>(
    cache: &dyn Cache,
    key: &CacheKey,
    value: &T,
) -> Result<(), EnrollmentError> {
    let bytes = serde_json::to_vec(value)
        .map_err(|e| EnrollmentError::Internal(format!("cache encode: {e}")))?;
    cache.put(key, &bytes)
}

// ── Disk ─────────────────────────────────────────────────────────────────

/// One JSON file per key in a directory.
#[derive(Debug, Clone)]
pub struct DiskCache {
    dir: PathBuf,
}

impl DiskCache {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path(&self, key: &CacheKey) -> PathBuf {
        self.dir.join(key.file_name())
    }

    fn io_error(path: &Path) -> impl FnOnce(std::io::Error) -> EnrollmentError + '_ {
        move |source| EnrollmentError::Cache {
            path: path.to_path_buf(),
            source,
        }
    }
}

impl Cache for DiskCache {
    fn get(&self, key: &CacheKey) -> Option<Vec<u8>> {
        let path = self.path(key);
        match std::fs::read(&path) {
            Ok(bytes) => {
                debug!("Cache hit: {}", path.display());
                Some(bytes)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => None,
            Err(e) => {
                warn!("Cache read failed for {}: {e}", path.display());
                None
            }
        }
    }

    fn put(&self, key: &CacheKey, bytes: &[u8]) -> Result<(), EnrollmentError> {
        std::fs::create_dir_all(&self.dir).map_err(Self::io_error(&self.dir))?;
        let path = self.path(key);

        // Temp file in the same directory so the rename cannot cross devices.
        let mut tmp = tempfile::NamedTempFile::new_in(&self.dir).map_err(Self::io_error(&path))?;
        tmp.write_all(bytes).map_err(Self::io_error(&path))?;
        tmp.persist(&path)
            .map_err(|e| Self::io_error(&path)(e.error))?;

        debug!("Cache write: {} ({} bytes)", path.display(), bytes.len());
        Ok(())
    }

    fn entries(&self) -> Result<Vec<CacheEntry>, EnrollmentError> {
        let read_dir = match std::fs::read_dir(&self.dir) {
            Ok(rd) => rd,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(Self::io_error(&self.dir)(e)),
        };

        let mut entries = Vec::new();
        for dirent in read_dir {
            let dirent = dirent.map_err(Self::io_error(&self.dir))?;
            let name = dirent.file_name();
            let Some(key) = name.to_str().and_then(CacheKey::from_file_name) else {
                continue;
            };
            let meta = dirent.metadata().map_err(Self::io_error(&self.dir))?;
            entries.push(CacheEntry {
                key,
                bytes: meta.len(),
                modified: meta.modified().ok(),
            });
        }
        entries.sort_by_key(|e| e.key);
        Ok(entries)
    }

    fn clear(&self, year: Option<u16>) -> Result<usize, EnrollmentError> {
        let mut removed = 0;
        for entry in self.entries()? {
            if year.is_some_and(|y| y != entry.key.year) {
                continue;
            }
            let path = self.path(&entry.key);
            std::fs::remove_file(&path).map_err(Self::io_error(&path))?;
            removed += 1;
        }
        Ok(removed)
    }
}

// ── Memory ───────────────────────────────────────────────────────────────

/// In-process cache, for tests and short-lived embedding.
#[derive(Debug, Default)]
pub struct MemoryCache {
    map: Mutex<HashMap<CacheKey, Vec<u8>>>,
}

impl MemoryCache {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<CacheKey, Vec<u8>>> {
        self.map.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl Cache for MemoryCache {
    fn get(&self, key: &CacheKey) -> Option<Vec<u8>> {
        self.lock().get(key).cloned()
    }

    fn put(&self, key: &CacheKey, bytes: &[u8]) -> Result<(), EnrollmentError> {
        self.lock().insert(*key, bytes.to_vec());
        Ok(())
    }

    fn entries(&self) -> Result<Vec<CacheEntry>, EnrollmentError> {
        let mut entries: Vec<CacheEntry> = self
            .lock()
            .iter()
            .map(|(key, bytes)| CacheEntry {
                key: *key,
                bytes: bytes.len() as u64,
                modified: None,
            })
            .collect();
        entries.sort_by_key(|e| e.key);
        Ok(entries)
    }

    fn clear(&self, year: Option<u16>) -> Result<usize, EnrollmentError> {
        let mut map = self.lock();
        let before = map.len();
        map.retain(|key, _| year.is_some_and(|y| y != key.year));
        Ok(before - map.len())
    }
}

// ── Bypass ───────────────────────────────────────────────────────────────

/// Always misses; writes are discarded.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoCache;

impl Cache for NoCache {
    fn get(&self, _key: &CacheKey) -> Option<Vec<u8>> {
        None
    }

    fn put(&self, _key: &CacheKey, _bytes: &[u8]) -> Result<(), EnrollmentError> {
        Ok(())
    }

    fn entries(&self) -> Result<Vec<CacheEntry>, EnrollmentError> {
        Ok(Vec::new())
    }

    fn clear(&self, _year: Option<u16>) -> Result<usize, EnrollmentError> {
        Ok(0)
    }
}

// ── Config helpers ───────────────────────────────────────────────────────

/// The cache a configuration asks for: on disk, or bypassed.
pub fn cache_for(config: &PipelineConfig) -> Arc<dyn Cache> {
    if config.use_cache {
        Arc::new(DiskCache::new(config.resolved_cache_dir()))
    } else {
        Arc::new(NoCache)
    }
}

/// Entries in the configured cache directory, regardless of `use_cache`.
pub fn cache_status(config: &PipelineConfig) -> Result<Vec<CacheEntry>, EnrollmentError> {
    DiskCache::new(config.resolved_cache_dir()).entries()
}

/// Remove cached entries for one year, or every year. Returns how many were
/// removed.
pub fn clear_cache(config: &PipelineConfig, year: Option<u16>) -> Result<usize, EnrollmentError> {
    let removed = DiskCache::new(config.resolved_cache_dir()).clear(year)?;
    debug!("Removed {removed} cache entries");
    Ok(removed)
}
