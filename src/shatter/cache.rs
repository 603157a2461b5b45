//! Persistent memoisation of shatter patterns
//!
//! Patterns are keyed by a SHA-256 digest of `"{width}_{height}_{num_pieces}_{seed}"`
//! and stored one file per key. The cache never changes what would have been
//! computed directly: a hit returns exactly the pattern the partitioner would
//! produce for the same inputs.
//!
//! The directory store has no eviction and grows with every distinct key. An
//! optional in-memory LRU layer bounds how many decoded patterns stay resident.

use crate::io::configuration::CACHE_FILE_EXTENSION;
use crate::io::error::{Result, ShatterError, file_system_error};
use crate::spatial::partition::create_shatter_pattern;
use crate::spatial::pattern::ShatterPattern;
use lru::LruCache;
use ndarray::Array2;
use sha2::{Digest, Sha256};
use std::num::NonZeroUsize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

const MAGIC: &[u8; 4] = b"SHPT";
const FORMAT_VERSION: u8 = 1;
const HEADER_LEN: usize = 4 + 1 + 4 * 8;
const DIGEST_LEN: usize = 32;
const DEFAULT_MEMORY_ENTRIES: usize = 32;

static TEMP_SEQUENCE: AtomicUsize = AtomicUsize::new(0);

/// Scalar inputs that fully determine a pattern
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct CacheKey {
    /// Image width in pixels
    pub width: usize,
    /// Image height in pixels
    pub height: usize,
    /// Number of regions
    pub num_pieces: usize,
    /// Partitioner seed
    pub seed: u64,
}

impl CacheKey {
    /// Key for the given partition inputs
    pub const fn new(width: usize, height: usize, num_pieces: usize, seed: u64) -> Self {
        Self {
            width,
            height,
            num_pieces,
            seed,
        }
    }

    /// Hex SHA-256 of the underscore-joined decimal inputs
    pub fn digest(&self) -> String {
        let key_string = format!(
            "{}_{}_{}_{}",
            self.width, self.height, self.num_pieces, self.seed
        );
        format!("{:x}", Sha256::digest(key_string.as_bytes()))
    }
}

/// Capacity choices for the pattern cache
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CachePolicy {
    /// Decoded patterns kept in memory, `None` disables the memory layer
    pub memory_entries: Option<NonZeroUsize>,
}

impl Default for CachePolicy {
    fn default() -> Self {
        Self {
            memory_entries: NonZeroUsize::new(DEFAULT_MEMORY_ENTRIES),
        }
    }
}

/// Performance metrics for cache effectiveness
#[derive(Default, Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheStats {
    /// Lookups served from memory or disk
    pub hits: usize,
    /// Lookups that ran the partitioner
    pub misses: usize,
    /// Stored entries rejected and regenerated
    pub corrupt: usize,
}

/// Anything that can hand out shatter patterns
pub trait PatternSource {
    /// Pattern for an image of `width × height` split into `num_pieces` regions
    ///
    /// # Errors
    ///
    /// Returns an error if the inputs are invalid or the pattern cannot be
    /// produced or persisted
    fn pattern(
        &mut self,
        width: usize,
        height: usize,
        num_pieces: usize,
        seed: Option<u64>,
    ) -> Result<Arc<ShatterPattern>>;
}

/// Pattern source that always runs the partitioner
#[derive(Debug, Default, Clone, Copy)]
pub struct DirectPatterns;

impl PatternSource for DirectPatterns {
    fn pattern(
        &mut self,
        width: usize,
        height: usize,
        num_pieces: usize,
        seed: Option<u64>,
    ) -> Result<Arc<ShatterPattern>> {
        create_shatter_pattern(width, height, num_pieces, seed).map(Arc::new)
    }
}

/// Directory-backed pattern cache with an optional in-memory LRU layer
pub struct PatternCache {
    directory: PathBuf,
    memory: Option<LruCache<CacheKey, Arc<ShatterPattern>>>,
    /// Cache performance statistics
    pub stats: CacheStats,
}

impl PatternCache {
    /// Open (creating if needed) a cache rooted at `directory`
    ///
    /// # Errors
    ///
    /// Returns an error if the directory cannot be created
    pub fn open(directory: impl Into<PathBuf>, policy: CachePolicy) -> Result<Self> {
        let directory = directory.into();
        std::fs::create_dir_all(&directory)
            .map_err(|e| file_system_error(&directory, "create cache directory", e))?;

        Ok(Self {
            directory,
            memory: policy.memory_entries.map(LruCache::new),
            stats: CacheStats::default(),
        })
    }

    /// Root directory of the on-disk store
    pub fn directory(&self) -> &Path {
        &self.directory
    }

    /// File that holds (or would hold) the pattern for `key`
    pub fn entry_path(&self, key: &CacheKey) -> PathBuf {
        self.directory
            .join(format!("{}.{CACHE_FILE_EXTENSION}", key.digest()))
    }

    /// Return the stored pattern for these inputs, computing and storing it on a miss
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The inputs fail partitioner validation
    /// - The cache file exists but cannot be read
    /// - A freshly computed pattern cannot be written
    pub fn get_or_create(
        &mut self,
        width: usize,
        height: usize,
        num_pieces: usize,
        seed: u64,
    ) -> Result<Arc<ShatterPattern>> {
        let key = CacheKey::new(width, height, num_pieces, seed);

        if let Some(pattern) = self.memory.as_mut().and_then(|m| m.get(&key)).cloned() {
            self.stats.hits += 1;
            return Ok(pattern);
        }

        let path = self.entry_path(&key);
        match self.load(&key, &path) {
            Ok(Some(pattern)) => {
                self.stats.hits += 1;
                tracing::debug!(path = %path.display(), "pattern cache hit");
                return Ok(self.remember(key, pattern));
            }
            Ok(None) => {}
            Err(ShatterError::CacheCorruption { reason, .. }) => {
                self.stats.corrupt += 1;
                tracing::warn!(path = %path.display(), %reason, "discarding corrupt pattern cache entry");
            }
            Err(other) => return Err(other),
        }

        self.stats.misses += 1;
        let pattern = create_shatter_pattern(width, height, num_pieces, Some(seed))?;
        self.store(&key, &pattern, &path)?;
        tracing::debug!(path = %path.display(), "pattern cache miss, stored");
        Ok(self.remember(key, pattern))
    }

    fn remember(&mut self, key: CacheKey, pattern: ShatterPattern) -> Arc<ShatterPattern> {
        let shared = Arc::new(pattern);
        if let Some(memory) = self.memory.as_mut() {
            memory.put(key, Arc::clone(&shared));
        }
        shared
    }

    fn load(&self, key: &CacheKey, path: &Path) -> Result<Option<ShatterPattern>> {
        let bytes = match std::fs::read(path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(file_system_error(path, "read cache entry", e)),
        };

        let (stored_key, pattern) = decode_pattern(&bytes, path)?;
        if stored_key != *key {
            return Err(ShatterError::CacheCorruption {
                path: path.to_path_buf(),
                reason: format!("entry holds {stored_key:?}, expected {key:?}"),
            });
        }
        Ok(Some(pattern))
    }

    fn store(&self, key: &CacheKey, pattern: &ShatterPattern, path: &Path) -> Result<()> {
        let bytes = encode_pattern(pattern, key.seed);
        // Every writer gets its own temp file, even between threads of one process
        let temp_path = path.with_extension(format!(
            "{CACHE_FILE_EXTENSION}.{}.{}.tmp",
            std::process::id(),
            TEMP_SEQUENCE.fetch_add(1, Ordering::Relaxed)
        ));
        std::fs::write(&temp_path, bytes)
            .map_err(|e| file_system_error(&temp_path, "write cache entry", e))?;
        // Rename is atomic, so a concurrent writer of the same key just replaces an equal file
        std::fs::rename(&temp_path, path)
            .map_err(|e| file_system_error(path, "publish cache entry", e))
    }
}

impl PatternSource for PatternCache {
    fn pattern(
        &mut self,
        width: usize,
        height: usize,
        num_pieces: usize,
        seed: Option<u64>,
    ) -> Result<Arc<ShatterPattern>> {
        match seed {
            Some(seed) => self.get_or_create(width, height, num_pieces, seed),
            None => DirectPatterns.pattern(width, height, num_pieces, None),
        }
    }
}

/// Serialise a pattern together with the seed that produced it
pub fn encode_pattern(pattern: &ShatterPattern, seed: u64) -> Vec<u8> {
    let mut bytes =
        Vec::with_capacity(HEADER_LEN + pattern.region_map().len() * 4 + DIGEST_LEN);
    bytes.extend_from_slice(MAGIC);
    bytes.push(FORMAT_VERSION);
    for value in [
        pattern.width() as u64,
        pattern.height() as u64,
        pattern.num_pieces() as u64,
        seed,
    ] {
        bytes.extend_from_slice(&value.to_le_bytes());
    }
    for &id in pattern.region_map() {
        bytes.extend_from_slice(&id.to_le_bytes());
    }
    let digest = Sha256::digest(&bytes);
    bytes.extend_from_slice(&digest);
    bytes
}

fn read_u64(bytes: &[u8], offset: usize) -> Option<u64> {
    let raw: [u8; 8] = bytes.get(offset..offset + 8)?.try_into().ok()?;
    Some(u64::from_le_bytes(raw))
}

/// Parse bytes written by [`encode_pattern`], verifying the trailing digest
///
/// # Errors
///
/// Returns `CacheCorruption` naming `path` if the bytes are truncated, carry a
/// bad checksum, magic or version, or describe an invalid pattern
pub fn decode_pattern(bytes: &[u8], path: &Path) -> Result<(CacheKey, ShatterPattern)> {
    let corrupt = |reason: String| ShatterError::CacheCorruption {
        path: path.to_path_buf(),
        reason,
    };

    if bytes.len() < HEADER_LEN + DIGEST_LEN {
        return Err(corrupt(format!("truncated entry of {} bytes", bytes.len())));
    }
    let (body, digest) = bytes.split_at(bytes.len() - DIGEST_LEN);
    if Sha256::digest(body).as_slice() != digest {
        return Err(corrupt("checksum mismatch".to_string()));
    }
    if body.get(..4) != Some(MAGIC.as_slice()) {
        return Err(corrupt("bad magic".to_string()));
    }
    if body.get(4).copied() != Some(FORMAT_VERSION) {
        return Err(corrupt(format!("unsupported version {:?}", body.get(4))));
    }

    let field = |index: usize| -> Result<u64> {
        read_u64(body, 5 + index * 8).ok_or_else(|| corrupt("truncated header".to_string()))
    };
    let to_usize = |value: u64| -> Result<usize> {
        usize::try_from(value).map_err(|e| corrupt(e.to_string()))
    };
    let width = to_usize(field(0)?)?;
    let height = to_usize(field(1)?)?;
    let num_pieces = to_usize(field(2)?)?;
    let seed = field(3)?;

    let payload = body.get(HEADER_LEN..).unwrap_or(&[]);
    let expected = width
        .checked_mul(height)
        .and_then(|pixels| pixels.checked_mul(4))
        .ok_or_else(|| corrupt("dimensions overflow".to_string()))?;
    if payload.len() != expected {
        return Err(corrupt(format!(
            "region map holds {} bytes, expected {expected}",
            payload.len()
        )));
    }

    let ids: Vec<u32> = payload
        .chunks_exact(4)
        .map(|chunk| <[u8; 4]>::try_from(chunk).map_or(0, u32::from_le_bytes))
        .collect();
    let region_map =
        Array2::from_shape_vec((height, width), ids).map_err(|e| corrupt(e.to_string()))?;
    let pattern =
        ShatterPattern::new(region_map, num_pieces).map_err(|e| corrupt(e.to_string()))?;

    Ok((CacheKey::new(width, height, num_pieces, seed), pattern))
}
