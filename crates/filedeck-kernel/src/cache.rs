//! Preview cache and its invalidation.
//!
//! Previews themselves are produced elsewhere; the service only has to make
//! sure no cached variant outlives the file it was derived from.

use async_trait::async_trait;
use dashmap::DashMap;
use sha2::{Digest, Sha256};
use std::io;
use std::path::PathBuf;
use strum::{AsRefStr, Display, EnumString};

use crate::entry::Entry;
use crate::vfs::{VfsError, VfsResult};

/// Key/value store for derived artifacts.
#[async_trait]
pub trait FileCache: Send + Sync {
    async fn store(&self, key: &str, value: &[u8]) -> VfsResult<()>;

    /// `None` when nothing is stored under `key`.
    async fn load(&self, key: &str) -> VfsResult<Option<Vec<u8>>>;

    /// Remove `key`. Removing a missing key succeeds.
    async fn delete(&self, key: &str) -> VfsResult<()>;
}

/// Preview variants kept per source file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, EnumString, Display, AsRefStr)]
#[strum(serialize_all = "lowercase")]
pub enum PreviewSize {
    Thumb,
    Big,
}

impl PreviewSize {
    pub const ALL: [PreviewSize; 2] = [PreviewSize::Thumb, PreviewSize::Big];
}

/// Cache key for one preview variant of `entry`.
///
/// Derived from the backing location and modification time, so a file that
/// changes gets fresh keys.
pub fn preview_cache_key(entry: &Entry, size: PreviewSize) -> String {
    format!(
        "{}{:x}{}",
        hex::encode(entry.location()),
        entry.modified.timestamp(),
        hex::encode(size.as_ref())
    )
}

/// Delete every cached preview variant of `entry`.
pub async fn invalidate(cache: &dyn FileCache, entry: &Entry) -> VfsResult<()> {
    for size in PreviewSize::ALL {
        cache.delete(&preview_cache_key(entry, size)).await?;
    }
    tracing::debug!(path = %entry.path, "preview cache invalidated");
    Ok(())
}

/// In-process cache.
#[derive(Debug, Default)]
pub struct MemoryFileCache {
    entries: DashMap<String, Vec<u8>>,
}

impl MemoryFileCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[async_trait]
impl FileCache for MemoryFileCache {
    async fn store(&self, key: &str, value: &[u8]) -> VfsResult<()> {
        self.entries.insert(key.to_string(), value.to_vec());
        Ok(())
    }

    async fn load(&self, key: &str) -> VfsResult<Option<Vec<u8>>> {
        Ok(self.entries.get(key).map(|v| v.value().clone()))
    }

    async fn delete(&self, key: &str) -> VfsResult<()> {
        self.entries.remove(key);
        Ok(())
    }
}

/// One file per key under a cache directory.
///
/// Keys are hashed into a two-level fan-out: `<dir>/ab/abcdef...`.
#[derive(Debug, Clone)]
pub struct DiskFileCache {
    dir: PathBuf,
}

impl DiskFileCache {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    fn key_path(&self, key: &str) -> PathBuf {
        let hash = hex::encode(Sha256::digest(key.as_bytes()));
        self.dir.join(&hash[..2]).join(hash)
    }
}

#[async_trait]
impl FileCache for DiskFileCache {
    async fn store(&self, key: &str, value: &[u8]) -> VfsResult<()> {
        let path = self.key_path(key);
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(&path, value).await?;
        Ok(())
    }

    async fn load(&self, key: &str) -> VfsResult<Option<Vec<u8>>> {
        match tokio::fs::read(self.key_path(key)).await {
            Ok(data) => Ok(Some(data)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(VfsError::Io(e)),
        }
    }

    async fn delete(&self, key: &str) -> VfsResult<()> {
        match tokio::fs::remove_file(self.key_path(key)).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(VfsError::Io(e)),
        }
    }
}
