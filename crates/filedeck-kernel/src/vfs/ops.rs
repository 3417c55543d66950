//! VFS operations trait.
//!
//! The tree interface the resource service consumes. Path-based (no
//! inodes), explicit offset/size for reads and writes.

use async_trait::async_trait;
use std::path::{Path, PathBuf};

use super::types::{DirEntry, FileAttr, StatFs};
use super::VfsResult;

/// Read chunk size used by the whole-file helpers.
pub const READ_CHUNK: u32 = 64 * 1024;

/// Core VFS operations trait.
///
/// Paths are relative to the backend's root; a leading `/` is accepted and
/// ignored, so service-level absolute paths can be passed straight through.
#[async_trait]
pub trait VfsOps: Send + Sync {
    // ========================================================================
    // Reading
    // ========================================================================

    /// Get file attributes. Symlinks are reported as symlinks, not followed.
    async fn getattr(&self, path: &Path) -> VfsResult<FileAttr>;

    /// Read directory entries, sorted by name.
    async fn readdir(&self, path: &Path) -> VfsResult<Vec<DirEntry>>;

    /// Read up to `size` bytes starting at `offset`.
    ///
    /// Returns fewer bytes if EOF is reached.
    async fn read(&self, path: &Path, offset: u64, size: u32) -> VfsResult<Vec<u8>>;

    // ========================================================================
    // Writing
    // ========================================================================

    /// Write `data` at `offset`. Returns the number of bytes written.
    async fn write(&self, path: &Path, offset: u64, data: &[u8]) -> VfsResult<u32>;

    /// Create a new, empty file. Missing parent directories are created.
    ///
    /// Fails with `AlreadyExists` if something is already at `path`.
    async fn create(&self, path: &Path, mode: u32) -> VfsResult<FileAttr>;

    /// Create a directory and any missing parents.
    ///
    /// Succeeds if the directory already exists.
    async fn mkdir(&self, path: &Path, mode: u32) -> VfsResult<FileAttr>;

    /// Remove a file.
    async fn unlink(&self, path: &Path) -> VfsResult<()>;

    /// Remove an empty directory.
    async fn rmdir(&self, path: &Path) -> VfsResult<()>;

    /// Rename a file or directory, replacing the destination if the
    /// backend's native rename does.
    async fn rename(&self, from: &Path, to: &Path) -> VfsResult<()>;

    /// Truncate a file to the specified size.
    async fn truncate(&self, path: &Path, size: u64) -> VfsResult<()>;

    // ========================================================================
    // Metadata
    // ========================================================================

    /// Returns true if this filesystem is read-only.
    fn read_only(&self) -> bool;

    /// Get filesystem statistics for the backend as a whole.
    async fn statfs(&self) -> VfsResult<StatFs>;

    /// Get filesystem statistics for the storage backing `path`.
    ///
    /// Backends that can straddle several devices override this.
    async fn statfs_at(&self, path: &Path) -> VfsResult<StatFs> {
        let _ = path;
        self.statfs().await
    }

    /// Host path backing `path`, if the backend has one.
    async fn real_path(&self, path: &Path) -> VfsResult<Option<PathBuf>> {
        let _ = path;
        Ok(None)
    }

    // ========================================================================
    // Convenience methods (default implementations)
    // ========================================================================

    /// Check if a path exists.
    async fn exists(&self, path: &Path) -> bool {
        self.getattr(path).await.is_ok()
    }

    /// Read entire file contents, chunk by chunk.
    async fn read_all(&self, path: &Path) -> VfsResult<Vec<u8>> {
        let attr = self.getattr(path).await?;
        let mut out = Vec::with_capacity(attr.size as usize);
        loop {
            let chunk = self.read(path, out.len() as u64, READ_CHUNK).await?;
            if chunk.is_empty() {
                break;
            }
            out.extend_from_slice(&chunk);
        }
        Ok(out)
    }

    /// Write entire file contents, truncating or creating as needed.
    async fn write_all(&self, path: &Path, data: &[u8]) -> VfsResult<()> {
        if self.exists(path).await {
            self.truncate(path, 0).await?;
        } else {
            self.create(path, 0o644).await?;
        }
        self.write(path, 0, data).await?;
        Ok(())
    }

    /// Remove a file or a whole directory tree.
    ///
    /// A missing path is not an error.
    async fn remove_all(&self, path: &Path) -> VfsResult<()> {
        let attr = match self.getattr(path).await {
            Ok(attr) => attr,
            Err(e) if e.is_not_found() => return Ok(()),
            Err(e) => return Err(e),
        };
        if !attr.is_dir() {
            return self.unlink(path).await;
        }

        // Depth-first with an explicit stack; async recursion would need boxing.
        let mut pending = vec![(path.to_path_buf(), false)];
        while let Some((dir, visited)) = pending.pop() {
            if visited {
                self.rmdir(&dir).await?;
                continue;
            }
            pending.push((dir.clone(), true));
            for child in self.readdir(&dir).await? {
                let child_path = dir.join(&child.name);
                if child.kind.is_dir() {
                    pending.push((child_path, false));
                } else {
                    self.unlink(&child_path).await?;
                }
            }
        }
        Ok(())
    }
}
