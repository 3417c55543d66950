//! Local filesystem backend.
//!
//! Provides access to real filesystem paths, with path security
//! to prevent escaping the root directory.

use async_trait::async_trait;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use tokio::fs;

use super::normalize;
use crate::vfs::error::{VfsError, VfsResult};
use crate::vfs::ops::VfsOps;
use crate::vfs::types::{DirEntry, FileAttr, FileType, StatFs};

/// Local filesystem backend.
///
/// All operations are relative to `root`. For example, if `root` is
/// `/srv/files/alice`, then `read("docs/a.txt")` reads
/// `/srv/files/alice/docs/a.txt`.
///
/// Path security is enforced: `..` is resolved lexically before touching the
/// disk, and symlinks that lead outside the root are rejected.
#[derive(Debug, Clone)]
pub struct LocalBackend {
    root: PathBuf,
    read_only: bool,
}

impl LocalBackend {
    /// Create a new local filesystem rooted at the given path.
    ///
    /// The root is canonicalized at construction time to handle symlinks
    /// (e.g. macOS `/tmp` → `/private/tmp`).
    pub fn new(root: impl Into<PathBuf>) -> Self {
        let root: PathBuf = root.into();
        let root = dunce::canonicalize(&root).unwrap_or(root);
        Self {
            root,
            read_only: false,
        }
    }

    /// Create a read-only local filesystem.
    pub fn read_only(root: impl Into<PathBuf>) -> Self {
        Self {
            read_only: true,
            ..Self::new(root)
        }
    }

    /// Set whether this filesystem is read-only.
    pub fn set_read_only(&mut self, read_only: bool) {
        self.read_only = read_only;
    }

    /// Get the root path.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Resolve a relative path to an absolute path within the root.
    ///
    /// Returns an error if the path escapes the root through a symlink.
    fn resolve(&self, path: &Path) -> VfsResult<PathBuf> {
        let relative = normalize(path);
        if relative.as_os_str().is_empty() {
            return Ok(self.root.clone());
        }

        let full = self.root.join(&relative);

        let (Some(parent), Some(filename)) = (full.parent(), full.file_name()) else {
            return Err(VfsError::invalid_path(path.display().to_string()));
        };

        // Canonicalize the deepest ancestor that is actually on disk and
        // append the missing components, which cannot be links yet. The leaf
        // itself is never followed: getattr reports it, unlink removes it.
        // `symlink_metadata` keeps a dangling link in the existing part, so
        // it fails canonicalization instead of being created through.
        let mut existing = parent;
        let mut missing = Vec::new();
        while std::fs::symlink_metadata(existing).is_err() {
            match (existing.parent(), existing.file_name()) {
                (Some(up), Some(name)) => {
                    missing.push(name);
                    existing = up;
                }
                _ => break,
            }
        }
        let mut canonical = dunce::canonicalize(existing)?;
        canonical.extend(missing.iter().rev());
        canonical.push(filename);

        if !canonical.starts_with(&self.root) {
            return Err(VfsError::path_escapes_root(format!(
                "{} is not under {}",
                canonical.display(),
                self.root.display()
            )));
        }

        Ok(canonical)
    }

    /// Check if write operations are allowed.
    fn check_writable(&self) -> VfsResult<()> {
        if self.read_only {
            Err(VfsError::ReadOnly)
        } else {
            Ok(())
        }
    }

    /// Convert std::fs::Metadata to FileAttr.
    fn metadata_to_attr(meta: &std::fs::Metadata) -> FileAttr {
        let kind = if meta.is_dir() {
            FileType::Directory
        } else if meta.file_type().is_symlink() {
            FileType::Symlink
        } else {
            FileType::File
        };

        FileAttr {
            size: meta.len(),
            kind,
            perm: meta.permissions().mode(),
            mtime: meta.modified().unwrap_or(std::time::SystemTime::UNIX_EPOCH),
        }
    }

    /// Map EXDEV to [`VfsError::CrossDeviceLink`] so callers can fall back
    /// to copy + remove.
    fn rename_error(err: std::io::Error) -> VfsError {
        if err.raw_os_error() == Some(rustix::io::Errno::XDEV.raw_os_error()) {
            VfsError::CrossDeviceLink
        } else {
            VfsError::Io(err)
        }
    }
}

#[async_trait]
impl VfsOps for LocalBackend {
    async fn getattr(&self, path: &Path) -> VfsResult<FileAttr> {
        let full_path = self.resolve(path)?;
        let meta = fs::symlink_metadata(&full_path).await?;
        Ok(Self::metadata_to_attr(&meta))
    }

    async fn readdir(&self, path: &Path) -> VfsResult<Vec<DirEntry>> {
        let full_path = self.resolve(path)?;
        let mut entries = Vec::new();
        let mut dir = fs::read_dir(&full_path).await?;

        while let Some(entry) = dir.next_entry().await? {
            let file_type = entry.file_type().await?;
            let kind = if file_type.is_dir() {
                FileType::Directory
            } else if file_type.is_symlink() {
                FileType::Symlink
            } else {
                FileType::File
            };

            entries.push(DirEntry {
                name: entry.file_name().to_string_lossy().into_owned(),
                kind,
            });
        }

        entries.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(entries)
    }

    async fn read(&self, path: &Path, offset: u64, size: u32) -> VfsResult<Vec<u8>> {
        use tokio::io::{AsyncReadExt, AsyncSeekExt};

        let full_path = self.resolve(path)?;
        let mut file = fs::File::open(&full_path).await?;
        file.seek(std::io::SeekFrom::Start(offset)).await?;

        // `take` + `read_to_end` so a short read from the OS doesn't look like EOF.
        let mut buffer = Vec::with_capacity(size as usize);
        file.take(size as u64).read_to_end(&mut buffer).await?;
        Ok(buffer)
    }

    async fn write(&self, path: &Path, offset: u64, data: &[u8]) -> VfsResult<u32> {
        use tokio::io::{AsyncSeekExt, AsyncWriteExt};

        self.check_writable()?;
        let full_path = self.resolve(path)?;

        let mut file = fs::OpenOptions::new().write(true).open(&full_path).await?;
        file.seek(std::io::SeekFrom::Start(offset)).await?;
        file.write_all(data).await?;
        file.flush().await?;

        Ok(data.len() as u32)
    }

    async fn create(&self, path: &Path, mode: u32) -> VfsResult<FileAttr> {
        use std::os::unix::fs::OpenOptionsExt;

        self.check_writable()?;
        let full_path = self.resolve(path)?;

        if let Some(parent) = full_path.parent() {
            fs::create_dir_all(parent).await?;
        }

        let file = std::fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .mode(mode)
            .open(&full_path)?;

        let meta = file.metadata()?;
        Ok(Self::metadata_to_attr(&meta))
    }

    async fn mkdir(&self, path: &Path, mode: u32) -> VfsResult<FileAttr> {
        use std::os::unix::fs::DirBuilderExt;

        self.check_writable()?;
        let full_path = self.resolve(path)?;

        std::fs::DirBuilder::new()
            .mode(mode)
            .recursive(true)
            .create(&full_path)?;

        let meta = fs::metadata(&full_path).await?;
        Ok(Self::metadata_to_attr(&meta))
    }

    async fn unlink(&self, path: &Path) -> VfsResult<()> {
        self.check_writable()?;
        let full_path = self.resolve(path)?;
        Ok(fs::remove_file(&full_path).await?)
    }

    async fn rmdir(&self, path: &Path) -> VfsResult<()> {
        self.check_writable()?;
        let full_path = self.resolve(path)?;
        if full_path == self.root {
            return Err(VfsError::permission_denied("cannot remove root"));
        }
        Ok(fs::remove_dir(&full_path).await?)
    }

    async fn rename(&self, from: &Path, to: &Path) -> VfsResult<()> {
        self.check_writable()?;
        let from_path = self.resolve(from)?;
        let to_path = self.resolve(to)?;

        if let Some(parent) = to_path.parent() {
            fs::create_dir_all(parent).await?;
        }

        fs::rename(&from_path, &to_path)
            .await
            .map_err(Self::rename_error)
    }

    async fn truncate(&self, path: &Path, size: u64) -> VfsResult<()> {
        self.check_writable()?;
        let full_path = self.resolve(path)?;

        let file = fs::OpenOptions::new().write(true).open(&full_path).await?;
        Ok(file.set_len(size).await?)
    }

    fn read_only(&self) -> bool {
        self.read_only
    }

    async fn statfs(&self) -> VfsResult<StatFs> {
        self.statfs_at(Path::new("")).await
    }

    async fn statfs_at(&self, path: &Path) -> VfsResult<StatFs> {
        use rustix::fs::statvfs;

        let full_path = self.resolve(path)?;
        let stat = statvfs(&full_path).map_err(|e| VfsError::Io(e.into()))?;

        Ok(StatFs {
            blocks: stat.f_blocks,
            bfree: stat.f_bfree,
            bavail: stat.f_bavail,
            frsize: stat.f_frsize as u32,
        })
    }

    async fn real_path(&self, path: &Path) -> VfsResult<Option<PathBuf>> {
        let full = self.resolve(path)?;
        let canonical = dunce::canonicalize(&full)?;

        if !canonical.starts_with(&self.root) {
            return Err(VfsError::PermissionDenied(format!(
                "path escapes mount root: {}",
                path.display()
            )));
        }

        Ok(Some(canonical))
    }

    async fn remove_all(&self, path: &Path) -> VfsResult<()> {
        self.check_writable()?;
        let full_path = self.resolve(path)?;
        if full_path == self.root {
            return Err(VfsError::permission_denied("cannot remove root"));
        }

        let meta = match fs::symlink_metadata(&full_path).await {
            Ok(meta) => meta,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(()),
            Err(e) => return Err(e.into()),
        };

        if meta.is_dir() {
            fs::remove_dir_all(&full_path).await?;
        } else {
            fs::remove_file(&full_path).await?;
        }
        Ok(())
    }
}
