//! In-memory filesystem backend.
//!
//! Used for testing and scratch scopes. All data is ephemeral.

use async_trait::async_trait;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::RwLock;
use std::time::SystemTime;

use super::normalize;
use crate::vfs::error::{VfsError, VfsResult};
use crate::vfs::ops::VfsOps;
use crate::vfs::types::{DirEntry, FileAttr, FileType, StatFs};

/// Node in the memory filesystem.
#[derive(Debug, Clone)]
enum Node {
    File { data: Vec<u8>, attr: FileAttr },
    Directory { attr: FileAttr },
}

impl Node {
    fn attr(&self) -> &FileAttr {
        match self {
            Node::File { attr, .. } => attr,
            Node::Directory { attr } => attr,
        }
    }

    fn kind(&self) -> FileType {
        match self {
            Node::File { .. } => FileType::File,
            Node::Directory { .. } => FileType::Directory,
        }
    }
}

/// In-memory filesystem backend.
///
/// Thread-safe via internal `RwLock`. All data is lost when dropped.
#[derive(Debug)]
pub struct MemoryBackend {
    nodes: RwLock<HashMap<PathBuf, Node>>,
    stats: StatFs,
}

impl Default for MemoryBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryBackend {
    /// Create a new empty in-memory filesystem.
    pub fn new() -> Self {
        let mut nodes = HashMap::new();
        // Root directory always exists
        nodes.insert(
            PathBuf::new(),
            Node::Directory {
                attr: FileAttr::directory(0o755),
            },
        );
        Self {
            nodes: RwLock::new(nodes),
            stats: StatFs::default(),
        }
    }

    /// Report these statistics from `statfs`.
    pub fn with_statfs(mut self, stats: StatFs) -> Self {
        self.stats = stats;
        self
    }

    fn read_nodes(
        &self,
    ) -> VfsResult<std::sync::RwLockReadGuard<'_, HashMap<PathBuf, Node>>> {
        self.nodes.read().map_err(|_| VfsError::other("lock poisoned"))
    }

    fn write_nodes(
        &self,
    ) -> VfsResult<std::sync::RwLockWriteGuard<'_, HashMap<PathBuf, Node>>> {
        self.nodes.write().map_err(|_| VfsError::other("lock poisoned"))
    }

    /// Ensure all parent directories exist.
    fn ensure_parents(nodes: &mut HashMap<PathBuf, Node>, path: &Path) -> VfsResult<()> {
        let mut current = PathBuf::new();
        for component in path.parent().into_iter().flat_map(|p| p.components()) {
            current.push(component);
            match nodes.get(&current) {
                Some(Node::Directory { .. }) => {}
                Some(Node::File { .. }) => {
                    return Err(VfsError::not_a_directory(Self::path_str(&current)));
                }
                None => {
                    nodes.insert(
                        current.clone(),
                        Node::Directory {
                            attr: FileAttr::directory(0o755),
                        },
                    );
                }
            }
        }
        Ok(())
    }

    /// Get the path string for error messages.
    fn path_str(path: &Path) -> String {
        format!("/{}", path.display())
    }
}

#[async_trait]
impl VfsOps for MemoryBackend {
    async fn getattr(&self, path: &Path) -> VfsResult<FileAttr> {
        let normalized = normalize(path);
        let nodes = self.read_nodes()?;

        nodes
            .get(&normalized)
            .map(|n| n.attr().clone())
            .ok_or_else(|| VfsError::not_found(Self::path_str(&normalized)))
    }

    async fn readdir(&self, path: &Path) -> VfsResult<Vec<DirEntry>> {
        let normalized = normalize(path);
        let nodes = self.read_nodes()?;

        match nodes.get(&normalized) {
            Some(Node::Directory { .. }) => {}
            Some(_) => return Err(VfsError::not_a_directory(Self::path_str(&normalized))),
            None => return Err(VfsError::not_found(Self::path_str(&normalized))),
        }

        let mut result: Vec<DirEntry> = nodes
            .iter()
            .filter(|(p, _)| p.parent() == Some(normalized.as_path()))
            .filter_map(|(p, node)| {
                p.file_name()
                    .map(|name| DirEntry::new(name.to_string_lossy(), node.kind()))
            })
            .collect();

        // Sort for consistent ordering
        result.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(result)
    }

    async fn read(&self, path: &Path, offset: u64, size: u32) -> VfsResult<Vec<u8>> {
        let normalized = normalize(path);
        let nodes = self.read_nodes()?;

        match nodes.get(&normalized) {
            Some(Node::File { data, .. }) => {
                let start = (offset as usize).min(data.len());
                let end = start.saturating_add(size as usize).min(data.len());
                Ok(data[start..end].to_vec())
            }
            Some(Node::Directory { .. }) => {
                Err(VfsError::is_a_directory(Self::path_str(&normalized)))
            }
            None => Err(VfsError::not_found(Self::path_str(&normalized))),
        }
    }

    async fn write(&self, path: &Path, offset: u64, data: &[u8]) -> VfsResult<u32> {
        let normalized = normalize(path);
        let mut nodes = self.write_nodes()?;

        match nodes.get_mut(&normalized) {
            Some(Node::File {
                data: file_data,
                attr,
            }) => {
                let offset = offset as usize;
                // Extend if necessary
                if offset + data.len() > file_data.len() {
                    file_data.resize(offset + data.len(), 0);
                }
                file_data[offset..offset + data.len()].copy_from_slice(data);
                attr.size = file_data.len() as u64;
                attr.mtime = SystemTime::now();
                Ok(data.len() as u32)
            }
            Some(Node::Directory { .. }) => {
                Err(VfsError::is_a_directory(Self::path_str(&normalized)))
            }
            None => Err(VfsError::not_found(Self::path_str(&normalized))),
        }
    }

    async fn create(&self, path: &Path, mode: u32) -> VfsResult<FileAttr> {
        let normalized = normalize(path);
        if normalized.as_os_str().is_empty() {
            return Err(VfsError::already_exists("/"));
        }

        let mut nodes = self.write_nodes()?;
        Self::ensure_parents(&mut nodes, &normalized)?;

        if nodes.contains_key(&normalized) {
            return Err(VfsError::already_exists(Self::path_str(&normalized)));
        }

        let attr = FileAttr::file(0, mode);
        nodes.insert(
            normalized,
            Node::File {
                data: Vec::new(),
                attr: attr.clone(),
            },
        );
        Ok(attr)
    }

    async fn mkdir(&self, path: &Path, mode: u32) -> VfsResult<FileAttr> {
        let normalized = normalize(path);
        let mut nodes = self.write_nodes()?;
        Self::ensure_parents(&mut nodes, &normalized)?;

        if let Some(existing) = nodes.get(&normalized) {
            return match existing {
                Node::Directory { attr } => Ok(attr.clone()),
                Node::File { .. } => Err(VfsError::already_exists(Self::path_str(&normalized))),
            };
        }

        let attr = FileAttr::directory(mode);
        nodes.insert(normalized, Node::Directory { attr: attr.clone() });
        Ok(attr)
    }

    async fn unlink(&self, path: &Path) -> VfsResult<()> {
        let normalized = normalize(path);
        let mut nodes = self.write_nodes()?;

        match nodes.get(&normalized) {
            Some(Node::Directory { .. }) => {
                Err(VfsError::is_a_directory(Self::path_str(&normalized)))
            }
            Some(Node::File { .. }) => {
                nodes.remove(&normalized);
                Ok(())
            }
            None => Err(VfsError::not_found(Self::path_str(&normalized))),
        }
    }

    async fn rmdir(&self, path: &Path) -> VfsResult<()> {
        let normalized = normalize(path);
        if normalized.as_os_str().is_empty() {
            return Err(VfsError::permission_denied("cannot remove root"));
        }

        let mut nodes = self.write_nodes()?;
        match nodes.get(&normalized) {
            Some(Node::Directory { .. }) => {}
            Some(_) => return Err(VfsError::not_a_directory(Self::path_str(&normalized))),
            None => return Err(VfsError::not_found(Self::path_str(&normalized))),
        }

        if nodes.keys().any(|k| k.parent() == Some(normalized.as_path())) {
            return Err(VfsError::directory_not_empty(Self::path_str(&normalized)));
        }

        nodes.remove(&normalized);
        Ok(())
    }

    async fn rename(&self, from: &Path, to: &Path) -> VfsResult<()> {
        let from_normalized = normalize(from);
        let to_normalized = normalize(to);

        if from_normalized == to_normalized {
            return Ok(());
        }
        if from_normalized.as_os_str().is_empty() {
            return Err(VfsError::permission_denied("cannot move root"));
        }
        if to_normalized.starts_with(&from_normalized) {
            return Err(VfsError::invalid_path(format!(
                "cannot move {} into itself",
                Self::path_str(&from_normalized)
            )));
        }

        let mut nodes = self.write_nodes()?;
        if !nodes.contains_key(&from_normalized) {
            return Err(VfsError::not_found(Self::path_str(&from_normalized)));
        }
        Self::ensure_parents(&mut nodes, &to_normalized)?;

        // Replace whatever was at the destination, then carry the subtree over.
        let stale: Vec<_> = nodes
            .keys()
            .filter(|k| k.starts_with(&to_normalized))
            .cloned()
            .collect();
        for key in stale {
            nodes.remove(&key);
        }

        let moved: Vec<_> = nodes
            .keys()
            .filter(|k| k.starts_with(&from_normalized))
            .cloned()
            .collect();
        for old in moved {
            if let Some(node) = nodes.remove(&old) {
                let relative = old.strip_prefix(&from_normalized).unwrap_or(Path::new(""));
                nodes.insert(to_normalized.join(relative), node);
            }
        }
        Ok(())
    }

    async fn truncate(&self, path: &Path, size: u64) -> VfsResult<()> {
        let normalized = normalize(path);
        let mut nodes = self.write_nodes()?;

        match nodes.get_mut(&normalized) {
            Some(Node::File { data, attr }) => {
                data.resize(size as usize, 0);
                attr.size = size;
                attr.mtime = SystemTime::now();
                Ok(())
            }
            Some(Node::Directory { .. }) => {
                Err(VfsError::is_a_directory(Self::path_str(&normalized)))
            }
            None => Err(VfsError::not_found(Self::path_str(&normalized))),
        }
    }

    fn read_only(&self) -> bool {
        false
    }

    async fn statfs(&self) -> VfsResult<StatFs> {
        Ok(self.stats.clone())
    }

    async fn remove_all(&self, path: &Path) -> VfsResult<()> {
        let normalized = normalize(path);
        if normalized.as_os_str().is_empty() {
            return Err(VfsError::permission_denied("cannot remove root"));
        }

        let mut nodes = self.write_nodes()?;
        nodes.retain(|k, _| !k.starts_with(&normalized));
        Ok(())
    }
}
