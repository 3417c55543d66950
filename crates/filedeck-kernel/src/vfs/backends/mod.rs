//! VFS backends.
//!
//! Backends implement [`VfsOps`](super::VfsOps) for different storage types.

mod local;
mod memory;

use std::path::{Component, Path, PathBuf};

pub use local::LocalBackend;
pub use memory::MemoryBackend;

/// Normalize a path: remove leading `/`, resolve `.` and `..` lexically.
///
/// `..` at the top is dropped, so the result never climbs above the root.
pub(crate) fn normalize(path: &Path) -> PathBuf {
    let mut result = PathBuf::new();
    for component in path.components() {
        match component {
            Component::RootDir | Component::CurDir | Component::Prefix(_) => {}
            Component::ParentDir => {
                result.pop();
            }
            Component::Normal(s) => {
                result.push(s);
            }
        }
    }
    result
}
