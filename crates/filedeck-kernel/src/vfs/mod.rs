//! Virtual Filesystem abstraction.
//!
//! The resource service never talks to the disk directly; it goes through
//! [`VfsOps`], which every principal gets a scoped handle to.
//!
//! - [`VfsOps`] - Core trait for filesystem operations
//! - [`MemoryBackend`] - In-memory filesystem (testing, scratch space)
//! - [`LocalBackend`] - Local filesystem access (with path security)
//!
//! ## Design Decisions
//!
//! - **Path-based, no inodes**: Operations use paths, not inode numbers.
//! - **Explicit offset/size**: Read/write take offset and size so large
//!   uploads and checksums can stream without holding whole files.

pub mod backends;
mod error;
mod ops;
mod types;

pub use backends::{LocalBackend, MemoryBackend};
pub use error::{VfsError, VfsResult};
pub use ops::{READ_CHUNK, VfsOps};
pub use types::{DirEntry, FileAttr, FileType, StatFs};
