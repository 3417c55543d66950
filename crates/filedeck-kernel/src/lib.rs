//! # filedeck-kernel
//!
//! Core of the filedeck resource service.
//!
//! A single path-addressed namespace over two very different stores:
//! - each principal's real, mutable filesystem, reached through [`VfsOps`]
//! - a read-only virtual tree under `/virtual` synthesized from host logs
//!
//! [`ResourceService`] ties them together. Every mutation runs through the
//! audit [`HookRunner`], and anything destructive invalidates the preview
//! [`FileCache`] before it touches the disk.

pub mod cache;
pub mod conflict;
pub mod entry;
pub mod error;
pub mod fileutils;
pub mod hooks;
pub mod patch;
pub mod paths;
pub mod principal;
pub mod service;
pub mod usage;
pub mod vfs;
pub mod virtual_ns;

pub use cache::{
    DiskFileCache, FileCache, MemoryFileCache, PreviewSize, invalidate, preview_cache_key,
};
pub use entry::{ChecksumAlgo, Entry, EntryType, Listing, SortBy, Sorting};
pub use error::{ErrorKind, ResourceError, ResourceResult};
pub use hooks::{AuditSink, CommandSink, HookOutcome, HookRecord, HookRunner, TracingSink};
pub use patch::{PatchAction, PatchRequest};
pub use principal::{AccessCheck, Permissions, Principal, Rule, RuleMatcher};
pub use service::{CreateOutcome, ResourceService};
pub use usage::DiskUsage;
pub use vfs::{
    backends::{LocalBackend, MemoryBackend},
    DirEntry, FileAttr, FileType, StatFs, VfsError, VfsOps, VfsResult,
};
pub use virtual_ns::{LogLookup, VirtualConfig, VirtualNamespace, VirtualPath};
