//! Resource CRUD over a principal's filesystem and the virtual namespace.

use bytes::Bytes;
use futures::Stream;
use std::path::Path;
use std::sync::Arc;

use crate::cache::{self, FileCache};
use crate::entry::{self, ChecksumAlgo, Entry, ResolveOptions};
use crate::error::{ResourceError, ResourceResult};
use crate::fileutils;
use crate::hooks::{HookRecord, HookRunner};
use crate::paths;
use crate::principal::{AccessCheck, Principal};
use crate::virtual_ns::{LogLookup, VirtualNamespace};

/// Result of a successful create.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CreateOutcome {
    Directory,
    File { etag: String },
}

/// Entry point for every resource operation.
///
/// Cheap to share behind an `Arc`; holds no per-request state.
pub struct ResourceService {
    pub(crate) cache: Arc<dyn FileCache>,
    pub(crate) hooks: HookRunner,
    pub(crate) virtual_ns: VirtualNamespace,
    type_detection_by_header: bool,
}

impl ResourceService {
    pub fn new(cache: Arc<dyn FileCache>, hooks: HookRunner, virtual_ns: VirtualNamespace) -> Self {
        Self {
            cache,
            hooks,
            virtual_ns,
            type_detection_by_header: false,
        }
    }

    /// Sniff file headers when an extension does not identify the type.
    pub fn with_type_detection_by_header(mut self, enabled: bool) -> Self {
        self.type_detection_by_header = enabled;
        self
    }

    pub fn virtual_ns(&self) -> &VirtualNamespace {
        &self.virtual_ns
    }

    /// Read an entry.
    ///
    /// Directories come back expanded and sorted by the principal's
    /// preference. For files, `checksum` names an algorithm whose digest
    /// replaces the inline content.
    #[tracing::instrument(
        skip(self, principal),
        fields(user = %principal.username),
        name = "resource.get"
    )]
    pub async fn get(
        &self,
        principal: &Principal,
        path: &str,
        checksum: Option<&str>,
    ) -> ResourceResult<LogLookup> {
        if self.virtual_ns.contains(path) {
            return self.virtual_ns.get(path).await;
        }

        let mut entry = entry::resolve(
            principal.fs.as_ref(),
            ResolveOptions {
                path,
                expand: true,
                content: true,
                read_header: self.type_detection_by_header,
                checker: principal,
            },
        )
        .await?;

        if let Some(listing) = entry.listing.as_mut() {
            listing.apply_sort(principal.sorting);
            return Ok(LogLookup::Found(entry));
        }

        if let Some(name) = checksum.filter(|c| !c.is_empty()) {
            let algo: ChecksumAlgo = name
                .parse()
                .map_err(|_| ResourceError::invalid(format!("unsupported checksum {name}")))?;
            entry.checksum(principal.fs.as_ref(), algo).await?;
        }
        Ok(LogLookup::Found(entry))
    }

    /// Create a file from `body`, or a directory when `path` ends in `/`.
    ///
    /// An existing file is only replaced with `override_existing` and the
    /// modify permission; an existing directory is never replaced. A failed
    /// upload leaves nothing behind.
    #[tracing::instrument(
        skip(self, principal, body),
        fields(user = %principal.username),
        name = "resource.create"
    )]
    pub async fn create<S, E>(
        &self,
        principal: &Principal,
        path: &str,
        override_existing: bool,
        body: S,
    ) -> ResourceResult<CreateOutcome>
    where
        S: Stream<Item = Result<Bytes, E>> + Send + Unpin,
        E: Into<Box<dyn std::error::Error + Send + Sync>> + Send,
    {
        self.reject_virtual(path)?;
        if !principal.permissions.create || !principal.check(path) {
            return Err(ResourceError::PermissionDenied);
        }

        if paths::has_trailing_slash(path) {
            let dir = paths::clean(path);
            let record = self.record(principal, "mkdir", &dir);
            self.hooks
                .run(&record, async {
                    principal.fs.mkdir(Path::new(&dir), 0o755).await?;
                    Ok(())
                })
                .await?;
            return Ok(CreateOutcome::Directory);
        }

        let path = paths::clean(path);
        match stat_entry(principal, &path).await {
            Ok(existing) => {
                if !override_existing || existing.is_dir {
                    return Err(ResourceError::conflict(&path));
                }
                if !principal.permissions.modify {
                    return Err(ResourceError::PermissionDenied);
                }
                cache::invalidate(self.cache.as_ref(), &existing).await?;
            }
            Err(e) if e.is_not_found() => {}
            Err(e) => return Err(e),
        }

        let record = self.record(principal, "upload", &path);
        let result = self
            .hooks
            .run(&record, async {
                Ok(fileutils::write_file(principal.fs.as_ref(), &path, body).await?)
            })
            .await;

        match result {
            Ok(attr) => Ok(CreateOutcome::File {
                etag: entry::etag(&attr),
            }),
            Err(e) => {
                if !matches!(e, ResourceError::HookRejected { .. }) {
                    if let Err(cleanup) = principal.fs.remove_all(Path::new(&path)).await {
                        tracing::warn!(
                            %path,
                            error = %cleanup,
                            "failed to clean up partial upload"
                        );
                    }
                }
                Err(e)
            }
        }
    }

    /// Replace the contents of an existing file. Returns the new ETag.
    #[tracing::instrument(
        skip(self, principal, body),
        fields(user = %principal.username),
        name = "resource.update"
    )]
    pub async fn update<S, E>(
        &self,
        principal: &Principal,
        path: &str,
        body: S,
    ) -> ResourceResult<String>
    where
        S: Stream<Item = Result<Bytes, E>> + Send + Unpin,
        E: Into<Box<dyn std::error::Error + Send + Sync>> + Send,
    {
        self.reject_virtual(path)?;
        if !principal.permissions.modify || !principal.check(path) {
            return Err(ResourceError::PermissionDenied);
        }
        if paths::has_trailing_slash(path) {
            return Err(ResourceError::MethodNotAllowed);
        }

        let path = paths::clean(path);
        if !principal.fs.exists(Path::new(&path)).await {
            return Err(ResourceError::not_found(&path));
        }

        let record = self.record(principal, "save", &path);
        let attr = self
            .hooks
            .run(&record, async {
                Ok(fileutils::write_file(principal.fs.as_ref(), &path, body).await?)
            })
            .await?;
        Ok(entry::etag(&attr))
    }

    /// Delete a file or directory tree. The root is never deletable.
    #[tracing::instrument(
        skip(self, principal),
        fields(user = %principal.username),
        name = "resource.delete"
    )]
    pub async fn delete(&self, principal: &Principal, path: &str) -> ResourceResult<()> {
        let path = paths::clean(path);
        if path == "/" {
            return Err(ResourceError::PermissionDenied);
        }
        self.reject_virtual(&path)?;
        if !principal.permissions.delete {
            return Err(ResourceError::PermissionDenied);
        }

        let existing = stat_entry(principal, &path).await?;
        cache::invalidate(self.cache.as_ref(), &existing).await?;

        let record = self.record(principal, "delete", &path);
        self.hooks
            .run(&record, async {
                principal.fs.remove_all(Path::new(&path)).await?;
                Ok(())
            })
            .await
    }

    pub(crate) fn reject_virtual(&self, path: &str) -> ResourceResult<()> {
        if self.virtual_ns.contains(path) {
            return Err(ResourceError::read_only(path));
        }
        Ok(())
    }

    pub(crate) fn record(&self, principal: &Principal, action: &str, source: &str) -> HookRecord {
        HookRecord::new(action, source).principal(&principal.username, &principal.scope)
    }
}

impl std::fmt::Debug for ResourceService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResourceService")
            .field("hooks", &self.hooks)
            .field("virtual_ns", &self.virtual_ns)
            .field("type_detection_by_header", &self.type_detection_by_header)
            .finish_non_exhaustive()
    }
}

/// Stat a path into a bare entry: access-checked, no type detection.
pub(crate) async fn stat_entry(principal: &Principal, path: &str) -> ResourceResult<Entry> {
    if !principal.check(path) {
        return Err(ResourceError::PermissionDenied);
    }
    let attr = principal.fs.getattr(Path::new(path)).await?;
    let mut entry = Entry::from_attr(path, &attr);
    entry.real_path = principal.fs.real_path(Path::new(path)).await.ok().flatten();
    Ok(entry)
}
