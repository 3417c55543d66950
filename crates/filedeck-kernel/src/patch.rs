//! Copy and rename: the PATCH verb.

use std::path::Path;
use strum::{Display, EnumString};

use crate::cache;
use crate::conflict::{add_version_suffix, check_parent};
use crate::error::{ResourceError, ResourceResult};
use crate::fileutils;
use crate::paths;
use crate::principal::{AccessCheck, Principal};
use crate::service::{ResourceService, stat_entry};

/// Actions PATCH understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumString, Display)]
#[strum(serialize_all = "lowercase")]
pub enum PatchAction {
    Copy,
    Rename,
}

/// Parameters of a PATCH request, as received.
#[derive(Debug, Clone, Default)]
pub struct PatchRequest {
    pub action: String,
    /// Still query-escaped.
    pub destination: String,
    pub override_existing: bool,
    /// Pick a free `name(n).ext` instead of conflicting.
    pub rename: bool,
}

/// Decode a query-escaped string: `+` is a space and `%XX` a byte.
pub fn query_unescape(raw: &str) -> ResourceResult<String> {
    let bytes = raw.as_bytes();
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'%' {
            let valid = bytes.len() > i + 2
                && bytes[i + 1].is_ascii_hexdigit()
                && bytes[i + 2].is_ascii_hexdigit();
            if !valid {
                return Err(ResourceError::invalid(format!("invalid escape in {raw:?}")));
            }
            i += 3;
        } else {
            i += 1;
        }
    }

    let spaced = raw.replace('+', " ");
    urlencoding::decode(&spaced)
        .map(|s| s.into_owned())
        .map_err(|e| ResourceError::invalid(format!("invalid destination: {e}")))
}

impl ResourceService {
    /// Copy or move `src` to the requested destination.
    ///
    /// Preconditions are checked in a fixed order so that the first failing
    /// one decides the error.
    #[tracing::instrument(
        skip(self, principal),
        fields(user = %principal.username),
        name = "resource.patch"
    )]
    pub async fn patch(
        &self,
        principal: &Principal,
        src: &str,
        req: &PatchRequest,
    ) -> ResourceResult<()> {
        let (dst, unescape_error) = match query_unescape(&req.destination) {
            Ok(dst) => (dst, None),
            Err(e) => (req.destination.clone(), Some(e)),
        };

        if !principal.check(src) || !principal.check(&dst) {
            return Err(ResourceError::PermissionDenied);
        }
        if let Some(e) = unescape_error {
            return Err(e);
        }

        let src = paths::clean(src);
        let dst = paths::clean(&dst);
        if src == "/" || dst == "/" {
            return Err(ResourceError::PermissionDenied);
        }
        self.reject_virtual(&src)?;
        self.reject_virtual(&dst)?;

        check_parent(&src, &dst)?;

        let fs = principal.fs.as_ref();
        if !req.override_existing && !req.rename && fs.exists(Path::new(&dst)).await {
            return Err(ResourceError::conflict(&dst));
        }
        let dst = if req.rename {
            add_version_suffix(fs, &dst).await?
        } else {
            dst
        };

        if req.override_existing && !principal.permissions.modify {
            return Err(ResourceError::PermissionDenied);
        }

        let action: PatchAction = req
            .action
            .parse()
            .map_err(|_| ResourceError::invalid(format!("unsupported action {:?}", req.action)))?;

        let record = self
            .record(principal, &req.action, &src)
            .destination(&dst);
        self.hooks
            .run(&record, async {
                match action {
                    PatchAction::Copy => {
                        self.copy(principal, &src, &dst, req.override_existing).await
                    }
                    PatchAction::Rename => {
                        self.rename(principal, &src, &dst, req.override_existing).await
                    }
                }
            })
            .await
    }

    async fn copy(
        &self,
        principal: &Principal,
        src: &str,
        dst: &str,
        override_existing: bool,
    ) -> ResourceResult<()> {
        if !principal.permissions.create {
            return Err(ResourceError::PermissionDenied);
        }
        if override_existing {
            self.invalidate_if_present(principal, dst).await?;
        }
        fileutils::copy(principal.fs.as_ref(), src, dst).await?;
        Ok(())
    }

    async fn rename(
        &self,
        principal: &Principal,
        src: &str,
        dst: &str,
        override_existing: bool,
    ) -> ResourceResult<()> {
        if !principal.permissions.rename {
            return Err(ResourceError::PermissionDenied);
        }
        let src = paths::clean(src);
        let dst = paths::clean(dst);
        if src != dst && paths::is_within(&dst, &src) {
            return Err(ResourceError::invalid(format!("cannot move {src} into itself")));
        }

        let source = stat_entry(principal, &src).await?;
        cache::invalidate(self.cache.as_ref(), &source).await?;

        let fs = principal.fs.as_ref();
        if override_existing && src != dst {
            if let Some(existing) = self.invalidate_if_present(principal, &dst).await? {
                // Renaming over a non-empty directory is not atomic anywhere.
                if existing.is_dir {
                    fs.remove_all(Path::new(&dst)).await?;
                }
            }
        }

        fileutils::move_file(fs, &src, &dst).await?;
        Ok(())
    }

    async fn invalidate_if_present(
        &self,
        principal: &Principal,
        path: &str,
    ) -> ResourceResult<Option<crate::entry::Entry>> {
        match stat_entry(principal, path).await {
            Ok(existing) => {
                cache::invalidate(self.cache.as_ref(), &existing).await?;
                Ok(Some(existing))
            }
            Err(e) if e.is_not_found() => Ok(None),
            Err(e) => Err(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::{FileCache, PreviewSize, preview_cache_key};
    use crate::principal::Permissions;
    use crate::service::tests::{principal, setup};
    use crate::vfs::VfsOps;

    fn req(action: &str, destination: &str) -> PatchRequest {
        PatchRequest {
            action: action.to_string(),
            destination: destination.to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn test_query_unescape() {
        assert_eq!(query_unescape("/a+b%2Bc.txt").unwrap(), "/a b+c.txt");
        assert_eq!(query_unescape("%2Fdir%2Ffile").unwrap(), "/dir/file");
        assert!(query_unescape("/bad%zz").is_err());
        assert!(query_unescape("/trunc%2").is_err());
        assert!(query_unescape("/%ff%fe").is_err());
    }

    #[tokio::test]
    async fn test_rename_moves_and_invalidates() {
        let (service, cache, fs) = setup();
        fs.write_all(Path::new("a.png"), b"img").await.unwrap();
        let p = principal(&fs, Permissions::all());

        let source = stat_entry(&p, "/a.png").await.unwrap();
        cache
            .store(&preview_cache_key(&source, PreviewSize::Thumb), b"t")
            .await
            .unwrap();

        service.patch(&p, "/a.png", &req("rename", "/sub/b.png")).await.unwrap();
        assert!(!fs.exists(Path::new("a.png")).await);
        assert_eq!(fs.read_all(Path::new("sub/b.png")).await.unwrap(), b"img");
        assert!(cache.is_empty());
    }

    #[tokio::test]
    async fn test_copy_keeps_source() {
        let (service, _, fs) = setup();
        fs.write_all(Path::new("dir/a.txt"), b"a").await.unwrap();
        let p = principal(&fs, Permissions::all());

        service.patch(&p, "/dir", &req("copy", "/backup")).await.unwrap();
        assert!(fs.exists(Path::new("dir/a.txt")).await);
        assert_eq!(fs.read_all(Path::new("backup/a.txt")).await.unwrap(), b"a");
    }

    #[tokio::test]
    async fn test_existing_destination_conflicts() {
        let (service, _, fs) = setup();
        fs.write_all(Path::new("a.txt"), b"a").await.unwrap();
        fs.write_all(Path::new("b.txt"), b"b").await.unwrap();
        let p = principal(&fs, Permissions::all());

        let err = service.patch(&p, "/a.txt", &req("copy", "/b.txt")).await.unwrap_err();
        assert!(matches!(err, ResourceError::Conflict(_)));
    }

    #[tokio::test]
    async fn test_rename_flag_picks_free_name() {
        let (service, _, fs) = setup();
        fs.write_all(Path::new("a.txt"), b"new").await.unwrap();
        fs.write_all(Path::new("dst/a.txt"), b"1").await.unwrap();
        fs.write_all(Path::new("dst/a(1).txt"), b"2").await.unwrap();
        let p = principal(&fs, Permissions::all());

        let mut request = req("copy", "/dst/a.txt");
        request.rename = true;
        service.patch(&p, "/a.txt", &request).await.unwrap();
        assert_eq!(fs.read_all(Path::new("dst/a(2).txt")).await.unwrap(), b"new");
        assert_eq!(fs.read_all(Path::new("dst/a.txt")).await.unwrap(), b"1");
    }

    #[tokio::test]
    async fn test_override_replaces_destination() {
        let (service, _, fs) = setup();
        fs.write_all(Path::new("a.txt"), b"new").await.unwrap();
        fs.write_all(Path::new("b.txt"), b"old").await.unwrap();
        let p = principal(&fs, Permissions::all());

        let mut request = req("rename", "/b.txt");
        request.override_existing = true;
        service.patch(&p, "/a.txt", &request).await.unwrap();
        assert_eq!(fs.read_all(Path::new("b.txt")).await.unwrap(), b"new");
        assert!(!fs.exists(Path::new("a.txt")).await);
    }

    #[tokio::test]
    async fn test_capabilities() {
        let (service, _, fs) = setup();
        fs.write_all(Path::new("a.txt"), b"a").await.unwrap();
        fs.write_all(Path::new("b.txt"), b"b").await.unwrap();
        let no_create = principal(
            &fs,
            Permissions {
                rename: true,
                modify: true,
                ..Default::default()
            },
        );
        let no_rename = principal(
            &fs,
            Permissions {
                create: true,
                modify: true,
                ..Default::default()
            },
        );
        let no_modify = principal(
            &fs,
            Permissions {
                create: true,
                rename: true,
                ..Default::default()
            },
        );

        let err = service.patch(&no_create, "/a.txt", &req("copy", "/c.txt")).await.unwrap_err();
        assert!(matches!(err, ResourceError::PermissionDenied));

        let err = service.patch(&no_rename, "/a.txt", &req("rename", "/c.txt")).await.unwrap_err();
        assert!(matches!(err, ResourceError::PermissionDenied));

        let mut request = req("copy", "/b.txt");
        request.override_existing = true;
        let err = service.patch(&no_modify, "/a.txt", &request).await.unwrap_err();
        assert!(matches!(err, ResourceError::PermissionDenied));

        assert!(!fs.exists(Path::new("c.txt")).await);
        assert_eq!(fs.read_all(Path::new("b.txt")).await.unwrap(), b"b");
    }

    #[tokio::test]
    async fn test_precondition_errors() {
        let (service, _, fs) = setup();
        fs.write_all(Path::new("a/b/c"), b"x").await.unwrap();
        let p = principal(&fs, Permissions::all());

        let err = service.patch(&p, "/a/b/c", &req("rename", "/a/b")).await.unwrap_err();
        assert!(matches!(err, ResourceError::InvalidRequest(_)));

        let err = service.patch(&p, "/a/b/c", &req("rename", "/")).await.unwrap_err();
        assert!(matches!(err, ResourceError::PermissionDenied));

        let err = service
            .patch(&p, "/a/b/c", &req("rename", "/virtual/logs/c"))
            .await
            .unwrap_err();
        assert!(matches!(err, ResourceError::ReadOnly(_)));

        let err = service.patch(&p, "/a/b/c", &req("link", "/d")).await.unwrap_err();
        assert!(matches!(err, ResourceError::InvalidRequest(_)));

        let err = service.patch(&p, "/a/b/c", &req("copy", "/d%zz")).await.unwrap_err();
        assert!(matches!(err, ResourceError::InvalidRequest(_)));

        let err = service.patch(&p, "/missing", &req("rename", "/d")).await.unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn test_rename_into_own_subtree_rejected() {
        let (service, _, fs) = setup();
        fs.mkdir(Path::new("a/b"), 0o755).await.unwrap();
        let p = principal(&fs, Permissions::all());

        let err = service.patch(&p, "/a", &req("rename", "/a/b/c")).await.unwrap_err();
        assert!(matches!(err, ResourceError::InvalidRequest(_)));
        assert!(fs.exists(Path::new("a/b")).await);
    }
}
