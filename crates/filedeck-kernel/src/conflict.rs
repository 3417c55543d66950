//! Destination conflict handling for copy and move.

use std::path::Path;

use crate::error::{ResourceError, ResourceResult};
use crate::paths;
use crate::vfs::VfsOps;

/// Reject a destination that is a proper ancestor of the source.
///
/// The same path and destinations below the source pass.
pub fn check_parent(src: &str, dst: &str) -> ResourceResult<()> {
    let src_clean = paths::clean(src);
    let dst_clean = paths::clean(dst);
    let src_parts = paths::components(&src_clean);
    let dst_parts = paths::components(&dst_clean);

    if dst_parts.len() < src_parts.len() && src_parts[..dst_parts.len()] == dst_parts[..] {
        return Err(ResourceError::invalid(format!(
            "{dst_clean} is an ancestor of {src_clean}"
        )));
    }
    Ok(())
}

/// Return `dst` if it is free, otherwise the first free `base(n)ext`.
///
/// Counters are probed in increasing order starting at 1. Nothing is
/// reserved: a concurrent writer can still claim the name before the caller
/// uses it.
pub async fn add_version_suffix(fs: &dyn VfsOps, dst: &str) -> ResourceResult<String> {
    let dst = paths::clean(dst);
    if !occupied(fs, &dst).await? {
        return Ok(dst);
    }

    let dir = paths::parent(&dst);
    let name = paths::base_name(&dst);
    let ext = paths::extension(name);
    let base = &name[..name.len() - ext.len()];

    let mut counter: u64 = 1;
    loop {
        let candidate = paths::join(&dir, &format!("{base}({counter}){ext}"));
        if !occupied(fs, &candidate).await? {
            tracing::debug!(from = %dst, to = %candidate, "destination renamed to avoid conflict");
            return Ok(candidate);
        }
        counter += 1;
    }
}

async fn occupied(fs: &dyn VfsOps, path: &str) -> ResourceResult<bool> {
    match fs.getattr(Path::new(path)).await {
        Ok(_) => Ok(true),
        Err(e) if e.is_not_found() => Ok(false),
        Err(e) => Err(e.into()),
    }
}
