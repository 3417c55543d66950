//! Disk usage of the storage behind a path.

use serde::Serialize;
use std::path::Path;

use crate::error::ResourceResult;
use crate::principal::Principal;
use crate::service::{ResourceService, stat_entry};

/// Capacity and usage in bytes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct DiskUsage {
    pub total: u64,
    pub used: u64,
}

impl ResourceService {
    /// Usage of the filesystem holding directory `path`.
    ///
    /// Virtual paths and plain files report zero.
    #[tracing::instrument(
        skip(self, principal),
        fields(user = %principal.username),
        name = "resource.usage"
    )]
    pub async fn disk_usage(&self, principal: &Principal, path: &str) -> ResourceResult<DiskUsage> {
        if self.virtual_ns.contains(path) {
            return Ok(DiskUsage::default());
        }

        let entry = stat_entry(principal, &crate::paths::clean(path)).await?;
        if !entry.is_dir {
            return Ok(DiskUsage::default());
        }

        let stat = principal.fs.statfs_at(Path::new(&entry.path)).await?;
        Ok(DiskUsage {
            total: stat.total_bytes(),
            used: stat.used_bytes(),
        })
    }
}
