//! Read-only virtual namespace.
//!
//! Everything under the virtual prefix (default `/virtual`) is synthesized
//! here from host log files; none of it touches a principal's filesystem.
//!
//! ```text
//! /virtual              directory, one child
//! /virtual/logs         one text entry per configured log file that exists
//! /virtual/logs/<name>  full contents of the matching log file
//! ```

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::io;
use std::path::{Path, PathBuf};

use crate::entry::{Entry, EntryType, Listing, MODE_DIR, Sorting};
use crate::error::{ResourceError, ResourceResult};
use crate::paths;
use crate::vfs::VfsError;

/// Mode reported for synthetic directories.
pub const VIRTUAL_DIR_MODE: u32 = MODE_DIR | 0o555;

/// Mode reported for log file entries.
pub const VIRTUAL_FILE_MODE: u32 = 0o444;

const LOGS_DIR: &str = "logs";

/// Virtual namespace settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct VirtualConfig {
    /// Mount point of the namespace.
    pub prefix: String,
    /// Host log files exposed under `<prefix>/logs`, by base name.
    pub log_files: Vec<PathBuf>,
    /// Size reported for synthetic directories.
    pub dir_size: u64,
    /// Synthetic directories claim to have been modified this long ago.
    pub mtime_offset_secs: u64,
}

impl Default for VirtualConfig {
    fn default() -> Self {
        Self {
            prefix: "/virtual".to_string(),
            log_files: vec![
                PathBuf::from("/var/log/messages"),
                PathBuf::from("/var/log/syslog"),
                PathBuf::from("/var/log/kern.log"),
            ],
            dir_size: 3488,
            mtime_offset_secs: 5,
        }
    }
}

/// Where a virtual path points.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VirtualPath {
    Root,
    Logs,
    LogFile(String),
    Unknown,
}

/// Outcome of looking up a virtual entry.
#[derive(Debug, Clone)]
pub enum LogLookup {
    Found(Entry),
    /// The name is not configured or its backing file does not exist.
    Missing,
}

/// Resolver for the virtual subtree.
#[derive(Debug, Clone, Default)]
pub struct VirtualNamespace {
    config: VirtualConfig,
}

impl VirtualNamespace {
    pub fn new(config: VirtualConfig) -> Self {
        Self { config }
    }

    pub fn prefix(&self) -> &str {
        &self.config.prefix
    }

    /// True when `path` lies in the virtual subtree.
    pub fn contains(&self, path: &str) -> bool {
        paths::is_within(&paths::clean(path), &self.config.prefix)
    }

    /// Classify a path inside the namespace.
    pub fn classify(&self, path: &str) -> VirtualPath {
        if !self.contains(path) {
            return VirtualPath::Unknown;
        }
        let skip = paths::components(&self.config.prefix).len();
        let path = paths::clean(path);
        let rest: Vec<&str> = paths::components(&path).into_iter().skip(skip).collect();
        match rest.as_slice() {
            [] => VirtualPath::Root,
            [LOGS_DIR] => VirtualPath::Logs,
            [LOGS_DIR, name] => VirtualPath::LogFile((*name).to_string()),
            _ => VirtualPath::Unknown,
        }
    }

    /// Look up any virtual path.
    pub async fn get(&self, path: &str) -> ResourceResult<LogLookup> {
        match self.classify(path) {
            VirtualPath::Root => Ok(LogLookup::Found(self.root())),
            VirtualPath::Logs => Ok(LogLookup::Found(self.logs().await?)),
            VirtualPath::LogFile(name) => self.log_file(&name).await,
            VirtualPath::Unknown => Err(ResourceError::not_found(path)),
        }
    }

    /// The namespace root, holding the single `logs` directory.
    pub fn root(&self) -> Entry {
        let mut logs = self.synthetic_dir(&self.logs_path());
        logs.size = self.config.dir_size;

        let mut root = self.synthetic_dir(&paths::clean(&self.config.prefix));
        root.listing = Some(Listing::new(vec![logs]));
        root
    }

    /// The logs directory, listing every configured log file that exists.
    pub async fn logs(&self) -> ResourceResult<Entry> {
        let mut items = Vec::new();
        for log in &self.config.log_files {
            let meta = match tokio::fs::metadata(log).await {
                Ok(meta) => meta,
                Err(e) if e.kind() == io::ErrorKind::NotFound => continue,
                Err(e) => return Err(VfsError::from(e).into()),
            };
            items.push(self.log_entry(log, &meta));
        }

        let mut listing = Listing::new(items);
        listing.apply_sort(Sorting::default());

        let mut dir = self.synthetic_dir(&self.logs_path());
        dir.listing = Some(listing);
        Ok(dir)
    }

    /// A single log file with its full contents.
    pub async fn log_file(&self, name: &str) -> ResourceResult<LogLookup> {
        let Some(log) = self
            .config
            .log_files
            .iter()
            .find(|p| p.file_name().is_some_and(|n| n == name))
        else {
            return Ok(LogLookup::Missing);
        };

        let meta = match tokio::fs::metadata(log).await {
            Ok(meta) => meta,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                tracing::debug!(log = %log.display(), "virtual log file missing");
                return Ok(LogLookup::Missing);
            }
            Err(e) => return Err(VfsError::from(e).into()),
        };
        let data = tokio::fs::read(log).await.map_err(VfsError::from)?;

        let mut entry = self.log_entry(log, &meta);
        entry.content = Some(String::from_utf8_lossy(&data).into_owned());
        Ok(LogLookup::Found(entry))
    }

    fn logs_path(&self) -> String {
        paths::join(&paths::clean(&self.config.prefix), LOGS_DIR)
    }

    fn synthetic_dir(&self, path: &str) -> Entry {
        let offset = Duration::seconds(self.config.mtime_offset_secs as i64);
        Entry {
            path: path.to_string(),
            name: paths::base_name(path).to_string(),
            size: self.config.dir_size,
            modified: Utc::now() - offset,
            mode: VIRTUAL_DIR_MODE,
            is_dir: true,
            ..Default::default()
        }
    }

    fn log_entry(&self, log: &Path, meta: &std::fs::Metadata) -> Entry {
        let name = log
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let path = paths::join(&self.logs_path(), &name);
        Entry {
            extension: paths::extension(&name).to_string(),
            path,
            name,
            size: meta.len(),
            modified: meta
                .modified()
                .map(DateTime::<Utc>::from)
                .unwrap_or_default(),
            mode: VIRTUAL_FILE_MODE,
            kind: EntryType::Text,
            ..Default::default()
        }
    }
}
