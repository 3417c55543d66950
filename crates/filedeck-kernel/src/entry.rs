//! Entry model: the client-facing record for a file or directory.
//!
//! Entries are built fresh per request by [`resolve`] and never cached.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::Digest;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use strum::{Display, EnumString};

use crate::error::{ResourceError, ResourceResult};
use crate::paths;
use crate::principal::AccessCheck;
use crate::vfs::{FileAttr, READ_CHUNK, VfsOps};

/// Text files larger than this are reported as blobs without content.
pub const MAX_INLINE_CONTENT: u64 = 10 * 1024 * 1024;

/// Bytes read from the head of a file for content sniffing.
const SNIFF_LEN: u32 = 512;

/// Directory type bit carried in `mode`, as in `st_mode`.
pub const MODE_DIR: u32 = 0o040000;

/// Content class of an entry.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryType {
    /// Directories and empty placeholder entries.
    #[default]
    #[serde(rename = "")]
    Unset,
    Video,
    Audio,
    Image,
    Pdf,
    Text,
    Blob,
}

/// Listing sort key.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, EnumString, Display)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum SortBy {
    #[default]
    Name,
    Size,
    Modified,
}

/// Sort order applied to a listing at read time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Sorting {
    pub by: SortBy,
    pub asc: bool,
}

impl Default for Sorting {
    fn default() -> Self {
        Self {
            by: SortBy::Name,
            asc: true,
        }
    }
}

/// Children of a directory entry.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Listing {
    pub items: Vec<Entry>,
    pub num_dirs: usize,
    pub num_files: usize,
    pub sorting: Sorting,
}

impl Listing {
    /// Build a listing, counting directories and files.
    pub fn new(items: Vec<Entry>) -> Self {
        let num_dirs = items.iter().filter(|e| e.is_dir).count();
        let num_files = items.len() - num_dirs;
        Self {
            items,
            num_dirs,
            num_files,
            sorting: Sorting::default(),
        }
    }

    /// Reorder items. Directories always precede files in ascending order.
    pub fn apply_sort(&mut self, sorting: Sorting) {
        self.sorting = sorting;
        self.items.sort_by(|a, b| {
            b.is_dir.cmp(&a.is_dir).then_with(|| match sorting.by {
                SortBy::Name => a.name.to_lowercase().cmp(&b.name.to_lowercase()),
                SortBy::Size => a.size.cmp(&b.size),
                SortBy::Modified => a.modified.cmp(&b.modified),
            })
        });
        if !sorting.asc {
            self.items.reverse();
        }
    }
}

/// A single file or directory record.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Entry {
    pub path: String,
    pub name: String,
    pub size: u64,
    pub extension: String,
    pub modified: DateTime<Utc>,
    pub mode: u32,
    pub is_dir: bool,
    pub is_symlink: bool,
    #[serde(rename = "type")]
    pub kind: EntryType,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub checksums: Option<BTreeMap<String, String>>,
    #[serde(flatten, skip_serializing_if = "Option::is_none")]
    pub listing: Option<Listing>,
    /// Host location backing this entry, when there is one.
    #[serde(skip)]
    pub real_path: Option<PathBuf>,
}

impl Entry {
    /// Entry for `path` carrying the raw attributes; type and content unset.
    pub fn from_attr(path: &str, attr: &FileAttr) -> Self {
        let mut mode = attr.perm & 0o7777;
        if attr.is_dir() {
            mode |= MODE_DIR;
        }
        Self {
            path: path.to_string(),
            name: paths::base_name(path).to_string(),
            size: attr.size,
            extension: if attr.is_dir() {
                String::new()
            } else {
                paths::extension(path).to_string()
            },
            modified: DateTime::<Utc>::from(attr.mtime),
            mode,
            is_dir: attr.is_dir(),
            is_symlink: attr.is_symlink(),
            ..Default::default()
        }
    }

    /// Location used to derive cache keys: the host path if known.
    pub fn location(&self) -> String {
        match &self.real_path {
            Some(p) => p.to_string_lossy().into_owned(),
            None => self.path.clone(),
        }
    }

    /// Compute a checksum of the file's contents and record it.
    ///
    /// Inline content is dropped once a checksum is attached.
    pub async fn checksum(&mut self, fs: &dyn VfsOps, algo: ChecksumAlgo) -> ResourceResult<()> {
        if self.is_dir {
            return Err(ResourceError::invalid(format!(
                "cannot checksum directory {}",
                self.path
            )));
        }

        let path = Path::new(&self.path);
        let mut hasher = Hasher::new(algo);
        let mut offset = 0u64;
        loop {
            let chunk = fs.read(path, offset, READ_CHUNK).await?;
            if chunk.is_empty() {
                break;
            }
            offset += chunk.len() as u64;
            hasher.update(&chunk);
        }

        self.checksums
            .get_or_insert_with(BTreeMap::new)
            .insert(algo.to_string(), hasher.finish());
        self.content = None;
        Ok(())
    }
}

/// Supported checksum algorithms.
#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumString, Display)]
#[strum(serialize_all = "lowercase")]
pub enum ChecksumAlgo {
    Md5,
    Sha1,
    Sha256,
    Sha512,
}

enum Hasher {
    Md5(md5::Context),
    Sha1(sha1::Sha1),
    Sha256(sha2::Sha256),
    Sha512(sha2::Sha512),
}

impl Hasher {
    fn new(algo: ChecksumAlgo) -> Self {
        match algo {
            ChecksumAlgo::Md5 => Hasher::Md5(md5::Context::new()),
            ChecksumAlgo::Sha1 => Hasher::Sha1(sha1::Sha1::new()),
            ChecksumAlgo::Sha256 => Hasher::Sha256(sha2::Sha256::new()),
            ChecksumAlgo::Sha512 => Hasher::Sha512(sha2::Sha512::new()),
        }
    }

    fn update(&mut self, data: &[u8]) {
        match self {
            Hasher::Md5(h) => h.consume(data),
            Hasher::Sha1(h) => h.update(data),
            Hasher::Sha256(h) => h.update(data),
            Hasher::Sha512(h) => h.update(data),
        }
    }

    fn finish(self) -> String {
        match self {
            Hasher::Md5(h) => format!("{:x}", h.compute()),
            Hasher::Sha1(h) => hex::encode(h.finalize()),
            Hasher::Sha256(h) => hex::encode(h.finalize()),
            Hasher::Sha512(h) => hex::encode(h.finalize()),
        }
    }
}

/// Entity tag for a file: hex mtime nanoseconds followed by hex size, quoted.
pub fn etag(attr: &FileAttr) -> String {
    format!("\"{:x}{:x}\"", attr.mtime_nanos(), attr.size)
}

/// What to resolve and how much detail to load.
pub struct ResolveOptions<'a> {
    pub path: &'a str,
    /// List a directory's children.
    pub expand: bool,
    /// Inline text content for files.
    pub content: bool,
    /// Sniff file headers when the extension says nothing.
    pub read_header: bool,
    pub checker: &'a dyn AccessCheck,
}

/// Stat `opts.path` on `fs` and build its entry.
///
/// Children the checker rejects are left out of listings.
pub async fn resolve(fs: &dyn VfsOps, opts: ResolveOptions<'_>) -> ResourceResult<Entry> {
    let path = paths::clean(opts.path);
    if !opts.checker.check(&path) {
        return Err(ResourceError::PermissionDenied);
    }

    let attr = fs.getattr(Path::new(&path)).await?;
    let mut entry = Entry::from_attr(&path, &attr);
    entry.real_path = fs.real_path(Path::new(&path)).await.ok().flatten();

    if attr.is_dir() {
        if opts.expand {
            entry.listing = Some(read_listing(fs, &path, opts.checker).await?);
        }
        return Ok(entry);
    }

    if attr.is_file() {
        detect_type(fs, &mut entry, opts.content, opts.read_header).await?;
    }
    Ok(entry)
}

async fn read_listing(
    fs: &dyn VfsOps,
    dir: &str,
    checker: &dyn AccessCheck,
) -> ResourceResult<Listing> {
    let mut items = Vec::new();
    for child in fs.readdir(Path::new(dir)).await? {
        let child_path = paths::join(dir, &child.name);
        if !checker.check(&child_path) {
            continue;
        }

        // A child can vanish between readdir and stat.
        let attr = match fs.getattr(Path::new(&child_path)).await {
            Ok(attr) => attr,
            Err(e) if e.is_not_found() => continue,
            Err(e) => return Err(e.into()),
        };
        let mut item = Entry::from_attr(&child_path, &attr);
        if attr.is_file() {
            item.kind = type_by_extension(&item.extension).unwrap_or(EntryType::Blob);
        }
        items.push(item);
    }
    Ok(Listing::new(items))
}

async fn detect_type(
    fs: &dyn VfsOps,
    entry: &mut Entry,
    load_content: bool,
    read_header: bool,
) -> ResourceResult<()> {
    let path = PathBuf::from(&entry.path);
    entry.kind = match type_by_extension(&entry.extension) {
        Some(kind) => kind,
        None => {
            let head = fs.read(&path, 0, SNIFF_LEN).await?;
            sniff(&head, read_header)
        }
    };

    if entry.kind != EntryType::Text {
        return Ok(());
    }
    if entry.size > MAX_INLINE_CONTENT {
        entry.kind = EntryType::Blob;
        return Ok(());
    }
    if load_content {
        let data = fs.read_all(&path).await?;
        entry.content = Some(String::from_utf8_lossy(&data).into_owned());
    }
    Ok(())
}

fn type_by_extension(ext: &str) -> Option<EntryType> {
    let ext = ext.trim_start_matches('.').to_ascii_lowercase();
    let kind = match ext.as_str() {
        "png" | "jpg" | "jpeg" | "gif" | "webp" | "bmp" | "svg" | "ico" | "tif" | "tiff" => {
            EntryType::Image
        }
        "mp4" | "mkv" | "webm" | "avi" | "mov" | "m4v" => EntryType::Video,
        "mp3" | "flac" | "wav" | "ogg" | "m4a" | "aac" | "opus" => EntryType::Audio,
        "pdf" => EntryType::Pdf,
        "txt" | "log" | "md" | "json" | "toml" | "yaml" | "yml" | "xml" | "csv" | "ini"
        | "cfg" | "conf" | "sh" | "rs" | "go" | "py" | "js" | "ts" | "html" | "css" | "c"
        | "h" | "sql" | "bak" => EntryType::Text,
        "zip" | "gz" | "tar" | "xz" | "zst" | "7z" | "iso" | "bin" | "img" | "exe" => {
            EntryType::Blob
        }
        _ => return None,
    };
    Some(kind)
}

/// Classify file contents from their first bytes.
fn sniff(head: &[u8], magic: bool) -> EntryType {
    if magic {
        const SIGNATURES: &[(&[u8], EntryType)] = &[
            (b"\x89PNG\r\n\x1a\n", EntryType::Image),
            (b"\xff\xd8\xff", EntryType::Image),
            (b"GIF8", EntryType::Image),
            (b"%PDF-", EntryType::Pdf),
            (b"ID3", EntryType::Audio),
            (b"fLaC", EntryType::Audio),
            (b"OggS", EntryType::Audio),
            (b"\x1a\x45\xdf\xa3", EntryType::Video),
        ];
        for (signature, kind) in SIGNATURES {
            if head.starts_with(signature) {
                return *kind;
            }
        }
    }

    if head.contains(&0) || !valid_utf8_prefix(head) {
        EntryType::Blob
    } else {
        EntryType::Text
    }
}

/// Valid UTF-8, allowing a multi-byte sequence cut off at the end.
fn valid_utf8_prefix(head: &[u8]) -> bool {
    match std::str::from_utf8(head) {
        Ok(_) => true,
        Err(e) => e.error_len().is_none(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vfs::MemoryBackend;
    use std::time::{Duration, SystemTime};

    struct AllowAll;
    impl AccessCheck for AllowAll {
        fn check(&self, _path: &str) -> bool {
            true
        }
    }

    struct DenyPrefix(&'static str);
    impl AccessCheck for DenyPrefix {
        fn check(&self, path: &str) -> bool {
            !path.starts_with(self.0)
        }
    }

    fn opts<'a>(path: &'a str, checker: &'a dyn AccessCheck) -> ResolveOptions<'a> {
        ResolveOptions {
            path,
            expand: true,
            content: true,
            read_header: false,
            checker,
        }
    }

    #[tokio::test]
    async fn test_resolve_text_file_inlines_content() {
        let fs = MemoryBackend::new();
        fs.write_all(Path::new("notes.txt"), b"hello").await.unwrap();

        let entry = resolve(&fs, opts("/notes.txt", &AllowAll)).await.unwrap();
        assert_eq!(entry.name, "notes.txt");
        assert_eq!(entry.extension, ".txt");
        assert_eq!(entry.kind, EntryType::Text);
        assert_eq!(entry.content.as_deref(), Some("hello"));
        assert!(entry.listing.is_none());
    }

    #[tokio::test]
    async fn test_resolve_unknown_extension_sniffs() {
        let fs = MemoryBackend::new();
        fs.write_all(Path::new("README"), b"plain words").await.unwrap();
        fs.write_all(Path::new("data"), &[0u8, 1, 2, 3]).await.unwrap();
        fs.write_all(Path::new("picture"), b"\x89PNG\r\n\x1a\nrest")
            .await
            .unwrap();

        let readme = resolve(&fs, opts("/README", &AllowAll)).await.unwrap();
        assert_eq!(readme.kind, EntryType::Text);

        let data = resolve(&fs, opts("/data", &AllowAll)).await.unwrap();
        assert_eq!(data.kind, EntryType::Blob);
        assert!(data.content.is_none());

        let mut with_header = opts("/picture", &AllowAll);
        with_header.read_header = true;
        let picture = resolve(&fs, with_header).await.unwrap();
        assert_eq!(picture.kind, EntryType::Image);
    }

    #[tokio::test]
    async fn test_listing_counts_and_filters() {
        let fs = MemoryBackend::new();
        fs.mkdir(Path::new("dir/sub"), 0o755).await.unwrap();
        fs.write_all(Path::new("dir/a.txt"), b"a").await.unwrap();
        fs.write_all(Path::new("dir/secret/key"), b"k").await.unwrap();

        let entry = resolve(&fs, opts("/dir", &DenyPrefix("/dir/secret")))
            .await
            .unwrap();
        assert!(entry.is_dir);
        assert_eq!(entry.mode & MODE_DIR, MODE_DIR);

        let listing = entry.listing.unwrap();
        let names: Vec<_> = listing.items.iter().map(|e| e.path.as_str()).collect();
        assert_eq!(names, vec!["/dir/a.txt", "/dir/sub"]);
        assert_eq!(listing.num_dirs, 1);
        assert_eq!(listing.num_files, 1);
        assert_eq!(listing.num_dirs + listing.num_files, listing.items.len());
    }

    #[tokio::test]
    async fn test_resolve_denied_path() {
        let fs = MemoryBackend::new();
        fs.write_all(Path::new("secret/key"), b"k").await.unwrap();

        let err = resolve(&fs, opts("/secret/key", &DenyPrefix("/secret")))
            .await
            .unwrap_err();
        assert!(matches!(err, ResourceError::PermissionDenied));
    }

    #[tokio::test]
    async fn test_resolve_missing() {
        let fs = MemoryBackend::new();
        let err = resolve(&fs, opts("/nope", &AllowAll)).await.unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn test_checksums() {
        let fs = MemoryBackend::new();
        fs.write_all(Path::new("hello.txt"), b"hello").await.unwrap();

        let mut entry = resolve(&fs, opts("/hello.txt", &AllowAll)).await.unwrap();
        entry.checksum(&fs, ChecksumAlgo::Md5).await.unwrap();
        entry.checksum(&fs, ChecksumAlgo::Sha256).await.unwrap();

        let sums = entry.checksums.as_ref().unwrap();
        assert_eq!(sums["md5"], "5d41402abc4b2a76b9719d911017c592");
        assert_eq!(
            sums["sha256"],
            "2cf24dba5fb0a30e26e83b2ac5b9e29e1b161e5c1fa7425e73043362938b9824"
        );
        assert!(entry.content.is_none());
    }

    #[test]
    fn test_checksum_algo_parse() {
        assert_eq!("sha1".parse::<ChecksumAlgo>().unwrap(), ChecksumAlgo::Sha1);
        assert!("bogus".parse::<ChecksumAlgo>().is_err());
    }

    #[test]
    fn test_etag_format() {
        let mut attr = FileAttr::file(255, 0o644);
        attr.mtime = SystemTime::UNIX_EPOCH + Duration::from_nanos(0x10);
        assert_eq!(etag(&attr), "\"10ff\"");
    }

    #[test]
    fn test_apply_sort() {
        let item = |name: &str, size: u64, is_dir: bool| Entry {
            name: name.to_string(),
            size,
            is_dir,
            ..Default::default()
        };
        let mut listing = Listing::new(vec![
            item("b.txt", 1, false),
            item("A.txt", 3, false),
            item("zdir", 0, true),
        ]);

        listing.apply_sort(Sorting::default());
        let names: Vec<_> = listing.items.iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, vec!["zdir", "A.txt", "b.txt"]);

        listing.apply_sort(Sorting {
            by: SortBy::Size,
            asc: false,
        });
        let names: Vec<_> = listing.items.iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, vec!["A.txt", "b.txt", "zdir"]);
    }

    #[test]
    fn test_serialized_shape() {
        let mut entry = Entry {
            path: "/dir".to_string(),
            name: "dir".to_string(),
            is_dir: true,
            ..Default::default()
        };
        entry.listing = Some(Listing::new(vec![]));

        let json = serde_json::to_value(&entry).unwrap();
        assert_eq!(json["isDir"], true);
        assert_eq!(json["type"], "");
        assert_eq!(json["numDirs"], 0);
        assert_eq!(json["sorting"]["by"], "name");
        assert!(json.get("content").is_none());
    }
}
