//! Slash-separated resource path helpers.
//!
//! Resource paths are absolute, `/`-rooted strings independent of the host
//! platform. Backends receive them as `Path`s and normalize on their side.

/// Lexically clean a resource path.
///
/// Collapses repeated separators, drops `.`, resolves `..` (never above the
/// root) and always returns an absolute path. A trailing slash is dropped.
pub fn clean(path: &str) -> String {
    let mut parts: Vec<&str> = Vec::new();
    for part in path.split('/') {
        match part {
            "" | "." => {}
            ".." => {
                parts.pop();
            }
            other => parts.push(other),
        }
    }
    format!("/{}", parts.join("/"))
}

/// Split a cleaned path into its components.
pub fn components(path: &str) -> Vec<&str> {
    path.split('/').filter(|p| !p.is_empty() && *p != ".").collect()
}

/// Join a directory path and a child name.
pub fn join(dir: &str, name: &str) -> String {
    if dir.ends_with('/') {
        format!("{dir}{name}")
    } else {
        format!("{dir}/{name}")
    }
}

/// Last component of a path; `/` for the root.
pub fn base_name(path: &str) -> &str {
    let trimmed = path.trim_end_matches('/');
    match trimmed.rsplit_once('/') {
        Some((_, name)) => name,
        None if trimmed.is_empty() => "/",
        None => trimmed,
    }
}

/// Parent directory of a path; the root is its own parent.
pub fn parent(path: &str) -> String {
    let cleaned = clean(path);
    match cleaned.rsplit_once('/') {
        Some(("", _)) | None => "/".to_string(),
        Some((dir, _)) => dir.to_string(),
    }
}

/// Extension of the last component including the leading dot, or `""`.
pub fn extension(path: &str) -> &str {
    let name = base_name(path);
    match name.rfind('.') {
        Some(idx) => &name[idx..],
        None => "",
    }
}

/// True when `path` equals `prefix` or lies beneath it, by whole components.
///
/// `/virtualx` is not within `/virtual`.
pub fn is_within(path: &str, prefix: &str) -> bool {
    let path = components(path);
    let prefix = components(prefix);
    path.len() >= prefix.len() && path[..prefix.len()] == prefix[..]
}

/// True when a path denotes a directory by its trailing slash.
pub fn has_trailing_slash(path: &str) -> bool {
    path.len() > 1 && path.ends_with('/')
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clean() {
        assert_eq!(clean(""), "/");
        assert_eq!(clean("/"), "/");
        assert_eq!(clean("a/b/"), "/a/b");
        assert_eq!(clean("//a/./b/../c"), "/a/c");
        assert_eq!(clean("/../../x"), "/x");
    }

    #[test]
    fn test_base_and_parent() {
        assert_eq!(base_name("/a/b.txt"), "b.txt");
        assert_eq!(base_name("/a/dir/"), "dir");
        assert_eq!(base_name("/"), "/");
        assert_eq!(parent("/a/b.txt"), "/a");
        assert_eq!(parent("/a"), "/");
        assert_eq!(parent("/"), "/");
    }

    #[test]
    fn test_extension() {
        assert_eq!(extension("/a/b.txt"), ".txt");
        assert_eq!(extension("/a/archive.tar.gz"), ".gz");
        assert_eq!(extension("/a/Makefile"), "");
    }

    #[test]
    fn test_is_within() {
        assert!(is_within("/virtual", "/virtual"));
        assert!(is_within("/virtual/logs/", "/virtual"));
        assert!(!is_within("/virtualx", "/virtual"));
        assert!(!is_within("/", "/virtual"));
    }

    #[test]
    fn test_join_and_trailing_slash() {
        assert_eq!(join("/", "a"), "/a");
        assert_eq!(join("/a", "b"), "/a/b");
        assert!(has_trailing_slash("/dir/"));
        assert!(!has_trailing_slash("/"));
    }
}
