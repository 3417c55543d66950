//! Whole-file and whole-tree helpers built on [`VfsOps`].

use bytes::Bytes;
use futures::{Stream, StreamExt};
use std::io;
use std::path::Path;

use crate::paths;
use crate::vfs::{FileAttr, READ_CHUNK, VfsError, VfsOps, VfsResult};

/// Recursively copy `src` to `dst`, replacing files already at `dst`.
///
/// Copying a path onto itself does nothing. When `dst` lies inside `src`
/// it is skipped while walking, so a directory can be copied into itself
/// without recursing forever.
pub async fn copy(fs: &dyn VfsOps, src: &str, dst: &str) -> VfsResult<()> {
    let src = paths::clean(src);
    let dst = paths::clean(dst);
    if src == dst {
        return Ok(());
    }

    let attr = fs.getattr(Path::new(&src)).await?;
    if !attr.is_dir() {
        return copy_file(fs, &src, &dst, attr.perm).await;
    }

    let mut pending = vec![(src.clone(), dst.clone(), attr.perm)];
    while let Some((from_dir, to_dir, perm)) = pending.pop() {
        fs.mkdir(Path::new(&to_dir), perm & 0o7777).await?;
        for child in fs.readdir(Path::new(&from_dir)).await? {
            let from = paths::join(&from_dir, &child.name);
            if from == dst {
                continue;
            }
            let to = paths::join(&to_dir, &child.name);
            let child_attr = fs.getattr(Path::new(&from)).await?;
            if child_attr.is_dir() {
                pending.push((from, to, child_attr.perm));
            } else {
                copy_file(fs, &from, &to, child_attr.perm).await?;
            }
        }
    }
    Ok(())
}

async fn copy_file(fs: &dyn VfsOps, src: &str, dst: &str, perm: u32) -> VfsResult<()> {
    let dst_path = Path::new(dst);
    open_truncated(fs, dst_path, perm & 0o7777).await?;

    let mut offset = 0u64;
    loop {
        let chunk = fs.read(Path::new(src), offset, READ_CHUNK).await?;
        if chunk.is_empty() {
            break;
        }
        fs.write(dst_path, offset, &chunk).await?;
        offset += chunk.len() as u64;
    }
    Ok(())
}

/// Move `src` to `dst`.
///
/// Uses the backend's rename, falling back to copy and remove when the two
/// paths sit on different devices.
pub async fn move_file(fs: &dyn VfsOps, src: &str, dst: &str) -> VfsResult<()> {
    let src = paths::clean(src);
    let dst = paths::clean(dst);
    if src == dst {
        return Ok(());
    }
    if paths::is_within(&dst, &src) {
        return Err(VfsError::invalid_path(format!(
            "cannot move {src} into itself"
        )));
    }

    match fs.rename(Path::new(&src), Path::new(&dst)).await {
        Err(VfsError::CrossDeviceLink) => {
            tracing::debug!(%src, %dst, "rename crosses devices, copying instead");
            copy(fs, &src, &dst).await?;
            fs.remove_all(Path::new(&src)).await
        }
        other => other,
    }
}

/// Stream `body` into the file at `path`, replacing its contents.
///
/// Missing parent directories are created. Returns the written file's
/// attributes.
pub async fn write_file<S, E>(fs: &dyn VfsOps, path: &str, mut body: S) -> VfsResult<FileAttr>
where
    S: Stream<Item = Result<Bytes, E>> + Send + Unpin,
    E: Into<Box<dyn std::error::Error + Send + Sync>> + Send,
{
    let file = Path::new(path);
    fs.mkdir(Path::new(&paths::parent(path)), 0o755).await?;
    open_truncated(fs, file, 0o644).await?;

    let mut offset = 0u64;
    while let Some(chunk) = body.next().await {
        let chunk = chunk.map_err(|e| VfsError::Io(io::Error::other(e)))?;
        let mut written = 0;
        while written < chunk.len() {
            let n = fs.write(file, offset, &chunk[written..]).await? as usize;
            if n == 0 {
                return Err(VfsError::Io(io::ErrorKind::WriteZero.into()));
            }
            written += n;
            offset += n as u64;
        }
    }

    fs.getattr(file).await
}

async fn open_truncated(fs: &dyn VfsOps, path: &Path, perm: u32) -> VfsResult<()> {
    match fs.getattr(path).await {
        Ok(attr) if attr.is_dir() => Err(VfsError::is_a_directory(path.display().to_string())),
        Ok(_) => fs.truncate(path, 0).await,
        Err(e) if e.is_not_found() => fs.create(path, perm).await.map(|_| ()),
        Err(e) => Err(e),
    }
}
