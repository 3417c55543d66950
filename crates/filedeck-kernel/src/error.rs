//! Resource service error types.

use std::io;
use thiserror::Error;

use crate::vfs::VfsError;

/// Errors surfaced by the resource service.
#[derive(Debug, Error)]
pub enum ResourceError {
    /// Principal lacks the capability or an access rule denies the path.
    #[error("permission denied")]
    PermissionDenied,

    #[error("not found: {0}")]
    NotFound(String),

    /// Target already exists and no override was requested.
    #[error("conflict: {0}")]
    Conflict(String),

    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("method not allowed")]
    MethodNotAllowed,

    /// Mutation attempted against the virtual namespace.
    #[error("read-only namespace: {0}")]
    ReadOnly(String),

    /// A before-hook vetoed the operation.
    #[error("{action} rejected by hook: {reason}")]
    HookRejected { action: String, reason: String },

    #[error(transparent)]
    Vfs(#[from] VfsError),
}

/// Coarse classification the HTTP layer maps onto status codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    PermissionDenied,
    NotFound,
    Conflict,
    InvalidRequest,
    MethodNotAllowed,
    Internal,
}

impl ResourceError {
    pub fn not_found(path: impl Into<String>) -> Self {
        Self::NotFound(path.into())
    }

    pub fn conflict(path: impl Into<String>) -> Self {
        Self::Conflict(path.into())
    }

    pub fn invalid(msg: impl Into<String>) -> Self {
        Self::InvalidRequest(msg.into())
    }

    pub fn read_only(path: impl Into<String>) -> Self {
        Self::ReadOnly(path.into())
    }

    /// Classify this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            ResourceError::PermissionDenied | ResourceError::ReadOnly(_) => {
                ErrorKind::PermissionDenied
            }
            ResourceError::NotFound(_) => ErrorKind::NotFound,
            ResourceError::Conflict(_) => ErrorKind::Conflict,
            ResourceError::InvalidRequest(_) => ErrorKind::InvalidRequest,
            ResourceError::MethodNotAllowed => ErrorKind::MethodNotAllowed,
            ResourceError::HookRejected { .. } => ErrorKind::Internal,
            ResourceError::Vfs(e) => vfs_kind(e),
        }
    }

    /// True when the error means "nothing at this path".
    pub fn is_not_found(&self) -> bool {
        match self {
            ResourceError::NotFound(_) => true,
            ResourceError::Vfs(e) => e.is_not_found(),
            _ => false,
        }
    }
}

fn vfs_kind(e: &VfsError) -> ErrorKind {
    match e {
        VfsError::NotFound(_) => ErrorKind::NotFound,
        VfsError::AlreadyExists(_) => ErrorKind::Conflict,
        VfsError::PermissionDenied(_) | VfsError::PathEscapesRoot(_) | VfsError::ReadOnly => {
            ErrorKind::PermissionDenied
        }
        VfsError::InvalidPath(_) => ErrorKind::InvalidRequest,
        VfsError::Io(io) => match io.kind() {
            io::ErrorKind::NotFound => ErrorKind::NotFound,
            io::ErrorKind::AlreadyExists => ErrorKind::Conflict,
            io::ErrorKind::PermissionDenied => ErrorKind::PermissionDenied,
            _ => ErrorKind::Internal,
        },
        _ => ErrorKind::Internal,
    }
}

pub type ResourceResult<T> = Result<T, ResourceError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kinds() {
        assert_eq!(ResourceError::PermissionDenied.kind(), ErrorKind::PermissionDenied);
        assert_eq!(
            ResourceError::read_only("/virtual").kind(),
            ErrorKind::PermissionDenied
        );
        assert_eq!(ResourceError::conflict("/a").kind(), ErrorKind::Conflict);
        assert_eq!(ResourceError::MethodNotAllowed.kind(), ErrorKind::MethodNotAllowed);
    }

    #[test]
    fn test_vfs_kinds() {
        let kind = |e: VfsError| ResourceError::from(e).kind();
        assert_eq!(kind(VfsError::not_found("/a")), ErrorKind::NotFound);
        assert_eq!(kind(VfsError::already_exists("/a")), ErrorKind::Conflict);
        assert_eq!(kind(VfsError::path_escapes_root("/..")), ErrorKind::PermissionDenied);
        assert_eq!(kind(VfsError::invalid_path("/a")), ErrorKind::InvalidRequest);
        assert_eq!(
            kind(VfsError::Io(io::Error::new(io::ErrorKind::NotFound, "gone"))),
            ErrorKind::NotFound
        );
        assert_eq!(kind(VfsError::other("boom")), ErrorKind::Internal);
    }

    #[test]
    fn test_is_not_found() {
        assert!(ResourceError::not_found("/a").is_not_found());
        assert!(ResourceError::from(VfsError::not_found("/a")).is_not_found());
        assert!(!ResourceError::PermissionDenied.is_not_found());
    }
}
