//! Translation of service errors into HTTP responses.
//!
//! This is the only place an error kind becomes a status code.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use thiserror::Error;

use filedeck_kernel::{ErrorKind, ResourceError};

/// Errors a handler can return.
#[derive(Debug, Error)]
pub enum ApiError {
    /// No principal could be resolved for the request.
    #[error("unauthorized")]
    Unauthorized,

    #[error(transparent)]
    Resource(#[from] ResourceError),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Unauthorized => StatusCode::UNAUTHORIZED,
            ApiError::Resource(e) => match e.kind() {
                ErrorKind::PermissionDenied => StatusCode::FORBIDDEN,
                ErrorKind::NotFound => StatusCode::NOT_FOUND,
                ErrorKind::Conflict => StatusCode::CONFLICT,
                ErrorKind::InvalidRequest => StatusCode::BAD_REQUEST,
                ErrorKind::MethodNotAllowed => StatusCode::METHOD_NOT_ALLOWED,
                ErrorKind::Internal => StatusCode::INTERNAL_SERVER_ERROR,
            },
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(error = %self, "request failed");
        } else {
            tracing::debug!(error = %self, %status, "request rejected");
        }
        (status, self.to_string()).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use filedeck_kernel::VfsError;

    #[test]
    fn test_status_mapping() {
        let status = |e: ResourceError| ApiError::from(e).status();
        assert_eq!(status(ResourceError::PermissionDenied), StatusCode::FORBIDDEN);
        assert_eq!(status(ResourceError::read_only("/virtual")), StatusCode::FORBIDDEN);
        assert_eq!(status(ResourceError::not_found("/a")), StatusCode::NOT_FOUND);
        assert_eq!(status(ResourceError::conflict("/a")), StatusCode::CONFLICT);
        assert_eq!(status(ResourceError::invalid("bad")), StatusCode::BAD_REQUEST);
        assert_eq!(status(ResourceError::MethodNotAllowed), StatusCode::METHOD_NOT_ALLOWED);
        assert_eq!(
            status(VfsError::other("disk on fire").into()),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(ApiError::Unauthorized.status(), StatusCode::UNAUTHORIZED);
    }
}
