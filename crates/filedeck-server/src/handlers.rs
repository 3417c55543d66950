//! HTTP handlers for `/api/resources` and `/api/usage`.
//!
//! Handlers only translate between HTTP and [`ResourceService`] calls;
//! every decision lives in the service.
//!
//! [`ResourceService`]: filedeck_kernel::ResourceService

use axum::Json;
use axum::body::Body;
use axum::extract::{Query, State};
use axum::http::{StatusCode, Uri, header};
use axum::response::{IntoResponse, Response};
use serde::Deserialize;

use filedeck_kernel::{CreateOutcome, Entry, LogLookup, PatchRequest, ResourceError};

use crate::auth::Session;
use crate::constants::{RESOURCES_PREFIX, USAGE_PREFIX};
use crate::error::ApiError;
use crate::state::AppState;

#[derive(Debug, Default, Deserialize)]
pub struct GetQuery {
    pub checksum: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct CreateQuery {
    #[serde(rename = "override")]
    pub override_existing: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct PatchQuery {
    pub action: Option<String>,
    pub destination: Option<String>,
    #[serde(rename = "override")]
    pub override_existing: Option<String>,
    pub rename: Option<String>,
}

fn flag(value: &Option<String>) -> bool {
    value.as_deref() == Some("true")
}

/// Resource path addressed by `uri` below `prefix`, percent-decoded.
///
/// A trailing slash survives, since it marks directory creation.
pub fn resource_path(uri: &Uri, prefix: &str) -> Result<String, ApiError> {
    let raw = uri.path().strip_prefix(prefix).unwrap_or_default();
    let decoded = urlencoding::decode(raw)
        .map_err(|e| ResourceError::invalid(format!("bad path encoding: {e}")))?;

    Ok(if decoded.starts_with('/') {
        decoded.into_owned()
    } else {
        format!("/{decoded}")
    })
}

pub async fn get_resource(
    State(state): State<AppState>,
    Session(principal): Session,
    uri: Uri,
    Query(query): Query<GetQuery>,
) -> Result<Json<Entry>, ApiError> {
    let path = resource_path(&uri, RESOURCES_PREFIX)?;
    let entry = match state
        .service
        .get(&principal, &path, query.checksum.as_deref())
        .await?
    {
        LogLookup::Found(entry) => entry,
        LogLookup::Missing => Entry::default(),
    };
    Ok(Json(entry))
}

pub async fn create_resource(
    State(state): State<AppState>,
    Session(principal): Session,
    uri: Uri,
    Query(query): Query<CreateQuery>,
    body: Body,
) -> Result<Response, ApiError> {
    let path = resource_path(&uri, RESOURCES_PREFIX)?;
    let outcome = state
        .service
        .create(
            &principal,
            &path,
            flag(&query.override_existing),
            body.into_data_stream(),
        )
        .await?;

    Ok(match outcome {
        CreateOutcome::Directory => StatusCode::OK.into_response(),
        CreateOutcome::File { etag } => (StatusCode::OK, [(header::ETAG, etag)]).into_response(),
    })
}

pub async fn update_resource(
    State(state): State<AppState>,
    Session(principal): Session,
    uri: Uri,
    body: Body,
) -> Result<Response, ApiError> {
    let path = resource_path(&uri, RESOURCES_PREFIX)?;
    let etag = state
        .service
        .update(&principal, &path, body.into_data_stream())
        .await?;
    Ok((StatusCode::OK, [(header::ETAG, etag)]).into_response())
}

pub async fn patch_resource(
    State(state): State<AppState>,
    Session(principal): Session,
    uri: Uri,
    Query(query): Query<PatchQuery>,
) -> Result<StatusCode, ApiError> {
    let path = resource_path(&uri, RESOURCES_PREFIX)?;
    let request = PatchRequest {
        action: query.action.clone().unwrap_or_default(),
        destination: query.destination.clone().unwrap_or_default(),
        override_existing: flag(&query.override_existing),
        rename: flag(&query.rename),
    };
    state.service.patch(&principal, &path, &request).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn delete_resource(
    State(state): State<AppState>,
    Session(principal): Session,
    uri: Uri,
) -> Result<StatusCode, ApiError> {
    let path = resource_path(&uri, RESOURCES_PREFIX)?;
    state.service.delete(&principal, &path).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn disk_usage(
    State(state): State<AppState>,
    Session(principal): Session,
    uri: Uri,
) -> Result<Response, ApiError> {
    let path = resource_path(&uri, USAGE_PREFIX)?;
    let usage = state.service.disk_usage(&principal, &path).await?;
    Ok(Json(usage).into_response())
}
