//! Route table.

use axum::Router;
use axum::routing::{MethodRouter, get};
use tower_http::trace::TraceLayer;

use crate::handlers;
use crate::state::AppState;

/// Build the application router.
///
/// Wildcards never match an empty tail, so each prefix is routed bare, with
/// a trailing slash, and with a path.
pub fn router(state: AppState) -> Router {
    let resources: MethodRouter<AppState> = get(handlers::get_resource)
        .post(handlers::create_resource)
        .put(handlers::update_resource)
        .patch(handlers::patch_resource)
        .delete(handlers::delete_resource);
    let usage: MethodRouter<AppState> = get(handlers::disk_usage);

    Router::new()
        .route("/api/resources", resources.clone())
        .route("/api/resources/", resources.clone())
        .route("/api/resources/{*path}", resources)
        .route("/api/usage", usage.clone())
        .route("/api/usage/", usage.clone())
        .route("/api/usage/{*path}", usage)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
