pub mod auth;
pub mod product_types;
pub mod products;

#[cfg(test)]
mod tests;

use axum::{
    extract::DefaultBodyLimit,
    http::{header, Method},
    routing::get,
    Router,
};
use tower_http::{
    cors::{Any, CorsLayer},
    services::ServeDir,
    trace::TraceLayer,
};

use crate::handlers::root::{api_root, health_check};
use crate::state::AppState;

/// Builds the whole application: resource routes, uploaded media and the
/// shared middleware stack.
pub fn create_router(state: AppState, max_upload_bytes: usize) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::PATCH,
            Method::DELETE,
        ])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION]);

    let mut router = Router::new()
        .route("/", get(api_root))
        .route("/health", get(health_check))
        .merge(product_types::routes(state.clone()))
        .merge(products::routes(state.clone()))
        .merge(auth::routes());

    // Only a local path prefix can be served from here; an absolute media URL
    // points at some other host.
    let mount = state.media.url_prefix().trim_end_matches('/');
    if mount.starts_with('/') {
        router = router.nest_service(mount, ServeDir::new(state.media.root()));
    }

    router
        .layer(DefaultBodyLimit::max(max_upload_bytes))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
