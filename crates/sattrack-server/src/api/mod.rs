//! HTTP and WebSocket API.

mod debug;
pub mod request_id;
mod routes;
pub mod ws;

use std::sync::Arc;

use axum::{middleware, Router};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::state::AppState;

pub fn routes() -> Router<Arc<AppState>> {
    routes::create_router().merge(debug::create_router())
}

/// Full application: routes, state and middleware.
pub fn app(state: Arc<AppState>) -> Router {
    routes()
        .with_state(state)
        .layer(middleware::from_fn(request_id::ensure_request_id))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}
