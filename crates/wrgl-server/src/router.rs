use axum::extract::DefaultBodyLimit;
use axum::routing::{get, post};
use axum::Router;
use tower_http::trace::TraceLayer;
use wrgl_protocol::endpoints;

use crate::handler::{self, AppState};

/// Build the axum router with all sync endpoints.
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route(endpoints::REFS, get(handler::get_refs))
        .route(endpoints::UPLOAD_PACK, post(handler::upload_pack))
        .route(endpoints::RECEIVE_PACK, post(handler::receive_pack))
        .route(endpoints::OBJECTS, post(handler::get_objects))
        .layer(DefaultBodyLimit::max(state.max_request_body))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
