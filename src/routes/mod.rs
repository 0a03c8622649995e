pub mod admin;
pub mod comments;
pub mod dog_records;
pub mod records;

use axum::routing::get;
use axum::Router;
use tower_http::trace::TraceLayer;

use crate::state::AppState;

/// Full HTTP surface with state attached.
pub fn app(state: AppState) -> Router {
    Router::new()
        .route("/healthz", get(healthz))
        .merge(admin::router())
        .merge(records::router())
        .merge(dog_records::router())
        .merge(comments::router())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn healthz() -> &'static str {
    "ok"
}
