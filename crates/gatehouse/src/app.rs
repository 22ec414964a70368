use std::time::Duration;

use axum::{http::StatusCode, routing::get, Router};
use gatehouse_auth::{auth_routes, AuthState};
use tower_http::{timeout::TimeoutLayer, trace::TraceLayer};

/// Create the application router with all routes and middleware.
pub fn create_app(state: AuthState) -> Router {
    Router::new()
        .route("/livez", get(livez))
        .merge(auth_routes())
        .layer(TraceLayer::new_for_http())
        .layer(TimeoutLayer::with_status_code(
            StatusCode::REQUEST_TIMEOUT,
            Duration::from_secs(10),
        ))
        .with_state(state)
}

async fn livez() -> &'static str {
    "ok"
}
