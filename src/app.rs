use axum::{extract::DefaultBodyLimit, routing::get, Router};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::config::AppConfig;
use crate::handlers;
use crate::state::AppState;

/// Build the router with the layers the configuration asks for
pub fn app(state: AppState, config: &AppConfig) -> Router {
    let router = routes(state).layer(DefaultBodyLimit::max(config.api.max_request_size_bytes));

    let router = if config.api.enable_request_logging {
        router.layer(TraceLayer::new_for_http())
    } else {
        router
    };

    if config.security.enable_cors {
        router.layer(CorsLayer::permissive())
    } else {
        router
    }
}

/// Routes without global middleware
pub fn routes(state: AppState) -> Router {
    Router::new()
        // Public
        .route("/", get(handlers::root))
        .route("/health", get(handlers::health))
        .merge(attendance_routes())
        .merge(message_routes())
        .with_state(state)
}

fn attendance_routes() -> Router<AppState> {
    use handlers::attendance;

    Router::new()
        .route("/api/attendance", get(attendance::verify).post(attendance::verify))
        .route("/api/attendance/verify", get(attendance::verify).post(attendance::verify))
}

fn message_routes() -> Router<AppState> {
    use handlers::message;

    Router::new().route("/api/message", get(message::relay).post(message::relay))
}
