use axum::Router;
use axum::http::{HeaderValue, Method};
use axum::routing::get;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;
use tracing::warn;

use super::handlers;
use super::state::SharedState;
use crate::config::AppConfig;
use crate::ws;

/// Build the Axum router with all routes and middleware.
pub fn create_router(state: SharedState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(allowed_origin(&state.config))
        .allow_methods([Method::GET, Method::POST])
        .allow_headers(Any);

    let mut router = Router::new()
        // Health check (outside /api prefix)
        .route("/health", get(handlers::health))
        // Room introspection
        .route("/api/rooms", get(handlers::list_rooms))
        .route("/api/rooms/{room}", get(handlers::get_room))
        // WebSocket — the relay itself
        .route("/ws", get(ws::ws_handler));

    // Client assets
    if let Some(dir) = state.config.static_dir.as_ref() {
        if dir.is_dir() {
            router = router.fallback_service(ServeDir::new(dir));
        } else {
            warn!(dir = %dir.display(), "STATIC_DIR is not a directory, not serving assets");
        }
    }

    router
        // Middleware
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

fn allowed_origin(config: &AppConfig) -> AllowOrigin {
    if config.allows_any_origin() {
        return AllowOrigin::any();
    }
    match HeaderValue::from_str(&config.allowed_origin) {
        Ok(origin) => AllowOrigin::exact(origin),
        Err(e) => {
            warn!(origin = %config.allowed_origin, "invalid ALLOWED_ORIGIN, CORS disabled: {e}");
            AllowOrigin::list(std::iter::empty::<HeaderValue>())
        }
    }
}
