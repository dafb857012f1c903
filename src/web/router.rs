//! Web application router and middleware setup.

use super::{handlers, websocket, AppState, WebConfig};
use axum::{
    routing::{get, post},
    Router,
};
use std::path::PathBuf;
use tower::ServiceBuilder;
use tower_http::{
    cors::{Any, CorsLayer},
    services::{ServeDir, ServeFile},
    trace::TraceLayer,
};
use tracing::info;

/// Create the axum application with all routes and middleware.
pub fn create_app(config: &WebConfig, state: AppState) -> Router {
    let mut app = Router::new()
        .route("/api/scan", get(handlers::scan))
        .route("/api/power/on", post(handlers::power_on))
        .route("/api/power/off", post(handlers::power_off))
        .route("/api/status", get(handlers::status))
        .route("/api/command", post(handlers::custom_command))
        .route("/api/health", get(handlers::health_check))
        .route("/ws", get(websocket::websocket_handler));

    let static_dir = config
        .static_path
        .as_ref()
        .map(PathBuf::from)
        .filter(|dir| dir.join("index.html").is_file());

    app = match static_dir {
        Some(dir) => {
            info!("Serving control page from: {:?}", dir);
            app.route_service("/", ServeFile::new(dir.join("index.html")))
                .nest_service("/static", ServeDir::new(dir))
        }
        None => app.route("/", get(handlers::default_index)),
    };

    let mut app = app.with_state(state);

    if config.enable_cors {
        app = app.layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        );
    }

    app.layer(ServiceBuilder::new().layer(TraceLayer::new_for_http()))
}
