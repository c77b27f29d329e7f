//! HTTP server setup and configuration

use axum::http::HeaderValue;
use axum::Router;
use swapline_core::ApiConfig;
use tower_http::{
    cors::{AllowOrigin, Any, CorsLayer},
    trace::TraceLayer,
};

use crate::routes::create_router;
use crate::AppState;

/// CORS for the configured origins, or any origin when none are listed
fn cors_layer(config: &ApiConfig) -> CorsLayer {
    let layer = CorsLayer::new().allow_methods(Any).allow_headers(Any);
    if config.cors_origins.is_empty() {
        return layer.allow_origin(Any);
    }
    let origins: Vec<HeaderValue> = config
        .cors_origins
        .iter()
        .filter_map(|origin| match HeaderValue::from_str(origin) {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!(origin = %origin, "Ignoring unusable CORS origin");
                None
            }
        })
        .collect();
    layer.allow_origin(AllowOrigin::list(origins))
}

/// Create the full application router with middleware
pub fn create_app(state: AppState, config: &ApiConfig) -> Router {
    create_router(state)
        .layer(TraceLayer::new_for_http())
        .layer(cors_layer(config))
}

/// Bind the configured address and serve until the listener fails
pub async fn start_server(state: AppState, config: &ApiConfig) -> Result<(), std::io::Error> {
    let app = create_app(state, config);
    let addr = config.socket_addr();

    tracing::info!(
        addr = %addr,
        cors_origins = ?config.cors_origins,
        "Starting API server"
    );

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
