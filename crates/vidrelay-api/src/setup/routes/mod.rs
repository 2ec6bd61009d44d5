//! Route configuration and setup.
//!
//! Domain route groups live in [domains](domains).

mod domains;

use crate::api_doc::ApiDoc;
use crate::constants::OPENAPI_PATH;
use crate::error::HttpAppError;
use crate::state::AppState;
use axum::{
    http::{HeaderValue, Method},
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use std::any::Any;
use std::sync::Arc;
use std::time::Duration;
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::cors::{Any as AnyOrigin, CorsLayer};
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;
use utoipa::OpenApi;
use vidrelay_core::{AppError, Config};

/// Setup all application routes
pub fn setup_routes(config: &Config, state: Arc<AppState>) -> Result<Router<()>, anyhow::Error> {
    let cors = setup_cors(config)?;

    let request_timeout_secs = config.request_timeout_secs().max(1);
    tracing::info!(request_timeout_secs, "Request timeout layer enabled");

    let max_chunk_size_bytes = config.upload().max_chunk_size_bytes;
    tracing::info!(max_chunk_size_bytes, "Chunk body limit enabled");

    let app = Router::new()
        .merge(domains::upload_routes(max_chunk_size_bytes))
        .merge(domains::webhook_routes())
        .merge(domains::video_routes())
        .merge(domains::health_routes())
        .route(OPENAPI_PATH, get(openapi_json))
        .merge(utoipa_rapidoc::RapiDoc::new(OPENAPI_PATH).path("/docs"))
        .layer(TimeoutLayer::new(Duration::from_secs(request_timeout_secs)))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .layer(CatchPanicLayer::custom(handle_panic))
        .with_state(state);

    Ok(app)
}

async fn openapi_json() -> impl IntoResponse {
    Json(ApiDoc::openapi())
}

fn handle_panic(err: Box<dyn Any + Send + 'static>) -> Response {
    let message = err
        .downcast_ref::<String>()
        .map(String::as_str)
        .or_else(|| err.downcast_ref::<&str>().copied())
        .unwrap_or("unknown panic");
    tracing::error!(panic = %message, "Handler panicked");
    HttpAppError(AppError::Internal(message.to_string())).into_response()
}

fn setup_cors(config: &Config) -> Result<CorsLayer, anyhow::Error> {
    let methods = [Method::GET, Method::POST, Method::PUT, Method::OPTIONS];
    let cors = if config.cors_origins().iter().any(|o| o == "*") {
        tracing::warn!("CORS configured to allow all origins - not recommended for production");
        CorsLayer::new()
            .allow_origin(AnyOrigin)
            .allow_methods(methods)
            .allow_headers(AnyOrigin)
    } else {
        let origins = config
            .cors_origins()
            .iter()
            .map(|o| o.parse::<HeaderValue>())
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| anyhow::anyhow!("Invalid CORS origin: {}", e))?;
        CorsLayer::new()
            .allow_origin(origins)
            .allow_methods(methods)
            .allow_headers(AnyOrigin)
    };
    Ok(cors)
}
