//! Liveness and readiness probes.

use crate::constants::HEALTH_CHECK_TIMEOUT_SECS;
use crate::state::HealthState;
use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use serde::Serialize;
use std::fmt::Display;
use std::future::Future;
use std::time::Duration;
use utoipa::ToSchema;

const HEALTHY: &str = "healthy";

/// Run an async check with timeout; returns "healthy", "timeout", or "{prefix}: {error}".
async fn run_check<F, E>(timeout: Duration, f: F, error_prefix: &str) -> String
where
    F: Future<Output = Result<(), E>>,
    E: Display,
{
    match tokio::time::timeout(timeout, f).await {
        Ok(Ok(())) => HEALTHY.to_string(),
        Ok(Err(e)) => format!("{}: {}", error_prefix, e),
        Err(_) => "timeout".to_string(),
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ReadinessResponse {
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub database: Option<String>,
    pub storage: String,
}

/// Liveness probe - process is running.
#[utoipa::path(
    get,
    path = "/health",
    tag = "health",
    responses((status = 200, description = "Process is alive"))
)]
pub async fn liveness_check() -> impl IntoResponse {
    (
        StatusCode::OK,
        Json(serde_json::json!({ "status": "alive" })),
    )
}

/// Readiness probe - database and storage.
#[utoipa::path(
    get,
    path = "/health/ready",
    tag = "health",
    responses(
        (status = 200, description = "Ready to serve", body = ReadinessResponse),
        (status = 503, description = "A dependency is unavailable", body = ReadinessResponse)
    )
)]
pub async fn readiness_check(State(health): State<HealthState>) -> impl IntoResponse {
    let timeout = Duration::from_secs(HEALTH_CHECK_TIMEOUT_SECS);

    let database = match health.pool {
        Some(pool) => Some(
            run_check(
                timeout,
                async move { sqlx::query("SELECT 1").execute(&pool).await.map(drop) },
                "not_ready",
            )
            .await,
        ),
        None => None,
    };

    let storage = health.storage.clone();
    let storage = run_check(
        timeout,
        async move {
            storage
                .exists("health-check-non-existent-key")
                .await
                .map(drop)
        },
        "not_ready",
    )
    .await;

    let ready = storage == HEALTHY && database.as_deref().map_or(true, |d| d == HEALTHY);
    if !ready {
        tracing::error!(database = ?database, storage = %storage, "Readiness check failed");
    }

    let status_code = if ready {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    let response = ReadinessResponse {
        status: if ready { "ready" } else { "not_ready" }.to_string(),
        database,
        storage,
    };

    (status_code, Json(response))
}
