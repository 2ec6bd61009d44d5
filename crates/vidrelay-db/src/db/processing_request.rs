use async_trait::async_trait;
use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use serde_json::Value as JsonValue;
use sqlx::types::Json;
use sqlx::{PgPool, Postgres};
use uuid::Uuid;
use vidrelay_core::models::{NewProcessingRequest, ProcessingRequest, Resolution};
use vidrelay_core::AppError;

use crate::traits::ProcessingRequestStore;

const SELECT_COLUMNS: &str = r#"
    id, uuid, video_id, resolution, download_url, upload_url, webhook_url,
    download_provider, upload_provider, status, history, metadata,
    output_file_size_mb, video_duration, created_at, updated_at
"#;

#[derive(sqlx::FromRow)]
struct ProcessingRequestRow {
    id: Uuid,
    uuid: Option<String>,
    video_id: Uuid,
    resolution: Resolution,
    download_url: String,
    upload_url: String,
    webhook_url: String,
    download_provider: String,
    upload_provider: String,
    status: String,
    history: Json<IndexMap<String, String>>,
    metadata: Json<JsonValue>,
    output_file_size_mb: Option<f64>,
    video_duration: Option<f64>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<ProcessingRequestRow> for ProcessingRequest {
    fn from(row: ProcessingRequestRow) -> Self {
        ProcessingRequest {
            id: row.id,
            uuid: row.uuid,
            video_id: row.video_id,
            resolution: row.resolution,
            download_url: row.download_url,
            upload_url: row.upload_url,
            webhook_url: row.webhook_url,
            download_provider: row.download_provider,
            upload_provider: row.upload_provider,
            status: row.status,
            history: row.history.0,
            metadata: row.metadata.0,
            output_file_size_mb: row.output_file_size_mb,
            video_duration: row.video_duration,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

/// Postgres-backed processing request repository
#[derive(Clone)]
pub struct ProcessingRequestRepository {
    pool: PgPool,
}

impl ProcessingRequestRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ProcessingRequestStore for ProcessingRequestRepository {
    #[tracing::instrument(
        skip(self, request),
        fields(db.table = "video_processing_requests", db.operation = "insert", video_id = %request.video_id)
    )]
    async fn create(&self, request: NewProcessingRequest) -> Result<ProcessingRequest, AppError> {
        let row = sqlx::query_as::<Postgres, ProcessingRequestRow>(&format!(
            r#"
            INSERT INTO video_processing_requests (
                id, video_id, resolution, download_url, upload_url, webhook_url,
                download_provider, upload_provider, status
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, 'pending')
            RETURNING {}
            "#,
            SELECT_COLUMNS
        ))
        .bind(Uuid::new_v4())
        .bind(request.video_id)
        .bind(request.resolution)
        .bind(request.download_url)
        .bind(request.upload_url)
        .bind(request.webhook_url)
        .bind(request.download_provider)
        .bind(request.upload_provider)
        .fetch_one(&self.pool)
        .await?;

        Ok(row.into())
    }

    #[tracing::instrument(
        skip(self),
        fields(db.table = "video_processing_requests", db.operation = "select", db.record_id = %id)
    )]
    async fn get(&self, id: Uuid) -> Result<Option<ProcessingRequest>, AppError> {
        let row = sqlx::query_as::<Postgres, ProcessingRequestRow>(&format!(
            "SELECT {} FROM video_processing_requests WHERE id = $1",
            SELECT_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(Into::into))
    }

    #[tracing::instrument(
        skip(self),
        fields(db.table = "video_processing_requests", db.operation = "select")
    )]
    async fn find_by_uuid(&self, uuid: &str) -> Result<Option<ProcessingRequest>, AppError> {
        let row = sqlx::query_as::<Postgres, ProcessingRequestRow>(&format!(
            "SELECT {} FROM video_processing_requests WHERE uuid = $1",
            SELECT_COLUMNS
        ))
        .bind(uuid)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(Into::into))
    }

    #[tracing::instrument(
        skip(self),
        fields(db.table = "video_processing_requests", db.operation = "update", db.record_id = %id)
    )]
    async fn assign_uuid(&self, id: Uuid, uuid: &str) -> Result<bool, AppError> {
        let result = sqlx::query(
            r#"
            UPDATE video_processing_requests
            SET uuid = $2, updated_at = NOW()
            WHERE id = $1 AND uuid IS NULL
            "#,
        )
        .bind(id)
        .bind(uuid)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    #[tracing::instrument(
        skip(self, request),
        fields(db.table = "video_processing_requests", db.operation = "update", db.record_id = %request.id)
    )]
    async fn save_transition(&self, request: &ProcessingRequest) -> Result<(), AppError> {
        // Bound as text: a jsonb parameter would reorder the history keys.
        let history = serde_json::to_string(&request.history)
            .map_err(|e| AppError::Internal(format!("Failed to encode history: {}", e)))?;

        let result = sqlx::query(
            r#"
            UPDATE video_processing_requests
            SET status = $2,
                history = $3::json,
                metadata = $4,
                output_file_size_mb = $5,
                video_duration = $6,
                updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(request.id)
        .bind(&request.status)
        .bind(history)
        .bind(Json(&request.metadata))
        .bind(request.output_file_size_mb)
        .bind(request.video_duration)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(format!(
                "Processing request {} not found",
                request.id
            )));
        }

        Ok(())
    }

    #[tracing::instrument(
        skip(self),
        fields(db.table = "video_processing_requests", db.operation = "select", video_id = %video_id)
    )]
    async fn list_for_video(&self, video_id: Uuid) -> Result<Vec<ProcessingRequest>, AppError> {
        let rows = sqlx::query_as::<Postgres, ProcessingRequestRow>(&format!(
            "SELECT {} FROM video_processing_requests WHERE video_id = $1 ORDER BY created_at DESC",
            SELECT_COLUMNS
        ))
        .bind(video_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(Into::into).collect())
    }
}
