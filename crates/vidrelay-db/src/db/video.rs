use async_trait::async_trait;
use sqlx::{PgPool, Postgres};
use uuid::Uuid;
use vidrelay_core::models::{slot_column, Quality, Video};
use vidrelay_core::AppError;

use crate::traits::VideoStore;

const SELECT_COLUMNS: &str = r#"
    id, title, video, video_2160p, video_1080p, video_720p, video_480p, video_360p,
    created_at, updated_at
"#;

/// Postgres-backed video repository
#[derive(Clone)]
pub struct VideoRepository {
    pool: PgPool,
}

impl VideoRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl VideoStore for VideoRepository {
    #[tracing::instrument(skip(self, video), fields(db.table = "videos", db.operation = "insert", db.record_id = %video.id))]
    async fn create(&self, video: Video) -> Result<Video, AppError> {
        let created = sqlx::query_as::<Postgres, Video>(&format!(
            r#"
            INSERT INTO videos (
                id, title, video, video_2160p, video_1080p, video_720p, video_480p, video_360p,
                created_at, updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            RETURNING {}
            "#,
            SELECT_COLUMNS
        ))
        .bind(video.id)
        .bind(&video.title)
        .bind(&video.video)
        .bind(&video.video_2160p)
        .bind(&video.video_1080p)
        .bind(&video.video_720p)
        .bind(&video.video_480p)
        .bind(&video.video_360p)
        .bind(video.created_at)
        .bind(video.updated_at)
        .fetch_one(&self.pool)
        .await?;

        Ok(created)
    }

    #[tracing::instrument(skip(self), fields(db.table = "videos", db.operation = "select", db.record_id = %id))]
    async fn get(&self, id: Uuid) -> Result<Option<Video>, AppError> {
        let video = sqlx::query_as::<Postgres, Video>(&format!(
            "SELECT {} FROM videos WHERE id = $1",
            SELECT_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(video)
    }

    #[tracing::instrument(skip(self, key), fields(db.table = "videos", db.operation = "update", db.record_id = %id, slot = %quality))]
    async fn set_slot(
        &self,
        id: Uuid,
        quality: Quality,
        key: Option<String>,
    ) -> Result<Option<Video>, AppError> {
        // Column names come from a fixed table, never from input.
        let video = sqlx::query_as::<Postgres, Video>(&format!(
            "UPDATE videos SET {} = $2, updated_at = NOW() WHERE id = $1 RETURNING {}",
            slot_column(quality),
            SELECT_COLUMNS
        ))
        .bind(id)
        .bind(key)
        .fetch_optional(&self.pool)
        .await?;

        Ok(video)
    }
}
