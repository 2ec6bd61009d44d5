//! Job dispatcher
//!
//! Submits transcoding jobs to the remote processing API. Each submission is a
//! single attempt; a failure is returned to the caller and never retried here.

use anyhow::Context;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt::{Debug, Formatter, Result as FmtResult};
use std::time::Duration;
use vidrelay_core::{AppError, ProcessingConfig};

const ACCESS_KEY_HEADER: &str = "X-User-Access-Key";
const ACCESS_TOKEN_HEADER: &str = "X-User-Access-Token";
const DISPATCH_TIMEOUT_SECS: u64 = 30;

/// Job description sent to the processing API.
#[derive(Clone, Serialize)]
pub struct TranscodeJob {
    pub download_provider: String,
    pub upload_provider: String,
    pub download_url: String,
    pub upload_url: String,
    pub webhook_url: String,
    pub crf: String,
    pub preset: String,
    pub optimise_for_web: bool,
    pub download_access_key: String,
    pub download_access_secret: String,
    pub upload_access_key: String,
    pub upload_access_secret: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resolution: Option<String>,
}

impl Debug for TranscodeJob {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.debug_struct("TranscodeJob")
            .field("download_url", &self.download_url)
            .field("upload_url", &self.upload_url)
            .field("resolution", &self.resolution)
            .field("crf", &self.crf)
            .field("preset", &self.preset)
            .finish_non_exhaustive()
    }
}

/// Accepted job as reported by the processing API.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct DispatchedJob {
    pub id: String,
    #[serde(default)]
    pub status: String,
}

#[async_trait]
pub trait JobDispatcher: Send + Sync {
    async fn dispatch(&self, job: &TranscodeJob) -> Result<DispatchedJob, AppError>;
}

/// Dispatcher calling the processing API over HTTP.
pub struct HttpJobDispatcher {
    http_client: reqwest::Client,
    api_url: String,
    access_key: String,
    access_token: String,
}

impl Debug for HttpJobDispatcher {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.debug_struct("HttpJobDispatcher")
            .field("api_url", &self.api_url)
            .finish_non_exhaustive()
    }
}

impl HttpJobDispatcher {
    pub fn new(config: &ProcessingConfig) -> anyhow::Result<Self> {
        let http_client = reqwest::Client::builder()
            .timeout(Duration::from_secs(DISPATCH_TIMEOUT_SECS))
            .build()
            .context("Failed to create HTTP client for the processing API")?;

        Ok(Self {
            http_client,
            api_url: config.api_url.clone(),
            access_key: config.access_key.clone(),
            access_token: config.access_token.clone(),
        })
    }
}

#[async_trait]
impl JobDispatcher for HttpJobDispatcher {
    #[tracing::instrument(skip(self, job), fields(upload_url = %job.upload_url, resolution = ?job.resolution))]
    async fn dispatch(&self, job: &TranscodeJob) -> Result<DispatchedJob, AppError> {
        let response = self
            .http_client
            .post(&self.api_url)
            .header(ACCESS_KEY_HEADER, &self.access_key)
            .header(ACCESS_TOKEN_HEADER, &self.access_token)
            .json(job)
            .send()
            .await
            .map_err(|e| AppError::Dispatch(format!("Failed to reach processing API: {}", e)))?;

        let status = response.status();
        if status != reqwest::StatusCode::OK {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| String::from("Failed to read response body"));
            tracing::error!(status = status.as_u16(), body = %body, "Processing API rejected job");
            return Err(AppError::Dispatch(format!(
                "Processing API returned {}",
                status
            )));
        }

        let accepted: DispatchedJob = response.json().await.map_err(|e| {
            AppError::Dispatch(format!("Invalid response from processing API: {}", e))
        })?;

        tracing::info!(job_uuid = %accepted.id, job_status = %accepted.status, "Processing job submitted");
        Ok(accepted)
    }
}
