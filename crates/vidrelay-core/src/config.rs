//! Configuration module
//!
//! Loaded once at start-up from the process environment and handed to each
//! component through its constructor.

use std::env;
use std::fmt;
use std::path::PathBuf;

use crate::models::{Quality, Resolution};
use crate::storage_types::StorageBackend;

const MAX_CONNECTIONS: u32 = 20;
const CONNECTION_TIMEOUT_SECS: u64 = 30;
const REQUEST_TIMEOUT_SECS: u64 = 300;
const UPLOAD_MAX_SIZE_MB: u64 = 3000;
const MAX_CHUNK_SIZE_MB: usize = 100;
const SIGNED_URL_EXPIRY_SECS: u64 = 3600;
const DEFAULT_PROCESSING_API_URL: &str = "https://process.contentor.app/api/process-video/";
const DEFAULT_UPLOAD_TO: &str = "videos/original";

/// Settings shared by every HTTP service
#[derive(Clone, Debug)]
pub struct BaseConfig {
    pub server_port: u16,
    pub cors_origins: Vec<String>,
    pub db_max_connections: u32,
    pub db_timeout_seconds: u64,
    pub request_timeout_secs: u64,
    pub environment: String,
}

/// Remote transcoding settings. The access token doubles as the webhook HMAC secret.
#[derive(Clone)]
pub struct ProcessingConfig {
    pub api_url: String,
    pub access_key: String,
    pub access_token: String,
    pub download_provider: String,
    pub upload_provider: String,
    pub crf: String,
    pub preset: String,
    pub optimise_for_web: bool,
    pub qualities: Vec<Quality>,
    pub original_resolution: Resolution,
    pub webhook_url: String,
}

impl fmt::Debug for ProcessingConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProcessingConfig")
            .field("api_url", &self.api_url)
            .field("access_key", &self.access_key)
            .field("access_token", &"<redacted>")
            .field("download_provider", &self.download_provider)
            .field("upload_provider", &self.upload_provider)
            .field("crf", &self.crf)
            .field("preset", &self.preset)
            .field("optimise_for_web", &self.optimise_for_web)
            .field("qualities", &self.qualities)
            .field("original_resolution", &self.original_resolution)
            .field("webhook_url", &self.webhook_url)
            .finish()
    }
}

/// Chunked upload settings
#[derive(Clone, Debug)]
pub struct UploadConfig {
    pub chunk_storage_path: PathBuf,
    /// Destination prefix of assembled uploads.
    pub upload_to: String,
    pub max_size_bytes: u64,
    /// Lowercase extensions without the dot. Empty means any.
    pub allowed_extensions: Vec<String>,
    pub max_chunk_size_bytes: usize,
}

/// Video processor configuration
#[derive(Clone, Debug)]
pub struct VideoProcessorConfig {
    pub base: BaseConfig,
    pub database_url: String,
    pub storage_backend: Option<StorageBackend>,
    pub s3_bucket: Option<String>,
    pub s3_region: Option<String>,
    pub s3_endpoint: Option<String>,
    pub aws_region: Option<String>,
    pub aws_access_key_id: Option<String>,
    pub aws_secret_access_key: Option<String>,
    pub local_storage_path: Option<String>,
    pub local_storage_base_url: Option<String>,
    pub signed_url_expiry_secs: u64,
    pub upload: UploadConfig,
    pub processing: ProcessingConfig,
}

/// Application configuration.
#[derive(Clone, Debug)]
pub struct Config(pub Box<VideoProcessorConfig>);

impl Config {
    fn inner(&self) -> &VideoProcessorConfig {
        &self.0
    }

    /// Check if the application is running in production mode
    pub fn is_production(&self) -> bool {
        is_production_env(&self.inner().base.environment)
    }

    pub fn from_env() -> Result<Self, anyhow::Error> {
        let config = VideoProcessorConfig::from_env()?;
        Ok(Config(Box::new(config)))
    }

    pub fn validate(&self) -> Result<(), anyhow::Error> {
        self.inner().validate()
    }

    pub fn server_port(&self) -> u16 {
        self.inner().base.server_port
    }

    pub fn cors_origins(&self) -> &[String] {
        &self.inner().base.cors_origins
    }

    pub fn environment(&self) -> &str {
        &self.inner().base.environment
    }

    pub fn db_max_connections(&self) -> u32 {
        self.inner().base.db_max_connections
    }

    pub fn db_timeout_seconds(&self) -> u64 {
        self.inner().base.db_timeout_seconds
    }

    pub fn request_timeout_secs(&self) -> u64 {
        self.inner().base.request_timeout_secs
    }

    pub fn database_url(&self) -> &str {
        &self.inner().database_url
    }

    pub fn storage_backend(&self) -> Option<StorageBackend> {
        self.inner().storage_backend
    }

    pub fn s3_bucket(&self) -> Option<&str> {
        self.inner().s3_bucket.as_deref()
    }

    pub fn s3_region(&self) -> Option<&str> {
        self.inner().s3_region.as_deref()
    }

    pub fn s3_endpoint(&self) -> Option<&str> {
        self.inner().s3_endpoint.as_deref()
    }

    pub fn aws_region(&self) -> Option<&str> {
        self.inner().aws_region.as_deref()
    }

    pub fn aws_access_key_id(&self) -> Option<&str> {
        self.inner().aws_access_key_id.as_deref()
    }

    pub fn aws_secret_access_key(&self) -> Option<&str> {
        self.inner().aws_secret_access_key.as_deref()
    }

    pub fn local_storage_path(&self) -> Option<&str> {
        self.inner().local_storage_path.as_deref()
    }

    pub fn local_storage_base_url(&self) -> Option<&str> {
        self.inner().local_storage_base_url.as_deref()
    }

    pub fn signed_url_expiry_secs(&self) -> u64 {
        self.inner().signed_url_expiry_secs
    }

    pub fn upload(&self) -> &UploadConfig {
        &self.inner().upload
    }

    pub fn processing(&self) -> &ProcessingConfig {
        &self.inner().processing
    }
}

fn is_production_env(environment: &str) -> bool {
    let env = environment.to_lowercase();
    env == "production" || env == "prod"
}

fn split_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|s| s.trim().to_lowercase())
        .filter(|s| !s.is_empty())
        .collect()
}

impl VideoProcessorConfig {
    pub fn from_env() -> Result<Self, anyhow::Error> {
        dotenvy::dotenv().ok();

        let environment = env::var("ENVIRONMENT")
            .or_else(|_| env::var("APP_ENV"))
            .unwrap_or_else(|_| "development".to_string());

        let cors_origins_str = env::var("CORS_ORIGINS").unwrap_or_else(|_| "*".to_string());
        if is_production_env(&environment) && cors_origins_str.trim() == "*" {
            return Err(anyhow::anyhow!(
                "CORS_ORIGINS cannot be '*' in production. Please specify explicit origins."
            ));
        }

        let cors_origins: Vec<String> = cors_origins_str
            .split(',')
            .map(|s| s.trim().to_string())
            .collect();

        let base = BaseConfig {
            server_port: env::var("PORT")
                .unwrap_or_else(|_| "4000".to_string())
                .parse()
                .map_err(|_| anyhow::anyhow!("PORT must be a valid number"))?,
            cors_origins,
            db_max_connections: env::var("DB_MAX_CONNECTIONS")
                .unwrap_or_else(|_| MAX_CONNECTIONS.to_string())
                .parse()
                .unwrap_or(MAX_CONNECTIONS),
            db_timeout_seconds: env::var("DB_TIMEOUT_SECONDS")
                .unwrap_or_else(|_| CONNECTION_TIMEOUT_SECS.to_string())
                .parse()
                .unwrap_or(CONNECTION_TIMEOUT_SECS),
            request_timeout_secs: env::var("REQUEST_TIMEOUT_SECS")
                .unwrap_or_else(|_| REQUEST_TIMEOUT_SECS.to_string())
                .parse()
                .unwrap_or(REQUEST_TIMEOUT_SECS),
            environment,
        };

        let storage_backend = env::var("STORAGE_BACKEND")
            .ok()
            .and_then(|s| s.parse::<StorageBackend>().ok());

        let upload = UploadConfig {
            chunk_storage_path: env::var("CHUNK_STORAGE_PATH")
                .map(PathBuf::from)
                .unwrap_or_else(|_| env::temp_dir().join("vidrelay-chunks")),
            upload_to: env::var("UPLOAD_TO")
                .unwrap_or_else(|_| DEFAULT_UPLOAD_TO.to_string())
                .trim_matches('/')
                .to_string(),
            max_size_bytes: env::var("UPLOAD_MAX_SIZE_MB")
                .unwrap_or_else(|_| UPLOAD_MAX_SIZE_MB.to_string())
                .parse::<u64>()
                .unwrap_or(UPLOAD_MAX_SIZE_MB)
                * 1024
                * 1024,
            allowed_extensions: env::var("UPLOAD_ALLOWED_EXTENSIONS")
                .map(|s| {
                    split_list(&s)
                        .into_iter()
                        .map(|ext| ext.trim_start_matches('.').to_string())
                        .collect()
                })
                .unwrap_or_default(),
            max_chunk_size_bytes: env::var("MAX_CHUNK_SIZE_MB")
                .unwrap_or_else(|_| MAX_CHUNK_SIZE_MB.to_string())
                .parse::<usize>()
                .unwrap_or(MAX_CHUNK_SIZE_MB)
                * 1024
                * 1024,
        };

        let qualities = split_list(
            &env::var("PROCESSING_RESOLUTIONS").unwrap_or_else(|_| "original".to_string()),
        )
        .iter()
        .map(|s| s.parse::<Quality>())
        .collect::<Result<Vec<_>, _>>()
        .map_err(|e| anyhow::anyhow!("PROCESSING_RESOLUTIONS: {}", e))?;

        let original_resolution = env::var("PROCESSING_ORIGINAL_RESOLUTION")
            .unwrap_or_else(|_| "1080p".to_string())
            .parse::<Resolution>()
            .map_err(|e| anyhow::anyhow!("PROCESSING_ORIGINAL_RESOLUTION: {}", e))?;

        let webhook_url = match env::var("WEBHOOK_URL") {
            Ok(url) => url,
            Err(_) => {
                let base_url = env::var("BASE_URL").map_err(|_| {
                    anyhow::anyhow!("WEBHOOK_URL or BASE_URL must be set for processing callbacks")
                })?;
                format!(
                    "{}{}",
                    base_url.trim_end_matches('/'),
                    crate::constants::WEBHOOK_ROUTE
                )
            }
        };

        let processing = ProcessingConfig {
            api_url: env::var("PROCESSING_API_URL")
                .unwrap_or_else(|_| DEFAULT_PROCESSING_API_URL.to_string()),
            access_key: env::var("PROCESSING_ACCESS_KEY").unwrap_or_default(),
            access_token: env::var("PROCESSING_ACCESS_TOKEN").map_err(|_| {
                anyhow::anyhow!("PROCESSING_ACCESS_TOKEN must be set to sign and verify webhooks")
            })?,
            download_provider: env::var("PROCESSING_DOWNLOAD_PROVIDER")
                .unwrap_or_else(|_| "aws".to_string()),
            upload_provider: env::var("PROCESSING_UPLOAD_PROVIDER")
                .unwrap_or_else(|_| "aws".to_string()),
            crf: env::var("PROCESSING_CRF").unwrap_or_else(|_| "30".to_string()),
            preset: env::var("PROCESSING_PRESET").unwrap_or_else(|_| "ultrafast".to_string()),
            optimise_for_web: env::var("PROCESSING_OPTIMISE_FOR_WEB")
                .unwrap_or_else(|_| "true".to_string())
                .to_lowercase()
                .parse()
                .unwrap_or(true),
            qualities,
            original_resolution,
            webhook_url,
        };

        let config = VideoProcessorConfig {
            base,
            database_url: env::var("DATABASE_URL")
                .map_err(|_| anyhow::anyhow!("DATABASE_URL must be set"))?,
            storage_backend,
            s3_bucket: env::var("S3_BUCKET").ok(),
            s3_region: env::var("S3_REGION").ok(),
            s3_endpoint: env::var("S3_ENDPOINT").ok(),
            aws_region: env::var("AWS_REGION").ok(),
            aws_access_key_id: env::var("AWS_ACCESS_KEY_ID").ok(),
            aws_secret_access_key: env::var("AWS_SECRET_ACCESS_KEY").ok(),
            local_storage_path: env::var("LOCAL_STORAGE_PATH").ok(),
            local_storage_base_url: env::var("LOCAL_STORAGE_BASE_URL").ok(),
            signed_url_expiry_secs: env::var("SIGNED_URL_EXPIRY_SECS")
                .unwrap_or_else(|_| SIGNED_URL_EXPIRY_SECS.to_string())
                .parse()
                .unwrap_or(SIGNED_URL_EXPIRY_SECS),
            upload,
            processing,
        };

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), anyhow::Error> {
        if !self.database_url.starts_with("postgres://")
            && !self.database_url.starts_with("postgresql://")
        {
            return Err(anyhow::anyhow!(
                "DATABASE_URL must be a valid PostgreSQL connection string"
            ));
        }

        if self.processing.access_token.is_empty() {
            return Err(anyhow::anyhow!("PROCESSING_ACCESS_TOKEN must not be empty"));
        }

        if self.processing.qualities.is_empty() {
            return Err(anyhow::anyhow!(
                "PROCESSING_RESOLUTIONS must list at least one resolution"
            ));
        }

        if self.upload.max_chunk_size_bytes == 0 {
            return Err(anyhow::anyhow!("MAX_CHUNK_SIZE_MB must be greater than zero"));
        }

        let backend = self.storage_backend.unwrap_or(StorageBackend::S3);
        match backend {
            StorageBackend::S3 => {
                if self.s3_bucket.is_none() {
                    return Err(anyhow::anyhow!(
                        "S3_BUCKET must be set when using S3 storage backend"
                    ));
                }
                if self.s3_region.is_none() && self.aws_region.is_none() {
                    return Err(anyhow::anyhow!(
                        "S3_REGION or AWS_REGION must be set when using S3 storage backend"
                    ));
                }
            }
            StorageBackend::Local => {
                if self.local_storage_path.is_none() {
                    return Err(anyhow::anyhow!(
                        "LOCAL_STORAGE_PATH must be set when using local storage backend"
                    ));
                }
                if self.local_storage_base_url.is_none() {
                    return Err(anyhow::anyhow!(
                        "LOCAL_STORAGE_BASE_URL must be set when using local storage backend"
                    ));
                }
            }
        }

        Ok(())
    }
}
