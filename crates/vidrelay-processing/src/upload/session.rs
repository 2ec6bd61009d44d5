//! Upload session resolution
//!
//! Every chunk request carries the Resumable.js parameters. They are parsed into an
//! `UploadSession` on each call; nothing about a session is kept between requests.

use vidrelay_core::constants::{CHUNK_INDEX_WIDTH, CHUNK_SUFFIX, MAX_CHUNK_INDEX};
use vidrelay_core::models::ResumableParams;
use vidrelay_core::AppError;

/// One chunk request of one logical upload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadSession {
    pub total_size: u64,
    pub filename: String,
    pub chunk_index: u32,
    pub chunk_size: u64,
}

impl UploadSession {
    pub fn new(
        filename: impl Into<String>,
        total_size: u64,
        chunk_index: u32,
        chunk_size: u64,
    ) -> Result<Self, AppError> {
        let filename = filename.into();
        validate_filename(&filename)?;
        if total_size == 0 {
            return Err(AppError::InvalidInput(
                "resumableTotalSize must be greater than zero".to_string(),
            ));
        }
        if chunk_index > MAX_CHUNK_INDEX {
            return Err(AppError::InvalidInput(format!(
                "resumableChunkNumber must not exceed {}",
                MAX_CHUNK_INDEX
            )));
        }
        Ok(UploadSession {
            total_size,
            filename,
            chunk_index,
            chunk_size,
        })
    }

    pub fn from_params(params: &ResumableParams) -> Result<Self, AppError> {
        let filename = required(&params.resumable_filename, "resumableFilename")?;
        let total_size = numeric(&params.resumable_total_size, "resumableTotalSize")?;
        let chunk_index = numeric(&params.resumable_chunk_number, "resumableChunkNumber")?;
        let chunk_size = numeric(
            &params.resumable_current_chunk_size,
            "resumableCurrentChunkSize",
        )?;

        Self::new(filename, total_size, chunk_index, chunk_size)
    }

    /// `{total_size}_{filename}`, the prefix shared by every chunk of the upload.
    pub fn session_key(&self) -> String {
        format!("{}_{}", self.total_size, self.filename)
    }

    /// Prefix every chunk name of this session starts with.
    pub fn chunk_prefix(&self) -> String {
        format!("{}{}", self.session_key(), CHUNK_SUFFIX)
    }

    pub fn chunk_name(&self) -> String {
        self.chunk_name_for(self.chunk_index)
    }

    pub fn chunk_name_for(&self, index: u32) -> String {
        format!(
            "{}{:0width$}",
            self.chunk_prefix(),
            index,
            width = CHUNK_INDEX_WIDTH
        )
    }

    /// Lowercase extension of the uploaded file, if any.
    pub fn extension(&self) -> Option<String> {
        self.filename
            .rsplit_once('.')
            .map(|(_, ext)| ext.to_lowercase())
            .filter(|ext| !ext.is_empty())
    }
}

fn validate_filename(filename: &str) -> Result<(), AppError> {
    if filename.contains('/') || filename.contains('\\') {
        return Err(AppError::InvalidFilename(filename.to_string()));
    }
    Ok(())
}

fn required<'a>(value: &'a Option<String>, name: &str) -> Result<&'a str, AppError> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .ok_or_else(|| AppError::MissingParameter(name.to_string()))
}

fn numeric<T: std::str::FromStr>(value: &Option<String>, name: &str) -> Result<T, AppError> {
    required(value, name)?
        .parse::<T>()
        .map_err(|_| AppError::MissingParameter(format!("{} must be a non-negative integer", name)))
}
