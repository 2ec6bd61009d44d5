use vidrelay_core::{AppError, UploadConfig};

use super::session::UploadSession;

/// Limits checked on every chunk request before anything is stored.
#[derive(Debug, Clone)]
pub struct UploadPolicy {
    max_size_bytes: u64,
    allowed_extensions: Vec<String>,
}

impl UploadPolicy {
    pub fn new(max_size_bytes: u64, allowed_extensions: Vec<String>) -> Self {
        Self {
            max_size_bytes,
            allowed_extensions: allowed_extensions
                .into_iter()
                .map(|ext| ext.trim_start_matches('.').to_lowercase())
                .collect(),
        }
    }

    pub fn from_config(config: &UploadConfig) -> Self {
        Self::new(config.max_size_bytes, config.allowed_extensions.clone())
    }

    pub fn check(&self, session: &UploadSession) -> Result<(), AppError> {
        if !self.allowed_extensions.is_empty() {
            let allowed = session
                .extension()
                .is_some_and(|ext| self.allowed_extensions.contains(&ext));
            if !allowed {
                return Err(AppError::InvalidInput(format!(
                    "File type not allowed. Allowed extensions: {}",
                    self.allowed_extensions.join(", ")
                )));
            }
        }

        if session.total_size > self.max_size_bytes {
            return Err(AppError::PayloadTooLarge(format!(
                "Upload of {} bytes exceeds the maximum of {} bytes",
                session.total_size, self.max_size_bytes
            )));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_extension_list_allows_any_file() {
        let policy = UploadPolicy::new(100, vec![]);
        assert!(policy
            .check(&UploadSession::new("notes", 10, 1, 10).unwrap())
            .is_ok());
    }

    #[test]
    fn rejects_disallowed_extension() {
        let policy = UploadPolicy::new(100, vec!["mp4".to_string(), ".MOV".to_string()]);
        assert!(policy
            .check(&UploadSession::new("clip.MOV", 10, 1, 10).unwrap())
            .is_ok());
        assert!(matches!(
            policy.check(&UploadSession::new("clip.exe", 10, 1, 10).unwrap()),
            Err(AppError::InvalidInput(_))
        ));
        assert!(matches!(
            policy.check(&UploadSession::new("clip", 10, 1, 10).unwrap()),
            Err(AppError::InvalidInput(_))
        ));
    }

    #[test]
    fn rejects_oversized_upload() {
        let policy = UploadPolicy::new(100, vec![]);
        assert!(matches!(
            policy.check(&UploadSession::new("clip.mp4", 101, 1, 10).unwrap()),
            Err(AppError::PayloadTooLarge(_))
        ));
        assert!(policy
            .check(&UploadSession::new("clip.mp4", 100, 1, 10).unwrap())
            .is_ok());
    }
}
