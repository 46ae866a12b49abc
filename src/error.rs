//! Error types for parmin.

use thiserror::Error;

/// Main error type for parmin.
#[derive(Error, Debug)]
pub enum ParminError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Source map error: {0}")]
    SourceMap(#[from] sourcemap::Error),

    #[error("Invalid pattern: {0}")]
    InvalidPattern(#[from] regex::Error),

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("Worker error: {0}")]
    Worker(String),

    #[error("Asset '{0}' not found in compilation")]
    AssetNotFound(String),

    #[error("A batch is already in progress ({outstanding} jobs outstanding)")]
    BatchInProgress { outstanding: usize },
}

/// Result type alias for parmin operations.
pub type Result<T> = std::result::Result<T, ParminError>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;

    #[test]
    fn test_config_error_message() {
        let err = ParminError::Config("workers must be at least 1".to_string());
        let msg = err.to_string();
        assert!(msg.contains("Invalid configuration"));
        assert!(msg.contains("workers must be at least 1"));
    }

    #[test]
    fn test_worker_error_message() {
        let err = ParminError::Worker("Failed to spawn worker: no such file".to_string());
        assert_eq!(
            err.to_string(),
            "Worker error: Failed to spawn worker: no such file"
        );
    }

    #[test]
    fn test_asset_not_found_message() {
        let err = ParminError::AssetNotFound("main.js".to_string());
        let msg = err.to_string();
        assert!(msg.contains("main.js"));
        assert!(msg.contains("not found"));
    }

    #[test]
    fn test_batch_in_progress_message() {
        let err = ParminError::BatchInProgress { outstanding: 3 };
        assert!(err.to_string().contains("3 jobs outstanding"));
    }

    #[test]
    fn test_io_error_conversion() {
        let io_err = io::Error::new(io::ErrorKind::NotFound, "file not found");
        let err: ParminError = io_err.into();
        assert!(err.to_string().contains("file not found"));
    }

    #[test]
    fn test_json_error_conversion() {
        let json_err = serde_json::from_str::<serde_json::Value>("{ invalid json }").unwrap_err();
        let err: ParminError = json_err.into();
        assert!(err.to_string().contains("JSON"));
    }

    #[test]
    fn test_regex_error_conversion() {
        let regex_err = regex::Regex::new("(unclosed").unwrap_err();
        let err: ParminError = regex_err.into();
        assert!(err.to_string().starts_with("Invalid pattern"));
    }

    #[test]
    fn test_result_type_alias() {
        fn returns_ok() -> Result<i32> {
            Ok(42)
        }

        fn returns_err() -> Result<i32> {
            Err(ParminError::Worker("gone".into()))
        }

        assert_eq!(returns_ok().unwrap(), 42);
        assert!(returns_err().is_err());
    }
}
