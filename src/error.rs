//! Error types for the background removal pipeline

use thiserror::Error;

/// Result type alias for pipeline operations
pub type Result<T> = std::result::Result<T, BgError>;

/// Error kinds produced by the pipeline
///
/// `Decode`, `Removal` and `Encode` are the per-item kinds: they are caught at
/// the single-image pipeline boundary and converted into a
/// [`ProcessingResult::Failure`](crate::types::ProcessingResult), never
/// propagated to the batch loop. `InvalidConfig` and `Io` surface directly.
#[derive(Error, Debug)]
pub enum BgError {
    /// Input bytes could not be decoded as an image
    #[error("decode error: {0}")]
    Decode(String),

    /// The background removal backend failed or is unavailable
    #[error("removal error: {0}")]
    Removal(String),

    /// Failure producing an output encoding (PNG, JPEG, WEBP or archive)
    #[error("encode error: {0}")]
    Encode(String),

    /// Invalid configuration or parameters
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// Input/output errors (file not found, permission denied, etc.)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl BgError {
    /// Create a new decode error
    pub fn decode<S: Into<String>>(msg: S) -> Self {
        Self::Decode(msg.into())
    }

    /// Create a new removal error
    pub fn removal<S: Into<String>>(msg: S) -> Self {
        Self::Removal(msg.into())
    }

    /// Create a new encode error
    pub fn encode<S: Into<String>>(msg: S) -> Self {
        Self::Encode(msg.into())
    }

    /// Create a new invalid configuration error
    pub fn invalid_config<S: Into<String>>(msg: S) -> Self {
        Self::InvalidConfig(msg.into())
    }

    /// Create a decode error carrying the source name for context
    pub fn decode_with_source(source_name: &str, error: &image::ImageError) -> Self {
        Self::Decode(format!(
            "failed to decode '{source_name}': {error}. Supported formats: PNG, JPEG, WEBP"
        ))
    }

    /// Create an encode error with format context
    pub fn encode_with_format(format: &str, error: &image::ImageError) -> Self {
        Self::Encode(format!("failed to encode {format} output: {error}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_creation() {
        let err = BgError::decode("truncated stream");
        assert!(matches!(err, BgError::Decode(_)));

        let err = BgError::removal("model not loaded");
        assert!(matches!(err, BgError::Removal(_)));

        let err = BgError::invalid_config("quality out of range");
        assert!(matches!(err, BgError::InvalidConfig(_)));
    }

    #[test]
    fn test_error_display() {
        let err = BgError::removal("inference failed");
        assert_eq!(err.to_string(), "removal error: inference failed");

        let err = BgError::encode("zip entry");
        assert_eq!(err.to_string(), "encode error: zip entry");
    }

    #[test]
    fn test_decode_error_context() {
        let image_err = image::ImageError::IoError(std::io::Error::new(
            std::io::ErrorKind::InvalidData,
            "bad magic",
        ));
        let err = BgError::decode_with_source("photo.png", &image_err);
        let text = err.to_string();
        assert!(text.contains("photo.png"));
        assert!(text.contains("Supported formats"));
    }
}
