//! Error types for the face overlay engine.

use thiserror::Error;

/// Main error type for the library
#[derive(Error, Debug)]
pub enum Error {
    /// File I/O operation failed
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Image decoding or encoding failed
    #[error("Image processing error: {0}")]
    Image(#[from] image::ImageError),

    /// Invalid input parameters provided
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Overlay image could not be loaded or normalized
    #[error("Overlay error: {0}")]
    OverlayError(String),

    /// External face detector reported a failure
    #[error("Detector error: {0}")]
    DetectorError(String),

    /// Detection data is malformed
    #[error("Detection data error: {0}")]
    DetectionDataError(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    ConfigError(String),
}

/// Convenience type alias for Results with our Error type
pub type Result<T> = std::result::Result<T, Error>;
