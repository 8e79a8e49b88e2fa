//! Error types for the DweepLingo translation engine

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Model not found at {path}. Run dweeplingo-fetch first to download the models")]
    MissingBundle { path: String },

    #[error("Model loading failed: {0}")]
    ModelLoadError(String),

    #[error("Download failed: {0}")]
    DownloadError(String),

    #[error("Bundle integrity check failed: {0}")]
    IntegrityError(String),

    #[error("Tokenization error: {0}")]
    TokenizationError(String),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Model {0} not available")]
    Unavailable(String),

    #[error("Translation error: {0}")]
    InferenceError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("HuggingFace Hub error: {0}")]
    HfHubError(String),

    #[error("Candle error: {0}")]
    CandleError(#[from] candle_core::Error),

    #[error("Safetensors error: {0}")]
    SafetensorsError(String),
}

/// Coarse classification used by callers to pick a client-visible outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// The caller asked for something malformed.
    InvalidRequest,
    /// The request was valid but the capability is not up.
    Unavailable,
    /// Anything else.
    Internal,
}

impl Error {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::InvalidRequest(_) => ErrorKind::InvalidRequest,
            Error::Unavailable(_) => ErrorKind::Unavailable,
            _ => ErrorKind::Internal,
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;

impl From<hf_hub::api::sync::ApiError> for Error {
    fn from(e: hf_hub::api::sync::ApiError) -> Self {
        Error::HfHubError(e.to_string())
    }
}

impl From<safetensors::SafeTensorError> for Error {
    fn from(e: safetensors::SafeTensorError) -> Self {
        Error::SafetensorsError(e.to_string())
    }
}

impl From<config::ConfigError> for Error {
    fn from(e: config::ConfigError) -> Self {
        Error::ConfigError(e.to_string())
    }
}
