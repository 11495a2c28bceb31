//! Error types for signflow.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum SignflowError {
    // Configuration errors
    #[error("Configuration file not found at {path}")]
    ConfigFileNotFound { path: String },

    #[error("Failed to parse configuration: {message}")]
    ConfigParse { message: String },

    #[error("Invalid configuration value for {key}: {message}")]
    ConfigInvalidValue { key: String, message: String },

    #[error("Configuration error: {0}")]
    Config(#[from] toml::de::Error),

    // Asset errors (fatal at session start)
    #[error("Model asset invalid: {message}")]
    ModelAsset { message: String },

    #[error("Label asset invalid: {message}")]
    LabelAsset { message: String },

    #[error("Scaler asset invalid: {message}")]
    ScalerAsset { message: String },

    // Inference errors (recoverable per frame)
    #[error("Inference failed: {message}")]
    Inference { message: String },

    #[error("Tensor shape mismatch: expected {expected} floats, got {actual}")]
    TensorShape { expected: usize, actual: usize },

    // Session errors
    #[error("Session is not running")]
    SessionNotRunning,

    #[error("Failed to spawn worker thread: {message}")]
    Spawn { message: String },

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    Other(String),
}

pub type Result<T> = std::result::Result<T, SignflowError>;
