//! Error types shared across the crate

use thiserror::Error;

/// Errors raised while loading or evaluating the model artifacts
#[derive(Error, Debug)]
pub enum ModelError {
    #[error("Failed to read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse {path}: {reason}")]
    Parse { path: String, reason: String },

    #[error("Malformed UBJSON at byte {offset}: {reason}")]
    Ubjson { offset: usize, reason: String },

    #[error("Invalid booster: {0}")]
    InvalidBooster(String),

    #[error("Unsupported objective: {0}")]
    UnsupportedObjective(String),

    #[error("Unknown class label: {0}")]
    UnknownLabel(String),

    #[error("Class index {index} out of range for {num_classes} classes")]
    ClassIndexOutOfRange { index: usize, num_classes: usize },

    #[error("Model bundle mismatch: {0}")]
    BundleMismatch(String),
}

/// Errors raised while assembling feature vectors
#[derive(Error, Debug, PartialEq)]
pub enum FeatureError {
    #[error("Unknown feature: {0}")]
    UnknownFeature(String),

    #[error("Expected {expected} features, got {actual}")]
    FeatureCountMismatch { expected: usize, actual: usize },

    #[error("Feature matrix has no rows")]
    EmptyMatrix,
}

/// Errors raised while loading configuration
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid config file {path}: {source}")]
    Toml {
        path: String,
        #[source]
        source: toml::de::Error,
    },

    #[error("Invalid value for {key}: {value}")]
    InvalidValue { key: String, value: String },
}

pub type ModelResult<T> = Result<T, ModelError>;
