// Configuration and errors
pub mod config;
pub mod error;

// Model artifacts and inference
pub mod model;
pub mod features;
pub mod prediction;

// Analyzer surfaces
pub mod chart;
pub mod web;

// Re-export commonly used types for convenience
pub use config::Config;
pub use error::{ConfigError, FeatureError, ModelError, ModelResult};
pub use features::{CoinData, FeatureColumns, FeatureMatrix, FeatureVector};
pub use model::{Booster, LabelEncoder, ModelBundle, ModelMetadata};
pub use prediction::{Prediction, Predictor};
