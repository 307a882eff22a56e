//! Trained model artifacts and tree-ensemble inference

pub mod ubjson;
pub mod booster;
pub mod label_encoder;
pub mod metadata;
pub mod bundle;

pub use booster::{Booster, Objective, Tree};
pub use label_encoder::LabelEncoder;
pub use metadata::{FeatureImportance, ModelMetadata};
pub use bundle::ModelBundle;
