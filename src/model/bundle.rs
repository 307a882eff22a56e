//! The deployable model: booster, label encoder, feature columns, metadata

use tracing::{info, warn};

use crate::config::Model as ModelConfig;
use crate::error::{ModelError, ModelResult};
use crate::features::FeatureColumns;
use super::{Booster, LabelEncoder, ModelMetadata};

#[derive(Debug, Clone)]
pub struct ModelBundle {
    booster: Booster,
    label_encoder: LabelEncoder,
    feature_columns: FeatureColumns,
    metadata: ModelMetadata,
}

impl ModelBundle {
    /// Assemble a bundle, checking that the pieces describe the same model.
    pub fn from_parts(
        booster: Booster,
        label_encoder: LabelEncoder,
        feature_columns: FeatureColumns,
        metadata: ModelMetadata,
    ) -> ModelResult<Self> {
        if feature_columns.len() != booster.num_feature() {
            return Err(ModelError::BundleMismatch(format!(
                "{} feature columns but the booster expects {}",
                feature_columns.len(),
                booster.num_feature()
            )));
        }

        if label_encoder.len() != booster.num_classes() {
            return Err(ModelError::BundleMismatch(format!(
                "{} class labels but the booster predicts {} classes",
                label_encoder.len(),
                booster.num_classes()
            )));
        }

        if let Some(n) = metadata.num_features {
            if n != feature_columns.len() {
                warn!(
                    "⚠️ Metadata lists {} features, feature file has {}",
                    n,
                    feature_columns.len()
                );
            }
        }

        if let (Some(meta_best), Some(booster_best)) =
            (metadata.best_iteration, booster.best_iteration())
        {
            if meta_best != booster_best {
                warn!(
                    "⚠️ Metadata best_iteration {} differs from booster's {}",
                    meta_best, booster_best
                );
            }
        }

        Ok(Self {
            booster,
            label_encoder,
            feature_columns,
            metadata,
        })
    }

    pub fn load(config: &ModelConfig) -> ModelResult<Self> {
        info!("📦 Loading model bundle from {}", config.directory.display());

        let booster = Booster::load(config.booster_path())?;
        let feature_columns = FeatureColumns::load(config.feature_columns_path())?;

        let metadata_path = config.metadata_path();
        let metadata = if metadata_path.exists() {
            ModelMetadata::load(&metadata_path)?
        } else {
            warn!("⚠️ No metadata at {}, continuing without it", metadata_path.display());
            ModelMetadata::default()
        };

        let encoder_path = config.label_encoder_path();
        let label_encoder = if encoder_path.exists() {
            LabelEncoder::load(&encoder_path)?
        } else {
            let classes = metadata.ordered_classes();
            if classes.is_empty() {
                return Err(ModelError::BundleMismatch(format!(
                    "no class labels: {} is missing and metadata has no class names",
                    encoder_path.display()
                )));
            }
            LabelEncoder::from_classes(classes)?
        };

        let bundle = Self::from_parts(booster, label_encoder, feature_columns, metadata)?;
        info!(
            "✅ Model ready: classes {:?}, {} features",
            bundle.label_encoder.classes(),
            bundle.feature_columns.len()
        );
        Ok(bundle)
    }

    pub fn booster(&self) -> &Booster {
        &self.booster
    }

    pub fn label_encoder(&self) -> &LabelEncoder {
        &self.label_encoder
    }

    pub fn feature_columns(&self) -> &FeatureColumns {
        &self.feature_columns
    }

    pub fn metadata(&self) -> &ModelMetadata {
        &self.metadata
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::path::Path;
    use crate::model::booster::tests::three_class_document;

    /// Write a complete 3-class, 2-feature artifact set into `dir`.
    pub(crate) fn write_artifacts(dir: &Path) {
        std::fs::write(
            dir.join("smart_meme_coin_xgboost.json"),
            three_class_document(false, None).to_string(),
        )
        .unwrap();
        std::fs::write(dir.join("feature_columns.json"), r#"["cg_price_usd", "hour_of_day"]"#).unwrap();
        std::fs::write(
            dir.join("model_metadata.json"),
            r#"{"num_features": 2, "num_classes": 3, "class_names": ["BUY", "HOLD", "SELL"], "test_accuracy": 0.9}"#,
        )
        .unwrap();
    }

    fn config_for(dir: &Path) -> ModelConfig {
        ModelConfig {
            directory: dir.to_path_buf(),
            ..ModelConfig::default()
        }
    }

    #[test]
    fn test_load_with_classes_from_metadata() {
        let dir = tempfile::tempdir().unwrap();
        write_artifacts(dir.path());

        let bundle = ModelBundle::load(&config_for(dir.path())).unwrap();
        assert_eq!(bundle.label_encoder().classes(), &["BUY", "HOLD", "SELL"]);
        assert_eq!(bundle.feature_columns().position("hour_of_day"), Some(1));
        assert_eq!(bundle.metadata().test_accuracy, Some(0.9));
    }

    #[test]
    fn test_label_encoder_file_takes_precedence() {
        let dir = tempfile::tempdir().unwrap();
        write_artifacts(dir.path());
        std::fs::write(dir.path().join("label_encoder.json"), r#"["buy", "hold", "sell"]"#).unwrap();

        let bundle = ModelBundle::load(&config_for(dir.path())).unwrap();
        assert_eq!(bundle.label_encoder().classes(), &["buy", "hold", "sell"]);
    }

    #[test]
    fn test_mismatched_feature_count_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        write_artifacts(dir.path());
        std::fs::write(dir.path().join("feature_columns.json"), r#"["only_one"]"#).unwrap();

        let err = ModelBundle::load(&config_for(dir.path())).unwrap_err();
        assert!(matches!(err, ModelError::BundleMismatch(_)), "{}", err);
    }

    #[test]
    fn test_mismatched_class_count_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        write_artifacts(dir.path());
        std::fs::write(dir.path().join("label_encoder.json"), r#"["BUY", "SELL"]"#).unwrap();

        assert!(ModelBundle::load(&config_for(dir.path())).is_err());
    }

    #[test]
    fn test_missing_labels_everywhere() {
        let dir = tempfile::tempdir().unwrap();
        write_artifacts(dir.path());
        std::fs::remove_file(dir.path().join("model_metadata.json")).unwrap();

        assert!(matches!(
            ModelBundle::load(&config_for(dir.path())),
            Err(ModelError::BundleMismatch(_))
        ));
    }
}
