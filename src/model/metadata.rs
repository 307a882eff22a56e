//! Training metadata written alongside the model

use std::collections::BTreeMap;
use std::path::Path;
use serde::{Deserialize, Serialize};

use crate::error::{ModelError, ModelResult};

#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct FeatureImportance {
    pub feature: String,
    pub importance: f64,
}

/// Flat metadata as the training run writes it. Every field is optional so
/// partially populated files still load.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct ModelMetadata {
    pub train_samples: Option<u64>,
    pub test_samples: Option<u64>,
    pub num_features: Option<usize>,
    pub num_classes: Option<usize>,
    pub class_names: Vec<String>,
    pub class_mapping: BTreeMap<String, usize>,
    pub train_accuracy: Option<f64>,
    pub test_accuracy: Option<f64>,
    pub train_f1: Option<f64>,
    pub test_f1: Option<f64>,
    pub cv_mean_accuracy: Option<f64>,
    pub cv_std_accuracy: Option<f64>,
    pub training_date: Option<String>,
    pub best_iteration: Option<usize>,
    pub model_params: BTreeMap<String, serde_json::Value>,
    pub feature_importance_top20: Vec<FeatureImportance>,
}

// Layout produced by the verification step: the same facts grouped by topic.
#[derive(Deserialize)]
struct GroupedMetadata {
    model_info: GroupedModelInfo,
    #[serde(default)]
    performance: GroupedPerformance,
    #[serde(default)]
    data_info: GroupedDataInfo,
    #[serde(default)]
    model_parameters: BTreeMap<String, serde_json::Value>,
}

#[derive(Deserialize, Default)]
#[serde(default)]
struct GroupedModelInfo {
    classes: Vec<String>,
    num_features: Option<usize>,
    training_date: Option<String>,
}

#[derive(Deserialize, Default)]
#[serde(default)]
struct GroupedPerformance {
    train_accuracy: Option<f64>,
    test_accuracy: Option<f64>,
    train_f1_score: Option<f64>,
    test_f1_score: Option<f64>,
    cv_mean_accuracy: Option<f64>,
    cv_std_accuracy: Option<f64>,
}

#[derive(Deserialize, Default)]
#[serde(default)]
struct GroupedDataInfo {
    train_samples: Option<u64>,
    test_samples: Option<u64>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum MetadataFile {
    Grouped(GroupedMetadata),
    Flat(ModelMetadata),
}

impl From<GroupedMetadata> for ModelMetadata {
    fn from(grouped: GroupedMetadata) -> Self {
        let num_classes = (!grouped.model_info.classes.is_empty())
            .then(|| grouped.model_info.classes.len());
        Self {
            train_samples: grouped.data_info.train_samples,
            test_samples: grouped.data_info.test_samples,
            num_features: grouped.model_info.num_features,
            num_classes,
            class_mapping: grouped
                .model_info
                .classes
                .iter()
                .enumerate()
                .map(|(i, c)| (c.clone(), i))
                .collect(),
            class_names: grouped.model_info.classes,
            train_accuracy: grouped.performance.train_accuracy,
            test_accuracy: grouped.performance.test_accuracy,
            train_f1: grouped.performance.train_f1_score,
            test_f1: grouped.performance.test_f1_score,
            cv_mean_accuracy: grouped.performance.cv_mean_accuracy,
            cv_std_accuracy: grouped.performance.cv_std_accuracy,
            training_date: grouped.model_info.training_date,
            best_iteration: None,
            model_params: grouped.model_parameters,
            feature_importance_top20: Vec::new(),
        }
    }
}

impl ModelMetadata {
    pub fn load(path: impl AsRef<Path>) -> ModelResult<Self> {
        let path = path.as_ref();
        let shown = path.display().to_string();
        let content = std::fs::read_to_string(path).map_err(|source| ModelError::Io {
            path: shown.clone(),
            source,
        })?;
        Self::from_json_str(&content).map_err(|reason| ModelError::Parse {
            path: shown,
            reason,
        })
    }

    pub fn from_json_str(content: &str) -> Result<Self, String> {
        let file: MetadataFile = serde_json::from_str(content).map_err(|e| e.to_string())?;
        Ok(match file {
            MetadataFile::Grouped(grouped) => grouped.into(),
            MetadataFile::Flat(flat) => flat,
        })
    }

    /// Class names in encoder order, from `class_names` or else `class_mapping`.
    pub fn ordered_classes(&self) -> Vec<String> {
        if !self.class_names.is_empty() {
            return self.class_names.clone();
        }
        let mut by_index: Vec<(&String, &usize)> = self.class_mapping.iter().collect();
        by_index.sort_by_key(|(_, index)| **index);
        by_index.into_iter().map(|(name, _)| name.clone()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flat_metadata() {
        let metadata = ModelMetadata::from_json_str(
            r#"{
                "train_samples": 8000,
                "test_samples": 2000,
                "num_features": 107,
                "num_classes": 6,
                "class_names": ["BUY", "HOLD", "SELL", "buy", "hold", "sell"],
                "class_mapping": {"BUY": 0, "HOLD": 1, "SELL": 2, "buy": 3, "hold": 4, "sell": 5},
                "train_accuracy": 0.97,
                "test_accuracy": 0.91,
                "train_f1": 0.96,
                "test_f1": 0.9,
                "cv_mean_accuracy": 0.9,
                "cv_std_accuracy": 0.01,
                "training_date": "2025-01-01 12:00:00",
                "best_iteration": 212,
                "model_params": {"max_depth": 8, "objective": "multi:softprob"},
                "feature_importance_top20": [{"feature": "cg_market_cap", "importance": 0.12}]
            }"#,
        )
        .unwrap();

        assert_eq!(metadata.num_features, Some(107));
        assert_eq!(metadata.best_iteration, Some(212));
        assert_eq!(metadata.ordered_classes().len(), 6);
        assert_eq!(metadata.feature_importance_top20[0].feature, "cg_market_cap");
        assert_eq!(metadata.model_params["max_depth"], serde_json::json!(8));
        assert_eq!(metadata.model_params["objective"], "multi:softprob");
    }

    #[test]
    fn test_grouped_metadata() {
        let metadata = ModelMetadata::from_json_str(
            r#"{
                "model_info": {"type": "XGBoost Classifier", "classes": ["BUY", "SELL"], "num_features": 3},
                "performance": {"test_accuracy": 0.8, "test_f1_score": 0.75},
                "data_info": {"train_samples": 10, "test_samples": 3},
                "model_parameters": {"n_estimators": 300}
            }"#,
        )
        .unwrap();

        assert_eq!(metadata.class_names, vec!["BUY", "SELL"]);
        assert_eq!(metadata.num_classes, Some(2));
        assert_eq!(metadata.test_f1, Some(0.75));
        assert_eq!(metadata.train_samples, Some(10));
        assert_eq!(metadata.class_mapping["SELL"], 1);
    }

    #[test]
    fn test_classes_from_mapping_only() {
        let metadata =
            ModelMetadata::from_json_str(r#"{"class_mapping": {"SELL": 1, "BUY": 0, "HOLD": 2}}"#)
                .unwrap();
        assert_eq!(metadata.ordered_classes(), vec!["BUY", "SELL", "HOLD"]);
    }

    #[test]
    fn test_invalid_json() {
        assert!(ModelMetadata::from_json_str("[1, 2").is_err());
    }
}
