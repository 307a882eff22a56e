//! Ordered feature-name list the model was trained on

use std::collections::HashMap;
use std::path::Path;

use crate::error::{ModelError, ModelResult};

/// The fixed column order of the feature vector, with a name index.
#[derive(Debug, Clone)]
pub struct FeatureColumns {
    names: Vec<String>,
    index: HashMap<String, usize>,
}

impl FeatureColumns {
    pub fn new(names: Vec<String>) -> ModelResult<Self> {
        if names.is_empty() {
            return Err(ModelError::BundleMismatch("feature column list is empty".into()));
        }

        let mut index = HashMap::with_capacity(names.len());
        for (position, name) in names.iter().enumerate() {
            if index.insert(name.clone(), position).is_some() {
                return Err(ModelError::BundleMismatch(format!(
                    "duplicate feature column '{}'",
                    name
                )));
            }
        }

        Ok(Self { names, index })
    }

    pub fn load(path: impl AsRef<Path>) -> ModelResult<Self> {
        let path = path.as_ref();
        let shown = path.display().to_string();
        let content = std::fs::read_to_string(path).map_err(|source| ModelError::Io {
            path: shown.clone(),
            source,
        })?;
        let names: Vec<String> = serde_json::from_str(&content).map_err(|e| ModelError::Parse {
            path: shown,
            reason: e.to_string(),
        })?;
        Self::new(names)
    }

    pub fn save(&self, path: impl AsRef<Path>) -> ModelResult<()> {
        let path = path.as_ref();
        let content = serde_json::to_string_pretty(&self.names).map_err(|e| ModelError::Parse {
            path: path.display().to_string(),
            reason: e.to_string(),
        })?;
        std::fs::write(path, content).map_err(|source| ModelError::Io {
            path: path.display().to_string(),
            source,
        })
    }

    pub fn position(&self, name: &str) -> Option<usize> {
        self.index.get(name).copied()
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_positions_follow_file_order() {
        let columns = FeatureColumns::new(vec!["b".into(), "a".into(), "c".into()]).unwrap();
        assert_eq!(columns.position("a"), Some(1));
        assert_eq!(columns.position("zzz"), None);
        assert_eq!(columns.len(), 3);
    }

    #[test]
    fn test_rejects_duplicates_and_empty() {
        assert!(FeatureColumns::new(vec![]).is_err());
        assert!(FeatureColumns::new(vec!["a".into(), "a".into()]).is_err());
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("feature_columns.json");
        let columns = FeatureColumns::new(vec!["cg_price_usd".into(), "hour_sin".into()]).unwrap();
        columns.save(&path).unwrap();

        let loaded = FeatureColumns::load(&path).unwrap();
        assert_eq!(loaded.names(), columns.names());

        std::fs::write(&path, "{\"not\": \"a list\"}").unwrap();
        assert!(matches!(FeatureColumns::load(&path), Err(ModelError::Parse { .. })));
    }
}
