//! Mapping between class names and the indices the classifier outputs

use std::path::Path;
use serde::{Deserialize, Serialize};

use crate::error::{ModelError, ModelResult};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LabelEncoder {
    classes: Vec<String>,
}

/// On-disk forms: a bare array or `{"classes": [...]}`.
#[derive(Deserialize)]
#[serde(untagged)]
enum EncoderFile {
    Classes(Vec<String>),
    Wrapped { classes: Vec<String> },
}

impl LabelEncoder {
    /// Classes are stored sorted, the order a label encoder fit assigns.
    pub fn fit<I, S>(labels: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut classes: Vec<String> = labels.into_iter().map(Into::into).collect();
        classes.sort();
        classes.dedup();
        Self { classes }
    }

    /// Use an already-ordered class list as is.
    pub fn from_classes(classes: Vec<String>) -> ModelResult<Self> {
        if classes.is_empty() {
            return Err(ModelError::BundleMismatch("label encoder has no classes".into()));
        }
        for (i, class) in classes.iter().enumerate() {
            if classes[..i].contains(class) {
                return Err(ModelError::BundleMismatch(format!(
                    "duplicate class label '{}'",
                    class
                )));
            }
        }
        Ok(Self { classes })
    }

    pub fn load(path: impl AsRef<Path>) -> ModelResult<Self> {
        let path = path.as_ref();
        let shown = path.display().to_string();
        let content = std::fs::read_to_string(path).map_err(|source| ModelError::Io {
            path: shown.clone(),
            source,
        })?;
        let file: EncoderFile = serde_json::from_str(&content).map_err(|e| ModelError::Parse {
            path: shown,
            reason: e.to_string(),
        })?;

        let classes = match file {
            EncoderFile::Classes(classes) => classes,
            EncoderFile::Wrapped { classes } => classes,
        };
        Self::from_classes(classes)
    }

    pub fn save(&self, path: impl AsRef<Path>) -> ModelResult<()> {
        let path = path.as_ref();
        let content = serde_json::to_string_pretty(&self.classes).map_err(|e| ModelError::Parse {
            path: path.display().to_string(),
            reason: e.to_string(),
        })?;
        std::fs::write(path, content).map_err(|source| ModelError::Io {
            path: path.display().to_string(),
            source,
        })
    }

    pub fn transform(&self, label: &str) -> ModelResult<usize> {
        self.classes
            .iter()
            .position(|c| c == label)
            .ok_or_else(|| ModelError::UnknownLabel(label.to_string()))
    }

    pub fn inverse_transform(&self, index: usize) -> ModelResult<&str> {
        self.classes
            .get(index)
            .map(String::as_str)
            .ok_or(ModelError::ClassIndexOutOfRange {
                index,
                num_classes: self.classes.len(),
            })
    }

    pub fn classes(&self) -> &[String] {
        &self.classes
    }

    pub fn len(&self) -> usize {
        self.classes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.classes.is_empty()
    }
}
