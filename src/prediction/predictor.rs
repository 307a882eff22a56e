//! Runs the model bundle over sanitised feature rows

use std::collections::BTreeMap;
use std::sync::Arc;
use rayon::prelude::*;
use tracing::{debug, instrument};

use crate::error::ModelResult;
use crate::features::{FeatureMatrix, FeatureVector};
use crate::model::ModelBundle;
use super::Prediction;

/// Raw classifier output for one row.
#[derive(Debug, Clone, PartialEq)]
pub struct Classification {
    pub class_index: usize,
    pub probabilities: Vec<f64>,
}

pub struct Predictor {
    bundle: Arc<ModelBundle>,
}

impl Predictor {
    pub fn new(bundle: Arc<ModelBundle>) -> Self {
        Self { bundle }
    }

    pub fn bundle(&self) -> &ModelBundle {
        &self.bundle
    }

    /// Class index and probabilities per row. The matrix is used as given;
    /// call [`FeatureMatrix::sanitize`] first for model-ready input.
    pub fn classify(&self, matrix: &FeatureMatrix) -> ModelResult<Vec<Classification>> {
        let booster = self.bundle.booster();
        matrix
            .rows()
            .par_iter()
            .map(|row| -> ModelResult<Classification> {
                let probabilities = booster.predict_proba(row)?;
                Ok(Classification {
                    class_index: argmax(&probabilities),
                    probabilities,
                })
            })
            .collect()
    }

    /// Sanitise the batch as a whole, then produce one prediction per row.
    #[instrument(skip(self, matrix), fields(rows = matrix.len()))]
    pub fn predict(&self, mut matrix: FeatureMatrix) -> ModelResult<Vec<Prediction>> {
        matrix.sanitize();
        let encoder = self.bundle.label_encoder();

        self.classify(&matrix)?
            .into_iter()
            .map(|classification| -> ModelResult<Prediction> {
                let label = encoder.inverse_transform(classification.class_index)?;

                let probabilities: BTreeMap<String, f64> = encoder
                    .classes()
                    .iter()
                    .zip(classification.probabilities.iter())
                    .map(|(class, p)| (class.clone(), p * 100.0))
                    .collect();

                let confidence = classification.probabilities[classification.class_index] * 100.0;
                debug!("Predicted {} with {:.2}% confidence", label, confidence);

                Ok(Prediction::from_label(label, confidence, probabilities))
            })
            .collect()
    }

    /// Single-row prediction; failures become an ERROR prediction.
    pub fn predict_vector(&self, vector: FeatureVector) -> Prediction {
        match self.predict(FeatureMatrix::from_vector(vector)) {
            Ok(mut predictions) if !predictions.is_empty() => predictions.remove(0),
            Ok(_) => Prediction::failed("model returned no prediction"),
            Err(e) => Prediction::failed(e),
        }
    }
}

/// Index of the largest probability; the first one wins ties.
fn argmax(values: &[f64]) -> usize {
    let mut best = 0;
    for (i, v) in values.iter().enumerate() {
        if *v > values[best] {
            best = i;
        }
    }
    best
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::FeatureColumns;
    use crate::model::booster::tests::three_class_document;
    use crate::model::{Booster, LabelEncoder, ModelMetadata};

    fn predictor(classes: &[&str]) -> Predictor {
        let booster = Booster::from_document(&three_class_document(false, None)).unwrap();
        let encoder =
            LabelEncoder::from_classes(classes.iter().map(|c| c.to_string()).collect()).unwrap();
        let columns = FeatureColumns::new(vec!["f0".into(), "f1".into()]).unwrap();
        let bundle =
            ModelBundle::from_parts(booster, encoder, columns, ModelMetadata::default()).unwrap();
        Predictor::new(Arc::new(bundle))
    }

    #[test]
    fn test_argmax_first_wins() {
        assert_eq!(argmax(&[0.2, 0.5, 0.5]), 1);
        assert_eq!(argmax(&[0.9]), 0);
    }

    #[test]
    fn test_prediction_from_vector() {
        let predictor = predictor(&["buy", "hold", "sell"]);
        let columns = predictor.bundle().feature_columns().clone();

        // Margins 1.5 / 1.0 / 0.5 -> class 0
        let vector = FeatureVector::from_values(&columns, vec![0.0, 1.0]).unwrap();
        let prediction = predictor.predict_vector(vector);

        assert_eq!(prediction.signal, "BUY");
        let total: f64 = prediction.probabilities.values().sum();
        assert!((total - 100.0).abs() < 1e-9);
        assert!(prediction.confidence > 50.0 && prediction.confidence < 60.0);
        assert_eq!(
            prediction.recommendation.as_deref(),
            Some("Weak buy signal. Consider entering a position.")
        );
    }

    #[test]
    fn test_non_finite_single_row_is_zeroed() {
        let predictor = predictor(&["BUY", "HOLD", "SELL"]);
        let columns = predictor.bundle().feature_columns().clone();

        let with_gaps = FeatureVector::from_values(&columns, vec![f64::INFINITY, f64::NAN]).unwrap();
        let zeros = FeatureVector::from_values(&columns, vec![0.0, 0.0]).unwrap();

        assert_eq!(predictor.predict_vector(with_gaps), predictor.predict_vector(zeros));
    }

    #[test]
    fn test_batch_sanitised_with_column_medians() {
        let predictor = predictor(&["BUY", "HOLD", "SELL"]);
        let columns = predictor.bundle().feature_columns().clone();

        // Row 1's NaN in column 0 becomes the median 3.0 -> tree 2 goes right -> SELL
        let matrix = FeatureMatrix::from_rows(
            &columns,
            vec![vec![3.0, 0.0], vec![f64::NAN, 0.0], vec![3.0, 0.0]],
        )
        .unwrap();
        let predictions = predictor.predict(matrix).unwrap();

        assert_eq!(predictions.len(), 3);
        assert!(predictions.iter().all(|p| p.signal == "SELL"));
    }

    #[test]
    fn test_classify_reports_probabilities() {
        let predictor = predictor(&["BUY", "HOLD", "SELL"]);
        let columns = predictor.bundle().feature_columns().clone();
        let matrix = FeatureMatrix::from_rows(&columns, vec![vec![3.0, 0.0]]).unwrap();

        let out = predictor.classify(&matrix).unwrap();
        assert_eq!(out[0].class_index, 2);
        assert_eq!(out[0].probabilities.len(), 3);
    }
}
