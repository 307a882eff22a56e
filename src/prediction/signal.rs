//! Trading signal output and its human-readable recommendation

use std::collections::BTreeMap;
use serde::{Deserialize, Serialize};

pub const SIGNAL_UNKNOWN: &str = "UNKNOWN";
pub const SIGNAL_ERROR: &str = "ERROR";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignalStrength {
    Strong,
    Moderate,
    Weak,
}

impl SignalStrength {
    /// Confidence is a percentage.
    pub fn from_confidence(confidence: f64) -> Self {
        if confidence >= 80.0 {
            SignalStrength::Strong
        } else if confidence >= 60.0 {
            SignalStrength::Moderate
        } else {
            SignalStrength::Weak
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SignalStrength::Strong => "Strong",
            SignalStrength::Moderate => "Moderate",
            SignalStrength::Weak => "Weak",
        }
    }
}

pub fn recommendation(signal: &str, confidence: f64) -> String {
    let strength = SignalStrength::from_confidence(confidence).as_str();
    match signal {
        "BUY" => format!("{} buy signal. Consider entering a position.", strength),
        "SELL" => format!("{} sell signal. Consider exiting or reducing position.", strength),
        "HOLD" => format!("{} hold signal. Maintain current position.", strength),
        _ => "Unable to generate recommendation.".to_string(),
    }
}

/// One prediction as returned to clients. Probabilities and confidence
/// are percentages.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Prediction {
    pub signal: String,
    pub confidence: f64,
    pub probabilities: BTreeMap<String, f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub recommendation: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl Prediction {
    pub fn from_label(label: &str, confidence: f64, probabilities: BTreeMap<String, f64>) -> Self {
        let signal = label.to_uppercase();
        let recommendation = recommendation(&signal, confidence);
        Self {
            signal,
            confidence: round2(confidence),
            probabilities,
            recommendation: Some(recommendation),
            error: None,
        }
    }

    pub fn model_not_loaded() -> Self {
        Self {
            signal: SIGNAL_UNKNOWN.to_string(),
            confidence: 0.0,
            probabilities: BTreeMap::new(),
            recommendation: None,
            error: Some("Model not loaded".to_string()),
        }
    }

    pub fn failed(error: impl ToString) -> Self {
        Self {
            signal: SIGNAL_ERROR.to_string(),
            confidence: 0.0,
            probabilities: BTreeMap::new(),
            recommendation: None,
            error: Some(error.to_string()),
        }
    }
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strength_thresholds() {
        assert_eq!(SignalStrength::from_confidence(80.0), SignalStrength::Strong);
        assert_eq!(SignalStrength::from_confidence(79.99), SignalStrength::Moderate);
        assert_eq!(SignalStrength::from_confidence(60.0), SignalStrength::Moderate);
        assert_eq!(SignalStrength::from_confidence(59.9), SignalStrength::Weak);
    }

    #[test]
    fn test_recommendation_texts() {
        assert_eq!(recommendation("BUY", 91.0), "Strong buy signal. Consider entering a position.");
        assert_eq!(
            recommendation("SELL", 65.0),
            "Moderate sell signal. Consider exiting or reducing position."
        );
        assert_eq!(recommendation("HOLD", 10.0), "Weak hold signal. Maintain current position.");
        assert_eq!(recommendation("MOON", 99.0), "Unable to generate recommendation.");
    }

    #[test]
    fn test_lowercase_label_is_normalised() {
        let prediction = Prediction::from_label("hold", 61.236, BTreeMap::new());
        assert_eq!(prediction.signal, "HOLD");
        assert_eq!(prediction.confidence, 61.24);
        assert_eq!(
            prediction.recommendation.as_deref(),
            Some("Moderate hold signal. Maintain current position.")
        );
    }

    #[test]
    fn test_placeholder_predictions_serialise_error() {
        let json = serde_json::to_value(Prediction::model_not_loaded()).unwrap();
        assert_eq!(json["signal"], "UNKNOWN");
        assert_eq!(json["error"], "Model not loaded");
        assert!(json.get("recommendation").is_none());

        let failed = Prediction::failed("boom");
        assert_eq!(failed.signal, "ERROR");
        assert_eq!(failed.error.as_deref(), Some("boom"));
    }
}
