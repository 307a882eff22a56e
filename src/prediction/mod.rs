//! BUY / SELL / HOLD prediction on top of the model bundle

pub mod signal;
pub mod predictor;

pub use signal::{recommendation, Prediction, SignalStrength, SIGNAL_ERROR, SIGNAL_UNKNOWN};
pub use predictor::{Classification, Predictor};
