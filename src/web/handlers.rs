use std::collections::BTreeMap;
use std::sync::Arc;
use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    response::{Html, IntoResponse, Response},
    Json,
};
use chrono::Local;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{error, info, instrument};

use crate::chart::GraphData;
use crate::features::{CoinData, FeatureMatrix, FeatureVector};
use crate::prediction::Prediction;
use super::{html, AppState};

pub const PING_TEXT: &str = "Server is working! ✅";

/// JSON error body: `{"error": ..., "message": ...}`.
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    error: String,
    message: Option<String>,
}

impl ApiError {
    pub fn new(status: StatusCode, error: impl Into<String>) -> Self {
        Self {
            status,
            error: error.into(),
            message: None,
        }
    }

    pub fn with_message(mut self, message: impl ToString) -> Self {
        self.message = Some(message.to_string());
        self
    }

    fn bad_request(error: &str, message: impl ToString) -> Self {
        Self::new(StatusCode::BAD_REQUEST, error).with_message(message)
    }

    fn model_not_loaded() -> Self {
        Self::new(StatusCode::SERVICE_UNAVAILABLE, "Model not loaded")
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = match self.message {
            Some(message) => json!({"error": self.error, "message": message}),
            None => json!({"error": self.error}),
        };
        (self.status, Json(body)).into_response()
    }
}

fn timestamp() -> String {
    Local::now().format("%Y-%m-%dT%H:%M:%S%.6f").to_string()
}

pub async fn index_handler() -> Html<&'static str> {
    Html(html::INDEX_HTML)
}

pub async fn analyze_page_handler() -> Html<&'static str> {
    Html(html::ANALYZE_HTML)
}

pub async fn ping_handler() -> &'static str {
    PING_TEXT
}

pub async fn health_handler(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(json!({
        "status": "healthy",
        "model_loaded": state.model_loaded(),
        "timestamp": timestamp(),
    }))
}

pub async fn model_info_handler(State(state): State<Arc<AppState>>) -> Result<Response, ApiError> {
    let predictor = state.predictor.as_ref().ok_or_else(ApiError::model_not_loaded)?;
    let bundle = predictor.bundle();
    let booster = bundle.booster();
    let metadata = bundle.metadata();

    Ok(Json(json!({
        "type": "XGBoost Classifier",
        "objective": booster.objective().name(),
        "classes": bundle.label_encoder().classes(),
        "num_classes": bundle.label_encoder().len(),
        "num_features": bundle.feature_columns().len(),
        "feature_columns": bundle.feature_columns().names(),
        "num_trees": booster.num_trees(),
        "trees_used": booster.trees_used(),
        "best_iteration": booster.best_iteration(),
        "xgboost_version": booster.version(),
        "metadata": metadata,
    }))
    .into_response())
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct AnalyzeRequest {
    pub contract_address: String,
    pub coin_data: CoinData,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CoinReport {
    pub contract_address: String,
    pub sources: Vec<String>,
    #[serde(flatten)]
    pub data: CoinData,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalyzeResponse {
    pub success: bool,
    pub contract_address: String,
    pub coin_data: CoinReport,
    pub graph_data: GraphData,
    pub prediction: Prediction,
    pub timestamp: String,
}

#[instrument(skip(state, body))]
pub async fn analyze_handler(
    State(state): State<Arc<AppState>>,
    body: Result<Json<AnalyzeRequest>, JsonRejection>,
) -> Result<Json<AnalyzeResponse>, ApiError> {
    let Json(request) = body.map_err(|e| ApiError::bad_request("Invalid request body", e.body_text()))?;

    let contract_address = request.contract_address.trim().to_string();
    if contract_address.is_empty() {
        return Err(ApiError::new(StatusCode::BAD_REQUEST, "Contract address is required"));
    }

    info!("🔍 Analyzing coin: {}", contract_address);
    let coin_data = request.coin_data;

    let graph_data = match &state.chart {
        Some(chart) => chart.get_graph_data(&contract_address).await,
        None => GraphData::disabled(),
    };

    let prediction = match &state.predictor {
        Some(predictor) => {
            let columns = predictor.bundle().feature_columns();
            let vector = coin_data
                .to_features(columns, Local::now().naive_local())
                .map_err(|e| ApiError::bad_request("Invalid coin data", e))?;

            let predictor = Arc::clone(predictor);
            tokio::task::spawn_blocking(move || predictor.predict_vector(vector))
                .await
                .map_err(|e| {
                    error!("Prediction task failed: {}", e);
                    ApiError::new(StatusCode::INTERNAL_SERVER_ERROR, "Analysis failed").with_message(e)
                })?
        }
        None => Prediction::model_not_loaded(),
    };

    info!("✓ Analysis complete! Prediction: {}", prediction.signal);

    let sources = coin_data.sources().into_iter().map(String::from).collect();
    Ok(Json(AnalyzeResponse {
        success: true,
        contract_address: contract_address.clone(),
        coin_data: CoinReport {
            contract_address: contract_address.clone(),
            sources,
            data: coin_data,
        },
        graph_data,
        prediction,
        timestamp: timestamp(),
    }))
}

/// Exactly one of the three input forms. `null` cells are missing values.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PredictRequest {
    pub features: Option<BTreeMap<String, Option<f64>>>,
    pub values: Option<Vec<Option<f64>>>,
    pub rows: Option<Vec<Vec<Option<f64>>>>,
}

fn cells(values: Vec<Option<f64>>) -> Vec<f64> {
    values.into_iter().map(|v| v.unwrap_or(f64::NAN)).collect()
}

#[instrument(skip(state, body))]
pub async fn predict_handler(
    State(state): State<Arc<AppState>>,
    body: Result<Json<PredictRequest>, JsonRejection>,
) -> Result<Response, ApiError> {
    let Json(request) = body.map_err(|e| ApiError::bad_request("Invalid request body", e.body_text()))?;
    let predictor = state.predictor.as_ref().ok_or_else(ApiError::model_not_loaded)?;
    let columns = predictor.bundle().feature_columns();

    let matrix = match (request.features, request.values, request.rows) {
        (Some(named), None, None) => {
            let vector = FeatureVector::from_named(
                columns,
                named
                    .iter()
                    .map(|(name, value)| (name.as_str(), value.unwrap_or(f64::NAN))),
            )
            .map_err(|e| ApiError::bad_request("Invalid features", e))?;
            FeatureMatrix::from_vector(vector)
        }
        (None, Some(values), None) => {
            let vector = FeatureVector::from_values(columns, cells(values))
                .map_err(|e| ApiError::bad_request("Invalid features", e))?;
            FeatureMatrix::from_vector(vector)
        }
        (None, None, Some(rows)) => {
            FeatureMatrix::from_rows(columns, rows.into_iter().map(cells).collect())
                .map_err(|e| ApiError::bad_request("Invalid features", e))?
        }
        _ => {
            return Err(ApiError::bad_request(
                "Invalid request body",
                "provide exactly one of 'features', 'values' or 'rows'",
            ))
        }
    };

    let predictor = Arc::clone(predictor);
    let predictions = tokio::task::spawn_blocking(move || predictor.predict(matrix))
        .await
        .map_err(|e| ApiError::new(StatusCode::INTERNAL_SERVER_ERROR, "Prediction failed").with_message(e))?
        .map_err(|e| {
            error!("Prediction failed: {}", e);
            ApiError::new(StatusCode::INTERNAL_SERVER_ERROR, "Prediction failed").with_message(e)
        })?;

    Ok(Json(json!({
        "predictions": predictions,
        "timestamp": timestamp(),
    }))
    .into_response())
}
