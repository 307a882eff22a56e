//! HTTP front end: analyzer pages and the prediction API

mod handlers;
mod html;

use std::future::Future;
use std::sync::Arc;
use axum::{
    routing::{get, post},
    Router,
};
use tokio::net::TcpListener;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tracing::{error, info, warn};

use crate::chart::DexScreenerClient;
use crate::config::Config;
use crate::model::ModelBundle;
use crate::prediction::Predictor;

pub use handlers::{AnalyzeRequest, AnalyzeResponse, ApiError, PredictRequest, PING_TEXT};

#[derive(Clone)]
pub struct AppState {
    pub predictor: Option<Arc<Predictor>>,
    pub chart: Option<Arc<DexScreenerClient>>,
}

impl AppState {
    pub fn new(bundle: Option<ModelBundle>, chart: Option<DexScreenerClient>) -> Self {
        Self {
            predictor: bundle.map(|b| Arc::new(Predictor::new(Arc::new(b)))),
            chart: chart.map(Arc::new),
        }
    }

    /// Load what the config points at. A model that fails to load leaves the
    /// server running without predictions.
    pub fn from_config(config: &Config) -> Self {
        let bundle = match ModelBundle::load(&config.model) {
            Ok(bundle) => Some(bundle),
            Err(e) => {
                error!("✗ Error loading model: {}", e);
                warn!("Serving without a model; predictions will report UNKNOWN");
                None
            }
        };

        let chart = if config.chart.enabled {
            match DexScreenerClient::new(&config.chart) {
                Ok(client) => Some(client),
                Err(e) => {
                    error!("Failed to create DexScreener client: {}", e);
                    None
                }
            }
        } else {
            info!("Chart lookups disabled");
            None
        };

        Self::new(bundle, chart)
    }

    pub fn model_loaded(&self) -> bool {
        self.predictor.is_some()
    }
}

pub fn router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(AllowOrigin::any())
        .allow_methods([axum::http::Method::GET, axum::http::Method::POST])
        .allow_headers([axum::http::header::CONTENT_TYPE]);

    Router::new()
        .route("/", get(handlers::index_handler))
        .route("/analyze", get(handlers::analyze_page_handler))
        .route("/ping", get(handlers::ping_handler))
        .route("/api/analyze", post(handlers::analyze_handler))
        .route("/api/predict", post(handlers::predict_handler))
        .route("/api/model", get(handlers::model_info_handler))
        .route("/api/health", get(handlers::health_handler))
        .layer(cors)
        .with_state(Arc::new(state))
}

/// Serve on an already-bound listener until `shutdown` resolves.
pub async fn serve<F>(listener: TcpListener, state: AppState, shutdown: F) -> anyhow::Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let addr = listener.local_addr()?;
    info!("🚀 Meme coin analyzer listening on http://{}", addr);

    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown)
        .await?;

    info!("🛑 HTTP server stopped");
    Ok(())
}

/// Resolve once `signal` fires. A failed listener is logged and never resolves.
pub async fn shutdown_on<S>(signal: S)
where
    S: Future<Output = std::io::Result<()>>,
{
    match signal.await {
        Ok(()) => info!("🛑 Shutdown signal received"),
        Err(e) => {
            error!("Failed to listen for shutdown signal: {}", e);
            std::future::pending::<()>().await;
        }
    }
}
