/// Minimal smoke-test server: answers `/` so operators can check the port

use anyhow::{Context, Result};
use axum::{routing::get, Router};
use tokio::net::TcpListener;
use tracing::info;

use meme_signal::config::Config;
use meme_signal::web::{self, PING_TEXT};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .compact()
        .init();

    let config = Config::load()?;
    let addr = config.bind_address();

    let app = Router::new().route("/", get(|| async { PING_TEXT }));
    let listener = TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind {}", addr))?;

    info!("🧪 Test server running on http://{}", addr);
    axum::serve(listener, app)
        .with_graceful_shutdown(web::shutdown_on(tokio::signal::ctrl_c()))
        .await?;

    Ok(())
}
