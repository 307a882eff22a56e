use anyhow::{Context, Result};
use colored::Colorize;
use tokio::net::TcpListener;
use tokio::signal;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use meme_signal::config::{Config, Logging};
use meme_signal::web::{self, AppState};

fn init_tracing(logging: &Logging) -> Result<()> {
    // Create logs directory if it doesn't exist
    std::fs::create_dir_all(&logging.directory)?;

    let file_appender = tracing_appender::rolling::daily(&logging.directory, &logging.file_name);
    let (non_blocking_file, _guard) = tracing_appender::non_blocking(file_appender);

    let console_layer = tracing_subscriber::fmt::layer()
        .with_target(true)
        .with_thread_ids(true)
        .with_level(true)
        .compact();

    let file_layer = tracing_subscriber::fmt::layer()
        .with_writer(non_blocking_file)
        .json()
        .with_current_span(false)
        .with_span_list(true);

    // RUST_LOG wins over the configured level
    let level = logging.level.clone();
    tracing_subscriber::registry()
        .with(console_layer)
        .with(file_layer)
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level)),
        )
        .init();

    // Leak the guard to prevent the file appender from being dropped
    std::mem::forget(_guard);

    Ok(())
}

fn print_banner(config: &Config) {
    println!("{}", "=".repeat(60).bright_blue());
    println!("{}", "🚀 SMART MEME COIN ANALYZER".bright_green().bold());
    println!("{}", "=".repeat(60).bright_blue());
    println!("   Model directory: {}", config.model.directory.display().to_string().cyan());
    println!(
        "   Chart lookups:   {}",
        if config.chart.enabled { "enabled".green() } else { "disabled".yellow() }
    );
    println!("   Open http://{} in your browser", config.bind_address().cyan());
    println!("{}", "=".repeat(60).bright_blue());
}

#[tokio::main]
async fn main() -> Result<()> {
    let config = Config::load().context("failed to load configuration")?;
    init_tracing(&config.logging)?;

    print_banner(&config);

    let state = AppState::from_config(&config);
    if !state.model_loaded() {
        warn!("⚠️ Model not loaded; /api/predict and /api/model will answer 503");
    }

    let addr = config.bind_address();
    let listener = TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind {}", addr))?;

    web::serve(listener, state, web::shutdown_on(signal::ctrl_c())).await?;

    info!("👋 Analyzer shutdown complete");
    Ok(())
}
