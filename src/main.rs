use std::path::Path;
use std::sync::Arc;

use anyhow::Context;
use tracing_subscriber::EnvFilter;

use minescan::config::AppConfig;
use minescan::routes::{router, AppState};
use minescan::yolo::YoloDetector;

const CONFIG_PATH: &str = "minescan.json";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = AppConfig::load(Path::new(CONFIG_PATH))?;
    std::fs::create_dir_all(&config.upload_dir)
        .with_context(|| format!("creating {:?}", config.upload_dir))?;
    std::fs::create_dir_all(&config.result_dir)
        .with_context(|| format!("creating {:?}", config.result_dir))?;

    let detector = YoloDetector::new(&config.model_path, &config.labels_path)
        .context("failed to load detection model")?;

    let addr = config.addr()?;
    let state = AppState {
        config: Arc::new(config),
        detector: Arc::new(detector),
    };
    let app = router(state);

    tracing::info!(%addr, "minescan listening");
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
