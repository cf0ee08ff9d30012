use std::env;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use dotenv::dotenv;
use thiserror::Error;
use tokio::net::TcpListener;
use tracing::info;
use tracing_subscriber::EnvFilter;

use fridgemate::api;
use fridgemate::config::{DetectorConfig, ServerConfig};
use fridgemate::detector::{ensure_model, YoloModel};
use fridgemate::providers::gemini::gemini::GeminiProvider;
use fridgemate::providers::traits::CompletionProvider;

#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Gemini API key, falls back to the GEMINI_API_KEY environment variable
    #[arg(short, long)]
    api_key: Option<String>,

    #[arg(long, default_value = "0.0.0.0")]
    host: String,

    #[arg(long, default_value = "3000")]
    port: u16,

    /// Path to the yolov8 ONNX weights, overrides YOLO_MODEL_PATH
    #[arg(long)]
    model_path: Option<PathBuf>,
}

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Config error: {0}")]
    ConfigError(String),
    #[error("Detector error: {0}")]
    DetectorError(String),
    #[error("Server error: {0}")]
    ServerError(String),
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    // Load environment variables
    dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    // Parse command line arguments
    let args = Args::parse();

    run_api_server(args).await
}

async fn run_api_server(args: Args) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let addr: SocketAddr = format!("{}:{}", args.host, args.port)
        .parse()
        .map_err(|e| AppError::ConfigError(format!("Invalid listen address: {}", e)))?;

    // Get API key from command line or environment
    let api_key = match &args.api_key {
        Some(key) => key.clone(),
        None => env::var("GEMINI_API_KEY").map_err(|_| {
            AppError::ConfigError(
                "Gemini API key must be provided via --api-key or GEMINI_API_KEY".to_string(),
            )
        })?,
    };

    let mut detector_config = DetectorConfig::from_env();
    if let Some(model_path) = &args.model_path {
        detector_config.model_path = model_path.clone();
    }

    ensure_model(&detector_config.model_path, detector_config.model_url.as_deref())
        .await
        .map_err(|e| AppError::DetectorError(e.to_string()))?;

    info!("Loading detection model from {}", detector_config.model_path.display());
    let detector = Arc::new(
        YoloModel::load(
            &detector_config.model_path,
            detector_config.confidence_threshold,
            detector_config.iou_threshold,
        )
        .map_err(|e| AppError::DetectorError(e.to_string()))?,
    );

    let provider = GeminiProvider::new(api_key).await?;
    info!("Recipe generation via {}", provider.get_model_info().await?);

    let server_config = ServerConfig::from_env();
    let app = api::create_api(
        detector,
        provider,
        server_config.upload_dir,
        server_config.max_upload_bytes,
    );

    let listener = TcpListener::bind(&addr)
        .await
        .map_err(|e| AppError::ServerError(format!("Failed to bind to {}: {}", addr, e)))?;

    info!("Server listening on {}", addr);

    axum::serve(listener, app)
        .await
        .map_err(|e| AppError::ServerError(e.to_string()))?;

    Ok(())
}
