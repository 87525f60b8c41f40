pub mod extractors;
pub mod handlers;
pub mod middleware;

use crate::{models::ModelManager, utils::error::RecognitionError, Config, Result};
use axum::{
    extract::{DefaultBodyLimit, State},
    response::Json,
    routing::{get, post},
    Router,
};
use serde_json::json;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::{cors::CorsLayer, limit::RequestBodyLimitLayer};

/// 处理器共享状态
pub type AppState = Arc<ModelManager>;

pub async fn serve(config: Config) -> Result<()> {
    // 解析绑定地址
    let addr: SocketAddr = config.bind_addr.parse().map_err(|e| {
        RecognitionError::Config(format!("Invalid bind address {}: {}", config.bind_addr, e))
    })?;

    // 加载模型；失败时服务仍然启动，依赖模型的端点返回 503
    let load_config = config.clone();
    let models = tokio::task::spawn_blocking(move || ModelManager::load(load_config))
        .await
        .map_err(|e| RecognitionError::Internal(format!("Model loading task failed: {}", e)))?;

    let app = create_app(Arc::new(models));

    tracing::info!("Server starting on http://{}", addr);
    tracing::info!("API endpoints:");
    tracing::info!("  GET  /               - Service status");
    tracing::info!("  GET  /classes        - Class labels");
    tracing::info!("  POST /predict        - Multipart image upload");
    tracing::info!("  POST /predict/base64 - JSON base64 upload");
    tracing::info!("  POST /track          - Multi-frame tracking");
    tracing::info!("  POST /reset-tracker  - Reset tracking state");
    tracing::info!("  GET  /health         - Health check");

    let listener = TcpListener::bind(&addr).await.map_err(|e| {
        RecognitionError::Internal(format!("Failed to bind to address {}: {}", addr, e))
    })?;

    axum::serve(listener, app)
        .await
        .map_err(|e| RecognitionError::Internal(format!("Server failed to start: {}", e)))?;

    Ok(())
}

pub fn create_app(models: AppState) -> Router {
    let max_request_size = models.config().server_config.max_request_size;

    Router::new()
        .route("/", get(root_handler))
        .route("/classes", get(classes_handler))
        .route("/predict", post(handlers::predict_upload_handler))
        .route("/predict/base64", post(handlers::predict_base64_handler))
        .route("/track", post(handlers::track_handler))
        .route("/reset-tracker", post(handlers::reset_tracker_handler))
        .route("/health", get(health_handler))
        .layer(DefaultBodyLimit::max(max_request_size))
        .layer(RequestBodyLimitLayer::new(max_request_size))
        .layer(CorsLayer::permissive())
        .layer(axum::middleware::from_fn(middleware::request_logging))
        .with_state(models)
}

/// 服务状态
async fn root_handler(State(models): State<AppState>) -> Json<serde_json::Value> {
    Json(json!({
        "status": "online",
        "message": "VND Currency Recognition API is running",
        "model_loaded": models.is_loaded(),
        "confidence_threshold": models.confidence_threshold(),
        "classes": models.class_labels(),
    }))
}

/// 类别表
async fn classes_handler(State(models): State<AppState>) -> Result<Json<serde_json::Value>> {
    let loaded = models.ready()?;

    Ok(Json(json!({
        "classes": loaded.class_names.as_ref(),
        "total": loaded.class_names.len(),
    })))
}

/// 健康检查端点
async fn health_handler(State(models): State<AppState>) -> Json<serde_json::Value> {
    let model_loaded = models.is_loaded();

    Json(json!({
        "status": if model_loaded { "healthy" } else { "degraded" },
        "model_loaded": model_loaded,
        "timestamp": chrono::Utc::now().to_rfc3339(),
        "version": env!("CARGO_PKG_VERSION"),
    }))
}
