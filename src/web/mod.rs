pub mod extractors;
pub mod handlers;
pub mod middleware;
pub mod ui;

use crate::{diagnosis::DiagnosisPipeline, models::ModelManager, utils::error::FractureError, Config, Result};
use axum::{
    extract::{DefaultBodyLimit, State},
    response::Json,
    routing::{get, post},
    Router,
};
use serde_json::json;
use std::net::SocketAddr;
use std::time::Duration;
use tokio::net::TcpListener;
use tower_http::{cors::CorsLayer, limit::RequestBodyLimitLayer, timeout::TimeoutLayer};

/// 处理器共享状态
#[derive(Clone)]
pub struct AppState {
    pub config: Config,
    pub pipeline: DiagnosisPipeline,
}

pub async fn serve(config: Config) -> Result<()> {
    // 模型加载失败直接终止，不接受任何请求
    ModelManager::init(config.clone())?;
    let manager = ModelManager::instance()?;
    let pipeline = DiagnosisPipeline::new(manager.detector(), manager.annotator());

    let app = create_app(manager.config().clone(), pipeline);

    let addr: SocketAddr = config.bind_addr.parse().map_err(|e| {
        FractureError::Config(format!("Invalid bind address {}: {}", config.bind_addr, e))
    })?;

    tracing::info!("Server starting on http://{}", addr);
    tracing::info!("API endpoints:");
    tracing::info!("  POST /detect         - JSON base64 upload");
    tracing::info!("  POST /detect/upload  - Multipart file upload");
    tracing::info!("  GET  /               - Web UI");
    tracing::info!("  GET  /health         - Health check");
    tracing::info!("  GET  /api/info       - Service information");

    let listener = TcpListener::bind(&addr).await.map_err(|e| {
        FractureError::Internal(format!("Failed to bind to address {}: {}", addr, e))
    })?;

    axum::serve(listener, app)
        .await
        .map_err(|e| FractureError::Internal(format!("Server failed to start: {}", e)))?;

    Ok(())
}

pub fn create_app(config: Config, pipeline: DiagnosisPipeline) -> Router {
    let max_request_size = config.server_config.max_request_size;
    let request_timeout = Duration::from_secs(config.server_config.request_timeout);

    Router::new()
        // 检测API路由
        .route("/detect", post(handlers::detect_json_handler))
        .route("/detect/upload", post(handlers::detect_upload_handler))
        // Web UI路由
        .route("/", get(ui::index_handler))
        // 系统路由
        .route("/health", get(health_handler))
        .route("/api/info", get(info_handler))
        .layer(axum::middleware::from_fn(middleware::security_headers))
        .layer(axum::middleware::from_fn(middleware::request_logging))
        // multipart 默认上限 2MB，统一交给 RequestBodyLimitLayer
        .layer(DefaultBodyLimit::disable())
        .layer(RequestBodyLimitLayer::new(max_request_size))
        .layer(TimeoutLayer::new(request_timeout))
        .layer(CorsLayer::permissive())
        .with_state(AppState { config, pipeline })
}

/// 健康检查端点
async fn health_handler(State(state): State<AppState>) -> Result<Json<serde_json::Value>> {
    if !state.config.model_path.exists() {
        return Err(FractureError::ModelLoad(format!(
            "Model file disappeared: {}",
            state.config.model_path.display()
        )));
    }

    Ok(Json(json!({
        "status": "healthy",
        "timestamp": chrono::Utc::now().to_rfc3339(),
        "version": env!("CARGO_PKG_VERSION")
    })))
}

/// 服务信息端点
async fn info_handler(State(state): State<AppState>) -> Json<serde_json::Value> {
    let detector = state.pipeline.detector();

    Json(json!({
        "service": "Hand Fracture Detection Service",
        "version": env!("CARGO_PKG_VERSION"),
        "description": env!("CARGO_PKG_DESCRIPTION"),
        "model": detector.info(),
        "num_classes": detector.labels().len(),
        "runtime": {
            "intra_threads": state.config.onnx_config.intra_threads,
            "max_detections": state.config.detection_config.max_detections,
            "max_request_size": state.config.server_config.max_request_size,
        },
        "supported_formats": ["image/jpeg", "image/png"]
    }))
}
