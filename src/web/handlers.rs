use crate::{
    diagnosis::{DiagnosisReport, DiagnosisStatus},
    utils::error::FractureError,
    web::{
        extractors::{RequestId, ValidatedJson},
        AppState,
    },
    Result,
};
use axum::{
    extract::{Multipart, State},
    response::Json,
};
use serde::{Deserialize, Serialize};
use std::time::Instant;
use tokio::sync::mpsc;

/// JSON请求体（base64模式）
#[derive(Debug, Deserialize)]
pub struct DetectJsonRequest {
    /// Base64编码的图像数据，可带 data URL 前缀
    pub image: String,
}

/// JSON响应格式
#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub data: T,
    pub timestamp: String,
    pub request_id: String,
}

impl<T> ApiResponse<T> {
    pub fn success(data: T, request_id: String) -> Self {
        Self {
            success: true,
            data,
            timestamp: chrono::Utc::now().to_rfc3339(),
            request_id,
        }
    }
}

/// JSON base64上传处理器
pub async fn detect_json_handler(
    State(state): State<AppState>,
    RequestId(request_id): RequestId,
    ValidatedJson(request): ValidatedJson<DetectJsonRequest>,
) -> Result<Json<ApiResponse<DiagnosisReport>>> {
    let start_time = Instant::now();

    tracing::info!(
        "Processing JSON detection request: request_id={}, payload={} chars",
        request_id,
        request.image.len()
    );

    let status_tx = progress_channel(&state, &request_id);
    let report = state
        .pipeline
        .process_base64(request.image, status_tx)
        .await?;

    tracing::info!(
        "JSON detection completed: request_id={}, detections={}, time={:.3}s",
        request_id,
        report.summary.count,
        start_time.elapsed().as_secs_f32()
    );

    Ok(Json(ApiResponse::success(report, request_id)))
}

/// Multipart文件上传处理器
pub async fn detect_upload_handler(
    State(state): State<AppState>,
    RequestId(request_id): RequestId,
    mut multipart: Multipart,
) -> Result<Json<ApiResponse<DiagnosisReport>>> {
    let start_time = Instant::now();

    tracing::info!("Processing multipart detection request: request_id={}", request_id);

    let mut image_data: Option<axum::body::Bytes> = None;

    while let Some(field) = multipart.next_field().await.map_err(|e| {
        FractureError::InvalidInput(format!("Failed to read multipart field: {}", e))
    })? {
        let field_name = field.name().unwrap_or("unknown").to_string();

        match field_name.as_str() {
            "file" => {
                // 验证内容类型
                if let Some(content_type) = field.content_type() {
                    if !matches!(content_type, "image/jpeg" | "image/jpg" | "image/png")
                        && content_type != "application/octet-stream"
                    {
                        return Err(FractureError::UnsupportedFormat(content_type.to_string()));
                    }
                }

                let data = field.bytes().await.map_err(|e| {
                    FractureError::InvalidInput(format!("Failed to read file data: {}", e))
                })?;

                if data.is_empty() {
                    return Err(FractureError::InvalidInput("Empty file".to_string()));
                }

                tracing::debug!("Received file: {} bytes", data.len());
                image_data = Some(data);
            }
            _ => {
                tracing::debug!("Ignoring unknown field: {}", field_name);
            }
        }
    }

    let image_data = image_data
        .ok_or_else(|| FractureError::InvalidInput("No image file provided".to_string()))?;

    let status_tx = progress_channel(&state, &request_id);
    let report = state.pipeline.process_bytes(image_data, status_tx).await?;

    tracing::info!(
        "Upload detection completed: request_id={}, detections={}, time={:.3}s",
        request_id,
        report.summary.count,
        start_time.elapsed().as_secs_f32()
    );

    Ok(Json(ApiResponse::success(report, request_id)))
}

/// 开发模式下记录处理进度
fn progress_channel(
    state: &AppState,
    request_id: &str,
) -> Option<mpsc::UnboundedSender<DiagnosisStatus>> {
    if !state.config.dev_mode {
        return None;
    }

    let (status_tx, mut status_rx) = mpsc::unbounded_channel::<DiagnosisStatus>();
    let request_id = request_id.to_string();

    tokio::spawn(async move {
        while let Some(status) = status_rx.recv().await {
            tracing::debug!(
                "Diagnosis progress [{}]: {:?} - {:.1}% - {}",
                request_id,
                status.stage,
                status.progress * 100.0,
                status.message
            );
        }
    });

    Some(status_tx)
}
