use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum FractureError {
    #[error("Model loading failed: {0}")]
    ModelLoad(String),

    #[error("Image processing failed: {0}")]
    ImageProcessing(String),

    #[error("Detection inference failed: {0}")]
    Inference(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Unsupported format: {0}")]
    UnsupportedFormat(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Base64 decode error: {0}")]
    Base64(#[from] base64::DecodeError),

    #[error("Image decode error: {0}")]
    ImageDecode(#[from] image::ImageError),

    #[error("ORT error: {0}")]
    Ort(#[from] ort::Error),

    #[error("Internal server error: {0}")]
    Internal(String),
}

impl FractureError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            FractureError::InvalidInput(_) => StatusCode::BAD_REQUEST,
            FractureError::UnsupportedFormat(_) => StatusCode::UNSUPPORTED_MEDIA_TYPE,
            FractureError::Base64(_) => StatusCode::BAD_REQUEST,
            FractureError::ImageDecode(_) => StatusCode::BAD_REQUEST,
            FractureError::ModelLoad(_) => StatusCode::SERVICE_UNAVAILABLE,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn error_code(&self) -> &'static str {
        match self {
            FractureError::ModelLoad(_) => "MODEL_LOAD_ERROR",
            FractureError::ImageProcessing(_) => "IMAGE_PROCESSING_ERROR",
            FractureError::Inference(_) => "INFERENCE_ERROR",
            FractureError::InvalidInput(_) => "INVALID_INPUT",
            FractureError::UnsupportedFormat(_) => "UNSUPPORTED_FORMAT",
            FractureError::Config(_) => "CONFIG_ERROR",
            FractureError::Io(_) => "IO_ERROR",
            FractureError::Base64(_) => "BASE64_DECODE_ERROR",
            FractureError::ImageDecode(_) => "IMAGE_DECODE_ERROR",
            FractureError::Ort(_) => "ORT_ERROR",
            FractureError::Internal(_) => "INTERNAL_ERROR",
        }
    }
}

impl IntoResponse for FractureError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let error_response = serde_json::json!({
            "error": {
                "code": self.error_code(),
                "message": self.to_string(),
            }
        });

        if status.is_server_error() {
            tracing::error!("Request failed: {} ({})", self, status);
        } else {
            tracing::warn!("Request rejected: {} ({})", self, status);
        }

        (status, axum::Json(error_response)).into_response()
    }
}
