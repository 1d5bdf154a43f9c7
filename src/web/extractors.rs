use axum::{
    async_trait,
    extract::{FromRequest, FromRequestParts, Request},
    http::{request::Parts, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::Deserialize;

/// 验证的JSON提取器
pub struct ValidatedJson<T>(pub T);

#[async_trait]
impl<T, S> FromRequest<S> for ValidatedJson<T>
where
    T: for<'de> Deserialize<'de> + Validate,
    S: Send + Sync,
{
    type Rejection = ValidationError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(value) = Json::<T>::from_request(req, state)
            .await
            .map_err(|err| ValidationError::JsonParse(err.body_text()))?;

        value.validate().map_err(|e| ValidationError::Validation(e.to_string()))?;

        Ok(ValidatedJson(value))
    }
}

/// 验证trait
pub trait Validate {
    type Error: std::fmt::Display;

    fn validate(&self) -> Result<(), Self::Error>;
}

/// 验证错误类型
#[derive(Debug)]
pub enum ValidationError {
    JsonParse(String),
    Validation(String),
}

impl IntoResponse for ValidationError {
    fn into_response(self) -> Response {
        tracing::warn!("Request rejected: {}", self);

        let body = serde_json::json!({
            "error": {
                "code": "VALIDATION_ERROR",
                "message": self.to_string()
            }
        });

        (StatusCode::BAD_REQUEST, Json(body)).into_response()
    }
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ValidationError::JsonParse(msg) => write!(f, "JSON parse error: {}", msg),
            ValidationError::Validation(msg) => write!(f, "Validation error: {}", msg),
        }
    }
}

impl std::error::Error for ValidationError {}

impl Validate for crate::web::handlers::DetectJsonRequest {
    type Error = String;

    fn validate(&self) -> Result<(), Self::Error> {
        if self.image.trim().is_empty() {
            return Err("Image data cannot be empty".to_string());
        }

        // data URL 只接受 JPEG / PNG
        if let Some(rest) = self.image.strip_prefix("data:") {
            let mime = rest.split(';').next().unwrap_or_default();
            if !matches!(mime, "image/jpeg" | "image/jpg" | "image/png") {
                return Err(format!(
                    "Unsupported image type '{}'. Supported types: image/jpeg, image/png",
                    mime
                ));
            }
        }

        Ok(())
    }
}

/// 请求ID提取器
#[derive(Debug, Clone)]
pub struct RequestId(pub String);

#[async_trait]
impl<S> FromRequestParts<S> for RequestId
where
    S: Send + Sync,
{
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let request_id = parts
            .headers
            .get("X-Request-ID")
            .and_then(|value| value.to_str().ok())
            .map(|s| s.to_string())
            .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());

        Ok(RequestId(request_id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::web::handlers::DetectJsonRequest;

    fn request(image: &str) -> DetectJsonRequest {
        DetectJsonRequest {
            image: image.to_string(),
        }
    }

    #[test]
    fn empty_image_is_invalid() {
        assert!(request("   ").validate().is_err());
    }

    #[test]
    fn data_url_mime_is_checked() {
        assert!(request("data:image/png;base64,AAAA").validate().is_ok());
        assert!(request("data:image/jpeg;base64,AAAA").validate().is_ok());
        assert!(request("data:image/gif;base64,AAAA").validate().is_err());
        assert!(request("AAAA").validate().is_ok());
    }
}
