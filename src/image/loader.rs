use crate::utils::error::FractureError;
use crate::Result;
use base64::Engine;
use image::{DynamicImage, ImageFormat, RgbImage};

pub struct ImageLoader;

impl ImageLoader {
    /// 从base64字符串加载图像
    pub fn from_base64(base64_data: &str) -> Result<RgbImage> {
        // 移除可能的数据URL前缀 (data:image/xxx;base64,)
        let base64_clean = match base64_data.strip_prefix("data:") {
            Some(rest) => rest.split_once(',').map(|(_, data)| data).unwrap_or(rest),
            None => base64_data,
        };

        let image_bytes = base64::engine::general_purpose::STANDARD.decode(base64_clean.trim())?;

        Self::from_bytes(&image_bytes)
    }

    /// 从字节流加载图像，仅支持 JPEG / PNG
    pub fn from_bytes(bytes: &[u8]) -> Result<RgbImage> {
        if bytes.is_empty() {
            return Err(FractureError::InvalidInput("Empty image data".to_string()));
        }

        let format = Self::detect_format(bytes).ok_or_else(|| {
            FractureError::InvalidInput("Unrecognized image data".to_string())
        })?;

        if !Self::is_supported_format(format) {
            return Err(FractureError::UnsupportedFormat(format!(
                "{:?} (expected JPEG or PNG)",
                format
            )));
        }

        let image = image::load_from_memory_with_format(bytes, format)?;
        tracing::debug!(
            "Decoded {:?} image: {}x{}",
            format,
            image.width(),
            image.height()
        );

        Ok(Self::to_rgb(image))
    }

    /// 检测图像格式
    pub fn detect_format(bytes: &[u8]) -> Option<ImageFormat> {
        image::guess_format(bytes).ok()
    }

    /// 验证图像格式是否支持
    pub fn is_supported_format(format: ImageFormat) -> bool {
        matches!(format, ImageFormat::Png | ImageFormat::Jpeg)
    }

    pub fn to_rgb(image: DynamicImage) -> RgbImage {
        match image {
            DynamicImage::ImageRgb8(rgb) => rgb,
            other => other.to_rgb8(),
        }
    }
}
