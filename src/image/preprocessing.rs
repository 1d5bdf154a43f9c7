use crate::diagnosis::BoundingBox;
use crate::utils::error::FractureError;
use crate::Result;
use image::{imageops::FilterType, Rgb, RgbImage};
use ndarray::Array4;

/// letterbox 填充灰度值
const PAD_VALUE: u8 = 114;

/// letterbox 变换参数，用于把模型坐标还原回原图
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LetterboxTransform {
    pub orig_width: u32,
    pub orig_height: u32,
    pub input_size: u32,
    pub scale: f32,
    pub pad_x: f32,
    pub pad_y: f32,
}

impl LetterboxTransform {
    pub fn new(orig_width: u32, orig_height: u32, input_size: u32) -> Self {
        let scale = (input_size as f32 / orig_width as f32)
            .min(input_size as f32 / orig_height as f32);

        let new_w = (orig_width as f32 * scale).round();
        let new_h = (orig_height as f32 * scale).round();

        Self {
            orig_width,
            orig_height,
            input_size,
            scale,
            pad_x: ((input_size as f32 - new_w) / 2.0).floor(),
            pad_y: ((input_size as f32 - new_h) / 2.0).floor(),
        }
    }

    /// 缩放后的图像尺寸
    pub fn scaled_size(&self) -> (u32, u32) {
        (
            ((self.orig_width as f32 * self.scale).round() as u32).clamp(1, self.input_size),
            ((self.orig_height as f32 * self.scale).round() as u32).clamp(1, self.input_size),
        )
    }

    /// 模型空间坐标 -> 原图坐标，并裁剪到图像范围内
    pub fn to_original(&self, x_min: f32, y_min: f32, x_max: f32, y_max: f32) -> BoundingBox {
        let w = self.orig_width as f32;
        let h = self.orig_height as f32;

        BoundingBox::new(
            ((x_min - self.pad_x) / self.scale).clamp(0.0, w),
            ((y_min - self.pad_y) / self.scale).clamp(0.0, h),
            ((x_max - self.pad_x) / self.scale).clamp(0.0, w),
            ((y_max - self.pad_y) / self.scale).clamp(0.0, h),
        )
    }
}

pub struct ImagePreprocessor;

impl ImagePreprocessor {
    /// letterbox + 归一化，输出 NCHW 张量
    pub fn letterbox(image: &RgbImage, input_size: u32) -> Result<(Array4<f32>, LetterboxTransform)> {
        let (width, height) = image.dimensions();
        if width == 0 || height == 0 {
            return Err(FractureError::ImageProcessing(format!(
                "Image has zero dimension: {}x{}",
                width, height
            )));
        }

        let transform = LetterboxTransform::new(width, height, input_size);
        let (new_w, new_h) = transform.scaled_size();

        let resized = image::imageops::resize(image, new_w, new_h, FilterType::Triangle);

        let mut canvas = RgbImage::from_pixel(input_size, input_size, Rgb([PAD_VALUE; 3]));
        image::imageops::overlay(
            &mut canvas,
            &resized,
            transform.pad_x as i64,
            transform.pad_y as i64,
        );

        let size = input_size as usize;
        let mut tensor = Array4::<f32>::zeros((1, 3, size, size));
        for (x, y, pixel) in canvas.enumerate_pixels() {
            for c in 0..3 {
                tensor[[0, c, y as usize, x as usize]] = pixel[c] as f32 / 255.0;
            }
        }

        tracing::debug!(
            "Letterboxed {}x{} -> {}x{} (scale={:.4}, pad=({}, {}))",
            width,
            height,
            input_size,
            input_size,
            transform.scale,
            transform.pad_x,
            transform.pad_y
        );

        Ok((tensor, transform))
    }
}
