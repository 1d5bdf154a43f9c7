use crate::diagnosis::Detection;
use crate::utils::error::FractureError;
use crate::Result;
use ab_glyph::{FontVec, PxScale};
use base64::Engine;
use image::{DynamicImage, ImageFormat, Rgb, RgbImage};
use imageproc::drawing::{draw_filled_rect_mut, draw_hollow_rect_mut, draw_text_mut};
use imageproc::rect::Rect;
use std::io::Cursor;
use std::path::Path;

// 标签渲染常量
const LABEL_FONT_SIZE: f32 = 20.0;
const LABEL_TEXT_HEIGHT: i32 = 24;
const LABEL_CHAR_WIDTH: f32 = 11.0; // 每字符平均宽度（粗略估计）
const LABEL_TEXT_VERTICAL_PADDING: i32 = 2;
const BOX_THICKNESS: i32 = 2;

/// 按类别索引取色
const PALETTE: [[u8; 3]; 8] = [
    [255, 56, 56],
    [255, 157, 151],
    [255, 112, 31],
    [255, 178, 29],
    [207, 210, 49],
    [72, 249, 10],
    [26, 147, 52],
    [0, 212, 187],
];

/// 检测结果可视化
pub struct Annotator {
    font: Option<FontVec>,
    font_size: f32,
}

impl Default for Annotator {
    fn default() -> Self {
        Self {
            font: None,
            font_size: LABEL_FONT_SIZE,
        }
    }
}

impl Annotator {
    /// 加载字体；未配置字体时只画边框
    pub fn new(font_path: Option<&Path>) -> Result<Self> {
        let Some(path) = font_path else {
            tracing::info!("No label font configured, annotations will draw boxes only");
            return Ok(Self::default());
        };

        let data = std::fs::read(path)?;
        let font = FontVec::try_from_vec(data).map_err(|e| {
            FractureError::Config(format!("Invalid font file {}: {}", path.display(), e))
        })?;

        tracing::info!("Loaded label font from: {}", path.display());
        Ok(Self {
            font: Some(font),
            font_size: LABEL_FONT_SIZE,
        })
    }

    pub fn color_for(class_id: usize) -> Rgb<u8> {
        Rgb(PALETTE[class_id % PALETTE.len()])
    }

    /// 在原图副本上绘制所有检测框
    pub fn annotate(&self, image: &RgbImage, detections: &[Detection]) -> RgbImage {
        let mut canvas = image.clone();
        for detection in detections {
            self.draw_detection(&mut canvas, detection);
        }
        canvas
    }

    fn draw_detection(&self, image: &mut RgbImage, detection: &Detection) {
        let (w, h) = (image.width() as i32, image.height() as i32);
        let color = Self::color_for(detection.class_id);
        let region = &detection.region;

        let x_min = (region.x_min.floor() as i32).clamp(0, w - 1);
        let y_min = (region.y_min.floor() as i32).clamp(0, h - 1);
        let x_max = (region.x_max.ceil() as i32).clamp(0, w - 1);
        let y_max = (region.y_max.ceil() as i32).clamp(0, h - 1);

        if x_min >= x_max || y_min >= y_max {
            return;
        }

        for t in 0..BOX_THICKNESS {
            let box_w = x_max - x_min - 2 * t;
            let box_h = y_max - y_min - 2 * t;
            if box_w <= 0 || box_h <= 0 {
                break;
            }
            let rect = Rect::at(x_min + t, y_min + t).of_size(box_w as u32 + 1, box_h as u32 + 1);
            draw_hollow_rect_mut(image, rect, color);
        }

        let Some(font) = self.font.as_ref() else {
            return;
        };

        let label = format!("{} {:.2}", detection.label, detection.confidence);
        let text_width = (label.chars().count() as f32 * LABEL_CHAR_WIDTH) as i32;

        // 标签放在边框上方，超出则贴顶
        let label_x = x_min;
        let label_y = (y_min - LABEL_TEXT_HEIGHT).max(0);
        let label_width = text_width.min(w - label_x);

        if label_width > 0 {
            let rect = Rect::at(label_x, label_y).of_size(label_width as u32, LABEL_TEXT_HEIGHT as u32);
            draw_filled_rect_mut(image, rect, color);
            draw_text_mut(
                image,
                Rgb([255, 255, 255]),
                label_x,
                label_y + LABEL_TEXT_VERTICAL_PADDING,
                PxScale::from(self.font_size),
                font,
                &label,
            );
        }
    }

    /// 编码为 PNG data URL 供页面展示
    pub fn to_data_url(image: &RgbImage) -> Result<String> {
        let mut buffer = Vec::new();
        DynamicImage::ImageRgb8(image.clone())
            .write_to(&mut Cursor::new(&mut buffer), ImageFormat::Png)?;

        Ok(format!(
            "data:image/png;base64,{}",
            base64::engine::general_purpose::STANDARD.encode(buffer)
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diagnosis::BoundingBox;

    fn detection(class_id: usize, region: BoundingBox) -> Detection {
        Detection {
            label: "fracture".to_string(),
            class_id,
            confidence: 0.9,
            region,
        }
    }

    #[test]
    fn draws_box_edges_without_touching_interior() {
        let image = RgbImage::from_pixel(40, 40, Rgb([0, 0, 0]));
        let det = detection(0, BoundingBox::new(10.0, 10.0, 30.0, 30.0));

        let annotated = Annotator::default().annotate(&image, &[det]);
        let color = Annotator::color_for(0);

        assert_eq!(annotated.get_pixel(10, 10), &color);
        assert_eq!(annotated.get_pixel(30, 20), &color);
        assert_eq!(annotated.get_pixel(11, 20), &color);
        assert_eq!(annotated.get_pixel(20, 20), &Rgb([0, 0, 0]));
        // 原图不变
        assert_eq!(image.get_pixel(10, 10), &Rgb([0, 0, 0]));
    }

    #[test]
    fn degenerate_box_is_skipped() {
        let image = RgbImage::from_pixel(20, 20, Rgb([0, 0, 0]));
        let det = detection(1, BoundingBox::new(5.0, 5.0, 5.0, 5.0));

        let annotated = Annotator::default().annotate(&image, &[det]);
        assert_eq!(annotated, image);
    }

    #[test]
    fn palette_wraps_by_class() {
        assert_eq!(Annotator::color_for(0), Annotator::color_for(PALETTE.len()));
    }

    #[test]
    fn data_url_is_png() {
        let image = RgbImage::from_pixel(4, 4, Rgb([1, 2, 3]));
        let url = Annotator::to_data_url(&image).unwrap();
        assert!(url.starts_with("data:image/png;base64,"));
    }

    #[test]
    fn missing_font_file_fails() {
        assert!(Annotator::new(Some(Path::new("/nonexistent/font.ttf"))).is_err());
    }
}
