use serde::{Deserialize, Serialize};

/// 轴对齐边界框，原图像素坐标
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub x_min: f32,
    pub y_min: f32,
    pub x_max: f32,
    pub y_max: f32,
}

impl BoundingBox {
    pub fn new(x_min: f32, y_min: f32, x_max: f32, y_max: f32) -> Self {
        Self { x_min, y_min, x_max, y_max }
    }

    pub fn width(&self) -> f32 {
        (self.x_max - self.x_min).max(0.0)
    }

    pub fn height(&self) -> f32 {
        (self.y_max - self.y_min).max(0.0)
    }

    pub fn area(&self) -> f32 {
        self.width() * self.height()
    }

    /// 交并比
    pub fn iou(&self, other: &BoundingBox) -> f32 {
        let ix_min = self.x_min.max(other.x_min);
        let iy_min = self.y_min.max(other.y_min);
        let ix_max = self.x_max.min(other.x_max);
        let iy_max = self.y_max.min(other.y_max);

        if ix_min >= ix_max || iy_min >= iy_max {
            return 0.0;
        }

        let intersection = (ix_max - ix_min) * (iy_max - iy_min);
        let union = self.area() + other.area() - intersection;

        if union <= 0.0 {
            return 0.0;
        }

        intersection / union
    }
}

/// 单个检测目标
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Detection {
    /// 类别名称
    pub label: String,
    /// 类别索引
    pub class_id: usize,
    /// 置信度 (0.0 - 1.0)
    pub confidence: f32,
    /// 目标区域
    pub region: BoundingBox,
}

/// 一张图像的检测结果，保持检测器返回的顺序
pub type DetectionSet = Vec<Detection>;

/// 诊断结论
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Verdict {
    Clear,
    Suspected,
}

/// 检测结果摘要
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Summary {
    /// 检测目标数量
    pub count: usize,
    /// 平均置信度，无检测时为空
    pub average_confidence: Option<f32>,
    pub verdict: Verdict,
    /// 每个检测目标的展示行，与输入顺序一致
    pub lines: Vec<String>,
    /// 结论提示
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

impl Summary {
    /// 进度条数值 (0 - 100)
    pub fn confidence_indicator(&self) -> Option<u8> {
        self.average_confidence
            .map(|avg| (avg * 100.0).trunc().clamp(0.0, 100.0) as u8)
    }
}

/// 处理阶段
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum DiagnosisStage {
    Decoding,
    Detection,
    Summarizing,
    Annotation,
    Completed,
}

/// 处理状态
#[derive(Debug, Clone)]
pub struct DiagnosisStatus {
    pub stage: DiagnosisStage,
    /// 进度百分比 (0.0 - 1.0)
    pub progress: f32,
    pub message: String,
}

impl DiagnosisStatus {
    pub fn new(stage: DiagnosisStage, progress: f32, message: &str) -> Self {
        Self {
            stage,
            progress,
            message: message.to_string(),
        }
    }
}

/// 检测模型信息
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DetectorInfo {
    pub model_name: String,
    pub input_size: u32,
    pub conf_threshold: f32,
    pub iou_threshold: f32,
    pub labels: Vec<String>,
}

/// 完整的诊断报告
#[derive(Debug, Clone, Serialize)]
pub struct DiagnosisReport {
    pub summary: Summary,
    /// 平均置信度进度条 (0 - 100)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub confidence_indicator: Option<u8>,
    /// 原图 (PNG data URL)
    pub original_image: String,
    /// 标注后的图像 (PNG data URL)
    pub annotated_image: String,
    pub width: u32,
    pub height: u32,
    /// 处理耗时（秒）
    pub processing_time: f32,
    pub model_info: DetectorInfo,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn iou_of_identical_boxes_is_one() {
        let a = BoundingBox::new(0.0, 0.0, 10.0, 10.0);
        assert!((a.iou(&a) - 1.0).abs() < 1e-6);
    }

    #[test]
    fn iou_of_disjoint_boxes_is_zero() {
        let a = BoundingBox::new(0.0, 0.0, 10.0, 10.0);
        let b = BoundingBox::new(20.0, 20.0, 30.0, 30.0);
        assert_eq!(a.iou(&b), 0.0);
    }

    #[test]
    fn iou_of_half_overlap() {
        let a = BoundingBox::new(0.0, 0.0, 10.0, 10.0);
        let b = BoundingBox::new(5.0, 0.0, 15.0, 10.0);
        // 50 / 150
        assert!((a.iou(&b) - 1.0 / 3.0).abs() < 1e-6);
    }

    #[test]
    fn verdict_serializes_upper_case() {
        assert_eq!(serde_json::to_string(&Verdict::Clear).unwrap(), "\"CLEAR\"");
        assert_eq!(serde_json::to_string(&Verdict::Suspected).unwrap(), "\"SUSPECTED\"");
    }
}
