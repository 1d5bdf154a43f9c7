use crate::diagnosis::{Detection, Summary, Verdict};

pub const CLEAR_MESSAGE: &str = "No fractures detected in this image.";
pub const CLEAR_DETAIL: &str = "Everything looks good! No visible fracture found.";
pub const SUSPECTED_MESSAGE: &str =
    "Possible fractures detected. Please consult an orthopedic specialist.";

/// 将检测结果汇总为展示用的摘要
///
/// 不排序、不过滤、不去重，这些由检测器负责。置信度不做范围校验。
pub fn summarize(detections: &[Detection]) -> Summary {
    if detections.is_empty() {
        return Summary {
            count: 0,
            average_confidence: None,
            verdict: Verdict::Clear,
            lines: Vec::new(),
            message: CLEAR_MESSAGE.to_string(),
            detail: Some(CLEAR_DETAIL.to_string()),
        };
    }

    let lines = detections
        .iter()
        .enumerate()
        .map(|(i, detection)| format_line(i + 1, detection))
        .collect();

    Summary {
        count: detections.len(),
        average_confidence: Some(average_confidence(detections)),
        verdict: Verdict::Suspected,
        lines,
        message: SUSPECTED_MESSAGE.to_string(),
        detail: None,
    }
}

/// 计算平均置信度（不加权）
fn average_confidence(detections: &[Detection]) -> f32 {
    let sum: f32 = detections.iter().map(|d| d.confidence).sum();
    sum / detections.len() as f32
}

fn format_line(position: usize, detection: &Detection) -> String {
    format!(
        "{}. {} — Confidence: {:.2}%",
        position,
        detection.label,
        detection.confidence * 100.0
    )
}
