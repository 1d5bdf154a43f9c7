use crate::config::DetectionConfig;
use crate::diagnosis::{BoundingBox, Detection, DetectionSet};
use crate::image::preprocessing::LetterboxTransform;
use crate::models::LabelMap;
use crate::utils::error::FractureError;
use crate::Result;
use ndarray::ArrayViewD;

/// 单个候选框（原图坐标）
#[derive(Debug, Clone, Copy)]
struct Candidate {
    class_id: usize,
    score: f32,
    region: BoundingBox,
}

/// YOLOv8 检测头后处理
pub struct YoloPostprocessor {
    conf_threshold: f32,
    iou_threshold: f32,
    max_detections: usize,
}

impl YoloPostprocessor {
    pub fn new(config: &DetectionConfig) -> Self {
        Self {
            conf_threshold: config.conf_threshold,
            iou_threshold: config.iou_threshold,
            max_detections: config.max_detections,
        }
    }

    /// 解码 `[1, 4 + num_classes, num_anchors]` 输出
    ///
    /// 结果按置信度降序排列。
    pub fn decode(
        &self,
        output: &ArrayViewD<f32>,
        transform: &LetterboxTransform,
        labels: &LabelMap,
    ) -> Result<DetectionSet> {
        let shape = output.shape();
        if shape.len() != 3 || shape[0] != 1 || shape[1] <= 4 {
            return Err(FractureError::Inference(format!(
                "Unsupported detection output shape: {:?}. Expected (1, 4 + classes, anchors)",
                shape
            )));
        }

        let num_classes = shape[1] - 4;
        let num_anchors = shape[2];

        let mut candidates = Vec::new();
        for a in 0..num_anchors {
            let mut best_class = 0usize;
            let mut best_score = f32::NEG_INFINITY;
            for c in 0..num_classes {
                let score = output[[0, 4 + c, a]];
                if score > best_score {
                    best_score = score;
                    best_class = c;
                }
            }

            if best_score < self.conf_threshold {
                continue;
            }

            let cx = output[[0, 0, a]];
            let cy = output[[0, 1, a]];
            let w = output[[0, 2, a]];
            let h = output[[0, 3, a]];

            let region = transform.to_original(
                cx - w / 2.0,
                cy - h / 2.0,
                cx + w / 2.0,
                cy + h / 2.0,
            );

            candidates.push(Candidate {
                class_id: best_class,
                score: best_score,
                region,
            });
        }

        tracing::debug!(
            "{} of {} anchors above confidence threshold {}",
            candidates.len(),
            num_anchors,
            self.conf_threshold
        );

        let kept = self.non_max_suppression(candidates);

        Ok(kept
            .into_iter()
            .map(|c| Detection {
                label: labels.name(c.class_id),
                class_id: c.class_id,
                confidence: c.score,
                region: c.region,
            })
            .collect())
    }

    /// 按类别做 NMS
    fn non_max_suppression(&self, mut candidates: Vec<Candidate>) -> Vec<Candidate> {
        candidates.sort_by(|a, b| b.score.total_cmp(&a.score));

        let mut kept: Vec<Candidate> = Vec::new();
        for candidate in candidates {
            if kept.len() >= self.max_detections {
                break;
            }

            let suppressed = kept.iter().any(|k| {
                k.class_id == candidate.class_id
                    && k.region.iou(&candidate.region) > self.iou_threshold
            });

            if !suppressed {
                kept.push(candidate);
            }
        }

        kept
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::Array3;

    /// 构造 (cx, cy, w, h, scores...) 形式的输出
    fn output(anchors: &[[f32; 6]]) -> Array3<f32> {
        let mut out = Array3::<f32>::zeros((1, 6, anchors.len()));
        for (a, values) in anchors.iter().enumerate() {
            for (i, v) in values.iter().enumerate() {
                out[[0, i, a]] = *v;
            }
        }
        out
    }

    fn labels() -> LabelMap {
        LabelMap::new(vec!["fracture".to_string(), "boneanomaly".to_string()])
    }

    fn identity() -> LetterboxTransform {
        LetterboxTransform::new(640, 640, 640)
    }

    #[test]
    fn overlapping_same_class_is_suppressed() {
        let out = output(&[
            [100.0, 100.0, 50.0, 50.0, 0.9, 0.0],
            [102.0, 101.0, 50.0, 50.0, 0.8, 0.0],
            [400.0, 400.0, 40.0, 40.0, 0.6, 0.0],
        ]);
        let post = YoloPostprocessor::new(&DetectionConfig::default());

        let dets = post.decode(&out.into_dyn().view(), &identity(), &labels()).unwrap();

        assert_eq!(dets.len(), 2);
        assert!((dets[0].confidence - 0.9).abs() < 1e-6);
        assert!((dets[1].confidence - 0.6).abs() < 1e-6);
        assert_eq!(dets[0].region, BoundingBox::new(75.0, 75.0, 125.0, 125.0));
    }

    #[test]
    fn different_classes_are_not_suppressed() {
        let out = output(&[
            [100.0, 100.0, 50.0, 50.0, 0.9, 0.0],
            [100.0, 100.0, 50.0, 50.0, 0.0, 0.7],
        ]);
        let post = YoloPostprocessor::new(&DetectionConfig::default());

        let dets = post.decode(&out.into_dyn().view(), &identity(), &labels()).unwrap();

        assert_eq!(dets.len(), 2);
        assert_eq!(dets[0].label, "fracture");
        assert_eq!(dets[1].label, "boneanomaly");
        assert_eq!(dets[1].class_id, 1);
    }

    #[test]
    fn low_scores_are_dropped() {
        let out = output(&[[100.0, 100.0, 50.0, 50.0, 0.1, 0.2]]);
        let post = YoloPostprocessor::new(&DetectionConfig::default());

        let dets = post.decode(&out.into_dyn().view(), &identity(), &labels()).unwrap();
        assert!(dets.is_empty());
    }

    #[test]
    fn boxes_are_mapped_through_letterbox() {
        // 1280x640 原图，pad_y = 160，scale = 0.5
        let transform = LetterboxTransform::new(1280, 640, 640);
        let out = output(&[[150.0, 235.0, 100.0, 50.0, 0.5, 0.0]]);
        let post = YoloPostprocessor::new(&DetectionConfig::default());

        let dets = post.decode(&out.into_dyn().view(), &transform, &labels()).unwrap();

        assert_eq!(dets[0].region, BoundingBox::new(200.0, 100.0, 400.0, 200.0));
    }

    #[test]
    fn max_detections_caps_output() {
        let out = output(&[
            [50.0, 50.0, 10.0, 10.0, 0.9, 0.0],
            [200.0, 200.0, 10.0, 10.0, 0.8, 0.0],
            [400.0, 400.0, 10.0, 10.0, 0.7, 0.0],
        ]);
        let config = DetectionConfig {
            max_detections: 2,
            ..DetectionConfig::default()
        };

        let dets = YoloPostprocessor::new(&config)
            .decode(&out.into_dyn().view(), &identity(), &labels())
            .unwrap();
        assert_eq!(dets.len(), 2);
    }

    #[test]
    fn wrong_shape_is_inference_error() {
        let out = Array3::<f32>::zeros((1, 4, 10));
        let err = YoloPostprocessor::new(&DetectionConfig::default())
            .decode(&out.into_dyn().view(), &identity(), &labels())
            .unwrap_err();
        assert_eq!(err.error_code(), "INFERENCE_ERROR");
    }
}
