use crate::{
    diagnosis::{summarize, DiagnosisReport, DiagnosisStage, DiagnosisStatus},
    image::{Annotator, ImageLoader},
    models::FractureDetector,
    utils::error::FractureError,
    Result,
};
use ::image::RgbImage;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::mpsc;

/// 诊断流水线：解码 -> 检测 -> 汇总 -> 标注
#[derive(Clone)]
pub struct DiagnosisPipeline {
    detector: Arc<dyn FractureDetector>,
    annotator: Arc<Annotator>,
}

impl DiagnosisPipeline {
    pub fn new(detector: Arc<dyn FractureDetector>, annotator: Arc<Annotator>) -> Self {
        Self { detector, annotator }
    }

    pub fn detector(&self) -> &dyn FractureDetector {
        self.detector.as_ref()
    }

    /// 处理base64图像
    pub async fn process_base64(
        &self,
        base64_data: String,
        status_tx: Option<mpsc::UnboundedSender<DiagnosisStatus>>,
    ) -> Result<DiagnosisReport> {
        let start_time = Instant::now();
        send_status(&status_tx, DiagnosisStage::Decoding, 0.1, "Loading image from base64");

        let image = run_blocking(move || ImageLoader::from_base64(&base64_data)).await?;

        self.process_image(image, status_tx, start_time).await
    }

    /// 处理上传的字节流
    pub async fn process_bytes(
        &self,
        bytes: axum::body::Bytes,
        status_tx: Option<mpsc::UnboundedSender<DiagnosisStatus>>,
    ) -> Result<DiagnosisReport> {
        let start_time = Instant::now();
        send_status(&status_tx, DiagnosisStage::Decoding, 0.1, "Loading image from upload");

        let image = run_blocking(move || ImageLoader::from_bytes(&bytes)).await?;

        self.process_image(image, status_tx, start_time).await
    }

    /// 核心处理流程，严格顺序执行
    async fn process_image(
        &self,
        image: RgbImage,
        status_tx: Option<mpsc::UnboundedSender<DiagnosisStatus>>,
        start_time: Instant,
    ) -> Result<DiagnosisReport> {
        let (width, height) = image.dimensions();
        let image = Arc::new(image);

        send_status(&status_tx, DiagnosisStage::Detection, 0.3, "Detecting fractures");
        let detection_start = Instant::now();
        let detections = {
            let detector = Arc::clone(&self.detector);
            let image = Arc::clone(&image);
            run_blocking(move || detector.detect(&image)).await?
        };
        let detection_time = detection_start.elapsed();

        send_status(&status_tx, DiagnosisStage::Summarizing, 0.6, "Summarizing detections");
        let summary = summarize(&detections);

        send_status(&status_tx, DiagnosisStage::Annotation, 0.8, "Rendering annotated image");
        let (original_image, annotated_image) = {
            let annotator = Arc::clone(&self.annotator);
            let image = Arc::clone(&image);
            run_blocking(move || {
                let annotated = annotator.annotate(&image, &detections);
                Ok((
                    Annotator::to_data_url(&image)?,
                    Annotator::to_data_url(&annotated)?,
                ))
            })
            .await?
        };

        let processing_time = start_time.elapsed();
        send_status(
            &status_tx,
            DiagnosisStage::Completed,
            1.0,
            &format!("Diagnosis completed: {:?}", summary.verdict),
        );

        tracing::info!(
            "Diagnosis completed: size={}x{}, detections={}, verdict={:?}, detect_time={:.3}s, total_time={:.3}s",
            width,
            height,
            summary.count,
            summary.verdict,
            detection_time.as_secs_f32(),
            processing_time.as_secs_f32()
        );

        Ok(DiagnosisReport {
            confidence_indicator: summary.confidence_indicator(),
            summary,
            original_image,
            annotated_image,
            width,
            height,
            processing_time: processing_time.as_secs_f32(),
            model_info: self.detector.info(),
        })
    }
}

fn send_status(
    status_tx: &Option<mpsc::UnboundedSender<DiagnosisStatus>>,
    stage: DiagnosisStage,
    progress: f32,
    message: &str,
) {
    if let Some(tx) = status_tx {
        let _ = tx.send(DiagnosisStatus::new(stage, progress, message));
    }
}

/// 解码和推理都是 CPU 密集操作，放到阻塞线程池
async fn run_blocking<T, F>(f: F) -> Result<T>
where
    F: FnOnce() -> Result<T> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| FractureError::Internal(format!("Blocking task failed: {}", e)))?
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diagnosis::{BoundingBox, Detection, DetectionSet, DetectorInfo, Verdict};
    use crate::models::LabelMap;
    use ::image::{DynamicImage, ImageFormat, Rgb};
    use std::io::Cursor;

    struct FixedDetector {
        detections: DetectionSet,
        labels: LabelMap,
    }

    impl FractureDetector for FixedDetector {
        fn detect(&self, _image: &RgbImage) -> Result<DetectionSet> {
            Ok(self.detections.clone())
        }

        fn labels(&self) -> &LabelMap {
            &self.labels
        }

        fn info(&self) -> DetectorInfo {
            DetectorInfo {
                model_name: "fixed".to_string(),
                input_size: 640,
                conf_threshold: 0.25,
                iou_threshold: 0.7,
                labels: self.labels.names().to_vec(),
            }
        }
    }

    fn pipeline(detections: DetectionSet) -> DiagnosisPipeline {
        let detector = FixedDetector {
            detections,
            labels: LabelMap::new(vec!["fracture".to_string()]),
        };
        DiagnosisPipeline::new(Arc::new(detector), Arc::new(Annotator::default()))
    }

    fn jpeg_bytes() -> axum::body::Bytes {
        let img = RgbImage::from_pixel(32, 24, Rgb([128, 128, 128]));
        let mut buf = Vec::new();
        DynamicImage::ImageRgb8(img)
            .write_to(&mut Cursor::new(&mut buf), ImageFormat::Jpeg)
            .unwrap();
        buf.into()
    }

    #[tokio::test]
    async fn no_detections_reports_clear() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let report = pipeline(Vec::new())
            .process_bytes(jpeg_bytes(), Some(tx))
            .await
            .unwrap();

        assert_eq!(report.summary.verdict, Verdict::Clear);
        assert_eq!(report.confidence_indicator, None);
        assert_eq!((report.width, report.height), (32, 24));
        assert_eq!(report.original_image, report.annotated_image);

        let mut last = None;
        while let Ok(status) = rx.try_recv() {
            last = Some(status.stage);
        }
        assert_eq!(last, Some(DiagnosisStage::Completed));
    }

    #[tokio::test]
    async fn detections_report_suspected() {
        let detections = vec![Detection {
            label: "fracture".to_string(),
            class_id: 0,
            confidence: 0.8734,
            region: BoundingBox::new(4.0, 4.0, 20.0, 16.0),
        }];
        let report = pipeline(detections)
            .process_bytes(jpeg_bytes(), None)
            .await
            .unwrap();

        assert_eq!(report.summary.verdict, Verdict::Suspected);
        assert_eq!(report.summary.lines, vec!["1. fracture — Confidence: 87.34%"]);
        assert_eq!(report.confidence_indicator, Some(87));
        assert_ne!(report.original_image, report.annotated_image);
    }

    #[tokio::test]
    async fn undecodable_upload_skips_detection() {
        let err = pipeline(Vec::new())
            .process_bytes(axum::body::Bytes::from_static(b"not an image"), None)
            .await
            .unwrap_err();

        assert_eq!(err.error_code(), "INVALID_INPUT");
    }
}
