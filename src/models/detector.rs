use crate::config::DetectionConfig;
use crate::diagnosis::{DetectionSet, DetectorInfo};
use crate::image::ImagePreprocessor;
use crate::models::{LabelMap, YoloPostprocessor};
use crate::utils::error::FractureError;
use crate::{Config, Result};
use image::RgbImage;
use ort::{
    session::{builder::GraphOptimizationLevel, Session},
    value::TensorRef,
};
use parking_lot::Mutex;

/// 检测能力：输入 RGB 图像，输出有序检测结果
pub trait FractureDetector: Send + Sync {
    fn detect(&self, image: &RgbImage) -> Result<DetectionSet>;

    fn labels(&self) -> &LabelMap;

    fn info(&self) -> DetectorInfo;
}

/// 基于 ONNX Runtime 的 YOLOv8 检测器
pub struct OnnxDetector {
    session: Mutex<Session>,
    input_name: String,
    output_name: String,
    model_name: String,
    labels: LabelMap,
    detection_config: DetectionConfig,
    postprocessor: YoloPostprocessor,
}

impl OnnxDetector {
    pub fn new(config: &Config) -> Result<Self> {
        let model_path = &config.model_path;

        if !model_path.exists() {
            return Err(FractureError::ModelLoad(format!(
                "Model file not found: {}",
                model_path.display()
            )));
        }

        tracing::info!("Loading detection model from: {}", model_path.display());

        let session = Session::builder()
            .map_err(|e| FractureError::ModelLoad(e.to_string()))?
            .with_optimization_level(GraphOptimizationLevel::Level3)
            .map_err(|e| FractureError::ModelLoad(e.to_string()))?
            .with_intra_threads(config.onnx_config.intra_threads)
            .map_err(|e| FractureError::ModelLoad(e.to_string()))?
            .commit_from_file(model_path)
            .map_err(|e| FractureError::ModelLoad(format!("Failed to load model: {}", e)))?;

        let labels = Self::resolve_labels(config, &session)?;
        tracing::info!("Model classes ({}): {:?}", labels.len(), labels.names());

        Ok(Self {
            session: Mutex::new(session),
            input_name: config.onnx_config.input_name.clone(),
            output_name: config.onnx_config.output_name.clone(),
            model_name: config.model_name(),
            labels,
            detection_config: config.detection_config.clone(),
            postprocessor: YoloPostprocessor::new(&config.detection_config),
        })
    }

    /// 类别名称：标签文件优先，其次模型元数据
    fn resolve_labels(config: &Config, session: &Session) -> Result<LabelMap> {
        if let Some(path) = &config.labels_path {
            tracing::info!("Loading class names from: {}", path.display());
            return LabelMap::from_file(path);
        }

        let raw = session
            .metadata()
            .ok()
            .and_then(|metadata| metadata.custom("names"));

        match raw.as_deref().and_then(LabelMap::from_metadata) {
            Some(labels) => Ok(labels),
            None => {
                tracing::warn!("Model has no usable 'names' metadata, using class indices");
                Ok(LabelMap::default())
            }
        }
    }
}

impl FractureDetector for OnnxDetector {
    fn detect(&self, image: &RgbImage) -> Result<DetectionSet> {
        let (input, transform) =
            ImagePreprocessor::letterbox(image, self.detection_config.input_size)?;

        let output = {
            let mut session = self.session.lock();
            let outputs = session.run(ort::inputs![
                self.input_name.as_str() => TensorRef::from_array_view(input.view())?
            ])?;

            match outputs.get(self.output_name.as_str()) {
                Some(output) => output.try_extract_array::<f32>()?.into_owned(),
                None => {
                    let available: Vec<String> = outputs.keys().map(|s| s.to_string()).collect();
                    return Err(FractureError::Inference(format!(
                        "Output '{}' not found. Available outputs: {:?}",
                        self.output_name, available
                    )));
                }
            }
        };

        let detections = self
            .postprocessor
            .decode(&output.view(), &transform, &self.labels)?;

        tracing::info!("Detected {} objects", detections.len());
        Ok(detections)
    }

    fn labels(&self) -> &LabelMap {
        &self.labels
    }

    fn info(&self) -> DetectorInfo {
        DetectorInfo {
            model_name: self.model_name.clone(),
            input_size: self.detection_config.input_size,
            conf_threshold: self.detection_config.conf_threshold,
            iou_threshold: self.detection_config.iou_threshold,
            labels: self.labels.names().to_vec(),
        }
    }
}
