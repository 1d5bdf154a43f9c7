use crate::image::Annotator;
use crate::models::{FractureDetector, OnnxDetector};
use crate::utils::error::FractureError;
use crate::{Config, Result};
use once_cell::sync::OnceCell;
use std::sync::Arc;

/// 全局模型管理器单例，启动时初始化一次，之后只读
pub struct ModelManager {
    detector: Arc<dyn FractureDetector>,
    annotator: Arc<Annotator>,
    config: Config,
}

static MODEL_MANAGER: OnceCell<ModelManager> = OnceCell::new();

impl ModelManager {
    /// 初始化全局模型管理器，模型缺失或加载失败直接返回错误
    pub fn init(config: Config) -> Result<()> {
        tracing::info!("Initializing model manager...");

        let detector: Arc<dyn FractureDetector> = Arc::new(OnnxDetector::new(&config)?);
        let annotator = Arc::new(Annotator::new(config.font_path.as_deref())?);

        let manager = ModelManager {
            detector,
            annotator,
            config,
        };

        MODEL_MANAGER
            .set(manager)
            .map_err(|_| FractureError::Internal("Model manager already initialized".to_string()))?;

        tracing::info!("Model manager initialized successfully");
        Ok(())
    }

    /// 获取全局模型管理器实例
    pub fn instance() -> Result<&'static ModelManager> {
        MODEL_MANAGER
            .get()
            .ok_or_else(|| FractureError::Internal("Model manager not initialized".to_string()))
    }

    pub fn detector(&self) -> Arc<dyn FractureDetector> {
        Arc::clone(&self.detector)
    }

    pub fn annotator(&self) -> Arc<Annotator> {
        Arc::clone(&self.annotator)
    }

    pub fn config(&self) -> &Config {
        &self.config
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_model_fails_fast() {
        let config = Config::new(
            "127.0.0.1:0".to_string(),
            "/nonexistent/best.onnx".to_string(),
            Some(1),
            false,
        )
        .unwrap();

        let err = ModelManager::init(config).unwrap_err();
        assert_eq!(err.error_code(), "MODEL_LOAD_ERROR");
        assert!(ModelManager::instance().is_err());
    }
}
