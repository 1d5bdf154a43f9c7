use anyhow::Result;
use std::path::PathBuf;

#[derive(Debug, Clone)]
pub struct Config {
    /// 服务器绑定地址
    pub bind_addr: String,

    /// ONNX 模型文件路径
    pub model_path: PathBuf,

    /// 类别名称文件（每行一个），覆盖模型元数据
    pub labels_path: Option<PathBuf>,

    /// 标注文字使用的字体
    pub font_path: Option<PathBuf>,

    /// 工作线程数量
    pub workers: usize,

    /// 开发模式
    pub dev_mode: bool,

    /// ONNX Runtime配置
    pub onnx_config: OnnxConfig,

    /// 服务器配置
    pub server_config: ServerConfig,

    /// 检测参数
    pub detection_config: DetectionConfig,
}

#[derive(Debug, Clone)]
pub struct OnnxConfig {
    /// CPU线程数
    pub intra_threads: usize,

    /// 模型输入名称
    pub input_name: String,

    /// 模型输出名称
    pub output_name: String,
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// 请求超时时间（秒）
    pub request_timeout: u64,

    /// 最大请求体大小（字节）
    pub max_request_size: usize,
}

#[derive(Debug, Clone)]
pub struct DetectionConfig {
    /// 模型输入边长
    pub input_size: u32,

    /// 置信度阈值
    pub conf_threshold: f32,

    /// NMS IoU 阈值
    pub iou_threshold: f32,

    /// 单张图像最多保留的检测数
    pub max_detections: usize,
}

impl Default for DetectionConfig {
    fn default() -> Self {
        Self {
            input_size: 640,
            conf_threshold: 0.25,
            iou_threshold: 0.7,
            max_detections: 300,
        }
    }
}

impl Config {
    pub fn new(
        bind_addr: String,
        model_path: String,
        workers: Option<usize>,
        dev_mode: bool,
    ) -> Result<Self> {
        let cpu_cores = num_cpus::get();
        let workers = workers.unwrap_or(cpu_cores);

        let onnx_config = OnnxConfig {
            intra_threads: (cpu_cores * 3 / 4).max(1),
            input_name: "images".to_string(),
            output_name: "output0".to_string(),
        };

        let server_config = ServerConfig {
            request_timeout: if dev_mode { 300 } else { 60 },
            max_request_size: 50 * 1024 * 1024,
        };

        Ok(Self {
            bind_addr,
            model_path: PathBuf::from(model_path),
            labels_path: None,
            font_path: None,
            workers,
            dev_mode,
            onnx_config,
            server_config,
            detection_config: DetectionConfig::default(),
        })
    }

    pub fn with_labels(mut self, labels_path: Option<String>) -> Self {
        self.labels_path = labels_path.map(PathBuf::from);
        self
    }

    pub fn with_font(mut self, font_path: Option<String>) -> Self {
        self.font_path = font_path.map(PathBuf::from);
        self
    }

    /// 覆盖检测阈值，超出 [0, 1] 的值视为配置错误
    pub fn with_thresholds(
        mut self,
        conf_threshold: Option<f32>,
        iou_threshold: Option<f32>,
    ) -> Result<Self> {
        if let Some(conf) = conf_threshold {
            anyhow::ensure!(
                (0.0..=1.0).contains(&conf),
                "confidence threshold must be between 0.0 and 1.0, got {}",
                conf
            );
            self.detection_config.conf_threshold = conf;
        }
        if let Some(iou) = iou_threshold {
            anyhow::ensure!(
                (0.0..=1.0).contains(&iou),
                "IoU threshold must be between 0.0 and 1.0, got {}",
                iou
            );
            self.detection_config.iou_threshold = iou;
        }
        Ok(self)
    }

    pub fn with_input_size(mut self, input_size: Option<u32>) -> Result<Self> {
        if let Some(size) = input_size {
            anyhow::ensure!(
                size >= 32 && size % 32 == 0,
                "input size must be a positive multiple of 32, got {}",
                size
            );
            self.detection_config.input_size = size;
        }
        Ok(self)
    }

    /// 模型名称（文件名去掉扩展名）
    pub fn model_name(&self) -> String {
        self.model_path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "model".to_string())
    }
}
