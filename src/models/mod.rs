pub mod detector;
pub mod labels;
pub mod manager;
pub mod postprocess;

pub use detector::{FractureDetector, OnnxDetector};
pub use labels::LabelMap;
pub use manager::ModelManager;
pub use postprocess::YoloPostprocessor;
