pub mod pipeline;
pub mod summarizer;
pub mod types;

pub use pipeline::DiagnosisPipeline;
pub use summarizer::summarize;
pub use types::*;
