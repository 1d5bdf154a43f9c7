use anyhow::Result;
use clap::Parser;
use hand_fracture::{config::Config, web::serve};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "hand-fracture")]
#[command(about = "Hand X-ray fracture detection service")]
struct Args {
    /// Server bind address
    #[arg(long, default_value = "0.0.0.0:8501")]
    bind: String,

    /// Path to the YOLOv8 ONNX model
    #[arg(long, default_value = "best.onnx")]
    model: String,

    /// Class names file (one per line), overrides model metadata
    #[arg(long)]
    labels: Option<String>,

    /// TrueType font for box labels
    #[arg(long)]
    font: Option<String>,

    /// Minimum detection confidence
    #[arg(long)]
    conf_threshold: Option<f32>,

    /// NMS IoU threshold
    #[arg(long)]
    iou_threshold: Option<f32>,

    /// Model input size (square, multiple of 32)
    #[arg(long)]
    input_size: Option<u32>,

    /// Number of worker threads
    #[arg(long)]
    workers: Option<usize>,

    /// Log level
    #[arg(long, default_value = "info")]
    log_level: String,

    /// Enable development mode
    #[arg(long)]
    dev: bool,
}

fn main() -> Result<()> {
    let args = Args::parse();

    // 初始化日志系统
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&args.log_level)),
        )
        .with_target(false)
        .init();

    tracing::info!("Starting hand fracture detection service...");
    tracing::info!("Bind address: {}", args.bind);
    tracing::info!("Model path: {}", args.model);

    let config = Config::new(args.bind, args.model, args.workers, args.dev)?
        .with_labels(args.labels)
        .with_font(args.font)
        .with_thresholds(args.conf_threshold, args.iou_threshold)?
        .with_input_size(args.input_size)?;

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .worker_threads(config.workers)
        .enable_all()
        .build()?;

    runtime.block_on(async {
        serve(config).await.map_err(|e| {
            tracing::error!("Service stopped: {}", e);
            anyhow::Error::from(e)
        })
    })
}
