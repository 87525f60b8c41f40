use anyhow::Result;
use clap::Parser;
use tracing_subscriber::EnvFilter;
use vnd_recognition::{config::Config, web::serve};

#[derive(Parser)]
#[command(name = "vnd-recognition")]
#[command(about = "Vietnamese banknote recognition service powered by ONNX Runtime")]
struct Args {
    /// Server bind address
    #[arg(long, default_value = "0.0.0.0:8000")]
    bind: String,

    /// Detection model path
    #[arg(long, default_value = "best.onnx")]
    model: String,

    /// Optional JSON class names file
    #[arg(long)]
    names: Option<String>,

    /// Minimum confidence for a reported detection
    #[arg(long, default_value_t = 0.7)]
    confidence: f32,

    /// NMS IoU threshold
    #[arg(long, default_value_t = 0.45)]
    iou: f32,

    /// Model input size
    #[arg(long, default_value_t = 640)]
    input_size: u32,

    /// Number of worker threads
    #[arg(long)]
    workers: Option<usize>,

    /// Log level
    #[arg(long, default_value = "info")]
    log_level: String,
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

    tracing::info!("Starting VND recognition service...");
    tracing::info!("Bind address: {}", args.bind);
    tracing::info!("Model path: {}", args.model);

    // 创建配置
    let config = Config::new(args.bind, args.model, args.workers)?
        .with_names_path(args.names)
        .with_detection(args.confidence, args.iou, args.input_size)?;

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .worker_threads(config.workers)
        .enable_all()
        .build()?;

    // 启动服务器
    runtime.block_on(serve(config))?;

    Ok(())
}
