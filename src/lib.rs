pub mod config;
pub mod image;
pub mod models;
pub mod recognition;
pub mod utils;
pub mod web;

// 重新导出主要类型
pub use config::Config;
pub use models::ModelManager;
pub use recognition::{DetectionResult, RecognitionPipeline};
pub use utils::error::RecognitionError;

pub type Result<T> = std::result::Result<T, RecognitionError>;
