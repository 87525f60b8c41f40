use crate::utils::error::RecognitionError;
use crate::Result;
use std::path::PathBuf;

#[derive(Debug, Clone)]
pub struct Config {
    /// 服务器绑定地址
    pub bind_addr: String,

    /// ONNX 模型文件路径
    pub model_path: PathBuf,

    /// 可选的类别名称文件（覆盖模型元数据）
    pub names_path: Option<PathBuf>,

    /// 工作线程数量
    pub workers: usize,

    /// ONNX Runtime配置
    pub onnx_config: OnnxConfig,

    /// 服务器配置
    pub server_config: ServerConfig,

    /// 检测配置
    pub detection_config: DetectionConfig,

    /// 跟踪配置
    pub tracker_config: TrackerConfig,
}

#[derive(Debug, Clone)]
pub struct OnnxConfig {
    /// CPU线程数
    pub intra_threads: usize,

    /// 优化级别
    pub optimization_level: i32,
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// 最大请求体大小（字节）
    pub max_request_size: usize,
}

#[derive(Debug, Clone)]
pub struct DetectionConfig {
    /// 置信度阈值
    pub confidence_threshold: f32,

    /// NMS IoU 阈值
    pub iou_threshold: f32,

    /// 模型输入边长（正方形）
    pub input_size: u32,

    /// 单张图片最多保留的检测框
    pub max_detections: usize,
}

#[derive(Debug, Clone)]
pub struct TrackerConfig {
    /// 低分检测下限，低于置信度阈值但高于此值的框只用于救援已有轨迹
    pub low_score_threshold: f32,

    /// 第一轮（高分）匹配的 IoU 下限
    pub match_iou_threshold: f32,

    /// 第二轮（低分）匹配的 IoU 下限
    pub low_match_iou_threshold: f32,

    /// 待确认轨迹匹配的 IoU 下限
    pub tentative_match_iou_threshold: f32,

    /// 轨迹最多允许丢失的帧数
    pub max_lost_frames: u32,
}

impl Default for DetectionConfig {
    fn default() -> Self {
        Self {
            confidence_threshold: 0.7,
            iou_threshold: 0.45,
            input_size: 640,
            max_detections: 300,
        }
    }
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            low_score_threshold: 0.1,
            match_iou_threshold: 0.2,
            low_match_iou_threshold: 0.5,
            tentative_match_iou_threshold: 0.3,
            max_lost_frames: 30,
        }
    }
}

impl Config {
    pub fn new(
        bind_addr: String,
        model_path: String,
        workers: Option<usize>,
    ) -> Result<Self> {
        let cpu_cores = num_cpus::get();
        let workers = workers.unwrap_or(cpu_cores);
        if workers == 0 {
            return Err(RecognitionError::Config(
                "Worker count must be at least 1".to_string(),
            ));
        }

        let onnx_config = OnnxConfig {
            intra_threads: (cpu_cores * 3 / 4).max(1), // 使用75%的CPU核心
            optimization_level: 3,
        };

        let server_config = ServerConfig {
            max_request_size: 20 * 1024 * 1024, // 20MB
        };

        Ok(Self {
            bind_addr,
            model_path: PathBuf::from(model_path),
            names_path: None,
            workers,
            onnx_config,
            server_config,
            detection_config: DetectionConfig::default(),
            tracker_config: TrackerConfig::default(),
        })
    }

    /// 设置类别名称文件
    pub fn with_names_path(mut self, names_path: Option<String>) -> Self {
        self.names_path = names_path.map(PathBuf::from);
        self
    }

    /// 设置检测参数并校验取值范围
    pub fn with_detection(
        mut self,
        confidence_threshold: f32,
        iou_threshold: f32,
        input_size: u32,
    ) -> Result<Self> {
        if !(0.0..=1.0).contains(&confidence_threshold) {
            return Err(RecognitionError::Config(format!(
                "Confidence threshold must be between 0.0 and 1.0, got {}",
                confidence_threshold
            )));
        }
        if !(0.0..=1.0).contains(&iou_threshold) {
            return Err(RecognitionError::Config(format!(
                "IoU threshold must be between 0.0 and 1.0, got {}",
                iou_threshold
            )));
        }
        if input_size == 0 || input_size % 32 != 0 {
            return Err(RecognitionError::Config(format!(
                "Input size must be a positive multiple of 32, got {}",
                input_size
            )));
        }

        self.detection_config.confidence_threshold = confidence_threshold;
        self.detection_config.iou_threshold = iou_threshold;
        self.detection_config.input_size = input_size;
        Ok(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base() -> Config {
        Config::new("127.0.0.1:0".to_string(), "best.onnx".to_string(), Some(2)).unwrap()
    }

    #[test]
    fn defaults_match_service_contract() {
        let config = base();
        assert_eq!(config.detection_config.confidence_threshold, 0.7);
        assert_eq!(config.detection_config.input_size, 640);
        assert_eq!(config.workers, 2);
        assert!(config.onnx_config.intra_threads >= 1);
        assert!(config.names_path.is_none());
    }

    #[test]
    fn rejects_out_of_range_thresholds() {
        assert!(base().with_detection(1.5, 0.45, 640).is_err());
        assert!(base().with_detection(0.7, -0.1, 640).is_err());
        assert!(base().with_detection(0.7, 0.45, 600).is_err());
        let config = base().with_detection(0.5, 0.6, 320).unwrap();
        assert_eq!(config.detection_config.confidence_threshold, 0.5);
        assert_eq!(config.detection_config.iou_threshold, 0.6);
    }

    #[test]
    fn zero_workers_is_a_config_error() {
        let err =
            Config::new("0.0.0.0:8000".to_string(), "m.onnx".to_string(), Some(0)).unwrap_err();
        assert!(matches!(err, RecognitionError::Config(_)));
    }
}
