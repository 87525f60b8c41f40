use serde::Serialize;

/// 边界框（像素坐标）
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct BoundingBox {
    pub x1: f32,
    pub y1: f32,
    pub x2: f32,
    pub y2: f32,
}

/// 单个检测结果，按请求构建，响应发送后丢弃
#[derive(Debug, Clone, PartialEq)]
pub struct DetectionResult {
    pub class_label: String,
    /// 面额（VND），0 表示无法识别
    pub denomination: u32,
    /// 保留四位小数，用于排序和输出
    pub confidence: f32,
    /// 模型原始分数，百分比由它格式化
    pub raw_confidence: f32,
    pub bounding_box: BoundingBox,
    /// 仅跟踪模式下存在
    pub track_id: Option<u32>,
}

/// 排序后选出的最佳结果
#[derive(Debug, Clone, Default)]
pub struct Selection {
    pub best: Option<DetectionResult>,
    /// 过滤背景后、取 top-1 之前的检测数
    pub all_detections: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct Prediction {
    pub class_name: String,
    pub denomination: u32,
    pub denomination_formatted: String,
    pub confidence: f32,
    pub confidence_percent: String,
    pub bbox: BoundingBox,
}

#[derive(Debug, Clone, Serialize)]
pub struct TrackedPrediction {
    pub track_id: Option<u32>,
    #[serde(flatten)]
    pub prediction: Prediction,
}

#[derive(Debug, Serialize)]
pub struct PredictResponse {
    pub success: bool,
    pub predictions: Vec<Prediction>,
    pub count: usize,
    pub total_value: u32,
    pub total_value_formatted: String,
    pub all_detections: usize,
}

#[derive(Debug, Serialize)]
pub struct TrackResponse {
    pub success: bool,
    pub predictions: Vec<TrackedPrediction>,
    pub count: usize,
    pub all_detections: usize,
}

#[derive(Debug, Serialize)]
pub struct ResetResponse {
    pub success: bool,
    pub message: String,
}
