use crate::models::{ByteTracker, ClassNames, ObjectDetector, ObjectTracker, YoloDetector};
use crate::utils::error::RecognitionError;
use crate::{Config, Result};
use std::sync::Arc;

/// 已加载的模型资源
#[derive(Clone)]
pub struct LoadedModels {
    pub detector: Arc<dyn ObjectDetector>,
    pub tracker: Arc<dyn ObjectTracker>,
    pub class_names: Arc<ClassNames>,
}

/// 进程级模型状态，启动时确定，之后不再变化
pub enum ModelState {
    Ready(LoadedModels),
    Unavailable { reason: String },
}

/// 模型管理器
pub struct ModelManager {
    state: ModelState,
    config: Config,
}

impl ModelManager {
    /// 加载模型；失败时进入不可用状态而不是退出进程
    pub fn load(config: Config) -> Self {
        tracing::info!("Initializing model manager...");

        match YoloDetector::new(&config) {
            Ok(detector) => {
                let manager = Self::with_detector(config, Arc::new(detector));
                tracing::info!(
                    "Model loaded successfully, confidence threshold: {}",
                    manager.confidence_threshold()
                );
                manager
            }
            Err(e) => {
                tracing::error!("Error loading model: {}", e);
                Self::unavailable(config, e.to_string())
            }
        }
    }

    /// 使用给定检测器构建，跟踪器包装同一个检测器
    pub fn with_detector(config: Config, detector: Arc<dyn ObjectDetector>) -> Self {
        let class_names = Arc::new(detector.class_names().clone());
        let tracker = Arc::new(ByteTracker::new(
            Arc::clone(&detector),
            config.tracker_config.clone(),
        ));

        Self {
            state: ModelState::Ready(LoadedModels {
                detector,
                tracker,
                class_names,
            }),
            config,
        }
    }

    pub fn unavailable(config: Config, reason: impl Into<String>) -> Self {
        Self {
            state: ModelState::Unavailable {
                reason: reason.into(),
            },
            config,
        }
    }

    /// 获取已加载模型，不可用时返回 503 对应的错误
    pub fn ready(&self) -> Result<&LoadedModels> {
        match &self.state {
            ModelState::Ready(models) => Ok(models),
            ModelState::Unavailable { reason } => {
                Err(RecognitionError::ModelUnavailable(reason.clone()))
            }
        }
    }

    pub fn is_loaded(&self) -> bool {
        matches!(self.state, ModelState::Ready(_))
    }

    /// 按ID顺序列出类别标签，模型不可用时为空
    pub fn class_labels(&self) -> Vec<String> {
        match &self.state {
            ModelState::Ready(models) => models.class_names.labels(),
            ModelState::Unavailable { .. } => Vec::new(),
        }
    }

    pub fn confidence_threshold(&self) -> f32 {
        self.config.detection_config.confidence_threshold
    }

    pub fn config(&self) -> &Config {
        &self.config
    }
}
