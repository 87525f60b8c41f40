use crate::image::ImageLoader;
use crate::models::{ClassNames, LoadedModels, ObjectDetector, ObjectTracker, RawDetection};
use crate::recognition::denomination::resolve_denomination;
use crate::recognition::formatter::ResultFormatter;
use crate::recognition::types::{BoundingBox, DetectionResult, Selection};
use crate::utils::error::RecognitionError;
use crate::Result;
use image::RgbImage;
use std::sync::Arc;
use std::time::Instant;

/// 模型的负样本类别，不能出现在结果中
const BACKGROUND_LABEL: &str = "background";

/// 重置跟踪器时使用的空白帧边长
const RESET_FRAME_SIZE: u32 = 100;

/// 识别流水线
pub struct RecognitionPipeline;

impl RecognitionPipeline {
    /// 单帧检测（无状态）
    pub async fn predict(
        models: &LoadedModels,
        image: RgbImage,
        confidence_threshold: f32,
    ) -> Result<Selection> {
        let detector = Arc::clone(&models.detector);
        let class_names = Arc::clone(&models.class_names);

        run_blocking(move || {
            Self::detect(detector.as_ref(), &class_names, &image, confidence_threshold)
        })
        .await
    }

    /// 多帧跟踪（保持与上一次调用的连续性）
    pub async fn track(
        models: &LoadedModels,
        image: RgbImage,
        confidence_threshold: f32,
    ) -> Result<Selection> {
        let tracker = Arc::clone(&models.tracker);
        let class_names = Arc::clone(&models.class_names);

        run_blocking(move || {
            Self::track_frame(tracker.as_ref(), &class_names, &image, confidence_threshold)
        })
        .await
    }

    /// 丢弃跟踪状态：以 `persist = false` 处理一帧空白图像
    pub async fn reset_tracker(models: &LoadedModels, confidence_threshold: f32) -> Result<()> {
        let tracker = Arc::clone(&models.tracker);

        run_blocking(move || Self::reset(tracker.as_ref(), confidence_threshold)).await
    }

    pub fn detect(
        detector: &dyn ObjectDetector,
        class_names: &ClassNames,
        image: &RgbImage,
        confidence_threshold: f32,
    ) -> Result<Selection> {
        let start_time = Instant::now();
        let raw = detector.infer(image, confidence_threshold)?;
        let selection = Self::select(Self::collect(raw, class_names, false));

        tracing::info!(
            "Detection completed: detections={}, best={:?}, time={:.3}s",
            selection.all_detections,
            selection.best.as_ref().map(|b| b.denomination),
            start_time.elapsed().as_secs_f32()
        );
        Ok(selection)
    }

    pub fn track_frame(
        tracker: &dyn ObjectTracker,
        class_names: &ClassNames,
        image: &RgbImage,
        confidence_threshold: f32,
    ) -> Result<Selection> {
        let start_time = Instant::now();
        let raw = tracker.track(image, confidence_threshold, true)?;
        let selection = Self::select(Self::collect(raw, class_names, true));

        tracing::info!(
            "Tracking completed: detections={}, best_track={:?}, time={:.3}s",
            selection.all_detections,
            selection.best.as_ref().and_then(|b| b.track_id),
            start_time.elapsed().as_secs_f32()
        );
        Ok(selection)
    }

    pub fn reset(tracker: &dyn ObjectTracker, confidence_threshold: f32) -> Result<()> {
        let blank = ImageLoader::blank(RESET_FRAME_SIZE, RESET_FRAME_SIZE);
        tracker.track(&blank, confidence_threshold, false)?;
        tracing::info!("Tracker reset");
        Ok(())
    }

    /// 原始检测转换为结果：过滤背景、取整、解析面额
    pub fn collect(
        raw: Vec<RawDetection>,
        class_names: &ClassNames,
        keep_track_id: bool,
    ) -> Vec<DetectionResult> {
        raw.into_iter()
            .filter_map(|det| {
                let class_label = class_names.label(det.class_id);
                if class_label.eq_ignore_ascii_case(BACKGROUND_LABEL) {
                    return None;
                }

                let [x1, y1, x2, y2] = det.bbox.map(|v| ResultFormatter::round_to(v, 2));
                Some(DetectionResult {
                    denomination: resolve_denomination(&class_label),
                    class_label,
                    confidence: ResultFormatter::round_to(det.confidence, 4),
                    raw_confidence: det.confidence,
                    bounding_box: BoundingBox { x1, y1, x2, y2 },
                    track_id: if keep_track_id { det.track_id } else { None },
                })
            })
            .collect()
    }

    /// 稳定排序后取置信度最高的一个
    pub fn select(mut results: Vec<DetectionResult>) -> Selection {
        results.sort_by(|a, b| b.confidence.total_cmp(&a.confidence));

        Selection {
            all_detections: results.len(),
            best: results.into_iter().next(),
        }
    }
}

async fn run_blocking<T, F>(task: F) -> Result<T>
where
    F: FnOnce() -> Result<T> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(task)
        .await
        .map_err(|e| RecognitionError::Internal(format!("Inference task failed: {}", e)))?
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::TrackerConfig;
    use crate::models::ByteTracker;
    use RecognitionPipeline as Pipeline;

    struct FixedDetector {
        names: ClassNames,
        detections: Vec<RawDetection>,
    }

    impl ObjectDetector for FixedDetector {
        fn class_names(&self) -> &ClassNames {
            &self.names
        }

        fn infer(&self, image: &RgbImage, threshold: f32) -> Result<Vec<RawDetection>> {
            // 全黑帧上没有目标
            if image.pixels().all(|p| p.0 == [0, 0, 0]) {
                return Ok(Vec::new());
            }
            Ok(self
                .detections
                .iter()
                .filter(|d| d.confidence >= threshold)
                .cloned()
                .collect())
        }
    }

    fn names() -> ClassNames {
        ClassNames::from_labels(["10000", "500k", "Background", "mystery"])
    }

    fn frame() -> RgbImage {
        RgbImage::from_pixel(4, 4, image::Rgb([180, 160, 120]))
    }

    fn raw(class_id: usize, confidence: f32) -> RawDetection {
        RawDetection::new([10.123, 20.456, 30.789, 40.001], confidence, class_id)
    }

    #[test]
    fn background_is_never_reported() {
        let results = Pipeline::collect(vec![raw(2, 0.99), raw(0, 0.8)], &names(), false);
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].class_label, "10000");

        let upper = ClassNames::from_labels(["BACKGROUND"]);
        assert!(Pipeline::collect(vec![raw(0, 0.99)], &upper, false).is_empty());
    }

    #[test]
    fn values_are_rounded_and_resolved() {
        let results = Pipeline::collect(vec![raw(1, 0.876_54)], &names(), false);
        let result = &results[0];
        assert_eq!(result.denomination, 500_000);
        assert_eq!(result.confidence, 0.8765);
        assert_eq!(result.raw_confidence, 0.876_54);
        assert_eq!(
            result.bounding_box,
            BoundingBox {
                x1: 10.12,
                y1: 20.46,
                x2: 30.79,
                y2: 40.0
            }
        );

        let unknown = Pipeline::collect(vec![raw(3, 0.9)], &names(), false);
        assert_eq!(unknown[0].denomination, 0);
    }

    #[test]
    fn highest_confidence_wins_with_stable_ties() {
        let selection = Pipeline::select(Pipeline::collect(
            vec![raw(0, 0.82), raw(1, 0.95)],
            &names(),
            false,
        ));
        assert_eq!(selection.all_detections, 2);
        assert_eq!(selection.best.unwrap().confidence, 0.95);

        let tie = Pipeline::select(Pipeline::collect(
            vec![raw(0, 0.9), raw(1, 0.9)],
            &names(),
            false,
        ));
        assert_eq!(tie.best.unwrap().class_label, "10000");

        assert!(Pipeline::select(Vec::new()).best.is_none());
    }

    #[test]
    fn detect_uses_threshold_and_drops_track_ids() {
        let detector = FixedDetector {
            names: names(),
            detections: vec![
                RawDetection {
                    track_id: Some(7),
                    ..raw(0, 0.75)
                },
                raw(1, 0.5),
            ],
        };
        let image = frame();
        let selection = Pipeline::detect(&detector, &names(), &image, 0.7).unwrap();
        assert_eq!(selection.all_detections, 1);
        assert_eq!(selection.best.unwrap().track_id, None);
    }

    #[test]
    fn tracking_assigns_ids_and_reset_clears_them() {
        let detector = Arc::new(FixedDetector {
            names: names(),
            detections: vec![raw(0, 0.9)],
        });
        let tracker = ByteTracker::new(detector, TrackerConfig::default());
        let image = frame();

        let first = Pipeline::track_frame(&tracker, &names(), &image, 0.7).unwrap();
        assert_eq!(first.best.unwrap().track_id, Some(1));
        assert_eq!(tracker.active_tracks(), 1);

        Pipeline::reset(&tracker, 0.7).unwrap();
        assert_eq!(tracker.active_tracks(), 0);
    }

    #[tokio::test]
    async fn async_predict_runs_off_the_runtime() {
        let detector: Arc<dyn ObjectDetector> = Arc::new(FixedDetector {
            names: names(),
            detections: vec![raw(1, 0.95), raw(0, 0.82)],
        });
        let models = LoadedModels {
            tracker: Arc::new(ByteTracker::new(Arc::clone(&detector), TrackerConfig::default())),
            class_names: Arc::new(names()),
            detector,
        };

        let selection = RecognitionPipeline::predict(&models, frame(), 0.7)
            .await
            .unwrap();
        assert_eq!(selection.best.unwrap().denomination, 500_000);

        RecognitionPipeline::reset_tracker(&models, 0.7).await.unwrap();
    }
}
