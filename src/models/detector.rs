use crate::config::DetectionConfig;
use crate::image::ImagePreprocessor;
use crate::models::ClassNames;
use crate::utils::error::RecognitionError;
use crate::{Config, Result};
use image::RgbImage;
use ndarray::{ArrayView2, Axis, Ix2};
use ort::{
    inputs,
    session::{builder::GraphOptimizationLevel, Session},
    value::Tensor,
};
use parking_lot::Mutex;

/// 检测器原始输出（像素坐标 x1,y1,x2,y2）
#[derive(Debug, Clone, PartialEq)]
pub struct RawDetection {
    pub bbox: [f32; 4],
    pub confidence: f32,
    pub class_id: usize,
    pub track_id: Option<u32>,
}

impl RawDetection {
    pub fn new(bbox: [f32; 4], confidence: f32, class_id: usize) -> Self {
        Self {
            bbox,
            confidence,
            class_id,
            track_id: None,
        }
    }
}

/// 单帧目标检测能力
pub trait ObjectDetector: Send + Sync {
    fn class_names(&self) -> &ClassNames;

    /// 返回置信度不低于阈值的检测框，按置信度降序
    fn infer(&self, image: &RgbImage, confidence_threshold: f32) -> Result<Vec<RawDetection>>;
}

/// YOLOv8 ONNX 检测器
pub struct YoloDetector {
    session: Mutex<Session>,
    input_name: String,
    output_name: String,
    class_names: ClassNames,
    input_size: u32,
    iou_threshold: f32,
    max_detections: usize,
}

impl YoloDetector {
    pub fn new(config: &Config) -> Result<Self> {
        let model_path = &config.model_path;

        if !model_path.exists() {
            return Err(RecognitionError::ModelLoad(format!(
                "Detection model not found: {}",
                model_path.display()
            )));
        }

        tracing::info!("Loading detection model from: {}", model_path.display());

        let session = Session::builder()?
            .with_optimization_level(optimization_level(config.onnx_config.optimization_level))?
            .with_intra_threads(config.onnx_config.intra_threads)?
            .commit_from_file(model_path)?;

        let input_name = session
            .inputs
            .first()
            .map(|input| input.name.clone())
            .ok_or_else(|| RecognitionError::ModelLoad("Detection model has no inputs".to_string()))?;
        let output_name = session
            .outputs
            .first()
            .map(|output| output.name.clone())
            .ok_or_else(|| RecognitionError::ModelLoad("Detection model has no outputs".to_string()))?;
        tracing::info!("Detection model input: '{}', output: '{}'", input_name, output_name);

        let class_names = match &config.names_path {
            Some(path) => {
                tracing::info!("Loading class names from: {}", path.display());
                ClassNames::from_json_file(path)?
            }
            None => {
                let metadata = session.metadata()?;
                let raw = metadata.custom("names")?.ok_or_else(|| {
                    RecognitionError::ModelLoad(
                        "Model metadata has no 'names' entry, pass --names".to_string(),
                    )
                })?;
                ClassNames::parse_metadata(&raw)?
            }
        };
        tracing::info!("Model classes: {:?}", class_names.labels());

        let DetectionConfig {
            input_size,
            iou_threshold,
            max_detections,
            ..
        } = config.detection_config;

        Ok(Self {
            session: Mutex::new(session),
            input_name,
            output_name,
            class_names,
            input_size,
            iou_threshold,
            max_detections,
        })
    }
}

impl ObjectDetector for YoloDetector {
    fn class_names(&self) -> &ClassNames {
        &self.class_names
    }

    fn infer(&self, image: &RgbImage, confidence_threshold: f32) -> Result<Vec<RawDetection>> {
        let (input, ratio) = ImagePreprocessor::letterbox(image, self.input_size);
        let input_tensor = Tensor::from_array(input)?;

        // 立即提取数据避免生命周期冲突
        let prediction = {
            let mut session = self.session.lock();
            let outputs = session.run(inputs![self.input_name.as_str() => input_tensor])?;

            match outputs.get(self.output_name.as_str()) {
                Some(output) => output.try_extract_array::<f32>()?.into_owned(),
                None => {
                    let available: Vec<String> = outputs.keys().map(|s| s.to_string()).collect();
                    return Err(RecognitionError::Inference(format!(
                        "Output '{}' not found. Available outputs: {:?}",
                        self.output_name, available
                    )));
                }
            }
        };

        if prediction.ndim() != 3 || prediction.shape()[0] == 0 {
            return Err(RecognitionError::Inference(format!(
                "Unexpected output shape {:?}, expected [1, 4 + nc, N]",
                prediction.shape()
            )));
        }
        let preds = prediction
            .index_axis(Axis(0), 0)
            .into_dimensionality::<Ix2>()
            .map_err(|e| RecognitionError::Inference(e.to_string()))?;

        let detections = decode_predictions(
            preds,
            self.class_names.num_classes(),
            ratio,
            image.dimensions(),
            confidence_threshold,
            self.iou_threshold,
            self.max_detections,
        )?;

        tracing::debug!(
            "Detector produced {} boxes at conf >= {}",
            detections.len(),
            confidence_threshold
        );
        Ok(detections)
    }
}

fn optimization_level(level: i32) -> GraphOptimizationLevel {
    match level {
        i32::MIN..=0 => GraphOptimizationLevel::Disable,
        1 => GraphOptimizationLevel::Level1,
        2 => GraphOptimizationLevel::Level2,
        _ => GraphOptimizationLevel::Level3,
    }
}

/// 解码 `[4 + nc, N]` 输出（cx, cy, w, h, 各类别分数）并执行 NMS
pub fn decode_predictions(
    preds: ArrayView2<f32>,
    num_classes: usize,
    ratio: f32,
    (width, height): (u32, u32),
    confidence_threshold: f32,
    iou_threshold: f32,
    max_detections: usize,
) -> Result<Vec<RawDetection>> {
    const CXYWH_OFFSET: usize = 4;

    if preds.nrows() != CXYWH_OFFSET + num_classes {
        return Err(RecognitionError::Inference(format!(
            "Model output has {} rows but {} classes are known",
            preds.nrows(),
            num_classes
        )));
    }

    let (width, height) = (width as f32, height as f32);
    let mut detections = Vec::new();

    for pred in preds.axis_iter(Axis(1)) {
        let best = pred
            .iter()
            .skip(CXYWH_OFFSET)
            .copied()
            .enumerate()
            .reduce(|max, x| if x.1 > max.1 { x } else { max });

        let Some((class_id, confidence)) = best else {
            continue;
        };
        if confidence < confidence_threshold {
            continue;
        }

        let cx = pred[0] / ratio;
        let cy = pred[1] / ratio;
        let w = pred[2] / ratio;
        let h = pred[3] / ratio;
        let bbox = [
            (cx - w / 2.0).clamp(0.0, width),
            (cy - h / 2.0).clamp(0.0, height),
            (cx + w / 2.0).clamp(0.0, width),
            (cy + h / 2.0).clamp(0.0, height),
        ];

        detections.push(RawDetection::new(bbox, confidence, class_id));
    }

    non_max_suppression(&mut detections, iou_threshold);
    detections.truncate(max_detections);
    Ok(detections)
}

/// 按类别的非极大值抑制，结果按置信度降序
pub fn non_max_suppression(detections: &mut Vec<RawDetection>, iou_threshold: f32) {
    detections.sort_by(|a, b| b.confidence.total_cmp(&a.confidence));

    let mut current_index = 0;
    for index in 0..detections.len() {
        let mut drop = false;
        for prev_index in 0..current_index {
            let (prev, cur) = (&detections[prev_index], &detections[index]);
            if prev.class_id == cur.class_id && compute_iou(&prev.bbox, &cur.bbox) > iou_threshold {
                drop = true;
                break;
            }
        }
        if !drop {
            detections.swap(current_index, index);
            current_index += 1;
        }
    }
    detections.truncate(current_index);
}

pub fn compute_iou(a: &[f32; 4], b: &[f32; 4]) -> f32 {
    let x1 = a[0].max(b[0]);
    let y1 = a[1].max(b[1]);
    let x2 = a[2].min(b[2]);
    let y2 = a[3].min(b[3]);

    if x2 <= x1 || y2 <= y1 {
        return 0.0;
    }

    let intersection = (x2 - x1) * (y2 - y1);
    let area_a = (a[2] - a[0]) * (a[3] - a[1]);
    let area_b = (b[2] - b[0]) * (b[3] - b[1]);
    let union = area_a + area_b - intersection;

    if union <= 0.0 {
        return 0.0;
    }

    intersection / union
}
