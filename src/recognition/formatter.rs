use crate::recognition::types::{
    DetectionResult, PredictResponse, Prediction, Selection, TrackResponse, TrackedPrediction,
};

/// 结果格式化器
pub struct ResultFormatter;

impl ResultFormatter {
    /// 千分位格式，如 `50,000 VND`
    pub fn format_vnd(value: u32) -> String {
        let digits = value.to_string();
        let mut out = String::with_capacity(digits.len() + digits.len() / 3 + 4);
        for (i, ch) in digits.chars().enumerate() {
            if i > 0 && (digits.len() - i) % 3 == 0 {
                out.push(',');
            }
            out.push(ch);
        }
        out.push_str(" VND");
        out
    }

    /// 百分比，保留一位小数
    pub fn format_percent(confidence: f32) -> String {
        format!("{:.1}%", confidence * 100.0)
    }

    pub fn round_to(value: f32, decimals: i32) -> f32 {
        let factor = 10f64.powi(decimals);
        ((value as f64 * factor).round() / factor) as f32
    }

    pub fn to_prediction(result: &DetectionResult) -> Prediction {
        Prediction {
            class_name: result.class_label.clone(),
            denomination: result.denomination,
            denomination_formatted: Self::format_vnd(result.denomination),
            confidence: result.confidence,
            confidence_percent: Self::format_percent(result.raw_confidence),
            bbox: result.bounding_box,
        }
    }

    pub fn predict_response(selection: Selection) -> PredictResponse {
        let predictions: Vec<Prediction> = selection.best.iter().map(Self::to_prediction).collect();
        let total_value = selection.best.as_ref().map_or(0, |best| best.denomination);

        PredictResponse {
            success: true,
            count: predictions.len(),
            predictions,
            total_value,
            total_value_formatted: Self::format_vnd(total_value),
            all_detections: selection.all_detections,
        }
    }

    pub fn track_response(selection: Selection) -> TrackResponse {
        let predictions: Vec<TrackedPrediction> = selection
            .best
            .iter()
            .map(|best| TrackedPrediction {
                track_id: best.track_id,
                prediction: Self::to_prediction(best),
            })
            .collect();

        TrackResponse {
            success: true,
            count: predictions.len(),
            predictions,
            all_detections: selection.all_detections,
        }
    }
}
