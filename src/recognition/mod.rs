pub mod denomination;
pub mod formatter;
pub mod pipeline;
pub mod types;

pub use denomination::{resolve_denomination, DENOMINATION_TABLE};
pub use formatter::ResultFormatter;
pub use pipeline::RecognitionPipeline;
pub use types::{
    BoundingBox, DetectionResult, PredictResponse, Prediction, ResetResponse, Selection,
    TrackResponse, TrackedPrediction,
};
