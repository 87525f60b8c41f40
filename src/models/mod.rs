pub mod classes;
pub mod detector;
pub mod manager;
pub mod tracker;

pub use classes::ClassNames;
pub use detector::{ObjectDetector, RawDetection, YoloDetector};
pub use manager::{LoadedModels, ModelManager, ModelState};
pub use tracker::{ByteTracker, ObjectTracker};
