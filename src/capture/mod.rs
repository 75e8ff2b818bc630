pub mod frame;
pub mod labels;
pub mod pipeline;
pub mod recognizer;
pub mod window;

pub use frame::{HandDetection, Landmark, LandmarkFrame, FRAME_LEN};
pub use labels::LabelSet;
pub use pipeline::{CapturePipeline, CaptureState, InferenceOutcome, InferenceRequest};
pub use recognizer::{HttpRecognizer, Prediction, Recognizer};
pub use window::{CaptureWindow, WINDOW_LEN};
