//! Capture frames from a camera, run pluggable gesture detectors on them and
//! fan the resulting gesture events out to listeners.

pub mod clock;
pub mod config;
pub mod detector;
pub mod error;
pub mod events;
pub mod fps;
pub mod gesture;
pub mod overlay;
pub mod recognizer;
pub mod source;
pub mod status;
pub mod types;
pub mod worker;

pub use config::{ReconnectPolicy, RecognizerConfig};
pub use detector::{BrightnessClassifier, ClassifierDetector, Detector, DetectorRegistry};
pub use error::{DeviceError, RecognizerError};
pub use events::{EventHub, GestureListener, ListenerId};
pub use gesture::{Classifier, Gesture, GestureBuilder};
pub use recognizer::Recognizer;
pub use source::{CaptureDevice, FrameSource, SyntheticDevice};
pub use status::{DisplayBuffer, DisplayFrame, WorkerStatus};
pub use types::{Frame, GestureEvent, GestureKind, Rect, Rgba};
pub use worker::{RecognitionWorker, WorkerState};
