pub mod detection;
pub mod joint;

pub use detection::{HandDetector, HandObservation, Handedness};
pub use joint::Joint;
