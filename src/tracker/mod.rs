pub mod manager;
pub mod track;
pub mod worker;

pub use manager::TrackManager;
pub use track::{compatibility_score, mean, std_dev, HandTrack};
pub use worker::DetectionWorker;
