//! Speaking detection: per-stream voice activity with hysteresis, and the
//! aggregator that picks the active speaker.

mod aggregator;
mod analysis;
mod detector;
mod hysteresis;
mod types;

pub use aggregator::{BoardChange, SpeakerBoard, SpeakingAggregator};
pub use analysis::{normalize_level, rms, AudioAnalyser, AudioHost};
pub use detector::SpeakingDetector;
pub use hysteresis::{GateUpdate, SpeakingGate};
pub use types::{SpeakerEvent, SpeakingConfig, SpeakingState, SpeakingUpdate};
