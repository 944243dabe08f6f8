//! Snoring detection - audio preprocessing and model inference

pub mod detector;
pub mod spectrogram;

pub use detector::{DetectorError, Prediction, SnoringDetector};
