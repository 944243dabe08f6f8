//! Snoring detector - ONNX Runtime session with mock fallback
//!
//! The classifier is loaded once at startup. When the model file is missing
//! or unloadable the detector switches to mock mode and keeps answering with
//! pseudo-random confidences, so detection requests never fail for lack of a
//! trained model.

use std::path::Path;

use ndarray::Array4;
use ort::session::{Session, builder::GraphOptimizationLevel};
use ort::value::Value;
use parking_lot::Mutex;
use rand::Rng;
use serde::Serialize;
use thiserror::Error;

use super::spectrogram;

/// Confidence above which a model prediction counts as snoring.
pub const SNORE_THRESHOLD: f32 = 0.5;

/// Mock confidences land around the decision boundary so both outcomes occur.
const MOCK_CONFIDENCE_MIN: f32 = 0.30;
const MOCK_CONFIDENCE_MAX: f32 = 0.95;
const MOCK_SNORE_THRESHOLD: f32 = 0.6;

/// Classification result for one audio clip
#[derive(Debug, Clone, Serialize)]
pub struct Prediction {
    pub snore_detected: bool,
    pub confidence: f32,
    /// "model" or "mock"
    pub method: &'static str,
}

#[derive(Debug, Error)]
pub enum DetectorError {
    #[error("invalid audio: {0}")]
    InvalidAudio(String),
    #[error("inference failed: {0}")]
    Inference(String),
}

/// Snoring classifier over 128x128 mel-spectrogram images
pub struct SnoringDetector {
    session: Mutex<Option<Session>>,
    model_path: String,
}

impl SnoringDetector {
    /// Load the model file, falling back to mock mode when it is missing
    pub fn load(model_path: &str) -> Self {
        let session = if Path::new(model_path).exists() {
            match build_session(model_path) {
                Ok(session) => {
                    tracing::info!("Model loaded successfully from {}", model_path);
                    Some(session)
                }
                Err(e) => {
                    tracing::error!("Failed to load model: {}", e);
                    tracing::warn!("Using mock predictions instead");
                    None
                }
            }
        } else {
            tracing::warn!("Model file not found at {}, using mock predictions", model_path);
            None
        };

        Self {
            session: Mutex::new(session),
            model_path: model_path.to_string(),
        }
    }

    /// True when no model is loaded and predictions are randomized
    pub fn is_mock(&self) -> bool {
        self.session.lock().is_none()
    }

    pub fn model_path(&self) -> &str {
        &self.model_path
    }

    /// Classify a WAV clip. Mock mode never touches the audio bytes.
    pub fn predict(&self, audio: &[u8]) -> Result<Prediction, DetectorError> {
        if self.is_mock() {
            return Ok(self.predict_mock());
        }

        let input = spectrogram::mel_image(audio)?;

        match self.run_model(input) {
            Ok(prediction) => Ok(prediction),
            Err(e) => {
                tracing::error!("Inference failed ({}), using mock prediction", e);
                Ok(self.predict_mock())
            }
        }
    }

    fn run_model(&self, input: Array4<f32>) -> Result<Prediction, DetectorError> {
        let mut session_guard = self.session.lock();
        let session = session_guard.as_mut()
            .ok_or_else(|| DetectorError::Inference("Model not loaded".to_string()))?;

        let output_name = session.outputs().first()
            .map(|o| o.name().to_string())
            .ok_or_else(|| DetectorError::Inference("Model has no output".to_string()))?;

        let input_tensor = Value::from_array(input)
            .map_err(|e| DetectorError::Inference(format!("Tensor error: {}", e)))?;

        let outputs = session.run(ort::inputs![input_tensor])
            .map_err(|e| DetectorError::Inference(format!("Run error: {}", e)))?;

        let output = outputs.get(&output_name)
            .ok_or_else(|| DetectorError::Inference("No output".to_string()))?;

        let output_tensor = output.try_extract_tensor::<f32>()
            .map_err(|e| DetectorError::Inference(format!("Extract error: {}", e)))?;

        // Binary classifier: one scalar probability per clip
        let confidence = output_tensor.1.first().copied()
            .ok_or_else(|| DetectorError::Inference("Empty output tensor".to_string()))?
            .clamp(0.0, 1.0);

        let prediction = Prediction {
            snore_detected: confidence > SNORE_THRESHOLD,
            confidence,
            method: "model",
        };

        tracing::info!(
            "Model prediction: snoring={}, confidence={:.2}",
            prediction.snore_detected, prediction.confidence
        );

        Ok(prediction)
    }

    fn predict_mock(&self) -> Prediction {
        let confidence = rand::thread_rng().gen_range(MOCK_CONFIDENCE_MIN..MOCK_CONFIDENCE_MAX);
        let prediction = Prediction {
            snore_detected: confidence > MOCK_SNORE_THRESHOLD,
            confidence,
            method: "mock",
        };

        tracing::debug!(
            "Mock prediction: snoring={}, confidence={:.2}",
            prediction.snore_detected, prediction.confidence
        );

        prediction
    }
}

fn build_session(model_path: &str) -> Result<Session, DetectorError> {
    Session::builder()
        .map_err(|e| DetectorError::Inference(format!("Session builder error: {}", e)))?
        .with_optimization_level(GraphOptimizationLevel::Level3)
        .map_err(|e| DetectorError::Inference(format!("Optimization error: {}", e)))?
        .commit_from_file(model_path)
        .map_err(|e| DetectorError::Inference(format!("Model load error: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mock_detector() -> SnoringDetector {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing.onnx");
        SnoringDetector::load(path.to_str().unwrap())
    }

    #[test]
    fn missing_model_enables_mock_mode() {
        let detector = mock_detector();
        assert!(detector.is_mock());
    }

    #[test]
    fn mock_predictions_stay_in_range() {
        let detector = mock_detector();
        for _ in 0..200 {
            let p = detector.predict(b"not real audio").unwrap();
            assert!((0.0..=1.0).contains(&p.confidence));
            assert!(p.confidence >= MOCK_CONFIDENCE_MIN && p.confidence < MOCK_CONFIDENCE_MAX);
            assert_eq!(p.method, "mock");
            assert_eq!(p.snore_detected, p.confidence > MOCK_SNORE_THRESHOLD);
        }
    }

    #[test]
    fn mock_mode_accepts_malformed_audio() {
        let detector = mock_detector();
        assert!(detector.predict(&[]).is_ok());
    }
}
