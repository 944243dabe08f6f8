//! HTTP client for the Raspberry Pi pump controller API

use std::time::Duration;

use serde_json::{json, Value};
use thiserror::Error;

/// Seconds the pump runs for a plain trigger
pub const DEFAULT_PUMP_DURATION_SECS: f32 = 3.0;

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);
/// Inflate 50 s + deflate 30 s, plus headroom
const SEQUENCE_TIMEOUT: Duration = Duration::from_secs(120);
/// The longest pillow move runs 60 s
const PILLOW_TIMEOUT: Duration = Duration::from_secs(90);

/// Pi controller errors
#[derive(Debug, Error)]
pub enum PiError {
    #[error("network error: {0}")]
    Network(String),
    #[error("controller returned status {0}")]
    Status(u16),
    #[error("parse error: {0}")]
    Parse(String),
}

/// Client for the pump controller running on the Raspberry Pi
pub struct PiClient {
    base_url: String,
    api_key: String,
    http: reqwest::Client,
}

impl PiClient {
    pub fn new(base_url: String, api_key: String) -> Self {
        let http = reqwest::Client::builder()
            .timeout(DEFAULT_TIMEOUT)
            .build()
            .expect("Failed to create HTTP client");

        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
            http,
        }
    }

    /// Current pump state as reported by the controller
    pub async fn pump_status(&self) -> Result<Value, PiError> {
        let url = format!("{}/pump/status", self.base_url);

        let response = self.http
            .get(&url)
            .bearer_auth(&self.api_key)
            .send()
            .await
            .map_err(|e| PiError::Network(e.to_string()))?;

        parse_response(response).await
    }

    /// Run the pump for `duration` seconds
    pub async fn trigger_pump_sequence(&self, duration: f32) -> Result<Value, PiError> {
        self.post("/pump/trigger", Some(json!({ "duration": duration })), None).await
    }

    /// Full anti-snoring cycle: inflate 50 s, deflate 30 s
    pub async fn trigger_full_sequence(&self) -> Result<Value, PiError> {
        self.post("/pump/sequence", None, Some(SEQUENCE_TIMEOUT)).await
    }

    /// Move the pillow to one of the preset levels (0-3)
    pub async fn set_pillow_level(&self, level: u8) -> Result<Value, PiError> {
        self.post("/pillow/level", Some(json!({ "level": level })), Some(PILLOW_TIMEOUT)).await
    }

    async fn post(
        &self,
        path: &str,
        body: Option<Value>,
        timeout: Option<Duration>,
    ) -> Result<Value, PiError> {
        let url = format!("{}{}", self.base_url, path);

        let mut request = self.http.post(&url).bearer_auth(&self.api_key);
        if let Some(body) = body {
            request = request.json(&body);
        }
        if let Some(timeout) = timeout {
            request = request.timeout(timeout);
        }

        let response = request.send().await.map_err(|e| PiError::Network(e.to_string()))?;
        parse_response(response).await
    }
}

async fn parse_response(response: reqwest::Response) -> Result<Value, PiError> {
    if response.status().is_success() {
        response.json().await.map_err(|e| PiError::Parse(e.to_string()))
    } else {
        Err(PiError::Status(response.status().as_u16()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn trailing_slash_is_trimmed() {
        let client = PiClient::new("http://raspberrypi.local:5000/".to_string(), "key".to_string());
        assert_eq!(client.base_url, "http://raspberrypi.local:5000");
    }

    #[test]
    fn errors_are_descriptive() {
        assert_eq!(PiError::Status(503).to_string(), "controller returned status 503");
        assert_eq!(
            PiError::Network("timed out".to_string()).to_string(),
            "network error: timed out"
        );
    }
}
