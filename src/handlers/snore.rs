//! Snoring detection handlers

use axum::extract::{Multipart, Query, State};
use axum::Json;
use serde::{Deserialize, Serialize};

use crate::{AppState, AppError, AppResult};
use crate::middleware::auth::CurrentUser;
use crate::ml::Prediction;
use crate::models::{SnoreLog, SnoreStats};
use crate::pi::DEFAULT_PUMP_DURATION_SECS;

/// Confidence required before the pump fires automatically
const PUMP_TRIGGER_CONFIDENCE: f32 = 0.75;

#[derive(Debug, Serialize)]
pub struct DetectionResponse {
    pub snore_detected: bool,
    pub confidence: f32,
    pub message: String,
    pub pump_triggered: bool,
}

/// Detect snoring from an uploaded audio clip and fire the pump when the
/// classifier is confident enough
pub async fn detect(
    State(state): State<AppState>,
    user: CurrentUser,
    mut multipart: Multipart,
) -> AppResult<Json<DetectionResponse>> {
    let audio_data = read_audio_field(&mut multipart).await?;

    // Rough estimate; mock mode never decodes the clip
    let audio_duration = audio_data.len() as f32 / (44_100.0 * 2.0);

    let prediction = state.detector.predict(&audio_data)?;

    SnoreLog::create(
        &state.pool,
        user.user_id,
        prediction.snore_detected,
        prediction.confidence,
        Some(audio_duration),
    ).await?;

    let mut pump_triggered = false;
    if prediction.snore_detected && prediction.confidence >= PUMP_TRIGGER_CONFIDENCE {
        match state.pi.trigger_pump_sequence(DEFAULT_PUMP_DURATION_SECS).await {
            Ok(_) => {
                pump_triggered = true;
                tracing::info!("Pump triggered for user {}", user.user_id);
            }
            // Detection results are still useful when the pump is offline
            Err(e) => tracing::error!("Failed to trigger pump: {}", e),
        }
    }

    let message = detection_message(&prediction, pump_triggered);

    Ok(Json(DetectionResponse {
        snore_detected: prediction.snore_detected,
        confidence: prediction.confidence,
        message,
        pump_triggered,
    }))
}

/// Pull the `audio` file out of the multipart body
async fn read_audio_field(multipart: &mut Multipart) -> Result<Vec<u8>, AppError> {
    while let Some(field) = multipart.next_field().await
        .map_err(|e| AppError::ValidationError(format!("Invalid multipart body: {}", e)))?
    {
        if field.name() != Some("audio") {
            continue;
        }

        let content_type = field.content_type().unwrap_or_default().to_string();
        if !content_type.starts_with("audio/") {
            return Err(AppError::ValidationError(
                "Invalid file type. Please upload an audio file.".to_string(),
            ));
        }

        let bytes = field.bytes().await
            .map_err(|e| AppError::ValidationError(format!("Failed to read audio field: {}", e)))?;
        return Ok(bytes.to_vec());
    }

    Err(AppError::ValidationError("Missing 'audio' file field".to_string()))
}

fn detection_message(prediction: &Prediction, pump_triggered: bool) -> String {
    if prediction.snore_detected {
        let mut message = format!(
            "Snoring detected with {:.1}% confidence",
            prediction.confidence * 100.0
        );
        if pump_triggered {
            message.push_str(". Pump activated.");
        }
        message
    } else {
        "No snoring detected".to_string()
    }
}

#[derive(Debug, Deserialize)]
pub struct LogsQuery {
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

/// Get the current user's snoring detection logs
pub async fn logs(
    State(state): State<AppState>,
    user: CurrentUser,
    Query(query): Query<LogsQuery>,
) -> AppResult<Json<Vec<SnoreLog>>> {
    let logs = SnoreLog::list_by_user(
        &state.pool,
        user.user_id,
        query.limit.unwrap_or(50),
        query.offset.unwrap_or(0),
    ).await?;

    Ok(Json(logs))
}

/// Get the current user's snoring statistics
pub async fn stats(
    State(state): State<AppState>,
    user: CurrentUser,
) -> AppResult<Json<SnoreStats>> {
    let stats = SnoreLog::stats(&state.pool, user.user_id).await?;
    Ok(Json(stats))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detection_messages_report_confidence() {
        let snoring = Prediction {
            snore_detected: true,
            confidence: 0.875,
            method: "model",
        };
        assert_eq!(
            detection_message(&snoring, false),
            "Snoring detected with 87.5% confidence"
        );
        assert_eq!(
            detection_message(&snoring, true),
            "Snoring detected with 87.5% confidence. Pump activated."
        );

        let quiet = Prediction {
            snore_detected: false,
            confidence: 0.2,
            method: "model",
        };
        assert_eq!(detection_message(&quiet, false), "No snoring detected");
    }
}
