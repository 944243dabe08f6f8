//! Pump control handlers

use axum::extract::{Query, State};
use axum::Json;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{AppState, AppResult};
use crate::middleware::auth::CurrentUser;
use crate::models::{ActivationStatus, PumpLog};
use crate::pi::DEFAULT_PUMP_DURATION_SECS;

#[derive(Debug, Deserialize)]
pub struct TriggerRequest {
    pub duration: Option<f32>,
}

#[derive(Debug, Serialize)]
pub struct TriggerResponse {
    pub status: &'static str,
    pub message: &'static str,
    pub timestamp: DateTime<Utc>,
}

/// Manually trigger the air pump on the Raspberry Pi
pub async fn trigger(
    State(state): State<AppState>,
    user: CurrentUser,
    Json(req): Json<TriggerRequest>,
) -> AppResult<Json<TriggerResponse>> {
    let duration = req.duration.unwrap_or(DEFAULT_PUMP_DURATION_SECS);

    match state.pi.trigger_pump_sequence(duration).await {
        Ok(response) => {
            tracing::info!("Pi pump trigger response: {}", response);

            PumpLog::create(&state.pool, user.user_id, ActivationStatus::Success, None).await?;
            tracing::info!("Pump manually triggered by user {}", user.user_id);

            Ok(Json(TriggerResponse {
                status: "success",
                message: "Pump triggered successfully",
                timestamp: Utc::now(),
            }))
        }
        Err(e) => {
            // Failed activations are recorded too
            PumpLog::create(
                &state.pool,
                user.user_id,
                ActivationStatus::Failed,
                Some(&e.to_string()),
            ).await?;

            tracing::error!("Failed to trigger pump for user {}: {}", user.user_id, e);
            Err(e.into())
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct LogsQuery {
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

/// Get the current user's pump activation logs
pub async fn logs(
    State(state): State<AppState>,
    user: CurrentUser,
    Query(query): Query<LogsQuery>,
) -> AppResult<Json<Vec<PumpLog>>> {
    let logs = PumpLog::list_by_user(
        &state.pool,
        user.user_id,
        query.limit.unwrap_or(50),
        query.offset.unwrap_or(0),
    ).await?;

    Ok(Json(logs))
}

/// Get current pump status from the Raspberry Pi
pub async fn status(
    State(state): State<AppState>,
    _user: CurrentUser,
) -> AppResult<Json<serde_json::Value>> {
    let status = state.pi.pump_status().await?;
    Ok(Json(status))
}
