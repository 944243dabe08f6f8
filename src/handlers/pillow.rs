//! Pillow height handlers

use axum::extract::State;
use axum::Json;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{AppState, AppError, AppResult};
use crate::middleware::auth::CurrentUser;

/// Pillow height presets understood by the Raspberry Pi controller
#[derive(Debug, Clone, Serialize)]
pub struct PillowLevel {
    pub level: u8,
    pub name: &'static str,
    pub description: &'static str,
    /// Which pump the controller drives (1 inflates, 2 deflates)
    pub pump: u8,
    /// Pump runtime in seconds
    pub duration: u32,
}

pub const PILLOW_LEVELS: [PillowLevel; 4] = [
    PillowLevel { level: 0, name: "Flat", description: "Deflate completely", pump: 2, duration: 30 },
    PillowLevel { level: 1, name: "Low", description: "Low elevation", pump: 1, duration: 25 },
    PillowLevel { level: 2, name: "Medium", description: "Medium elevation", pump: 1, duration: 40 },
    PillowLevel { level: 3, name: "High", description: "High elevation", pump: 1, duration: 60 },
];

fn level_info(level: u8) -> Option<&'static PillowLevel> {
    PILLOW_LEVELS.iter().find(|l| l.level == level)
}

#[derive(Debug, Deserialize)]
pub struct SetLevelRequest {
    pub level: i32,
}

#[derive(Debug, Serialize)]
pub struct SetLevelResponse {
    pub status: &'static str,
    pub message: Option<String>,
    pub level: u8,
    pub description: &'static str,
    pub duration: u32,
    pub timestamp: DateTime<Utc>,
}

/// Set pillow level (0-3)
pub async fn set_level(
    State(state): State<AppState>,
    user: CurrentUser,
    Json(req): Json<SetLevelRequest>,
) -> AppResult<Json<SetLevelResponse>> {
    let info = u8::try_from(req.level)
        .ok()
        .and_then(level_info)
        .ok_or_else(|| AppError::ValidationError("Invalid level. Must be 0, 1, 2, or 3".to_string()))?;

    let response = state.pi.set_pillow_level(info.level).await?;

    tracing::info!("Pillow level set to {} by user {}", info.level, user.user_id);

    Ok(Json(SetLevelResponse {
        status: "success",
        message: response.get("message").and_then(|m| m.as_str()).map(str::to_string),
        level: info.level,
        description: info.description,
        duration: info.duration,
        timestamp: Utc::now(),
    }))
}

#[derive(Debug, Serialize)]
pub struct LevelsResponse {
    pub status: &'static str,
    pub levels: &'static [PillowLevel],
}

/// Get available pillow levels and their descriptions
pub async fn levels(_user: CurrentUser) -> Json<LevelsResponse> {
    Json(LevelsResponse {
        status: "success",
        levels: &PILLOW_LEVELS,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_levels_0_through_3_exist() {
        for level in 0..=3u8 {
            assert!(level_info(level).is_some());
        }
        assert!(level_info(4).is_none());
    }

    #[test]
    fn flat_deflates_everything_else_inflates() {
        assert_eq!(level_info(0).unwrap().pump, 2);
        for level in 1..=3u8 {
            assert_eq!(level_info(level).unwrap().pump, 1);
        }
    }

    #[test]
    fn durations_match_controller_presets() {
        let durations: Vec<u32> = PILLOW_LEVELS.iter().map(|l| l.duration).collect();
        assert_eq!(durations, vec![30, 25, 40, 60]);
    }
}
