//! Pump activation log model

use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct PumpLog {
    pub id: Uuid,
    pub activated_by: Uuid,
    pub triggered_at: DateTime<Utc>,
    pub status: String,
    pub error_message: Option<String>,
}

/// Outcome of a pump activation
#[derive(Debug, Clone, Copy)]
pub enum ActivationStatus {
    Success,
    Failed,
}

impl ActivationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Success => "success",
            Self::Failed => "failed",
        }
    }
}

impl PumpLog {
    pub async fn create(
        pool: &PgPool,
        activated_by: Uuid,
        status: ActivationStatus,
        error_message: Option<&str>,
    ) -> Result<Self, sqlx::Error> {
        sqlx::query_as::<_, PumpLog>(
            r#"
            INSERT INTO pump_logs (activated_by, status, error_message)
            VALUES ($1, $2, $3)
            RETURNING *
            "#
        )
        .bind(activated_by)
        .bind(status.as_str())
        .bind(error_message)
        .fetch_one(pool)
        .await
    }

    pub async fn list_by_user(
        pool: &PgPool,
        user_id: Uuid,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<Self>, sqlx::Error> {
        sqlx::query_as::<_, PumpLog>(
            r#"
            SELECT * FROM pump_logs
            WHERE activated_by = $1
            ORDER BY triggered_at DESC
            LIMIT $2 OFFSET $3
            "#
        )
        .bind(user_id)
        .bind(limit)
        .bind(offset)
        .fetch_all(pool)
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_strings_match_schema_values() {
        assert_eq!(ActivationStatus::Success.as_str(), "success");
        assert_eq!(ActivationStatus::Failed.as_str(), "failed");
    }
}
