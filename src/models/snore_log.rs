//! Snore detection log model

use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::{FromRow, PgPool, Row};
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct SnoreLog {
    pub id: Uuid,
    pub user_id: Uuid,
    pub recorded_at: DateTime<Utc>,
    pub snore_detected: bool,
    pub confidence: f32,
    pub audio_duration: Option<f32>,
}

/// Aggregated detection statistics for one user
#[derive(Debug, Serialize)]
pub struct SnoreStats {
    pub total_detections: i64,
    pub snoring_detected_count: i64,
    pub no_snoring_count: i64,
    pub average_confidence: f64,
    pub snoring_percentage: f64,
}

impl SnoreLog {
    pub async fn create(
        pool: &PgPool,
        user_id: Uuid,
        snore_detected: bool,
        confidence: f32,
        audio_duration: Option<f32>,
    ) -> Result<Self, sqlx::Error> {
        sqlx::query_as::<_, SnoreLog>(
            r#"
            INSERT INTO snore_logs (user_id, snore_detected, confidence, audio_duration)
            VALUES ($1, $2, $3, $4)
            RETURNING *
            "#
        )
        .bind(user_id)
        .bind(snore_detected)
        .bind(confidence)
        .bind(audio_duration)
        .fetch_one(pool)
        .await
    }

    pub async fn list_by_user(
        pool: &PgPool,
        user_id: Uuid,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<Self>, sqlx::Error> {
        sqlx::query_as::<_, SnoreLog>(
            r#"
            SELECT * FROM snore_logs
            WHERE user_id = $1
            ORDER BY recorded_at DESC
            LIMIT $2 OFFSET $3
            "#
        )
        .bind(user_id)
        .bind(limit)
        .bind(offset)
        .fetch_all(pool)
        .await
    }

    pub async fn stats(pool: &PgPool, user_id: Uuid) -> Result<SnoreStats, sqlx::Error> {
        let row = sqlx::query(
            r#"
            SELECT
                COUNT(*) AS total,
                COUNT(*) FILTER (WHERE snore_detected) AS snoring,
                AVG(confidence) FILTER (WHERE snore_detected) AS avg_confidence
            FROM snore_logs WHERE user_id = $1
            "#
        )
        .bind(user_id)
        .fetch_one(pool)
        .await?;

        let total: i64 = row.get("total");
        let snoring: i64 = row.get("snoring");
        let avg_confidence: Option<f64> = row.get("avg_confidence");

        let snoring_percentage = if total > 0 {
            round_to(snoring as f64 / total as f64 * 100.0, 1)
        } else {
            0.0
        };

        Ok(SnoreStats {
            total_detections: total,
            snoring_detected_count: snoring,
            no_snoring_count: total - snoring,
            average_confidence: round_to(avg_confidence.unwrap_or(0.0), 3),
            snoring_percentage,
        })
    }
}

fn round_to(value: f64, decimals: u32) -> f64 {
    let factor = 10f64.powi(decimals as i32);
    (value * factor).round() / factor
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rounding_matches_reported_precision() {
        assert_eq!(round_to(0.123_456, 3), 0.123);
        assert_eq!(round_to(66.666_666, 1), 66.7);
        assert_eq!(round_to(0.0, 3), 0.0);
    }
}
