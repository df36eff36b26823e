//! Practice session ledger. Rows are append-only; all derived statistics
//! must remain reproducible from this table.

use serde::{Deserialize, Serialize};
use sqlx::{FromRow, SqlitePool};

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct PracticeSession {
    pub id: i64,
    pub user_id: String,
    pub time_taken_ms: i64,
    pub speed: f64,
    pub accuracy: f64,
    pub created_at: String,
}

/// Raw per-day aggregate over the ledger, input to the daily rollup.
#[derive(Debug, Clone, FromRow)]
pub struct SessionDayAggregate {
    pub total_time_ms: i64,
    pub lessons_completed: i64,
    pub top_speed: f64,
    pub avg_speed: f64,
    pub top_accuracy: f64,
    pub avg_accuracy: f64,
}

impl PracticeSession {
    pub async fn record(
        db: &SqlitePool,
        user_id: &str,
        time_taken_ms: i64,
        speed: f64,
        accuracy: f64,
    ) -> Result<(), sqlx::Error> {
        sqlx::query(
            r#"
            INSERT INTO practice_sessions (user_id, time_taken_ms, speed, accuracy, created_at)
            VALUES (?, ?, ?, ?, ?)
            "#,
        )
        .bind(user_id)
        .bind(time_taken_ms)
        .bind(speed)
        .bind(accuracy)
        .bind(crate::utils::now_timestamp())
        .execute(db)
        .await?;
        Ok(())
    }

    /// Aggregate one user's sessions for a calendar date. Returns None when
    /// the day has no sessions.
    pub async fn aggregate_for_day(
        db: &SqlitePool,
        user_id: &str,
        date: &str,
    ) -> Result<Option<SessionDayAggregate>, sqlx::Error> {
        let agg: SessionDayAggregate = sqlx::query_as(
            r#"
            SELECT
                COALESCE(SUM(time_taken_ms), 0) AS total_time_ms,
                COUNT(*) AS lessons_completed,
                COALESCE(MAX(speed), 0.0) AS top_speed,
                COALESCE(AVG(speed), 0.0) AS avg_speed,
                COALESCE(MAX(accuracy), 0.0) AS top_accuracy,
                COALESCE(AVG(accuracy), 0.0) AS avg_accuracy
            FROM practice_sessions
            WHERE user_id = ? AND date(created_at) = ?
            "#,
        )
        .bind(user_id)
        .bind(date)
        .fetch_one(db)
        .await?;

        if agg.lessons_completed == 0 {
            Ok(None)
        } else {
            Ok(Some(agg))
        }
    }
}

#[cfg(test)]
pub(crate) async fn insert_at(
    db: &SqlitePool,
    user_id: &str,
    time_taken_ms: i64,
    speed: f64,
    accuracy: f64,
    created_at: &str,
) {
    sqlx::query(
        "INSERT INTO practice_sessions (user_id, time_taken_ms, speed, accuracy, created_at)
         VALUES (?, ?, ?, ?, ?)",
    )
    .bind(user_id)
    .bind(time_taken_ms)
    .bind(speed)
    .bind(accuracy)
    .bind(created_at)
    .execute(db)
    .await
    .expect("insert session");
}
