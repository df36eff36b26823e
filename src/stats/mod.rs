//! Statistics aggregator: rebuilds the daily and all-time rollups from the
//! practice-session ledger.
//!
//! Recomputation is total, not incremental: each pass re-aggregates every
//! source row for the affected scope and upserts the result, so running it
//! any number of times converges to the same rows. Normally it runs on the
//! background worker; callers fall back to running it inline when the
//! queue is unavailable.

use chrono::NaiveDate;
use sqlx::SqlitePool;
use tracing::debug;

use crate::db::{AllTimeStatistics, DailyStatistics, PracticeSession};

/// Rebuild the (user, date) daily rollup from that day's sessions.
/// A day with no sessions is a no-op. Session durations are recorded in
/// milliseconds and normalized to whole seconds here.
pub async fn update_daily_statistics(
    db: &SqlitePool,
    user_id: &str,
    date: &str,
) -> Result<(), sqlx::Error> {
    let Some(agg) = PracticeSession::aggregate_for_day(db, user_id, date).await? else {
        return Ok(());
    };

    DailyStatistics::upsert(
        db,
        user_id,
        date,
        agg.total_time_ms / 1000,
        agg.lessons_completed,
        agg.top_speed,
        agg.avg_speed,
        agg.top_accuracy,
        agg.avg_accuracy,
    )
    .await?;

    debug!(user_id = %user_id, date = %date, "Daily statistics recomputed");
    Ok(())
}

/// Rebuild the user's all-time rollup from their daily rows. No daily rows
/// is a no-op. The speed/accuracy averages are means of the per-day means,
/// weighting each day equally regardless of how many sessions it held.
pub async fn update_all_time_statistics(
    db: &SqlitePool,
    user_id: &str,
) -> Result<(), sqlx::Error> {
    let agg: (i64, i64, i64, f64, f64, f64, f64) = sqlx::query_as(
        r#"
        SELECT
            COUNT(*),
            COALESCE(SUM(total_time), 0),
            COALESCE(SUM(lessons_completed), 0),
            COALESCE(MAX(top_speed), 0.0),
            COALESCE(AVG(avg_speed), 0.0),
            COALESCE(MAX(top_accuracy), 0.0),
            COALESCE(AVG(avg_accuracy), 0.0)
        FROM daily_statistics
        WHERE user_id = ?
        "#,
    )
    .bind(user_id)
    .fetch_one(db)
    .await?;

    let (days, total_time, lessons, top_speed, avg_speed, top_accuracy, avg_accuracy) = agg;
    if days == 0 {
        return Ok(());
    }

    AllTimeStatistics::upsert(
        db,
        user_id,
        total_time,
        lessons,
        top_speed,
        avg_speed,
        top_accuracy,
        avg_accuracy,
    )
    .await?;

    debug!(user_id = %user_id, "All-time statistics recomputed");
    Ok(())
}

/// Both rollups, in dependency order. This is what the worker runs for a
/// `RecomputeStatistics` job.
pub async fn recompute_for_user(
    db: &SqlitePool,
    user_id: &str,
    date: &str,
) -> Result<(), sqlx::Error> {
    update_daily_statistics(db, user_id, date).await?;
    update_all_time_statistics(db, user_id).await
}

/// Count consecutive days with a daily row, walking backward from `today`.
/// A user with no row today has a streak of 0.
pub async fn current_streak(
    db: &SqlitePool,
    user_id: &str,
    today: NaiveDate,
) -> Result<i64, sqlx::Error> {
    let mut streak = 0;
    let mut day = today;

    while DailyStatistics::exists(db, user_id, &day.format("%Y-%m-%d").to_string()).await? {
        streak += 1;
        match day.pred_opt() {
            Some(prev) => day = prev,
            None => break,
        }
    }

    Ok(streak)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{insert_at, test_pool, User};

    async fn make_user(db: &SqlitePool, tag: &str) -> String {
        User::create(db, &format!("{tag}@example.com"), tag, "hash")
            .await
            .unwrap()
            .id
    }

    #[tokio::test]
    async fn test_daily_recompute_normalizes_ms_to_seconds() {
        let db = test_pool().await;
        let user = make_user(&db, "norm").await;

        insert_at(&db, &user, 90_500, 50.0, 95.0, "2025-03-01 10:00:00").await;
        insert_at(&db, &user, 30_999, 70.0, 85.0, "2025-03-01 11:00:00").await;

        update_daily_statistics(&db, &user, "2025-03-01").await.unwrap();

        let row = DailyStatistics::get(&db, &user, "2025-03-01")
            .await
            .unwrap()
            .expect("row");
        // 121_499 ms truncates to 121 s.
        assert_eq!(row.total_time, 121);
        assert_eq!(row.lessons_completed, 2);
        assert_eq!(row.top_speed, 70.0);
        assert_eq!(row.avg_speed, 60.0);
        assert_eq!(row.top_accuracy, 95.0);
        assert_eq!(row.avg_accuracy, 90.0);
    }

    #[tokio::test]
    async fn test_daily_recompute_is_idempotent() {
        let db = test_pool().await;
        let user = make_user(&db, "idem").await;

        insert_at(&db, &user, 60_000, 45.0, 92.0, "2025-03-02 09:00:00").await;

        update_daily_statistics(&db, &user, "2025-03-02").await.unwrap();
        let first = DailyStatistics::get(&db, &user, "2025-03-02").await.unwrap().unwrap();

        update_daily_statistics(&db, &user, "2025-03-02").await.unwrap();
        let second = DailyStatistics::get(&db, &user, "2025-03-02").await.unwrap().unwrap();

        assert_eq!(first.total_time, second.total_time);
        assert_eq!(first.lessons_completed, second.lessons_completed);
        assert_eq!(first.top_speed, second.top_speed);
        assert_eq!(first.avg_speed, second.avg_speed);
        assert_eq!(DailyStatistics::count_for_user(&db, &user).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_daily_recompute_without_sessions_is_noop() {
        let db = test_pool().await;
        let user = make_user(&db, "empty").await;

        update_daily_statistics(&db, &user, "2025-03-03").await.unwrap();
        assert!(DailyStatistics::get(&db, &user, "2025-03-03").await.unwrap().is_none());

        update_all_time_statistics(&db, &user).await.unwrap();
        assert!(AllTimeStatistics::get(&db, &user).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_all_time_totals_equal_sum_of_daily_rows() {
        let db = test_pool().await;
        let user = make_user(&db, "sum").await;

        insert_at(&db, &user, 120_000, 40.0, 90.0, "2025-03-01 08:00:00").await;
        insert_at(&db, &user, 60_000, 60.0, 96.0, "2025-03-01 20:00:00").await;
        insert_at(&db, &user, 180_000, 80.0, 99.0, "2025-03-02 08:00:00").await;

        update_daily_statistics(&db, &user, "2025-03-01").await.unwrap();
        update_daily_statistics(&db, &user, "2025-03-02").await.unwrap();
        update_all_time_statistics(&db, &user).await.unwrap();

        let all = AllTimeStatistics::get(&db, &user).await.unwrap().expect("row");
        let daily_sum: (i64, i64) = sqlx::query_as(
            "SELECT COALESCE(SUM(total_time), 0), COALESCE(SUM(lessons_completed), 0)
             FROM daily_statistics WHERE user_id = ?",
        )
        .bind(&user)
        .fetch_one(&db)
        .await
        .unwrap();

        assert_eq!(all.total_time_spent, daily_sum.0);
        assert_eq!(all.total_lessons_completed, daily_sum.1);
        assert_eq!(all.top_speed, 80.0);
        // Mean of per-day means: (50 + 80) / 2, not a session-weighted mean.
        assert_eq!(all.avg_speed, 65.0);
        assert_eq!(all.top_accuracy, 99.0);
    }

    #[tokio::test]
    async fn test_streak_counts_consecutive_days_back_from_today() {
        let db = test_pool().await;
        let user = make_user(&db, "streak").await;

        let today = NaiveDate::from_ymd_opt(2025, 3, 10).unwrap();
        // D, D-1, D-2 present; D-3 missing; D-4 present but unreachable.
        for date in ["2025-03-10", "2025-03-09", "2025-03-08", "2025-03-06"] {
            DailyStatistics::upsert(&db, &user, date, 60, 1, 50.0, 50.0, 90.0, 90.0)
                .await
                .unwrap();
        }

        assert_eq!(current_streak(&db, &user, today).await.unwrap(), 3);
    }

    #[tokio::test]
    async fn test_streak_is_zero_without_activity_today() {
        let db = test_pool().await;
        let user = make_user(&db, "gap").await;

        let today = NaiveDate::from_ymd_opt(2025, 3, 10).unwrap();
        DailyStatistics::upsert(&db, &user, "2025-03-09", 60, 1, 50.0, 50.0, 90.0, 90.0)
            .await
            .unwrap();

        assert_eq!(current_streak(&db, &user, today).await.unwrap(), 0);
    }
}
