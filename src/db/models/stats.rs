//! Derived statistics rollups.
//!
//! `daily_statistics` and `all_time_statistics` are denormalized read
//! models; the practice-session ledger stays authoritative and both tables
//! are recomputed in full by `crate::stats`.

use serde::{Deserialize, Serialize};
use sqlx::{FromRow, SqlitePool};
use std::str::FromStr;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct DailyStatistics {
    #[serde(skip_serializing)]
    pub id: i64,
    #[serde(skip_serializing)]
    pub user_id: String,
    pub date: String,
    pub total_time: i64,
    pub lessons_completed: i64,
    pub top_speed: f64,
    pub avg_speed: f64,
    pub top_accuracy: f64,
    pub avg_accuracy: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct AllTimeStatistics {
    #[serde(skip_serializing)]
    pub user_id: String,
    pub total_time_spent: i64,
    pub total_lessons_completed: i64,
    pub top_speed: f64,
    pub avg_speed: f64,
    pub top_accuracy: f64,
    pub avg_accuracy: f64,
    #[serde(skip_serializing)]
    pub updated_at: String,
}

/// Closed set of leaderboard sort keys. Anything else is a 400 at the
/// boundary; the key never reaches SQL as a string.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LeaderboardSort {
    TopSpeed,
    AvgSpeed,
}

impl FromStr for LeaderboardSort {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "top_speed" => Ok(Self::TopSpeed),
            "avg_speed" => Ok(Self::AvgSpeed),
            _ => Err(()),
        }
    }
}

impl LeaderboardSort {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::TopSpeed => "top_speed",
            Self::AvgSpeed => "avg_speed",
        }
    }
}

/// One leaderboard row, joined to the display name.
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct LeaderboardEntry {
    pub username: String,
    pub wpm: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct RankInfo {
    pub world_rank: i64,
    pub rank_percentile: f64,
}

impl DailyStatistics {
    pub async fn get(
        db: &SqlitePool,
        user_id: &str,
        date: &str,
    ) -> Result<Option<DailyStatistics>, sqlx::Error> {
        sqlx::query_as("SELECT * FROM daily_statistics WHERE user_id = ? AND date = ?")
            .bind(user_id)
            .bind(date)
            .fetch_optional(db)
            .await
    }

    pub async fn exists(
        db: &SqlitePool,
        user_id: &str,
        date: &str,
    ) -> Result<bool, sqlx::Error> {
        let count: (i64,) =
            sqlx::query_as("SELECT COUNT(*) FROM daily_statistics WHERE user_id = ? AND date = ?")
                .bind(user_id)
                .bind(date)
                .fetch_one(db)
                .await?;
        Ok(count.0 > 0)
    }

    pub async fn count_for_user(db: &SqlitePool, user_id: &str) -> Result<i64, sqlx::Error> {
        let count: (i64,) =
            sqlx::query_as("SELECT COUNT(*) FROM daily_statistics WHERE user_id = ?")
                .bind(user_id)
                .fetch_one(db)
                .await?;
        Ok(count.0)
    }

    /// Most-recent-first history, used by the graph endpoint.
    pub async fn history(
        db: &SqlitePool,
        user_id: &str,
    ) -> Result<Vec<DailyStatistics>, sqlx::Error> {
        sqlx::query_as("SELECT * FROM daily_statistics WHERE user_id = ? ORDER BY date DESC")
            .bind(user_id)
            .fetch_all(db)
            .await
    }

    /// Write the day's rollup. Concurrent writers for the same (user, date)
    /// are serialized by the unique constraint.
    #[allow(clippy::too_many_arguments)]
    pub async fn upsert(
        db: &SqlitePool,
        user_id: &str,
        date: &str,
        total_time: i64,
        lessons_completed: i64,
        top_speed: f64,
        avg_speed: f64,
        top_accuracy: f64,
        avg_accuracy: f64,
    ) -> Result<(), sqlx::Error> {
        sqlx::query(
            r#"
            INSERT INTO daily_statistics
                (user_id, date, total_time, lessons_completed, top_speed, avg_speed, top_accuracy, avg_accuracy)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(user_id, date) DO UPDATE SET
                total_time = excluded.total_time,
                lessons_completed = excluded.lessons_completed,
                top_speed = excluded.top_speed,
                avg_speed = excluded.avg_speed,
                top_accuracy = excluded.top_accuracy,
                avg_accuracy = excluded.avg_accuracy
            "#,
        )
        .bind(user_id)
        .bind(date)
        .bind(total_time)
        .bind(lessons_completed)
        .bind(top_speed)
        .bind(avg_speed)
        .bind(top_accuracy)
        .bind(avg_accuracy)
        .execute(db)
        .await?;
        Ok(())
    }
}

impl AllTimeStatistics {
    pub async fn get(
        db: &SqlitePool,
        user_id: &str,
    ) -> Result<Option<AllTimeStatistics>, sqlx::Error> {
        sqlx::query_as("SELECT * FROM all_time_statistics WHERE user_id = ?")
            .bind(user_id)
            .fetch_optional(db)
            .await
    }

    #[allow(clippy::too_many_arguments)]
    pub async fn upsert(
        db: &SqlitePool,
        user_id: &str,
        total_time_spent: i64,
        total_lessons_completed: i64,
        top_speed: f64,
        avg_speed: f64,
        top_accuracy: f64,
        avg_accuracy: f64,
    ) -> Result<(), sqlx::Error> {
        sqlx::query(
            r#"
            INSERT INTO all_time_statistics
                (user_id, total_time_spent, total_lessons_completed, top_speed, avg_speed, top_accuracy, avg_accuracy, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(user_id) DO UPDATE SET
                total_time_spent = excluded.total_time_spent,
                total_lessons_completed = excluded.total_lessons_completed,
                top_speed = excluded.top_speed,
                avg_speed = excluded.avg_speed,
                top_accuracy = excluded.top_accuracy,
                avg_accuracy = excluded.avg_accuracy,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(user_id)
        .bind(total_time_spent)
        .bind(total_lessons_completed)
        .bind(top_speed)
        .bind(avg_speed)
        .bind(top_accuracy)
        .bind(avg_accuracy)
        .bind(crate::utils::now_timestamp())
        .execute(db)
        .await?;
        Ok(())
    }

    /// Top 10 by the chosen key, zero-valued rows excluded.
    pub async fn leaderboard(
        db: &SqlitePool,
        sort: LeaderboardSort,
    ) -> Result<Vec<LeaderboardEntry>, sqlx::Error> {
        let sql = match sort {
            LeaderboardSort::TopSpeed => {
                r#"
                SELECT u.username AS username, a.top_speed AS wpm
                FROM all_time_statistics a
                JOIN users u ON u.id = a.user_id
                WHERE a.top_speed > 0
                ORDER BY a.top_speed DESC
                LIMIT 10
                "#
            }
            LeaderboardSort::AvgSpeed => {
                r#"
                SELECT u.username AS username, a.avg_speed AS wpm
                FROM all_time_statistics a
                JOIN users u ON u.id = a.user_id
                WHERE a.avg_speed > 0
                ORDER BY a.avg_speed DESC
                LIMIT 10
                "#
            }
        };
        sqlx::query_as(sql).fetch_all(db).await
    }

    /// World rank among users with a positive top speed. Position is one
    /// plus the number of strictly faster users, so ties share the best
    /// position. Returns None when the user has no qualifying row.
    pub async fn world_rank(
        db: &SqlitePool,
        user_id: &str,
    ) -> Result<Option<RankInfo>, sqlx::Error> {
        let mine: Option<(f64,)> = sqlx::query_as(
            "SELECT top_speed FROM all_time_statistics WHERE user_id = ? AND top_speed > 0",
        )
        .bind(user_id)
        .fetch_optional(db)
        .await?;

        let Some((top_speed,)) = mine else {
            return Ok(None);
        };

        let total: (i64,) =
            sqlx::query_as("SELECT COUNT(*) FROM all_time_statistics WHERE top_speed > 0")
                .fetch_one(db)
                .await?;
        let faster: (i64,) =
            sqlx::query_as("SELECT COUNT(*) FROM all_time_statistics WHERE top_speed > ?")
                .bind(top_speed)
                .fetch_one(db)
                .await?;

        let position = faster.0 + 1;
        let percentile = (total.0 - position) as f64 / total.0 as f64 * 100.0;
        let percentile = (percentile * 100.0).round() / 100.0;

        Ok(Some(RankInfo {
            world_rank: position,
            rank_percentile: percentile,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{test_pool, User};

    async fn seed_all_time(db: &SqlitePool, email: &str, name: &str, top: f64, avg: f64) -> String {
        let user = User::create(db, email, name, "hash").await.unwrap();
        AllTimeStatistics::upsert(db, &user.id, 0, 0, top, avg, 0.0, 0.0)
            .await
            .unwrap();
        user.id
    }

    #[test]
    fn test_sort_key_parsing_is_closed() {
        assert_eq!("top_speed".parse::<LeaderboardSort>(), Ok(LeaderboardSort::TopSpeed));
        assert_eq!("avg_speed".parse::<LeaderboardSort>(), Ok(LeaderboardSort::AvgSpeed));
        assert!("total_time_spent".parse::<LeaderboardSort>().is_err());
        assert!("top_speed; DROP TABLE users".parse::<LeaderboardSort>().is_err());
        assert!("".parse::<LeaderboardSort>().is_err());
    }

    #[tokio::test]
    async fn test_daily_upsert_replaces_existing_row() {
        let db = test_pool().await;
        let user = User::create(&db, "d@example.com", "daily", "hash").await.unwrap();

        DailyStatistics::upsert(&db, &user.id, "2025-02-01", 60, 1, 40.0, 40.0, 90.0, 90.0)
            .await
            .unwrap();
        DailyStatistics::upsert(&db, &user.id, "2025-02-01", 120, 2, 55.0, 47.5, 95.0, 92.5)
            .await
            .unwrap();

        let row = DailyStatistics::get(&db, &user.id, "2025-02-01")
            .await
            .unwrap()
            .expect("row");
        assert_eq!(row.total_time, 120);
        assert_eq!(row.lessons_completed, 2);
        assert_eq!(row.top_speed, 55.0);

        assert_eq!(DailyStatistics::count_for_user(&db, &user.id).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_leaderboard_orders_by_selected_key() {
        let db = test_pool().await;
        seed_all_time(&db, "a@example.com", "slow-burst", 120.0, 40.0).await;
        seed_all_time(&db, "b@example.com", "steady", 80.0, 75.0).await;
        seed_all_time(&db, "c@example.com", "idle", 0.0, 0.0).await;

        let by_top = AllTimeStatistics::leaderboard(&db, LeaderboardSort::TopSpeed)
            .await
            .unwrap();
        assert_eq!(by_top.len(), 2);
        assert_eq!(by_top[0].username, "slow-burst");
        assert_eq!(by_top[0].wpm, 120.0);

        let by_avg = AllTimeStatistics::leaderboard(&db, LeaderboardSort::AvgSpeed)
            .await
            .unwrap();
        assert_eq!(by_avg[0].username, "steady");
        assert_eq!(by_avg[0].wpm, 75.0);
    }

    #[tokio::test]
    async fn test_world_rank_and_percentile() {
        let db = test_pool().await;
        seed_all_time(&db, "a@example.com", "first", 120.0, 100.0).await;
        let mid = seed_all_time(&db, "b@example.com", "second", 90.0, 80.0).await;
        seed_all_time(&db, "c@example.com", "third", 60.0, 50.0).await;
        seed_all_time(&db, "d@example.com", "fourth", 30.0, 20.0).await;

        let rank = AllTimeStatistics::world_rank(&db, &mid).await.unwrap().expect("rank");
        assert_eq!(rank.world_rank, 2);
        // (4 - 2) / 4 * 100
        assert_eq!(rank.rank_percentile, 50.0);
    }

    #[tokio::test]
    async fn test_world_rank_requires_positive_top_speed() {
        let db = test_pool().await;
        let idle = seed_all_time(&db, "z@example.com", "idle", 0.0, 0.0).await;
        let none = AllTimeStatistics::world_rank(&db, &idle).await.unwrap();
        assert!(none.is_none());

        let unknown = AllTimeStatistics::world_rank(&db, "no-such-user").await.unwrap();
        assert!(unknown.is_none());
    }
}
