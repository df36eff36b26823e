//! Multiplayer rooms and their participants.

use rand::Rng;
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, SqlitePool};

/// Room codes are 8 uppercase alphanumerics; uniqueness is enforced by the
/// `rooms.code` constraint, not by a pre-check.
pub const ROOM_CODE_LENGTH: usize = 8;
const ROOM_CODE_ALPHABET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";
const ROOM_CODE_MAX_ATTEMPTS: usize = 16;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Room {
    pub id: String,
    pub code: String,
    pub host_id: String,
    pub text: String,
    pub is_active: bool,
    pub created_at: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Participant {
    pub id: i64,
    pub room_id: String,
    pub user_id: String,
    pub wpm: Option<f64>,
    pub accuracy: Option<f64>,
    pub finished_at: Option<String>,
}

/// One row of a room's leaderboard; only finished participants appear.
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct RoomLeaderboardEntry {
    pub username: String,
    pub wpm: f64,
    pub accuracy: Option<f64>,
    pub finished_at: Option<String>,
}

pub fn generate_room_code() -> String {
    let mut rng = rand::rng();
    (0..ROOM_CODE_LENGTH)
        .map(|_| {
            let i = rng.random_range(0..ROOM_CODE_ALPHABET.len());
            ROOM_CODE_ALPHABET[i] as char
        })
        .collect()
}

fn is_code_collision(err: &sqlx::Error) -> bool {
    match err {
        sqlx::Error::Database(db_err) => db_err.message().contains("UNIQUE constraint failed")
            && db_err.message().contains("rooms.code"),
        _ => false,
    }
}

#[derive(Debug, thiserror::Error)]
pub enum RoomCreateError {
    /// Every generated code collided. With a 36^8 code space this means
    /// something other than bad luck is wrong.
    #[error("exhausted room code generation attempts")]
    CodesExhausted,
    #[error(transparent)]
    Database(#[from] sqlx::Error),
}

impl Room {
    /// Create a room with a freshly generated code, retrying on the rare
    /// code collision. Concurrent creators racing to the same code are
    /// resolved by the unique constraint: one insert wins, the loser
    /// regenerates.
    pub async fn create(
        db: &SqlitePool,
        host_id: &str,
        text: &str,
    ) -> Result<Room, RoomCreateError> {
        for _ in 0..ROOM_CODE_MAX_ATTEMPTS {
            let code = generate_room_code();
            let id = uuid::Uuid::new_v4().to_string();
            let now = crate::utils::now_timestamp();

            let result = sqlx::query(
                r#"
                INSERT INTO rooms (id, code, host_id, text, is_active, created_at)
                VALUES (?, ?, ?, ?, 1, ?)
                "#,
            )
            .bind(&id)
            .bind(&code)
            .bind(host_id)
            .bind(text)
            .bind(&now)
            .execute(db)
            .await;

            match result {
                Ok(_) => {
                    return Ok(Room {
                        id,
                        code,
                        host_id: host_id.to_string(),
                        text: text.to_string(),
                        is_active: true,
                        created_at: now,
                    })
                }
                Err(e) if is_code_collision(&e) => {
                    tracing::debug!(code = %code, "Room code collision, regenerating");
                    continue;
                }
                Err(e) => return Err(e.into()),
            }
        }

        Err(RoomCreateError::CodesExhausted)
    }

    pub async fn find_by_code(db: &SqlitePool, code: &str) -> Result<Option<Room>, sqlx::Error> {
        sqlx::query_as("SELECT * FROM rooms WHERE code = ?")
            .bind(code)
            .fetch_optional(db)
            .await
    }

    pub async fn find_active_by_code(
        db: &SqlitePool,
        code: &str,
    ) -> Result<Option<Room>, sqlx::Error> {
        sqlx::query_as("SELECT * FROM rooms WHERE code = ? AND is_active = 1")
            .bind(code)
            .fetch_optional(db)
            .await
    }

    pub async fn deactivate(db: &SqlitePool, id: &str) -> Result<(), sqlx::Error> {
        sqlx::query("UPDATE rooms SET is_active = 0 WHERE id = ?")
            .bind(id)
            .execute(db)
            .await?;
        Ok(())
    }
}

impl Participant {
    /// Idempotent join: the unique (room, user) constraint makes a repeat
    /// join a no-op rather than an error.
    pub async fn get_or_create(
        db: &SqlitePool,
        room_id: &str,
        user_id: &str,
    ) -> Result<(), sqlx::Error> {
        sqlx::query(
            r#"
            INSERT INTO participants (room_id, user_id)
            VALUES (?, ?)
            ON CONFLICT(room_id, user_id) DO NOTHING
            "#,
        )
        .bind(room_id)
        .bind(user_id)
        .execute(db)
        .await?;
        Ok(())
    }

    pub async fn find(
        db: &SqlitePool,
        room_id: &str,
        user_id: &str,
    ) -> Result<Option<Participant>, sqlx::Error> {
        sqlx::query_as("SELECT * FROM participants WHERE room_id = ? AND user_id = ?")
            .bind(room_id)
            .bind(user_id)
            .fetch_optional(db)
            .await
    }

    /// Partial result update: absent fields keep their prior values; the
    /// finish time is always stamped.
    pub async fn submit_result(
        db: &SqlitePool,
        room_id: &str,
        user_id: &str,
        wpm: Option<f64>,
        accuracy: Option<f64>,
    ) -> Result<(), sqlx::Error> {
        sqlx::query(
            r#"
            UPDATE participants
            SET wpm = COALESCE(?, wpm),
                accuracy = COALESCE(?, accuracy),
                finished_at = ?
            WHERE room_id = ? AND user_id = ?
            "#,
        )
        .bind(wpm)
        .bind(accuracy)
        .bind(crate::utils::now_timestamp())
        .bind(room_id)
        .bind(user_id)
        .execute(db)
        .await?;
        Ok(())
    }

    /// Finished participants, fastest first.
    pub async fn leaderboard(
        db: &SqlitePool,
        room_id: &str,
    ) -> Result<Vec<RoomLeaderboardEntry>, sqlx::Error> {
        sqlx::query_as(
            r#"
            SELECT u.username AS username, p.wpm AS wpm, p.accuracy AS accuracy,
                   p.finished_at AS finished_at
            FROM participants p
            JOIN users u ON u.id = p.user_id
            WHERE p.room_id = ? AND p.wpm IS NOT NULL
            ORDER BY p.wpm DESC
            "#,
        )
        .bind(room_id)
        .fetch_all(db)
        .await
    }
}
