//! Practice text snippets, seeded once at startup and addressed by a dense
//! zero-based index so a random row is one lookup away.

use serde::{Deserialize, Serialize};
use sqlx::{FromRow, SqlitePool};

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct TextSnippet {
    pub idx: i64,
    pub content: String,
}

impl TextSnippet {
    pub async fn count(db: &SqlitePool) -> Result<i64, sqlx::Error> {
        let count: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM text_snippets")
            .fetch_one(db)
            .await?;
        Ok(count.0)
    }

    pub async fn get_by_index(
        db: &SqlitePool,
        idx: i64,
    ) -> Result<Option<TextSnippet>, sqlx::Error> {
        sqlx::query_as("SELECT * FROM text_snippets WHERE idx = ?")
            .bind(idx)
            .fetch_optional(db)
            .await
    }

    pub async fn insert(db: &SqlitePool, idx: i64, content: &str) -> Result<(), sqlx::Error> {
        sqlx::query("INSERT INTO text_snippets (idx, content) VALUES (?, ?)")
            .bind(idx)
            .bind(content)
            .execute(db)
            .await?;
        Ok(())
    }
}
