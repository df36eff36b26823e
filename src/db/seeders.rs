//! Database seeders for initial data.
//!
//! Practice paragraphs live in a CSV file shipped alongside the binary and
//! are ingested once into `text_snippets` at startup.

use anyhow::{Context, Result};
use sqlx::SqlitePool;
use std::path::Path;
use tracing::{info, warn};

use super::TextSnippet;

/// Ingest practice paragraphs from a CSV file with a `content` column.
/// Idempotent: a populated table is left untouched, so restarts don't
/// duplicate or reshuffle snippet indices.
pub async fn seed_text_snippets(pool: &SqlitePool, csv_path: &Path) -> Result<()> {
    let existing = TextSnippet::count(pool).await?;
    if existing > 0 {
        info!(count = existing, "Text snippets already seeded, skipping");
        return Ok(());
    }

    if !csv_path.exists() {
        warn!(path = %csv_path.display(), "Snippet CSV not found, no texts seeded");
        return Ok(());
    }

    let mut reader = csv::Reader::from_path(csv_path)
        .with_context(|| format!("Failed to open snippet CSV: {}", csv_path.display()))?;

    let headers = reader.headers().context("Snippet CSV has no header row")?;
    let content_col = headers
        .iter()
        .position(|h| h.eq_ignore_ascii_case("content"))
        .context("Snippet CSV is missing a 'content' column")?;

    let mut idx: i64 = 0;
    for record in reader.records() {
        let record = record.context("Malformed row in snippet CSV")?;
        let Some(content) = record.get(content_col) else {
            continue;
        };
        let content = content.trim();
        if content.is_empty() {
            continue;
        }
        TextSnippet::insert(pool, idx, content).await?;
        idx += 1;
    }

    info!(count = idx, path = %csv_path.display(), "Seeded text snippets");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::test_pool;
    use std::io::Write;

    fn write_csv(contents: &str) -> std::path::PathBuf {
        let path = std::env::temp_dir().join(format!("snippets-{}.csv", uuid::Uuid::new_v4()));
        let mut file = std::fs::File::create(&path).unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        path
    }

    #[tokio::test]
    async fn test_seed_assigns_dense_indices() {
        let db = test_pool().await;
        let path = write_csv("content\nfirst paragraph\nsecond, with a comma\n\"quoted \"\"text\"\"\"\n");

        seed_text_snippets(&db, &path).await.unwrap();

        assert_eq!(TextSnippet::count(&db).await.unwrap(), 3);
        let second = TextSnippet::get_by_index(&db, 1).await.unwrap().expect("row");
        assert_eq!(second.content, "second, with a comma");
        let third = TextSnippet::get_by_index(&db, 2).await.unwrap().expect("row");
        assert_eq!(third.content, "quoted \"text\"");

        std::fs::remove_file(&path).ok();
    }

    #[tokio::test]
    async fn test_seed_is_idempotent() {
        let db = test_pool().await;
        let path = write_csv("content\nalpha\nbeta\n");

        seed_text_snippets(&db, &path).await.unwrap();
        seed_text_snippets(&db, &path).await.unwrap();

        assert_eq!(TextSnippet::count(&db).await.unwrap(), 2);
        std::fs::remove_file(&path).ok();
    }

    #[tokio::test]
    async fn test_seed_missing_file_is_not_fatal() {
        let db = test_pool().await;
        let path = std::path::PathBuf::from("/nonexistent/snippets.csv");
        seed_text_snippets(&db, &path).await.unwrap();
        assert_eq!(TextSnippet::count(&db).await.unwrap(), 0);
    }
}
