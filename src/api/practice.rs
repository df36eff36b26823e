//! Practice endpoints: texts, session recording, rollup reads, streak,
//! rank, graph data, and the global leaderboard.

use axum::{
    extract::{Query, State},
    http::StatusCode,
    Json,
};
use rand::Rng;
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;

use super::auth::AuthUser;
use super::error::{ApiError, MsgResponse, ValidationErrorBuilder};
use super::validation::validate_session;
use crate::db::{AllTimeStatistics, DailyStatistics, LeaderboardSort, PracticeSession, TextSnippet};
use crate::jobs::Job;
use crate::{stats, AppState};

const SNIPPET_CACHE_TTL: Duration = Duration::from_secs(60 * 60);
const ALL_TIME_CACHE_TTL: Duration = Duration::from_secs(5 * 60);
const RANK_CACHE_TTL: Duration = Duration::from_secs(5 * 60);
const GRAPH_CACHE_TTL: Duration = Duration::from_secs(15 * 60);
const LEADERBOARD_CACHE_TTL: Duration = Duration::from_secs(2 * 60);

/// Daily records required before the progress graph unlocks.
const GRAPH_MIN_DAYS: i64 = 30;

fn to_cached_json<T: serde::Serialize>(value: &T) -> Result<serde_json::Value, ApiError> {
    serde_json::to_value(value).map_err(|e| {
        tracing::error!(error = %e, "Failed to serialize response");
        ApiError::internal("Something went wrong. Try again later.")
    })
}

/// GET /api/practice/texts
pub async fn random_text(
    State(state): State<Arc<AppState>>,
    AuthUser(_user): AuthUser,
) -> Result<Json<serde_json::Value>, ApiError> {
    let count = TextSnippet::count(&state.db).await?;
    if count == 0 {
        return Err(ApiError::not_found("No text snippets available"));
    }

    let idx = rand::rng().random_range(0..count);
    let cache_key = format!("text_snippet:{}", idx);
    if let Some(cached) = state.cache.get(&cache_key) {
        return Ok(Json(cached));
    }

    let snippet = TextSnippet::get_by_index(&state.db, idx)
        .await?
        .ok_or_else(|| ApiError::not_found("Not found"))?;

    let data = to_cached_json(&snippet)?;
    state.cache.put(cache_key, data.clone(), SNIPPET_CACHE_TTL);
    Ok(Json(data))
}

#[derive(Debug, Deserialize)]
pub struct RecordSessionRequest {
    /// Duration in milliseconds.
    pub time_taken: Option<i64>,
    /// Words per minute.
    pub speed: Option<f64>,
    /// Percentage, 0-100.
    pub accuracy: Option<f64>,
}

/// POST /api/practice/sessions
///
/// Persists the attempt, then hands rollup recomputation to the worker;
/// if the queue won't take the job the rollups are rebuilt inline so the
/// write never gets lost.
pub async fn record_session(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
    Json(req): Json<RecordSessionRequest>,
) -> Result<(StatusCode, Json<MsgResponse>), ApiError> {
    let (time_taken, speed, accuracy) = match (req.time_taken, req.speed, req.accuracy) {
        (Some(t), Some(s), Some(a)) => (t, s, a),
        (t, s, a) => {
            let mut errors = ValidationErrorBuilder::new();
            for (field, present) in [
                ("time_taken", t.is_some()),
                ("speed", s.is_some()),
                ("accuracy", a.is_some()),
            ] {
                if !present {
                    errors.add(field, "This field is required");
                }
            }
            errors.finish()?;
            return Err(ApiError::bad_request("Invalid session data"));
        }
    };
    if let Err(e) = validate_session(time_taken, speed, accuracy) {
        return Err(ApiError::bad_request(format!("Invalid session data: {}", e)));
    }

    PracticeSession::record(&state.db, &user.id, time_taken, speed, accuracy).await?;

    let date = crate::utils::today();
    let job = Job::RecomputeStatistics {
        user_id: user.id.clone(),
        date: date.clone(),
    };
    if state.jobs.submit(job).is_err() {
        tracing::warn!(user_id = %user.id, "Job queue unavailable, recomputing statistics inline");
        stats::recompute_for_user(&state.db, &user.id, &date).await?;
    }

    Ok((
        StatusCode::CREATED,
        Json(MsgResponse::new("Session recorded successfully")),
    ))
}

/// GET /api/practice/daily_stats
pub async fn daily_stats(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
) -> Result<Json<DailyStatistics>, ApiError> {
    let today = crate::utils::today();
    let row = DailyStatistics::get(&state.db, &user.id, &today)
        .await?
        .ok_or_else(|| ApiError::not_found("No daily stats found for today"))?;
    Ok(Json(row))
}

/// GET /api/practice/all_time_stats
///
/// The rollup may lag a just-recorded session (eventual consistency); a
/// missing row with daily history present is rebuilt inline.
pub async fn all_time_stats(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
) -> Result<Json<serde_json::Value>, ApiError> {
    let cache_key = format!("all_time_stats:{}", user.id);
    if let Some(cached) = state.cache.get(&cache_key) {
        return Ok(Json(cached));
    }

    let row = match AllTimeStatistics::get(&state.db, &user.id).await? {
        Some(row) => row,
        None => {
            if DailyStatistics::count_for_user(&state.db, &user.id).await? == 0 {
                return Err(ApiError::not_found(
                    "No historical data available to compute all-time statistics",
                ));
            }
            stats::update_all_time_statistics(&state.db, &user.id).await?;
            AllTimeStatistics::get(&state.db, &user.id).await?.ok_or_else(|| {
                ApiError::internal("All-time statistics could not be generated")
            })?
        }
    };

    let data = to_cached_json(&row)?;
    state.cache.put(cache_key, data.clone(), ALL_TIME_CACHE_TTL);
    Ok(Json(data))
}

/// GET /api/practice/streak
pub async fn streak(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
) -> Result<Json<serde_json::Value>, ApiError> {
    let today = chrono::Utc::now().date_naive();
    let current = stats::current_streak(&state.db, &user.id, today).await?;
    Ok(Json(serde_json::json!({ "current_streak": current })))
}

/// GET /api/practice/user_rank
pub async fn user_rank(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
) -> Result<Json<serde_json::Value>, ApiError> {
    let cache_key = format!("user_rank:{}", user.id);
    if let Some(cached) = state.cache.get(&cache_key) {
        return Ok(Json(cached));
    }

    let rank = AllTimeStatistics::world_rank(&state.db, &user.id)
        .await?
        .ok_or_else(|| ApiError::not_found("No typing data"))?;

    let data = to_cached_json(&rank)?;
    state.cache.put(cache_key, data.clone(), RANK_CACHE_TTL);
    Ok(Json(data))
}

/// GET /api/practice/graph
pub async fn graph_data(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
) -> Result<Json<serde_json::Value>, ApiError> {
    let cache_key = format!("graph_data:{}", user.id);
    if let Some(cached) = state.cache.get(&cache_key) {
        return Ok(Json(cached));
    }

    let history = DailyStatistics::history(&state.db, &user.id).await?;
    if (history.len() as i64) < GRAPH_MIN_DAYS {
        return Err(ApiError::bad_request(
            "Complete at least 30 lessons to unlock the graph",
        ));
    }

    let data = to_cached_json(&history)?;
    state.cache.put(cache_key, data.clone(), GRAPH_CACHE_TTL);
    Ok(Json(data))
}

#[derive(Debug, Deserialize)]
pub struct LeaderboardQuery {
    pub sort_by: Option<String>,
}

/// GET /api/practice/leaderboard?sort_by=top_speed|avg_speed (public)
pub async fn leaderboard(
    State(state): State<Arc<AppState>>,
    Query(query): Query<LeaderboardQuery>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let sort_by = query.sort_by.as_deref().unwrap_or("top_speed");
    let sort: LeaderboardSort = sort_by.parse().map_err(|_| {
        ApiError::bad_request("Invalid parameter. Use 'sort_by=top_speed' or 'sort_by=avg_speed'")
    })?;

    let cache_key = format!("leaderboard:{}", sort.as_str());
    if let Some(cached) = state.cache.get(&cache_key) {
        return Ok(Json(cached));
    }

    let entries = AllTimeStatistics::leaderboard(&state.db, sort).await?;
    if entries.is_empty() {
        return Err(ApiError::not_found(format!(
            "No leaderboard data found for '{}'",
            sort.as_str()
        )));
    }

    let data = to_cached_json(&entries)?;
    state.cache.put(cache_key, data.clone(), LEADERBOARD_CACHE_TTL);
    Ok(Json(data))
}
