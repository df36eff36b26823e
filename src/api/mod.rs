pub mod auth;
mod error;
mod practice;
mod rooms;
mod validation;

pub use error::{ApiError, MsgResponse};

use axum::{
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::AppState;

pub fn create_router(state: Arc<AppState>) -> Router {
    let auth_routes = Router::new()
        .route("/register", post(auth::register))
        .route("/login", post(auth::login))
        .route("/token/refresh", post(auth::refresh_token))
        .route("/profile", get(auth::profile))
        .route("/change_password", post(auth::change_password))
        .route(
            "/send_reset_password_email",
            post(auth::send_reset_password_email),
        )
        .route("/reset_password/:uid/:token", post(auth::reset_password));

    let practice_routes = Router::new()
        .route("/texts", get(practice::random_text))
        .route("/sessions", post(practice::record_session))
        .route("/daily_stats", get(practice::daily_stats))
        .route("/all_time_stats", get(practice::all_time_stats))
        .route("/streak", get(practice::streak))
        .route("/user_rank", get(practice::user_rank))
        .route("/graph", get(practice::graph_data))
        .route("/leaderboard", get(practice::leaderboard));

    let room_routes = Router::new()
        .route("/", post(rooms::create_room))
        .route("/:code/join", post(rooms::join_room))
        .route("/:code/text", get(rooms::room_text))
        .route("/:code/results", post(rooms::submit_result))
        .route("/:code/leaderboard", get(rooms::room_leaderboard));

    Router::new()
        .route("/health", get(health_check))
        .nest("/api/auth", auth_routes)
        .nest("/api/practice", practice_routes)
        .nest("/api/rooms", room_routes)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

async fn health_check() -> &'static str {
    "OK"
}
