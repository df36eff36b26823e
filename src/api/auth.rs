//! Account endpoints: registration, login, token refresh, profile,
//! password change, and the password-reset flow.

use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use axum::{
    async_trait,
    extract::{FromRequestParts, Path, State},
    http::{request::Parts, HeaderMap, StatusCode},
    Json,
};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

use super::error::{ApiError, MsgResponse, ValidationErrorBuilder};
use super::validation::{validate_email, validate_username};
use crate::config::AuthConfig;
use crate::db::{User, UserResponse};
use crate::{crypto, notifications, AppState};

const PROFILE_CACHE_TTL: Duration = Duration::from_secs(5 * 60);

/// Hash a password using Argon2
pub fn hash_password(password: &str) -> Result<String, argon2::password_hash::Error> {
    let salt = SaltString::generate(&mut OsRng);
    let argon2 = Argon2::default();
    let hash = argon2.hash_password(password.as_bytes(), &salt)?;
    Ok(hash.to_string())
}

/// Verify a password against a hash
pub fn verify_password(password: &str, hash: &str) -> bool {
    let parsed_hash = match PasswordHash::new(hash) {
        Ok(h) => h,
        Err(_) => return false,
    };
    Argon2::default()
        .verify_password(password.as_bytes(), &parsed_hash)
        .is_ok()
}

/// JWT claims carried by both access and refresh tokens.
#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    /// User id.
    pub sub: String,
    pub username: String,
    /// "access" or "refresh"; the extractor only honors access tokens.
    pub token_type: String,
    pub iat: i64,
    pub exp: i64,
}

#[derive(Debug, Serialize)]
pub struct TokenPair {
    pub access: String,
    pub refresh: String,
}

fn issue_token(
    user: &User,
    secret: &str,
    token_type: &str,
    lifetime: chrono::Duration,
) -> Result<String, jsonwebtoken::errors::Error> {
    let now = chrono::Utc::now();
    let claims = Claims {
        sub: user.id.clone(),
        username: user.username.clone(),
        token_type: token_type.to_string(),
        iat: now.timestamp(),
        exp: (now + lifetime).timestamp(),
    };
    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
}

pub fn issue_token_pair(user: &User, auth: &AuthConfig) -> Result<TokenPair, ApiError> {
    let access = issue_token(
        user,
        &auth.jwt_secret,
        "access",
        chrono::Duration::minutes(auth.access_token_minutes),
    );
    let refresh = issue_token(
        user,
        &auth.jwt_secret,
        "refresh",
        chrono::Duration::days(auth.refresh_token_days),
    );
    match (access, refresh) {
        (Ok(access), Ok(refresh)) => Ok(TokenPair { access, refresh }),
        (Err(e), _) | (_, Err(e)) => {
            tracing::error!(error = %e, "Failed to sign token");
            Err(ApiError::internal("Something went wrong. Try again later."))
        }
    }
}

pub fn decode_token(secret: &str, token: &str) -> Result<Claims, jsonwebtoken::errors::Error> {
    decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &Validation::default(),
    )
    .map(|data| data.claims)
}

fn extract_bearer(headers: &HeaderMap) -> Option<String> {
    headers
        .get("Authorization")
        .and_then(|h| h.to_str().ok())
        .and_then(|h| h.strip_prefix("Bearer "))
        .map(|s| s.to_string())
}

/// Extractor for the authenticated user behind a bearer access token.
pub struct AuthUser(pub User);

#[async_trait]
impl FromRequestParts<Arc<AppState>> for AuthUser {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        let token = extract_bearer(&parts.headers)
            .ok_or_else(|| ApiError::unauthorized("Authentication credentials were not provided"))?;

        let claims = decode_token(&state.config.auth.jwt_secret, &token)
            .map_err(|_| ApiError::unauthorized("Invalid or expired token"))?;
        if claims.token_type != "access" {
            return Err(ApiError::unauthorized("Invalid or expired token"));
        }

        let user = User::find_by_id(&state.db, &claims.sub)
            .await?
            .filter(|u| u.is_active)
            .ok_or_else(|| ApiError::unauthorized("Invalid or expired token"))?;

        Ok(AuthUser(user))
    }
}

// -------------------------------------------------------------------------
// Request/response bodies
// -------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub email: String,
    pub username: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct AuthResponse {
    pub token: TokenPair,
    pub msg: String,
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    /// Email or case-insensitive username.
    pub login_field: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct RefreshRequest {
    pub refresh: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct RefreshResponse {
    pub access: String,
}

#[derive(Debug, Deserialize)]
pub struct ChangePasswordRequest {
    pub password: String,
    pub password2: String,
}

#[derive(Debug, Deserialize)]
pub struct SendResetEmailRequest {
    pub email: String,
}

#[derive(Debug, Deserialize)]
pub struct ResetPasswordRequest {
    pub password: String,
    pub password2: String,
}

// -------------------------------------------------------------------------
// Handlers
// -------------------------------------------------------------------------

/// POST /api/auth/register
pub async fn register(
    State(state): State<Arc<AppState>>,
    Json(req): Json<RegisterRequest>,
) -> Result<(StatusCode, Json<AuthResponse>), ApiError> {
    let mut errors = ValidationErrorBuilder::new();

    if let Err(e) = validate_username(&req.username) {
        errors.add("username", e);
    } else if User::username_exists(&state.db, &req.username).await? {
        errors.add("username", "This username is already taken");
    }

    let email = match validate_email(&req.email) {
        Ok(email) => {
            if User::email_exists(&state.db, &email).await? {
                errors.add("email", "This email is already registered");
            }
            email
        }
        Err(e) => {
            errors.add("email", e);
            String::new()
        }
    };

    if req.password.is_empty() {
        errors.add("password", "Password is required");
    }

    errors.finish()?;

    let password_hash = hash_password(&req.password).map_err(|e| {
        tracing::error!(error = %e, "Failed to hash password");
        ApiError::internal("Something went wrong. Try again later.")
    })?;

    let user = User::create(&state.db, &email, &req.username, &password_hash).await?;
    tracing::info!(user_id = %user.id, username = %user.username, "User registered");

    notifications::send_welcome_email(&state.jobs, &state.mailer, &user).await;

    let token = issue_token_pair(&user, &state.config.auth)?;
    Ok((
        StatusCode::CREATED,
        Json(AuthResponse {
            token,
            msg: "Registration successful".to_string(),
        }),
    ))
}

/// POST /api/auth/login
pub async fn login(
    State(state): State<Arc<AppState>>,
    Json(req): Json<LoginRequest>,
) -> Result<Json<AuthResponse>, ApiError> {
    if req.login_field.is_empty() || req.password.is_empty() {
        return Err(ApiError::bad_request(
            "Both login field and password are required",
        ));
    }

    // An email logs in directly; anything else is resolved as a username.
    let user = if req.login_field.contains('@') {
        User::find_by_email(&state.db, &req.login_field).await?
    } else {
        User::find_by_username(&state.db, &req.login_field).await?
    };

    let user = user
        .filter(|u| u.is_active && verify_password(&req.password, &u.password_hash))
        .ok_or_else(|| ApiError::unauthorized("Invalid credentials"))?;

    User::touch_last_login(&state.db, &user.id).await?;
    tracing::info!(user_id = %user.id, "User logged in");

    let token = issue_token_pair(&user, &state.config.auth)?;
    Ok(Json(AuthResponse {
        token,
        msg: "Login successful".to_string(),
    }))
}

/// POST /api/auth/token/refresh
pub async fn refresh_token(
    State(state): State<Arc<AppState>>,
    Json(req): Json<RefreshRequest>,
) -> Result<Json<RefreshResponse>, ApiError> {
    let refresh = req
        .refresh
        .filter(|t| !t.is_empty())
        .ok_or_else(|| ApiError::bad_request("Refresh token is required"))?;

    let claims = decode_token(&state.config.auth.jwt_secret, &refresh)
        .map_err(|_| ApiError::unauthorized("Invalid refresh token"))?;
    if claims.token_type != "refresh" {
        return Err(ApiError::unauthorized("Invalid refresh token"));
    }

    let user = User::find_by_id(&state.db, &claims.sub)
        .await?
        .filter(|u| u.is_active)
        .ok_or_else(|| ApiError::unauthorized("Invalid refresh token"))?;

    let access = issue_token(
        &user,
        &state.config.auth.jwt_secret,
        "access",
        chrono::Duration::minutes(state.config.auth.access_token_minutes),
    )
    .map_err(|e| {
        tracing::error!(error = %e, "Failed to sign token");
        ApiError::internal("Something went wrong. Try again later.")
    })?;

    Ok(Json(RefreshResponse { access }))
}

/// GET /api/auth/profile
pub async fn profile(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
) -> Result<Json<serde_json::Value>, ApiError> {
    let cache_key = format!("user_profile:{}", user.id);
    if let Some(cached) = state.cache.get(&cache_key) {
        return Ok(Json(cached));
    }

    let data = serde_json::to_value(UserResponse::from(user)).map_err(|e| {
        tracing::error!(error = %e, "Failed to serialize profile");
        ApiError::internal("Something went wrong. Try again later.")
    })?;
    state.cache.put(cache_key, data.clone(), PROFILE_CACHE_TTL);
    Ok(Json(data))
}

/// POST /api/auth/change_password
pub async fn change_password(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
    Json(req): Json<ChangePasswordRequest>,
) -> Result<Json<MsgResponse>, ApiError> {
    if req.password.is_empty() {
        return Err(ApiError::validation_field("password", "Password is required"));
    }
    if req.password != req.password2 {
        return Err(ApiError::validation_field(
            "password2",
            "Password and confirm password don't match",
        ));
    }

    let password_hash = hash_password(&req.password).map_err(|e| {
        tracing::error!(error = %e, "Failed to hash password");
        ApiError::internal("Something went wrong. Try again later.")
    })?;
    User::update_password(&state.db, &user.id, &password_hash).await?;
    tracing::info!(user_id = %user.id, "Password changed");

    notifications::send_password_changed_email(&state.jobs, &state.mailer, &user).await;

    Ok(Json(MsgResponse::new("Password changed successfully")))
}

/// POST /api/auth/send_reset_password_email
pub async fn send_reset_password_email(
    State(state): State<Arc<AppState>>,
    Json(req): Json<SendResetEmailRequest>,
) -> Result<Json<MsgResponse>, ApiError> {
    let user = User::find_by_email(&state.db, &req.email)
        .await?
        .ok_or_else(|| ApiError::bad_request("You are not a registered user"))?;

    let uid = crypto::encode_uid(&user.id);
    let token = crypto::make_reset_token(&state.config.auth.jwt_secret, &user);
    let link = format!("{}/{}/{}/", state.config.email.reset_url_base, uid, token);
    tracing::info!(user_id = %user.id, "Password reset link issued");

    notifications::send_password_reset_email(&state.jobs, &state.mailer, &user, &link).await;

    Ok(Json(MsgResponse::new(
        "Password reset link sent. Please check your email",
    )))
}

/// POST /api/auth/reset_password/:uid/:token
pub async fn reset_password(
    State(state): State<Arc<AppState>>,
    Path((uid, token)): Path<(String, String)>,
    Json(req): Json<ResetPasswordRequest>,
) -> Result<Json<MsgResponse>, ApiError> {
    if req.password != req.password2 {
        return Err(ApiError::validation_field(
            "password2",
            "Password and confirm password don't match",
        ));
    }

    let user = match crypto::decode_uid(&uid) {
        Some(user_id) => User::find_by_id(&state.db, &user_id).await?,
        None => None,
    };
    let user = user.ok_or_else(|| ApiError::bad_request("Invalid or expired reset token"))?;

    if !crypto::check_reset_token(
        &state.config.auth.jwt_secret,
        &user,
        &token,
        state.config.auth.reset_token_minutes,
    ) {
        return Err(ApiError::bad_request("Invalid or expired reset token"));
    }

    let password_hash = hash_password(&req.password).map_err(|e| {
        tracing::error!(error = %e, "Failed to hash password");
        ApiError::internal("Something went wrong. Try again later.")
    })?;
    User::update_password(&state.db, &user.id, &password_hash).await?;
    tracing::info!(user_id = %user.id, "Password reset completed");

    Ok(Json(MsgResponse::new("Password reset successfully")))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_user() -> User {
        User {
            id: "u1".to_string(),
            email: "ada@example.com".to_string(),
            username: "ada".to_string(),
            password_hash: String::new(),
            is_active: true,
            is_admin: false,
            last_login: None,
            created_at: "2025-01-01 00:00:00".to_string(),
            updated_at: "2025-01-01 00:00:00".to_string(),
        }
    }

    #[test]
    fn test_hash_password_never_stores_plaintext() {
        let hash = hash_password("hunter2-but-longer").unwrap();
        assert_ne!(hash, "hunter2-but-longer");
        assert!(hash.starts_with("$argon2"));
    }

    #[test]
    fn test_verify_password_roundtrip() {
        let hash = hash_password("correct horse battery staple").unwrap();
        assert!(verify_password("correct horse battery staple", &hash));
        assert!(!verify_password("wrong password", &hash));
        assert!(!verify_password("anything", "not-a-valid-hash"));
    }

    #[test]
    fn test_token_pair_carries_username_claim() {
        let auth = AuthConfig::default();
        let user = sample_user();
        let pair = issue_token_pair(&user, &auth).unwrap();

        let access = decode_token(&auth.jwt_secret, &pair.access).unwrap();
        assert_eq!(access.sub, "u1");
        assert_eq!(access.username, "ada");
        assert_eq!(access.token_type, "access");

        let refresh = decode_token(&auth.jwt_secret, &pair.refresh).unwrap();
        assert_eq!(refresh.token_type, "refresh");
        assert!(refresh.exp > access.exp);
    }

    #[test]
    fn test_token_rejected_with_wrong_secret() {
        let auth = AuthConfig::default();
        let pair = issue_token_pair(&sample_user(), &auth).unwrap();
        assert!(decode_token("some-other-secret", &pair.access).is_err());
    }

    #[test]
    fn test_expired_token_is_rejected() {
        let user = sample_user();
        let token = issue_token(&user, "secret", "access", chrono::Duration::minutes(-5)).unwrap();
        assert!(decode_token("secret", &token).is_err());
    }
}
