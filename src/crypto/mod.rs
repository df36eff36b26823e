//! Password-reset token generation and verification.
//!
//! Tokens are bound to the user's mutable state: the MAC covers the user
//! id, current password hash, last-login timestamp, and email, so changing
//! the password or logging in invalidates every outstanding token without
//! any server-side token storage.
//!
//! Token format: `<hex-minutes-since-epoch>-<hmac-sha256-hex>`.

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use hmac::{Hmac, Mac};
use sha2::Sha256;

use crate::db::User;

type HmacSha256 = Hmac<Sha256>;

/// Domain separator so reset-token MACs can never be confused with any
/// other HMAC use of the shared secret.
const RESET_TOKEN_CONTEXT: &str = "keyrace.password-reset.v1";

/// Encode a user id for use in a reset URL path segment.
pub fn encode_uid(user_id: &str) -> String {
    URL_SAFE_NO_PAD.encode(user_id.as_bytes())
}

/// Decode a uid path segment back to a user id. Returns None on any
/// malformed input.
pub fn decode_uid(uid: &str) -> Option<String> {
    let bytes = URL_SAFE_NO_PAD.decode(uid.as_bytes()).ok()?;
    String::from_utf8(bytes).ok()
}

fn state_hash_value(user: &User, timestamp_minutes: i64) -> String {
    // Any change to password_hash or last_login changes this value and
    // therefore invalidates previously issued tokens.
    format!(
        "{}\x00{}\x00{}\x00{}\x00{}\x00{}",
        RESET_TOKEN_CONTEXT,
        user.id,
        user.password_hash,
        user.last_login.as_deref().unwrap_or(""),
        user.email,
        timestamp_minutes,
    )
}

fn sign(secret: &str, value: &str) -> String {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .expect("HMAC accepts keys of any length");
    mac.update(value.as_bytes());
    hex::encode(mac.finalize().into_bytes())
}

fn now_minutes() -> i64 {
    chrono::Utc::now().timestamp() / 60
}

/// Mint a reset token for the user's current state.
pub fn make_reset_token(secret: &str, user: &User) -> String {
    make_reset_token_at(secret, user, now_minutes())
}

fn make_reset_token_at(secret: &str, user: &User, timestamp_minutes: i64) -> String {
    let mac = sign(secret, &state_hash_value(user, timestamp_minutes));
    format!("{:x}-{}", timestamp_minutes, mac)
}

/// Check a reset token against the user's current state. Fails on
/// malformed input, a MAC mismatch (wrong user, or state changed since
/// issue), or expiry.
pub fn check_reset_token(secret: &str, user: &User, token: &str, max_age_minutes: i64) -> bool {
    let Some((ts_part, mac_part)) = token.split_once('-') else {
        return false;
    };
    let Ok(timestamp_minutes) = i64::from_str_radix(ts_part, 16) else {
        return false;
    };

    let expected = sign(secret, &state_hash_value(user, timestamp_minutes));
    // Constant-time comparison via a second MAC pass over both digests.
    let mut verify = HmacSha256::new_from_slice(secret.as_bytes())
        .expect("HMAC accepts keys of any length");
    verify.update(expected.as_bytes());
    let expected_digest = verify.finalize().into_bytes();
    let mut verify = HmacSha256::new_from_slice(secret.as_bytes())
        .expect("HMAC accepts keys of any length");
    verify.update(mac_part.as_bytes());
    let given_digest = verify.finalize().into_bytes();
    if expected_digest != given_digest {
        return false;
    }

    let age = now_minutes() - timestamp_minutes;
    (0..=max_age_minutes).contains(&age)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_user(id: &str, email: &str, password_hash: &str, last_login: Option<&str>) -> User {
        User {
            id: id.to_string(),
            email: email.to_string(),
            username: "tester".to_string(),
            password_hash: password_hash.to_string(),
            is_active: true,
            is_admin: false,
            last_login: last_login.map(|s| s.to_string()),
            created_at: "2025-01-01 00:00:00".to_string(),
            updated_at: "2025-01-01 00:00:00".to_string(),
        }
    }

    #[test]
    fn test_uid_roundtrip() {
        let id = uuid::Uuid::new_v4().to_string();
        let uid = encode_uid(&id);
        assert_eq!(decode_uid(&uid), Some(id));
        assert_eq!(decode_uid("!!!not-base64!!!"), None);
    }

    #[test]
    fn test_token_valid_for_issuing_user() {
        let user = test_user("u1", "a@example.com", "argon2-hash", None);
        let token = make_reset_token("secret", &user);
        assert!(check_reset_token("secret", &user, &token, 60));
    }

    #[test]
    fn test_token_rejected_for_other_user() {
        let alice = test_user("u1", "a@example.com", "hash-a", None);
        let bob = test_user("u2", "b@example.com", "hash-b", None);
        let token = make_reset_token("secret", &alice);
        assert!(!check_reset_token("secret", &bob, &token, 60));
    }

    #[test]
    fn test_token_invalidated_by_password_change() {
        let user = test_user("u1", "a@example.com", "old-hash", None);
        let token = make_reset_token("secret", &user);

        let user_after = test_user("u1", "a@example.com", "new-hash", None);
        assert!(!check_reset_token("secret", &user_after, &token, 60));
    }

    #[test]
    fn test_token_invalidated_by_login() {
        let user = test_user("u1", "a@example.com", "hash", None);
        let token = make_reset_token("secret", &user);

        let user_after = test_user("u1", "a@example.com", "hash", Some("2025-06-01 10:00:00"));
        assert!(!check_reset_token("secret", &user_after, &token, 60));
    }

    #[test]
    fn test_token_expires() {
        let user = test_user("u1", "a@example.com", "hash", None);
        let stale = make_reset_token_at("secret", &user, now_minutes() - 120);
        assert!(!check_reset_token("secret", &user, &stale, 60));
        // Still fine within the window.
        let fresh = make_reset_token_at("secret", &user, now_minutes() - 30);
        assert!(check_reset_token("secret", &user, &fresh, 60));
    }

    #[test]
    fn test_token_from_the_future_is_rejected() {
        let user = test_user("u1", "a@example.com", "hash", None);
        let token = make_reset_token_at("secret", &user, now_minutes() + 10);
        assert!(!check_reset_token("secret", &user, &token, 60));
    }

    #[test]
    fn test_malformed_tokens_fail_closed() {
        let user = test_user("u1", "a@example.com", "hash", None);
        for bad in ["", "no-separator?", "zzzz-abcd", "-", "12345"] {
            assert!(!check_reset_token("secret", &user, bad, 60), "{bad:?}");
        }
    }

    #[test]
    fn test_wrong_secret_fails() {
        let user = test_user("u1", "a@example.com", "hash", None);
        let token = make_reset_token("secret-a", &user);
        assert!(!check_reset_token("secret-b", &user, &token, 60));
    }
}
