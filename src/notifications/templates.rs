//! Rendered bodies for the account emails, HTML plus a plain-text
//! alternative.

use super::OutgoingEmail;
use crate::db::User;

pub fn welcome(user: &User) -> OutgoingEmail {
    let username = html_escape(&user.username);
    let html_body = format!(
        r#"<!DOCTYPE html>
<html>
<body style="font-family: -apple-system, BlinkMacSystemFont, 'Segoe UI', Arial, sans-serif; background-color: #f4f4f4; padding: 20px;">
    <div style="max-width: 600px; margin: 0 auto; background-color: #ffffff; padding: 24px; border-radius: 8px; box-shadow: 0 2px 4px rgba(0, 0, 0, 0.08);">
        <h2 style="color: #2563eb;">Welcome to Keyrace, {username}!</h2>
        <p>Your account is ready and the leaderboard is waiting.</p>
        <p>Grab a practice text, warm up your fingers, and see how your speed
        stacks up against the rest of the world. Speed is great, but accuracy
        is what moves you up the rankings.</p>
        <p style="text-align: center; margin: 28px 0;">
            <a href="http://localhost:5173" style="display: inline-block; padding: 10px 24px; font-size: 16px; color: white; background-color: #2563eb; text-decoration: none; border-radius: 6px;">
                Start Typing
            </a>
        </p>
        <p>See you at the leaderboard,<br><strong>The Keyrace Team</strong></p>
    </div>
</body>
</html>"#,
    );

    let text_body = format!(
        "Welcome to Keyrace, {}!\n\n\
         Your account is ready and the leaderboard is waiting.\n\
         Grab a practice text, warm up your fingers, and see how your speed\n\
         stacks up against the rest of the world.\n\n\
         See you at the leaderboard,\n\
         The Keyrace Team",
        user.username,
    );

    OutgoingEmail {
        to: user.email.clone(),
        subject: "Welcome to Keyrace".to_string(),
        html_body,
        text_body,
    }
}

pub fn password_changed(user: &User) -> OutgoingEmail {
    let username = html_escape(&user.username);
    let html_body = format!(
        r#"<!DOCTYPE html>
<html>
<body style="font-family: -apple-system, BlinkMacSystemFont, 'Segoe UI', Arial, sans-serif;">
    <h2 style="color: #333;">Password Changed</h2>
    <p>Hi <strong>{username}</strong>,</p>
    <p>Your password has been updated. If you made this change, no further
    action is needed.</p>
    <p>If you did <strong>not</strong> request this change, reset your
    password immediately and contact support.</p>
    <p>Stay secure,<br><strong>The Keyrace Team</strong></p>
</body>
</html>"#,
    );

    let text_body = format!(
        "Hi {},\n\n\
         Your password has been updated. If you made this change, no further\n\
         action is needed.\n\n\
         If you did NOT request this change, reset your password immediately\n\
         and contact support.\n\n\
         Stay secure,\n\
         The Keyrace Team",
        user.username,
    );

    OutgoingEmail {
        to: user.email.clone(),
        subject: "Your password has been changed".to_string(),
        html_body,
        text_body,
    }
}

pub fn password_reset(user: &User, link: &str) -> OutgoingEmail {
    let username = html_escape(&user.username);
    let html_body = format!(
        r#"<!DOCTYPE html>
<html>
<body style="font-family: -apple-system, BlinkMacSystemFont, 'Segoe UI', Arial, sans-serif;">
    <h2 style="color: #333;">Password Reset Request</h2>
    <p>Hi <strong>{username}</strong>,</p>
    <p>You asked to reset your password. Click the button below to proceed:</p>
    <p style="margin: 24px 0;">
        <a href="{link}" style="display: inline-block; padding: 10px 24px; font-size: 16px; color: white; background-color: #2563eb; text-decoration: none; border-radius: 6px;">
            Reset Password
        </a>
    </p>
    <p>The link expires shortly. If you did not request this, you can safely
    ignore this email.</p>
    <p>Stay secure,<br><strong>The Keyrace Team</strong></p>
</body>
</html>"#,
    );

    let text_body = format!(
        "Hi {},\n\n\
         You asked to reset your password. Open this link to proceed:\n\
         {}\n\n\
         The link expires shortly. If you did not request this, you can\n\
         safely ignore this email.\n\n\
         Stay secure,\n\
         The Keyrace Team",
        user.username, link,
    );

    OutgoingEmail {
        to: user.email.clone(),
        subject: "Reset your password".to_string(),
        html_body,
        text_body,
    }
}

/// Escape HTML special characters
fn html_escape(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&#39;")
}
