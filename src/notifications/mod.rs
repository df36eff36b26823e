//! Notification dispatcher: fire-and-forget account emails.
//!
//! Every send is best-effort with at most one attempt. Dispatch prefers
//! the background queue and falls back to sending synchronously when the
//! queue won't take the job; in both paths SMTP failures are logged and
//! swallowed so the triggering request never sees them.

mod templates;

use lettre::{
    message::{header::ContentType, Mailbox, MultiPart, SinglePart},
    transport::smtp::authentication::Credentials,
    AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
};
use tracing::{error, info, warn};

use crate::config::EmailConfig;
use crate::db::User;
use crate::jobs::{Job, JobQueue};

/// A fully rendered email, ready to hand to the queue or the transport.
#[derive(Debug, Clone)]
pub struct OutgoingEmail {
    pub to: String,
    pub subject: String,
    pub html_body: String,
    pub text_body: String,
}

/// SMTP sender. Errors never escape `send`.
pub struct Mailer {
    config: EmailConfig,
}

impl Mailer {
    pub fn new(config: EmailConfig) -> Self {
        Self { config }
    }

    pub fn is_enabled(&self) -> bool {
        self.config.is_configured()
    }

    /// Deliver one email. All failures are absorbed: unconfigured SMTP,
    /// bad addresses, auth, protocol, and transport errors all end here.
    pub async fn send(&self, email: &OutgoingEmail) {
        if let Err(e) = self.try_send(email).await {
            error!(to = %email.to, subject = %email.subject, error = %e, "Failed to send email");
        }
    }

    async fn try_send(&self, email: &OutgoingEmail) -> anyhow::Result<()> {
        if !self.is_enabled() {
            warn!(to = %email.to, "Email not configured, skipping send");
            return Ok(());
        }

        let smtp_host = self
            .config
            .smtp_host
            .as_ref()
            .ok_or_else(|| anyhow::anyhow!("SMTP host not configured"))?;
        let from_address = self
            .config
            .from_address
            .as_ref()
            .ok_or_else(|| anyhow::anyhow!("From address not configured"))?;

        let from: Mailbox = format!("{} <{}>", self.config.from_name, from_address).parse()?;
        let to: Mailbox = email.to.parse()?;

        let message = Message::builder()
            .from(from)
            .to(to)
            .subject(&email.subject)
            .multipart(
                MultiPart::alternative()
                    .singlepart(
                        SinglePart::builder()
                            .header(ContentType::TEXT_PLAIN)
                            .body(email.text_body.clone()),
                    )
                    .singlepart(
                        SinglePart::builder()
                            .header(ContentType::TEXT_HTML)
                            .body(email.html_body.clone()),
                    ),
            )?;

        let mailer = if self.config.smtp_tls {
            AsyncSmtpTransport::<Tokio1Executor>::relay(smtp_host)?
        } else {
            AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(smtp_host)
        }
        .port(self.config.smtp_port);

        let mailer = if let (Some(username), Some(password)) =
            (&self.config.smtp_username, &self.config.smtp_password)
        {
            mailer.credentials(Credentials::new(username.clone(), password.clone()))
        } else {
            mailer
        };

        mailer.build().send(message).await?;

        info!(to = %email.to, subject = %email.subject, "Email sent successfully");
        Ok(())
    }
}

/// Queue an email, sending synchronously if the queue won't take it.
async fn dispatch(queue: &JobQueue, mailer: &Mailer, email: OutgoingEmail) {
    if let Err(Job::SendEmail(email)) = queue.submit(Job::SendEmail(email)) {
        warn!(to = %email.to, "Job queue unavailable, sending email synchronously");
        mailer.send(&email).await;
    }
}

pub async fn send_welcome_email(queue: &JobQueue, mailer: &Mailer, user: &User) {
    dispatch(queue, mailer, templates::welcome(user)).await;
}

pub async fn send_password_changed_email(queue: &JobQueue, mailer: &Mailer, user: &User) {
    dispatch(queue, mailer, templates::password_changed(user)).await;
}

pub async fn send_password_reset_email(
    queue: &JobQueue,
    mailer: &Mailer,
    user: &User,
    link: &str,
) {
    dispatch(queue, mailer, templates::password_reset(user, link)).await;
}
