//! Recovery notification delivery via SMTP.
//!
//! [`EmailNotifier`] wraps the `lettre` async SMTP transport to send the
//! customer a plain-text recovery email after a retryable payment failure.
//! Configuration is loaded from environment variables; if `SMTP_HOST` is not
//! set, [`SmtpConfig::from_env`] returns `None` and the pipeline falls back
//! to [`NoopNotifier`] (the notification concern is optional, never an
//! error source for checkout).

use async_trait::async_trait;
use steno_core::record::FailureRecord;

// ---------------------------------------------------------------------------
// Error
// ---------------------------------------------------------------------------

/// Error type for notification delivery failures.
#[derive(Debug, thiserror::Error)]
pub enum NotifyError {
    /// SMTP transport-level failure (authentication, connection, etc.).
    #[error("SMTP transport error: {0}")]
    Transport(#[from] lettre::transport::smtp::Error),

    /// The recipient or sender address could not be parsed.
    #[error("Email address parse error: {0}")]
    Address(#[from] lettre::address::AddressError),

    /// The MIME message could not be assembled.
    #[error("Email build error: {0}")]
    Build(String),

    /// The failure record carries no customer email address.
    #[error("No recipient address on the failure record")]
    MissingRecipient,
}

// ---------------------------------------------------------------------------
// SmtpConfig
// ---------------------------------------------------------------------------

/// Default SMTP port (STARTTLS).
const DEFAULT_SMTP_PORT: u16 = 587;

/// Default sender address when `SMTP_FROM` is not set.
const DEFAULT_FROM_ADDRESS: &str = "billing@steno.local";

/// Configuration for the SMTP recovery notifier.
#[derive(Debug, Clone)]
pub struct SmtpConfig {
    /// SMTP server hostname.
    pub smtp_host: String,
    /// SMTP server port (defaults to 587).
    pub smtp_port: u16,
    /// RFC 5322 "From" address.
    pub from_address: String,
    /// Optional SMTP username.
    pub smtp_user: Option<String>,
    /// Optional SMTP password.
    pub smtp_password: Option<String>,
}

impl SmtpConfig {
    /// Load configuration from environment variables.
    ///
    /// Returns `None` if `SMTP_HOST` is not set, signalling that recovery
    /// email delivery is not configured and should be skipped.
    ///
    /// | Variable        | Required | Default               |
    /// |-----------------|----------|-----------------------|
    /// | `SMTP_HOST`     | yes      | —                     |
    /// | `SMTP_PORT`     | no       | `587`                 |
    /// | `SMTP_FROM`     | no       | `billing@steno.local` |
    /// | `SMTP_USER`     | no       | —                     |
    /// | `SMTP_PASSWORD` | no       | —                     |
    pub fn from_env() -> Option<Self> {
        let smtp_host = std::env::var("SMTP_HOST").ok()?;
        Some(Self {
            smtp_host,
            smtp_port: std::env::var("SMTP_PORT")
                .ok()
                .and_then(|p| p.parse().ok())
                .unwrap_or(DEFAULT_SMTP_PORT),
            from_address: std::env::var("SMTP_FROM")
                .unwrap_or_else(|_| DEFAULT_FROM_ADDRESS.to_string()),
            smtp_user: std::env::var("SMTP_USER").ok(),
            smtp_password: std::env::var("SMTP_PASSWORD").ok(),
        })
    }
}

// ---------------------------------------------------------------------------
// RecoveryNotifier
// ---------------------------------------------------------------------------

/// Port for customer-facing recovery notifications.
#[async_trait]
pub trait RecoveryNotifier: Send + Sync {
    /// Send one recovery notice for a failed payment attempt.
    async fn send_recovery_notice(&self, failure: &FailureRecord) -> Result<(), NotifyError>;
}

/// Notifier used when SMTP is not configured: logs and succeeds.
#[derive(Debug, Default)]
pub struct NoopNotifier;

#[async_trait]
impl RecoveryNotifier for NoopNotifier {
    async fn send_recovery_notice(&self, failure: &FailureRecord) -> Result<(), NotifyError> {
        tracing::debug!(
            attempt_id = %failure.attempt_id(),
            "Recovery notification skipped (SMTP not configured)"
        );
        Ok(())
    }
}

/// Sends recovery emails via SMTP.
pub struct EmailNotifier {
    config: SmtpConfig,
}

impl EmailNotifier {
    pub fn new(config: SmtpConfig) -> Self {
        Self { config }
    }

    /// Compose the plain-text recovery body for one failure.
    fn compose_body(failure: &FailureRecord) -> String {
        format!(
            "We couldn't complete your {} subscription payment ({:.2}).\n\
             Suggested next step: {}\n\
             You can retry the payment from your billing page at any time.",
            failure.attempt.subscription.plan,
            failure.attempt.subscription.price,
            failure.suggested_action.as_str().replace('_', " "),
        )
    }
}

#[async_trait]
impl RecoveryNotifier for EmailNotifier {
    async fn send_recovery_notice(&self, failure: &FailureRecord) -> Result<(), NotifyError> {
        use lettre::{
            message::header::ContentType, transport::smtp::authentication::Credentials,
            AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
        };

        let to_email = failure
            .attempt
            .user
            .email
            .as_deref()
            .ok_or(NotifyError::MissingRecipient)?;

        let email = Message::builder()
            .from(self.config.from_address.parse()?)
            .to(to_email.parse()?)
            .subject("[Steno] Your subscription payment needs attention")
            .header(ContentType::TEXT_PLAIN)
            .body(Self::compose_body(failure))
            .map_err(|e| NotifyError::Build(e.to_string()))?;

        let mut transport_builder =
            AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&self.config.smtp_host)?
                .port(self.config.smtp_port);

        if let (Some(user), Some(pass)) = (&self.config.smtp_user, &self.config.smtp_password) {
            transport_builder =
                transport_builder.credentials(Credentials::new(user.clone(), pass.clone()));
        }

        let mailer = transport_builder.build();
        mailer.send(email).await?;

        tracing::info!(
            to = to_email,
            attempt_id = %failure.attempt_id(),
            "Recovery notification email sent"
        );
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
