//! Email delivery abstraction.
//!
//! Signup hands `(email, message)` to an [`EmailSender`] and moves on:
//! delivery is fire-and-forget and a failure never rolls back the identity
//! write (at-least-once creation, best-effort delivery). The sender decides
//! how to deliver (SMTP, API, etc.); the default for local dev is
//! [`LogEmailSender`], which logs and returns `Ok(())`.

use anyhow::Result;
use tracing::info;

#[derive(Clone, Debug)]
pub struct EmailMessage {
    pub to_email: String,
    pub subject: String,
    pub body: String,
}

/// Delivery abstraction used by the signup flow.
pub trait EmailSender: Send + Sync {
    /// Deliver a message or return an error; the caller only logs failures.
    ///
    /// # Errors
    ///
    /// Returns an error when delivery fails.
    fn send(&self, message: &EmailMessage) -> Result<()>;
}

/// Local dev sender that logs the payload instead of sending real email.
#[derive(Clone, Debug)]
pub struct LogEmailSender;

impl EmailSender for LogEmailSender {
    fn send(&self, message: &EmailMessage) -> Result<()> {
        info!(
            to_email = %message.to_email,
            subject = %message.subject,
            "email send stub"
        );
        Ok(())
    }
}
