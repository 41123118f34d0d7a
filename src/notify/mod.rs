//! Outbound notifications
//!
//! The auth core only needs to hand a verification link to someone who can
//! deliver it. Real email/SMS providers implement `Notifier`; the default
//! implementation writes the link to the log.

use async_trait::async_trait;

use crate::error::NotifyError;

/// Delivers account notifications
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Notifier: Send + Sync {
    /// Send the email verification link to a newly registered user
    async fn send_verification(
        &self,
        email: &str,
        first_name: &str,
        link: &str,
    ) -> Result<(), NotifyError>;
}

/// Notifier that only logs
#[derive(Debug, Clone, Default)]
pub struct LogNotifier;

impl LogNotifier {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Notifier for LogNotifier {
    async fn send_verification(
        &self,
        email: &str,
        first_name: &str,
        link: &str,
    ) -> Result<(), NotifyError> {
        tracing::info!(
            email = %email,
            first_name = %first_name,
            link = %link,
            "Verification email queued"
        );
        Ok(())
    }
}
