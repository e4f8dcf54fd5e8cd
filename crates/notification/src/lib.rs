//! # Notification Crate
//!
//! Composes transactional emails and delivers them through the Gmail REST
//! API. Credentials come either from an OAuth2 installed-application token
//! kept on disk (see [`oauth`]) or from service account domain-wide
//! delegation.

pub mod compose;
mod error;
pub mod gmail;
pub mod oauth;

use async_trait::async_trait;

pub use self::error::Error;

/// Represents different types of notifications that can be sent.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum Notification {
    /// Activation email sent after a user signed up.
    ActivationEmail {
        /// The recipient's email address.
        to: String,
        first_name: String,
        last_name: String,
        activation_code: String,
    },
}

impl Notification {
    #[must_use]
    pub fn recipient(&self) -> &str {
        match self {
            Self::ActivationEmail { to, .. } => to,
        }
    }
}

/// Trait for notification clients that can send notifications.
#[async_trait]
pub trait NotificationClient: Send + Sync {
    /// Sends a notification and waits for the provider to accept it.
    ///
    /// # Errors
    ///
    /// Returns an error if the notification fails to send.
    async fn send_notification(&self, notification: &Notification) -> Result<(), Error>;
}
