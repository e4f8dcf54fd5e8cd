use std::sync::Arc;

use async_trait::async_trait;
use notification::{Notification, NotificationClient};

use super::{RetryPolicy, SignUp, UserDirectory};
use crate::{
    metrics::SignUpMetrics,
    service::error::{Error, Result},
};

/// Outcome of a successful dispatch.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Delivery {
    pub user_id: String,

    pub to: String,

    /// Submissions made, including the successful one.
    pub attempts: u32,
}

/// Handles the payloads received by the sign-up listener.
#[async_trait]
pub trait Dispatch: Send + Sync {
    async fn dispatch(&self, payload: &str) -> Result<Delivery>;

    /// Accounts for a dispatch abandoned after the delivery timeout.
    fn record_timeout(&self);
}

/// Turns one sign-up payload into one activation email.
#[derive(Clone)]
pub struct SignUpDispatcher {
    directory: Arc<dyn UserDirectory>,
    client: Arc<dyn NotificationClient>,
    retry: RetryPolicy,
    metrics: SignUpMetrics,
}

impl SignUpDispatcher {
    pub fn new(
        directory: Arc<dyn UserDirectory>,
        client: Arc<dyn NotificationClient>,
        retry: RetryPolicy,
        metrics: SignUpMetrics,
    ) -> Self {
        Self { directory, client, retry, metrics }
    }

    /// Decodes `payload`, looks up exactly one user and sends the activation
    /// email, retrying transient send failures.
    ///
    /// # Errors
    ///
    /// Returns an error if the payload is malformed, the lookup does not
    /// match exactly one user, the lookup fails or the email cannot be sent.
    pub async fn dispatch(&self, payload: &str) -> Result<Delivery> {
        self.metrics.received.inc();

        let result = self.deliver(payload).await;
        match &result {
            Ok(_) => self.metrics.delivered.inc(),
            Err(err) => self.metrics.dropped.with_label_values(&[err.reason()]).inc(),
        }
        result
    }

    async fn deliver(&self, payload: &str) -> Result<Delivery> {
        let SignUp { user_id, email, activation_code } = SignUp::parse(payload)?;

        let mut users = self.directory.find_users(&user_id).await?;
        let user = match users.len() {
            0 => return Err(Error::UserNotFound { user_id }),
            1 => users.swap_remove(0),
            count => return Err(Error::AmbiguousUser { user_id, count }),
        };

        let notification = Notification::ActivationEmail {
            to: email.clone(),
            first_name: user.first_name,
            last_name: user.last_name,
            activation_code,
        };
        let attempts = self.send_with_retry(&user_id, &notification).await?;

        Ok(Delivery { user_id, to: email, attempts })
    }

    async fn send_with_retry(&self, user_id: &str, notification: &Notification) -> Result<u32> {
        let mut attempt = 1;
        loop {
            match self.client.send_notification(notification).await {
                Ok(()) => return Ok(attempt),
                Err(err) if err.is_transient() && self.retry.should_retry(attempt) => {
                    let backoff = self.retry.backoff(attempt);
                    tracing::warn!(
                        user_id = %user_id,
                        attempt,
                        "Fail to send activation email, retry in {backoff:?}, error: {err}"
                    );
                    self.metrics.send_retries.inc();
                    tokio::time::sleep(backoff).await;
                    attempt += 1;
                }
                Err(source) => {
                    return Err(Error::SendActivationEmail {
                        user_id: user_id.to_string(),
                        attempts: attempt,
                        source,
                    })
                }
            }
        }
    }
}

#[async_trait]
impl Dispatch for SignUpDispatcher {
    async fn dispatch(&self, payload: &str) -> Result<Delivery> { Self::dispatch(self, payload).await }

    fn record_timeout(&self) { self.metrics.dropped.with_label_values(&["timeout"]).inc(); }
}
