//! Gmail API client.
//!
//! Credentials come either from an installed-application token (see
//! [`crate::oauth`]) or from a service account with domain-wide delegation.

use std::sync::Arc;

use async_trait::async_trait;
use google_cloud_token::{TokenSource, TokenSourceProvider};
use serde::{Deserialize, Serialize};
use snafu::ResultExt;

use crate::{compose, error, Error, Notification, NotificationClient};

pub const SEND_ENDPOINT: &str = "https://gmail.googleapis.com/gmail/v1/users/me/messages/send";

/// Scope requested when impersonating a Workspace user.
const DELEGATION_SCOPES: [&str; 1] = ["https://www.googleapis.com/auth/gmail.send"];

/// Configuration for domain-wide delegation.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct Config {
    /// Google Workspace user to impersonate. Also used as the sender address.
    pub impersonate_user: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct SentMessage {
    id: String,

    #[serde(default)]
    thread_id: Option<String>,
}

/// Gmail API client for sending emails.
#[derive(Clone)]
pub struct Client {
    http: reqwest::Client,
    token_source: Arc<dyn TokenSource>,
    from_address: String,
    endpoint: String,
}

impl Client {
    /// Creates a client that impersonates `config.impersonate_user`.
    ///
    /// # Errors
    ///
    /// Returns an error if no service account credentials can be found.
    pub async fn new(config: Config) -> Result<Self, Error> {
        tracing::info!(impersonate_user = %config.impersonate_user, "Using domain-wide delegation for Gmail API");

        let auth_config = google_cloud_auth::project::Config::default()
            .with_scopes(&DELEGATION_SCOPES)
            .with_sub(&config.impersonate_user);

        let token_source_provider =
            google_cloud_auth::token::DefaultTokenSourceProvider::new(auth_config)
                .await
                .map_err(|err| Error::CreateMailer { message: err.to_string() })?;

        Ok(Self::with_token_source(config.impersonate_user, token_source_provider.token_source()))
    }

    /// Creates a client sending as `from_address` with tokens from
    /// `token_source`.
    pub fn with_token_source(
        from_address: impl Into<String>,
        token_source: Arc<dyn TokenSource>,
    ) -> Self {
        Self {
            http: reqwest::Client::new(),
            token_source,
            from_address: from_address.into(),
            endpoint: SEND_ENDPOINT.to_string(),
        }
    }

    #[must_use]
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }

    /// Sends as `from_address`, e.g. an alias of the impersonated user.
    #[must_use]
    pub fn with_from_address(mut self, from_address: impl Into<String>) -> Self {
        self.from_address = from_address.into();
        self
    }

    #[must_use]
    pub fn from_address(&self) -> &str { &self.from_address }

    /// Submits an already encoded message and waits for the API verdict.
    ///
    /// # Errors
    ///
    /// Returns an error if no token is available, the request fails, or the
    /// API answers with a non-success status.
    pub async fn send_raw(&self, raw: String) -> Result<(), Error> {
        let token = self
            .token_source
            .token()
            .await
            .map_err(|err| Error::FetchAccessToken { message: err.to_string() })?;

        let auth_header =
            if token.starts_with("Bearer ") { token } else { format!("Bearer {token}") };

        let response = self
            .http
            .post(&self.endpoint)
            .header(reqwest::header::AUTHORIZATION, auth_header)
            .json(&serde_json::json!({ "raw": raw }))
            .send()
            .await
            .context(error::HttpRequestSnafu)?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(Error::SendEmail { status: status.as_u16(), message });
        }

        match response.json::<SentMessage>().await {
            Ok(SentMessage { id, thread_id }) => {
                tracing::debug!(message_id = %id, ?thread_id, "Gmail accepted message");
            }
            Err(err) => tracing::debug!("Gmail accepted message with unexpected body: {err}"),
        }
        Ok(())
    }
}

#[async_trait]
impl NotificationClient for Client {
    async fn send_notification(&self, notification: &Notification) -> Result<(), Error> {
        let Notification::ActivationEmail { to, first_name, last_name, activation_code } =
            notification;

        let (subject, body) = compose::activation_email(first_name, last_name, activation_code);
        let raw = compose::encode_message(to, &self.from_address, &subject, &body)?;
        self.send_raw(raw).await?;

        tracing::info!(to = %to, "Successfully sent activation email");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use axum::{
        http::{HeaderMap, StatusCode},
        routing::post,
        Json, Router,
    };
    use base64::{engine::general_purpose::URL_SAFE, Engine as _};

    use super::*;

    #[derive(Debug)]
    struct StaticToken(&'static str);

    #[async_trait]
    impl TokenSource for StaticToken {
        async fn token(&self) -> Result<String, Box<dyn std::error::Error + Send + Sync>> {
            Ok(self.0.to_string())
        }
    }

    type Captured = Arc<std::sync::Mutex<Vec<(String, serde_json::Value)>>>;

    async fn spawn_gmail(status: StatusCode) -> (String, Captured) {
        let captured = Captured::default();
        let sink = captured.clone();
        let router = Router::new().route(
            "/send",
            post(move |headers: HeaderMap, Json(body): Json<serde_json::Value>| async move {
                let authorization = headers
                    .get("authorization")
                    .and_then(|value| value.to_str().ok())
                    .unwrap_or_default()
                    .to_string();
                sink.lock().unwrap().push((authorization, body));
                (status, Json(serde_json::json!({ "id": "msg-1", "threadId": "thread-1" })))
            }),
        );

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(tokio::spawn(async move { axum::serve(listener, router).await }));

        (format!("http://{addr}/send"), captured)
    }

    fn activation() -> Notification {
        Notification::ActivationEmail {
            to: "ada@example.com".to_string(),
            first_name: "Ada".to_string(),
            last_name: "Lovelace".to_string(),
            activation_code: "A1B2C3".to_string(),
        }
    }

    #[tokio::test]
    async fn test_send_activation_email() {
        let (endpoint, captured) = spawn_gmail(StatusCode::OK).await;
        let client = Client::with_token_source("noreply@example.com", Arc::new(StaticToken("abc")))
            .with_endpoint(endpoint);

        client.send_notification(&activation()).await.unwrap();

        let captured = captured.lock().unwrap().clone();
        assert_eq!(captured.len(), 1);
        assert_eq!(captured[0].0, "Bearer abc");

        let raw = captured[0].1["raw"].as_str().unwrap();
        let message = String::from_utf8(URL_SAFE.decode(raw).unwrap()).unwrap();
        assert!(message.contains("To: ada@example.com"));
        assert!(message.contains("From: noreply@example.com"));
        assert!(message.contains("Ada Lovelace"));
        assert!(message.contains("A1B2C3"));
    }

    #[tokio::test]
    async fn test_bearer_prefix_is_not_duplicated() {
        let (endpoint, captured) = spawn_gmail(StatusCode::OK).await;
        let client =
            Client::with_token_source("noreply@example.com", Arc::new(StaticToken("Bearer xyz")))
                .with_endpoint(endpoint);

        client.send_raw("cmF3".to_string()).await.unwrap();

        assert_eq!(captured.lock().unwrap()[0].0, "Bearer xyz");
    }

    #[tokio::test]
    async fn test_rejected_send_reports_status() {
        let (endpoint, _captured) = spawn_gmail(StatusCode::SERVICE_UNAVAILABLE).await;
        let client = Client::with_token_source("noreply@example.com", Arc::new(StaticToken("abc")))
            .with_endpoint(endpoint);

        let err = client.send_notification(&activation()).await.unwrap_err();
        assert!(matches!(err, Error::SendEmail { status: 503, .. }));
        assert!(err.is_transient());
    }

    #[tokio::test]
    async fn test_invalid_recipient_is_not_sent() {
        let (endpoint, captured) = spawn_gmail(StatusCode::OK).await;
        let client = Client::with_token_source("noreply@example.com", Arc::new(StaticToken("abc")))
            .with_endpoint(endpoint);
        let notification = Notification::ActivationEmail {
            to: "not-an-address".to_string(),
            first_name: "Ada".to_string(),
            last_name: "Lovelace".to_string(),
            activation_code: "A1B2C3".to_string(),
        };

        let err = client.send_notification(&notification).await.unwrap_err();
        assert!(matches!(err, Error::InvalidAddress { .. }));
        assert!(!err.is_transient());
        assert!(captured.lock().unwrap().is_empty());
    }
}
