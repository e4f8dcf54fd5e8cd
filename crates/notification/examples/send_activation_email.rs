//! Sends one activation email with the installed-application OAuth flow.
//!
//! The first run prints an authorization URL and waits for the code; later
//! runs reuse the stored token.
//!
//! ```bash
//! cargo run -p notification --example send_activation_email -- \
//!     gmail_client_secret.json ~/.credentials/gmail-nodejs-quickstart.json \
//!     noreply@example.com user@example.com
//! ```

use std::sync::Arc;

use notification::{gmail::Client, oauth, Notification, NotificationClient};

#[tokio::main]
async fn main() -> Result<(), notification::Error> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let mut args = std::env::args().skip(1);
    let mut next = |default: &str| args.next().unwrap_or_else(|| default.to_string());
    let client_secret_path = next("gmail_client_secret.json");
    let token_path = next(".credentials/gmail-nodejs-quickstart.json");
    let from = next("noreply@example.com");
    let to = next("user@example.com");

    let token_source = oauth::Authorizer::new(client_secret_path, token_path)
        .authorize(&oauth::ConsolePrompt)
        .await?;
    let client = Client::with_token_source(from, Arc::new(token_source));

    client
        .send_notification(&Notification::ActivationEmail {
            to,
            first_name: "Ada".to_string(),
            last_name: "Lovelace".to_string(),
            activation_code: "A1B2C3".to_string(),
        })
        .await
}
