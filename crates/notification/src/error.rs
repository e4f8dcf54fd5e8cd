use std::path::PathBuf;

use snafu::Snafu;

/// Errors that can occur in the notification crate.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum Error {
    #[snafu(display("Failed to create mailer client, error: {message}"))]
    CreateMailer { message: String },

    #[snafu(display("Invalid email address `{address}`, error: {source}"))]
    InvalidAddress { address: String, source: lettre::address::AddressError },

    #[snafu(display("Failed to build email message, error: {source}"))]
    BuildEmail { source: lettre::error::Error },

    #[snafu(display("Failed to obtain access token, error: {message}"))]
    FetchAccessToken { message: String },

    /// HTTP request failed before a response was received.
    #[snafu(display("HTTP request failed: {source}"))]
    HttpRequest { source: reqwest::Error },

    #[snafu(display("Mail API rejected the message with status {status}: {message}"))]
    SendEmail { status: u16, message: String },

    #[snafu(display("Error loading client secret from {}, error: {source}", path.display()))]
    ReadClientSecret { path: PathBuf, source: std::io::Error },

    #[snafu(display("Client secret {} is not valid, error: {source}", path.display()))]
    ParseClientSecret { path: PathBuf, source: serde_json::Error },

    #[snafu(display("Error reading token from {}, error: {source}", path.display()))]
    ReadToken { path: PathBuf, source: std::io::Error },

    #[snafu(display("Token file {} is not valid, error: {source}", path.display()))]
    ParseToken { path: PathBuf, source: serde_json::Error },

    #[snafu(display("Error creating token directory {}, error: {source}", path.display()))]
    CreateTokenDirectory { path: PathBuf, source: std::io::Error },

    #[snafu(display("Error storing token to {}, error: {source}", path.display()))]
    WriteToken { path: PathBuf, source: std::io::Error },

    #[snafu(display("Error serializing token, error: {source}"))]
    SerializeToken { source: serde_json::Error },

    #[snafu(display("Could not build authorization URL from `{auth_uri}`: {message}"))]
    BuildAuthorizationUrl { auth_uri: String, message: String },

    #[snafu(display("Error reading authorization code, error: {source}"))]
    ReadAuthorizationCode { source: std::io::Error },

    #[snafu(display("Authorization code is empty"))]
    EmptyAuthorizationCode,

    #[snafu(display("Error while trying to retrieve access token, status {status}: {message}"))]
    ExchangeToken { status: u16, message: String },

    #[snafu(display("Access token expired and no refresh token is available"))]
    MissingRefreshToken,
}

impl Error {
    /// Whether retrying the same request may succeed.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        match self {
            Self::HttpRequest { .. } => true,
            Self::SendEmail { status, .. } => *status == 429 || *status >= 500,
            _ => false,
        }
    }
}
