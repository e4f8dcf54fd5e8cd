use std::path::PathBuf;

use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, Default, Deserialize, Serialize)]
pub struct GmailConfig {
    /// Sender of activation emails; defaults to the impersonated user with
    /// domain-wide delegation.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub from_address: Option<String>,

    #[serde(default)]
    pub credentials: GmailCredentials,
}

#[derive(Clone, Deserialize, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum GmailCredentials {
    /// OAuth client of type "installed application" and a stored user token.
    InstalledApplication {
        #[serde(default = "GmailCredentials::default_client_secret_path")]
        client_secret_path: PathBuf,

        #[serde(default = "GmailCredentials::default_token_path")]
        token_path: PathBuf,

        /// Used instead of the interactive prompt when no token is stored.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        refresh_token: Option<String>,
    },

    /// Service account impersonating a Google Workspace user.
    DomainWideDelegation { impersonate_user: String },
}

impl std::fmt::Debug for GmailCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InstalledApplication { client_secret_path, token_path, refresh_token } => f
                .debug_struct("InstalledApplication")
                .field("client_secret_path", client_secret_path)
                .field("token_path", token_path)
                .field("refresh_token", &refresh_token.as_ref().map(|_| "<redacted>"))
                .finish(),
            Self::DomainWideDelegation { impersonate_user } => f
                .debug_struct("DomainWideDelegation")
                .field("impersonate_user", impersonate_user)
                .finish(),
        }
    }
}

impl GmailCredentials {
    #[inline]
    pub fn default_client_secret_path() -> PathBuf { PathBuf::from("gmail_client_secret.json") }

    #[inline]
    pub fn default_token_path() -> PathBuf {
        let token_dir = directories::UserDirs::new()
            .map_or_else(|| PathBuf::from(".credentials"), |dirs| dirs.home_dir().join(".credentials"));
        token_dir.join("gmail-nodejs-quickstart.json")
    }
}

impl Default for GmailCredentials {
    fn default() -> Self {
        Self::InstalledApplication {
            client_secret_path: Self::default_client_secret_path(),
            token_path: Self::default_token_path(),
            refresh_token: None,
        }
    }
}

impl From<GmailCredentials> for signup_gateway_core::config::GmailCredentials {
    fn from(credentials: GmailCredentials) -> Self {
        match credentials {
            GmailCredentials::InstalledApplication { client_secret_path, token_path, refresh_token } => {
                Self::InstalledApplication { client_secret_path, token_path, refresh_token }
            }
            GmailCredentials::DomainWideDelegation { impersonate_user } => {
                Self::DomainWideDelegation { impersonate_user }
            }
        }
    }
}
