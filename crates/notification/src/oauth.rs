//! OAuth2 installed-application credentials for the Gmail API.
//!
//! The token is kept as JSON on disk. A missing token file triggers the
//! authorization-code flow once; afterwards the stored token is reused and
//! refreshed in place whenever it expires.

use std::{
    fmt,
    path::{Path, PathBuf},
    sync::Arc,
};

use async_trait::async_trait;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use snafu::{OptionExt, ResultExt};
use tokio::{
    io::{AsyncBufReadExt, AsyncWriteExt, BufReader},
    sync::Mutex,
};

use crate::{error, Error};

/// Scopes requested during authorization.
pub const SCOPES: [&str; 4] = [
    "https://mail.google.com/",
    "https://www.googleapis.com/auth/gmail.modify",
    "https://www.googleapis.com/auth/gmail.compose",
    "https://www.googleapis.com/auth/gmail.send",
];

const OUT_OF_BAND_REDIRECT_URI: &str = "urn:ietf:wg:oauth:2.0:oob";

// refresh a little before the provider considers the token expired
const EXPIRY_SKEW_MILLIS: i64 = 60_000;

/// Client secret file as downloaded from the Google API console.
#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ClientSecret {
    Installed(ApplicationSecret),
    Web(ApplicationSecret),
}

impl ClientSecret {
    /// # Errors
    ///
    /// Returns an error if the file cannot be read (including when it does
    /// not exist) or is not a client secret document.
    pub async fn load(path: &Path) -> Result<Self, Error> {
        let content = tokio::fs::read(path).await.context(error::ReadClientSecretSnafu { path })?;
        serde_json::from_slice(&content).context(error::ParseClientSecretSnafu { path })
    }

    #[must_use]
    pub const fn application(&self) -> &ApplicationSecret {
        match self {
            Self::Installed(secret) | Self::Web(secret) => secret,
        }
    }
}

#[derive(Clone, Deserialize, Serialize)]
pub struct ApplicationSecret {
    pub client_id: String,

    pub client_secret: String,

    #[serde(default)]
    pub redirect_uris: Vec<String>,

    #[serde(default = "ApplicationSecret::default_auth_uri")]
    pub auth_uri: String,

    #[serde(default = "ApplicationSecret::default_token_uri")]
    pub token_uri: String,
}

impl fmt::Debug for ApplicationSecret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ApplicationSecret")
            .field("client_id", &self.client_id)
            .field("client_secret", &"<redacted>")
            .field("redirect_uris", &self.redirect_uris)
            .field("auth_uri", &self.auth_uri)
            .field("token_uri", &self.token_uri)
            .finish()
    }
}

impl ApplicationSecret {
    #[inline]
    #[must_use]
    pub fn default_auth_uri() -> String { "https://accounts.google.com/o/oauth2/auth".to_string() }

    #[inline]
    #[must_use]
    pub fn default_token_uri() -> String { "https://oauth2.googleapis.com/token".to_string() }

    #[must_use]
    pub fn redirect_uri(&self) -> &str {
        self.redirect_uris.first().map_or(OUT_OF_BAND_REDIRECT_URI, String::as_str)
    }

    /// URL the user visits to grant offline access to the Gmail scopes.
    ///
    /// # Errors
    ///
    /// Returns an error if `auth_uri` is not a valid URL.
    pub fn authorization_url(&self) -> Result<String, Error> {
        let scope = SCOPES.join(" ");
        reqwest::Url::parse_with_params(
            &self.auth_uri,
            &[
                ("access_type", "offline"),
                ("scope", scope.as_str()),
                ("response_type", "code"),
                ("client_id", self.client_id.as_str()),
                ("redirect_uri", self.redirect_uri()),
            ],
        )
        .map(String::from)
        .map_err(|err| Error::BuildAuthorizationUrl {
            auth_uri: self.auth_uri.clone(),
            message: err.to_string(),
        })
    }
}

/// Token document persisted between runs.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct StoredToken {
    #[serde(default)]
    pub access_token: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,

    #[serde(default = "StoredToken::default_token_type")]
    pub token_type: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scope: Option<String>,

    /// Milliseconds since the Unix epoch.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expiry_date: Option<i64>,
}

impl StoredToken {
    #[inline]
    #[must_use]
    pub fn default_token_type() -> String { "Bearer".to_string() }

    /// Token that only carries a refresh token; the first use refreshes it.
    #[must_use]
    pub fn from_refresh_token(refresh_token: String) -> Self {
        Self {
            access_token: String::new(),
            refresh_token: Some(refresh_token),
            token_type: Self::default_token_type(),
            scope: None,
            expiry_date: None,
        }
    }

    #[must_use]
    pub fn is_expired(&self, now_millis: i64) -> bool {
        self.access_token.is_empty()
            || self.expiry_date.is_some_and(|expiry| expiry - EXPIRY_SKEW_MILLIS <= now_millis)
    }

    /// Returns `None` when no token file exists.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read or parsed.
    pub async fn load(path: &Path) -> Result<Option<Self>, Error> {
        let content = match tokio::fs::read(path).await {
            Ok(content) => content,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(source) => return Err(Error::ReadToken { path: path.to_path_buf(), source }),
        };

        serde_json::from_slice(&content).map(Some).context(error::ParseTokenSnafu { path })
    }

    /// Writes the token, creating the parent directory when absent.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory or file cannot be written.
    pub async fn store(&self, path: &Path) -> Result<(), Error> {
        if let Some(dir) = path.parent().filter(|dir| !dir.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(dir)
                .await
                .context(error::CreateTokenDirectorySnafu { path: dir })?;
        }

        let content = serde_json::to_vec(self).context(error::SerializeTokenSnafu)?;
        tokio::fs::write(path, content).await.context(error::WriteTokenSnafu { path })
    }
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,

    #[serde(default)]
    expires_in: Option<i64>,

    #[serde(default)]
    refresh_token: Option<String>,

    #[serde(default)]
    scope: Option<String>,

    #[serde(default = "StoredToken::default_token_type")]
    token_type: String,
}

impl TokenResponse {
    fn into_stored_token(self, previous_refresh_token: Option<String>, now_millis: i64) -> StoredToken {
        StoredToken {
            access_token: self.access_token,
            refresh_token: self.refresh_token.or(previous_refresh_token),
            token_type: self.token_type,
            scope: self.scope,
            expiry_date: self.expires_in.map(|seconds| now_millis + seconds * 1000),
        }
    }
}

async fn request_token(
    http: &reqwest::Client,
    token_uri: &str,
    form: &[(&str, &str)],
) -> Result<TokenResponse, Error> {
    let response =
        http.post(token_uri).form(form).send().await.context(error::HttpRequestSnafu)?;

    let status = response.status();
    if !status.is_success() {
        let message = response.text().await.unwrap_or_default();
        return Err(Error::ExchangeToken { status: status.as_u16(), message });
    }

    response.json().await.context(error::HttpRequestSnafu)
}

/// Source of the authorization code the user obtains from the consent page.
#[async_trait]
pub trait AuthorizationCodeProvider: Send + Sync {
    /// # Errors
    ///
    /// Returns an error if no code could be obtained.
    async fn authorization_code(&self, authorization_url: &str) -> Result<String, Error>;
}

/// Prints the authorization URL and reads the code from standard input.
#[derive(Clone, Copy, Debug, Default)]
pub struct ConsolePrompt;

#[async_trait]
impl AuthorizationCodeProvider for ConsolePrompt {
    async fn authorization_code(&self, authorization_url: &str) -> Result<String, Error> {
        let mut stdout = tokio::io::stdout();
        let prompt = format!(
            "Authorize this app by visiting this url: {authorization_url}\nEnter the code from \
             that page here: "
        );
        stdout.write_all(prompt.as_bytes()).await.context(error::ReadAuthorizationCodeSnafu)?;
        stdout.flush().await.context(error::ReadAuthorizationCodeSnafu)?;

        let mut line = String::new();
        let read = BufReader::new(tokio::io::stdin())
            .read_line(&mut line)
            .await
            .context(error::ReadAuthorizationCodeSnafu)?;

        let code = line.trim();
        if read == 0 || code.is_empty() {
            return Err(Error::EmptyAuthorizationCode);
        }
        Ok(code.to_string())
    }
}

/// Turns a client secret and token file into an authorized token source.
#[derive(Clone, Debug)]
pub struct Authorizer {
    client_secret_path: PathBuf,
    token_path: PathBuf,
    refresh_token: Option<String>,
    http: reqwest::Client,
}

impl Authorizer {
    pub fn new(client_secret_path: impl Into<PathBuf>, token_path: impl Into<PathBuf>) -> Self {
        Self {
            client_secret_path: client_secret_path.into(),
            token_path: token_path.into(),
            refresh_token: None,
            http: reqwest::Client::new(),
        }
    }

    /// Pre-obtained refresh token used instead of prompting when no token
    /// file exists.
    #[must_use]
    pub fn with_refresh_token(mut self, refresh_token: Option<String>) -> Self {
        self.refresh_token = refresh_token;
        self
    }

    #[must_use]
    pub fn token_path(&self) -> &Path { &self.token_path }

    /// # Errors
    ///
    /// Returns an error if the client secret cannot be loaded, the token file
    /// is unreadable, or the authorization-code exchange fails.
    #[tracing::instrument(
        skip(self, provider),
        fields(
            client_secret_path = %self.client_secret_path.display(),
            token_path = %self.token_path.display()
        )
    )]
    pub async fn authorize<P>(&self, provider: &P) -> Result<RefreshingTokenSource, Error>
    where
        P: AuthorizationCodeProvider + ?Sized,
    {
        let secret = ClientSecret::load(&self.client_secret_path).await?.application().clone();

        let token = if let Some(token) = StoredToken::load(&self.token_path).await? {
            tracing::info!("Using stored Gmail token");
            token
        } else {
            let token = if let Some(refresh_token) = &self.refresh_token {
                tracing::info!("Using configured Gmail refresh token");
                StoredToken::from_refresh_token(refresh_token.clone())
            } else {
                let authorization_url = secret.authorization_url()?;
                let code = provider.authorization_code(&authorization_url).await?;
                self.exchange_code(&secret, &code).await?
            };

            token.store(&self.token_path).await?;
            tracing::info!("Token stored to {}", self.token_path.display());
            token
        };

        Ok(RefreshingTokenSource {
            http: self.http.clone(),
            secret,
            token_path: self.token_path.clone(),
            token: Arc::new(Mutex::new(token)),
        })
    }

    async fn exchange_code(&self, secret: &ApplicationSecret, code: &str) -> Result<StoredToken, Error> {
        let now = Utc::now().timestamp_millis();
        let response = request_token(
            &self.http,
            &secret.token_uri,
            &[
                ("code", code),
                ("client_id", secret.client_id.as_str()),
                ("client_secret", secret.client_secret.as_str()),
                ("redirect_uri", secret.redirect_uri()),
                ("grant_type", "authorization_code"),
            ],
        )
        .await?;

        Ok(response.into_stored_token(None, now))
    }
}

/// Token source backed by a stored token, refreshed and re-persisted when it
/// expires.
#[derive(Clone)]
pub struct RefreshingTokenSource {
    http: reqwest::Client,
    secret: ApplicationSecret,
    token_path: PathBuf,
    token: Arc<Mutex<StoredToken>>,
}

impl fmt::Debug for RefreshingTokenSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RefreshingTokenSource")
            .field("client_id", &self.secret.client_id)
            .field("token_path", &self.token_path)
            .finish_non_exhaustive()
    }
}

impl RefreshingTokenSource {
    /// Current access token, refreshed first when expired.
    ///
    /// # Errors
    ///
    /// Returns an error if a refresh is needed and fails.
    pub async fn access_token(&self) -> Result<String, Error> {
        let mut token = self.token.lock().await;
        let now = Utc::now().timestamp_millis();

        if token.is_expired(now) {
            let refresh_token =
                token.refresh_token.clone().context(error::MissingRefreshTokenSnafu)?;
            let response = request_token(
                &self.http,
                &self.secret.token_uri,
                &[
                    ("client_id", self.secret.client_id.as_str()),
                    ("client_secret", self.secret.client_secret.as_str()),
                    ("refresh_token", refresh_token.as_str()),
                    ("grant_type", "refresh_token"),
                ],
            )
            .await?;

            *token = response.into_stored_token(Some(refresh_token), now);
            token.store(&self.token_path).await?;
            tracing::debug!("Refreshed Gmail access token");
        }

        Ok(token.access_token.clone())
    }
}

#[async_trait]
impl google_cloud_token::TokenSource for RefreshingTokenSource {
    async fn token(&self) -> Result<String, Box<dyn std::error::Error + Send + Sync>> {
        let access_token = self.access_token().await?;
        Ok(format!("Bearer {access_token}"))
    }
}
