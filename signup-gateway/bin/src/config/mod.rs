mod error;
mod gmail;
mod graphql;
mod metrics;
mod postgres;
mod sign_up;
mod web;

use std::path::{Path, PathBuf};

use gateway_cli_common::config::LogConfig;
use resolve_path::PathResolveExt;
use serde::{Deserialize, Serialize};
use snafu::{OptionExt, ResultExt};

pub use self::{
    error::Error,
    gmail::{GmailConfig, GmailCredentials},
    graphql::GraphqlConfig,
    metrics::MetricsConfig,
    postgres::PostgresConfig,
    sign_up::{RetryConfig, SignUpConfig},
    web::WebConfig,
};

#[derive(Clone, Debug, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub log: LogConfig,

    #[serde(default)]
    pub web: WebConfig,

    #[serde(default)]
    pub postgres: PostgresConfig,

    #[serde(default)]
    pub metrics: MetricsConfig,

    #[serde(default)]
    pub graphql: GraphqlConfig,

    #[serde(default)]
    pub sign_up: SignUpConfig,

    #[serde(default)]
    pub gmail: GmailConfig,
}

impl Config {
    #[inline]
    pub fn default_path() -> PathBuf {
        [
            signup_gateway_core::PROJECT_CONFIG_DIR.to_path_buf(),
            PathBuf::from(signup_gateway_core::CONFIG_NAME),
        ]
        .into_iter()
        .collect()
    }

    /// First existing file among the default path and the fallback
    /// directories.
    pub fn search_path() -> Option<PathBuf> {
        std::iter::once(Self::default_path())
            .chain(
                signup_gateway_core::fallback_project_config_directories()
                    .into_iter()
                    .map(|dir| dir.join(signup_gateway_core::CONFIG_NAME)),
            )
            .find(|path| path.is_file())
    }

    #[inline]
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, Error> {
        let data = std::fs::read_to_string(&path)
            .context(error::OpenConfigSnafu { filename: path.as_ref().to_path_buf() })?;

        serde_yaml::from_str(&data)
            .context(error::ParseConfigSnafu { filename: path.as_ref().to_path_buf() })
    }

    /// Overrides file values with the well-known environment variables.
    pub fn apply_environment<F>(&mut self, lookup: F) -> Result<(), Error>
    where
        F: Fn(&str) -> Option<String>,
    {
        let first = |names: &[&str]| names.iter().find_map(|name| lookup(name));

        if let Some(username) = lookup("POSTGRES_USERNAME") {
            self.postgres.username = username;
        }
        if let Some(password) = lookup("POSTGRES_PASSWORD") {
            self.postgres.password = password;
        }
        if let Some(host) = lookup("POSTGRES_HOST") {
            self.postgres.host = host;
        }
        if let Some(port) = lookup("POSTGRES_PORT") {
            self.postgres.port = parse_port("POSTGRES_PORT", port)?;
        }
        if let Some(database) = lookup("POSTGRES_DATABASE") {
            self.postgres.database = database;
        }
        if let Some(schema) = first(&["POSTGRAPHILE_SCHEMA", "POSTGRAPHQL_SCHEMA"]) {
            self.graphql.schema = schema;
        }
        if let Some(secret) = lookup("JWT_SECRET") {
            self.graphql.jwt_secret = Some(secret);
        }
        if let Some(role) = first(&["POSTGRAPHILE_DEFAULT_ROLE", "POSTGRAPHQL_DEFAULT_ROLE"]) {
            self.graphql.default_role = Some(role);
        }
        if let Some(from_address) = lookup("FROM_EMAIL") {
            self.gmail.from_address = Some(from_address);
        }
        if let Some(port) = lookup("PORT") {
            self.web.listen_address.set_port(parse_port("PORT", port)?);
        }

        Ok(())
    }

    /// Expands `~` in every configured file path.
    pub fn resolve_paths(&mut self) -> Result<(), Error> {
        if let Some(path) = self.log.file_path.take() {
            self.log.file_path = Some(resolve(path)?);
        }
        if let GmailCredentials::InstalledApplication { client_secret_path, token_path, .. } =
            &mut self.gmail.credentials
        {
            *client_secret_path = resolve(std::mem::take(client_secret_path))?;
            *token_path = resolve(std::mem::take(token_path))?;
        }
        Ok(())
    }
}

fn resolve(path: PathBuf) -> Result<PathBuf, Error> {
    path.try_resolve()
        .map(|resolved| resolved.to_path_buf())
        .with_context(|_| error::ResolveFilePathSnafu { file_path: path.clone() })
}

fn parse_port(name: &str, value: String) -> Result<u16, Error> {
    value.parse().ok().with_context(|| error::InvalidEnvironmentVariableSnafu {
        name: name.to_string(),
        value: value.clone(),
    })
}

impl TryFrom<Config> for signup_gateway_core::config::Config {
    type Error = Error;

    fn try_from(
        Config { web, postgres, metrics, graphql, sign_up, gmail, .. }: Config,
    ) -> Result<Self, Self::Error> {
        if graphql.watch_interval.is_some_and(|interval| interval.is_zero()) {
            return error::ZeroDurationSnafu { field: "graphql.watch_interval_secs" }.fail();
        }
        if sign_up.delivery_timeout.is_zero() {
            return error::ZeroDurationSnafu { field: "sign_up.delivery_timeout_secs" }.fail();
        }

        let from_address = match (&gmail.from_address, &gmail.credentials) {
            (Some(from_address), _) => from_address.clone(),
            (None, GmailCredentials::DomainWideDelegation { impersonate_user }) => {
                impersonate_user.clone()
            }
            (None, GmailCredentials::InstalledApplication { .. }) if sign_up.enable => {
                return error::MissingFromAddressSnafu.fail();
            }
            (None, GmailCredentials::InstalledApplication { .. }) => String::new(),
        };

        Ok(Self {
            web: web.into(),
            postgres: postgres.into(),
            metrics: metrics.into(),
            graphql: graphql.into(),
            sign_up: sign_up.into(),
            gmail: signup_gateway_core::config::GmailConfig {
                from_address,
                credentials: gmail.credentials.into(),
            },
        })
    }
}
