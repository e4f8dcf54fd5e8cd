use std::{fmt, net::SocketAddr, path::PathBuf, time::Duration};

use sqlx::postgres::PgSslMode;

#[derive(Clone, Debug)]
pub struct Config {
    pub web: WebConfig,

    pub postgres: PostgresConfig,

    pub metrics: MetricsConfig,

    pub graphql: GraphqlConfig,

    pub sign_up: SignUpConfig,

    pub gmail: GmailConfig,
}

#[derive(Clone, Debug)]
pub struct WebConfig {
    pub listen_address: SocketAddr,

    pub graphiql: bool,
}

#[derive(Clone, Debug)]
pub struct MetricsConfig {
    pub enable: bool,

    pub listen_address: SocketAddr,
}

#[derive(Clone)]
pub struct PostgresConfig {
    pub host: String,

    pub port: u16,

    pub database: String,

    pub username: String,

    pub password: String,

    pub role: Option<String>,

    pub ssl_mode: PgSslMode,

    pub max_connections: u32,

    pub application_name: Option<String>,
}

impl fmt::Debug for PostgresConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PostgresConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("database", &self.database)
            .field("username", &self.username)
            .field("role", &self.role)
            .field("ssl_mode", &self.ssl_mode)
            .field("max_connections", &self.max_connections)
            .field("application_name", &self.application_name)
            .finish_non_exhaustive()
    }
}

#[derive(Clone)]
pub struct GraphqlConfig {
    /// Postgres schema exposed through GraphQL.
    pub schema: String,

    /// Composite type signed into a JWT when a function returns it.
    pub jwt_type_identifier: String,

    pub jwt_secret: Option<String>,

    pub jwt_audience: String,

    /// Role applied to requests without a token.
    pub default_role: Option<String>,

    pub default_page_size: Option<u32>,

    /// Re-introspect the catalog on this interval.
    pub watch_interval: Option<Duration>,
}

impl fmt::Debug for GraphqlConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GraphqlConfig")
            .field("schema", &self.schema)
            .field("jwt_type_identifier", &self.jwt_type_identifier)
            .field("jwt_audience", &self.jwt_audience)
            .field("default_role", &self.default_role)
            .field("default_page_size", &self.default_page_size)
            .field("watch_interval", &self.watch_interval)
            .finish_non_exhaustive()
    }
}

#[derive(Clone, Debug)]
pub struct SignUpConfig {
    pub enable: bool,

    pub channel: String,

    /// Parameterized lookup returning `first_name` and `last_name`; `$1` is
    /// the user id as text.
    pub user_query: String,

    pub max_concurrent_deliveries: usize,

    pub delivery_timeout: Duration,

    pub retry: RetryConfig,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct RetryConfig {
    pub max_attempts: u32,

    pub initial_backoff: Duration,

    pub max_backoff: Duration,
}

#[derive(Clone, Debug)]
pub struct GmailConfig {
    pub from_address: String,

    pub credentials: GmailCredentials,
}

#[derive(Clone, Debug)]
pub enum GmailCredentials {
    InstalledApplication {
        client_secret_path: PathBuf,

        token_path: PathBuf,

        refresh_token: Option<String>,
    },

    DomainWideDelegation {
        impersonate_user: String,
    },
}
