use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_with::{serde_as, DurationSeconds};
use signup_gateway_core::DEFAULT_JWT_AUDIENCE;

#[serde_as]
#[derive(Clone, Deserialize, Serialize)]
pub struct GraphqlConfig {
    /// Postgres schema exposed through GraphQL.
    #[serde(default = "GraphqlConfig::default_schema")]
    pub schema: String,

    /// `schema.type` of the composite returned by login functions; defaults to
    /// `<schema>.jwt`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub jwt_type_identifier: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub jwt_secret: Option<String>,

    #[serde(default = "GraphqlConfig::default_jwt_audience")]
    pub jwt_audience: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_role: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_page_size: Option<u32>,

    /// Seconds between catalog checks; `null` disables watching.
    #[serde_as(as = "Option<DurationSeconds<u64>>")]
    #[serde(default = "GraphqlConfig::default_watch_interval", rename = "watch_interval_secs")]
    pub watch_interval: Option<Duration>,
}

impl std::fmt::Debug for GraphqlConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GraphqlConfig")
            .field("schema", &self.schema)
            .field("jwt_type_identifier", &self.jwt_type_identifier)
            .field("jwt_secret", &self.jwt_secret.as_ref().map(|_| "<redacted>"))
            .field("jwt_audience", &self.jwt_audience)
            .field("default_role", &self.default_role)
            .field("default_page_size", &self.default_page_size)
            .field("watch_interval", &self.watch_interval)
            .finish()
    }
}

impl GraphqlConfig {
    #[inline]
    pub fn default_schema() -> String { "public".to_string() }

    #[inline]
    pub fn default_jwt_audience() -> String { DEFAULT_JWT_AUDIENCE.to_string() }

    #[inline]
    pub const fn default_watch_interval() -> Option<Duration> { Some(Duration::from_secs(30)) }
}

impl Default for GraphqlConfig {
    fn default() -> Self {
        Self {
            schema: Self::default_schema(),
            jwt_type_identifier: None,
            jwt_secret: None,
            jwt_audience: Self::default_jwt_audience(),
            default_role: None,
            default_page_size: None,
            watch_interval: Self::default_watch_interval(),
        }
    }
}

impl From<GraphqlConfig> for signup_gateway_core::config::GraphqlConfig {
    fn from(
        GraphqlConfig {
            schema,
            jwt_type_identifier,
            jwt_secret,
            jwt_audience,
            default_role,
            default_page_size,
            watch_interval,
        }: GraphqlConfig,
    ) -> Self {
        Self {
            jwt_type_identifier: jwt_type_identifier.unwrap_or_else(|| format!("{schema}.jwt")),
            schema,
            jwt_secret,
            jwt_audience,
            default_role,
            default_page_size,
            watch_interval,
        }
    }
}
