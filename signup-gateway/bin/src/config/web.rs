use std::net::SocketAddr;

use serde::{Deserialize, Serialize};
use signup_gateway_core::{DEFAULT_WEB_HOST, DEFAULT_WEB_PORT};

#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct WebConfig {
    #[serde(default = "WebConfig::default_listen_address")]
    pub listen_address: SocketAddr,

    #[serde(default = "WebConfig::default_graphiql")]
    pub graphiql: bool,
}

impl WebConfig {
    #[inline]
    pub const fn default_listen_address() -> SocketAddr {
        SocketAddr::new(DEFAULT_WEB_HOST, DEFAULT_WEB_PORT)
    }

    #[inline]
    pub const fn default_graphiql() -> bool { true }
}

impl Default for WebConfig {
    fn default() -> Self {
        Self { listen_address: Self::default_listen_address(), graphiql: Self::default_graphiql() }
    }
}

impl From<WebConfig> for signup_gateway_core::config::WebConfig {
    fn from(WebConfig { listen_address, graphiql }: WebConfig) -> Self {
        Self { listen_address, graphiql }
    }
}
