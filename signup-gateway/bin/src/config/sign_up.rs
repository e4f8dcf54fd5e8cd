use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_with::{serde_as, DurationMilliSeconds, DurationSeconds};
use signup_gateway_core::{DEFAULT_SIGN_UP_CHANNEL, DEFAULT_USER_QUERY};

#[serde_as]
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct SignUpConfig {
    /// Runs the listener next to the GraphQL gateway.
    #[serde(default = "SignUpConfig::default_enable")]
    pub enable: bool,

    #[serde(default = "SignUpConfig::default_channel")]
    pub channel: String,

    /// Must select `first_name` and `last_name`; `$1` is the user id as text.
    #[serde(default = "SignUpConfig::default_user_query")]
    pub user_query: String,

    #[serde(default = "SignUpConfig::default_max_concurrent_deliveries")]
    pub max_concurrent_deliveries: usize,

    #[serde_as(as = "DurationSeconds<u64>")]
    #[serde(default = "SignUpConfig::default_delivery_timeout", rename = "delivery_timeout_secs")]
    pub delivery_timeout: Duration,

    #[serde(default)]
    pub retry: RetryConfig,
}

impl SignUpConfig {
    #[inline]
    pub const fn default_enable() -> bool { true }

    #[inline]
    pub fn default_channel() -> String { DEFAULT_SIGN_UP_CHANNEL.to_string() }

    #[inline]
    pub fn default_user_query() -> String { DEFAULT_USER_QUERY.to_string() }

    #[inline]
    pub const fn default_max_concurrent_deliveries() -> usize { 16 }

    #[inline]
    pub const fn default_delivery_timeout() -> Duration { Duration::from_secs(60) }
}

impl Default for SignUpConfig {
    fn default() -> Self {
        Self {
            enable: Self::default_enable(),
            channel: Self::default_channel(),
            user_query: Self::default_user_query(),
            max_concurrent_deliveries: Self::default_max_concurrent_deliveries(),
            delivery_timeout: Self::default_delivery_timeout(),
            retry: RetryConfig::default(),
        }
    }
}

impl From<SignUpConfig> for signup_gateway_core::config::SignUpConfig {
    fn from(
        SignUpConfig {
            enable,
            channel,
            user_query,
            max_concurrent_deliveries,
            delivery_timeout,
            retry,
        }: SignUpConfig,
    ) -> Self {
        Self {
            enable,
            channel,
            user_query,
            max_concurrent_deliveries,
            delivery_timeout,
            retry: retry.into(),
        }
    }
}

#[serde_as]
#[derive(Clone, Copy, Debug, Deserialize, Serialize)]
pub struct RetryConfig {
    #[serde(default = "RetryConfig::default_max_attempts")]
    pub max_attempts: u32,

    #[serde_as(as = "DurationMilliSeconds<u64>")]
    #[serde(default = "RetryConfig::default_initial_backoff", rename = "initial_backoff_ms")]
    pub initial_backoff: Duration,

    #[serde_as(as = "DurationMilliSeconds<u64>")]
    #[serde(default = "RetryConfig::default_max_backoff", rename = "max_backoff_ms")]
    pub max_backoff: Duration,
}

impl RetryConfig {
    #[inline]
    pub const fn default_max_attempts() -> u32 { 3 }

    #[inline]
    pub const fn default_initial_backoff() -> Duration { Duration::from_millis(500) }

    #[inline]
    pub const fn default_max_backoff() -> Duration { Duration::from_secs(10) }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: Self::default_max_attempts(),
            initial_backoff: Self::default_initial_backoff(),
            max_backoff: Self::default_max_backoff(),
        }
    }
}

impl From<RetryConfig> for signup_gateway_core::config::RetryConfig {
    fn from(RetryConfig { max_attempts, initial_backoff, max_backoff }: RetryConfig) -> Self {
        Self { max_attempts, initial_backoff, max_backoff }
    }
}
