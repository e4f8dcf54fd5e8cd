//! Collectors of the sign-up listener and the GraphQL endpoint.

use prometheus::{IntCounter, IntCounterVec, Opts, Registry};

#[derive(Clone, Debug)]
pub struct SignUpMetrics {
    pub received: IntCounter,

    pub delivered: IntCounter,

    /// Notifications given up on, labelled by reason.
    pub dropped: IntCounterVec,

    pub send_retries: IntCounter,
}

impl SignUpMetrics {
    /// # Errors
    ///
    /// Returns an error if a collector with the same name is already registered.
    pub fn register(registry: &Registry) -> Result<Self, prometheus::Error> {
        let metrics = Self::unregistered()?;
        registry.register(Box::new(metrics.received.clone()))?;
        registry.register(Box::new(metrics.delivered.clone()))?;
        registry.register(Box::new(metrics.dropped.clone()))?;
        registry.register(Box::new(metrics.send_retries.clone()))?;
        Ok(metrics)
    }

    /// Collectors that are counted but never exported.
    ///
    /// # Errors
    ///
    /// Returns an error only if the metric definitions are invalid.
    pub fn unregistered() -> Result<Self, prometheus::Error> {
        Ok(Self {
            received: IntCounter::new(
                "sign_up_notifications_received_total",
                "Sign-up notifications received",
            )?,
            delivered: IntCounter::new(
                "activation_emails_sent_total",
                "Activation emails accepted by the mail provider",
            )?,
            dropped: IntCounterVec::new(
                Opts::new("sign_up_notifications_dropped_total", "Sign-up notifications dropped"),
                &["reason"],
            )?,
            send_retries: IntCounter::new(
                "activation_email_retries_total",
                "Retried activation email submissions",
            )?,
        })
    }
}

#[derive(Clone, Debug)]
pub struct GraphqlMetrics {
    /// Requests labelled by `ok`, `error` or `unauthorized`.
    pub requests: IntCounterVec,

    pub schema_rebuilds: IntCounter,
}

impl GraphqlMetrics {
    /// # Errors
    ///
    /// Returns an error if a collector with the same name is already registered.
    pub fn register(registry: &Registry) -> Result<Self, prometheus::Error> {
        let metrics = Self::unregistered()?;
        registry.register(Box::new(metrics.requests.clone()))?;
        registry.register(Box::new(metrics.schema_rebuilds.clone()))?;
        Ok(metrics)
    }

    /// # Errors
    ///
    /// Returns an error only if the metric definitions are invalid.
    pub fn unregistered() -> Result<Self, prometheus::Error> {
        Ok(Self {
            requests: IntCounterVec::new(
                Opts::new("graphql_requests_total", "GraphQL requests by outcome"),
                &["outcome"],
            )?,
            schema_rebuilds: IntCounter::new(
                "graphql_schema_rebuilds_total",
                "Schema rebuilds after a catalog change",
            )?,
        })
    }
}
