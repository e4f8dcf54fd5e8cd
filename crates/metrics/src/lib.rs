pub mod error;
mod server;
mod traits;

pub use self::{
    error::Error,
    server::{router, start_metrics_server},
    traits::Metrics,
};

/// Metrics backed by one Prometheus registry whose metric names share a
/// common namespace prefix.
#[derive(Clone, Debug)]
pub struct DefaultMetrics {
    registry: prometheus::Registry,
}

impl DefaultMetrics {
    /// # Errors
    ///
    /// Returns an error if `namespace` is empty.
    pub fn new(namespace: &str) -> Result<Self, Error> {
        let registry = prometheus::Registry::new_custom(Some(namespace.to_string()), None)
            .map_err(|source| Error::CreateRegistry { namespace: namespace.to_string(), source })?;

        Ok(Self { registry })
    }

    /// Registry on which callers register their collectors.
    #[must_use]
    pub const fn registry(&self) -> &prometheus::Registry { &self.registry }
}

impl Metrics for DefaultMetrics {
    fn gather(&self) -> Vec<prometheus::proto::MetricFamily> { self.registry.gather() }
}
