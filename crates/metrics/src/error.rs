use snafu::Snafu;

#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum Error {
    #[snafu(display("Could not create metrics registry with namespace `{namespace}`, error: {source}"))]
    CreateRegistry { namespace: String, source: prometheus::Error },

    #[snafu(display("Error occurs while binding metrics server, error: {source}"))]
    BindMetricsServer { source: std::io::Error },

    #[snafu(display("Error occurs while serving metrics server, error: {source}"))]
    ServeMetricsServer { source: std::io::Error },
}
