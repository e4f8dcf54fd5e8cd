use std::{future::Future, net::SocketAddr};

use axum::{
    extract::State,
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing, Router,
};
use prometheus::{Encoder, TextEncoder};
use snafu::ResultExt;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;

use crate::{error, Error, Metrics};

/// Router exposing `GET /metrics` in the Prometheus text format.
pub fn router<M>(metrics: M) -> Router
where
    M: Metrics + 'static,
{
    Router::new()
        .route("/metrics", routing::get(export::<M>))
        .layer(TraceLayer::new_for_http())
        .with_state(metrics)
}

/// # Errors
///
/// Returns an error if the listener cannot be bound or the server fails.
pub async fn start_metrics_server<M, ShutdownSignal>(
    listen_address: SocketAddr,
    metrics: M,
    shutdown_signal: ShutdownSignal,
) -> Result<(), Error>
where
    M: Metrics + 'static,
    ShutdownSignal: Future<Output = ()> + Send + 'static,
{
    let listener = TcpListener::bind(&listen_address).await.context(error::BindMetricsServerSnafu)?;

    axum::serve(listener, router(metrics))
        .with_graceful_shutdown(shutdown_signal)
        .await
        .context(error::ServeMetricsServerSnafu)
}

// SAFETY: `axum` handler must be async
#[allow(clippy::unused_async)]
async fn export<M: Metrics>(State(metrics): State<M>) -> Response {
    let encoder = TextEncoder::new();
    let mut buffer = Vec::new();

    if let Err(err) = encoder.encode(&metrics.gather(), &mut buffer) {
        tracing::error!("Failed to encode metrics, error: {err}");
        return StatusCode::INTERNAL_SERVER_ERROR.into_response();
    }

    ([(header::CONTENT_TYPE, encoder.format_type().to_string())], buffer).into_response()
}

#[cfg(test)]
mod tests {
    use axum_test::TestServer;

    use crate::DefaultMetrics;

    #[tokio::test]
    async fn test_export_text_format() {
        let metrics = DefaultMetrics::new("signup_gateway").unwrap();
        let counter = prometheus::IntCounter::new("emails_sent_total", "sent emails").unwrap();
        metrics.registry().register(Box::new(counter.clone())).unwrap();
        counter.inc_by(3);

        let server = TestServer::new(super::router(metrics)).unwrap();
        let response = server.get("/metrics").await;

        response.assert_status_ok();
        assert!(response.text().contains("signup_gateway_emails_sent_total 3"));
    }
}
