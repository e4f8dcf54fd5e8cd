pub mod controller;
pub mod error;

use std::{future::Future, net::SocketAddr};

use axum::{
    extract::Request,
    http::{self, header, HeaderName, Method},
    routing, Extension, Router, ServiceExt,
};
use gateway_axum::json_response;
use signup_gateway_core::ServerInfo;
use snafu::ResultExt;
use tokio::net::TcpListener;
use tower::{Layer, ServiceBuilder};
use tower_http::{
    compression::CompressionLayer,
    cors::{Any, CorsLayer},
    normalize_path::NormalizePathLayer,
    trace::TraceLayer,
};

pub use self::error::Error;
use crate::graphql::GraphqlService;

pub async fn new_api_server<ShutdownSignal>(
    socket_address: SocketAddr,
    service_state: ServiceState,
    server_info: ServerInfo,
    shutdown_signal: ShutdownSignal,
) -> Result<(), Error>
where
    ShutdownSignal: Future<Output = ()> + Send + 'static,
{
    let router = {
        let router = NormalizePathLayer::trim_trailing_slash().layer(router(service_state, server_info));
        ServiceExt::<Request>::into_make_service_with_connect_info::<SocketAddr>(router)
    };

    let listener = TcpListener::bind(&socket_address).await.context(error::BindTcpServerSnafu)?;
    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal)
        .await
        .map_err(|err| Error::ServeHttpServer { message: err.to_string() })
}

/// Routes of the gateway. Every response, including the fallback, carries
/// the CORS headers.
pub fn router(service_state: ServiceState, server_info: ServerInfo) -> Router {
    let middleware_stack = ServiceBuilder::new()
        .layer(TraceLayer::new_for_http())
        .layer(cors_layer())
        .layer(CompressionLayer::new());

    let router = Router::new()
        .route("/", routing::get(controller::server_info))
        .route("/graphql", routing::post(controller::graphql::execute));
    let router = if service_state.graphiql {
        router.route("/graphiql", routing::get(controller::graphql::graphiql))
    } else {
        router
    };

    router
        .fallback(fallback)
        .with_state(service_state)
        .layer(Extension(server_info))
        .layer(middleware_stack)
}

fn cors_layer() -> CorsLayer {
    CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([
            header::ORIGIN,
            HeaderName::from_static("x-requested-with"),
            header::CONTENT_TYPE,
            header::ACCEPT,
            header::AUTHORIZATION,
        ])
}

// SAFETY: `axum` handler must be async
#[allow(clippy::unused_async)]
async fn fallback(uri: http::Uri) -> axum::response::Response {
    json_response! {
        status: http::StatusCode::NOT_FOUND,
        error: gateway_axum::response::Error::new(
            gateway_axum::response::ErrorType::NotFound,
            format!("No route for {uri}"),
        )
    }
}

#[derive(Clone)]
pub struct ServiceState {
    pub graphql: GraphqlService,

    /// Mounts `GET /graphiql`.
    pub graphiql: bool,
}

impl ServiceState {
    #[must_use]
    pub const fn new(graphql: GraphqlService, graphiql: bool) -> Self { Self { graphql, graphiql } }
}
