use std::borrow::Cow;

use snafu::Snafu;

use crate::{graphql, service, web};

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum Error {
    #[snafu(display(
        "Can not initialize Postgres pool with endpoint \
         `postgres://{username}@{host}:{port}/{database}`, error: {source}"
    ))]
    InitializePostgresPool {
        host: Cow<'static, str>,
        port: u16,
        username: Cow<'static, str>,
        database: Cow<'static, str>,
        source: sqlx::error::Error,
    },

    #[snafu(display("{source}"))]
    Metrics { source: gateway_metrics::Error },

    #[snafu(display("Fail to register metrics, error: {source}"))]
    RegisterMetrics { source: prometheus::Error },

    #[snafu(display("{source}"))]
    Graphql { source: graphql::Error },

    #[snafu(display("{source}"))]
    Service { source: service::Error },

    #[snafu(display("{source}"))]
    Web { source: web::Error },

    #[snafu(display("Fail to initialize Gmail client, error: {source}"))]
    InitializeNotificationClient { source: notification::Error },
}

impl From<gateway_metrics::Error> for Error {
    fn from(source: gateway_metrics::Error) -> Self { Self::Metrics { source } }
}

impl From<graphql::Error> for Error {
    fn from(source: graphql::Error) -> Self { Self::Graphql { source } }
}

impl From<service::Error> for Error {
    fn from(source: service::Error) -> Self { Self::Service { source } }
}

impl From<web::Error> for Error {
    fn from(source: web::Error) -> Self { Self::Web { source } }
}
