use snafu::Snafu;

use crate::service;

#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum Error {
    #[snafu(display("{source}"))]
    Service { source: service::Error },

    #[snafu(display("Fail to build GraphQL schema, error: {message}"))]
    BuildSchema { message: String },

    #[snafu(display("A JWT was supplied but no JWT secret is configured"))]
    MissingJwtSecret,

    #[snafu(display("Invalid JWT, error: {source}"))]
    InvalidToken { source: jsonwebtoken::errors::Error },

    #[snafu(display("Fail to begin request transaction, error: {source}"))]
    BeginSession { source: sqlx::Error },

    #[snafu(display("Fail to finish request transaction, error: {source}"))]
    FinishSession { source: sqlx::Error },
}

impl From<service::Error> for Error {
    fn from(source: service::Error) -> Self { Self::Service { source } }
}
