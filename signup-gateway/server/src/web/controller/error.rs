use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use gateway_axum::{json_response, response};
use snafu::Snafu;

use crate::graphql;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum Error {
    #[snafu(display("{source}"))]
    Graphql { source: graphql::Error },

    #[snafu(display("Authorization header is not of the correct bearer scheme format"))]
    MalformedAuthorization,
}

impl From<graphql::Error> for Error {
    fn from(source: graphql::Error) -> Self { Self::Graphql { source } }
}

impl IntoResponse for Error {
    // SAFETY: allow: high cognitive complexity caused by `tracing` macro
    #[allow(clippy::cognitive_complexity)]
    fn into_response(self) -> Response {
        let (status, type_) = match &self {
            Self::MalformedAuthorization => (StatusCode::BAD_REQUEST, response::ErrorType::BadRequest),
            Self::Graphql {
                source: graphql::Error::InvalidToken { .. } | graphql::Error::MissingJwtSecret,
            } => (StatusCode::UNAUTHORIZED, response::ErrorType::Unauthorized),
            Self::Graphql { source: graphql::Error::BeginSession { .. } } => {
                (StatusCode::SERVICE_UNAVAILABLE, response::ErrorType::ServiceUnavailable)
            }
            Self::Graphql { .. } => (StatusCode::INTERNAL_SERVER_ERROR, response::ErrorType::Internal),
        };

        let message = self.to_string();
        json_response! {
            reason: self,
            status: status,
            error: response::Error::new(type_, message)
        }
    }
}
