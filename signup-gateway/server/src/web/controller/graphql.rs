use std::net::SocketAddr;

use async_graphql::http::GraphiQLSource;
use async_graphql_axum::{GraphQLRequest, GraphQLResponse};
use axum::{
    extract::{ConnectInfo, State},
    http::{header, HeaderMap},
    response::Html,
};

use super::{Error, Result};
use crate::ServiceState;

pub async fn execute(
    State(service_state): State<ServiceState>,
    connect_info: Option<ConnectInfo<SocketAddr>>,
    headers: HeaderMap,
    request: GraphQLRequest,
) -> Result<GraphQLResponse> {
    if let Some(ConnectInfo(addr)) = connect_info {
        tracing::debug!(client_ip = %gateway_axum::get_request_ip(&headers, &addr), "GraphQL request");
    }

    let token = bearer_token(&headers)?;
    let response = service_state.graphql.execute(request.into_inner(), token).await?;
    Ok(response.into())
}

// SAFETY: `axum` handler must be async
#[allow(clippy::unused_async)]
pub async fn graphiql() -> Html<String> {
    Html(GraphiQLSource::build().endpoint("/graphql").title("signup-gateway").finish())
}

/// Token of an `Authorization: Bearer <token>` header.
fn bearer_token(headers: &HeaderMap) -> Result<Option<&str>> {
    let Some(value) = headers.get(header::AUTHORIZATION) else {
        return Ok(None);
    };

    let value = value.to_str().map_err(|_| Error::MalformedAuthorization)?;
    match value.split_once(' ') {
        Some((scheme, token)) if scheme.eq_ignore_ascii_case("bearer") && !token.trim().is_empty() => {
            Ok(Some(token.trim()))
        }
        _ => Err(Error::MalformedAuthorization),
    }
}

#[cfg(test)]
mod tests {
    use axum::http::HeaderValue;

    use super::*;

    #[test]
    fn test_bearer_token() {
        let mut headers = HeaderMap::new();
        assert_eq!(bearer_token(&headers).unwrap(), None);

        drop(headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Bearer abc.def")));
        assert_eq!(bearer_token(&headers).unwrap(), Some("abc.def"));

        drop(headers.insert(header::AUTHORIZATION, HeaderValue::from_static("bearer  xyz ")));
        assert_eq!(bearer_token(&headers).unwrap(), Some("xyz"));

        for malformed in ["Basic dXNlcjpwYXNz", "Bearer", "Bearer   "] {
            drop(headers.insert(header::AUTHORIZATION, HeaderValue::from_static(malformed)));
            assert!(matches!(bearer_token(&headers), Err(Error::MalformedAuthorization)), "{malformed}");
        }
    }
}
