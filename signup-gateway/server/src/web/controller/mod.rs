mod error;
pub mod graphql;

use axum::Extension;
use gateway_axum::response::EncapsulatedJson;
use signup_gateway_core::ServerInfo;

pub use self::error::{Error, Result};

pub async fn server_info(
    Extension(server_info): Extension<ServerInfo>,
) -> Result<EncapsulatedJson<ServerInfo>> {
    Ok(EncapsulatedJson::ok(server_info))
}
