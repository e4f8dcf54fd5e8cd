use std::io::Write;

use signup_gateway_core::config::{GraphqlConfig, PostgresConfig};
use snafu::ResultExt;
use tokio::runtime::Runtime;

use crate::{
    config::Config,
    error,
    error::{Error, Result},
};

/// Introspects the configured schema and writes the generated GraphQL SDL to
/// stdout.
#[allow(clippy::result_large_err)]
pub fn print_schema(config: Config) -> Result<()> {
    let postgres: PostgresConfig = config.postgres.into();
    let graphql: GraphqlConfig = config.graphql.into();

    let sdl = Runtime::new().context(error::InitializeTokioRuntimeSnafu)?.block_on(async move {
        signup_gateway_server::print_schema(&postgres, &graphql).await.map_err(Error::from)
    })?;

    std::io::stdout().write_all(sdl.as_bytes()).context(error::WriteStdoutSnafu)
}
