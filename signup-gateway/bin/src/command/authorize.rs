use notification::oauth;
use snafu::ResultExt;
use tokio::runtime::Runtime;

use crate::{
    config::{Config, GmailCredentials},
    error,
    error::Result,
};

/// Runs the installed-application consent flow once and stores the token, so
/// the server can start without a terminal.
#[allow(clippy::result_large_err)]
pub fn authorize_gmail(config: Config) -> Result<()> {
    config.log.try_init().context(error::InitializeLoggerSnafu)?;

    let GmailCredentials::InstalledApplication { client_secret_path, token_path, refresh_token } =
        config.gmail.credentials
    else {
        return error::UnsupportedCredentialsSnafu.fail();
    };

    let authorizer = oauth::Authorizer::new(client_secret_path, token_path)
        .with_refresh_token(refresh_token);

    let runtime = Runtime::new().context(error::InitializeTokioRuntimeSnafu)?;
    let token_source = runtime
        .block_on(authorizer.authorize(&oauth::ConsolePrompt))
        .context(error::AuthorizeSnafu)?;
    let _access_token =
        runtime.block_on(token_source.access_token()).context(error::AuthorizeSnafu)?;

    tracing::info!(
        "Gmail access is authorized, token is kept at {}",
        authorizer.token_path().display()
    );
    Ok(())
}
