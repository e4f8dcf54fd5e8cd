use snafu::Snafu;
use tracing_subscriber::util::TryInitError;

use crate::config;

/// Result type alias for the CLI.
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Error type for the CLI.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum Error {
    #[snafu(display("{source}"))]
    Application { source: signup_gateway_server::Error },

    #[snafu(display("Could not initialize tokio runtime, error: {source}"))]
    InitializeTokioRuntime { source: tokio::io::Error },

    #[snafu(display("Could not initialize logger, error: {source}"))]
    InitializeLogger { source: TryInitError },

    #[snafu(display("{source}"))]
    Config { source: config::Error },

    #[snafu(display("Could not authorize Gmail access, error: {source}"))]
    Authorize { source: notification::Error },

    #[snafu(display("Only `installed_application` credentials can be authorized interactively"))]
    UnsupportedCredentials,

    #[snafu(display("Could not serialize configuration, error: {source}"))]
    SerializeConfig { source: serde_yaml::Error },

    #[snafu(display("Could not write to stdout, error: {source}"))]
    WriteStdout { source: std::io::Error },
}

impl From<config::Error> for Error {
    fn from(source: config::Error) -> Self { Self::Config { source } }
}

impl From<signup_gateway_server::Error> for Error {
    fn from(source: signup_gateway_server::Error) -> Self { Self::Application { source } }
}

pub trait CommandError {
    fn exit_code(&self) -> exitcode::ExitCode;
}

impl CommandError for Error {
    fn exit_code(&self) -> exitcode::ExitCode {
        match self {
            Self::Application {
                source: signup_gateway_server::Error::InitializeNotificationClient { source },
            }
            | Self::Authorize { source } => notification_exit_code(source),
            Self::Application { .. } | Self::SerializeConfig { .. } => exitcode::SOFTWARE,
            Self::Config { .. } | Self::InitializeLogger { .. } | Self::UnsupportedCredentials => {
                exitcode::CONFIG
            }
            Self::InitializeTokioRuntime { .. } | Self::WriteStdout { .. } => exitcode::IOERR,
        }
    }
}

/// Unreadable credential files are configuration errors.
fn notification_exit_code(error: &notification::Error) -> exitcode::ExitCode {
    match error {
        notification::Error::ReadClientSecret { .. }
        | notification::Error::ParseClientSecret { .. }
        | notification::Error::ParseToken { .. } => exitcode::CONFIG,
        _ => exitcode::SOFTWARE,
    }
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use super::*;

    #[test]
    fn test_exit_codes() {
        let err = Error::from(config::Error::MissingFromAddress);
        assert_eq!(err.exit_code(), exitcode::CONFIG);

        let err = Error::Authorize {
            source: notification::Error::ReadClientSecret {
                path: PathBuf::from("gmail_client_secret.json"),
                source: std::io::Error::from(std::io::ErrorKind::NotFound),
            },
        };
        assert_eq!(err.exit_code(), exitcode::CONFIG);

        let err = Error::Authorize { source: notification::Error::EmptyAuthorizationCode };
        assert_eq!(err.exit_code(), exitcode::SOFTWARE);
    }

    #[test]
    fn test_server_credential_errors_are_config_errors() {
        let missing_secret = Error::from(signup_gateway_server::Error::InitializeNotificationClient {
            source: notification::Error::ReadClientSecret {
                path: PathBuf::from("gmail_client_secret.json"),
                source: std::io::Error::from(std::io::ErrorKind::NotFound),
            },
        });
        assert_eq!(missing_secret.exit_code(), exitcode::CONFIG);

        let broken_token = Error::from(signup_gateway_server::Error::InitializeNotificationClient {
            source: notification::Error::ParseToken {
                path: PathBuf::from("gmail-nodejs-quickstart.json"),
                source: serde_json::from_str::<serde_json::Value>("{").unwrap_err(),
            },
        });
        assert_eq!(broken_token.exit_code(), exitcode::CONFIG);

        let rejected = Error::from(signup_gateway_server::Error::InitializeNotificationClient {
            source: notification::Error::ExchangeToken { status: 500, message: String::new() },
        });
        assert_eq!(rejected.exit_code(), exitcode::SOFTWARE);
    }
}
