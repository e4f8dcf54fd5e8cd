use std::{io, io::Write, path::PathBuf};

use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::Shell;
use snafu::ResultExt;

use crate::{
    command::{authorize_gmail, print_schema, run_server},
    config::{self, Config},
    error, shadow,
};

/// Loads `.env` from the working directory into the environment. Runs
/// before argument parsing so the file can also provide
/// `SIGNUP_GATEWAY_CONFIG_FILE_PATH`.
#[allow(clippy::result_large_err)]
pub fn load_dotenv() -> Result<(), error::Error> { accept_missing(dotenvy::dotenv()) }

#[allow(clippy::result_large_err)]
fn accept_missing(loaded: Result<PathBuf, dotenvy::Error>) -> Result<(), error::Error> {
    match loaded {
        Ok(_) => Ok(()),
        Err(err) if err.not_found() => Ok(()),
        Err(source) => Err(config::Error::LoadDotenv { source }.into()),
    }
}

#[derive(Debug, Parser)]
#[command(author,
    version,
    long_version = shadow::CLAP_LONG_VERSION,
    about,
    long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    #[clap(
        long = "config",
        short = 'c',
        env = "SIGNUP_GATEWAY_CONFIG_FILE_PATH",
        help = "Specify a configuration file"
    )]
    config_file_path: Option<PathBuf>,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    #[clap(about = "Print version information")]
    Version,

    #[clap(about = "Output shell completion code for the specified shell (bash, zsh, fish)")]
    Completion { shell: Shell },

    #[clap(about = "Output default configuration")]
    DefaultConfig,

    #[clap(about = "Run server")]
    #[command(visible_alias = "run")]
    Server,

    #[clap(about = "Output the GraphQL schema generated from the database")]
    Schema,

    #[clap(about = "Authorize Gmail access and store the token")]
    Authorize,
}

impl Cli {
    pub fn run(self) -> Result<(), Box<error::Error>> {
        match self.command {
            Command::Version => {
                io::stdout()
                    .write_all(Self::command().render_long_version().as_bytes())
                    .context(error::WriteStdoutSnafu)?;
            }
            Command::Completion { shell } => {
                let mut command = Self::command();
                let bin_name = command.get_name().to_string();
                clap_complete::generate(shell, &mut command, bin_name, &mut io::stdout());
            }
            Command::DefaultConfig => {
                let config_text =
                    serde_yaml::to_string(&Config::default()).context(error::SerializeConfigSnafu)?;
                io::stdout().write_all(config_text.as_bytes()).context(error::WriteStdoutSnafu)?;
            }
            Command::Server => run_server(self.load_config()?)?,
            Command::Schema => print_schema(self.load_config()?)?,
            Command::Authorize => authorize_gmail(self.load_config()?)?,
        }

        Ok(())
    }

    #[allow(clippy::result_large_err)]
    fn load_config(&self) -> Result<Config, error::Error> {
        let mut config = match self.config_file_path.clone().or_else(Config::search_path) {
            Some(path) => Config::load(path)?,
            None => Config::default(),
        };

        config.apply_environment(|name| std::env::var(name).ok())?;
        config.resolve_paths()?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dotenv_supplies_config_file_path() {
        let dir = tempfile::tempdir().unwrap();
        let env_file = dir.path().join(".env");
        std::fs::write(&env_file, "SIGNUP_GATEWAY_CONFIG_FILE_PATH=/etc/signup-gateway/custom.yaml\n")
            .unwrap();

        accept_missing(dotenvy::from_path(&env_file).map(|()| env_file.clone())).unwrap();
        let cli = Cli::try_parse_from(["signup-gateway", "server"]).unwrap();

        assert_eq!(cli.config_file_path, Some(PathBuf::from("/etc/signup-gateway/custom.yaml")));
    }

    #[test]
    fn test_missing_dotenv_is_ignored() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join(".env");

        assert!(accept_missing(dotenvy::from_path(&missing).map(|()| missing.clone())).is_ok());
    }
}
