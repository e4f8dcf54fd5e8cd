use std::path::PathBuf;

use snafu::Snafu;

#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum Error {
    #[snafu(display("Could not open config from {}, error: {source}", filename.display()))]
    OpenConfig { filename: PathBuf, source: std::io::Error },

    #[snafu(display("Count not parse config from {}, error: {source}", filename.display()))]
    ParseConfig { filename: PathBuf, source: serde_yaml::Error },

    #[snafu(display("Could not resolve file path {}, error: {source}", file_path.display()))]
    ResolveFilePath { file_path: PathBuf, source: std::io::Error },

    #[snafu(display("Could not load `.env` file, error: {source}"))]
    LoadDotenv { source: dotenvy::Error },

    #[snafu(display("Invalid value `{value}` of environment variable `{name}`"))]
    InvalidEnvironmentVariable { name: String, value: String },

    #[snafu(display("`{field}` must be greater than zero"))]
    ZeroDuration { field: String },

    #[snafu(display("`gmail.from_address` is required to send activation emails"))]
    MissingFromAddress,
}
