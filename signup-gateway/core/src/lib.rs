pub mod config;

use std::{
    net::{IpAddr, Ipv4Addr},
    path::{Path, PathBuf},
    sync::LazyLock,
};

use chrono::{DateTime, Utc};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};

pub const PROJECT_VERSION: &str = env!("CARGO_PKG_VERSION");

pub const PROJECT_NAME: &str = "signup-gateway";
pub const PROJECT_NAME_WITH_INITIAL_CAPITAL: &str = "Signup Gateway";

pub const PROGRAM_NAME: &str = "signup-gateway";
pub const CONFIG_NAME: &str = "signup-gateway.yaml";

pub const DEFAULT_WEB_PORT: u16 = 5000;
pub const DEFAULT_WEB_HOST: IpAddr = IpAddr::V4(Ipv4Addr::UNSPECIFIED);

pub const DEFAULT_METRICS_PORT: u16 = 5001;
pub const DEFAULT_METRICS_HOST: IpAddr = IpAddr::V4(Ipv4Addr::LOCALHOST);

pub const DEFAULT_SIGN_UP_CHANNEL: &str = "sign_ups";

/// Audience PostGraphile-compatible clients put into their tokens.
pub const DEFAULT_JWT_AUDIENCE: &str = "postgraphile";

/// Lookup of the user a sign-up notification refers to; `$1` is the user id
/// as text.
pub const DEFAULT_USER_QUERY: &str = "SELECT first_name, last_name FROM users WHERE id::text = $1";

pub static PROJECT_CONFIG_DIR: LazyLock<PathBuf> = LazyLock::new(|| {
    ProjectDirs::from("", PROJECT_NAME, PROJECT_NAME)
        .expect("Creating `ProjectDirs` should always success")
        .config_dir()
        .to_path_buf()
});

#[must_use]
pub fn fallback_project_config_directories() -> Vec<PathBuf> {
    let Some(user_dirs) = directories::UserDirs::new() else {
        return Vec::new();
    };
    vec![
        [user_dirs.home_dir(), (Path::new(".config")), (Path::new(PROJECT_NAME))].iter().collect(),
        [user_dirs.home_dir(), (Path::new(&format!(".{PROJECT_NAME}")))].iter().collect(),
        [&Path::new("/"), &Path::new("etc"), &Path::new(PROJECT_NAME)].iter().collect(),
    ]
}

#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ServerInfo {
    pub version: String,
    pub branch: String,
    pub commit_hash: String,
    pub graphql_schema: String,
    pub start_time: DateTime<Utc>,
}
