mod cli;
mod command;
mod config;
mod error;
mod shadow {
    #![allow(clippy::needless_raw_string_hashes)]
    use shadow_rs::shadow;
    shadow!(build);

    pub use self::build::*;
}

use clap::Parser;

use self::{
    cli::{load_dotenv, Cli},
    error::CommandError,
};

fn main() {
    if let Err(err) = load_dotenv().map_err(Box::new).and_then(|()| Cli::parse().run()) {
        eprintln!("Error: {err}");
        std::process::exit(err.exit_code());
    }
}
