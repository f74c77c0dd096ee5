#![cfg(not(tarpaulin_include))]

use membership::{AppConfig, app};
use std::env;
use std::path::PathBuf;

/// Main entry point for the web application
///
/// An optional first argument names a YAML settings file; without it the
/// defaults are used (`data/members.xlsx`, `config.yaml`, `127.0.0.1:3000`).
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let config_path = env::args().nth(1).map(PathBuf::from);
    let config = AppConfig::load(config_path.as_deref())?;

    log::info!(
        "Starting membership server with data file {}",
        config.data_file.display()
    );
    app::run(config).await
}
