use std::process::ExitCode;

use log::{error, info};

use crate::config::Config;
use crate::http::controller::setup_controller;

mod config;
mod http;
mod probe;
mod store;

#[tokio::main]
async fn main() -> ExitCode {
    dotenvy::dotenv().ok();
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let config = match Config::from_env() {
        Ok(config) => config,
        Err(err) => {
            error!("Invalid configuration: {}", err);
            return ExitCode::FAILURE;
        }
    };

    let backend = config.storage.backend();
    info!("Using {} probe storage", backend.describe());

    match setup_controller(&config, backend).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!("Failed to start HTTP server: {}", err);
            ExitCode::FAILURE
        }
    }
}
