//! `rapport-server`: serves the API and connects to the datastore in the background.

use log::error;
use std::process::ExitCode;

#[tokio::main]
async fn main() -> ExitCode {
    dotenvy::dotenv().ok();
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    match rapport::supervisor::run_from_env().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("Service stopped: {}", e);
            ExitCode::FAILURE
        }
    }
}
