//! caption-server - HTTP front end for the batch captioner
//!
//! Usage: `caption-server [config.json]`
//!
//! Without a file every setting takes its default. `GEMINI_API_KEY` and
//! `CAPTION_BIND_ADDRESS` override the file. Log verbosity follows `RUST_LOG`
//! (default `info`).

use caption_batch::{BatchCaptioner, Config};
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

fn load_config() -> caption_batch::Result<Config> {
    let mut config = match std::env::args().nth(1) {
        Some(path) => {
            tracing::info!(path = %path, "Loading configuration");
            Config::from_json_file(&path)?
        }
        None => Config::default(),
    };
    config.apply_env_overrides()?;
    config.validate()?;
    Ok(config)
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_target(false)
        .init();

    let config = match load_config() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error: {}", e);
            return ExitCode::FAILURE;
        }
    };

    if config.annotator.api_key.is_none() {
        tracing::warn!(
            "No annotation key configured; set GEMINI_API_KEY or PUT /api/v1/settings/credential"
        );
    }

    let captioner = match BatchCaptioner::new(config) {
        Ok(captioner) => captioner,
        Err(e) => {
            eprintln!("Error: {}", e);
            return ExitCode::FAILURE;
        }
    };

    match caption_batch::run_with_shutdown(captioner).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {}", e);
            ExitCode::FAILURE
        }
    }
}
