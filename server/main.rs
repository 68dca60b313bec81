//! landcover-server
//!
//! Serves land-cover predictions over HTTP, ingests labelled bulk uploads
//! and retrains the classifier in the background.
//!
//! Run with:
//!   landcover-server init-model      # first run only
//!   landcover-server serve
//! Then POST images to http://0.0.0.0:8000/predict

mod handlers;
mod routes;
mod state;
mod util;

use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use clap::{Parser, Subcommand};
use tiny_http::Server;

use landcover_nn::classes::ReverseMapping;
use landcover_nn::config::AppConfig;
use landcover_nn::logging;
use landcover_nn::model::{ModelHandle, ModelStore};
use landcover_nn::network::{Network, NetworkSpec};

use state::AppState;

#[derive(Parser)]
#[command(name = "landcover-server")]
#[command(about = "Land-cover classification API with background retraining")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Serve the HTTP API
    Serve {
        /// TOML config file (defaults to ./landcover.toml when present)
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Bind address, overriding the config
        #[arg(long)]
        addr: Option<SocketAddr>,
    },

    /// Write a freshly initialised model and the default class mapping
    InitModel {
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Architecture JSON (NetworkSpec); defaults to the built-in classifier
        #[arg(long)]
        spec: Option<PathBuf>,

        /// Replace existing artifacts
        #[arg(long)]
        force: bool,
    },

    /// Classify a single image file and print the result as JSON
    Predict {
        image: PathBuf,

        #[arg(short, long)]
        config: Option<PathBuf>,
    },
}

fn main() {
    let cli = Cli::parse();
    if let Err(e) = logging::init() {
        eprintln!("Warning: {e}");
    }

    let result = match cli.command {
        Commands::Serve { config, addr } => cmd_serve(config.as_deref(), addr),
        Commands::InitModel { config, spec, force } => cmd_init_model(config.as_deref(), spec.as_deref(), force),
        Commands::Predict { image, config } => cmd_predict(&image, config.as_deref()),
    };

    if let Err(e) = result {
        tracing::error!("{e}");
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}

fn cmd_serve(config_path: Option<&Path>, addr: Option<SocketAddr>) -> Result<(), Box<dyn std::error::Error>> {
    let mut config = AppConfig::load(config_path)?;
    if let Some(addr) = addr {
        config.server.addr = addr;
    }

    // Without both artifacts there is nothing to serve.
    let handle = ModelHandle::load(config.model_paths())?;
    let bind = config.server.addr;
    let server = Server::http(bind).map_err(|e| format!("failed to bind {}: {}", bind, e))?;
    let shared_state = Arc::new(AppState::new(config, handle));

    tracing::info!(addr = %bind, "Listening");

    // One thread per request; retraining runs on its own worker, so no
    // request ever waits for it.
    for request in server.incoming_requests() {
        let state_clone = Arc::clone(&shared_state);
        std::thread::spawn(move || {
            routes::dispatch(request, state_clone);
        });
    }
    Ok(())
}

fn cmd_init_model(
    config_path: Option<&Path>,
    spec_path: Option<&Path>,
    force: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let config = AppConfig::load(config_path)?;
    let mapping = ReverseMapping::landcover_default();
    let spec = match spec_path {
        Some(path) => NetworkSpec::load_json(path)?,
        None => NetworkSpec::landcover(config.training.hidden_units, mapping.len()),
    };
    spec.validate()?;

    let network = Network::from_spec(&spec, &mut rand::thread_rng());
    let store = ModelStore::new(config.model_paths());
    store.install(&network, &mapping, force)?;

    println!("Model written to   {}", store.paths().model_path().display());
    println!("Mapping written to {}", store.paths().mapping_path().display());
    Ok(())
}

fn cmd_predict(image: &Path, config_path: Option<&Path>) -> Result<(), Box<dyn std::error::Error>> {
    let config = AppConfig::load(config_path)?;
    let handle = ModelHandle::load(config.model_paths())?;
    let bytes = std::fs::read(image)?;
    let result = handle.predict_bytes(&bytes)?;
    println!("{}", serde_json::to_string_pretty(&result)?);
    Ok(())
}
