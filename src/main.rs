mod board;
mod commands;
mod config;
mod db;
mod error;
mod handlers;
mod models;
mod registry;
mod taxonomy;
mod voting;

use clap::Parser;
use commands::{AppContext, Cli};
use config::Config;
use db::SqliteStore;
use handlers::share::SiteLinks;
use log::{debug, error, info, warn};
use rand::rngs::SmallRng;
use rand::SeedableRng;
use registry::HttpBackend;
use std::sync::Arc;

#[tokio::main]
async fn main() {
    // Initialize logging
    dotenvy::dotenv().ok();
    env_logger::init();

    let cli = Cli::parse();

    let config = match Config::load() {
        Ok(config) => config,
        Err(e) => {
            error!("Failed to load configuration: {}", e);
            std::process::exit(2);
        }
    };

    // Profile scope outlives sessions; the session scope shares the same file
    let profile = match SqliteStore::connect(&config.database_url, "profile").await {
        Ok(store) => store,
        Err(e) => {
            error!("Failed to open {}: {}", config.database_url, e);
            std::process::exit(1);
        }
    };
    let session = profile.with_namespace(&config.session_namespace());
    info!("Using session scope {}", session.namespace());

    let backend = match HttpBackend::new(&config.api_base) {
        Ok(backend) => backend,
        Err(e) => {
            error!("Bad POLL_API_BASE: {}", e);
            std::process::exit(2);
        }
    };
    let links = match SiteLinks::new(&config.site_url) {
        Ok(links) => links,
        Err(e) => {
            error!("Bad POLL_SITE_URL: {}", e);
            std::process::exit(2);
        }
    };

    let mut rng = match config.rng_seed {
        Some(seed) => SmallRng::seed_from_u64(seed),
        None => SmallRng::from_os_rng(),
    };

    let session = Arc::new(session);
    let app = AppContext {
        config,
        backend: Arc::new(backend),
        profile: Arc::new(profile),
        session: session.clone(),
        links,
    };

    let stdout = std::io::stdout();
    let mut out = stdout.lock();
    let outcome = commands::handle_command(&app, cli.command, &mut rng, &mut out).await;

    if !app.config.resume_session {
        match session.clear().await {
            Ok(removed) => debug!("Cleared {} session entries", removed),
            Err(e) => warn!("Could not clear session {}: {}", session.namespace(), e),
        }
    }

    if let Err(e) = outcome {
        error!("Command failed: {}", e);
        std::process::exit(1);
    }
}
