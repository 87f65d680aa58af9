use std::sync::Arc;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use locker::cli::{self, Cli};
use locker::config::LockerConfig;
use locker::storage::{KeyValueBackend, SledBackend};

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    let config = LockerConfig::load_or_default(&cli.config);

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.store.log_level.clone()));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let backend = match SledBackend::open(&config.store.db_path) {
        Ok(b) => Arc::new(b) as Arc<dyn KeyValueBackend>,
        Err(e) => {
            eprintln!("Failed to open store at {}: {}", config.store.db_path, e);
            std::process::exit(1);
        }
    };

    if let Err(e) = cli::run(cli.command, &config, backend).await {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}
