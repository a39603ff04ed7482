//! lunchline CLI server
//!
//! ```sh
//! # Default config (~/.config/lunchline/config.toml)
//! lunchline
//!
//! # Custom config, in-memory store, port override
//! lunchline --config /etc/lunchline/config.toml --store memory --api-port 9090
//!
//! # Validate config without starting
//! lunchline --check
//! ```

use std::path::PathBuf;

use clap::{Parser, ValueEnum};
use tracing::{error, info};

use lunchline::config::{AppConfig, StoreMode, CONFIG_ENV};
use lunchline::domain::Period;
use lunchline::server::{init_tracing, ServerHandle, ServerOptions};

#[derive(Debug, Clone, Copy, ValueEnum)]
enum StoreArg {
    Database,
    Memory,
    Sandbox,
}

impl From<StoreArg> for StoreMode {
    fn from(arg: StoreArg) -> Self {
        match arg {
            StoreArg::Database => StoreMode::Database,
            StoreArg::Memory => StoreMode::Memory,
            StoreArg::Sandbox => StoreMode::Sandbox,
        }
    }
}

/// Lunch pickup slot allocation and reservation service.
#[derive(Parser, Debug)]
#[command(
    name = "lunchline",
    version,
    about = "QuickQueue lunch pickup slot service",
    long_about = "REST API server that allocates lunch pickup slots with the lowest \
                  expected wait and holds capacity while orders are placed.\n\n\
                  Default config: ~/.config/lunchline/config.toml"
)]
struct Cli {
    /// Path to the configuration file (TOML).
    #[arg(short, long, env = CONFIG_ENV)]
    config: Option<PathBuf>,

    /// Override the REST API listen port.
    #[arg(long)]
    api_port: Option<u16>,

    /// Override the slot store.
    #[arg(long, value_enum)]
    store: Option<StoreArg>,

    /// Override the log level (trace, debug, info, warn, error).
    #[arg(short, long)]
    log_level: Option<String>,

    /// Validate the configuration file and exit without starting the server.
    #[arg(long)]
    check: bool,

    /// Skip database migrations on startup.
    #[arg(long)]
    no_migrate: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let config_path = cli.config.unwrap_or_else(lunchline::default_config_path);

    let mut config = match AppConfig::load(&config_path) {
        Ok(cfg) => cfg,
        Err(e) if cli.check => {
            eprintln!("Configuration is invalid: {}", e);
            std::process::exit(1);
        }
        Err(e) => {
            tracing_subscriber::fmt()
                .with_env_filter(tracing_subscriber::EnvFilter::new("info"))
                .init();
            error!("Failed to load config from {}: {}", config_path.display(), e);
            return Err(e.into());
        }
    };

    if let Some(ref level) = cli.log_level {
        config.logging.level = level.clone();
    }
    if !cli.check {
        init_tracing(&config);
        info!("Configuration loaded from {}", config_path.display());
    }

    if let Some(port) = cli.api_port {
        info!("CLI override: api_port = {}", port);
        config.server.api_port = port;
    }
    if let Some(store) = cli.store {
        info!("CLI override: store = {:?}", store);
        config.store.mode = store.into();
    }

    if cli.check {
        let template = config.slot_template()?;
        println!("Configuration is valid");
        println!("   Config file : {}", config_path.display());
        println!("   API address : {}:{}", config.server.api_host, config.server.api_port);
        println!("   Store       : {:?}", config.store.mode);
        println!("   Database    : {}", config.database.url);
        for period in Period::ALL {
            let window = template.period_window(period);
            println!(
                "   Period {}    : {} x {} min slots from {}",
                period,
                window.slot_count(),
                window.slot_granularity_minutes,
                window.period_start_time.format("%H:%M")
            );
        }
        println!("   Locations   : {}", config.seed_locations().len());
        println!("   Log level   : {}", config.logging.level);
        return Ok(());
    }

    let handle = ServerHandle::start(ServerOptions {
        config,
        auto_migrate: !cli.no_migrate,
    })
    .await?;

    handle.install_signal_handler();
    info!("Press Ctrl+C to shut down gracefully.");

    handle.shutdown_signal().wait().await;
    handle.wait().await;

    Ok(())
}
