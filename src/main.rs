//! Inkpress - blog content API with live GraphQL subscriptions

use clap::Parser;
use std::process::ExitCode;

use inkpress::config::{merge_config_with_args, ConfigFile};
use inkpress::{ApiError, Result, Server, ServerArgs, ServerConfig};
use tracing::{error, info};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

fn main() -> ExitCode {
    if let Err(e) = run() {
        eprintln!("Inkpress failed to start: {e}");
        return ExitCode::from(1);
    }
    ExitCode::SUCCESS
}

fn run() -> Result<()> {
    // Parse command-line arguments (before runtime creation)
    let mut args = ServerArgs::parse();

    // Handle --generate-config flag
    if args.generate_config {
        println!("{}", ConfigFile::generate_example());
        return Ok(());
    }

    // Load configuration file if specified or from default locations
    let config_file = if let Some(ref path) = args.config {
        match ConfigFile::load(path) {
            Ok(config) => {
                eprintln!("Loaded configuration from {:?}", path);
                Some(config)
            }
            Err(e) => {
                eprintln!("Error loading configuration file: {}", e);
                return Err(e);
            }
        }
    } else {
        ConfigFile::load_default()
    };

    // Merge config file values with CLI args (CLI takes precedence)
    if let Some(ref config) = config_file {
        args = merge_config_with_args(args, config);
    }

    // Initialize logging
    let log_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&args.log_level));

    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(log_filter)
        .init();

    if config_file.is_some() {
        info!("Configuration loaded from file");
    }

    // Create server configuration
    let config = match ServerConfig::from_args(args) {
        Ok(config) => config,
        Err(e) => {
            error!(error = %e, "Failed to create configuration");
            return Err(e);
        }
    };

    // Validate configuration before starting server
    if let Err(e) = config.validate() {
        error!(error = %e, "Invalid configuration");
        return Err(e);
    }

    let runtime = match tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(e) => {
            error!(error = %e, "Failed to create Tokio runtime");
            return Err(ApiError::Server(format!(
                "Failed to create Tokio runtime: {}",
                e
            )));
        }
    };

    runtime.block_on(async {
        let server = match Server::new(config) {
            Ok(server) => server,
            Err(e) => {
                error!(error = %e, "Failed to create server");
                return Err(e);
            }
        };

        if let Err(e) = server.run().await {
            error!(error = %e, "Server error");
            return Err(e);
        }
        Ok(())
    })
}
