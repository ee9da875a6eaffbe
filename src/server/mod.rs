//! Server implementation for Inkpress
//!
//! The server wires the content store, the topic bus, and the GraphQL schema
//! together and runs them behind a single gateway listener.

pub mod http;
pub mod shutdown;

use std::sync::Arc;
use std::time::Duration;

use tokio::time::interval;
use tracing::{debug, info, warn};

use crate::auth::TokenManager;
use crate::config::ServerConfig;
use crate::error::Result;
use crate::graphql::{build_schema, InkpressSchema};
use crate::pubsub::{BusConfig, TopicBus};
use crate::store::Database;
use self::http::GatewayState;
use self::shutdown::ShutdownCoordinator;

/// How often the bus is swept for topics with no remaining subscribers
const TOPIC_SWEEP_INTERVAL: Duration = Duration::from_secs(60);

/// Inkpress server
pub struct Server {
    /// Server configuration
    config: ServerConfig,

    /// Topic bus feeding live subscriptions
    bus: Arc<TopicBus>,

    /// Token manager shared with the WebSocket handshake
    tokens: Arc<TokenManager>,

    /// Executable GraphQL schema
    schema: InkpressSchema,

    /// Coordinator for graceful shutdown
    shutdown_coordinator: Arc<ShutdownCoordinator>,
}

impl Server {
    /// Create a new server with the given configuration
    pub fn new(config: ServerConfig) -> Result<Self> {
        let store = if config.storage.in_memory {
            info!("Starting in in-memory mode - no data will be persisted");
            Arc::new(Database::open_in_memory()?)
        } else {
            Arc::new(Database::open(&config.storage.db_path)?)
        };

        let bus = Arc::new(TopicBus::with_config(BusConfig {
            topic_capacity: config.topic_capacity,
        }));

        let tokens = Arc::new(TokenManager::new(
            &config.auth.jwt_secret,
            config.auth.token_ttl_days,
        ));

        let schema = build_schema(store, bus.clone(), tokens.clone());

        let shutdown_coordinator = Arc::new(ShutdownCoordinator::with_config(
            config.shutdown.clone(),
        ));

        Ok(Self {
            config,
            bus,
            tokens,
            schema,
            shutdown_coordinator,
        })
    }

    /// Run the server until a shutdown signal arrives
    pub async fn run(self) -> Result<()> {
        self.print_banner();

        // Periodic sweep dropping topics nobody listens to anymore
        let bus = self.bus.clone();
        let mut sweep_shutdown = self.shutdown_coordinator.subscribe();
        let sweep_task = tokio::spawn(async move {
            let mut tick = interval(TOPIC_SWEEP_INTERVAL);
            loop {
                tokio::select! {
                    _ = tick.tick() => {
                        let removed = bus.cleanup_empty_topics().await;
                        if removed > 0 {
                            debug!(removed, "Swept idle topics");
                        }
                    }
                    _ = sweep_shutdown.recv() => break,
                }
            }
        });

        let state = GatewayState {
            schema: self.schema.clone(),
            tokens: self.tokens.clone(),
            coordinator: self.shutdown_coordinator.clone(),
            ws_keepalive: Duration::from_secs(self.config.ws_keepalive_secs),
        };

        // The gateway stops accepting only after the coordinator has drained
        // in-flight requests and closed subscription connections
        let coordinator = self.shutdown_coordinator.clone();
        let timeout_secs = self.config.shutdown.timeout_secs;
        let shutdown_fut = async move {
            shutdown_signal().await;
            info!(
                timeout_secs,
                active_connections = coordinator.active_connections(),
                "Starting graceful shutdown with timeout"
            );
            match coordinator.initiate_shutdown().await {
                Ok(()) => {
                    info!("Graceful shutdown completed within timeout");
                }
                Err(e) => {
                    warn!(
                        error = %e,
                        "Graceful shutdown timed out, proceeding with forced shutdown"
                    );
                }
            }
        };

        http::start_gateway(self.config.bind_addr, state, shutdown_fut).await?;

        sweep_task.abort();

        let stats = self.bus.stats().await;
        info!(
            topics = stats.total_topics,
            events_published = stats.total_events,
            "Shutdown complete"
        );
        Ok(())
    }

    /// Print startup banner
    fn print_banner(&self) {
        let version = env!("CARGO_PKG_VERSION");

        println!();
        println!("  ╔═══════════════════════════════════════════════════════════════════╗");
        println!("  ║                                                                   ║");
        println!("  ║   ██╗███╗   ██╗██╗  ██╗██████╗ ██████╗ ███████╗███████╗███████╗   ║");
        println!("  ║   ██║████╗  ██║██║ ██╔╝██╔══██╗██╔══██╗██╔════╝██╔════╝██╔════╝   ║");
        println!("  ║   ██║██╔██╗ ██║█████╔╝ ██████╔╝██████╔╝█████╗  ███████╗███████╗   ║");
        println!("  ║   ██║██║╚██╗██║██╔═██╗ ██╔═══╝ ██╔══██╗██╔══╝  ╚════██║╚════██║   ║");
        println!("  ║   ██║██║ ╚████║██║  ██╗██║     ██║  ██║███████╗███████║███████║   ║");
        println!("  ║   ╚═╝╚═╝  ╚═══╝╚═╝  ╚═╝╚═╝     ╚═╝  ╚═╝╚══════╝╚══════╝╚══════╝   ║");
        println!("  ║                                                                   ║");
        println!(
            "  ║              A blog engine for the real-time web - v{}         ║",
            version
        );
        println!("  ║                                                                   ║");
        println!("  ╚═══════════════════════════════════════════════════════════════════╝");
        println!();

        let storage = if self.config.storage.in_memory {
            "in-memory (no persistence)".to_string()
        } else {
            self.config.storage.db_path.display().to_string()
        };

        println!("  GraphQL endpoint: http://{}/graphql", self.config.bind_addr);
        println!("  Subscriptions:    ws://{}/graphql/ws", self.config.bind_addr);
        println!("  Health check:     http://{}/health", self.config.bind_addr);
        println!("  Storage:          {}", storage);
        println!();
    }
}

/// Waits for a SIGINT (Ctrl+C) or SIGTERM signal for graceful shutdown.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => { info!("Received SIGINT, initiating graceful shutdown"); }
        () = terminate => { info!("Received SIGTERM, initiating graceful shutdown"); }
    }
}
