//! Graceful shutdown coordinator for the gateway
//!
//! Both protocol surfaces hang off one listener, so shutdown is coordinated
//! in phases: stop admitting new GraphQL work, let in-flight requests
//! finish, then close WebSocket subscription connections, all under one
//! deadline.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::{Duration, Instant};
use tokio::sync::{broadcast, watch, Notify};
use tracing::{debug, info, warn};

/// Default shutdown timeout in seconds
pub const DEFAULT_SHUTDOWN_TIMEOUT_SECS: u64 = 30;

/// Default connection drain timeout in seconds
pub const DEFAULT_DRAIN_TIMEOUT_SECS: u64 = 10;

/// Configuration for shutdown behavior
#[derive(Debug, Clone)]
pub struct ShutdownConfig {
    /// Maximum time to wait for graceful shutdown before forcing
    pub timeout_secs: u64,
    /// Time to wait for open connections to drain before giving up on them
    pub drain_timeout_secs: u64,
}

impl Default for ShutdownConfig {
    fn default() -> Self {
        Self {
            timeout_secs: DEFAULT_SHUTDOWN_TIMEOUT_SECS,
            drain_timeout_secs: DEFAULT_DRAIN_TIMEOUT_SECS,
        }
    }
}

/// Shutdown phase for ordered cleanup
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShutdownPhase {
    /// Normal operation
    Running,
    /// Wait for in-flight requests to complete
    DrainRequests,
    /// Close subscription connections
    CloseConnections,
    /// Final shutdown
    Complete,
}

impl std::fmt::Display for ShutdownPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ShutdownPhase::Running => write!(f, "running"),
            ShutdownPhase::DrainRequests => write!(f, "draining requests"),
            ShutdownPhase::CloseConnections => write!(f, "closing connections"),
            ShutdownPhase::Complete => write!(f, "complete"),
        }
    }
}

/// Coordinator for graceful shutdown operations
pub struct ShutdownCoordinator {
    config: ShutdownConfig,
    shutdown_initiated: AtomicBool,
    phase_tx: watch::Sender<ShutdownPhase>,
    phase_rx: watch::Receiver<ShutdownPhase>,
    /// Broadcast sender for the shutdown notification
    notify_tx: broadcast::Sender<()>,
    /// Open WebSocket subscription connections
    active_connections: AtomicU64,
    /// In-flight HTTP GraphQL requests
    in_flight_requests: AtomicU64,
    requests_drained: Notify,
    connections_drained: Notify,
}

impl ShutdownCoordinator {
    pub fn new() -> Self {
        Self::with_config(ShutdownConfig::default())
    }

    pub fn with_config(config: ShutdownConfig) -> Self {
        let (phase_tx, phase_rx) = watch::channel(ShutdownPhase::Running);
        let (notify_tx, _) = broadcast::channel(16);

        Self {
            config,
            shutdown_initiated: AtomicBool::new(false),
            phase_tx,
            phase_rx,
            notify_tx,
            active_connections: AtomicU64::new(0),
            in_flight_requests: AtomicU64::new(0),
            requests_drained: Notify::new(),
            connections_drained: Notify::new(),
        }
    }

    /// Check if shutdown has been initiated
    pub fn is_shutting_down(&self) -> bool {
        self.shutdown_initiated.load(Ordering::SeqCst)
    }

    /// Get the current shutdown phase
    pub fn current_phase(&self) -> ShutdownPhase {
        *self.phase_rx.borrow()
    }

    /// Subscribe to the shutdown notification. Long-lived connection
    /// handlers listen on this to learn that close frames are due.
    pub fn subscribe(&self) -> broadcast::Receiver<()> {
        self.notify_tx.subscribe()
    }

    /// Watch for phase changes
    pub fn watch_phase(&self) -> watch::Receiver<ShutdownPhase> {
        self.phase_rx.clone()
    }

    /// Track a new subscription connection
    pub fn connection_opened(&self) {
        self.active_connections.fetch_add(1, Ordering::Relaxed);
    }

    /// Track a closed subscription connection
    pub fn connection_closed(&self) {
        let prev = self.active_connections.fetch_sub(1, Ordering::Relaxed);
        if prev == 1 && self.is_shutting_down() {
            debug!("last connection closed during shutdown");
            self.connections_drained.notify_waiters();
        }
    }

    /// Get the number of open subscription connections
    pub fn active_connections(&self) -> u64 {
        self.active_connections.load(Ordering::Relaxed)
    }

    fn request_started(&self) {
        self.in_flight_requests.fetch_add(1, Ordering::Relaxed);
    }

    fn request_completed(&self) {
        let prev = self.in_flight_requests.fetch_sub(1, Ordering::Relaxed);
        if prev == 1 && self.is_shutting_down() {
            debug!("last in-flight request completed during shutdown");
            self.requests_drained.notify_waiters();
        }
    }

    /// Get the number of in-flight requests
    pub fn in_flight_requests(&self) -> u64 {
        self.in_flight_requests.load(Ordering::Relaxed)
    }

    /// Create a guard tracking one request's lifecycle. Returns `None` once
    /// shutdown has begun; the caller must then refuse the request.
    pub fn request_guard(&self) -> Option<RequestGuard<'_>> {
        if self.is_shutting_down() {
            return None;
        }
        self.request_started();
        Some(RequestGuard { coordinator: self })
    }

    /// Wait for open connections to close, up to a timeout.
    ///
    /// Returns the number of connections still open when the wait gave up
    /// (0 if all drained gracefully).
    pub async fn drain_connections(&self, timeout: Option<Duration>) -> u64 {
        let drain_timeout = timeout.unwrap_or(Duration::from_secs(self.config.drain_timeout_secs));
        let initial = self.active_connections();

        if initial == 0 {
            debug!("no open connections to drain");
            return 0;
        }

        info!(
            active_connections = initial,
            timeout_secs = drain_timeout.as_secs(),
            "draining open connections"
        );

        let drain_result = tokio::time::timeout(drain_timeout, async {
            while self.active_connections() > 0 {
                self.connections_drained.notified().await;
            }
        })
        .await;

        let remaining = self.active_connections();
        if drain_result.is_err() && remaining > 0 {
            warn!(
                remaining_connections = remaining,
                drained = initial.saturating_sub(remaining),
                "connection drain timed out"
            );
            remaining
        } else {
            info!(drained_connections = initial, "all connections drained");
            0
        }
    }

    /// Initiate graceful shutdown: refuse new requests, wait for in-flight
    /// ones, then drain subscription connections. Idempotent.
    pub async fn initiate_shutdown(&self) -> Result<(), ShutdownError> {
        if self.shutdown_initiated.swap(true, Ordering::SeqCst) {
            debug!("shutdown already in progress");
            return Ok(());
        }

        let start = Instant::now();
        let timeout = Duration::from_secs(self.config.timeout_secs);

        info!(
            timeout_secs = self.config.timeout_secs,
            active_connections = self.active_connections(),
            in_flight_requests = self.in_flight_requests(),
            "initiating graceful shutdown"
        );

        // Connection handlers react to this by sending close frames.
        let _ = self.notify_tx.send(());

        if self.in_flight_requests() > 0 {
            self.transition_to(ShutdownPhase::DrainRequests);

            let remaining = timeout.saturating_sub(start.elapsed());
            let wait_result = tokio::time::timeout(remaining, async {
                while self.in_flight_requests() > 0 {
                    self.requests_drained.notified().await;
                }
            })
            .await;

            if wait_result.is_err() {
                warn!(
                    pending_requests = self.in_flight_requests(),
                    "timed out waiting for requests to drain"
                );
                return Err(ShutdownError::Timeout {
                    phase: ShutdownPhase::DrainRequests,
                    pending_requests: self.in_flight_requests(),
                    active_connections: self.active_connections(),
                });
            }
            info!("all in-flight requests completed");
        }

        self.transition_to(ShutdownPhase::CloseConnections);
        let remaining = timeout.saturating_sub(start.elapsed());
        let drain_timeout = remaining.min(Duration::from_secs(self.config.drain_timeout_secs));
        let abandoned = self.drain_connections(Some(drain_timeout)).await;
        if abandoned > 0 {
            debug!(abandoned, "connections still open at shutdown");
        }

        self.transition_to(ShutdownPhase::Complete);
        info!(
            elapsed_ms = start.elapsed().as_millis() as u64,
            "graceful shutdown complete"
        );
        Ok(())
    }

    fn transition_to(&self, phase: ShutdownPhase) {
        debug!(phase = %phase, "entering shutdown phase");
        let _ = self.phase_tx.send(phase);
    }

    /// Snapshot of shutdown state, surfaced by the health endpoint.
    pub fn stats(&self) -> ShutdownStats {
        ShutdownStats {
            is_shutting_down: self.is_shutting_down(),
            phase: self.current_phase(),
            active_connections: self.active_connections(),
            in_flight_requests: self.in_flight_requests(),
        }
    }
}

impl Default for ShutdownCoordinator {
    fn default() -> Self {
        Self::new()
    }
}

/// RAII guard for tracking in-flight requests
pub struct RequestGuard<'a> {
    coordinator: &'a ShutdownCoordinator,
}

impl Drop for RequestGuard<'_> {
    fn drop(&mut self) {
        self.coordinator.request_completed();
    }
}

/// Statistics about shutdown state
#[derive(Debug, Clone)]
pub struct ShutdownStats {
    pub is_shutting_down: bool,
    pub phase: ShutdownPhase,
    pub active_connections: u64,
    pub in_flight_requests: u64,
}

/// Error type for shutdown operations
#[derive(Debug)]
pub enum ShutdownError {
    Timeout {
        phase: ShutdownPhase,
        pending_requests: u64,
        active_connections: u64,
    },
}

impl std::fmt::Display for ShutdownError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ShutdownError::Timeout {
                phase,
                pending_requests,
                active_connections,
            } => {
                write!(
                    f,
                    "shutdown timed out during {} phase ({} pending requests, {} open connections)",
                    phase, pending_requests, active_connections
                )
            }
        }
    }
}

impl std::error::Error for ShutdownError {}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn coordinator_initial_state() {
        let coordinator = ShutdownCoordinator::new();
        assert!(!coordinator.is_shutting_down());
        assert_eq!(coordinator.current_phase(), ShutdownPhase::Running);
        assert_eq!(coordinator.active_connections(), 0);
        assert_eq!(coordinator.in_flight_requests(), 0);
    }

    #[test]
    fn connection_tracking() {
        let coordinator = ShutdownCoordinator::new();

        coordinator.connection_opened();
        coordinator.connection_opened();
        assert_eq!(coordinator.active_connections(), 2);

        coordinator.connection_closed();
        assert_eq!(coordinator.active_connections(), 1);

        coordinator.connection_closed();
        assert_eq!(coordinator.active_connections(), 0);
    }

    #[test]
    fn request_guard_tracks_lifecycle() {
        let coordinator = ShutdownCoordinator::new();
        assert_eq!(coordinator.in_flight_requests(), 0);

        {
            let _guard = coordinator.request_guard().expect("running");
            assert_eq!(coordinator.in_flight_requests(), 1);
        }

        assert_eq!(coordinator.in_flight_requests(), 0);
    }

    #[test]
    fn request_guard_refused_during_shutdown() {
        let coordinator = ShutdownCoordinator::new();
        coordinator.shutdown_initiated.store(true, Ordering::SeqCst);
        assert!(coordinator.request_guard().is_none());
    }

    #[tokio::test]
    async fn graceful_shutdown_with_no_work() {
        let coordinator = ShutdownCoordinator::with_config(ShutdownConfig {
            timeout_secs: 5,
            drain_timeout_secs: DEFAULT_DRAIN_TIMEOUT_SECS,
        });

        let result = coordinator.initiate_shutdown().await;
        assert!(result.is_ok());
        assert!(coordinator.is_shutting_down());
        assert_eq!(coordinator.current_phase(), ShutdownPhase::Complete);
    }

    #[tokio::test]
    async fn shutdown_waits_for_requests() {
        let coordinator = Arc::new(ShutdownCoordinator::with_config(ShutdownConfig {
            timeout_secs: 5,
            drain_timeout_secs: DEFAULT_DRAIN_TIMEOUT_SECS,
        }));

        coordinator.request_started();

        let background = coordinator.clone();
        let shutdown_handle = tokio::spawn(async move { background.initiate_shutdown().await });

        tokio::time::sleep(Duration::from_millis(50)).await;
        coordinator.request_completed();

        let result = shutdown_handle.await.expect("join");
        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn shutdown_times_out_on_stuck_request() {
        let coordinator = ShutdownCoordinator::with_config(ShutdownConfig {
            timeout_secs: 1,
            drain_timeout_secs: 1,
        });

        coordinator.request_started();

        match coordinator.initiate_shutdown().await {
            Err(ShutdownError::Timeout {
                phase,
                pending_requests,
                ..
            }) => {
                assert_eq!(phase, ShutdownPhase::DrainRequests);
                assert_eq!(pending_requests, 1);
            }
            Ok(_) => panic!("expected timeout error"),
        }
    }

    #[tokio::test]
    async fn double_shutdown_is_idempotent() {
        let coordinator = ShutdownCoordinator::new();
        assert!(coordinator.initiate_shutdown().await.is_ok());
        assert!(coordinator.initiate_shutdown().await.is_ok());
    }

    #[tokio::test]
    async fn drain_returns_immediately_without_connections() {
        let coordinator = ShutdownCoordinator::new();
        assert_eq!(coordinator.drain_connections(None).await, 0);
    }

    #[tokio::test]
    async fn drain_observes_closing_connection() {
        let coordinator = Arc::new(ShutdownCoordinator::new());

        coordinator.connection_opened();
        coordinator.shutdown_initiated.store(true, Ordering::SeqCst);

        let background = coordinator.clone();
        let drain_handle = tokio::spawn(async move {
            background
                .drain_connections(Some(Duration::from_secs(5)))
                .await
        });

        tokio::time::sleep(Duration::from_millis(50)).await;
        coordinator.connection_closed();

        assert_eq!(drain_handle.await.expect("join"), 0);
    }

    #[tokio::test]
    async fn drain_gives_up_on_stuck_connection() {
        let coordinator = ShutdownCoordinator::new();
        coordinator.connection_opened();
        coordinator.shutdown_initiated.store(true, Ordering::SeqCst);

        let abandoned = coordinator
            .drain_connections(Some(Duration::from_millis(100)))
            .await;
        assert_eq!(abandoned, 1);
    }

    #[test]
    fn stats_snapshot() {
        let coordinator = ShutdownCoordinator::new();
        coordinator.connection_opened();

        let stats = coordinator.stats();
        assert!(!stats.is_shutting_down);
        assert_eq!(stats.phase, ShutdownPhase::Running);
        assert_eq!(stats.active_connections, 1);
        assert_eq!(stats.in_flight_requests, 0);
    }
}
