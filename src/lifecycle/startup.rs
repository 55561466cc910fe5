//! Startup orchestration.
//!
//! ```text
//! Initializing → Connecting → Serving → Stopped
//!                     └──────→ Failed → Terminated
//! ```
//!
//! The data store is connected exactly once, before any socket is opened.
//! If that fails the lifecycle ends without ever listening.
//!
//! Everything that does not need the store handle (rate limiter, CORS
//! policy check) is prepared while `Initializing`. Routes are mounted
//! during `Connecting`, right after the connect succeeds, because handlers
//! share the store through `AppState`. The listener is only bound after
//! that, on the way to `Serving`.

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;

use tokio::net::TcpListener;
use tokio::sync::watch;

use crate::config::AppConfig;
use crate::db::{DataStoreConnector, DbError};
use crate::http::HttpServer;
use crate::security::{FixedWindowLimiter, RateLimiter};
use crate::state::AppState;

/// Observable lifecycle state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LifecycleState {
    /// Building the limiter and checking the cross-origin policy. No socket.
    Initializing,
    /// One connection attempt, then route mounting on success. No socket.
    Connecting,
    /// Listening on the given address.
    Serving(SocketAddr),
    /// Served and shut down gracefully.
    Stopped,
    Failed(String),
    Terminated,
}

#[derive(Debug, thiserror::Error)]
pub enum StartupError {
    #[error("failed to connect to the data store: {0}")]
    Connection(#[source] DbError),

    #[error("failed to bind {address}: {source}")]
    Bind {
        address: String,
        #[source]
        source: std::io::Error,
    },

    #[error("server error: {0}")]
    Serve(#[source] std::io::Error),
}

/// Process exit status for a finished lifecycle: 0 after a graceful
/// shutdown, 1 for any startup failure.
pub fn exit_status(result: &Result<(), StartupError>) -> u8 {
    match result {
        Ok(()) => 0,
        Err(_) => 1,
    }
}

/// Drives the service from configuration to serving (or termination).
pub struct Lifecycle {
    state: watch::Sender<LifecycleState>,
    limiter: Option<Arc<dyn RateLimiter>>,
}

impl Lifecycle {
    pub fn new() -> Self {
        let (state, _) = watch::channel(LifecycleState::Initializing);
        Self { state, limiter: None }
    }

    /// Use this limiter instead of the in-memory default.
    pub fn with_limiter(mut self, limiter: Arc<dyn RateLimiter>) -> Self {
        self.limiter = Some(limiter);
        self
    }

    /// Watch state transitions, e.g. to learn the bound address.
    pub fn subscribe(&self) -> watch::Receiver<LifecycleState> {
        self.state.subscribe()
    }

    pub fn current(&self) -> LifecycleState {
        self.state.borrow().clone()
    }

    fn transition(&self, next: LifecycleState) {
        tracing::debug!(state = ?next, "Lifecycle transition");
        self.state.send_replace(next);
    }

    /// Connect, then serve until `shutdown` resolves.
    ///
    /// Returns `Ok` after a graceful shutdown and `Err` if the service could
    /// not start. The caller decides the exit code.
    pub async fn run<C, F>(
        &self,
        config: AppConfig,
        connector: &C,
        shutdown: F,
    ) -> Result<(), StartupError>
    where
        C: DataStoreConnector + ?Sized,
        F: Future<Output = ()> + Send + 'static,
    {
        self.transition(LifecycleState::Initializing);
        let limiter = self
            .limiter
            .clone()
            .unwrap_or_else(|| Arc::new(FixedWindowLimiter::from_config(&config.rate_limit)));
        if config.cors.is_permissive() {
            tracing::warn!("CORS accepts any origin; set cors.origins (or CORS_ORIGIN) to restrict it");
        }

        self.transition(LifecycleState::Connecting);
        let target = connector.target();
        tracing::info!(store = %target, "Connecting to data store");

        let db = match connector.connect().await {
            Ok(db) => db,
            Err(e) => return Err(self.fail(StartupError::Connection(e))),
        };
        tracing::info!(store = %target, "Data store connected");

        let address = config.listener.bind_address();
        let state = AppState::with_limiter(config, db.clone(), limiter);
        let server = HttpServer::new(state);

        let listener = match TcpListener::bind(&address).await {
            Ok(l) => l,
            Err(source) => return Err(self.fail(StartupError::Bind { address, source })),
        };
        let local_addr = match listener.local_addr() {
            Ok(a) => a,
            Err(source) => return Err(self.fail(StartupError::Bind { address, source })),
        };

        tracing::info!(address = %local_addr, "Backend server listening on http://{}", local_addr);
        self.transition(LifecycleState::Serving(local_addr));

        let result = server.run(listener, shutdown).await;
        db.close().await;

        match result {
            Ok(()) => {
                self.transition(LifecycleState::Stopped);
                Ok(())
            }
            Err(e) => Err(self.fail(StartupError::Serve(e))),
        }
    }

    fn fail(&self, err: StartupError) -> StartupError {
        tracing::error!(error = %err, "Startup failed");
        self.transition(LifecycleState::Failed(err.to_string()));
        self.transition(LifecycleState::Terminated);
        err
    }
}

impl Default for Lifecycle {
    fn default() -> Self {
        Self::new()
    }
}
