//! Startup/shutdown lifecycle over a real socket.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use records_api::config::DatabaseConfig;
use records_api::db::{DataStoreConnector, Database, DbError, SqlConnector};
use records_api::lifecycle::{Lifecycle, LifecycleState, Shutdown, StartupError};

mod common;
use common::test_config;

/// Wraps a connector and counts connection attempts.
struct CountingConnector<C> {
    inner: C,
    attempts: Arc<AtomicUsize>,
}

#[async_trait]
impl<C: DataStoreConnector> DataStoreConnector for CountingConnector<C> {
    fn target(&self) -> String {
        self.inner.target()
    }

    async fn connect(&self) -> Result<Database, DbError> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        self.inner.connect().await
    }
}

fn unreachable_store() -> SqlConnector {
    SqlConnector::new(DatabaseConfig {
        url: "sqlite:///nonexistent-dir/records-api/app.db".to_string(),
        acquire_timeout_secs: 2,
        ..DatabaseConfig::default()
    })
}

fn free_port() -> u16 {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    listener.local_addr().unwrap().port()
}

async fn wait_for_serving(
    rx: &mut tokio::sync::watch::Receiver<LifecycleState>,
) -> std::net::SocketAddr {
    let state = tokio::time::timeout(
        Duration::from_secs(10),
        rx.wait_for(|s| matches!(s, LifecycleState::Serving(_) | LifecycleState::Terminated)),
    )
    .await
    .expect("lifecycle did not settle")
    .expect("lifecycle dropped")
    .clone();

    match state {
        LifecycleState::Serving(addr) => addr,
        other => panic!("expected Serving, got {:?}", other),
    }
}

#[tokio::test]
async fn test_connection_failure_never_opens_listener() {
    let port = free_port();
    let mut config = test_config();
    config.listener.port = port;

    let attempts = Arc::new(AtomicUsize::new(0));
    let connector = CountingConnector {
        inner: unreachable_store(),
        attempts: attempts.clone(),
    };

    let lifecycle = Lifecycle::new();
    let shutdown = Shutdown::new();
    let result = lifecycle.run(config, &connector, shutdown.signal()).await;

    assert!(matches!(result, Err(StartupError::Connection(_))));
    assert_eq!(lifecycle.current(), LifecycleState::Terminated);
    assert_eq!(attempts.load(Ordering::SeqCst), 1, "no retry expected");

    let connect = tokio::net::TcpStream::connect(("127.0.0.1", port)).await;
    assert!(connect.is_err(), "listener must never have been opened");
}

#[tokio::test]
async fn test_serves_after_connect_and_stops_gracefully() {
    let attempts = Arc::new(AtomicUsize::new(0));
    let config = test_config();
    let connector = CountingConnector {
        inner: SqlConnector::new(config.database.clone()),
        attempts: attempts.clone(),
    };

    let lifecycle = Arc::new(Lifecycle::new());
    let mut states = lifecycle.subscribe();
    let shutdown = Shutdown::new();
    let signal = shutdown.signal();

    let runner = {
        let lifecycle = lifecycle.clone();
        tokio::spawn(async move { lifecycle.run(config, &connector, signal).await })
    };

    let addr = wait_for_serving(&mut states).await;
    assert_eq!(attempts.load(Ordering::SeqCst), 1);

    let client = reqwest::Client::builder().no_proxy().build().unwrap();
    let res = client
        .get(format!("http://{}/api/health", addr))
        .send()
        .await
        .expect("server unreachable");
    assert_eq!(res.status(), 200);
    let body: serde_json::Value = res.json().await.unwrap();
    assert_eq!(body["status"], "ok");

    let slashed = client
        .get(format!("http://{}/api/health/", addr))
        .send()
        .await
        .unwrap();
    assert_eq!(slashed.status(), 200);

    let missing = client
        .get(format!("http://{}/api/unknown", addr))
        .send()
        .await
        .unwrap();
    assert_eq!(missing.status(), 404);

    shutdown.trigger();
    let result = tokio::time::timeout(Duration::from_secs(10), runner)
        .await
        .expect("server did not stop")
        .unwrap();
    assert!(result.is_ok());
    assert_eq!(lifecycle.current(), LifecycleState::Stopped);
}

#[tokio::test]
async fn test_rate_limit_keys_on_real_peer_address() {
    let mut config = test_config();
    config.rate_limit.max = 2;
    let connector = SqlConnector::new(config.database.clone());

    let lifecycle = Arc::new(Lifecycle::new());
    let mut states = lifecycle.subscribe();
    let shutdown = Shutdown::new();
    let signal = shutdown.signal();

    let runner = {
        let lifecycle = lifecycle.clone();
        tokio::spawn(async move { lifecycle.run(config, &connector, signal).await })
    };
    let addr = wait_for_serving(&mut states).await;

    let client = reqwest::Client::builder().no_proxy().build().unwrap();
    let url = format!("http://{}/api/health", addr);
    let mut statuses = Vec::new();
    for _ in 0..3 {
        statuses.push(client.get(&url).send().await.unwrap().status().as_u16());
    }
    assert_eq!(statuses, vec![200, 200, 429]);

    shutdown.trigger();
    let _ = tokio::time::timeout(Duration::from_secs(10), runner).await;
}

#[tokio::test]
async fn test_bind_failure_is_reported() {
    let occupied = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let mut config = test_config();
    config.listener.port = occupied.local_addr().unwrap().port();
    let connector = SqlConnector::new(config.database.clone());

    let lifecycle = Lifecycle::new();
    let shutdown = Shutdown::new();
    let result = lifecycle.run(config, &connector, shutdown.signal()).await;

    assert!(matches!(result, Err(StartupError::Bind { .. })));
    assert_eq!(lifecycle.current(), LifecycleState::Terminated);
}
