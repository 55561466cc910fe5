//! HTTP server setup and the request pipeline.
//!
//! # Responsibilities
//! - Mount the health endpoint and the route groups
//! - Wire the stages in their fixed order
//! - Serve connections with graceful shutdown

use std::future::Future;
use std::net::SocketAddr;

use axum::{
    extract::Request,
    middleware::{from_fn, from_fn_with_state},
    routing::get,
    Router, ServiceExt,
};
use tokio::net::TcpListener;
use tower::{Layer, ServiceBuilder};
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::normalize_path::{NormalizePath, NormalizePathLayer};

use crate::error::{not_found, panic_response};
use crate::health::health;
use crate::http::body::parse_body;
use crate::http::request::{propagate_request_id_layer, set_request_id_layer};
use crate::observability::logging::log_request;
use crate::security::cors::cors_layer;
use crate::security::headers::security_headers_middleware;
use crate::security::rate_limit::{rate_limit_middleware, spawn_purge_task};
use crate::state::AppState;
use crate::{auth, records};

/// Mount the health endpoint and route groups. Unclaimed paths and methods
/// fall through to the not-found handler.
pub fn routes(state: &AppState) -> Router<AppState> {
    Router::new()
        .route("/api/health", get(health))
        .nest("/api/auth", auth::router(state))
        .nest("/api/records", records::router(state))
        .fallback(not_found)
        .method_not_allowed_fallback(not_found)
}

/// The servable application: the pipeline-wrapped router behind trailing
/// slash normalization.
pub type App = NormalizePath<Router>;

/// Build the full application for `state`.
pub fn build_app(state: AppState) -> App {
    with_pipeline(routes(&state), state)
}

/// Wrap routes in the request pipeline.
///
/// Stages run top to bottom on the way in:
/// 1. body parsing
/// 2. cross-origin policy
/// 3. security headers
/// 4. request logging
/// 5. rate limiting (prefix-scoped)
/// 6. routing, 7. not-found fallback
///
/// Any stage may answer with an `ApiError`, which renders as the structured
/// error response (stage 8) and skips everything below it. Panics in
/// handlers are caught just above the router and rendered the same way.
///
/// Trailing slashes are trimmed before anything else sees the URI, so
/// `/api/records/` routes like `/api/records`. The layer has to sit outside
/// the `Router` because route matching happens before `Router::layer` runs.
pub fn with_pipeline(routes: Router<AppState>, state: AppState) -> App {
    let pipeline = ServiceBuilder::new()
        .layer(set_request_id_layer())
        .layer(propagate_request_id_layer())
        .layer(from_fn_with_state(state.clone(), parse_body))
        .layer(cors_layer(&state.config.cors))
        .layer(from_fn_with_state(state.clone(), security_headers_middleware))
        .layer(from_fn(log_request))
        .layer(from_fn_with_state(state.clone(), rate_limit_middleware))
        .layer(CatchPanicLayer::custom(panic_response));

    NormalizePathLayer::trim_trailing_slash().layer(routes.with_state(state).layer(pipeline))
}

/// HTTP server for the API.
pub struct HttpServer {
    app: App,
    state: AppState,
}

impl HttpServer {
    pub fn new(state: AppState) -> Self {
        let app = build_app(state.clone());
        Self { app, state }
    }

    /// Serve on `listener` until `shutdown` resolves, then drain in-flight requests.
    pub async fn run<F>(self, listener: TcpListener, shutdown: F) -> Result<(), std::io::Error>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let addr = listener.local_addr()?;
        tracing::info!(address = %addr, "HTTP server starting");

        let purge = self.state.config.rate_limit.enabled.then(|| {
            spawn_purge_task(self.state.limiter.clone(), self.state.config.rate_limit.window())
        });

        let app = ServiceExt::<Request>::into_make_service_with_connect_info::<SocketAddr>(self.app);
        let result = axum::serve(listener, app)
            .with_graceful_shutdown(shutdown)
            .await;

        if let Some(task) = purge {
            task.abort();
        }

        tracing::info!("HTTP server stopped");
        result
    }
}
