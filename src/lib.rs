//! REST API bootstrap: an ordered request pipeline, an authentication and a
//! records route group, and a startup lifecycle gated on the data store.

pub mod auth;
pub mod config;
pub mod db;
pub mod error;
pub mod health;
pub mod http;
pub mod lifecycle;
pub mod observability;
pub mod records;
pub mod security;
pub mod state;

pub use config::AppConfig;
pub use error::{ApiError, ApiResult};
pub use http::{build_app, App, HttpServer};
pub use lifecycle::{Lifecycle, LifecycleState, Shutdown, StartupError};
pub use state::AppState;
