//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum setup, stage ordering)
//!     → request.rs (request ID)
//!     → body.rs (JSON payload → ParsedBody)
//!     → [security stages, logging, rate limit]
//!     → route groups / not-found
//!     → error.rs renders any failure
//! ```

pub mod body;
pub mod context;
pub mod request;
pub mod server;

pub use context::{ParsedBody, Payload};
pub use request::X_REQUEST_ID;
pub use server::{build_app, with_pipeline, App, HttpServer};
