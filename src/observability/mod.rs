//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! Pipeline stages and lifecycle produce:
//!     → logging.rs (structured log events, one line per request)
//!     → metrics.rs (counters, histograms)
//!
//! Consumers:
//!     → stdout (pretty or JSON)
//!     → Metrics endpoint (Prometheus scrape, optional)
//! ```

pub mod logging;
pub mod metrics;
