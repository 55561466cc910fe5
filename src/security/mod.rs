//! Security subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming request:
//!     → cors.rs (cross-origin policy, preflight answers)
//!     → headers.rs (defensive response headers)
//!     → rate_limit.rs (per-caller window under the API prefix)
//!     → Pass to routing
//! ```

pub mod cors;
pub mod headers;
pub mod rate_limit;

pub use rate_limit::{FixedWindowLimiter, RateDecision, RateLimiter};
