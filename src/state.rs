//! Shared application state handed to stages and handlers.

use std::sync::Arc;

use crate::auth::JwtAuth;
use crate::config::AppConfig;
use crate::db::Database;
use crate::security::{FixedWindowLimiter, RateLimiter};

#[derive(Clone, Debug)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub db: Database,
    pub limiter: Arc<dyn RateLimiter>,
    pub tokens: JwtAuth,
}

impl AppState {
    /// Build state with the in-memory limiter derived from config.
    pub fn new(config: AppConfig, db: Database) -> Self {
        let limiter = Arc::new(FixedWindowLimiter::from_config(&config.rate_limit));
        Self::with_limiter(config, db, limiter)
    }

    /// Build state around an externally supplied limiter.
    pub fn with_limiter(config: AppConfig, db: Database, limiter: Arc<dyn RateLimiter>) -> Self {
        let tokens = JwtAuth::from_config(&config.auth);
        Self {
            config: Arc::new(config),
            db,
            limiter,
            tokens,
        }
    }
}
