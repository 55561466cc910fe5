//! Configuration validation.
//!
//! Serde covers syntax; this module checks value ranges and cross-field
//! rules. All problems are reported together rather than stopping at the first.

use crate::config::schema::{AppConfig, Environment};

/// A single semantic problem in a loaded configuration.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{field}: {message}")]
pub struct ValidationError {
    pub field: &'static str,
    pub message: String,
}

impl ValidationError {
    fn new(field: &'static str, message: impl Into<String>) -> Self {
        Self {
            field,
            message: message.into(),
        }
    }
}

/// Check a configuration, returning every violation found.
pub fn validate_config(config: &AppConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.listener.host.trim().is_empty() {
        errors.push(ValidationError::new("listener.host", "must not be empty"));
    }

    if config.body.limit_bytes == 0 {
        errors.push(ValidationError::new("body.limit_bytes", "must be greater than 0"));
    }

    let rl = &config.rate_limit;
    if rl.enabled {
        if rl.window_ms == 0 {
            errors.push(ValidationError::new("rate_limit.window_ms", "must be greater than 0"));
        }
        if rl.max == 0 {
            errors.push(ValidationError::new("rate_limit.max", "must be greater than 0"));
        }
        if !rl.prefix.starts_with('/') {
            errors.push(ValidationError::new("rate_limit.prefix", "must start with '/'"));
        }
    }

    if config.database.url.trim().is_empty() {
        errors.push(ValidationError::new("database.url", "must not be empty"));
    }
    if config.database.max_connections == 0 {
        errors.push(ValidationError::new("database.max_connections", "must be greater than 0"));
    }

    if config.auth.jwt_secret.is_empty() {
        errors.push(ValidationError::new("auth.jwt_secret", "must not be empty"));
    }
    if config.auth.token_ttl_secs == 0 {
        errors.push(ValidationError::new("auth.token_ttl_secs", "must be greater than 0"));
    }

    for origin in &config.cors.origins {
        let origin = origin.trim();
        if origin != "*" && axum::http::HeaderValue::from_str(origin).is_err() {
            errors.push(ValidationError::new(
                "cors.origins",
                format!("'{}' is not a valid origin", origin),
            ));
        }
    }

    if config.observability.metrics_enabled && config.observability.metrics_socket().is_none() {
        errors.push(ValidationError::new(
            "observability.metrics_address",
            "must be a socket address",
        ));
    }

    if config.environment == Environment::Production {
        if config.cors.is_permissive() {
            errors.push(ValidationError::new(
                "cors.origins",
                "an explicit origin list is required in production",
            ));
        }
        if config.auth.jwt_secret.len() < 32 || config.auth.jwt_secret == "CHANGE_ME_IN_PRODUCTION" {
            errors.push(ValidationError::new(
                "auth.jwt_secret",
                "must be a non-default secret of at least 32 characters in production",
            ));
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
