//! Per-request context carried in request extensions.
//!
//! Stages enrich the request as it moves through the pipeline:
//! - body parsing attaches [`ParsedBody`]
//! - authentication attaches [`crate::auth::Claims`]

use std::net::SocketAddr;

use axum::{
    extract::{ConnectInfo, FromRequestParts, Request},
    http::request::Parts,
};
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::error::ApiError;

/// JSON payload decoded by the body-parsing stage.
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedBody(pub Value);

/// Resolve the caller identity for a request.
///
/// Uses the peer address, or the first `X-Forwarded-For` hop when the
/// deployment sits behind a trusted proxy.
pub fn caller_identity(request: &Request, trust_forwarded_for: bool) -> String {
    if trust_forwarded_for {
        let forwarded = request
            .headers()
            .get("x-forwarded-for")
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.split(',').next())
            .map(str::trim)
            .filter(|v| !v.is_empty());
        if let Some(client) = forwarded {
            return client.to_string();
        }
    }

    request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip().to_string())
        .unwrap_or_else(|| "unknown".to_string())
}

/// Typed view of the parsed body for handlers.
///
/// Rejects with 400 when no JSON body was sent and 422 when the body does
/// not match `T`.
#[derive(Debug, Clone)]
pub struct Payload<T>(pub T);

impl<S, T> FromRequestParts<S> for Payload<T>
where
    S: Send + Sync,
    T: DeserializeOwned,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let ParsedBody(value) = parts.extensions.get::<ParsedBody>().cloned().ok_or_else(|| {
            ApiError::BadRequest("Expected a JSON request body".to_string())
        })?;

        Ok(Payload(serde_json::from_value(value)?))
    }
}
