//! Liveness endpoint.
//!
//! Reports that the process is up. It does not touch the data store, so it
//! says nothing about readiness.

use axum::Json;
use chrono::{SecondsFormat, Utc};
use serde::Serialize;

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub message: &'static str,
    pub time: String,
}

pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        message: "Backend is running",
        time: Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
    })
}
