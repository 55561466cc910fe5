//! Body-parsing stage.
//!
//! Buffers and decodes the payload of requests that declare a JSON content
//! type. The decoded value is attached to the request as [`ParsedBody`] and
//! the raw bytes are put back so downstream extractors still see them.
//! Requests with any other content type pass through with no parsed body.

use axum::{
    body::Body,
    extract::{Request, State},
    http::{header, HeaderMap},
    middleware::Next,
    response::Response,
};
use http_body_util::{BodyExt, LengthLimitError, Limited};
use serde_json::Value;

use crate::error::ApiError;
use crate::http::context::ParsedBody;
use crate::state::AppState;

pub async fn parse_body(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    if !declares_json(request.headers()) {
        return Ok(next.run(request).await);
    }

    let limit = state.config.body.limit_bytes;
    let (mut parts, body) = request.into_parts();

    let bytes = Limited::new(body, limit)
        .collect()
        .await
        .map_err(|e| {
            if e.is::<LengthLimitError>() {
                ApiError::PayloadTooLarge { limit }
            } else {
                ApiError::BadRequest(format!("Failed to read request body: {}", e))
            }
        })?
        .to_bytes();

    if let Some(value) = decode_json(&bytes)? {
        parts.extensions.insert(ParsedBody(value));
    }

    Ok(next.run(Request::from_parts(parts, Body::from(bytes))).await)
}

/// True for `application/json` and `application/*+json` media types.
pub fn declares_json(headers: &HeaderMap) -> bool {
    let Some(content_type) = headers.get(header::CONTENT_TYPE).and_then(|v| v.to_str().ok()) else {
        return false;
    };

    let essence = content_type
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase();

    essence == "application/json"
        || (essence.starts_with("application/") && essence.ends_with("+json"))
}

/// Decode a JSON payload. Empty bodies yield `None`; only objects and
/// arrays are accepted at the top level.
pub fn decode_json(bytes: &[u8]) -> Result<Option<Value>, ApiError> {
    if bytes.iter().all(u8::is_ascii_whitespace) {
        return Ok(None);
    }

    let value: Value = serde_json::from_slice(bytes)
        .map_err(|e| ApiError::MalformedPayload(format!("Invalid JSON body: {}", e)))?;

    match value {
        Value::Object(_) | Value::Array(_) => Ok(Some(value)),
        _ => Err(ApiError::MalformedPayload(
            "JSON body must be an object or an array".to_string(),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn headers_with(content_type: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(header::CONTENT_TYPE, HeaderValue::from_str(content_type).unwrap());
        headers
    }

    #[test]
    fn test_declares_json() {
        assert!(declares_json(&headers_with("application/json")));
        assert!(declares_json(&headers_with("Application/JSON; charset=utf-8")));
        assert!(declares_json(&headers_with("application/merge-patch+json")));
        assert!(!declares_json(&headers_with("text/plain")));
        assert!(!declares_json(&HeaderMap::new()));
    }

    #[test]
    fn test_decode_object() {
        let value = decode_json(br#"{"title":"a"}"#).unwrap().unwrap();
        assert_eq!(value["title"], "a");
    }

    #[test]
    fn test_empty_body_is_absent() {
        assert!(decode_json(b"").unwrap().is_none());
        assert!(decode_json(b"  \n").unwrap().is_none());
    }

    #[test]
    fn test_invalid_json_is_malformed() {
        let err = decode_json(b"{not json").unwrap_err();
        assert!(matches!(err, ApiError::MalformedPayload(_)));
    }

    #[test]
    fn test_scalar_top_level_is_malformed() {
        let err = decode_json(b"42").unwrap_err();
        assert!(matches!(err, ApiError::MalformedPayload(_)));
    }
}
