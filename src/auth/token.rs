//! JWT issuing and validation.

use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};

use crate::config::AuthConfig;
use crate::error::ApiError;

const ISSUER: &str = "records-api";
const MAX_TTL_SECS: u64 = 10 * 365 * 24 * 60 * 60;

/// Identity decoded from a bearer token and attached to the request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    /// User ID
    pub sub: String,
    pub email: String,
    /// Issued at (Unix timestamp)
    pub iat: i64,
    /// Expiration time (Unix timestamp)
    pub exp: i64,
    pub iss: String,
}

impl Claims {
    pub fn for_user(user_id: &str, email: &str, expires_in: Duration) -> Self {
        let now = Utc::now();
        Self {
            sub: user_id.to_string(),
            email: email.to_string(),
            iat: now.timestamp(),
            exp: (now + expires_in).timestamp(),
            iss: ISSUER.to_string(),
        }
    }
}

#[derive(Clone)]
pub struct JwtAuth {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    validation: Validation,
    ttl: Duration,
}

impl std::fmt::Debug for JwtAuth {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JwtAuth").field("ttl", &self.ttl).finish_non_exhaustive()
    }
}

impl JwtAuth {
    pub fn new(secret: &str, ttl: Duration) -> Self {
        let mut validation = Validation::default();
        validation.set_issuer(&[ISSUER]);
        validation.validate_exp = true;

        Self {
            encoding_key: EncodingKey::from_secret(secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            validation,
            ttl,
        }
    }

    pub fn from_config(config: &AuthConfig) -> Self {
        let secs = config.token_ttl_secs.min(MAX_TTL_SECS) as i64;
        Self::new(&config.jwt_secret, Duration::seconds(secs))
    }

    /// Issue a token for a user.
    pub fn issue(&self, user_id: &str, email: &str) -> Result<String, ApiError> {
        self.encode(&Claims::for_user(user_id, email, self.ttl))
    }

    pub fn encode(&self, claims: &Claims) -> Result<String, ApiError> {
        encode(&Header::default(), claims, &self.encoding_key)
            .map_err(|e| ApiError::Internal(format!("JWT encoding error: {}", e)))
    }

    /// Validate and decode a token
    pub fn decode(&self, token: &str) -> Result<Claims, ApiError> {
        decode::<Claims>(token, &self.decoding_key, &self.validation)
            .map(|data| data.claims)
            .map_err(|e| match e.kind() {
                jsonwebtoken::errors::ErrorKind::ExpiredSignature => {
                    ApiError::Unauthorized("Token expired".to_string())
                }
                _ => ApiError::Unauthorized("Invalid token".to_string()),
            })
    }

    /// Extract token from Authorization header
    pub fn extract_from_header(header: &str) -> Result<&str, ApiError> {
        header
            .strip_prefix("Bearer ")
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .ok_or_else(|| ApiError::Unauthorized("Invalid Authorization header format".to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn auth() -> JwtAuth {
        JwtAuth::new("test-secret-key-123", Duration::hours(1))
    }

    #[test]
    fn test_issue_and_decode() {
        let auth = auth();
        let token = auth.issue("user-1", "a@example.com").unwrap();
        let claims = auth.decode(&token).unwrap();
        assert_eq!(claims.sub, "user-1");
        assert_eq!(claims.email, "a@example.com");
        assert_eq!(claims.iss, ISSUER);
    }

    #[test]
    fn test_wrong_secret_is_rejected() {
        let token = auth().issue("user-1", "a@example.com").unwrap();
        let other = JwtAuth::new("another-secret", Duration::hours(1));
        assert!(matches!(other.decode(&token), Err(ApiError::Unauthorized(_))));
    }

    #[test]
    fn test_expired_token() {
        let auth = auth();
        let claims = Claims::for_user("user-1", "a@example.com", Duration::hours(-2));
        let token = auth.encode(&claims).unwrap();
        match auth.decode(&token) {
            Err(ApiError::Unauthorized(msg)) => assert_eq!(msg, "Token expired"),
            other => panic!("expected expiry error, got {:?}", other),
        }
    }

    #[test]
    fn test_extract_from_header() {
        assert_eq!(JwtAuth::extract_from_header("Bearer abc").unwrap(), "abc");
        assert!(JwtAuth::extract_from_header("Basic abc").is_err());
        assert!(JwtAuth::extract_from_header("Bearer ").is_err());
    }
}
