/// Authentication extractors and utilities
///
/// Authentication is a pure function from a bearer token to a viewer
/// identity; tokens are HS256 JWTs issued at register/login.
use crate::{context::AppContext, error::AppError};
use axum::{
    async_trait,
    extract::FromRequestParts,
    http::{header, request::Parts, HeaderMap},
};
use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};

/// JWT claims carried by session tokens
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// User id
    pub sub: i64,
    pub email: String,
    pub iat: i64,
    pub exp: i64,
}

/// Purpose claim that distinguishes reset tokens from session tokens
pub const RESET_PURPOSE: &str = "password_reset";

/// JWT claims carried by password reset tokens
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResetClaims {
    /// User id
    pub sub: i64,
    pub purpose: String,
    /// Fingerprint of the password hash the token was issued against
    pub fpr: String,
    pub iat: i64,
    pub exp: i64,
}

/// Identity of the caller
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Viewer {
    pub id: i64,
}

/// Issue a session token for a user
pub fn issue_token(user_id: i64, email: &str, secret: &str, ttl_days: i64) -> Result<String, AppError> {
    let now = Utc::now();
    let claims = Claims {
        sub: user_id,
        email: email.to_string(),
        iat: now.timestamp(),
        exp: (now + Duration::days(ttl_days)).timestamp(),
    };

    encode(
        &Header::new(Algorithm::HS256),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .map_err(|e| AppError::Jwt(format!("Failed to issue token: {}", e)))
}

/// Verify a JWT token with full validation
///
/// This performs:
/// 1. JWT signature verification
/// 2. Expiration checking
/// 3. Claims validation
pub fn verify_token(token: &str, secret: &str) -> Result<Claims, AppError> {
    let decoding_key = DecodingKey::from_secret(secret.as_bytes());
    let mut validation = Validation::new(Algorithm::HS256);
    // Allow some clock skew (5 minutes)
    validation.leeway = 300;

    decode::<Claims>(token, &decoding_key, &validation)
        .map(|data| data.claims)
        .map_err(|e| {
            tracing::warn!("JWT verification failed: {}", e);
            match e.kind() {
                jsonwebtoken::errors::ErrorKind::ExpiredSignature => {
                    AppError::Unauthorized("Token has expired".to_string())
                }
                jsonwebtoken::errors::ErrorKind::InvalidSignature => {
                    AppError::Unauthorized("Invalid token signature".to_string())
                }
                _ => AppError::Unauthorized("Invalid token".to_string()),
            }
        })
}

/// Issue a short-lived password reset token
pub fn issue_reset_token(
    user_id: i64,
    fingerprint: &str,
    secret: &str,
    ttl_minutes: i64,
) -> Result<String, AppError> {
    let now = Utc::now();
    let claims = ResetClaims {
        sub: user_id,
        purpose: RESET_PURPOSE.to_string(),
        fpr: fingerprint.to_string(),
        iat: now.timestamp(),
        exp: (now + Duration::minutes(ttl_minutes)).timestamp(),
    };

    encode(
        &Header::new(Algorithm::HS256),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .map_err(|e| AppError::Jwt(format!("Failed to issue reset token: {}", e)))
}

/// Verify a password reset token. Session tokens are not accepted.
pub fn verify_reset_token(token: &str, secret: &str) -> Result<ResetClaims, AppError> {
    let decoding_key = DecodingKey::from_secret(secret.as_bytes());
    let mut validation = Validation::new(Algorithm::HS256);
    validation.leeway = 0;

    let claims = decode::<ResetClaims>(token, &decoding_key, &validation)
        .map(|data| data.claims)
        .map_err(|e| {
            tracing::warn!("Reset token verification failed: {}", e);
            AppError::BadRequest("Invalid or expired token".to_string())
        })?;

    if claims.purpose != RESET_PURPOSE {
        tracing::warn!(user_id = claims.sub, "Reset token with wrong purpose");
        return Err(AppError::BadRequest("Invalid or expired token".to_string()));
    }

    Ok(claims)
}

/// Resolve a raw `Authorization` value (with or without the `Bearer ` prefix)
pub fn viewer_from_authorization(value: &str, secret: &str) -> Result<Viewer, AppError> {
    let token = value
        .strip_prefix("Bearer ")
        .or_else(|| value.strip_prefix("bearer "))
        .unwrap_or(value)
        .trim();

    if token.is_empty() {
        return Err(AppError::Unauthorized("Missing authorization".to_string()));
    }

    verify_token(token, secret).map(|claims| Viewer { id: claims.sub })
}

/// Extract bearer token from Authorization header
pub fn extract_bearer_token(headers: &HeaderMap) -> Option<String> {
    headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

/// Optional authenticated context - does not fail if no auth provided
///
/// An invalid or expired token yields an anonymous viewer.
#[derive(Debug, Clone, Copy)]
pub struct OptionalAuthContext {
    pub viewer: Option<Viewer>,
}

#[async_trait]
impl FromRequestParts<AppContext> for OptionalAuthContext {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppContext,
    ) -> Result<Self, Self::Rejection> {
        let viewer = extract_bearer_token(&parts.headers).and_then(|token| {
            verify_token(&token, &state.config.authentication.jwt_secret)
                .ok()
                .map(|claims| Viewer { id: claims.sub })
        });

        Ok(OptionalAuthContext { viewer })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    const SECRET: &str = "test-secret-that-is-at-least-32-characters-long";

    #[test]
    fn test_issue_and_verify() {
        let token = issue_token(42, "alice@example.com", SECRET, 7).unwrap();
        let claims = verify_token(&token, SECRET).unwrap();
        assert_eq!(claims.sub, 42);
        assert_eq!(claims.email, "alice@example.com");
    }

    #[test]
    fn test_wrong_secret_rejected() {
        let token = issue_token(42, "alice@example.com", SECRET, 7).unwrap();
        let err = verify_token(&token, "another-secret-that-is-also-32-characters").unwrap_err();
        assert!(matches!(err, AppError::Unauthorized(_)));
    }

    #[test]
    fn test_expired_token_rejected() {
        let token = issue_token(42, "alice@example.com", SECRET, -1).unwrap();
        assert!(verify_token(&token, SECRET).is_err());
    }

    #[test]
    fn test_reset_token_round_trip() {
        let token = issue_reset_token(42, "fpr", SECRET, 30).unwrap();
        let claims = verify_reset_token(&token, SECRET).unwrap();
        assert_eq!(claims.sub, 42);
        assert_eq!(claims.fpr, "fpr");
        assert_eq!(claims.purpose, RESET_PURPOSE);
    }

    #[test]
    fn test_reset_and_session_tokens_are_not_interchangeable() {
        let session = issue_token(42, "alice@example.com", SECRET, 7).unwrap();
        assert!(matches!(
            verify_reset_token(&session, SECRET),
            Err(AppError::BadRequest(_))
        ));

        let reset = issue_reset_token(42, "fpr", SECRET, 30).unwrap();
        assert!(verify_token(&reset, SECRET).is_err());
    }

    #[test]
    fn test_expired_reset_token_rejected() {
        let token = issue_reset_token(42, "fpr", SECRET, -5).unwrap();
        assert!(matches!(
            verify_reset_token(&token, SECRET),
            Err(AppError::BadRequest(_))
        ));
    }

    #[test]
    fn test_viewer_from_authorization() {
        let token = issue_token(7, "bob@example.com", SECRET, 1).unwrap();
        let bearer = format!("Bearer {}", token);

        assert_eq!(viewer_from_authorization(&bearer, SECRET).unwrap(), Viewer { id: 7 });
        assert_eq!(viewer_from_authorization(&token, SECRET).unwrap(), Viewer { id: 7 });
        assert!(viewer_from_authorization("Bearer ", SECRET).is_err());
        assert!(viewer_from_authorization("garbage", SECRET).is_err());
    }

    #[test]
    fn test_extract_bearer_token() {
        let mut headers = HeaderMap::new();
        assert_eq!(extract_bearer_token(&headers), None);

        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Bearer abc"));
        assert_eq!(extract_bearer_token(&headers), Some("abc".to_string()));

        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Basic abc"));
        assert_eq!(extract_bearer_token(&headers), None);
    }
}
