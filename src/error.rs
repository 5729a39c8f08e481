//! Error kinds surfaced by the guard and their HTTP mapping.
//!
//! Every rejection carries a generic message in the response body. The
//! precise cause is only written to the server log.

use std::time::Duration;

use axum::{
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

use crate::store::PersistenceError;

/// Errors produced by token validation, rate limiting and lockout.
#[derive(Debug, Error)]
pub enum GuardError {
    #[error("token is malformed")]
    TokenMalformed,

    #[error("token signature is invalid")]
    TokenSignatureInvalid,

    #[error("token algorithm '{0}' is not accepted")]
    TokenAlgorithmRejected(String),

    #[error("token expired")]
    TokenExpired,

    #[error("token is not yet valid")]
    TokenNotYetValid,

    #[error("token audience mismatch")]
    TokenAudienceMismatch,

    #[error("token issuer mismatch")]
    TokenIssuerMismatch,

    #[error("token revoked")]
    TokenRevoked,

    #[error("refresh token not found")]
    RefreshTokenNotFound,

    #[error("refresh token revoked")]
    RefreshTokenRevoked,

    #[error("refresh token expired")]
    RefreshTokenExpired,

    #[error("rate limited, retry after {0:?}")]
    RateLimited(Duration),

    #[error("account locked, retry after {0:?}")]
    AccountLocked(Duration),

    #[error("missing bearer credentials")]
    MissingCredentials,

    #[error("invalid credentials")]
    InvalidCredentials,

    #[error("caller lacks the required role")]
    Forbidden,

    #[error("persistence unavailable: {0}")]
    PersistenceUnavailable(#[from] PersistenceError),

    #[error("OTP delivery failed: {0}")]
    OtpDeliveryFailed(String),

    #[error("configuration missing: {0}")]
    ConfigurationMissing(&'static str),

    #[error("configuration invalid: {0}")]
    ConfigurationInvalid(String),

    #[error("token encoding failed: {0}")]
    TokenEncoding(String),
}

/// Result type for guard operations.
pub type GuardResult<T> = Result<T, GuardError>;

/// Whole seconds a client should wait, rounded up, never below one.
pub fn retry_after_secs(wait: Duration) -> u64 {
    let secs = wait.as_secs() + u64::from(wait.subsec_nanos() > 0);
    secs.max(1)
}

impl GuardError {
    /// HTTP status for this error.
    pub fn status(&self) -> StatusCode {
        match self {
            Self::RateLimited(_) | Self::AccountLocked(_) => StatusCode::TOO_MANY_REQUESTS,
            Self::Forbidden => StatusCode::FORBIDDEN,
            Self::PersistenceUnavailable(_) | Self::OtpDeliveryFailed(_) => {
                StatusCode::SERVICE_UNAVAILABLE
            }
            Self::ConfigurationMissing(_)
            | Self::ConfigurationInvalid(_)
            | Self::TokenEncoding(_) => StatusCode::INTERNAL_SERVER_ERROR,
            _ => StatusCode::UNAUTHORIZED,
        }
    }

    /// Wait hint for rate-limit and lockout rejections.
    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            Self::RateLimited(wait) | Self::AccountLocked(wait) => Some(*wait),
            _ => None,
        }
    }

    /// Short label used for logs and metrics.
    pub fn reason(&self) -> &'static str {
        match self {
            Self::TokenMalformed => "malformed",
            Self::TokenSignatureInvalid => "signature",
            Self::TokenAlgorithmRejected(_) => "algorithm",
            Self::TokenExpired => "expired",
            Self::TokenNotYetValid => "not_yet_valid",
            Self::TokenAudienceMismatch => "audience",
            Self::TokenIssuerMismatch => "issuer",
            Self::TokenRevoked => "revoked",
            Self::RefreshTokenNotFound => "refresh_not_found",
            Self::RefreshTokenRevoked => "refresh_revoked",
            Self::RefreshTokenExpired => "refresh_expired",
            Self::RateLimited(_) => "rate_limited",
            Self::AccountLocked(_) => "account_locked",
            Self::MissingCredentials => "missing_credentials",
            Self::InvalidCredentials => "invalid_credentials",
            Self::Forbidden => "forbidden",
            Self::PersistenceUnavailable(_) => "persistence",
            Self::OtpDeliveryFailed(_) => "otp_delivery",
            Self::ConfigurationMissing(_) | Self::ConfigurationInvalid(_) => "configuration",
            Self::TokenEncoding(_) => "encoding",
        }
    }

    fn public_message(&self) -> &'static str {
        match self {
            Self::MissingCredentials => "Authentication required",
            Self::RateLimited(_) => "Too many requests, please try again later",
            Self::AccountLocked(_) => "Account temporarily locked, please try again later",
            Self::Forbidden => "Access denied",
            Self::PersistenceUnavailable(_) | Self::OtpDeliveryFailed(_) => {
                "Service temporarily unavailable"
            }
            Self::ConfigurationMissing(_)
            | Self::ConfigurationInvalid(_)
            | Self::TokenEncoding(_) => "Internal server error",
            _ => "Invalid or expired credentials",
        }
    }
}

impl IntoResponse for GuardError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(error = %self, status = %status, "Request failed");
        } else {
            tracing::debug!(reason = self.reason(), error = %self, status = %status, "Request rejected");
        }

        let message = self.public_message();
        let wait = self.retry_after().map(retry_after_secs);
        let body = match wait {
            Some(secs) => json!({
                "success": false,
                "message": message,
                "data": { "retry_after_seconds": secs },
            }),
            None => json!({ "success": false, "message": message }),
        };

        let mut response = (status, Json(body)).into_response();
        if let Some(secs) = wait {
            response
                .headers_mut()
                .insert(header::RETRY_AFTER, HeaderValue::from(secs));
        }
        response
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retry_after_rounds_up() {
        assert_eq!(retry_after_secs(Duration::from_millis(1)), 1);
        assert_eq!(retry_after_secs(Duration::ZERO), 1);
        assert_eq!(retry_after_secs(Duration::from_millis(59_001)), 60);
        assert_eq!(retry_after_secs(Duration::from_secs(300)), 300);
    }

    #[test]
    fn test_status_mapping() {
        assert_eq!(GuardError::TokenRevoked.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(GuardError::Forbidden.status(), StatusCode::FORBIDDEN);
        assert_eq!(
            GuardError::RateLimited(Duration::from_secs(5)).status(),
            StatusCode::TOO_MANY_REQUESTS
        );
        assert_eq!(
            GuardError::PersistenceUnavailable(PersistenceError::Unavailable("down".into())).status(),
            StatusCode::SERVICE_UNAVAILABLE
        );
        assert_eq!(
            GuardError::ConfigurationMissing("tokens.secret").status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[tokio::test]
    async fn test_rate_limited_response_shape() {
        let response = GuardError::RateLimited(Duration::from_secs(60)).into_response();
        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(response.headers().get(header::RETRY_AFTER).unwrap(), "60");

        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(body["success"], false);
        assert_eq!(body["data"]["retry_after_seconds"], 60);
    }

    #[tokio::test]
    async fn test_internal_detail_not_leaked() {
        let response = GuardError::TokenAlgorithmRejected("none".into()).into_response();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let text = String::from_utf8(bytes.to_vec()).unwrap();
        assert!(!text.contains("none"));
        assert!(!text.contains("algorithm"));
        assert!(!text.contains("data"));
    }
}
