//! Authenticated caller identity.

use axum::extract::FromRequestParts;
use axum::http::request::Parts;

use crate::error::GuardError;
use crate::token::AccessClaims;

/// Identity attached to a request once its access token has validated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallerIdentity {
    pub user_id: String,
    pub role: String,
    pub jti: String,
    /// Unix seconds.
    pub expires_at: u64,
}

impl CallerIdentity {
    pub fn has_role(&self, roles: &[&str]) -> bool {
        roles.iter().any(|role| *role == self.role)
    }
}

impl From<&AccessClaims> for CallerIdentity {
    fn from(claims: &AccessClaims) -> Self {
        Self {
            user_id: claims.id.clone(),
            role: claims.role.clone(),
            jti: claims.jti.clone(),
            expires_at: claims.exp,
        }
    }
}

/// Requires an authenticated caller; rejects with 401 otherwise.
impl<S> FromRequestParts<S> for CallerIdentity
where
    S: Send + Sync,
{
    type Rejection = GuardError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<CallerIdentity>()
            .cloned()
            .ok_or(GuardError::MissingCredentials)
    }
}

/// The validated claims of the caller's access token.
impl<S> FromRequestParts<S> for AccessClaims
where
    S: Send + Sync,
{
    type Rejection = GuardError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<AccessClaims>()
            .cloned()
            .ok_or(GuardError::MissingCredentials)
    }
}
