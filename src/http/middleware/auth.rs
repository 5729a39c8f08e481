//! Bearer authentication and role checks.

use axum::{
    body::Body,
    extract::State,
    http::Request,
    middleware::Next,
    response::{IntoResponse, Response},
};

use crate::error::GuardError;
use crate::http::request::bearer_token;
use crate::http::state::AppState;
use crate::identity::CallerIdentity;

/// Validate the bearer credential when one is presented.
///
/// Anonymous requests pass through untouched; a presented token that fails
/// validation is rejected with 401. On success the claims and a
/// `CallerIdentity` are attached as request extensions.
pub async fn authenticate(
    State(state): State<AppState>,
    mut request: Request<Body>,
    next: Next,
) -> Response {
    let Some(token) = bearer_token(request.headers()).map(str::to_owned) else {
        return next.run(request).await;
    };

    match state.tokens.validate_access_token(&token).await {
        Ok(claims) => {
            let caller = CallerIdentity::from(&claims);
            tracing::debug!(user_id = %caller.user_id, role = %caller.role, "Caller authenticated");
            request.extensions_mut().insert(caller);
            request.extensions_mut().insert(claims);
            next.run(request).await
        }
        Err(e) => e.into_response(),
    }
}

/// Allow the request only if the caller holds one of `roles`.
pub async fn require_role(
    roles: &'static [&'static str],
    request: Request<Body>,
    next: Next,
) -> Response {
    let Some(caller) = request.extensions().get::<CallerIdentity>() else {
        return GuardError::MissingCredentials.into_response();
    };
    if !caller.has_role(roles) {
        tracing::warn!(
            user_id = %caller.user_id,
            role = %caller.role,
            required = ?roles,
            "Caller lacks required role"
        );
        return GuardError::Forbidden.into_response();
    }
    next.run(request).await
}
