//! Limiter middleware.

use axum::{
    body::Body,
    extract::{OriginalUri, State},
    http::Request,
    middleware::Next,
    response::{IntoResponse, Response},
};

use crate::error::GuardError;
use crate::http::request::peer_ip;
use crate::http::state::AppState;
use crate::identity::{CallerIdentity, ClientIp};
use crate::observability::metrics;
use crate::security::headers::{apply_rate_limit_headers, RateLimitOutcome, X_RATELIMIT_LIMIT};

/// Resolve the client address and attach it as `ClientIp`.
pub async fn resolve_client_ip(
    State(state): State<AppState>,
    mut request: Request<Body>,
    next: Next,
) -> Response {
    let peer = peer_ip(request.extensions());
    let ip = state.trusted_proxies.load().resolve(peer, request.headers());
    request.extensions_mut().insert(ClientIp(ip));
    next.run(request).await
}

/// Per-IP limit. Runs after `resolve_client_ip`.
pub async fn ip_rate_limit(
    State(state): State<AppState>,
    ClientIp(ip): ClientIp,
    request: Request<Body>,
    next: Next,
) -> Response {
    let path = full_path(&request).to_owned();
    let outcome = state.ip_limiter.check(ip, &path);
    if outcome.is_limited() {
        tracing::warn!(ip = %ip, path = %path, "IP rate limit exceeded");
    }
    finish(outcome, "ip", request, next).await
}

/// Per-user limit for authenticated callers. Anonymous requests pass.
pub async fn user_rate_limit(
    State(state): State<AppState>,
    request: Request<Body>,
    next: Next,
) -> Response {
    let outcome = match request.extensions().get::<CallerIdentity>() {
        Some(caller) => {
            state
                .user_limiter
                .check(&caller.user_id, &caller.role, full_path(&request))
        }
        None => RateLimitOutcome::Bypassed,
    };
    finish(outcome, "user", request, next).await
}

/// Webhook limit. Runs after `resolve_client_ip`.
pub async fn webhook_rate_limit(
    State(state): State<AppState>,
    ClientIp(ip): ClientIp,
    request: Request<Body>,
    next: Next,
) -> Response {
    let outcome = state.webhook_limiter.check(ip);
    if outcome.is_limited() {
        tracing::warn!(ip = %ip, path = %full_path(&request), "Webhook rate limit exceeded");
    }
    finish(outcome, "webhook", request, next).await
}

/// Path as received, before any `nest` prefix was stripped.
fn full_path(request: &Request<Body>) -> &str {
    request
        .extensions()
        .get::<OriginalUri>()
        .map_or_else(|| request.uri().path(), |uri| uri.path())
}

async fn finish(
    outcome: RateLimitOutcome,
    limiter: &'static str,
    request: Request<Body>,
    next: Next,
) -> Response {
    let mut response = match outcome {
        RateLimitOutcome::Bypassed => return next.run(request).await,
        RateLimitOutcome::Allowed(_) => next.run(request).await,
        RateLimitOutcome::Limited {
            retry_after,
            penalty_level,
            ..
        } => {
            metrics::record_rate_limited(limiter);
            tracing::debug!(limiter, ?penalty_level, ?retry_after, "Request rate limited");
            GuardError::RateLimited(retry_after).into_response()
        }
    };

    // An inner limiter already reported the narrower quota.
    if let Some(status) = outcome.status() {
        if outcome.is_limited() || !response.headers().contains_key(X_RATELIMIT_LIMIT) {
            apply_rate_limit_headers(response.headers_mut(), status);
        }
    }
    response
}
