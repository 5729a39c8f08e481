use std::time::Duration;

use axum::{
    extract::{Path, State},
    Json,
};
use serde::{Deserialize, Serialize};

use crate::error::GuardResult;
use crate::http::response::ApiResponse;
use crate::http::state::AppState;
use crate::identity::CallerIdentity;

#[derive(Debug, Serialize)]
pub struct SystemStatus {
    pub version: &'static str,
    pub uptime_secs: u64,
    pub shared_store: bool,
    pub limiters: LimiterSummary,
}

/// Keys each limiter currently tracks.
#[derive(Debug, Serialize)]
pub struct LimiterSummary {
    pub ip_keys: usize,
    pub user_keys: usize,
    pub active_penalties: usize,
    pub otp_phones: usize,
    pub otp_ips: usize,
    pub lockout_accounts: usize,
    pub webhook_keys: usize,
}

#[derive(Debug, Deserialize)]
pub struct RevokeRequest {
    pub jti: String,
    /// How long the revocation must outlive the token; defaults to the
    /// longest access lifetime.
    #[serde(default)]
    pub ttl_secs: Option<u64>,
}

pub async fn get_status(State(state): State<AppState>) -> ApiResponse<SystemStatus> {
    let limiters = LimiterSummary {
        ip_keys: state.ip_limiter.tracked_keys(),
        user_keys: state.user_limiter.tracked_keys(),
        active_penalties: state.user_limiter.active_penalties(),
        otp_phones: state.otp_limiter.tracked_phones(),
        otp_ips: state.otp_limiter.tracked_ips(),
        lockout_accounts: state.lockout.tracked_accounts(),
        webhook_keys: state.webhook_limiter.tracked_keys(),
    };
    ApiResponse::ok(
        "Status",
        SystemStatus {
            version: env!("CARGO_PKG_VERSION"),
            uptime_secs: state.started_at.elapsed().as_secs(),
            shared_store: state.shared_store,
            limiters,
        },
    )
}

pub async fn unlock_account(
    State(state): State<AppState>,
    caller: CallerIdentity,
    Path(user_id): Path<String>,
) -> ApiResponse<()> {
    state.lockout.reset(&user_id).await;
    tracing::info!(operator = %caller.user_id, user_id = %user_id, "Account unlocked");
    ApiResponse::message("Account unlocked")
}

pub async fn revoke_token(
    State(state): State<AppState>,
    caller: CallerIdentity,
    Json(body): Json<RevokeRequest>,
) -> GuardResult<ApiResponse<()>> {
    let ttl = match body.ttl_secs {
        Some(secs) => Duration::from_secs(secs),
        None => state.tokens.max_access_ttl(),
    };
    state.tokens.revoke(&body.jti, ttl).await?;
    tracing::info!(operator = %caller.user_id, jti = %body.jti, "Access token revoked");
    Ok(ApiResponse::message("Token revoked"))
}
