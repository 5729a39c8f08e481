//! Route handlers wiring the admission core into auth flows.

use axum::{
    body::Bytes,
    extract::{Path, Query, State},
    Json,
};
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::error::{GuardError, GuardResult};
use crate::http::response::ApiResponse;
use crate::http::state::AppState;
use crate::identity::{CallerIdentity, ClientIp};
use crate::token::{AccessClaims, TokenPair};

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub user_id: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct RefreshRequest {
    pub refresh_token: String,
}

#[derive(Debug, Default, Deserialize)]
pub struct LogoutRequest {
    #[serde(default)]
    pub refresh_token: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct OtpSendRequest {
    pub phone: String,
}

#[derive(Debug, Deserialize)]
pub struct OtpVerifyRequest {
    pub phone: String,
    pub code: String,
}

#[derive(Debug, Deserialize)]
pub struct OtpStatusQuery {
    pub phone: String,
}

#[derive(Debug, Serialize)]
pub struct OtpStatus {
    pub retry_after_seconds: u64,
}

#[derive(Debug, Serialize)]
pub struct CallerProfile {
    pub user_id: String,
    pub role: String,
    pub expires_at: u64,
}

/// Lockout check, credential check, then a new session.
pub async fn login(
    State(state): State<AppState>,
    Json(body): Json<LoginRequest>,
) -> GuardResult<ApiResponse<TokenPair>> {
    let lock = state.lockout.is_locked(&body.user_id).await;
    if lock.locked {
        tracing::info!(user_id = %body.user_id, remaining_secs = lock.remaining.as_secs(), "Login attempt on locked account");
        return Err(GuardError::AccountLocked(lock.remaining));
    }

    if !state.credentials.verify(&body.user_id, &body.password).await? {
        state.lockout.record_failure(&body.user_id).await;
        return Err(GuardError::InvalidCredentials);
    }

    let account = state
        .persistence
        .find_account(&body.user_id)
        .await?
        .filter(|account| account.active)
        .ok_or(GuardError::InvalidCredentials)?;

    state.lockout.reset(&account.id).await;
    let pair = state.tokens.issue_session(&account.id, &account.role).await?;
    tracing::info!(user_id = %account.id, role = %account.role, "Login succeeded");
    Ok(ApiResponse::ok("Login successful", pair))
}

pub async fn refresh(
    State(state): State<AppState>,
    Json(body): Json<RefreshRequest>,
) -> GuardResult<ApiResponse<TokenPair>> {
    let pair = state.tokens.refresh_session(&body.refresh_token).await?;
    Ok(ApiResponse::ok("Token refreshed", pair))
}

/// The body is optional; when it names a refresh token that one is revoked too.
pub async fn logout(
    State(state): State<AppState>,
    claims: AccessClaims,
    body: Bytes,
) -> GuardResult<ApiResponse<()>> {
    let request: LogoutRequest = if body.is_empty() {
        LogoutRequest::default()
    } else {
        serde_json::from_slice(&body).map_err(|_| GuardError::RefreshTokenNotFound)?
    };

    state
        .tokens
        .logout(&claims, request.refresh_token.as_deref())
        .await?;
    tracing::info!(user_id = %claims.id, "Logged out");
    Ok(ApiResponse::message("Logged out"))
}

pub async fn otp_send(
    State(state): State<AppState>,
    ClientIp(ip): ClientIp,
    Json(body): Json<OtpSendRequest>,
) -> GuardResult<ApiResponse<OtpStatus>> {
    state.otp_limiter.check(&body.phone, ip)?;
    state
        .otp_provider
        .send(&body.phone)
        .await
        .map_err(|e| GuardError::OtpDeliveryFailed(e.to_string()))?;

    Ok(ApiResponse::ok(
        "OTP sent",
        OtpStatus {
            retry_after_seconds: state.otp_limiter.retry_after_seconds(&body.phone),
        },
    ))
}

/// A correct code resets the phone's send schedule.
pub async fn otp_verify(
    State(state): State<AppState>,
    Json(body): Json<OtpVerifyRequest>,
) -> GuardResult<ApiResponse<()>> {
    let verified = state
        .otp_provider
        .verify(&body.phone, &body.code)
        .await
        .map_err(|e| GuardError::OtpDeliveryFailed(e.to_string()))?;
    if !verified {
        return Err(GuardError::InvalidCredentials);
    }
    state.otp_limiter.reset(&body.phone);
    Ok(ApiResponse::message("OTP verified"))
}

pub async fn otp_status(
    State(state): State<AppState>,
    Query(query): Query<OtpStatusQuery>,
) -> ApiResponse<OtpStatus> {
    ApiResponse::ok(
        "OTP status",
        OtpStatus {
            retry_after_seconds: state.otp_limiter.retry_after_seconds(&query.phone),
        },
    )
}

/// Acknowledge a callback. Payload handling belongs to the provider integration.
pub async fn webhook(Path(provider): Path<String>, body: Bytes) -> ApiResponse<serde_json::Value> {
    tracing::info!(provider = %provider, bytes = body.len(), "Webhook received");
    ApiResponse::ok("Webhook accepted", json!({ "provider": provider }))
}

pub async fn me(caller: CallerIdentity) -> ApiResponse<CallerProfile> {
    ApiResponse::ok(
        "Caller profile",
        CallerProfile {
            user_id: caller.user_id,
            role: caller.role,
            expires_at: caller.expires_at,
        },
    )
}

pub async fn health() -> Json<serde_json::Value> {
    Json(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}
