//! Operator endpoints under `/api/admin`.
//!
//! Every route requires an authenticated caller with the `admin` role. The
//! routes sit behind the same admission chain as the rest of `/api`, so
//! operator traffic is rate limited in the admin category.

pub mod handlers;

use axum::{
    body::Body,
    http::Request,
    middleware::{self, Next},
    routing::{delete, get, post},
    Router,
};

use crate::http::middleware::require_role;
use crate::http::state::AppState;

use self::handlers::{get_status, revoke_token, unlock_account};

pub const ADMIN_ROLES: &[&str] = &["admin"];

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/status", get(get_status))
        .route("/lockouts/{user_id}", delete(unlock_account))
        .route("/revocations", post(revoke_token))
        .layer(middleware::from_fn(|request: Request<Body>, next: Next| {
            require_role(ADMIN_ROLES, request, next)
        }))
}
