//! Request middleware.
//!
//! Order on `/api` routes (outermost first):
//! ```text
//! authenticate → resolve_client_ip → ip_rate_limit → user_rate_limit → handler
//! ```
//! Webhook routes run `resolve_client_ip → webhook_rate_limit` only.

pub mod auth;
pub mod rate_limit;

pub use auth::{authenticate, require_role};
pub use rate_limit::{ip_rate_limit, resolve_client_ip, user_rate_limit, webhook_rate_limit};
