//! Access and refresh tokens.
//!
//! # Data Flow
//! ```text
//! login / refresh → engine.rs issue_session → signed access token + persisted refresh record
//! every request   → engine.rs validate_access_token → claims.rs AccessClaims
//! logout / admin  → engine.rs revoke → shared store (TTL) or persisted table
//! ```

pub mod claims;
pub mod engine;

pub use claims::{now_secs, AccessClaims, Audience, TokenPair};
pub use engine::TokenEngine;
