//! Admission guard: token validation and layered rate limiting for HTTP APIs.

pub mod admin;
pub mod config;
pub mod error;
pub mod http;
pub mod identity;
pub mod lifecycle;
pub mod observability;
pub mod resilience;
pub mod security;
pub mod store;
pub mod token;

pub use config::GuardConfig;
pub use error::{GuardError, GuardResult};
pub use http::{AppState, Collaborators, HttpServer};
pub use lifecycle::Shutdown;
pub use token::TokenEngine;
