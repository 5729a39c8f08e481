//! HTTP surface of the guard.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (router, request id, trace, timeout, body limit)
//!     → middleware/ (authenticate, client ip, ip limit, user limit)
//!     → handlers.rs (login, refresh, logout, otp, webhooks)
//!     → response.rs (JSON envelope)
//! ```

pub mod handlers;
pub mod middleware;
pub mod providers;
pub mod request;
pub mod response;
pub mod server;
pub mod state;

pub use providers::{LogOtpProvider, OtpProvider, OtpProviderError};
pub use request::X_REQUEST_ID;
pub use response::ApiResponse;
pub use server::HttpServer;
pub use state::{AppState, Collaborators};
