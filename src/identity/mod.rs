//! Caller identification.
//!
//! # Data Flow
//! ```text
//! peer address + forwarding headers
//!     → client_ip.rs (trusted-proxy aware) → ClientIp extension
//!
//! validated access token
//!     → caller.rs → CallerIdentity extension
//! ```

pub mod caller;
pub mod client_ip;

pub use caller::CallerIdentity;
pub use client_ip::{ClientIp, TrustedProxies};
