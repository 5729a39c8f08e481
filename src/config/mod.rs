//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML) + GUARD_* environment overrides
//!     → loader.rs (parse & deserialize)
//!     → validation.rs (semantic checks)
//!     → GuardConfig (validated, immutable)
//!     → limiters and token engine built from it
//!
//! On file change:
//!     watcher.rs detects change
//!     → loader.rs loads new config
//!     → validation.rs validates
//!     → rate-limit settings and trusted proxies swapped atomically
//! ```
//!
//! # Design Decisions
//! - Config is immutable once loaded; only limits are hot-swapped
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks

pub mod loader;
pub mod schema;
pub mod validation;
pub mod watcher;

pub use loader::{load_config, parse_config, ConfigError};
pub use schema::{
    DevAccount, GuardConfig, IpRateLimitConfig, ListenerConfig, LockoutConfig, NetworkConfig,
    ObservabilityConfig, OtpConfig, StoreConfig, TokenConfig, UserRateLimitConfig, WebhookConfig,
};
