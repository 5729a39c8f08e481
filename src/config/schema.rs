//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the guard.
//! All types derive Serde traits for deserialization from config files.

use serde::{Deserialize, Serialize};

/// Root configuration for the admission guard.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct GuardConfig {
    /// Listener configuration (bind address, request limits).
    pub listener: ListenerConfig,

    /// Access/refresh token settings.
    pub tokens: TokenConfig,

    /// Client address resolution.
    pub network: NetworkConfig,

    /// Per-IP limits for anonymous traffic.
    pub ip_rate_limit: IpRateLimitConfig,

    /// Per-user limits for authenticated traffic.
    pub user_rate_limit: UserRateLimitConfig,

    /// OTP send limits.
    pub otp: OtpConfig,

    /// Failed-login lockout.
    pub lockout: LockoutConfig,

    /// Inbound callback limits.
    pub webhook: WebhookConfig,

    /// Optional shared key-value store.
    pub store: StoreConfig,

    /// Interval of the background sweep run by every limiter.
    pub cleanup_interval_secs: u64,

    /// Observability settings.
    pub observability: ObservabilityConfig,

    /// Accounts seeded into the in-process persistence backend.
    pub dev_accounts: Vec<DevAccount>,
}

impl Default for GuardConfig {
    fn default() -> Self {
        Self {
            listener: ListenerConfig::default(),
            tokens: TokenConfig::default(),
            network: NetworkConfig::default(),
            ip_rate_limit: IpRateLimitConfig::default(),
            user_rate_limit: UserRateLimitConfig::default(),
            otp: OtpConfig::default(),
            lockout: LockoutConfig::default(),
            webhook: WebhookConfig::default(),
            store: StoreConfig::default(),
            cleanup_interval_secs: 60,
            observability: ObservabilityConfig::default(),
            dev_accounts: Vec::new(),
        }
    }
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:8080").
    pub bind_address: String,

    /// Request timeout in seconds.
    pub request_timeout_secs: u64,

    /// Maximum body size in bytes.
    pub max_body_size: usize,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8080".to_string(),
            request_timeout_secs: 30,
            max_body_size: 2 * 1024 * 1024, // 2MB
        }
    }
}

/// Token signing and lifetime settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TokenConfig {
    /// HMAC signing secret. Overridden by `GUARD_TOKEN_SECRET`.
    pub secret: String,

    /// Expected `aud` claim.
    pub audience: String,

    /// Expected `iss` claim. Issuer is not checked when unset.
    pub issuer: Option<String>,

    /// Default access token lifetime.
    pub access_ttl_secs: u64,

    /// Access token lifetime for elevated roles.
    pub elevated_access_ttl_secs: u64,

    /// Roles that receive the shorter access lifetime.
    pub elevated_roles: Vec<String>,

    /// Refresh token validity.
    pub refresh_ttl_secs: u64,

    /// Clock skew tolerated on `exp`/`nbf`.
    pub leeway_secs: u64,
}

impl Default for TokenConfig {
    fn default() -> Self {
        Self {
            secret: String::new(),
            audience: "admission-guard".to_string(),
            issuer: Some("admission-guard".to_string()),
            access_ttl_secs: 3600,
            elevated_access_ttl_secs: 900,
            elevated_roles: vec!["admin".to_string()],
            refresh_ttl_secs: 7 * 24 * 3600,
            leeway_secs: 0,
        }
    }
}

/// Client address resolution.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct NetworkConfig {
    /// Peers allowed to supply `X-Forwarded-For` / `X-Real-IP` (IPs or CIDRs).
    pub trusted_proxies: Vec<String>,
}

/// Per-IP rate limiting configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct IpRateLimitConfig {
    /// Enable IP rate limiting.
    pub enabled: bool,

    /// Requests allowed per window for ordinary paths.
    pub requests_per_window: u32,

    /// Requests allowed per window under `auth_path_prefix`.
    pub auth_requests_per_window: u32,

    /// Window length in seconds.
    pub window_secs: u64,

    /// Path subtree that gets the auth limit.
    pub auth_path_prefix: String,
}

impl Default for IpRateLimitConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            requests_per_window: 200,
            auth_requests_per_window: 50,
            window_secs: 60,
            auth_path_prefix: "/api/auth".to_string(),
        }
    }
}

/// Per-user rate limiting configuration. The window is fixed at one minute.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct UserRateLimitConfig {
    /// Enable user rate limiting.
    pub enabled: bool,

    pub api: u32,
    pub upload: u32,
    pub auth: u32,
    pub admin: u32,

    /// Admin-category limit for `elevated_roles`.
    pub admin_elevated: u32,

    /// Roles that skip user rate limiting entirely.
    pub bypass_roles: Vec<String>,

    /// Roles that get `admin_elevated` on admin paths.
    pub elevated_roles: Vec<String>,

    pub auth_path_prefix: String,
    pub admin_path_prefix: String,
    pub upload_path_prefix: String,
}

impl Default for UserRateLimitConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            api: 100,
            upload: 10,
            auth: 50,
            admin: 50,
            admin_elevated: 500,
            bypass_roles: vec!["admin".to_string()],
            elevated_roles: vec!["moderator".to_string()],
            auth_path_prefix: "/api/auth".to_string(),
            admin_path_prefix: "/api/admin".to_string(),
            upload_path_prefix: "/api/upload".to_string(),
        }
    }
}

/// OTP send limits. The per-phone schedule is fixed.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct OtpConfig {
    /// Maximum OTP requests per source IP within the window.
    pub ip_max_requests: u32,

    /// Per-IP window in seconds.
    pub ip_window_secs: u64,
}

impl Default for OtpConfig {
    fn default() -> Self {
        Self {
            ip_max_requests: 5,
            ip_window_secs: 30 * 60,
        }
    }
}

/// Failed-login lockout configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct LockoutConfig {
    /// TTL of the failure counter; idle failures are forgotten after this.
    pub failure_ttl_secs: u64,
}

impl Default for LockoutConfig {
    fn default() -> Self {
        Self {
            failure_ttl_secs: 24 * 3600,
        }
    }
}

/// Inbound webhook limits.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct WebhookConfig {
    /// Callback sources that bypass limiting (IPs or CIDRs).
    pub whitelist: Vec<String>,

    /// Requests allowed per window for other sources.
    pub max_requests: u32,

    /// Window length in seconds.
    pub window_secs: u64,
}

impl Default for WebhookConfig {
    fn default() -> Self {
        Self {
            whitelist: Vec::new(),
            max_requests: 60,
            window_secs: 60,
        }
    }
}

/// Shared store configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Redis URL. Overridden by `GUARD_REDIS_URL`. In-memory fallback when unset.
    pub redis_url: Option<String>,

    /// Deadline applied to every store call, in milliseconds.
    pub timeout_ms: u64,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            redis_url: None,
            timeout_ms: 250,
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            metrics_enabled: false,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}

/// A development account for the in-process persistence backend.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DevAccount {
    pub id: String,
    pub password: String,
    #[serde(default = "default_role")]
    pub role: String,
    #[serde(default = "default_active")]
    pub active: bool,
}

fn default_role() -> String {
    "user".to_string()
}

fn default_active() -> bool {
    true
}
