//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (limits and windows > 0)
//! - Check that address lists parse as IPs or CIDRs
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: GuardConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::net::SocketAddr;

use ipnetwork::IpNetwork;
use thiserror::Error;

use crate::config::schema::GuardConfig;

/// A single semantic problem in the configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("tokens.secret must be set")]
    MissingSecret,

    #[error("{field} must be greater than zero")]
    NotPositive { field: &'static str },

    #[error("{field}: invalid address entry '{value}'")]
    InvalidAddress { field: &'static str, value: String },

    #[error("{field}: path prefix '{value}' must start with '/'")]
    InvalidPrefix { field: &'static str, value: String },
}

/// Validate a loaded configuration.
pub fn validate_config(config: &GuardConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.tokens.secret.trim().is_empty() {
        errors.push(ValidationError::MissingSecret);
    }

    let positive: [(&'static str, u64); 15] = [
        ("tokens.access_ttl_secs", config.tokens.access_ttl_secs),
        ("tokens.elevated_access_ttl_secs", config.tokens.elevated_access_ttl_secs),
        ("tokens.refresh_ttl_secs", config.tokens.refresh_ttl_secs),
        ("ip_rate_limit.requests_per_window", config.ip_rate_limit.requests_per_window.into()),
        ("ip_rate_limit.auth_requests_per_window", config.ip_rate_limit.auth_requests_per_window.into()),
        ("ip_rate_limit.window_secs", config.ip_rate_limit.window_secs),
        ("user_rate_limit.api", config.user_rate_limit.api.into()),
        ("user_rate_limit.upload", config.user_rate_limit.upload.into()),
        ("user_rate_limit.auth", config.user_rate_limit.auth.into()),
        ("user_rate_limit.admin", config.user_rate_limit.admin.into()),
        ("otp.ip_max_requests", config.otp.ip_max_requests.into()),
        ("otp.ip_window_secs", config.otp.ip_window_secs),
        ("webhook.max_requests", config.webhook.max_requests.into()),
        ("webhook.window_secs", config.webhook.window_secs),
        ("cleanup_interval_secs", config.cleanup_interval_secs),
    ];
    for (field, value) in positive {
        if value == 0 {
            errors.push(ValidationError::NotPositive { field });
        }
    }

    check_addresses("network.trusted_proxies", &config.network.trusted_proxies, &mut errors);
    check_addresses("webhook.whitelist", &config.webhook.whitelist, &mut errors);

    if config.listener.bind_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::InvalidAddress {
            field: "listener.bind_address",
            value: config.listener.bind_address.clone(),
        });
    }

    let prefixes = [
        ("ip_rate_limit.auth_path_prefix", &config.ip_rate_limit.auth_path_prefix),
        ("user_rate_limit.auth_path_prefix", &config.user_rate_limit.auth_path_prefix),
        ("user_rate_limit.admin_path_prefix", &config.user_rate_limit.admin_path_prefix),
        ("user_rate_limit.upload_path_prefix", &config.user_rate_limit.upload_path_prefix),
    ];
    for (field, value) in prefixes {
        if !value.starts_with('/') {
            errors.push(ValidationError::InvalidPrefix {
                field,
                value: value.clone(),
            });
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

fn check_addresses(field: &'static str, entries: &[String], errors: &mut Vec<ValidationError>) {
    for entry in entries {
        if entry.trim().parse::<IpNetwork>().is_err() {
            errors.push(ValidationError::InvalidAddress {
                field,
                value: entry.clone(),
            });
        }
    }
}
