//! Shared application state and its construction from config.

use std::ops::ControlFlow;
use std::sync::Arc;
use std::time::{Duration, Instant};

use arc_swap::ArcSwap;

use crate::config::GuardConfig;
use crate::error::{GuardError, GuardResult};
use crate::http::providers::OtpProvider;
use crate::identity::TrustedProxies;
use crate::lifecycle::{spawn_periodic, spawn_sweeper, Shutdown, SweepHandle};
use crate::security::{
    AccountLockout, IpRateLimiter, OtpRateLimiter, UserRateLimiter, WebhookLimiter,
};
use crate::store::{CredentialVerifier, Persistence, StoreHandle};
use crate::token::TokenEngine;

/// External collaborators the guard is built around.
pub struct Collaborators {
    pub persistence: Arc<dyn Persistence>,
    pub credentials: Arc<dyn CredentialVerifier>,
    pub otp_provider: Arc<dyn OtpProvider>,
    pub store: Option<StoreHandle>,
}

/// Application state injected into handlers and middleware.
#[derive(Clone)]
pub struct AppState {
    pub tokens: Arc<TokenEngine>,
    pub ip_limiter: Arc<IpRateLimiter>,
    pub user_limiter: Arc<UserRateLimiter>,
    pub otp_limiter: Arc<OtpRateLimiter>,
    pub lockout: Arc<AccountLockout>,
    pub webhook_limiter: Arc<WebhookLimiter>,
    pub trusted_proxies: Arc<ArcSwap<TrustedProxies>>,
    pub persistence: Arc<dyn Persistence>,
    pub credentials: Arc<dyn CredentialVerifier>,
    pub otp_provider: Arc<dyn OtpProvider>,
    pub shared_store: bool,
    pub started_at: Instant,
}

impl AppState {
    pub fn new(config: &GuardConfig, collaborators: Collaborators) -> GuardResult<Self> {
        let Collaborators {
            persistence,
            credentials,
            otp_provider,
            store,
        } = collaborators;

        let trusted_proxies = TrustedProxies::parse(&config.network.trusted_proxies)
            .map_err(|e| GuardError::ConfigurationInvalid(format!("network.trusted_proxies: {e}")))?;
        let webhook_limiter = WebhookLimiter::from_config(&config.webhook)
            .map_err(|e| GuardError::ConfigurationInvalid(format!("webhook.whitelist: {e}")))?;
        let tokens = TokenEngine::new(config.tokens.clone(), persistence.clone(), store.clone())?;

        Ok(Self {
            tokens: Arc::new(tokens),
            ip_limiter: Arc::new(IpRateLimiter::new(config.ip_rate_limit.clone())),
            user_limiter: Arc::new(UserRateLimiter::new(config.user_rate_limit.clone())),
            otp_limiter: Arc::new(OtpRateLimiter::new(&config.otp)),
            lockout: Arc::new(AccountLockout::new(&config.lockout, store.clone())),
            webhook_limiter: Arc::new(webhook_limiter),
            trusted_proxies: Arc::new(ArcSwap::from_pointee(trusted_proxies)),
            persistence,
            credentials,
            otp_provider,
            shared_store: store.is_some(),
            started_at: Instant::now(),
        })
    }

    /// Apply a reloaded config: rate limits and trusted proxies are swapped,
    /// everything else needs a restart.
    pub fn reload(&self, config: &GuardConfig) {
        match TrustedProxies::parse(&config.network.trusted_proxies) {
            Ok(proxies) => self.trusted_proxies.store(Arc::new(proxies)),
            Err(e) => {
                tracing::error!(error = %e, "Invalid trusted proxies in reloaded config, keeping current list")
            }
        }
        self.ip_limiter.reconfigure(config.ip_rate_limit.clone());
        self.user_limiter.reconfigure(config.user_rate_limit.clone());
        tracing::info!(
            ip_limit = config.ip_rate_limit.requests_per_window,
            user_api_limit = config.user_rate_limit.api,
            "Rate limits reloaded; token, OTP, lockout and webhook settings apply on restart"
        );
    }

    /// Start the periodic sweep of every limiter and the revocation table purge.
    pub fn spawn_sweepers(&self, interval: Duration, shutdown: &Shutdown) -> Vec<SweepHandle> {
        let tokens = Arc::downgrade(&self.tokens);
        let purge = spawn_periodic("revocations", interval, shutdown.subscribe(), move || {
            let tokens = tokens.upgrade();
            async move {
                let Some(tokens) = tokens else {
                    return ControlFlow::Break(());
                };
                match tokens.purge_expired_revocations().await {
                    Ok(0) => {}
                    Ok(purged) => tracing::debug!(purged, "Expired revocations purged"),
                    Err(e) => tracing::warn!(error = %e, "Revocation purge failed"),
                }
                ControlFlow::Continue(())
            }
        });

        vec![
            spawn_sweeper(&self.ip_limiter, interval, shutdown.subscribe()),
            spawn_sweeper(&self.user_limiter, interval, shutdown.subscribe()),
            spawn_sweeper(&self.otp_limiter, interval, shutdown.subscribe()),
            spawn_sweeper(&self.lockout, interval, shutdown.subscribe()),
            spawn_sweeper(&self.webhook_limiter, interval, shutdown.subscribe()),
            purge,
        ]
    }
}
