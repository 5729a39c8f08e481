//! OTP delivery collaborator.

use async_trait::async_trait;
use dashmap::DashMap;
use rand::Rng;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum OtpProviderError {
    #[error("delivery failed: {0}")]
    Delivery(String),
}

/// Sends one-time codes and checks them.
#[async_trait]
pub trait OtpProvider: Send + Sync {
    async fn send(&self, phone: &str) -> Result<(), OtpProviderError>;

    /// True when `code` is the outstanding code for `phone`. A matching code is consumed.
    async fn verify(&self, phone: &str, code: &str) -> Result<bool, OtpProviderError>;
}

/// Development provider: codes are written to the log instead of sent.
#[derive(Debug, Default)]
pub struct LogOtpProvider {
    codes: DashMap<String, String>,
}

impl LogOtpProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// Outstanding code for `phone`, for tests.
    pub fn code_for(&self, phone: &str) -> Option<String> {
        self.codes.get(phone).map(|c| c.value().clone())
    }
}

#[async_trait]
impl OtpProvider for LogOtpProvider {
    async fn send(&self, phone: &str) -> Result<(), OtpProviderError> {
        let code = format!("{:06}", rand::thread_rng().gen_range(0..1_000_000));
        tracing::info!(phone = %phone, code = %code, "OTP issued (log delivery)");
        self.codes.insert(phone.to_string(), code);
        Ok(())
    }

    async fn verify(&self, phone: &str, code: &str) -> Result<bool, OtpProviderError> {
        Ok(self
            .codes
            .remove_if(phone, |_, expected| expected == code)
            .is_some())
    }
}
