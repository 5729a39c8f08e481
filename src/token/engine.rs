//! Token issuance and validation.
//!
//! Access tokens are HS256 JWTs. The algorithm is checked against the raw
//! header before any verification, so a token that names another algorithm
//! (including `none`) is rejected even if every other part is well formed.
//!
//! Refresh tokens are opaque random identifiers backed by a persisted record.
//!
//! Revocation lookup order:
//! ```text
//! shared store configured → store lookup (error → fail open, consult table)
//! no shared store         → persisted revocation table (error → fail open)
//! ```

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use rand::distributions::Alphanumeric;
use rand::rngs::OsRng;
use rand::Rng;
use serde::Deserialize;
use uuid::Uuid;

use crate::config::TokenConfig;
use crate::error::{GuardError, GuardResult};
use crate::observability::metrics;
use crate::store::{Persistence, RefreshTokenRecord, StoreHandle};
use crate::token::claims::{now_secs, AccessClaims, Audience, TokenPair};

const ALGORITHM: Algorithm = Algorithm::HS256;
const ALGORITHM_NAME: &str = "HS256";
const REFRESH_TOKEN_LEN: usize = 48;
const REVOKED_PREFIX: &str = "revoked:";

#[derive(Deserialize)]
struct RawHeader {
    alg: String,
}

pub struct TokenEngine {
    config: TokenConfig,
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    validation: Validation,
    persistence: Arc<dyn Persistence>,
    store: Option<StoreHandle>,
    /// Set once a revocation had to be written to the table instead of the store.
    table_revocations: AtomicBool,
}

impl TokenEngine {
    pub fn new(
        config: TokenConfig,
        persistence: Arc<dyn Persistence>,
        store: Option<StoreHandle>,
    ) -> GuardResult<Self> {
        if config.secret.trim().is_empty() {
            return Err(GuardError::ConfigurationMissing("tokens.secret"));
        }

        let mut validation = Validation::new(ALGORITHM);
        validation.leeway = config.leeway_secs;
        validation.validate_exp = true;
        validation.validate_nbf = true;
        validation.set_audience(&[config.audience.as_str()]);
        if let Some(issuer) = &config.issuer {
            validation.set_issuer(&[issuer.as_str()]);
            validation.set_required_spec_claims(&["exp", "nbf", "aud", "iss"]);
        } else {
            validation.set_required_spec_claims(&["exp", "nbf", "aud"]);
        }

        Ok(Self {
            encoding_key: EncodingKey::from_secret(config.secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(config.secret.as_bytes()),
            validation,
            persistence,
            store,
            config,
            table_revocations: AtomicBool::new(false),
        })
    }

    /// Default access token lifetime for `role`.
    pub fn access_ttl_for(&self, role: &str) -> Duration {
        let secs = if self.config.elevated_roles.iter().any(|r| r == role) {
            self.config.elevated_access_ttl_secs
        } else {
            self.config.access_ttl_secs
        };
        Duration::from_secs(secs)
    }

    /// Longest lifetime any access token can have.
    pub fn max_access_ttl(&self) -> Duration {
        Duration::from_secs(
            self.config
                .access_ttl_secs
                .max(self.config.elevated_access_ttl_secs),
        )
    }

    /// Sign an access token. `ttl` defaults to the role's lifetime.
    pub fn issue_access_token(
        &self,
        subject: &str,
        role: &str,
        ttl: Option<Duration>,
    ) -> GuardResult<(String, AccessClaims)> {
        let ttl = ttl.unwrap_or_else(|| self.access_ttl_for(role));
        let now = now_secs();
        let claims = AccessClaims {
            id: subject.to_string(),
            role: role.to_string(),
            exp: now + ttl.as_secs(),
            iat: now,
            nbf: now,
            jti: Uuid::new_v4().to_string(),
            aud: Audience::Single(self.config.audience.clone()),
            iss: self.config.issuer.clone(),
        };

        let token = encode(&Header::new(ALGORITHM), &claims, &self.encoding_key)
            .map_err(|e| GuardError::TokenEncoding(e.to_string()))?;
        Ok((token, claims))
    }

    /// Create and persist a refresh token for `subject`.
    pub async fn issue_refresh_token(&self, subject: &str) -> GuardResult<(String, RefreshTokenRecord)> {
        let now = now_secs();
        let record = RefreshTokenRecord {
            jti: random_token(),
            user_id: subject.to_string(),
            created_at: now,
            expires_at: now + self.config.refresh_ttl_secs,
            revoked: false,
        };
        self.persistence.create_refresh_token(&record).await?;
        Ok((record.jti.clone(), record))
    }

    pub async fn validate_access_token(&self, token: &str) -> GuardResult<AccessClaims> {
        let result = match self.decode_claims(token) {
            Ok(claims) => {
                if self.is_revoked(&claims.jti).await {
                    Err(GuardError::TokenRevoked)
                } else {
                    Ok(claims)
                }
            }
            Err(e) => Err(e),
        };

        if let Err(e) = &result {
            metrics::record_token_rejected(e.reason());
            tracing::debug!(reason = e.reason(), error = %e, "Access token rejected");
        }
        result
    }

    pub async fn validate_refresh_token(&self, jti: &str) -> GuardResult<RefreshTokenRecord> {
        let record = self
            .persistence
            .find_refresh_token(jti)
            .await?
            .ok_or(GuardError::RefreshTokenNotFound)?;
        if record.revoked {
            return Err(GuardError::RefreshTokenRevoked);
        }
        if record.expires_at <= now_secs() {
            return Err(GuardError::RefreshTokenExpired);
        }
        Ok(record)
    }

    /// Revoke an access token id for `ttl`.
    pub async fn revoke(&self, jti: &str, ttl: Duration) -> GuardResult<()> {
        let ttl = ttl.max(Duration::from_secs(1));
        if let Some(store) = &self.store {
            match store.set(&revocation_key(jti), "1", Some(ttl)).await {
                Ok(()) => return Ok(()),
                Err(e) => {
                    metrics::record_store_fallback("revocation_write");
                    tracing::warn!(jti, error = %e, "Shared store unavailable, persisting revocation");
                    self.table_revocations.store(true, Ordering::Relaxed);
                }
            }
        }
        self.persistence
            .insert_revoked_token(jti, now_secs() + ttl.as_secs())
            .await?;
        Ok(())
    }

    /// Issue an access + refresh pair.
    pub async fn issue_session(&self, subject: &str, role: &str) -> GuardResult<TokenPair> {
        let (access_token, claims) = self.issue_access_token(subject, role, None)?;
        let (refresh_token, _) = self.issue_refresh_token(subject).await?;
        Ok(TokenPair {
            access_token,
            refresh_token,
            token_type: "Bearer".to_string(),
            expires_in: claims.exp - claims.iat,
        })
    }

    /// Rotate a refresh token: the presented one is revoked and a new pair issued.
    pub async fn refresh_session(&self, refresh_jti: &str) -> GuardResult<TokenPair> {
        let record = self.validate_refresh_token(refresh_jti).await?;
        let account = self
            .persistence
            .find_account(&record.user_id)
            .await?
            .filter(|account| account.active)
            .ok_or(GuardError::InvalidCredentials)?;

        self.persistence.revoke_refresh_token(refresh_jti).await?;
        tracing::debug!(user_id = %account.id, "Refresh token rotated");
        self.issue_session(&account.id, &account.role).await
    }

    /// Revoke the caller's access token for its remaining lifetime, and the
    /// given refresh token when it belongs to the same account.
    pub async fn logout(&self, claims: &AccessClaims, refresh_jti: Option<&str>) -> GuardResult<()> {
        let remaining = Duration::from_secs(claims.remaining_secs(now_secs()));
        self.revoke(&claims.jti, remaining).await?;

        if let Some(jti) = refresh_jti {
            match self.persistence.find_refresh_token(jti).await? {
                Some(record) if record.user_id == claims.id => {
                    self.persistence.revoke_refresh_token(jti).await?;
                }
                _ => return Err(GuardError::RefreshTokenNotFound),
            }
        }
        Ok(())
    }

    /// Drop persisted revocations that have run out.
    pub async fn purge_expired_revocations(&self) -> GuardResult<u64> {
        Ok(self.persistence.purge_expired_revocations(now_secs()).await?)
    }

    fn decode_claims(&self, token: &str) -> GuardResult<AccessClaims> {
        check_algorithm(token)?;
        decode::<AccessClaims>(token, &self.decoding_key, &self.validation)
            .map(|data| data.claims)
            .map_err(map_jwt_error)
    }

    async fn is_revoked(&self, jti: &str) -> bool {
        if let Some(store) = &self.store {
            match store.get(&revocation_key(jti)).await {
                Ok(Some(_)) => return true,
                Ok(None) if !self.table_revocations.load(Ordering::Relaxed) => return false,
                Ok(None) => {}
                Err(e) => {
                    metrics::record_store_fallback("revocation_check");
                    tracing::warn!(jti, error = %e, "Revocation store unavailable, checking persisted table");
                }
            }
        }

        match self.persistence.find_revoked_token(jti).await {
            Ok(Some(until)) => until > now_secs(),
            Ok(None) => false,
            Err(e) => {
                metrics::record_store_fallback("revocation_table");
                tracing::warn!(jti, error = %e, "Revocation table unavailable, treating token as not revoked");
                false
            }
        }
    }
}

/// Reject any token whose header names an algorithm other than HS256.
fn check_algorithm(token: &str) -> GuardResult<()> {
    let mut segments = token.split('.');
    let header = segments.next().filter(|s| !s.is_empty());
    let (Some(header), Some(_), Some(_), None) =
        (header, segments.next(), segments.next(), segments.next())
    else {
        return Err(GuardError::TokenMalformed);
    };

    let bytes = URL_SAFE_NO_PAD
        .decode(header)
        .map_err(|_| GuardError::TokenMalformed)?;
    let header: RawHeader = serde_json::from_slice(&bytes).map_err(|_| GuardError::TokenMalformed)?;
    if header.alg != ALGORITHM_NAME {
        return Err(GuardError::TokenAlgorithmRejected(header.alg));
    }
    Ok(())
}

fn map_jwt_error(err: jsonwebtoken::errors::Error) -> GuardError {
    match err.kind() {
        ErrorKind::ExpiredSignature => GuardError::TokenExpired,
        ErrorKind::ImmatureSignature => GuardError::TokenNotYetValid,
        ErrorKind::InvalidAudience => GuardError::TokenAudienceMismatch,
        ErrorKind::InvalidIssuer => GuardError::TokenIssuerMismatch,
        ErrorKind::MissingRequiredClaim(claim) if claim.as_str() == "iss" => GuardError::TokenIssuerMismatch,
        ErrorKind::InvalidSignature => GuardError::TokenSignatureInvalid,
        ErrorKind::InvalidAlgorithm | ErrorKind::InvalidAlgorithmName => {
            GuardError::TokenAlgorithmRejected(ALGORITHM_NAME.to_string())
        }
        _ => GuardError::TokenMalformed,
    }
}

fn random_token() -> String {
    OsRng
        .sample_iter(&Alphanumeric)
        .take(REFRESH_TOKEN_LEN)
        .map(char::from)
        .collect()
}

fn revocation_key(jti: &str) -> String {
    format!("{REVOKED_PREFIX}{jti}")
}
