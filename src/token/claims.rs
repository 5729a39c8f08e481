//! Access token claims and issued token pairs.

use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};

/// `aud` claim: tokens from other issuers may carry a single string or an array.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Audience {
    Single(String),
    Many(Vec<String>),
}

impl Audience {
    pub fn contains(&self, audience: &str) -> bool {
        match self {
            Self::Single(aud) => aud == audience,
            Self::Many(auds) => auds.iter().any(|aud| aud == audience),
        }
    }
}

/// Claims carried by a signed access token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessClaims {
    /// Subject (account id).
    pub id: String,
    pub role: String,
    pub exp: u64,
    pub iat: u64,
    pub nbf: u64,
    pub jti: String,
    pub aud: Audience,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub iss: Option<String>,
}

impl AccessClaims {
    /// Seconds until `exp`, zero once expired.
    pub fn remaining_secs(&self, now: u64) -> u64 {
        self.exp.saturating_sub(now)
    }
}

/// Access + refresh token pair returned by login and refresh.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
    pub token_type: String,
    /// Access token lifetime in seconds.
    pub expires_in: u64,
}

/// Current time as unix seconds.
pub fn now_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_audience_accepts_string_or_array() {
        let single: Audience = serde_json::from_str(r#""guard""#).unwrap();
        assert!(single.contains("guard"));

        let many: Audience = serde_json::from_str(r#"["other", "guard"]"#).unwrap();
        assert!(many.contains("guard"));
        assert!(!many.contains("third"));
    }

    #[test]
    fn test_issuer_is_optional() {
        let claims: AccessClaims = serde_json::from_value(serde_json::json!({
            "id": "u1", "role": "user", "exp": 10, "iat": 1, "nbf": 1,
            "jti": "j", "aud": "guard"
        }))
        .unwrap();
        assert!(claims.iss.is_none());
        assert!(!serde_json::to_string(&claims).unwrap().contains("iss"));
        assert_eq!(claims.remaining_secs(4), 6);
        assert_eq!(claims.remaining_secs(40), 0);
    }
}
