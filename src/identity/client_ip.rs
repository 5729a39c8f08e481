//! Client address resolution.
//!
//! Forwarding headers are honoured only when the immediate peer is a
//! configured trusted proxy. Any other peer is taken at face value, so a
//! client cannot pick its own rate-limit key by sending `X-Forwarded-For`.

use std::convert::Infallible;
use std::net::IpAddr;

use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use axum::http::HeaderMap;
use ipnetwork::{IpNetwork, IpNetworkError};

const X_FORWARDED_FOR: &str = "x-forwarded-for";
const X_REAL_IP: &str = "x-real-ip";

/// Peers allowed to supply client-IP override headers.
#[derive(Debug, Clone, Default)]
pub struct TrustedProxies {
    networks: Vec<IpNetwork>,
}

impl TrustedProxies {
    /// Parse IPs and CIDRs. A bare IP is a single-host network.
    pub fn parse<S: AsRef<str>>(entries: &[S]) -> Result<Self, IpNetworkError> {
        let networks = entries
            .iter()
            .map(|entry| entry.as_ref().trim().parse())
            .collect::<Result<Vec<IpNetwork>, _>>()?;
        Ok(Self { networks })
    }

    pub fn is_trusted(&self, peer: IpAddr) -> bool {
        self.networks.iter().any(|net| net.contains(peer))
    }

    /// Effective client address for a request from `peer`.
    pub fn resolve(&self, peer: IpAddr, headers: &HeaderMap) -> IpAddr {
        if !self.is_trusted(peer) {
            return peer;
        }
        forwarded_for(headers)
            .or_else(|| real_ip(headers))
            .unwrap_or(peer)
    }

    pub fn len(&self) -> usize {
        self.networks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.networks.is_empty()
    }
}

/// First (client-most) entry of `X-Forwarded-For`.
fn forwarded_for(headers: &HeaderMap) -> Option<IpAddr> {
    headers
        .get(X_FORWARDED_FOR)?
        .to_str()
        .ok()?
        .split(',')
        .next()?
        .trim()
        .parse()
        .ok()
}

fn real_ip(headers: &HeaderMap) -> Option<IpAddr> {
    headers.get(X_REAL_IP)?.to_str().ok()?.trim().parse().ok()
}

/// Resolved client address, stored as a request extension by the IP middleware.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClientIp(pub IpAddr);

impl<S> FromRequestParts<S> for ClientIp
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        if let Some(ip) = parts.extensions.get::<ClientIp>() {
            return Ok(*ip);
        }
        let peer = parts
            .extensions
            .get::<axum::extract::ConnectInfo<std::net::SocketAddr>>()
            .map(|info| info.0.ip())
            .unwrap_or(IpAddr::from([0, 0, 0, 0]));
        Ok(ClientIp(peer))
    }
}

#[cfg(test)]
mod tests {
    use axum::http::HeaderValue;

    use super::*;

    fn headers(pairs: &[(&'static str, &'static str)]) -> HeaderMap {
        let mut map = HeaderMap::new();
        for (name, value) in pairs {
            map.insert(*name, HeaderValue::from_static(value));
        }
        map
    }

    fn ip(s: &str) -> IpAddr {
        s.parse().unwrap()
    }

    #[test]
    fn test_trusted_peer_uses_first_forwarded_entry() {
        let proxies = TrustedProxies::parse(&["198.51.100.0/24"]).unwrap();
        let h = headers(&[("x-forwarded-for", "203.0.113.7, 198.51.100.10")]);
        assert_eq!(proxies.resolve(ip("198.51.100.10"), &h), ip("203.0.113.7"));
    }

    #[test]
    fn test_untrusted_peer_ignores_headers() {
        let proxies = TrustedProxies::parse(&["198.51.100.0/24"]).unwrap();
        let h = headers(&[
            ("x-forwarded-for", "203.0.113.7, 198.51.100.10"),
            ("x-real-ip", "203.0.113.8"),
        ]);
        assert_eq!(proxies.resolve(ip("203.0.113.9"), &h), ip("203.0.113.9"));
    }

    #[test]
    fn test_real_ip_and_fallbacks() {
        let proxies = TrustedProxies::parse(&["10.0.0.1"]).unwrap();
        let peer = ip("10.0.0.1");

        let h = headers(&[("x-real-ip", "203.0.113.8")]);
        assert_eq!(proxies.resolve(peer, &h), ip("203.0.113.8"));

        let h = headers(&[("x-forwarded-for", "garbage"), ("x-real-ip", "203.0.113.8")]);
        assert_eq!(proxies.resolve(peer, &h), ip("203.0.113.8"));

        assert_eq!(proxies.resolve(peer, &HeaderMap::new()), peer);
    }

    #[test]
    fn test_empty_list_trusts_nobody() {
        let proxies = TrustedProxies::default();
        let h = headers(&[("x-forwarded-for", "203.0.113.7")]);
        assert_eq!(proxies.resolve(ip("127.0.0.1"), &h), ip("127.0.0.1"));
        assert!(TrustedProxies::parse(&["nonsense"]).is_err());
    }
}
