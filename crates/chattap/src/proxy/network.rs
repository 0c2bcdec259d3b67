//! Upstream host classification for TLS relaxation
//!
//! A host that resolves to a loopback, link-local or private-range address is
//! treated as internal, and certificate verification is skipped for it. The
//! check is best-effort: resolution failures classify the host as public and
//! never block the request.

use std::net::IpAddr;

/// Result of resolving and classifying an upstream host
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct HostClass {
    /// The host resolved to a private, loopback or link-local address
    pub is_private: bool,
    /// The resolved address, `None` when resolution failed
    pub addr: Option<IpAddr>,
}

impl HostClass {
    fn from_addr(addr: IpAddr) -> Self {
        Self {
            is_private: is_private_ip(addr),
            addr: Some(addr),
        }
    }
}

/// Resolve `host` with the system resolver and classify the first address.
///
/// IPv4 results are preferred when a name resolves to both families.
pub async fn classify_host(host: &str) -> HostClass {
    let host = host.trim_start_matches('[').trim_end_matches(']');

    if let Ok(addr) = host.parse::<IpAddr>() {
        return HostClass::from_addr(addr);
    }

    match tokio::net::lookup_host((host, 0)).await {
        Ok(addrs) => {
            let addrs: Vec<IpAddr> = addrs.map(|a| a.ip()).collect();
            addrs
                .iter()
                .find(|a| a.is_ipv4())
                .or_else(|| addrs.first())
                .map(|a| HostClass::from_addr(*a))
                .unwrap_or_default()
        }
        Err(e) => {
            tracing::debug!("Could not resolve {host}: {e}");
            HostClass::default()
        }
    }
}

/// Whether `ip` is loopback, link-local, or in a private range
pub fn is_private_ip(ip: IpAddr) -> bool {
    match ip {
        IpAddr::V4(v4) => v4.is_private() || v4.is_loopback() || v4.is_link_local(),
        IpAddr::V6(v6) => match v6.to_ipv4_mapped() {
            Some(v4) => is_private_ip(IpAddr::V4(v4)),
            None => v6.is_loopback() || v6.is_unique_local() || v6.is_unicast_link_local(),
        },
    }
}

/// How the outbound call for one request is made
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TlsPolicy {
    /// Shared pooled client, honouring the configured verification setting
    Pooled,
    /// One-off client with certificate verification disabled
    Unverified,
}

impl TlsPolicy {
    /// Pick the policy for a host.
    ///
    /// Private hosts only ever relax verification; when verification is
    /// already off globally the pooled client is used as-is.
    pub fn select(verify_ssl: bool, host: &HostClass) -> Self {
        if verify_ssl && host.is_private {
            TlsPolicy::Unverified
        } else {
            TlsPolicy::Pooled
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::{Ipv4Addr, Ipv6Addr};

    #[test]
    fn test_private_ipv4_ranges() {
        for ip in ["10.1.2.3", "172.16.0.1", "192.168.1.10", "127.0.0.1", "169.254.0.5"] {
            assert!(is_private_ip(ip.parse().unwrap()), "{ip} should be private");
        }
    }

    #[test]
    fn test_public_ipv4() {
        for ip in ["8.8.8.8", "1.1.1.1", "172.32.0.1", "100.64.0.1"] {
            assert!(!is_private_ip(ip.parse().unwrap()), "{ip} should be public");
        }
    }

    #[test]
    fn test_ipv6_classification() {
        assert!(is_private_ip(IpAddr::V6(Ipv6Addr::LOCALHOST)));
        assert!(is_private_ip("fe80::1".parse().unwrap()));
        assert!(is_private_ip("fd00::1".parse().unwrap()));
        assert!(is_private_ip("::ffff:192.168.0.1".parse().unwrap()));
        assert!(!is_private_ip("2606:4700::1111".parse().unwrap()));
    }

    #[tokio::test]
    async fn test_classify_ip_literals() {
        let class = classify_host("127.0.0.1").await;
        assert!(class.is_private);
        assert_eq!(class.addr, Some(IpAddr::V4(Ipv4Addr::LOCALHOST)));

        let class = classify_host("[::1]").await;
        assert!(class.is_private);

        let class = classify_host("8.8.8.8").await;
        assert!(!class.is_private);
    }

    #[tokio::test]
    async fn test_unresolvable_host_is_not_private() {
        let class = classify_host("does-not-exist.invalid").await;
        assert!(!class.is_private);
        assert!(class.addr.is_none());
    }

    #[test]
    fn test_private_upstream_relaxes_verification() {
        let private = HostClass::from_addr("127.0.0.1".parse().unwrap());
        assert_eq!(TlsPolicy::select(true, &private), TlsPolicy::Unverified);
    }

    #[test]
    fn test_public_upstream_keeps_verification() {
        let public = HostClass::from_addr("8.8.8.8".parse().unwrap());
        assert_eq!(TlsPolicy::select(true, &public), TlsPolicy::Pooled);
    }

    #[test]
    fn test_never_tightens_disabled_verification() {
        let public = HostClass::from_addr("8.8.8.8".parse().unwrap());
        let private = HostClass::from_addr("10.0.0.1".parse().unwrap());
        assert_eq!(TlsPolicy::select(false, &public), TlsPolicy::Pooled);
        assert_eq!(TlsPolicy::select(false, &private), TlsPolicy::Pooled);
    }
}
