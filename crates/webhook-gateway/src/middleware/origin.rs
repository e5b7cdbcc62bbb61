//! Payment-provider origin validation
//!
//! The provider does not sign webhook bodies, so the only origin control
//! is its published IP ranges. The allow-list can be overridden with the
//! `PAYMENT_IP_ALLOWLIST` env var (comma-separated CIDRs) for staging.

use actix_web::HttpRequest;
use std::net::IpAddr;
use std::str::FromStr;

/// Published notification source ranges of the payment provider
const DEFAULT_PROVIDER_IP_RANGES: &[&str] = &[
    "185.71.76.0/27",
    "185.71.77.0/27",
    "77.75.153.0/25",
    "77.75.156.11",
    "77.75.156.35",
    "77.75.154.128/25",
    "2a02:5180::/32",
];

/// Check whether a request IP belongs to the provider's allow-list
pub fn is_allowed_origin(ip: &str) -> bool {
    let ip_addr = match IpAddr::from_str(ip) {
        Ok(addr) => addr,
        Err(_) => return false,
    };

    let override_list = std::env::var("PAYMENT_IP_ALLOWLIST").ok();
    let ranges: Vec<&str> = match override_list.as_deref() {
        Some(list) => list.split(',').map(str::trim).collect(),
        None => DEFAULT_PROVIDER_IP_RANGES.to_vec(),
    };

    ranges.iter().any(|range| ip_in_range(&ip_addr, range))
}

/// Check if an IP is within a range given as CIDR or as a bare address
fn ip_in_range(ip: &IpAddr, range: &str) -> bool {
    let (network, prefix_len) = match range.split_once('/') {
        Some((addr, len)) => {
            let network = match IpAddr::from_str(addr) {
                Ok(addr) => addr,
                Err(_) => return false,
            };
            let prefix_len: u8 = match len.parse() {
                Ok(len) => len,
                Err(_) => return false,
            };
            (network, prefix_len)
        }
        // Bare address: exact match
        None => match IpAddr::from_str(range) {
            Ok(addr) if addr.is_ipv4() => (addr, 32),
            Ok(addr) => (addr, 128),
            Err(_) => return false,
        },
    };

    match (ip, network) {
        (IpAddr::V4(ip_v4), IpAddr::V4(net_v4)) => {
            if prefix_len > 32 {
                return false;
            }
            let ip_u32 = u32::from(*ip_v4);
            let net_u32 = u32::from(net_v4);
            let mask = if prefix_len == 0 {
                0
            } else {
                !0u32 << (32 - prefix_len)
            };
            (ip_u32 & mask) == (net_u32 & mask)
        }
        (IpAddr::V6(ip_v6), IpAddr::V6(net_v6)) => {
            if prefix_len > 128 {
                return false;
            }
            let ip_u128 = u128::from(*ip_v6);
            let net_u128 = u128::from(net_v6);
            let mask = if prefix_len == 0 {
                0
            } else {
                !0u128 << (128 - prefix_len)
            };
            (ip_u128 & mask) == (net_u128 & mask)
        }
        _ => false,
    }
}

/// Extract the client IP, preferring the first X-Forwarded-For hop
/// (the gateway sits behind a trusted reverse proxy)
pub fn extract_client_ip(req: &HttpRequest) -> String {
    if let Some(forwarded) = req.headers().get("X-Forwarded-For") {
        if let Ok(value) = forwarded.to_str() {
            if let Some(first_ip) = value.split(',').next() {
                return first_ip.trim().to_string();
            }
        }
    }

    req.connection_info()
        .peer_addr()
        .map(|s| s.to_string())
        .unwrap_or_else(|| "unknown".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_provider_ranges_accept_known_ips() {
        assert!(is_allowed_origin("185.71.76.5"));
        assert!(is_allowed_origin("185.71.77.30"));
        assert!(is_allowed_origin("77.75.153.100"));
        assert!(is_allowed_origin("77.75.154.200"));
    }

    #[test]
    fn test_bare_addresses_match_exactly() {
        assert!(is_allowed_origin("77.75.156.11"));
        assert!(is_allowed_origin("77.75.156.35"));
        assert!(!is_allowed_origin("77.75.156.12"));
    }

    #[test]
    fn test_ipv6_range() {
        assert!(is_allowed_origin("2a02:5180::1"));
        assert!(is_allowed_origin("2a02:5180:abcd::42"));
        assert!(!is_allowed_origin("2a02:5181::1"));
    }

    #[test]
    fn test_unknown_ips_rejected() {
        assert!(!is_allowed_origin("8.8.8.8"));
        assert!(!is_allowed_origin("127.0.0.1"));
        assert!(!is_allowed_origin("185.71.76.32"));
    }

    #[test]
    fn test_garbage_input_rejected() {
        assert!(!is_allowed_origin("not-an-ip"));
        assert!(!is_allowed_origin(""));
    }

    #[test]
    fn test_ip_in_range_boundaries() {
        let ip = IpAddr::from_str("10.0.0.255").unwrap();
        let outside = IpAddr::from_str("10.0.1.0").unwrap();
        assert!(ip_in_range(&ip, "10.0.0.0/24"));
        assert!(!ip_in_range(&outside, "10.0.0.0/24"));
    }

    #[test]
    fn test_ip_in_range_invalid_cidr() {
        let ip = IpAddr::from_str("10.0.0.1").unwrap();
        assert!(!ip_in_range(&ip, "10.0.0.0/33"));
        assert!(!ip_in_range(&ip, "not-a-cidr/24"));
    }

    #[test]
    fn test_ip_in_range_zero_prefix() {
        let ipv4 = IpAddr::from_str("203.0.113.7").unwrap();
        let ipv6 = IpAddr::from_str("2001:db8::1").unwrap();
        assert!(ip_in_range(&ipv4, "0.0.0.0/0"));
        assert!(ip_in_range(&ipv6, "::/0"));
    }

    #[test]
    fn test_ip_in_range_family_mismatch() {
        let ipv4 = IpAddr::from_str("10.0.0.1").unwrap();
        assert!(!ip_in_range(&ipv4, "2a02:5180::/32"));
    }
}
