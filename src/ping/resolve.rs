//! Setup-time address resolution.

use crate::error::ConfigError;
use log::debug;
use std::net::{IpAddr, Ipv4Addr, ToSocketAddrs};

/// Resolve a configured address to IPv4.
///
/// A dotted-quad literal is used as-is. Anything else is looked up with the
/// system resolver and the first IPv4 answer wins. Failing to find one is a
/// fatal configuration error; this is never retried at runtime.
pub fn resolve_ipv4(address: &str) -> Result<Ipv4Addr, ConfigError> {
    let address = address.trim();
    if address.is_empty() {
        return Err(unresolved(address, "empty address"));
    }
    if let Ok(ip) = address.parse::<Ipv4Addr>() {
        return Ok(ip);
    }

    let answers = (address, 0u16)
        .to_socket_addrs()
        .map_err(|e| unresolved(address, &e.to_string()))?;

    let ip = answers
        .map(|answer| answer.ip())
        .find_map(|ip| match ip {
            IpAddr::V4(v4) => Some(v4),
            IpAddr::V6(_) => None,
        })
        .ok_or_else(|| unresolved(address, "no IPv4 address"))?;

    debug!("resolved {} to {}", address, ip);
    Ok(ip)
}

fn unresolved(address: &str, reason: &str) -> ConfigError {
    ConfigError::UnresolvedAddress {
        address: address.to_string(),
        reason: reason.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_literal_is_used_as_is() {
        assert_eq!(resolve_ipv4("10.0.0.7"), Ok(Ipv4Addr::new(10, 0, 0, 7)));
        assert_eq!(resolve_ipv4(" 10.0.0.7 "), Ok(Ipv4Addr::new(10, 0, 0, 7)));
    }

    #[test]
    fn test_empty_is_unresolved() {
        assert!(matches!(
            resolve_ipv4(""),
            Err(ConfigError::UnresolvedAddress { .. })
        ));
    }

    #[test]
    fn test_reserved_name_is_unresolved() {
        // `.invalid` is guaranteed never to resolve.
        let err = resolve_ipv4("no-such-host.invalid").unwrap_err();
        match err {
            ConfigError::UnresolvedAddress { address, .. } => {
                assert_eq!(address, "no-such-host.invalid")
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn test_localhost_resolves_to_loopback() {
        // Sandboxed hosts may lack a resolver; only check answers we get.
        if let Ok(ip) = resolve_ipv4("localhost") {
            assert!(ip.is_loopback());
        }
    }
}
