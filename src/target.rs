use std::net::Ipv4Addr;

use ipnet::{Ipv4AddrRange, Ipv4Net};

use crate::error::{Error, Result};

/// Parses a network in CIDR notation.
///
/// Host bits are masked off, so `192.168.1.7/24` yields `192.168.1.0/24`.
/// A bare address is read as a single-host `/32` network.
pub fn parse_network(input: &str) -> Result<Ipv4Net> {
    let trimmed = input.trim();
    let parsed = if trimmed.contains('/') {
        trimmed.parse::<Ipv4Net>().map_err(|err| err.to_string())
    } else {
        trimmed
            .parse::<Ipv4Addr>()
            .map_err(|err| err.to_string())
            .and_then(|addr| Ipv4Net::new(addr, 32).map_err(|err| err.to_string()))
    };
    parsed
        .map(|net| net.trunc())
        .map_err(|reason| Error::InvalidNetwork {
            input: input.into(),
            reason,
        })
}

/// Lazily enumerates the usable host addresses of `net`.
///
/// Network and broadcast addresses are skipped for prefixes up to /30. A /31
/// yields both of its addresses and a /32 yields its single address.
pub fn hosts(net: &Ipv4Net) -> Ipv4AddrRange {
    net.hosts()
}

/// Number of usable host addresses in `net`, without enumerating them.
pub fn host_count(net: &Ipv4Net) -> u64 {
    let size = 1u64 << (32 - u32::from(net.prefix_len()));
    if size > 2 {
        size - 2
    } else {
        size
    }
}
