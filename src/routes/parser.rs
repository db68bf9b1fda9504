// Routing table parsing for `netstat -f inet -rn` output

use std::net::Ipv4Addr;

use super::address::{classful_prefix_len, pad_dotted_quad};
use super::{LiveRouteEntry, MAX_PREFIX_LEN};

/// Interface column when the dump carries no header (Yosemite layout:
/// Destination Gateway Flags Refs Use Netif Expire)
const DEFAULT_NETIF_COLUMN: usize = 5;

/// The live IPv4 routing table, re-read on every run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RouteTableSnapshot {
    pub entries: Vec<LiveRouteEntry>,
}

impl RouteTableSnapshot {
    /// Parse a routing table dump.
    ///
    /// Only rows whose gateway is an IPv4 address are kept, and the default
    /// route is dropped. Destinations without an explicit `/len` get a classful
    /// prefix length (see [`classful_prefix_len`]), which is a guess and not a
    /// real CIDR inference.
    pub fn parse(raw: &str) -> Self {
        let mut entries = Vec::new();
        let mut netif_column = DEFAULT_NETIF_COLUMN;

        for line in raw.lines() {
            let parts: Vec<&str> = line.split_whitespace().collect();

            if let Some(column) = header_netif_column(&parts) {
                netif_column = column;
                continue;
            }

            if parts.len() <= netif_column {
                continue;
            }
            if parts[0].contains("default") {
                continue;
            }

            let gateway: Ipv4Addr = match parts[1].parse() {
                Ok(gateway) => gateway,
                Err(_) => continue,
            };

            let Some((destination, prefix_len)) = parse_destination(parts[0]) else {
                tracing::debug!("Skipping unparsable route destination: {}", parts[0]);
                continue;
            };

            entries.push(LiveRouteEntry {
                destination,
                prefix_len,
                gateway,
                interface: parts[netif_column].to_string(),
            });
        }

        RouteTableSnapshot { entries }
    }

    /// Whether a route to exactly `destination/prefix_len` is installed
    pub fn contains(&self, destination: Ipv4Addr, prefix_len: u8) -> bool {
        self.entries
            .iter()
            .any(|entry| entry.destination == destination && entry.prefix_len == prefix_len)
    }

    pub fn on_interface<'a>(&'a self, interface: &'a str) -> impl Iterator<Item = &'a LiveRouteEntry> + 'a {
        self.entries.iter().filter(move |entry| entry.interface == interface)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Parse a netstat destination such as `10.0.1/24`, `192.168.1` or `127`
pub fn parse_destination(token: &str) -> Option<(Ipv4Addr, u8)> {
    let (target, mask) = match token.split_once('/') {
        Some((target, mask)) => (target, Some(mask)),
        None => (token, None),
    };

    let destination: Ipv4Addr = pad_dotted_quad(target).parse().ok()?;
    let prefix_len = match mask {
        Some(mask) => mask.parse::<u8>().ok().filter(|len| *len <= MAX_PREFIX_LEN)?,
        None => classful_prefix_len(destination),
    };

    Some((destination, prefix_len))
}

/// Find the interface holding the default route.
///
/// When several default routes are listed the last one wins.
pub fn default_interface(raw: &str) -> Option<String> {
    let mut netif_column = DEFAULT_NETIF_COLUMN;
    let mut interface = None;

    for line in raw.lines() {
        let parts: Vec<&str> = line.split_whitespace().collect();

        if let Some(column) = header_netif_column(&parts) {
            netif_column = column;
            continue;
        }

        if line.starts_with("default") {
            if let Some(name) = parts.get(netif_column) {
                interface = Some(name.to_string());
            }
        }
    }

    interface
}

fn header_netif_column(parts: &[&str]) -> Option<usize> {
    if parts.first().copied() != Some("Destination") {
        return None;
    }
    parts.iter().position(|part| *part == "Netif")
}
