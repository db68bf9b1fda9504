// Routes module - option 121 decoding, route table parsing and reconciliation

pub mod address;
pub mod option121;
pub mod parser;
pub mod reconcile;

use serde::{Deserialize, Serialize};
use std::fmt;
use std::net::Ipv4Addr;

use crate::error::{AppError, AppResult};

/// Longest valid IPv4 prefix
pub const MAX_PREFIX_LEN: u8 = 32;

/// A static route to install
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Route {
    pub destination: Ipv4Addr,
    pub prefix_len: u8,
    pub gateway: Ipv4Addr,
}

impl Route {
    pub fn new(destination: Ipv4Addr, prefix_len: u8, gateway: Ipv4Addr) -> AppResult<Self> {
        if prefix_len > MAX_PREFIX_LEN {
            return Err(AppError::Config(format!(
                "prefix length {} for {} exceeds {}",
                prefix_len, destination, MAX_PREFIX_LEN
            )));
        }
        Ok(Route {
            destination,
            prefix_len,
            gateway,
        })
    }

    /// Parse a single `subnet/len gateway` entry
    pub fn parse_static(entry: &str) -> AppResult<Self> {
        let mut parts = entry.split_whitespace();
        let (cidr, gateway) = match (parts.next(), parts.next(), parts.next()) {
            (Some(cidr), Some(gateway), None) => (cidr, gateway),
            _ => {
                return Err(AppError::Config(format!(
                    "static route '{}' must be written as 'subnet/len gateway'",
                    entry.trim()
                )));
            }
        };

        let (subnet, prefix) = cidr.split_once('/').ok_or_else(|| {
            AppError::Config(format!("static route '{}' is missing a /len", entry.trim()))
        })?;
        let prefix_len: u8 = prefix.parse().map_err(|_| {
            AppError::Config(format!("invalid prefix length '{}' in '{}'", prefix, entry.trim()))
        })?;

        Route::new(
            Ipv4Addr::from(address::to_bits32(subnet)?),
            prefix_len,
            address::parse_ipv4(gateway)?,
        )
    }

    /// Parse the semicolon-separated static route list from the configuration
    pub fn parse_static_list(list: &str) -> AppResult<Vec<Self>> {
        list.split(';')
            .map(str::trim)
            .filter(|entry| !entry.is_empty())
            .map(Route::parse_static)
            .collect()
    }
}

impl fmt::Display for Route {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{} via {}", self.destination, self.prefix_len, self.gateway)
    }
}

/// One row of the live kernel routing table
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LiveRouteEntry {
    pub destination: Ipv4Addr,
    pub prefix_len: u8,
    pub gateway: Ipv4Addr,
    pub interface: String,
}

/// An IPv4 address bound to an interface
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct InterfaceAddress {
    pub ip: Ipv4Addr,
    pub prefix_len: u8,
    pub broadcast: Ipv4Addr,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LinkState {
    Up,
    Down,
    Unknown,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MutationKind {
    Add,
    Delete,
}

impl MutationKind {
    pub fn verb(&self) -> &'static str {
        match self {
            MutationKind::Add => "add",
            MutationKind::Delete => "delete",
        }
    }
}

/// A single change to the kernel routing table
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RouteMutation {
    pub kind: MutationKind,
    pub destination: Ipv4Addr,
    pub prefix_len: u8,
    pub gateway: Ipv4Addr,
}

impl RouteMutation {
    pub fn add(route: &Route) -> Self {
        RouteMutation {
            kind: MutationKind::Add,
            destination: route.destination,
            prefix_len: route.prefix_len,
            gateway: route.gateway,
        }
    }

    pub fn delete(entry: &LiveRouteEntry) -> Self {
        RouteMutation {
            kind: MutationKind::Delete,
            destination: entry.destination,
            prefix_len: entry.prefix_len,
            gateway: entry.gateway,
        }
    }

    /// The `dest/len` argument handed to the route command
    pub fn target(&self) -> String {
        format!("{}/{}", self.destination, self.prefix_len)
    }
}

impl fmt::Display for RouteMutation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} {}", self.kind.verb(), self.target(), self.gateway)
    }
}
