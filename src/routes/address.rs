// IPv4 address helpers: integer conversion, subnet membership and classful prefixes

use std::net::Ipv4Addr;

use crate::error::{AppError, AppResult};

/// Parse a strict dotted-quad IPv4 address
pub fn parse_ipv4(addr: &str) -> AppResult<Ipv4Addr> {
    addr.trim()
        .parse()
        .map_err(|_| AppError::InvalidAddress(addr.trim().to_string()))
}

/// Convert a dotted-quad address to its big-endian 32-bit value
pub fn to_bits32(addr: &str) -> AppResult<u32> {
    parse_ipv4(addr).map(u32::from)
}

/// Network mask for a prefix length, saturating at /32
pub fn prefix_mask(prefix_len: u8) -> u32 {
    u32::MAX.checked_shr(u32::from(prefix_len)).unwrap_or(0) ^ u32::MAX
}

/// Check whether `target` lies in the subnet that `any_address` belongs to.
///
/// This is the reachability test used for gateways: a gateway is reachable when
/// it shares the network part of one of the locally bound addresses.
pub fn is_within_subnet(prefix_len: u8, any_address: Ipv4Addr, target: Ipv4Addr) -> bool {
    let mask = prefix_mask(prefix_len);
    u32::from(any_address) & mask == u32::from(target) & mask
}

/// Pad a truncated destination such as `10.0.1` to `10.0.1.0`
pub fn pad_dotted_quad(addr: &str) -> String {
    let mut padded = addr.to_string();
    while padded.matches('.').count() < 3 {
        padded.push_str(".0");
    }
    padded
}

/// Infer a prefix length from the leading address bits.
///
/// Classful heuristic only: `0` => /8, `10` => /16, `11` => /24. Class D and E
/// addresses also land on /24. Callers must only use it when the routing table
/// omits an explicit mask.
pub fn classful_prefix_len(addr: Ipv4Addr) -> u8 {
    let bits = u32::from(addr);
    if bits & 0x8000_0000 == 0 {
        8
    } else if bits & 0x4000_0000 == 0 {
        16
    } else {
        24
    }
}

/// Count the bits set in a hexadecimal netmask such as `0xffffff00`
pub fn hex_netmask_prefix_len(mask: &str) -> AppResult<u8> {
    let digits = mask
        .strip_prefix("0x")
        .or_else(|| mask.strip_prefix("0X"))
        .unwrap_or(mask);
    let value = u32::from_str_radix(digits, 16)
        .map_err(|_| AppError::InvalidAddress(mask.to_string()))?;
    Ok(value.count_ones() as u8)
}
