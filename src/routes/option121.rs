// DHCP option 121 (classless static routes) decoding
//
// The payload is a sequence of records:
//
//   prefix length (1 byte) | significant subnet octets | gateway (4 bytes)
//
// The number of significant subnet octets is `prefix_len / 8` (floor). RFC 3442
// asks for the ceiling, so prefixes that are not a multiple of 8 read one
// octet less than a strictly conforming decoder would. Servers seen in the
// field rely on this behavior, keep it.

use std::net::Ipv4Addr;

use super::{MAX_PREFIX_LEN, Route};
use crate::error::AppError;

/// Label of the option in `ipconfig getpacket` output
pub const OPTION_LABEL: &str = "option_121";

/// Gateways always occupy four bytes
const GATEWAY_LEN: usize = 4;

/// Data bytes per line of a packet capture
const CAPTURE_BYTES_PER_LINE: usize = 16;

/// Decode an option 121 payload into routes, in wire order.
///
/// A truncated trailing record is dropped; the routes before it are kept.
pub fn decode(payload: &[u8]) -> Vec<Route> {
    let (routes, status) = decode_with_status(payload);
    if let Some(e) = status {
        tracing::debug!("{}", e);
    }
    routes
}

/// Like [`decode`], also reporting why decoding stopped early, if it did
pub fn decode_with_status(payload: &[u8]) -> (Vec<Route>, Option<AppError>) {
    let mut routes = Vec::new();
    let mut cursor = payload;

    while let Some((&prefix_len, rest)) = cursor.split_first() {
        if prefix_len > MAX_PREFIX_LEN {
            let offset = payload.len() - cursor.len();
            return (
                routes,
                Some(AppError::MalformedOptionPayload(format!(
                    "prefix length {} at offset {} exceeds {}",
                    prefix_len, offset, MAX_PREFIX_LEN
                ))),
            );
        }

        let significant = usize::from(prefix_len / 8);
        if rest.len() < significant + GATEWAY_LEN {
            let offset = payload.len() - cursor.len();
            return (
                routes,
                Some(AppError::MalformedOptionPayload(format!(
                    "record at offset {} needs {} bytes, {} left",
                    offset,
                    significant + GATEWAY_LEN,
                    rest.len()
                ))),
            );
        }

        let (subnet, rest) = rest.split_at(significant);
        let (gateway, rest) = rest.split_at(GATEWAY_LEN);

        let mut destination = [0u8; 4];
        destination[..significant].copy_from_slice(subnet);

        routes.push(Route {
            destination: Ipv4Addr::from(destination),
            prefix_len,
            gateway: Ipv4Addr::new(gateway[0], gateway[1], gateway[2], gateway[3]),
        });

        cursor = rest;
    }

    (routes, None)
}

/// Collect the capture lines that belong to `label`.
///
/// Returns every line after the first one mentioning the label, up to the next
/// blank line.
pub fn option_lines<'a>(packet: &'a str, label: &str) -> Vec<&'a str> {
    let mut lines = Vec::new();
    let mut in_option = false;

    for line in packet.lines() {
        if in_option {
            if line.trim().is_empty() {
                in_option = false;
            } else {
                lines.push(line);
            }
        }

        if line.contains(label) {
            in_option = true;
        }
    }

    lines
}

/// Extract the data bytes from a hex dump capture.
///
/// Capture lines look like
/// `0000  18 c0 a8 01 c0 a8 00 1d  18 c0 a8 02 c0 a8 00 1d  ................`.
/// Bytes are read from their fixed columns after the offset label, so the
/// ASCII gutter is never taken for data even when it renders a space.
pub fn bytes_from_capture<S: AsRef<str>>(lines: &[S]) -> Vec<u8> {
    lines
        .iter()
        .flat_map(|line| line_bytes(line.as_ref()))
        .collect()
}

fn line_bytes(line: &str) -> Vec<u8> {
    let trimmed = line.trim_start();
    let data = match trimmed.split_once(char::is_whitespace) {
        Some((label, rest)) if is_offset_label(label) => rest.trim_start(),
        _ => trimmed,
    };

    (0..CAPTURE_BYTES_PER_LINE)
        .map_while(|index| parse_data_column(data, byte_column(index)))
        .collect()
}

fn is_offset_label(token: &str) -> bool {
    token.len() > 2 && token.chars().all(|c| c.is_ascii_hexdigit())
}

/// Offset of the `index`th byte from the first one; the two halves of a line
/// are split by an extra space.
fn byte_column(index: usize) -> usize {
    index * 3 + usize::from(index >= CAPTURE_BYTES_PER_LINE / 2)
}

fn parse_data_column(data: &str, column: usize) -> Option<u8> {
    let token = data.get(column..column + 2)?;
    if !token.chars().all(|c| c.is_ascii_hexdigit()) {
        return None;
    }
    if !data.as_bytes().get(column + 2).is_none_or(u8::is_ascii_whitespace) {
        return None;
    }
    u8::from_str_radix(token, 16).ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    const CAPTURE: &str = r#"op = BOOTREPLY
htype = 1
yiaddr = 192.168.0.42
options:
Options count is 9
dhcp_message_type (uint8): ACK 0x5
server_identifier (ip): 192.168.0.1
option_121 (opaque):
0000  18 c0 a8 01 c0 a8 00 1d  18 c0 a8 02 c0 a8 00 1d  ................
0010  18 c0 a8 03 c0 a8 00 1d  08 05 c0 a8 00 fe 18 c0  ................
0020  a8 04 c0 a8 00 1d 18 c0  a8 05 c0 a8 00 1d 18 c0  ................
0030  a8 06 c0 a8 00 1d 11 0a  02 f0 c0 a8 0a c8        ..............

end (none):
"#;

    fn route(destination: &str, prefix_len: u8, gateway: &str) -> Route {
        Route {
            destination: destination.parse().unwrap(),
            prefix_len,
            gateway: gateway.parse().unwrap(),
        }
    }

    fn encode(records: &[(u8, [u8; 4], [u8; 4])]) -> Vec<u8> {
        let mut payload = Vec::new();
        for (prefix_len, subnet, gateway) in records {
            payload.push(*prefix_len);
            payload.extend_from_slice(&subnet[..usize::from(*prefix_len / 8)]);
            payload.extend_from_slice(gateway);
        }
        payload
    }

    #[test]
    fn test_option_lines() {
        let lines = option_lines(CAPTURE, OPTION_LABEL);

        assert_eq!(lines.len(), 4);
        assert!(lines[0].starts_with("0000"));
        assert!(lines[3].starts_with("0030"));
        assert!(option_lines("op = BOOTREPLY\n", OPTION_LABEL).is_empty());
    }

    #[test]
    fn test_bytes_from_capture() {
        let bytes = bytes_from_capture(&option_lines(CAPTURE, OPTION_LABEL));

        assert_eq!(bytes.len(), 62);
        assert_eq!(&bytes[..4], &[0x18, 0xc0, 0xa8, 0x01]);
        assert_eq!(&bytes[58..], &[0xc0, 0xa8, 0x0a, 0xc8]);
    }

    #[test]
    fn test_bytes_from_capture_skips_short_gutter() {
        // Two data bytes render a two character gutter
        let bytes = bytes_from_capture(&["0000  08 0a  ..", "0000  61 62  ab"]);
        assert_eq!(bytes, vec![0x08, 0x0a, 0x61, 0x62]);
    }

    #[test]
    fn test_bytes_from_capture_ignores_gutter_space() {
        // A /32 prefix byte (0x20) renders as a space in the gutter
        let line = "0030  a8 06 c0 a8 00 1d 11 0a  02 f0 c0 a8 0a c8        ab ...........";
        let bytes = bytes_from_capture(&[line]);

        assert_eq!(bytes.len(), 14);
        assert_eq!(bytes[13], 0xc8);

        let full = "0000  20 0a 00 00 07 0a 00 00  01 20 0a 00 00 08 0a 00  ab .........   ";
        assert_eq!(bytes_from_capture(&[full]).len(), 16);
    }

    #[test]
    fn test_decode_capture() {
        let bytes = bytes_from_capture(&option_lines(CAPTURE, OPTION_LABEL));
        let (routes, status) = decode_with_status(&bytes);

        assert_eq!(
            routes,
            vec![
                route("192.168.1.0", 24, "192.168.0.29"),
                route("192.168.2.0", 24, "192.168.0.29"),
                route("192.168.3.0", 24, "192.168.0.29"),
                route("5.0.0.0", 8, "192.168.0.254"),
                route("192.168.4.0", 24, "192.168.0.29"),
                route("192.168.5.0", 24, "192.168.0.29"),
                route("192.168.6.0", 24, "192.168.0.29"),
                // Floor division reads two subnet octets for /17
                route("10.2.0.0", 17, "240.192.168.10"),
            ]
        );
        // The leftover 0xc8 is not a valid prefix length
        assert!(matches!(status, Some(AppError::MalformedOptionPayload(_))));
    }

    #[test]
    fn test_decode_default_route() {
        let routes = decode(&[0x00, 192, 168, 1, 1]);
        assert_eq!(routes, vec![route("0.0.0.0", 0, "192.168.1.1")]);
    }

    #[test]
    fn test_decode_host_route() {
        let routes = decode(&[32, 10, 0, 0, 7, 10, 0, 0, 1]);
        assert_eq!(routes, vec![route("10.0.0.7", 32, "10.0.0.1")]);
    }

    #[test]
    fn test_decode_drops_truncated_record() {
        let (routes, status) = decode_with_status(&[24, 10, 0, 1, 192, 168, 1, 254, 24, 10, 0, 2, 192, 168]);

        assert_eq!(routes, vec![route("10.0.1.0", 24, "192.168.1.254")]);
        assert!(matches!(status, Some(AppError::MalformedOptionPayload(_))));
    }

    #[test]
    fn test_decode_empty() {
        let (routes, status) = decode_with_status(&[]);
        assert!(routes.is_empty());
        assert!(status.is_none());
    }

    proptest! {
        #[test]
        fn decode_reproduces_encoded_records(
            records in prop::collection::vec(
                (0u8..=32, any::<[u8; 4]>(), any::<[u8; 4]>()),
                0..32,
            )
        ) {
            let (routes, status) = decode_with_status(&encode(&records));

            prop_assert!(status.is_none());
            prop_assert_eq!(routes.len(), records.len());
            for (route, (prefix_len, subnet, gateway)) in routes.iter().zip(&records) {
                let significant = usize::from(*prefix_len / 8);
                let mut expected = [0u8; 4];
                expected[..significant].copy_from_slice(&subnet[..significant]);

                prop_assert_eq!(route.prefix_len, *prefix_len);
                prop_assert_eq!(route.destination, Ipv4Addr::from(expected));
                prop_assert_eq!(route.gateway, Ipv4Addr::from(*gateway));
            }
        }

        #[test]
        fn decode_never_panics(payload in prop::collection::vec(any::<u8>(), 0..256)) {
            let routes = decode(&payload);
            prop_assert!(routes.iter().all(|route| route.prefix_len <= MAX_PREFIX_LEN));
        }
    }
}
