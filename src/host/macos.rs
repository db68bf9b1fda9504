// macOS implementation of the host collaborators
//
// Every query shells out to the stock system utilities. Output parsing is
// kept in small free functions so it can be tested without the commands.

use std::net::Ipv4Addr;
use std::process::{Command, Output};

use super::{HostNetwork, RouteExecutor};
use crate::error::{AppError, AppResult};
use crate::routes::address::hex_netmask_prefix_len;
use crate::routes::option121::{bytes_from_capture, option_lines};
use crate::routes::{InterfaceAddress, LinkState, RouteMutation};

const IFCONFIG: &str = "/sbin/ifconfig";
const NETWORKSETUP: &str = "/usr/sbin/networksetup";
const IPCONFIG: &str = "/usr/sbin/ipconfig";
const NETSTAT: &str = "/usr/sbin/netstat";
const ROUTE: &str = "/sbin/route";

/// Host backed by `ifconfig`, `networksetup`, `ipconfig`, `netstat` and `route`
pub struct MacOsHost;

impl MacOsHost {
    fn run(program: &str, args: &[&str]) -> AppResult<Output> {
        tracing::debug!("Executing {} {}", program, args.join(" "));
        Command::new(program)
            .args(args)
            .output()
            .map_err(|e| AppError::CommandExecution(format!("{}: {}", program, e)))
    }

    /// Run a command whose failure aborts the run
    fn run_checked(program: &str, args: &[&str]) -> AppResult<String> {
        let output = Self::run(program, args)?;
        let stdout = String::from_utf8_lossy(&output.stdout).into_owned();

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            if is_permission_error(&stderr) {
                return Err(AppError::PermissionDenied(format!("{}: {}", program, stderr.trim())));
            }
            return Err(AppError::CommandExecution(format!(
                "{} {} failed: {}",
                program,
                args.join(" "),
                stderr.trim()
            )));
        }

        tracing::debug!("{} output:\n{}", program, stdout);
        Ok(stdout)
    }
}

impl HostNetwork for MacOsHost {
    fn list_interfaces(&self) -> AppResult<Vec<String>> {
        let stdout = Self::run_checked(IFCONFIG, &["-a", "inet"])?;
        Ok(parse_interface_names(&stdout))
    }

    fn link_state(&self, interface: &str) -> LinkState {
        match Self::run(NETWORKSETUP, &["-getmedia", interface]) {
            Ok(output) if output.status.success() => {
                parse_media_state(&String::from_utf8_lossy(&output.stdout))
            }
            Ok(_) => LinkState::Unknown,
            Err(e) => {
                tracing::warn!("Could not query link state of {}: {}", interface, e);
                LinkState::Unknown
            }
        }
    }

    fn interface_addresses(&self, interface: &str) -> AppResult<Vec<InterfaceAddress>> {
        let stdout = Self::run_checked(IFCONFIG, &[interface, "inet"])?;
        Ok(parse_inet_addresses(&stdout))
    }

    fn lease_option_bytes(&self, interface: &str, option_label: &str) -> AppResult<Option<Vec<u8>>> {
        let output = Self::run(IPCONFIG, &["getpacket", interface])?;
        if !output.status.success() {
            return Ok(None);
        }

        let packet = String::from_utf8_lossy(&output.stdout);
        if packet.trim().is_empty() {
            return Ok(None);
        }

        tracing::debug!("DHCP packet on {}:\n{}", interface, packet);
        Ok(Some(bytes_from_capture(&option_lines(&packet, option_label))))
    }

    fn dump_route_table(&self) -> AppResult<String> {
        Self::run_checked(NETSTAT, &["-f", "inet", "-rn"])
    }
}

impl RouteExecutor for MacOsHost {
    fn apply(&self, mutation: &RouteMutation) -> AppResult<()> {
        let target = mutation.target();
        let gateway = mutation.gateway.to_string();
        let output = Self::run(ROUTE, &[mutation.kind.verb(), target.as_str(), gateway.as_str()])?;

        let stdout = String::from_utf8_lossy(&output.stdout);
        let stderr = String::from_utf8_lossy(&output.stderr);
        let message = format!("{} {}", stderr.trim(), stdout.trim()).trim().to_string();

        if is_permission_error(&message) {
            return Err(AppError::PermissionDenied(format!("{}: {}", ROUTE, message)));
        }

        // route reports duplicates on stdout and may still exit zero
        if !output.status.success() || message.contains("File exists") {
            return Err(AppError::RouteMutationConflict {
                destination: mutation.destination,
                prefix_len: mutation.prefix_len,
                gateway: mutation.gateway,
                message,
            });
        }

        tracing::debug!("route {}: {}", mutation, stdout.trim());
        Ok(())
    }
}

fn is_permission_error(message: &str) -> bool {
    message.contains("must be root")
        || message.contains("Permission denied")
        || message.contains("Operation not permitted")
}

/// Interface names from `ifconfig -a inet` (`en0: flags=8863<UP,...> mtu 1500`)
pub fn parse_interface_names(output: &str) -> Vec<String> {
    output
        .lines()
        .filter_map(|line| line.split_once(": "))
        .map(|(name, _)| name)
        .filter(|name| !name.is_empty() && name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_'))
        .map(String::from)
        .collect()
}

/// Link state from `networksetup -getmedia` output.
///
/// `Active: none` means no link. `<not set>` is what virtual interfaces
/// report, so it stays unknown.
pub fn parse_media_state(output: &str) -> LinkState {
    let active = output
        .lines()
        .filter_map(|line| line.strip_prefix("Active: "))
        .filter_map(|rest| rest.split_whitespace().next())
        .last();

    match active {
        None => LinkState::Unknown,
        Some(state) if state.to_ascii_lowercase().starts_with("no") => LinkState::Down,
        Some(state) if state.starts_with('<') => LinkState::Unknown,
        Some(_) => LinkState::Up,
    }
}

/// Addresses from `ifconfig <nic> inet`
/// (`inet 192.168.1.10 netmask 0xffffff00 broadcast 192.168.1.255`).
///
/// Lines without a broadcast address (point-to-point links) are skipped.
pub fn parse_inet_addresses(output: &str) -> Vec<InterfaceAddress> {
    output.lines().filter_map(parse_inet_line).collect()
}

fn parse_inet_line(line: &str) -> Option<InterfaceAddress> {
    let parts: Vec<&str> = line.split_whitespace().collect();
    let value_after = |key: &str| {
        parts
            .iter()
            .position(|part| *part == key)
            .and_then(|i| parts.get(i + 1))
            .copied()
    };

    let ip: Ipv4Addr = value_after("inet")?.parse().ok()?;
    let prefix_len = hex_netmask_prefix_len(value_after("netmask")?).ok()?;
    let broadcast: Ipv4Addr = value_after("broadcast")?.parse().ok()?;

    Some(InterfaceAddress {
        ip,
        prefix_len,
        broadcast,
    })
}
