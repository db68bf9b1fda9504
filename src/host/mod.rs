// Host module - the OS facilities the reconciler depends on

pub mod macos;

use crate::error::{AppError, AppResult};
use crate::routes::{InterfaceAddress, LinkState, RouteMutation};

/// First Darwin kernel release (OS X 10.11 El Capitan) that applies option 121 itself
const NATIVE_SUPPORT_RELEASE: [u32; 3] = [15, 6, 0];

/// Read-only view of the host network configuration
pub trait HostNetwork {
    /// Names of all interfaces present on the host
    fn list_interfaces(&self) -> AppResult<Vec<String>>;

    /// Hardware link state; query failures report [`LinkState::Unknown`]
    fn link_state(&self, interface: &str) -> LinkState;

    fn interface_addresses(&self, interface: &str) -> AppResult<Vec<InterfaceAddress>>;

    /// Raw bytes of a DHCP option from the current lease.
    ///
    /// `None` means there is no lease on the interface. A lease that does not
    /// carry the option yields an empty payload.
    fn lease_option_bytes(&self, interface: &str, option_label: &str) -> AppResult<Option<Vec<u8>>>;

    /// Raw routing table text
    fn dump_route_table(&self) -> AppResult<String>;
}

/// Applies one change to the kernel routing table.
///
/// A rejected change is reported as [`AppError::RouteMutationConflict`]; any
/// other error aborts the run.
pub trait RouteExecutor {
    fn apply(&self, mutation: &RouteMutation) -> AppResult<()>;

    fn is_dry_run(&self) -> bool {
        false
    }
}

/// Executor that only logs what it would do
pub struct DryRunExecutor;

impl RouteExecutor for DryRunExecutor {
    fn apply(&self, mutation: &RouteMutation) -> AppResult<()> {
        tracing::info!("[dry-run] route {}", mutation);
        Ok(())
    }

    fn is_dry_run(&self) -> bool {
        true
    }
}

/// Refuse to run without root privileges
pub fn ensure_root() -> AppResult<()> {
    if nix::unistd::geteuid().is_root() {
        Ok(())
    } else {
        Err(AppError::PermissionDenied(
            "root permissions required to change the routing table".to_string(),
        ))
    }
}

/// Refuse to run on anything but a macOS release lacking option 121 support
pub fn ensure_native_support_absent() -> AppResult<()> {
    if !cfg!(target_os = "macos") {
        return Err(AppError::UnsupportedPlatform(std::env::consts::OS.to_string()));
    }

    let uname = nix::sys::utsname::uname()
        .map_err(|e| AppError::CommandExecution(format!("uname: {}", e)))?;
    let release = uname.release().to_string_lossy().into_owned();

    if release_has_native_support(&release) {
        return Err(AppError::NativeSupport(release));
    }
    Ok(())
}

/// Compare a Darwin kernel release such as `14.5.0` against El Capitan
pub fn release_has_native_support(release: &str) -> bool {
    let mut version = [0u32; 3];
    for (slot, part) in version.iter_mut().zip(release.trim().split('.')) {
        let digits: String = part.chars().take_while(|c| c.is_ascii_digit()).collect();
        *slot = digits.parse().unwrap_or(0);
    }
    version >= NATIVE_SUPPORT_RELEASE
}
