// Error types for dhcp-121

use std::net::Ipv4Addr;

use thiserror::Error;

/// Main error type for the application
#[derive(Error, Debug)]
pub enum AppError {
    #[error("Invalid IPv4 address: {0}")]
    InvalidAddress(String),

    #[error("Malformed option 121 payload: {0}")]
    MalformedOptionPayload(String),

    #[error("Route {destination}/{prefix_len} via {gateway} rejected: {message}")]
    RouteMutationConflict {
        destination: Ipv4Addr,
        prefix_len: u8,
        gateway: Ipv4Addr,
        message: String,
    },

    #[error("Failed to execute command: {0}")]
    CommandExecution(String),

    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    #[error("Option 121 is handled natively by this OS (kernel release {0})")]
    NativeSupport(String),

    #[error("Unsupported platform: {0}")]
    UnsupportedPlatform(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Plist error: {0}")]
    Plist(String),

    #[error("JSON serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Result type alias using AppError
pub type AppResult<T> = Result<T, AppError>;

impl AppError {
    /// Convert error to user-friendly message
    pub fn user_message(&self) -> String {
        match self {
            AppError::InvalidAddress(addr) => {
                format!("'{}' is not a dotted-quad IPv4 address.", addr)
            }
            AppError::MalformedOptionPayload(_) => {
                "The DHCP server sent a truncated option 121 payload; the complete routes were still used.".to_string()
            }
            AppError::RouteMutationConflict { .. } => {
                "A conflicting route is already present. Remove it and bring the interface down and up again.".to_string()
            }
            AppError::CommandExecution(cmd) => {
                format!("Failed to execute command. Make sure {} is installed.", cmd)
            }
            AppError::PermissionDenied(_) => {
                "Exiting: root permissions required".to_string()
            }
            AppError::NativeSupport(_) => {
                "Exiting: DHCP option 121 is built into this OS".to_string()
            }
            AppError::UnsupportedPlatform(_) => {
                "macOS required but not detected".to_string()
            }
            AppError::Config(msg) => {
                format!("Configuration error: {}. Check the override file or command-line arguments.", msg)
            }
            AppError::Plist(msg) => {
                format!("Could not update the DHCP plist: {}", msg)
            }
            AppError::Serialization(_) => {
                "Data format error. This might be a bug, please report it.".to_string()
            }
        }
    }

    /// Whether the error must abort the whole invocation
    pub fn is_fatal(&self) -> bool {
        !matches!(
            self,
            AppError::RouteMutationConflict { .. } | AppError::MalformedOptionPayload(_)
        )
    }
}
