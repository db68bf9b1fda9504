// Configuration management for dhcp-121
// Supports CLI arguments, environment variables and an override file, either
// in the legacy `key = value` format or as TOML

use clap::{Parser, Subcommand};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::Level;

use crate::error::{AppError, AppResult};
use crate::plist::DEFAULT_PLIST_PATH;
use crate::routes::Route;
use crate::routes::reconcile::ReconcileConfig;

/// Default location of the override file
pub const OVERRIDE_FILE: &str = "/usr/local/etc/dhcp_121_override";

/// DHCP option that carries classless static routes
const CLASSLESS_ROUTE_OPTION: u8 = 121;

/// dhcp-121 - Apply DHCP option 121 classless static routes to the routing table
#[derive(Parser, Debug, Clone)]
#[command(name = "dhcp-121")]
#[command(author, version, about, long_about = None)]
pub struct CliArgs {
    #[command(subcommand)]
    pub command: Option<Command>,

    /// Interface to read the DHCP lease from (default: interface of the default route)
    #[arg(short, long, env = "DHCP121_INTERFACE")]
    pub interface: Option<String>,

    /// Add routes even when their gateway is not on a local subnet
    #[arg(long, env = "DHCP121_NO_GATEWAY_CHECK")]
    pub no_gateway_check: bool,

    /// Space separated interfaces whose routes survive a link down
    #[arg(long, env = "DHCP121_SAFE_NICS")]
    pub safe_nics: Option<String>,

    /// Space separated interfaces whose routes are always cleared
    #[arg(long, env = "DHCP121_FORCE_NICS")]
    pub force_nics: Option<String>,

    /// Extra routes as "subnet/len gateway", separated by semicolons
    #[arg(long, env = "DHCP121_STATIC_ROUTES")]
    pub static_routes: Option<String>,

    /// Path to the override file (TOML if it ends in .toml)
    #[arg(short, long, default_value = OVERRIDE_FILE, env = "DHCP121_CONFIG")]
    pub config: PathBuf,

    /// Logging level (error, warn, info, debug, trace)
    #[arg(short, long, env = "RUST_LOG")]
    pub log_level: Option<String>,

    /// Log route changes without applying them
    #[arg(long, env = "DHCP121_DRY_RUN")]
    pub dry_run: bool,

    /// Print the run report as JSON
    #[arg(long)]
    pub json: bool,

    /// Skip the root and OS release checks
    #[arg(long)]
    pub skip_preflight: bool,
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Add (or remove) a DHCP option in the client's requested parameter list
    RequestOption {
        /// DHCP option code
        #[arg(default_value_t = CLASSLESS_ROUTE_OPTION)]
        code: u8,

        /// Remove the option instead of adding it
        #[arg(long)]
        remove: bool,

        /// IPConfiguration plist to edit
        #[arg(long, default_value = DEFAULT_PLIST_PATH)]
        plist: PathBuf,
    },
}

/// Override file structure (TOML format, or translated from `key = value` lines)
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq, Eq)]
pub struct ConfigFile {
    /// Lease monitoring settings
    #[serde(default)]
    pub monitor: MonitorConfig,

    /// Route clearing settings
    #[serde(default)]
    pub interfaces: InterfacesConfig,

    /// Statically configured routes
    #[serde(default)]
    pub routes: RoutesConfig,

    /// Logging settings
    #[serde(default)]
    pub logging: LoggingConfig,

    /// Lines skipped while reading the legacy format
    #[serde(skip)]
    pub warnings: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct MonitorConfig {
    /// Interface to monitor instead of the default route's
    #[serde(default)]
    pub nic: Option<String>,

    /// Require gateways to be on a local subnet
    #[serde(default = "default_true")]
    pub gateway_check: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq, Eq)]
pub struct InterfacesConfig {
    /// Interfaces whose routes are kept when they go down
    #[serde(default)]
    pub safe: Vec<String>,

    /// Interfaces whose routes are always cleared
    #[serde(default)]
    pub force: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq, Eq)]
pub struct RoutesConfig {
    /// Routes as "subnet/len gateway"
    #[serde(default, rename = "static")]
    pub static_routes: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq, Eq)]
pub struct LoggingConfig {
    /// Log level (error, warn, info, debug, trace)
    #[serde(default)]
    pub level: Option<String>,
}

fn default_true() -> bool {
    true
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for MonitorConfig {
    fn default() -> Self {
        MonitorConfig {
            nic: None,
            gateway_check: default_true(),
        }
    }
}

/// Merged configuration from all sources
#[derive(Debug, Clone)]
pub struct Config {
    pub command: Option<Command>,
    pub reconcile: ReconcileConfig,
    pub log_level: Level,
    pub dry_run: bool,
    pub json: bool,
    pub skip_preflight: bool,
    /// Override file that was found and applied
    pub override_file: Option<PathBuf>,
    /// Problems found while reading the override file, logged once tracing is up
    pub warnings: Vec<String>,
}

impl Config {
    /// Load configuration from all sources (CLI args, override file, defaults)
    /// Priority: CLI args > Environment variables > Override file > Defaults
    pub fn load() -> anyhow::Result<Self> {
        Self::from_args(CliArgs::parse())
    }

    pub fn from_args(cli_args: CliArgs) -> anyhow::Result<Self> {
        let (config_file, override_file) = match load_config_file(&cli_args.config)? {
            Some(config_file) => (config_file, Some(cli_args.config.clone())),
            None => (ConfigFile::default(), None),
        };

        let interface = cli_args
            .interface
            .or(config_file.monitor.nic)
            .filter(|nic| !nic.is_empty());
        let gateway_check = !cli_args.no_gateway_check && config_file.monitor.gateway_check;

        let safe_interfaces = match &cli_args.safe_nics {
            Some(list) => split_interfaces(list),
            None => config_file.interfaces.safe,
        };
        let force_interfaces = match &cli_args.force_nics {
            Some(list) => split_interfaces(list),
            None => config_file.interfaces.force,
        };

        let static_routes = match &cli_args.static_routes {
            Some(list) => Route::parse_static_list(list)?,
            None => config_file
                .routes
                .static_routes
                .iter()
                .map(|entry| Route::parse_static(entry))
                .collect::<AppResult<Vec<_>>>()?,
        };

        let log_level = cli_args
            .log_level
            .or(config_file.logging.level)
            .unwrap_or_else(default_log_level);
        let log_level = parse_log_level(&log_level)?;

        Ok(Config {
            command: cli_args.command,
            reconcile: ReconcileConfig {
                interface,
                gateway_check,
                safe_interfaces,
                force_interfaces,
                static_routes,
            },
            log_level,
            dry_run: cli_args.dry_run,
            json: cli_args.json,
            skip_preflight: cli_args.skip_preflight,
            override_file,
            warnings: config_file.warnings,
        })
    }
}

/// Read the override file; a missing file is not an error
pub fn load_config_file(path: &Path) -> anyhow::Result<Option<ConfigFile>> {
    if !path.is_file() {
        return Ok(None);
    }

    let config_content = std::fs::read_to_string(path)?;
    let config_file = if path.extension().is_some_and(|ext| ext == "toml") {
        toml::from_str::<ConfigFile>(&config_content)?
    } else {
        parse_override_file(&config_content)?
    };

    Ok(Some(config_file))
}

/// Parse the legacy override format.
///
/// ```text
/// # comment
/// nic = en1
/// gatewaycheck = 0
/// safe_nics = "en0 en4"
/// forcenics = "en1 fw0"
/// staticroutes = "10.0.1.0/24 192.168.1.254; 10.0.2.0/25 192.168.1.253"
/// ```
///
/// The last occurrence of a key wins.
pub fn parse_override_file(contents: &str) -> AppResult<ConfigFile> {
    let mut config = ConfigFile::default();

    for (index, line) in contents.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        let Some((key, value)) = line.split_once('=') else {
            config
                .warnings
                .push(format!("Ignoring override line {}: {}", index + 1, line));
            continue;
        };
        let value = unquote(value.trim());

        match key.trim() {
            "nic" => config.monitor.nic = Some(value.to_string()).filter(|nic| !nic.is_empty()),
            "gatewaycheck" => config.monitor.gateway_check = parse_toggle(value)?,
            "safe_nics" => config.interfaces.safe = split_interfaces(value),
            "forcenics" | "force_nics" => config.interfaces.force = split_interfaces(value),
            "staticroutes" | "forceroutes" => {
                config.routes.static_routes = value
                    .split(';')
                    .map(str::trim)
                    .filter(|entry| !entry.is_empty())
                    .map(String::from)
                    .collect();
            }
            "log_level" => config.logging.level = Some(value.to_string()),
            other => config
                .warnings
                .push(format!("Ignoring unknown override key '{}' on line {}", other, index + 1)),
        }
    }

    Ok(config)
}

fn unquote(value: &str) -> &str {
    value
        .strip_prefix('"')
        .and_then(|v| v.strip_suffix('"'))
        .or_else(|| value.strip_prefix('\'').and_then(|v| v.strip_suffix('\'')))
        .unwrap_or(value)
        .trim()
}

fn parse_toggle(value: &str) -> AppResult<bool> {
    match value.to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(AppError::Config(format!("invalid gatewaycheck value '{}'", value))),
    }
}

fn split_interfaces(list: &str) -> Vec<String> {
    list.split_whitespace().map(String::from).collect()
}

fn parse_log_level(level_str: &str) -> anyhow::Result<Level> {
    match level_str.to_lowercase().as_str() {
        "error" => Ok(Level::ERROR),
        "warn" => Ok(Level::WARN),
        "info" => Ok(Level::INFO),
        "debug" => Ok(Level::DEBUG),
        "trace" => Ok(Level::TRACE),
        _ => Err(anyhow::anyhow!("Invalid log level: {}", level_str)),
    }
}
