//! Process configuration, read once from the environment at startup.
//!
//! Every component receives the pieces it needs from [`AppConfig`] through the
//! application state; nothing below `main` touches `std::env`.

use crate::scanner::device::Driver;
use log::warn;
use std::env;
use std::path::PathBuf;
use std::time::Duration;

#[cfg(windows)]
const DEFAULT_SCAN_TOOL: &str = "C:\\Program Files\\NAPS2\\NAPS2.console.exe";
#[cfg(not(windows))]
const DEFAULT_SCAN_TOOL: &str = "naps2";

#[cfg(windows)]
const DEFAULT_DRIVERS: &[Driver] = &[Driver::Wia, Driver::Twain];
#[cfg(not(windows))]
const DEFAULT_DRIVERS: &[Driver] = &[Driver::Sane, Driver::Escl];

/// Must match a `<DisplayName>` inside the shipped `profiles.xml`.
const DEFAULT_PROFILE: &str = "Duplex ADF Scanner(K76)";

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub host: String,
    pub port: u16,
    /// Finished PDFs live here and are served read-only under `/files`.
    pub storage_dir: PathBuf,
    pub database_path: PathBuf,
    pub scan_tool_path: PathBuf,
    pub default_profile: String,
    /// Device backends to probe, highest priority first.
    pub drivers: Vec<Driver>,
    /// Version-controlled profile definition shipped next to the binary.
    pub profiles_source: PathBuf,
    /// Overrides the directory the scan tool reads its profiles from.
    pub profiles_destination_dir: Option<PathBuf>,
    pub temp_root: PathBuf,
    pub scan_timeout: Duration,
    pub device_list_timeout: Duration,
    pub font_dir: PathBuf,
    pub font_family: String,
    pub max_body_bytes: usize,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 5000,
            storage_dir: PathBuf::from("./scans"),
            database_path: PathBuf::from("./scan_records.sqlite"),
            scan_tool_path: PathBuf::from(DEFAULT_SCAN_TOOL),
            default_profile: DEFAULT_PROFILE.to_string(),
            drivers: DEFAULT_DRIVERS.to_vec(),
            profiles_source: PathBuf::from("./profiles.xml"),
            profiles_destination_dir: None,
            temp_root: env::temp_dir(),
            scan_timeout: Duration::from_secs(300),
            device_list_timeout: Duration::from_secs(30),
            font_dir: PathBuf::from("./fonts"),
            font_family: "DejaVuSans".to_string(),
            max_body_bytes: 50 * 1024 * 1024,
        }
    }
}

impl AppConfig {
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            host: env_string("SCAN_BRIDGE_HOST").unwrap_or(defaults.host),
            port: env_parse("SCAN_BRIDGE_PORT").unwrap_or(defaults.port),
            storage_dir: env_path("SCAN_STORAGE_PATH").unwrap_or(defaults.storage_dir),
            database_path: env_path("SCAN_DATABASE_PATH").unwrap_or(defaults.database_path),
            scan_tool_path: env_path("NAPS2_PATH").unwrap_or(defaults.scan_tool_path),
            default_profile: env_string("NAPS2_PROFILE").unwrap_or(defaults.default_profile),
            drivers: env_string("NAPS2_DRIVERS")
                .map(|raw| parse_drivers(&raw))
                .filter(|drivers| !drivers.is_empty())
                .unwrap_or(defaults.drivers),
            profiles_source: env_path("NAPS2_PROFILES_SOURCE").unwrap_or(defaults.profiles_source),
            profiles_destination_dir: env_path("NAPS2_PROFILES_DIR"),
            temp_root: env_path("SCAN_TEMP_DIR").unwrap_or(defaults.temp_root),
            scan_timeout: env_parse("SCAN_TIMEOUT_SECS")
                .map(Duration::from_secs)
                .unwrap_or(defaults.scan_timeout),
            device_list_timeout: env_parse("DEVICE_LIST_TIMEOUT_SECS")
                .map(Duration::from_secs)
                .unwrap_or(defaults.device_list_timeout),
            font_dir: env_path("PDF_FONT_DIR").unwrap_or(defaults.font_dir),
            font_family: env_string("PDF_FONT_FAMILY").unwrap_or(defaults.font_family),
            max_body_bytes: env_parse::<usize>("SCAN_MAX_BODY_MB")
                .and_then(megabytes_to_bytes)
                .unwrap_or(defaults.max_body_bytes),
        }
    }
}

fn env_string(name: &str) -> Option<String> {
    env::var(name)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn env_path(name: &str) -> Option<PathBuf> {
    env_string(name).map(PathBuf::from)
}

fn env_parse<T: std::str::FromStr>(name: &str) -> Option<T> {
    let raw = env_string(name)?;
    match raw.parse::<T>() {
        Ok(value) => Some(value),
        Err(_) => {
            warn!("Ignoring {}={:?}: not a valid value, using default", name, raw);
            None
        }
    }
}

fn megabytes_to_bytes(mb: usize) -> Option<usize> {
    let bytes = mb.checked_mul(1024 * 1024);
    if bytes.is_none() {
        warn!("Ignoring SCAN_MAX_BODY_MB={}: too large, using default", mb);
    }
    bytes
}

/// Parses a comma separated driver list, skipping unknown names.
fn parse_drivers(raw: &str) -> Vec<Driver> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .filter_map(|name| match name.parse::<Driver>() {
            Ok(driver) => Some(driver),
            Err(_) => {
                warn!("Unknown scan driver {:?} in NAPS2_DRIVERS, skipping", name);
                None
            }
        })
        .collect()
}
