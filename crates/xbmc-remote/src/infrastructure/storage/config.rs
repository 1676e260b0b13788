//! TOML-based configuration for the event client.
//!
//! The default location is the platform config directory:
//! - Windows:  `%APPDATA%\xbmc-remote\config.toml`
//! - Linux:    `~/.config/xbmc-remote/config.toml` (or `$XDG_CONFIG_HOME`)
//! - macOS:    `~/Library/Application Support/xbmc-remote/config.toml`
//!
//! `--external-config <path>` replaces that location.
//!
//! # Example
//!
//! ```toml
//! [server]
//! host = "192.168.1.10"
//! port = 9777
//!
//! [client]
//! mode = "remote"
//! icon = "/usr/share/pixmaps/apple-remote.png"
//!
//! [remote]
//! kind = "apple"
//! universal = true
//! max_click_ms = 400
//! cookie_table = "leopard"
//!
//! [[bindings]]
//! key = "menu+play"
//! name = "stop"
//! ```
//!
//! Every field has a serde default, so a missing file, an empty file and a
//! file written for an older version all load.  Command-line flags are
//! applied on top of the loaded values.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use xbmc_events_core::keymap::{CookieTable, RemoteKind};
use xbmc_events_core::protocol::{ButtonFlags, DEFAULT_PORT};
use xbmc_events_core::{Command, CommandMap, RouterConfig};

/// Error type for configuration file operations.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The platform config directory could not be determined.
    #[error("could not determine platform config directory")]
    NoPlatformConfigDir,

    /// A file system I/O error occurred.
    #[error("I/O error accessing config at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The TOML content could not be parsed.
    #[error("failed to parse config TOML: {0}")]
    Parse(#[from] toml::de::Error),
}

// ── Config schema types ───────────────────────────────────────────────────────

/// Top-level configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct AppConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub client: ClientConfig,
    #[serde(default)]
    pub remote: RemoteConfig,
    #[serde(default)]
    pub mouse: MouseConfig,
    #[serde(default)]
    pub app: LaunchConfig,
    /// Custom key → command bindings layered over the built-in map.
    #[serde(default)]
    pub bindings: Vec<BindingEntry>,
}

/// Where the EventServer listens.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ServerConfig {
    /// Host name or address.  Empty means the wildcard address.
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

/// Which session runs.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum SessionMode {
    /// Remote control: keys go through the command router.
    #[default]
    Remote,
    /// Pointer: clicks, wheel and position.
    Mouse,
}

/// Client identity and timing.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ClientConfig {
    #[serde(default)]
    pub mode: SessionMode,
    /// Name announced in HELO.  Defaults to the remote's own name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub device_name: Option<String>,
    /// JPEG, PNG or GIF file sent with HELO.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub icon: Option<PathBuf>,
    /// Seconds of silence after which a PING is sent.
    #[serde(default = "default_ping_interval_secs")]
    pub ping_interval_secs: u64,
    /// Device polling period in milliseconds.
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
    /// Consecutive failed polls before the device counts as disconnected.
    #[serde(default = "default_max_poll_failures")]
    pub max_poll_failures: u32,
}

/// Which HID cookie table to use for the Apple Remote.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum CookieTableSetting {
    /// Accept cookies from every table.
    #[default]
    Auto,
    Tiger,
    Leopard,
}

impl CookieTableSetting {
    pub fn table(self) -> Option<CookieTable> {
        match self {
            CookieTableSetting::Auto => None,
            CookieTableSetting::Tiger => Some(CookieTable::Tiger),
            CookieTableSetting::Leopard => Some(CookieTable::Leopard),
        }
    }
}

/// Remote-control behaviour.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RemoteConfig {
    #[serde(default)]
    pub kind: RemoteKind,
    /// Chorded universal-remote mode.
    #[serde(default)]
    pub universal: bool,
    /// Chord window in milliseconds.
    #[serde(default = "default_max_click_ms")]
    pub max_click_ms: u64,
    #[serde(default)]
    pub cookie_table: CookieTableSetting,
}

/// Pointer session settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MouseConfig {
    /// Pointer range in device units; positions are scaled to 0..=65535.
    #[serde(default = "default_screen_width")]
    pub width: i32,
    #[serde(default = "default_screen_height")]
    pub height: i32,
    /// Device map the click and wheel button names are sent against.
    #[serde(default = "default_mouse_device_map")]
    pub device_map: String,
}

/// Media center process to start alongside the client.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct LaunchConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<PathBuf>,
    /// Exported to the child as `XBMC_HOME`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub home: Option<PathBuf>,
}

/// One custom binding.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BindingEntry {
    /// Key name or chord, e.g. `"play"` or `"menu+play"`.
    pub key: String,
    /// EventServer button name.
    pub name: String,
    /// Device map; defaults to the remote's map for the current mode.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub device_map: Option<String>,
    /// Let the receiver repeat the button until the key is released.
    #[serde(default)]
    pub repeat: bool,
    #[serde(default)]
    pub amount: u16,
}

// ── Default helpers ───────────────────────────────────────────────────────────

fn default_host() -> String {
    "localhost".to_string()
}
fn default_port() -> u16 {
    DEFAULT_PORT
}
fn default_ping_interval_secs() -> u64 {
    45
}
fn default_poll_interval_ms() -> u64 {
    20
}
fn default_max_poll_failures() -> u32 {
    10
}
fn default_max_click_ms() -> u64 {
    500
}
fn default_screen_width() -> i32 {
    1920
}
fn default_screen_height() -> i32 {
    1080
}
fn default_mouse_device_map() -> String {
    "LI:mouse".to_string()
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            mode: SessionMode::default(),
            device_name: None,
            icon: None,
            ping_interval_secs: default_ping_interval_secs(),
            poll_interval_ms: default_poll_interval_ms(),
            max_poll_failures: default_max_poll_failures(),
        }
    }
}

impl Default for RemoteConfig {
    fn default() -> Self {
        Self {
            kind: RemoteKind::default(),
            universal: false,
            max_click_ms: default_max_click_ms(),
            cookie_table: CookieTableSetting::default(),
        }
    }
}

impl Default for MouseConfig {
    fn default() -> Self {
        Self {
            width: default_screen_width(),
            height: default_screen_height(),
            device_map: default_mouse_device_map(),
        }
    }
}

// ── Derived settings ──────────────────────────────────────────────────────────

impl AppConfig {
    pub fn ping_interval(&self) -> Duration {
        Duration::from_secs(self.client.ping_interval_secs)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.client.poll_interval_ms.max(1))
    }

    /// Name announced in HELO.
    pub fn device_name(&self) -> String {
        match (&self.client.device_name, self.client.mode) {
            (Some(name), _) => name.clone(),
            (None, SessionMode::Mouse) => "Mouse".to_string(),
            (None, SessionMode::Remote) => self.remote.kind.device_name().to_string(),
        }
    }

    pub fn router_config(&self) -> RouterConfig {
        RouterConfig {
            universal: self.remote.universal,
            max_click_duration: Duration::from_millis(self.remote.max_click_ms),
        }
    }

    /// The built-in map for the configured remote and mode, with the
    /// `[[bindings]]` entries applied on top.
    pub fn command_map(&self) -> CommandMap {
        let mut map = self.remote.kind.default_command_map(self.remote.universal);
        let default_map = if self.remote.universal {
            xbmc_events_core::keymap::DEVICE_MAP_UNIVERSAL
        } else {
            xbmc_events_core::keymap::DEVICE_MAP_NORMAL
        };
        let mut custom = CommandMap::new();
        for binding in &self.bindings {
            let device_map = binding.device_map.as_deref().unwrap_or(default_map);
            let flags = if binding.repeat {
                ButtonFlags::DOWN
            } else {
                ButtonFlags::DOWN | ButtonFlags::NO_REPEAT | ButtonFlags::QUEUE
            };
            custom.insert(
                binding.key.clone(),
                Command {
                    name: binding.name.clone(),
                    device_map: device_map.to_string(),
                    flags,
                    amount: binding.amount,
                },
            );
        }
        map.extend(custom);
        map
    }
}

// ── Config repository ─────────────────────────────────────────────────────────

/// Determines the platform-appropriate directory for the config file.
///
/// # Errors
///
/// Returns [`ConfigError::NoPlatformConfigDir`] when the platform config base
/// directory cannot be determined from the environment.
pub fn config_dir() -> Result<PathBuf, ConfigError> {
    platform_config_dir().ok_or(ConfigError::NoPlatformConfigDir)
}

/// Resolves the full path to the default config file.
///
/// # Errors
///
/// Returns [`ConfigError::NoPlatformConfigDir`] if the base directory cannot be
/// determined.
pub fn config_file_path() -> Result<PathBuf, ConfigError> {
    Ok(config_dir()?.join("config.toml"))
}

/// Loads `AppConfig` from `path`, returning `AppConfig::default()` if the
/// file does not exist.
///
/// # Errors
///
/// Returns [`ConfigError::Io`] for file-system errors other than "not found",
/// and [`ConfigError::Parse`] if the TOML is malformed.
pub fn load_config_from(path: &Path) -> Result<AppConfig, ConfigError> {
    match std::fs::read_to_string(path) {
        Ok(content) => Ok(toml::from_str(&content)?),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(AppConfig::default()),
        Err(source) => Err(ConfigError::Io {
            path: path.to_path_buf(),
            source,
        }),
    }
}

/// Loads the config from `external` if given, else from the default location.
///
/// Without an external path and without a platform config directory the
/// defaults are used.
///
/// # Errors
///
/// Same as [`load_config_from`].
pub fn load_config(external: Option<&Path>) -> Result<AppConfig, ConfigError> {
    match external {
        Some(path) => load_config_from(path),
        None => match config_file_path() {
            Ok(path) => load_config_from(&path),
            Err(ConfigError::NoPlatformConfigDir) => Ok(AppConfig::default()),
            Err(e) => Err(e),
        },
    }
}

/// Resolves the platform config base directory plus the `xbmc-remote` subdirectory.
fn platform_config_dir() -> Option<PathBuf> {
    #[cfg(target_os = "windows")]
    {
        std::env::var_os("APPDATA").map(|p| PathBuf::from(p).join("xbmc-remote"))
    }

    #[cfg(target_os = "linux")]
    {
        let base = std::env::var_os("XDG_CONFIG_HOME")
            .map(PathBuf::from)
            .or_else(|| std::env::var_os("HOME").map(|h| PathBuf::from(h).join(".config")))?;
        Some(base.join("xbmc-remote"))
    }

    #[cfg(target_os = "macos")]
    {
        std::env::var_os("HOME").map(|h| {
            PathBuf::from(h)
                .join("Library")
                .join("Application Support")
                .join("xbmc-remote")
        })
    }

    #[cfg(not(any(target_os = "windows", target_os = "linux", target_os = "macos")))]
    {
        None
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
