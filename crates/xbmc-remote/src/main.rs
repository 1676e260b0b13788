//! xbmc-remote: EventServer client entry point.
//!
//! Reads remote-control or pointer input from a line-driven device (stdin
//! or `--input <file>`) and forwards it to an XBMC EventServer over UDP.
//!
//! # Usage
//!
//! ```text
//! xbmc-remote [OPTIONS]
//!
//! Options:
//!   -s, --server <HOST>            EventServer host [default: from config, else localhost]
//!   -p, --port <PORT>              EventServer port [default: from config, else 9777]
//!   -u, --universal                Chorded universal-remote mode
//!   -t, --timeout <MS>             Chord window in milliseconds [default: 500]
//!   -v, --verbose                  Debug logging
//!       --kind <apple|wii>         Remote to emulate
//!       --mode <remote|mouse>      Session type
//!       --os-version <X.Y>         Select the HID cookie table (10.4 = Tiger)
//!       --name <NAME>              Device name announced in HELO
//!       --icon <PATH>              Icon sent with HELO
//!       --input <PATH>             Read device commands from a file
//!       --app-path <PATH>          Start the media center
//!       --app-home <PATH>          XBMC_HOME for the started media center
//!       --external-config <PATH>  Config file instead of the default location
//! ```
//!
//! # Signals (for beginners)
//!
//! - **Ctrl+C / SIGTERM**: send BYE and exit.
//! - **SIGHUP** (Unix only): re-read the config file and rebuild the key
//!   bindings without reconnecting.
//!
//! Each signal is turned into a [`ControlEvent`] on a channel that the poll
//! loop selects on, so the session is only ever touched from the loop.

use std::fs::File;
use std::io::BufReader;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use anyhow::Context;
use clap::{Parser, ValueEnum};
use tokio::sync::mpsc;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use xbmc_events_core::keymap::{CookieTable, RemoteKind};
use xbmc_events_core::protocol::HeloMessage;
use xbmc_events_core::{CommandRouter, MouseState};
use xbmc_remote::application::mouse_session::{MouseSession, MOUSE_BUTTON_NAMES};
use xbmc_remote::application::remote_session::RemoteSession;
use xbmc_remote::application::{drive, ControlEvent, Session, SessionLink, StopReason};
use xbmc_remote::infrastructure::device::line::LineDevice;
use xbmc_remote::infrastructure::device::{DeviceMonitor, InputDevice};
use xbmc_remote::infrastructure::icon::load_icon;
use xbmc_remote::infrastructure::launcher::{launch_app, reap_app};
use xbmc_remote::infrastructure::network::{PacketSink, UdpTransport};
use xbmc_remote::infrastructure::storage::config::{load_config, AppConfig, SessionMode};

// ── CLI argument definitions ──────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum KindArg {
    Apple,
    Wii,
}

impl From<KindArg> for RemoteKind {
    fn from(kind: KindArg) -> Self {
        match kind {
            KindArg::Apple => RemoteKind::Apple,
            KindArg::Wii => RemoteKind::Wii,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum ModeArg {
    Remote,
    Mouse,
}

impl From<ModeArg> for SessionMode {
    fn from(mode: ModeArg) -> Self {
        match mode {
            ModeArg::Remote => SessionMode::Remote,
            ModeArg::Mouse => SessionMode::Mouse,
        }
    }
}

/// XBMC EventServer client.
///
/// Flags left unset keep the value from the config file.
#[derive(Debug, Parser)]
#[command(
    name = "xbmc-remote",
    about = "Forwards remote-control and pointer input to an XBMC EventServer",
    version
)]
struct Cli {
    /// EventServer host name or address.
    #[arg(short, long, env = "XBMC_HOST")]
    server: Option<String>,

    /// EventServer UDP port.
    #[arg(short, long, env = "XBMC_PORT")]
    port: Option<u16>,

    /// Universal mode: `menu` (Apple) or `home` (Wii) starts a chord.
    #[arg(short, long)]
    universal: bool,

    /// Chord window in milliseconds.
    #[arg(short, long, value_name = "MS")]
    timeout: Option<u64>,

    /// Log at debug level unless RUST_LOG says otherwise.
    #[arg(short, long)]
    verbose: bool,

    #[arg(long, value_enum)]
    kind: Option<KindArg>,

    #[arg(long, value_enum)]
    mode: Option<ModeArg>,

    /// Mac OS X version whose HID cookie table to use, e.g. `10.4`.
    #[arg(long, value_name = "X.Y")]
    os_version: Option<String>,

    /// Device name announced in HELO.
    #[arg(long)]
    name: Option<String>,

    /// JPEG, PNG or GIF sent with HELO.
    #[arg(long)]
    icon: Option<PathBuf>,

    /// Read device commands from this file instead of stdin.
    #[arg(long)]
    input: Option<PathBuf>,

    /// Media center executable to start.
    #[arg(long)]
    app_path: Option<PathBuf>,

    /// Exported as XBMC_HOME to the started media center.
    #[arg(long)]
    app_home: Option<PathBuf>,

    /// Config file to use instead of the platform default.
    #[arg(long)]
    external_config: Option<PathBuf>,
}

impl Cli {
    /// Overwrites the config values for every flag that was given.
    fn apply_to(&self, config: &mut AppConfig) {
        if let Some(host) = &self.server {
            config.server.host = host.clone();
        }
        if let Some(port) = self.port {
            config.server.port = port;
        }
        if self.universal {
            config.remote.universal = true;
        }
        if let Some(ms) = self.timeout {
            config.remote.max_click_ms = ms;
        }
        if let Some(kind) = self.kind {
            config.remote.kind = kind.into();
        }
        if let Some(mode) = self.mode {
            config.client.mode = mode.into();
        }
        if let Some(name) = &self.name {
            config.client.device_name = Some(name.clone());
        }
        if let Some(icon) = &self.icon {
            config.client.icon = Some(icon.clone());
        }
        if let Some(path) = &self.app_path {
            config.app.path = Some(path.clone());
        }
        if let Some(home) = &self.app_home {
            config.app.home = Some(home.clone());
        }
    }

    /// Loads the config file and applies the flags on top.
    fn effective_config(&self) -> anyhow::Result<AppConfig> {
        let mut config = load_config(self.external_config.as_deref())
            .context("failed to load configuration")?;
        self.apply_to(&mut config);
        Ok(config)
    }

    /// `--os-version` wins over the config file's `cookie_table`.
    fn cookie_table(&self, config: &AppConfig) -> Option<CookieTable> {
        if let Some(version) = &self.os_version {
            match CookieTable::for_version_str(version) {
                Some(table) => return Some(table),
                None => warn!(version = %version, "unrecognised OS version, using configured cookie table"),
            }
        }
        config.remote.cookie_table.table()
    }

    fn log_filter(&self) -> EnvFilter {
        let default = if self.verbose { "debug" } else { "info" };
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default))
    }
}

// ── Session wiring ────────────────────────────────────────────────────────────

enum ActiveSession {
    Remote(RemoteSession),
    Mouse(MouseSession),
}

impl ActiveSession {
    fn build(config: &AppConfig, link: SessionLink) -> Self {
        match config.client.mode {
            SessionMode::Remote => {
                let router = CommandRouter::new(config.command_map(), config.router_config());
                ActiveSession::Remote(RemoteSession::new(link, config.remote.kind, router))
            }
            SessionMode::Mouse => {
                let state = MouseState::new(config.mouse.width, config.mouse.height);
                ActiveSession::Mouse(MouseSession::new(link, state, config.mouse.device_map.clone()))
            }
        }
    }

    fn as_dyn(&mut self) -> &mut dyn Session {
        match self {
            ActiveSession::Remote(s) => s,
            ActiveSession::Mouse(s) => s,
        }
    }

    /// Applies a reloaded config.  Only the key bindings and chord settings
    /// take effect without a restart.
    fn reload(&mut self, old: &AppConfig, new: &AppConfig) {
        if old.server != new.server || old.client.mode != new.client.mode || old.remote.kind != new.remote.kind
        {
            warn!("server, mode and remote kind changes take effect after a restart");
        }
        if let ActiveSession::Remote(session) = self {
            session.set_router(CommandRouter::new(new.command_map(), new.router_config()));
            info!(universal = new.remote.universal, "key bindings reloaded");
        }
    }
}

fn open_device(cli: &Cli, config: &AppConfig, cookies: Option<CookieTable>) -> anyhow::Result<Box<dyn InputDevice>> {
    let keys: Vec<String> = match config.client.mode {
        SessionMode::Remote => config.remote.kind.key_names().iter().map(|k| k.to_string()).collect(),
        SessionMode::Mouse => MOUSE_BUTTON_NAMES.iter().map(|k| k.to_string()).collect(),
    };
    let device = match &cli.input {
        Some(path) => {
            let file = File::open(path).with_context(|| format!("cannot open input file {}", path.display()))?;
            LineDevice::new(Box::new(BufReader::new(file)), keys, cookies)
        }
        None => LineDevice::stdin(keys, cookies),
    };
    Ok(Box::new(device))
}

/// Forwards Ctrl+C, SIGTERM and SIGHUP to the poll loop.
fn spawn_signal_handlers(tx: mpsc::Sender<ControlEvent>) {
    let ctrl_c_tx = tx.clone();
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                info!("received Ctrl+C, shutting down");
                let _ = ctrl_c_tx.send(ControlEvent::Shutdown).await;
            }
            Err(e) => error!("failed to listen for Ctrl+C signal: {e}"),
        }
    });

    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};

        let term_tx = tx.clone();
        tokio::spawn(async move {
            match signal(SignalKind::terminate()) {
                Ok(mut term) => {
                    if term.recv().await.is_some() {
                        info!("received SIGTERM, shutting down");
                        let _ = term_tx.send(ControlEvent::Shutdown).await;
                    }
                }
                Err(e) => error!("failed to listen for SIGTERM: {e}"),
            }
        });

        tokio::spawn(async move {
            match signal(SignalKind::hangup()) {
                Ok(mut hup) => {
                    while hup.recv().await.is_some() {
                        info!("received SIGHUP, reloading configuration");
                        if tx.send(ControlEvent::Reload).await.is_err() {
                            break;
                        }
                    }
                }
                Err(e) => error!("failed to listen for SIGHUP: {e}"),
            }
        });
    }

    #[cfg(not(unix))]
    drop(tx);
}

// ── Entry point ───────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::fmt().with_env_filter(cli.log_filter()).init();

    let mut config = cli.effective_config()?;
    let cookies = cli.cookie_table(&config);

    let mut media_center = match &config.app.path {
        Some(path) => launch_app(path, config.app.home.as_deref())
            .map_err(|e| error!("{e}"))
            .ok(),
        None => None,
    };

    // ── Transport ─────────────────────────────────────────────────────────────
    let transport = UdpTransport::connect(&config.server.host, config.server.port)
        .context("cannot open UDP socket")?;
    info!(server = %transport.target(), "sending to EventServer");
    let sink: Arc<dyn PacketSink> = Arc::new(transport);

    // ── Session ───────────────────────────────────────────────────────────────
    let (icon_type, icon_data) = load_icon(config.client.icon.as_deref());
    let helo = HeloMessage {
        device_name: config.device_name(),
        icon_type,
        icon_data,
    };
    let link = SessionLink::new(sink, helo, config.ping_interval());
    let mut session = ActiveSession::build(&config, link);

    // ── Device ────────────────────────────────────────────────────────────────
    let device = open_device(&cli, &config, cookies)?;
    let mut monitor = DeviceMonitor::new(device, config.client.max_poll_failures);
    monitor.initialize().context("input device unavailable")?;

    let (tx, mut rx) = mpsc::channel(8);
    spawn_signal_handlers(tx);

    // ── Poll loop ─────────────────────────────────────────────────────────────
    session.as_dyn().start(Instant::now());
    loop {
        match drive(session.as_dyn(), &mut monitor, config.poll_interval(), &mut rx).await {
            StopReason::Reload => match cli.effective_config() {
                Ok(new_config) => {
                    session.reload(&config, &new_config);
                    config = new_config;
                }
                Err(e) => warn!("reload failed, keeping previous configuration: {e:#}"),
            },
            StopReason::Shutdown | StopReason::DeviceClosed => break,
        }
    }
    session.as_dyn().stop(Instant::now());

    if let Some(child) = media_center.as_mut() {
        reap_app(child);
    }
    info!("xbmc-remote stopped");
    Ok(())
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_no_flags_keep_config_values() {
        // Arrange
        let cli = Cli::parse_from(["xbmc-remote"]);
        let mut config = AppConfig::default();
        config.server.host = "media-pc".to_string();

        // Act
        cli.apply_to(&mut config);

        // Assert
        assert_eq!(config.server.host, "media-pc");
        assert_eq!(config.server.port, 9777);
        assert!(!config.remote.universal);
    }

    #[test]
    fn test_flags_override_config() {
        // Arrange
        let cli = Cli::parse_from([
            "xbmc-remote",
            "-s",
            "10.0.0.2",
            "--port",
            "9000",
            "-u",
            "--timeout",
            "300",
            "--kind",
            "wii",
            "--mode",
            "mouse",
            "--name",
            "Lounge",
        ]);
        let mut config = AppConfig::default();

        // Act
        cli.apply_to(&mut config);

        // Assert
        assert_eq!(config.server.host, "10.0.0.2");
        assert_eq!(config.server.port, 9000);
        assert!(config.remote.universal);
        assert_eq!(config.remote.max_click_ms, 300);
        assert_eq!(config.remote.kind, RemoteKind::Wii);
        assert_eq!(config.client.mode, SessionMode::Mouse);
        assert_eq!(config.device_name(), "Lounge");
    }

    #[test]
    fn test_app_flags_override_config() {
        let cli = Cli::parse_from(["xbmc-remote", "--app-path", "/opt/xbmc/xbmc", "--app-home", "/opt/xbmc"]);
        let mut config = AppConfig::default();

        cli.apply_to(&mut config);

        assert_eq!(config.app.path, Some(PathBuf::from("/opt/xbmc/xbmc")));
        assert_eq!(config.app.home, Some(PathBuf::from("/opt/xbmc")));
    }

    #[test]
    fn test_os_version_selects_cookie_table() {
        let config = AppConfig::default();

        let tiger = Cli::parse_from(["xbmc-remote", "--os-version", "10.4"]);
        let leopard = Cli::parse_from(["xbmc-remote", "--os-version", "10.5.8"]);
        let none = Cli::parse_from(["xbmc-remote"]);

        assert_eq!(tiger.cookie_table(&config), Some(CookieTable::Tiger));
        assert_eq!(leopard.cookie_table(&config), Some(CookieTable::Leopard));
        assert_eq!(none.cookie_table(&config), None, "auto tries every table");
    }

    #[test]
    fn test_bad_os_version_falls_back_to_config() {
        let cli = Cli::parse_from(["xbmc-remote", "--os-version", "eleven"]);
        let mut config = AppConfig::default();
        config.remote.cookie_table = xbmc_remote::infrastructure::storage::config::CookieTableSetting::Leopard;

        assert_eq!(cli.cookie_table(&config), Some(CookieTable::Leopard));
    }

    #[test]
    fn test_unknown_kind_is_rejected() {
        let result = Cli::try_parse_from(["xbmc-remote", "--kind", "xbox"]);
        assert!(result.is_err());
    }

    #[test]
    fn test_external_config_is_loaded() {
        // Arrange
        let dir = std::env::temp_dir().join(format!("xbmc_cli_{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("config.toml");
        std::fs::write(&path, "[server]\nport = 9999\n").unwrap();
        let path_str = path.to_string_lossy().to_string();
        let cli = Cli::parse_from(["xbmc-remote", "--external-config", path_str.as_str(), "-s", "box"]);

        // Act
        let config = cli.effective_config().expect("config");

        // Assert
        assert_eq!(config.server.port, 9999);
        assert_eq!(config.server.host, "box");
    }

    #[test]
    fn test_mouse_mode_builds_mouse_session() {
        // Arrange
        let mut config = AppConfig::default();
        config.client.mode = SessionMode::Mouse;
        let sink: Arc<dyn PacketSink> = Arc::new(
            UdpTransport::connect("127.0.0.1", 9).expect("loopback socket"),
        );
        let link = SessionLink::new(sink, HeloMessage::new("Mouse"), config.ping_interval());

        // Act
        let session = ActiveSession::build(&config, link);

        // Assert
        assert!(matches!(session, ActiveSession::Mouse(_)));
    }
}
