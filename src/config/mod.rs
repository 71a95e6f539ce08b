use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::error;

const DEFAULT_PORT: u16 = 4310;
const DEFAULT_API_BASE_URL: &str = "https://api.ticktick.com/api/v2";
const DEFAULT_WS_URL: &str = "wss://api.ticktick.com/websocket";
const DEFAULT_SYNC_INTERVAL_SECS: u64 = 300;

fn default_bind_address() -> String {
    "127.0.0.1".to_string()
}

// ─── TOML config file ─────────────────────────────────────────────────────────

/// `{data_dir}/config.toml` — all fields are optional overrides.
/// Priority: CLI / env var  >  TOML  >  built-in default.
#[derive(Deserialize, Default)]
struct TomlConfig {
    /// REST API port (default: 4310).
    port: Option<u16>,
    /// Bind address for the REST server (default: "127.0.0.1").
    bind_address: Option<String>,
    /// Log level filter string, e.g. "debug", "info,tickd=trace" (default: "info").
    log: Option<String>,
    /// Log output format: "pretty" (default) | "json" (structured for log aggregators).
    log_format: Option<String>,
    /// TickTick OAuth bearer token. Omit to run with remote sync disabled.
    access_token: Option<String>,
    /// Override the TickTick API base URL.
    api_base_url: Option<String>,
    /// Override the TickTick WebSocket URL.
    ws_url: Option<String>,
    /// Seconds between scheduled full syncs (default: 300).
    sync_interval_secs: Option<u64>,
}

fn load_toml(data_dir: &Path) -> Option<TomlConfig> {
    let path = data_dir.join("config.toml");
    let contents = std::fs::read_to_string(&path).ok()?;
    match toml::from_str::<TomlConfig>(&contents) {
        Ok(cfg) => Some(cfg),
        Err(e) => {
            error!(path = %path.display(), err = %e, "failed to parse config.toml — using defaults");
            None
        }
    }
}

// ─── DaemonConfig ─────────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct DaemonConfig {
    pub port: u16,
    pub bind_address: String,
    pub data_dir: PathBuf,
    pub log: String,
    /// "pretty" (default) | "json".
    pub log_format: String,
    /// TickTick OAuth bearer token (`TICKD_ACCESS_TOKEN` env var).
    /// None means remote sync is disabled until configured.
    pub access_token: Option<String>,
    /// TickTick REST base URL (`TICKD_API_URL` env var).
    pub api_base_url: String,
    /// TickTick realtime WebSocket URL (`TICKD_WS_URL` env var).
    pub ws_url: String,
    /// Interval between scheduled full syncs, in seconds.
    pub sync_interval_secs: u64,
}

impl DaemonConfig {
    /// Build config from CLI/env args + optional TOML file.
    ///
    /// Priority (highest to lowest):
    ///   1. CLI / env — passed as `Some(value)` from clap
    ///   2. TOML file at `{data_dir}/config.toml`
    ///   3. Built-in defaults
    pub fn new(
        port: Option<u16>,
        data_dir: Option<PathBuf>,
        log: Option<String>,
        bind_address: Option<String>,
    ) -> Self {
        let data_dir = data_dir.unwrap_or_else(default_data_dir);

        // Load TOML as the lowest-priority override layer
        let toml = load_toml(&data_dir).unwrap_or_default();

        let port = port.or(toml.port).unwrap_or(DEFAULT_PORT);
        let log = log.or(toml.log).unwrap_or_else(|| "info".to_string());

        let bind_address = bind_address
            .or(std::env::var("TICKD_BIND").ok().filter(|s| !s.is_empty()))
            .or(toml.bind_address)
            .unwrap_or_else(default_bind_address);

        let log_format = std::env::var("TICKD_LOG_FORMAT")
            .ok()
            .filter(|s| !s.is_empty())
            .or(toml.log_format)
            .unwrap_or_else(|| "pretty".to_string());

        let access_token = std::env::var("TICKD_ACCESS_TOKEN")
            .ok()
            .filter(|t| !t.is_empty())
            .or(toml.access_token);

        let api_base_url = std::env::var("TICKD_API_URL")
            .ok()
            .filter(|s| !s.is_empty())
            .or(toml.api_base_url)
            .unwrap_or_else(|| DEFAULT_API_BASE_URL.to_string());

        let ws_url = std::env::var("TICKD_WS_URL")
            .ok()
            .filter(|s| !s.is_empty())
            .or(toml.ws_url)
            .unwrap_or_else(|| DEFAULT_WS_URL.to_string());

        let sync_interval_secs = std::env::var("TICKD_SYNC_INTERVAL")
            .ok()
            .and_then(|s| s.parse().ok())
            .or(toml.sync_interval_secs)
            .unwrap_or(DEFAULT_SYNC_INTERVAL_SECS);

        Self {
            port,
            bind_address,
            data_dir,
            log,
            log_format,
            access_token,
            api_base_url,
            ws_url,
            sync_interval_secs,
        }
    }
}

fn default_data_dir() -> PathBuf {
    #[cfg(target_os = "macos")]
    {
        // ~/Library/Application Support/tickd
        if let Ok(home) = std::env::var("HOME") {
            return PathBuf::from(home)
                .join("Library")
                .join("Application Support")
                .join("tickd");
        }
    }
    #[cfg(target_os = "linux")]
    {
        // $XDG_DATA_HOME/tickd or ~/.local/share/tickd
        if let Ok(xdg) = std::env::var("XDG_DATA_HOME") {
            return PathBuf::from(xdg).join("tickd");
        }
        if let Ok(home) = std::env::var("HOME") {
            return PathBuf::from(home)
                .join(".local")
                .join("share")
                .join("tickd");
        }
    }
    #[cfg(target_os = "windows")]
    {
        // %APPDATA%\tickd
        if let Ok(appdata) = std::env::var("APPDATA") {
            return PathBuf::from(appdata).join("tickd");
        }
    }
    // Fallback
    PathBuf::from(".tickd")
}
