//! # Sync Configuration
//!
//! Configuration for the data-residency layer and the sync agent.
//!
//! ## Where Values Come From
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  LEDGER_* environment variables            (win over everything)       │
//! │     LEDGER_STORE_MODE=remote-authoritative                             │
//! │     LEDGER_REMOTE_URL=postgres://...                                   │
//! │                                                                         │
//! │  sync.toml                                                             │
//! │     ~/.config/ledger/sync.toml (Linux)                                 │
//! │     ~/Library/Application Support/com.ledger.sync/sync.toml (macOS)    │
//! │                                                                         │
//! │  built-in defaults                         (used when nothing is set)  │
//! │     StoreMode::LocalMirror, auto-generated device id                   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## sync.toml
//! ```toml
//! # sync.toml
//! [device]
//! id = "desk-2f9c"
//! name = "Front Desk"
//!
//! [store]
//! mode = "remote-authoritative"  # local-mirror | remote-authoritative
//!
//! [database]
//! path = "/var/lib/ledger/ledger.db"
//!
//! [remote]
//! url = "postgres://ledger@db.example.com/ledger"
//! connect_timeout_secs = 10
//!
//! [mirror]
//! path = "/srv/share/ledger-workbook"
//! debounce_ms = 500
//!
//! [queue]
//! max_retries = 10
//! drain_interval_secs = 30
//! ```

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::error::{SyncError, SyncResult};

// =============================================================================
// Store Mode
// =============================================================================

/// Which store is authoritative for reads and writes.
///
/// ```text
/// ┌─────────────────────────────────────────────────────────────────────────┐
/// │  LOCAL-MIRROR (Default)                                                 │
/// │  • Local store is the source of truth                                   │
/// │  • Remote is never written; the workbook mirrors the local copy         │
/// │                                                                         │
/// │  REMOTE-AUTHORITATIVE                                                   │
/// │  • Every local write is mirrored to the remote store                    │
/// │  • Offline or failed remote writes go to the sync queue                 │
/// │  • Reads and counters come from the remote while it is reachable        │
/// └─────────────────────────────────────────────────────────────────────────┘
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum StoreMode {
    #[default]
    LocalMirror,
    RemoteAuthoritative,
}

impl StoreMode {
    pub fn is_remote_authoritative(&self) -> bool {
        matches!(self, StoreMode::RemoteAuthoritative)
    }
}

impl std::fmt::Display for StoreMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StoreMode::LocalMirror => write!(f, "local-mirror"),
            StoreMode::RemoteAuthoritative => write!(f, "remote-authoritative"),
        }
    }
}

impl std::str::FromStr for StoreMode {
    type Err = SyncError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "local-mirror" | "local" => Ok(StoreMode::LocalMirror),
            "remote-authoritative" | "remote" => Ok(StoreMode::RemoteAuthoritative),
            other => Err(SyncError::InvalidConfig(format!(
                "Unknown store mode: '{}'. Valid options: local-mirror, remote-authoritative",
                other
            ))),
        }
    }
}

// =============================================================================
// Sections
// =============================================================================

/// Configuration for this device.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeviceConfig {
    /// Unique device identifier, generated on first run.
    pub id: String,

    #[serde(default = "default_device_name")]
    pub name: String,
}

fn default_device_name() -> String {
    "Billing Desk".to_string()
}

impl Default for DeviceConfig {
    fn default() -> Self {
        DeviceConfig {
            id: Uuid::new_v4().to_string(),
            name: default_device_name(),
        }
    }
}

/// Store residency settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StoreSettings {
    #[serde(default)]
    pub mode: StoreMode,
}

/// Local record store settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseSettings {
    /// SQLite file; defaults to the platform data dir.
    #[serde(default)]
    pub path: Option<PathBuf>,

    #[serde(default = "default_local_connections")]
    pub max_connections: u32,
}

fn default_local_connections() -> u32 {
    5
}

impl Default for DatabaseSettings {
    fn default() -> Self {
        DatabaseSettings {
            path: None,
            max_connections: default_local_connections(),
        }
    }
}

/// Remote store settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemoteSettings {
    /// PostgreSQL URL. Unset means no remote is reachable.
    #[serde(default)]
    pub url: Option<String>,

    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_secs: u64,

    #[serde(default = "default_remote_connections")]
    pub max_connections: u32,

    /// Interval between connectivity probes (seconds).
    #[serde(default = "default_health_interval")]
    pub health_check_interval_secs: u64,
}

fn default_connect_timeout() -> u64 {
    10
}
fn default_remote_connections() -> u32 {
    5
}
fn default_health_interval() -> u64 {
    15
}

impl Default for RemoteSettings {
    fn default() -> Self {
        RemoteSettings {
            url: None,
            connect_timeout_secs: default_connect_timeout(),
            max_connections: default_remote_connections(),
            health_check_interval_secs: default_health_interval(),
        }
    }
}

/// Spreadsheet mirror settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MirrorSettings {
    /// Workbook directory. Unset means exports land in the fallback dir.
    #[serde(default)]
    pub path: Option<PathBuf>,

    /// Where exports go when `path` is unset or unwritable.
    #[serde(default)]
    pub fallback_dir: Option<PathBuf>,

    /// Quiet period before a scheduled export fires (milliseconds).
    #[serde(default = "default_debounce_ms")]
    pub debounce_ms: u64,
}

fn default_debounce_ms() -> u64 {
    500
}

impl Default for MirrorSettings {
    fn default() -> Self {
        MirrorSettings {
            path: None,
            fallback_dir: None,
            debounce_ms: default_debounce_ms(),
        }
    }
}

/// Sync queue settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueueSettings {
    /// Failed attempts before an entry becomes a dead letter.
    /// Set to 0 for unbounded retries.
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// Interval between automatic drains (seconds). 0 disables the timer.
    #[serde(default = "default_drain_interval")]
    pub drain_interval_secs: u64,
}

fn default_max_retries() -> u32 {
    10
}
fn default_drain_interval() -> u64 {
    30
}

impl Default for QueueSettings {
    fn default() -> Self {
        QueueSettings {
            max_retries: default_max_retries(),
            drain_interval_secs: default_drain_interval(),
        }
    }
}

// =============================================================================
// Main Sync Configuration
// =============================================================================

/// Complete configuration for the data-residency layer.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SyncConfig {
    #[serde(default)]
    pub device: DeviceConfig,

    #[serde(default)]
    pub store: StoreSettings,

    #[serde(default)]
    pub database: DatabaseSettings,

    #[serde(default)]
    pub remote: RemoteSettings,

    #[serde(default)]
    pub mirror: MirrorSettings,

    #[serde(default)]
    pub queue: QueueSettings,
}

impl SyncConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Defaults, then `sync.toml` (explicit path or the platform config
    /// dir), then `LEDGER_*` variables, then [`SyncConfig::validate`].
    /// A missing file is not an error.
    pub fn load(config_path: Option<PathBuf>) -> SyncResult<Self> {
        let mut config = Self::default();

        if let Some(path) = config_path.or_else(Self::default_config_path) {
            if path.exists() {
                info!(?path, "Reading sync.toml");
                let contents = std::fs::read_to_string(&path)
                    .map_err(|e| SyncError::ConfigLoadFailed(format!("{}: {}", path.display(), e)))?;
                config = toml::from_str(&contents)?;
            } else {
                debug!(?path, "No sync.toml, using defaults");
            }
        }

        config.apply_env_overrides();
        config.validate()?;

        Ok(config)
    }

    /// [`SyncConfig::load`], falling back to defaults with a warning.
    pub fn load_or_default(config_path: Option<PathBuf>) -> Self {
        Self::load(config_path).unwrap_or_else(|e| {
            warn!(error = %e, "Unusable sync config, falling back to defaults");
            Self::default()
        })
    }

    /// Writes pretty TOML, creating the parent directory.
    pub fn save(&self, config_path: Option<PathBuf>) -> SyncResult<()> {
        let path = config_path
            .or_else(Self::default_config_path)
            .ok_or_else(|| SyncError::ConfigSaveFailed("no platform config directory".into()))?;

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| SyncError::ConfigSaveFailed(e.to_string()))?;
        }

        let contents = toml::to_string_pretty(self)?;
        std::fs::write(&path, contents).map_err(|e| SyncError::ConfigSaveFailed(e.to_string()))?;

        info!(?path, "sync.toml written");
        Ok(())
    }

    pub fn validate(&self) -> SyncResult<()> {
        if self.device.id.trim().is_empty() {
            return Err(SyncError::InvalidConfig("device.id must not be empty".into()));
        }

        if let Some(ref url) = self.remote.url {
            if !url.starts_with("postgres://") && !url.starts_with("postgresql://") {
                return Err(SyncError::InvalidConfig(format!(
                    "Remote URL must start with postgres:// or postgresql://, got: {}",
                    url
                )));
            }
        }

        if self.database.max_connections == 0 || self.remote.max_connections == 0 {
            return Err(SyncError::InvalidConfig("max_connections must be greater than 0".into()));
        }

        if self.remote.health_check_interval_secs == 0 {
            return Err(SyncError::InvalidConfig(
                "health_check_interval_secs must be greater than 0".into(),
            ));
        }

        Ok(())
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(id) = std::env::var("LEDGER_DEVICE_ID") {
            debug!(device_id = %id, "Overriding device ID from environment");
            self.device.id = id;
        }

        if let Ok(mode) = std::env::var("LEDGER_STORE_MODE") {
            match mode.parse() {
                Ok(parsed) => {
                    debug!(mode = %mode, "Overriding store mode from environment");
                    self.store.mode = parsed;
                }
                Err(_) => warn!(mode = %mode, "Unknown store mode in environment"),
            }
        }

        if let Ok(path) = std::env::var("LEDGER_DB_PATH") {
            self.database.path = Some(PathBuf::from(path));
        }

        if let Ok(url) = std::env::var("LEDGER_REMOTE_URL") {
            debug!("Overriding remote URL from environment");
            self.remote.url = Some(url).filter(|u| !u.is_empty());
        }

        if let Ok(path) = std::env::var("LEDGER_MIRROR_PATH") {
            self.mirror.path = Some(PathBuf::from(path)).filter(|p| !p.as_os_str().is_empty());
        }

        if let Ok(ms) = std::env::var("LEDGER_DEBOUNCE_MS") {
            if let Ok(ms) = ms.parse::<u64>() {
                self.mirror.debounce_ms = ms;
            }
        }

        if let Ok(retries) = std::env::var("LEDGER_MAX_RETRIES") {
            if let Ok(retries) = retries.parse::<u32>() {
                self.queue.max_retries = retries;
            }
        }
    }

    fn project_dirs() -> Option<directories::ProjectDirs> {
        directories::ProjectDirs::from("com", "ledger", "sync")
    }

    /// Returns the default config file path.
    pub fn default_config_path() -> Option<PathBuf> {
        Self::project_dirs().map(|dirs| dirs.config_dir().join("sync.toml"))
    }

    // =========================================================================
    // Convenience Methods
    // =========================================================================

    pub fn device_id(&self) -> &str {
        &self.device.id
    }

    pub fn mode(&self) -> StoreMode {
        self.store.mode
    }

    pub fn remote_url(&self) -> Option<&str> {
        self.remote.url.as_deref()
    }

    /// Resolved SQLite path: configured, else `<data dir>/ledger.db`.
    pub fn database_path(&self) -> PathBuf {
        self.database.path.clone().unwrap_or_else(|| {
            Self::project_dirs()
                .map(|dirs| dirs.data_dir().join("ledger.db"))
                .unwrap_or_else(|| PathBuf::from("ledger.db"))
        })
    }

    /// Resolved fallback workbook directory.
    pub fn mirror_fallback_dir(&self) -> PathBuf {
        self.mirror.fallback_dir.clone().unwrap_or_else(|| {
            Self::project_dirs()
                .map(|dirs| dirs.data_dir().join("workbook"))
                .unwrap_or_else(|| PathBuf::from("workbook"))
        })
    }

    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.mirror.debounce_ms)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.remote.connect_timeout_secs)
    }

    /// `None` when the periodic drain is disabled.
    pub fn drain_interval(&self) -> Option<Duration> {
        (self.queue.drain_interval_secs > 0).then(|| Duration::from_secs(self.queue.drain_interval_secs))
    }

    pub fn health_check_interval(&self) -> Duration {
        Duration::from_secs(self.remote.health_check_interval_secs)
    }
}
