//! # Kiosk Configuration
//!
//! Everything the kiosk reads at startup, from `kiosk.toml`.
//!
//! ## Configuration Sources (Priority Order)
//! 1. Environment variables (`SCANPAY_*`)
//! 2. Config file (`SCANPAY_CONFIG`, else `kiosk.toml` in the platform
//!    config directory; a missing default file is not an error)
//! 3. Defaults (this file)
//!
//! ## Configuration File Format
//! ```toml
//! [device]
//! name = "Lane 3"
//!
//! [store]
//! name = "Corner Mart"
//! currency_symbol = "₹"
//! currency_decimals = 0
//!
//! [backend]
//! base_url = "https://store.example/"
//!
//! [scanner]
//! debounce_ms = 2500
//! sound_enabled = true
//!
//! [checkout]
//! payment_delay_ms = 1500
//! timeout_secs = 15
//!
//! [receipt]
//! paper_width = 42
//! output_dir = "/var/spool/scanpay"
//! html = true
//!
//! [database]
//! path = "/var/lib/scanpay/kiosk.db"
//! ```

use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info, warn};

use scanpay_core::validation::validate_paper_width;
use scanpay_core::{ReceiptFormat, ValidationError, DEFAULT_DEBOUNCE_WINDOW_MS};
use scanpay_db::DeviceRepository;
use scanpay_sync::{BackendConfig, DraftSyncSettings, SyncError};

// =============================================================================
// Errors
// =============================================================================

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config file: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Invalid configuration: {0}")]
    Invalid(String),

    #[error(transparent)]
    Backend(#[from] SyncError),

    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("Could not determine platform directories")]
    NoPlatformDirs,
}

pub type ConfigResult<T> = Result<T, ConfigError>;

// =============================================================================
// Sections
// =============================================================================

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DeviceConfig {
    /// Stable device id; generated and stored locally when absent.
    #[serde(default)]
    pub id: Option<String>,

    #[serde(default)]
    pub name: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    #[serde(default = "default_store_name")]
    pub name: String,

    #[serde(default = "default_currency_symbol")]
    pub currency_symbol: String,

    /// Catalog prices are whole currency units, hence 0.
    #[serde(default)]
    pub currency_decimals: u32,
}

fn default_store_name() -> String {
    "ScanPay Store".to_string()
}

fn default_currency_symbol() -> String {
    "₹".to_string()
}

impl Default for StoreConfig {
    fn default() -> Self {
        StoreConfig {
            name: default_store_name(),
            currency_symbol: default_currency_symbol(),
            currency_decimals: 0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScannerConfig {
    /// Window within which the same code is read only once.
    #[serde(default = "default_debounce_ms")]
    pub debounce_ms: u64,

    #[serde(default = "default_true")]
    pub sound_enabled: bool,
}

fn default_debounce_ms() -> u64 {
    DEFAULT_DEBOUNCE_WINDOW_MS
}

fn default_true() -> bool {
    true
}

impl Default for ScannerConfig {
    fn default() -> Self {
        ScannerConfig {
            debounce_ms: default_debounce_ms(),
            sound_enabled: true,
        }
    }
}

impl ScannerConfig {
    pub fn debounce_window(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckoutConfig {
    /// Simulated payment gateway round-trip.
    #[serde(default = "default_payment_delay")]
    pub payment_delay_ms: u64,

    /// Bound on each checkout network call.
    #[serde(default = "default_checkout_timeout")]
    pub timeout_secs: u64,
}

fn default_payment_delay() -> u64 {
    1_500
}

fn default_checkout_timeout() -> u64 {
    15
}

impl Default for CheckoutConfig {
    fn default() -> Self {
        CheckoutConfig {
            payment_delay_ms: default_payment_delay(),
            timeout_secs: default_checkout_timeout(),
        }
    }
}

impl CheckoutConfig {
    pub fn payment_delay(&self) -> Duration {
        Duration::from_millis(self.payment_delay_ms)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReceiptConfig {
    #[serde(default = "default_paper_width")]
    pub paper_width: usize,

    /// Where receipts are written; defaults to `<data dir>/receipts`.
    #[serde(default)]
    pub output_dir: Option<PathBuf>,

    /// Also write the printable HTML copy.
    #[serde(default = "default_true")]
    pub html: bool,
}

fn default_paper_width() -> usize {
    42
}

impl Default for ReceiptConfig {
    fn default() -> Self {
        ReceiptConfig {
            paper_width: default_paper_width(),
            output_dir: None,
            html: true,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// SQLite file; defaults to `<data dir>/scanpay.db`.
    #[serde(default)]
    pub path: Option<PathBuf>,
}

// =============================================================================
// Kiosk Config
// =============================================================================

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct KioskConfig {
    #[serde(default)]
    pub device: DeviceConfig,

    #[serde(default)]
    pub store: StoreConfig,

    #[serde(default)]
    pub backend: BackendConfig,

    #[serde(default)]
    pub draft_sync: DraftSyncSettings,

    #[serde(default)]
    pub scanner: ScannerConfig,

    #[serde(default)]
    pub checkout: CheckoutConfig,

    #[serde(default)]
    pub receipt: ReceiptConfig,

    #[serde(default)]
    pub database: DatabaseConfig,
}

impl KioskConfig {
    /// Loads defaults, then the config file, then environment overrides.
    ///
    /// `explicit` (or `SCANPAY_CONFIG`) must exist; the platform default
    /// file is optional.
    pub fn load(explicit: Option<PathBuf>) -> ConfigResult<Self> {
        let explicit = explicit.or_else(|| std::env::var("SCANPAY_CONFIG").ok().map(PathBuf::from));

        let mut config = match explicit {
            Some(path) => Self::from_file(&path)?,
            None => match default_config_path() {
                Some(path) if path.exists() => Self::from_file(&path)?,
                _ => {
                    debug!("No config file; using defaults");
                    KioskConfig::default()
                }
            },
        };

        config.apply_env(|key| std::env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> ConfigResult<Self> {
        info!(?path, "Loading configuration");
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&raw)
    }

    pub fn from_toml_str(raw: &str) -> ConfigResult<Self> {
        Ok(toml::from_str(raw)?)
    }

    /// Applies `SCANPAY_*` overrides read through `lookup`.
    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) -> ConfigResult<()> {
        if let Some(path) = lookup("SCANPAY_DB_PATH") {
            self.database.path = Some(PathBuf::from(path));
        }
        if let Some(url) = lookup("SCANPAY_BACKEND_URL") {
            self.backend.base_url = url;
        }
        if let Some(mode) = lookup("SCANPAY_BACKEND_MODE") {
            self.backend.mode = mode.parse()?;
        }
        if let Some(cookie) = lookup("SCANPAY_SESSION_COOKIE") {
            self.backend.session_cookie = Some(cookie);
        }
        if let Some(token) = lookup("SCANPAY_CSRF_TOKEN") {
            self.backend.csrf_token = Some(token);
        }
        if let Some(ms) = lookup("SCANPAY_DEBOUNCE_MS") {
            self.scanner.debounce_ms = ms.trim().parse().map_err(|_| {
                ConfigError::Invalid(format!("SCANPAY_DEBOUNCE_MS must be a number, got '{}'", ms))
            })?;
        }
        if let Some(name) = lookup("SCANPAY_STORE_NAME") {
            self.store.name = name;
        }
        if let Some(id) = lookup("SCANPAY_DEVICE_ID") {
            self.device.id = Some(id);
        }
        Ok(())
    }

    /// Fills in the device id when neither the file nor the environment set
    /// one. The id is kept in local storage so every boot reports the same
    /// device; if storage fails the kiosk runs under an unsaved id.
    pub async fn ensure_device_id(&mut self, stored: &DeviceRepository) {
        if self.device.id.as_deref().is_some_and(|id| !id.trim().is_empty()) {
            return;
        }

        let fresh = uuid::Uuid::new_v4().to_string();
        let id = match stored.get_or_insert_id(&fresh).await {
            Ok(id) => id,
            Err(e) => {
                warn!(error = %e, device_id = %fresh, "Could not store device id; using an unsaved one");
                fresh
            }
        };
        self.device.id = Some(id);
    }

    pub fn validate(&self) -> ConfigResult<()> {
        self.backend.validate()?;
        self.draft_sync.validate()?;

        if self.scanner.debounce_ms == 0 {
            return Err(ConfigError::Invalid(
                "scanner.debounce_ms must be greater than 0".into(),
            ));
        }
        if self.checkout.timeout_secs == 0 {
            return Err(ConfigError::Invalid(
                "checkout.timeout_secs must be greater than 0".into(),
            ));
        }
        validate_paper_width(self.receipt.paper_width)?;

        if self.store.name.trim().is_empty() {
            return Err(ConfigError::Invalid("store.name must not be empty".into()));
        }
        Ok(())
    }

    pub fn receipt_format(&self) -> ReceiptFormat {
        ReceiptFormat {
            currency_symbol: self.store.currency_symbol.clone(),
            currency_decimals: self.store.currency_decimals,
            paper_width: self.receipt.paper_width,
        }
    }

    pub fn database_path(&self) -> ConfigResult<PathBuf> {
        match &self.database.path {
            Some(path) => Ok(path.clone()),
            None => Ok(project_dirs()?.data_dir().join("scanpay.db")),
        }
    }

    pub fn receipt_dir(&self) -> ConfigResult<PathBuf> {
        match &self.receipt.output_dir {
            Some(dir) => Ok(dir.clone()),
            None => Ok(project_dirs()?.data_dir().join("receipts")),
        }
    }
}

/// Platform folders.
///
/// - **macOS**: `~/Library/Application Support/com.scanpay.kiosk/`
/// - **Windows**: `%APPDATA%\scanpay\kiosk\`
/// - **Linux**: `~/.local/share/scanpay-kiosk/`, config in `~/.config/scanpay-kiosk/`
fn project_dirs() -> ConfigResult<ProjectDirs> {
    ProjectDirs::from("com", "scanpay", "kiosk").ok_or(ConfigError::NoPlatformDirs)
}

fn default_config_path() -> Option<PathBuf> {
    ProjectDirs::from("com", "scanpay", "kiosk").map(|dirs| dirs.config_dir().join("kiosk.toml"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use scanpay_db::{Database, DbConfig};
    use scanpay_sync::BackendMode;
    use std::collections::HashMap;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults_are_valid() {
        let config = KioskConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.scanner.debounce_ms, 2_500);
        assert_eq!(config.checkout.payment_delay_ms, 1_500);
        assert_eq!(config.receipt.paper_width, 42);
        assert_eq!(config.store.currency_symbol, "₹");
    }

    #[test]
    fn test_partial_file() {
        let config = KioskConfig::from_toml_str(
            r#"
            [store]
            name = "Corner Mart"

            [backend]
            mode = "offline"

            [scanner]
            debounce_ms = 1000
            "#,
        )
        .unwrap();

        assert_eq!(config.store.name, "Corner Mart");
        assert_eq!(config.backend.mode, BackendMode::Offline);
        assert_eq!(config.scanner.debounce_window(), Duration::from_secs(1));
        assert!(config.scanner.sound_enabled);
        assert_eq!(config.draft_sync.max_attempts, 5);
    }

    #[test]
    fn test_env_overrides_file() {
        let mut config = KioskConfig::from_toml_str("[store]\nname = \"File Name\"").unwrap();
        config
            .apply_env(env(&[
                ("SCANPAY_STORE_NAME", "Env Name"),
                ("SCANPAY_BACKEND_URL", "https://shop.test/"),
                ("SCANPAY_BACKEND_MODE", "offline"),
                ("SCANPAY_DEBOUNCE_MS", "800"),
                ("SCANPAY_CSRF_TOKEN", "tok"),
            ]))
            .unwrap();

        assert_eq!(config.store.name, "Env Name");
        assert_eq!(config.backend.base_url, "https://shop.test/");
        assert_eq!(config.backend.mode, BackendMode::Offline);
        assert_eq!(config.scanner.debounce_ms, 800);
        assert_eq!(config.backend.csrf_token.as_deref(), Some("tok"));
    }

    #[test]
    fn test_bad_env_value_rejected() {
        let mut config = KioskConfig::default();
        assert!(config.apply_env(env(&[("SCANPAY_DEBOUNCE_MS", "soon")])).is_err());
        assert!(config.apply_env(env(&[("SCANPAY_BACKEND_MODE", "fax")])).is_err());
    }

    #[test]
    fn test_validation_rules() {
        let mut config = KioskConfig::default();
        config.scanner.debounce_ms = 0;
        assert!(config.validate().is_err());

        let mut config = KioskConfig::default();
        config.receipt.paper_width = 100;
        assert!(config.validate().is_err());

        let mut config = KioskConfig::default();
        config.backend.base_url = "ftp://store/".into();
        assert!(config.validate().is_err());
    }

    #[tokio::test]
    async fn test_device_id_stable_across_boots() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("kiosk.db");

        let db = Database::new(DbConfig::new(path.clone())).await.unwrap();
        let mut first = KioskConfig::default();
        first.ensure_device_id(&db.device()).await;
        let id = first.device.id.clone().unwrap();
        assert!(uuid::Uuid::parse_str(&id).is_ok());
        db.close().await;

        let db = Database::new(DbConfig::new(path)).await.unwrap();
        let mut second = KioskConfig::default();
        second.ensure_device_id(&db.device()).await;
        assert_eq!(second.device.id.as_deref(), Some(id.as_str()));
    }

    #[tokio::test]
    async fn test_configured_device_id_wins() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let mut config = KioskConfig::default();
        config.apply_env(|key| (key == "SCANPAY_DEVICE_ID").then(|| "lane-4".to_string())).unwrap();

        config.ensure_device_id(&db.device()).await;

        assert_eq!(config.device.id.as_deref(), Some("lane-4"));
        assert!(db.device().load_id().await.unwrap().is_none());
    }

    #[test]
    fn test_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("kiosk.toml");
        std::fs::write(&path, "[receipt]\npaper_width = 32\nhtml = false\n").unwrap();

        let config = KioskConfig::from_file(&path).unwrap();
        assert_eq!(config.receipt.paper_width, 32);
        assert!(!config.receipt.html);

        let missing = KioskConfig::from_file(&dir.path().join("nope.toml"));
        assert!(matches!(missing, Err(ConfigError::Io { .. })));
    }
}
