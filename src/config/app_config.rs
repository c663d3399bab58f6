//! Application Configuration - service endpoints, paths, pricing and
//! timeouts as operator-tunable TOML values.
//!
//! Every struct implements `Default` with values matching the constants in
//! [`super::defaults`], so a missing config file changes nothing.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use super::defaults;
use crate::ephemeris::SiderealModel;
use crate::types::ProductTier;

// ============================================================================
// Top-Level Config
// ============================================================================

/// Root configuration for one deployment.
///
/// Load with `AppConfig::load()` which searches:
/// 1. `$COSMO_CONFIG` env var
/// 2. `./cosmo.toml`
/// 3. Built-in defaults
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Order database location
    #[serde(default)]
    pub storage: StorageConfig,

    /// Rendered documents and exported results
    #[serde(default)]
    pub output: OutputConfig,

    /// Override paths for the decan and channel tables
    #[serde(default)]
    pub tables: TablesConfig,

    /// Ephemeris engine endpoint and sidereal model
    #[serde(default)]
    pub ephemeris: EphemerisConfig,

    /// Geocoder / timezone endpoints, timeouts and retry policy
    #[serde(default)]
    pub geocoding: GeocodingConfig,

    /// Outbound mail relay
    #[serde(default)]
    pub mail: MailConfig,

    /// Price per product tier
    #[serde(default)]
    pub pricing: PricingConfig,

    /// Reference place and time for the quick sign check
    #[serde(default)]
    pub sign_check: SignCheckConfig,
}

impl AppConfig {
    /// Load configuration using the standard search order:
    /// 1. `$COSMO_CONFIG` environment variable
    /// 2. `./cosmo.toml` in the current working directory
    /// 3. Built-in defaults
    ///
    /// Environment overrides are applied on top of whichever source won.
    pub fn load() -> Self {
        let mut config = Self::load_file_or_default();
        config.apply_env_overrides();
        config
    }

    fn load_file_or_default() -> Self {
        // 1. Check env var
        if let Ok(path) = std::env::var(defaults::CONFIG_ENV_VAR) {
            let p = PathBuf::from(&path);
            if p.exists() {
                match Self::load_from_file(&p) {
                    Ok(config) => {
                        info!(path = %p.display(), "Loaded config from COSMO_CONFIG");
                        return config;
                    }
                    Err(e) => {
                        warn!(path = %p.display(), error = %e, "Failed to load config from COSMO_CONFIG, falling back");
                    }
                }
            } else {
                warn!(path = %path, "COSMO_CONFIG points to non-existent file, falling back");
            }
        }

        // 2. Check ./cosmo.toml
        let local = PathBuf::from(defaults::DEFAULT_CONFIG_FILE);
        if local.exists() {
            match Self::load_from_file(&local) {
                Ok(config) => {
                    info!("Loaded config from ./cosmo.toml");
                    return config;
                }
                Err(e) => {
                    warn!(error = %e, "Failed to load ./cosmo.toml, using defaults");
                }
            }
        }

        // 3. Defaults
        info!("No cosmo.toml found, using built-in defaults");
        Self::default()
    }

    /// Load from a specific TOML file path.
    pub fn load_from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::Io(path.to_path_buf(), e))?;
        Self::from_toml_str(&contents).map_err(|e| match e {
            ConfigError::Parse(_, inner) => ConfigError::Parse(path.to_path_buf(), inner),
            other => other,
        })
    }

    /// Parse and validate a TOML document. Unknown keys only warn.
    pub fn from_toml_str(contents: &str) -> Result<Self, ConfigError> {
        for w in super::validation::validate_unknown_keys(contents) {
            warn!("{}", w);
        }

        let config: Self = toml::from_str(contents)
            .map_err(|e| ConfigError::Parse(PathBuf::from("<inline>"), e))?;
        config.validate()?;
        Ok(config)
    }

    /// Secrets and deployment paths may come from the environment instead of
    /// the file.
    ///
    /// - `COSMO_MAIL_API_KEY` -> `mail.api_key`
    /// - `COSMO_DATA_DIR` -> `storage.data_dir`
    /// - `COSMO_EPHEMERIS_URL` -> `ephemeris.base_url`
    pub fn apply_env_overrides(&mut self) {
        if let Ok(key) = std::env::var("COSMO_MAIL_API_KEY") {
            if !key.trim().is_empty() {
                self.mail.api_key = key;
            }
        }
        if let Ok(dir) = std::env::var("COSMO_DATA_DIR") {
            info!(data_dir = %dir, "Storage directory overridden by COSMO_DATA_DIR");
            self.storage.data_dir = PathBuf::from(dir);
        }
        if let Ok(url) = std::env::var("COSMO_EPHEMERIS_URL") {
            self.ephemeris.base_url = url;
        }
    }

    /// Serialize the current config to a TOML string.
    pub fn to_toml(&self) -> Result<String, ConfigError> {
        toml::to_string_pretty(self).map_err(ConfigError::Serialize)
    }

    /// Validate values that would make the service misbehave at runtime.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let mut errors: Vec<String> = Vec::new();

        if self.ephemeris.timeout_secs == 0 {
            errors.push("ephemeris.timeout_secs must be > 0".to_string());
        }
        if self.ephemeris.base_url.trim().is_empty() {
            errors.push("ephemeris.base_url must not be empty".to_string());
        }

        let g = &self.geocoding;
        if g.timeout_secs == 0 {
            errors.push("geocoding.timeout_secs must be > 0".to_string());
        }
        if g.max_attempts == 0 || g.max_attempts > 10 {
            errors.push(format!(
                "geocoding.max_attempts = {} must be between 1 and 10",
                g.max_attempts
            ));
        }
        if g.user_agent.trim().is_empty() {
            errors.push("geocoding.user_agent must not be empty".to_string());
        }

        if self.mail.timeout_secs == 0 {
            errors.push("mail.timeout_secs must be > 0".to_string());
        }

        Self::check_price(self.pricing.normal, "pricing.normal", &mut errors);
        Self::check_price(self.pricing.pro, "pricing.pro", &mut errors);

        // Range checks also reject NaN
        let s = &self.sign_check;
        if !(-90.0..=90.0).contains(&s.latitude) {
            errors.push(format!("sign_check.latitude = {} is outside -90..90", s.latitude));
        }
        if !(-180.0..=180.0).contains(&s.longitude) {
            errors.push(format!("sign_check.longitude = {} is outside -180..180", s.longitude));
        }
        if s.timezone.trim().is_empty() {
            errors.push("sign_check.timezone must not be empty".to_string());
        }
        if crate::types::parse_birth_time(&s.time).is_err() {
            errors.push(format!("sign_check.time = '{}' is not HH:MM", s.time));
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(ConfigError::Validation(errors))
        }
    }

    fn check_price(value: f64, name: &str, errors: &mut Vec<String>) {
        if !value.is_finite() || value < 0.0 {
            errors.push(format!("{name} = {value} must be a non-negative finite amount"));
        }
    }
}

// ============================================================================
// Error Type
// ============================================================================

#[derive(Debug)]
pub enum ConfigError {
    Io(PathBuf, std::io::Error),
    Parse(PathBuf, toml::de::Error),
    Serialize(toml::ser::Error),
    Validation(Vec<String>),
    /// A static lookup table could not be loaded
    Table(crate::error::ConfigGap),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::Io(path, e) => write!(f, "Config I/O error ({}): {}", path.display(), e),
            ConfigError::Parse(path, e) => {
                write!(f, "Config parse error ({}): {}", path.display(), e)
            }
            ConfigError::Serialize(e) => write!(f, "Config serialization error: {}", e),
            ConfigError::Validation(errors) => {
                writeln!(f, "Config validation failed:")?;
                for e in errors {
                    writeln!(f, "  - {}", e)?;
                }
                Ok(())
            }
            ConfigError::Table(gap) => write!(f, "Static table error: {}", gap),
        }
    }
}

impl std::error::Error for ConfigError {}

impl From<crate::error::ConfigGap> for ConfigError {
    fn from(gap: crate::error::ConfigGap) -> Self {
        ConfigError::Table(gap)
    }
}

// ============================================================================
// Storage / Output
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Directory holding the order database and the process lock
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,
}

fn default_data_dir() -> PathBuf {
    PathBuf::from("./data")
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputConfig {
    /// Where rendered documents are written
    #[serde(default = "default_documents_dir")]
    pub documents_dir: PathBuf,

    /// Where exported computation results are written
    #[serde(default = "default_export_dir")]
    pub export_dir: PathBuf,

    /// Write a JSON export of every fulfilled order's result
    #[serde(default)]
    pub export_results: bool,
}

fn default_documents_dir() -> PathBuf {
    PathBuf::from("./output")
}
fn default_export_dir() -> PathBuf {
    PathBuf::from("./output/results")
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            documents_dir: default_documents_dir(),
            export_dir: default_export_dir(),
            export_results: false,
        }
    }
}

/// Optional replacements for the embedded decan and channel tables.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TablesConfig {
    #[serde(default)]
    pub decans_path: Option<PathBuf>,
    #[serde(default)]
    pub channels_path: Option<PathBuf>,
}

// ============================================================================
// Upstream Collaborators
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EphemerisConfig {
    /// Base URL of the ephemeris engine
    #[serde(default = "default_ephemeris_url")]
    pub base_url: String,

    #[serde(default = "default_ephemeris_timeout")]
    pub timeout_secs: u64,

    /// Sidereal offset model
    #[serde(default)]
    pub sidereal_model: SiderealModel,
}

fn default_ephemeris_url() -> String {
    "http://127.0.0.1:8088".to_string()
}
fn default_ephemeris_timeout() -> u64 {
    defaults::EPHEMERIS_TIMEOUT_SECS
}

impl Default for EphemerisConfig {
    fn default() -> Self {
        Self {
            base_url: default_ephemeris_url(),
            timeout_secs: default_ephemeris_timeout(),
            sidereal_model: SiderealModel::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeocodingConfig {
    /// Nominatim-compatible search endpoint
    #[serde(default = "default_geocoder_url")]
    pub geocoder_url: String,

    /// Timezone lookup endpoint taking `lat` and `lon` query parameters
    #[serde(default = "default_timezone_url")]
    pub timezone_url: String,

    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    /// Preferred language of the returned display name
    #[serde(default = "default_language")]
    pub language: String,

    #[serde(default = "default_geocoding_timeout")]
    pub timeout_secs: u64,

    /// Attempts for transient failures, first try included
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    #[serde(default = "default_retry_backoff")]
    pub retry_backoff_ms: u64,
}

fn default_geocoder_url() -> String {
    "https://nominatim.openstreetmap.org/search".to_string()
}
fn default_timezone_url() -> String {
    "http://127.0.0.1:8089/timezone".to_string()
}
fn default_user_agent() -> String {
    concat!("cosmo-profile/", env!("CARGO_PKG_VERSION")).to_string()
}
fn default_language() -> String {
    "de".to_string()
}
fn default_geocoding_timeout() -> u64 {
    defaults::GEOCODING_TIMEOUT_SECS
}
fn default_max_attempts() -> u32 {
    defaults::GEOCODING_MAX_ATTEMPTS
}
fn default_retry_backoff() -> u64 {
    defaults::GEOCODING_RETRY_BACKOFF_MS
}

impl Default for GeocodingConfig {
    fn default() -> Self {
        Self {
            geocoder_url: default_geocoder_url(),
            timezone_url: default_timezone_url(),
            user_agent: default_user_agent(),
            language: default_language(),
            timeout_secs: default_geocoding_timeout(),
            max_attempts: default_max_attempts(),
            retry_backoff_ms: default_retry_backoff(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MailConfig {
    /// Transactional mail relay endpoint
    #[serde(default = "default_relay_url")]
    pub relay_url: String,

    /// Relay API key. Empty disables delivery.
    #[serde(default)]
    pub api_key: String,

    #[serde(default = "default_sender_email")]
    pub sender_email: String,

    #[serde(default = "default_sender_name")]
    pub sender_name: String,

    #[serde(default = "default_mail_timeout")]
    pub timeout_secs: u64,
}

fn default_relay_url() -> String {
    "https://api.brevo.com/v3/smtp/email".to_string()
}
fn default_sender_email() -> String {
    "profil@example.org".to_string()
}
fn default_sender_name() -> String {
    "Cosmo Profile".to_string()
}
fn default_mail_timeout() -> u64 {
    defaults::MAIL_TIMEOUT_SECS
}

impl Default for MailConfig {
    fn default() -> Self {
        Self {
            relay_url: default_relay_url(),
            api_key: String::new(),
            sender_email: default_sender_email(),
            sender_name: default_sender_name(),
            timeout_secs: default_mail_timeout(),
        }
    }
}

impl MailConfig {
    pub fn is_enabled(&self) -> bool {
        !self.api_key.trim().is_empty()
    }
}

// ============================================================================
// Pricing / Sign Check
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PricingConfig {
    #[serde(default = "default_price_normal")]
    pub normal: f64,
    #[serde(default = "default_price_pro")]
    pub pro: f64,
}

fn default_price_normal() -> f64 {
    defaults::PRICE_NORMAL
}
fn default_price_pro() -> f64 {
    defaults::PRICE_PRO
}

impl Default for PricingConfig {
    fn default() -> Self {
        Self {
            normal: default_price_normal(),
            pro: default_price_pro(),
        }
    }
}

impl PricingConfig {
    pub fn price_for(&self, tier: ProductTier) -> f64 {
        match tier {
            ProductTier::Normal => self.normal,
            ProductTier::Pro => self.pro,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SignCheckConfig {
    #[serde(default = "default_check_lat")]
    pub latitude: f64,
    #[serde(default = "default_check_lon")]
    pub longitude: f64,
    #[serde(default = "default_check_tz")]
    pub timezone: String,
    /// HH:MM
    #[serde(default = "default_check_time")]
    pub time: String,
}

fn default_check_lat() -> f64 {
    defaults::SIGN_CHECK_LATITUDE
}
fn default_check_lon() -> f64 {
    defaults::SIGN_CHECK_LONGITUDE
}
fn default_check_tz() -> String {
    defaults::SIGN_CHECK_TIMEZONE.to_string()
}
fn default_check_time() -> String {
    defaults::SIGN_CHECK_TIME.to_string()
}

impl Default for SignCheckConfig {
    fn default() -> Self {
        Self {
            latitude: default_check_lat(),
            longitude: default_check_lon(),
            timezone: default_check_tz(),
            time: default_check_time(),
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
