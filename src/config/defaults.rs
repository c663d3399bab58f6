//! System-wide default constants.
//!
//! Centralises magic numbers used across the pipeline and fulfillment code.
//! Grouped by subsystem for easy discovery.

// ============================================================================
// Configuration Loading
// ============================================================================

/// Environment variable naming an explicit config file.
pub const CONFIG_ENV_VAR: &str = "COSMO_CONFIG";

/// Config file searched for in the working directory.
pub const DEFAULT_CONFIG_FILE: &str = "cosmo.toml";

// ============================================================================
// Input Validation
// ============================================================================

/// Earliest accepted birth year.
pub const MIN_BIRTH_YEAR: i32 = 1900;

/// Latest accepted birth year.
pub const MAX_BIRTH_YEAR: i32 = 2100;

// ============================================================================
// Numeric Reducer
// ============================================================================

/// Sums that are never reduced further.
pub const MASTER_NUMBERS: [u32; 3] = [11, 22, 33];

// ============================================================================
// Frames
// ============================================================================

/// Start of the 13th-sign zone in sidereal longitude (inclusive).
pub const OPHIUCHUS_START_DEG: f64 = 240.0;

/// End of the 13th-sign zone in sidereal longitude (exclusive).
pub const OPHIUCHUS_END_DEG: f64 = 266.0;

// ============================================================================
// Classifier
// ============================================================================

/// Width of one gate slot on the wheel. 360 / 64.
pub const GATE_SPAN_DEG: f64 = 5.625;

/// Offset between the personality and the design chart.
pub const DESIGN_OFFSET_DAYS: i64 = 88;

// ============================================================================
// Upstream Collaborators
// ============================================================================

/// Bound on a single ephemeris chart request (seconds).
pub const EPHEMERIS_TIMEOUT_SECS: u64 = 20;

/// Bound on a single geocoding or timezone request (seconds).
pub const GEOCODING_TIMEOUT_SECS: u64 = 10;

/// Attempts for transient geocoding / timezone failures, first try included.
pub const GEOCODING_MAX_ATTEMPTS: u32 = 2;

/// Pause between geocoding attempts (milliseconds).
pub const GEOCODING_RETRY_BACKOFF_MS: u64 = 250;

/// Bound on a mail relay request (seconds).
pub const MAIL_TIMEOUT_SECS: u64 = 30;

// ============================================================================
// Pricing
// ============================================================================

pub const PRICE_NORMAL: f64 = 39.0;
pub const PRICE_PRO: f64 = 89.0;

// ============================================================================
// Quick Sign Check
// ============================================================================

/// Reference place for the date-only sign check (Berlin).
pub const SIGN_CHECK_LATITUDE: f64 = 52.52;
pub const SIGN_CHECK_LONGITUDE: f64 = 13.40;
pub const SIGN_CHECK_TIMEZONE: &str = "Europe/Berlin";

/// Reference time of day for the sign check. The Sun sign depends on the
/// date far more than on the hour.
pub const SIGN_CHECK_TIME: &str = "12:00";

// ============================================================================
// Order Queries
// ============================================================================

/// Default page size for order listings.
pub const ORDER_LIST_LIMIT: usize = 100;
