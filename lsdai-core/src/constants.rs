//! Fixed constants for the LSDAI catalog controller.
//!
//! Unit conversion and storage keys live here so they can only change through
//! a reviewed code change rather than through the JSON assets.

// Size normalization ---------------------------------------------------------
/// Divisor applied to sizes declared in `MB` to express them in gibibytes.
/// Binary approximation; not configurable.
pub const MB_PER_GIB: f64 = 1024.0;
/// Unit label (case-insensitive) that is scaled by [`MB_PER_GIB`].
pub(crate) const MEGABYTE_UNIT: &str = "MB";

// Preference keys ------------------------------------------------------------
pub const FAVORITES_KEY: &str = "favorites";
pub const SETTINGS_KEY: &str = "settings";
pub const DEFAULT_STORAGE_PREFIX: &str = "lsdai.";

// Timing ---------------------------------------------------------------------
/// Quiet period after the last search keystroke before filtering runs.
pub const DEFAULT_QUIET_PERIOD_MS: u64 = 300;
pub const DEFAULT_TICK_MS: u32 = 150;

// Simulated transfer ---------------------------------------------------------
pub const DEFAULT_MIN_STEP: f64 = 4.0;
pub const DEFAULT_MAX_STEP: f64 = 16.0;
pub const PROGRESS_COMPLETE: f64 = 100.0;

/// Version stamped into export documents.
pub const EXPORT_VERSION: u32 = 1;
