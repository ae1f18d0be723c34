//! Tunable engine settings
//!
//! Each section of the configuration file maps to one struct here. Every
//! struct implements [`Default`] with the values used in operations, so an
//! empty configuration file is a valid configuration.
//!
//! # Main Types
//!
//! - [`StatsSettings`] - Roll-up interval widths and time-weight bounds
//! - [`CleanSettings`] - Reconciliation tolerance, median window, model spec
//! - [`PaddingSettings`] - Fetch padding around requested windows
//! - [`ModeSettings`] - Operational-mode segmentation policy
//! - [`CacheSettings`] - Single-entry memoizing caches
//! - [`ServiceSettings`] - Query worker pool
//! - [`LoggingSettings`] - Log filter and optional log directory
//! - [`ScriptChannel`] - Expression-defined derived channels

use crate::analysis::stats::WeightClamp;
use crate::types::{StatInterval, UnitSystem};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Statistics aggregation settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StatsSettings {
    /// Short interval bin width in seconds
    pub short_dt: f64,
    /// Daily interval bin width in seconds
    pub daily_dt: f64,
    /// Lower bound on per-sample time weights (seconds)
    pub min_weight: f64,
    /// Upper bound on per-sample time weights (seconds)
    pub max_weight: f64,
}

impl Default for StatsSettings {
    fn default() -> Self {
        Self {
            short_dt: 328.0,
            daily_dt: 86_400.0,
            min_weight: 0.001,
            max_weight: 300.0,
        }
    }
}

impl StatsSettings {
    /// Bin width for an interval
    pub fn dt(&self, interval: StatInterval) -> f64 {
        match interval {
            StatInterval::Short => self.short_dt,
            StatInterval::Daily => self.daily_dt,
        }
    }

    /// Time-weight bounds
    pub fn weight_clamp(&self) -> WeightClamp {
        WeightClamp {
            min: self.min_weight,
            max: self.max_weight,
        }
    }
}

/// Valve-temperature cleaning settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CleanSettings {
    /// Maximum deviation (DEGF) for a candidate to be trusted
    pub tolerance: f64,
    /// Median filter width applied to raw telemetry (odd, 0 or 1 disables)
    pub median_window: usize,
    /// Thermal model name
    pub model_name: String,
    /// Default model revision when the channel name does not give one
    pub model_version: Option<String>,
}

impl Default for CleanSettings {
    fn default() -> Self {
        Self {
            tolerance: 5.0,
            median_window: 7,
            model_name: "mups_valve".to_string(),
            model_version: None,
        }
    }
}

/// Window padding used by handlers before interpolation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PaddingSettings {
    /// Padding for high-rate telemetry (seconds)
    pub high_rate: f64,
    /// Padding for ephemeris-class data (seconds)
    pub ephemeris: f64,
}

impl Default for PaddingSettings {
    fn default() -> Self {
        Self {
            high_rate: 60.0,
            ephemeris: 3600.0,
        }
    }
}

/// How transitional (unclassified) mode values are handled
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum TransitionPolicy {
    /// Produce no output for transitional spans
    #[default]
    Drop,
    /// Attach transitional spans to the preceding classified segment
    HoldPrevious,
}

/// Operational-mode segmentation settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModeSettings {
    /// Mode channel used by mode-aware handlers
    pub mode_msid: String,
    /// Mode values routed to the normal-control path
    pub normal_modes: Vec<String>,
    /// Mode values routed to the safe-mode path
    pub safe_modes: Vec<String>,
    /// Policy for values in neither list
    pub transition_policy: TransitionPolicy,
}

impl Default for ModeSettings {
    fn default() -> Self {
        Self {
            mode_msid: "aopcadmd".to_string(),
            normal_modes: vec!["NPNT".to_string(), "NMAN".to_string()],
            safe_modes: vec!["NSUN".to_string()],
            transition_policy: TransitionPolicy::Drop,
        }
    }
}

/// Memoizing cache switches
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheSettings {
    /// Cache the most recent ephemeris fetch
    pub ephemeris: bool,
    /// Cache the most recent mode segmentation
    pub modes: bool,
    /// Cache the most recent safe-mode sensor table
    pub safe_sensor: bool,
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            ephemeris: true,
            modes: true,
            safe_sensor: true,
        }
    }
}

/// Default output units
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct UnitSettings {
    /// Unit system applied when a query does not name one
    pub default_system: Option<UnitSystem>,
}

/// Query worker pool settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceSettings {
    /// Number of worker threads
    pub workers: usize,
    /// Bound on queued queries
    pub queue_depth: usize,
}

impl Default for ServiceSettings {
    fn default() -> Self {
        Self {
            workers: 4,
            queue_depth: 64,
        }
    }
}

/// Logging settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingSettings {
    /// `EnvFilter` directive used when `RUST_LOG` is unset
    pub filter: String,
    /// Directory for daily-rolled log files (stderr only when unset)
    pub directory: Option<PathBuf>,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            filter: "info,derived_tlm=debug".to_string(),
            directory: None,
        }
    }
}

/// Derived channel defined by a Rhai expression over raw channels
///
/// Inputs are aligned on the first input's times (nearest neighbour, bad
/// union) and bound in the script by their lower-case names.
///
/// ```toml
/// [[script_channels]]
/// name = "dp_tank_delta"
/// inputs = ["pmtank1t", "pmtank2t"]
/// expression = "pmtank1t - pmtank2t"
/// unit = "DEGF"
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScriptChannel {
    /// Channel name (matched case-insensitively, exactly)
    pub name: String,
    /// Raw input channels
    pub inputs: Vec<String>,
    /// Rhai expression
    pub expression: String,
    /// Output unit label
    #[serde(default)]
    pub unit: Option<String>,
}
