//! Numeric core of the derived-telemetry engine
//!
//! This module provides the reusable algorithms handlers are built on:
//! - Time-series alignment (nearest-neighbour with bad union, linear)
//! - Fixed-interval statistics roll-up
//! - Model-guided signal reconciliation
//! - Interpolation and median-filter helpers

pub mod align;
pub mod filter;
pub mod reconcile;
pub mod stats;

pub use align::{linear, nearest_union, AlignTimes, MIN_PAD_EPHEMERIS, MIN_PAD_HIGH_RATE};
pub use reconcile::{reconcile, ReconciledSeries, MODEL_SOURCE};
pub use stats::{aggregate, StatSummary, WeightClamp, QUANTILES};
