//! Statistics aggregator
//!
//! Compresses an irregularly sampled stream into fixed-width interval
//! summaries. Bin `k` covers `[k * dt, (k + 1) * dt)`; empty bins are
//! omitted and the remaining bins are produced in increasing index order.
//!
//! Per bin:
//!
//! - `val` is the sample at array position `n / 2`.
//! - For numeric data each sample gets a time weight: the mean of its two
//!   neighbouring gaps (one-sided at the bin edges), or 1.0 everywhere when
//!   the bin holds two samples or fewer. Weights are clamped to
//!   [`WeightClamp`] so duplicate timestamps and telemetry gaps cannot
//!   dominate.
//! - `mean` is the weighted mean; `min` and `max` are plain extrema.
//! - With spread enabled (the daily interval) the weighted standard
//!   deviation and the [`QUANTILES`] percentiles are added.
//!
//! A negative time delta means the archive is corrupt and aborts the
//! aggregation with [`TlmError::NegativeTimeDelta`].
//!
//! All accumulation is done in f64 regardless of the input kind.

use crate::error::{Result, TlmError};
use crate::time::cxc_to_date;
use crate::types::{ComputedResult, SampleStream, StatInterval, Values};
use std::collections::BTreeMap;

/// Percentile levels reported for the daily interval
pub const QUANTILES: [u8; 7] = [1, 5, 16, 50, 84, 95, 99];

/// Bounds applied to per-sample time weights (seconds)
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WeightClamp {
    pub min: f64,
    pub max: f64,
}

impl Default for WeightClamp {
    fn default() -> Self {
        Self {
            min: 0.001,
            max: 300.0,
        }
    }
}

/// Column-oriented roll-up: one row per non-empty bin
#[derive(Debug, Clone, PartialEq)]
pub struct StatSummary {
    /// Bin width in seconds
    pub dt: f64,
    /// Bin numbers (`floor(t / dt)`)
    pub index: Vec<i64>,
    /// Sample count per bin
    pub n: Vec<i64>,
    /// Representative (middle) sample per bin
    pub val: Values,
    /// Unweighted minimum (numeric data only)
    pub min: Option<Vec<f64>>,
    /// Unweighted maximum (numeric data only)
    pub max: Option<Vec<f64>>,
    /// Time-weighted mean (numeric data only)
    pub mean: Option<Vec<f64>>,
    /// Time-weighted standard deviation (numeric data with spread only)
    pub std: Option<Vec<f64>>,
    /// Percentiles keyed by level (numeric data with spread only)
    pub percentiles: Vec<(u8, Vec<f64>)>,
}

impl StatSummary {
    fn new(dt: f64, values: &Values, numeric: bool, spread: bool) -> Self {
        let col = |on: bool| if on { Some(Vec::new()) } else { None };
        Self {
            dt,
            index: Vec::new(),
            n: Vec::new(),
            val: values.empty_like(),
            min: col(numeric),
            max: col(numeric),
            mean: col(numeric),
            std: col(numeric && spread),
            percentiles: if numeric && spread {
                QUANTILES.iter().map(|&q| (q, Vec::new())).collect()
            } else {
                Vec::new()
            },
        }
    }

    /// Number of bins
    pub fn len(&self) -> usize {
        self.index.len()
    }

    /// Returns true if no bin had samples
    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    /// Bin center times
    pub fn times(&self) -> Vec<f64> {
        self.index
            .iter()
            .map(|&i| (i as f64 + 0.5) * self.dt)
            .collect()
    }

    /// Expose the summary with the statistics query field names.
    ///
    /// Record fields are pluralized (`index` → `indexes`, `min` → `mins`,
    /// `max` → `maxes`, `mean` → `means`, `std` → `stds`, `p16` → `p16s`),
    /// the count becomes `samples`, the middle sample becomes `midvals` and
    /// `vals` carries the bin means (the middle samples for non-numeric data).
    pub fn into_result(
        self,
        name: &str,
        unit: Option<String>,
        interval: StatInterval,
    ) -> ComputedResult {
        let times = self.times();
        let mut extra = BTreeMap::new();
        extra.insert("indexes".to_string(), Values::Int(self.index));
        extra.insert("samples".to_string(), Values::Int(self.n));
        extra.insert("midvals".to_string(), self.val.clone());
        if let Some(v) = self.min {
            extra.insert("mins".to_string(), Values::Float(v));
        }
        if let Some(v) = self.max {
            extra.insert("maxes".to_string(), Values::Float(v));
        }
        if let Some(v) = self.std {
            extra.insert("stds".to_string(), Values::Float(v));
        }
        for (q, v) in self.percentiles {
            extra.insert(format!("p{:02}s", q), Values::Float(v));
        }
        let vals = match self.mean {
            Some(v) => {
                extra.insert("means".to_string(), Values::Float(v.clone()));
                Values::Float(v)
            }
            None => self.val,
        };

        ComputedResult {
            name: name.to_string(),
            bads: vec![false; times.len()],
            times,
            vals,
            unit,
            interval: Some(interval),
            extra,
        }
    }
}

/// Time weights for one bin, before clamping
fn bin_weights(times: &[f64]) -> Vec<f64> {
    let n = times.len();
    if n <= 2 {
        return vec![1.0; n];
    }
    let mut dts = Vec::with_capacity(n);
    dts.push(times[1] - times[0]);
    for i in 1..n - 1 {
        dts.push(((times[i] - times[i - 1]) + (times[i + 1] - times[i])) / 2.0);
    }
    dts.push(times[n - 1] - times[n - 2]);
    dts
}

/// Percentile at level `p` (0-1) of sorted data.
///
/// Uses plotting positions `alphap = betap = 0.4` (Hyndman & Fan), matching
/// the historical archive statistics.
pub fn quantile_sorted(sorted: &[f64], p: f64) -> f64 {
    const ALPHAP: f64 = 0.4;
    const BETAP: f64 = 0.4;
    let n = sorted.len();
    match n {
        0 => f64::NAN,
        1 => sorted[0],
        _ => {
            let m = ALPHAP + p * (1.0 - ALPHAP - BETAP);
            let aleph = n as f64 * p + m;
            let k = aleph.clamp(1.0, (n - 1) as f64).floor();
            let gamma = (aleph - k).clamp(0.0, 1.0);
            let k = k as usize;
            (1.0 - gamma) * sorted[k - 1] + gamma * sorted[k]
        }
    }
}

/// Bin `k` with `k * dt <= t < (k + 1) * dt`
fn bin_index(t: f64, dt: f64) -> i64 {
    let k = (t / dt).floor() as i64;
    if k as f64 * dt > t {
        k.saturating_sub(1)
    } else if (k as f64 + 1.0) * dt <= t {
        k.saturating_add(1)
    } else {
        k
    }
}

/// Reject streams whose timestamps go backwards
fn check_monotonic(stream: &SampleStream) -> Result<()> {
    if let Some(i) = stream.times.windows(2).position(|w| w[1] < w[0]) {
        let dt = stream.times[i + 1] - stream.times[i];
        return Err(TlmError::NegativeTimeDelta {
            msid: stream.msid.clone(),
            date: cxc_to_date(stream.times[i + 1]),
            dt,
        });
    }
    Ok(())
}

/// Roll up `stream` into bins of width `dt`.
///
/// The stream must already have its bad samples removed; bad flags are not
/// consulted here.
pub fn aggregate(
    stream: &SampleStream,
    dt: f64,
    spread: bool,
    clamp: WeightClamp,
) -> Result<StatSummary> {
    if !(dt > 0.0) {
        return Err(TlmError::Config(format!("invalid stat interval {}", dt)));
    }
    let numeric = stream.values.is_numeric();
    let mut out = StatSummary::new(dt, &stream.values, numeric, spread);
    if stream.is_empty() {
        return Ok(out);
    }
    check_monotonic(stream)?;

    let all_vals = if numeric {
        stream.values.to_f64()?
    } else {
        Vec::new()
    };
    let times = &stream.times;
    let mut mid_rows = Vec::new();

    // Only occupied bins are visited; each step jumps to the bin of the
    // next unconsumed sample
    let mut row0 = 0;
    while row0 < times.len() {
        let index = bin_index(times[row0], dt);
        let hi = (index as f64 + 1.0) * dt;
        let row1 = (row0 + times[row0..].partition_point(|&t| t < hi)).max(row0 + 1);
        let n = row1 - row0;
        let start = row0;
        row0 = row1;

        out.index.push(index);
        out.n.push(n as i64);
        mid_rows.push(start + n / 2);

        if !numeric {
            continue;
        }

        let bin_times = &times[start..row1];
        let vals = &all_vals[start..row1];
        let mut dts = bin_weights(bin_times);
        if let Some(k) = dts.iter().position(|&w| w < 0.0) {
            return Err(TlmError::NegativeTimeDelta {
                msid: stream.msid.clone(),
                date: cxc_to_date(bin_times[k]),
                dt: dts[k],
            });
        }
        if n > 2 {
            for w in dts.iter_mut() {
                *w = w.clamp(clamp.min, clamp.max);
            }
        }

        let sum_dts: f64 = dts.iter().sum();
        let mean = dts.iter().zip(vals).map(|(w, v)| w * v).sum::<f64>() / sum_dts;
        let min = vals.iter().copied().fold(f64::INFINITY, f64::min);
        let max = vals.iter().copied().fold(f64::NEG_INFINITY, f64::max);

        if let (Some(mins), Some(maxes), Some(means)) =
            (out.min.as_mut(), out.max.as_mut(), out.mean.as_mut())
        {
            mins.push(min);
            maxes.push(max);
            means.push(mean);
        }

        if spread {
            let var = dts
                .iter()
                .zip(vals)
                .map(|(w, v)| w * (v - mean).powi(2))
                .sum::<f64>()
                / sum_dts;
            if let Some(stds) = out.std.as_mut() {
                stds.push(var.sqrt());
            }

            let mut sorted = vals.to_vec();
            sorted.sort_by(|a, b| a.total_cmp(b));
            for (q, col) in out.percentiles.iter_mut() {
                col.push(quantile_sorted(&sorted, f64::from(*q) / 100.0));
            }
        }
    }

    out.val = stream.values.select(&mid_rows);
    tracing::trace!(
        "Aggregated {} samples of {} into {} bins of {}s",
        stream.len(),
        stream.msid,
        out.len(),
        dt
    );
    Ok(out)
}
