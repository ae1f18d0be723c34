//! Time-series aligner
//!
//! Combines sample streams with different native sample times onto one
//! common time base. Two policies are available:
//!
//! - [`nearest_union`] - nearest-neighbour resampling with bad-flag union,
//!   for simultaneous physical quantities that must share exact alignment
//!   (quaternion or vector components).
//! - [`linear`] - linear interpolation, for continuous quantities sampled at
//!   materially different cadences (position, velocity).
//!
//! # Padding
//!
//! The aligner never widens a window. Callers must fetch padded windows so
//! that output times near the requested edges have samples on both sides:
//! at least [`MIN_PAD_HIGH_RATE`] seconds for high-rate telemetry and
//! [`MIN_PAD_EPHEMERIS`] seconds for ephemeris-class data.

use super::filter::{interp, nearest_index};
use crate::error::{Result, TlmError};
use crate::types::{SampleStream, Values};

/// Minimum safe padding for high-rate telemetry (seconds)
pub const MIN_PAD_HIGH_RATE: f64 = 60.0;

/// Minimum safe padding for ephemeris-class data (seconds)
pub const MIN_PAD_EPHEMERIS: f64 = 3600.0;

/// Output time base for [`nearest_union`]
#[derive(Debug, Clone)]
pub enum AlignTimes<'a> {
    /// Use the times of the stream at this index
    Reference(usize),
    /// Use an explicit time vector
    Explicit(&'a [f64]),
}

/// Resample `streams` onto a common time base by nearest neighbour.
///
/// Output times are the base times restricted to the span covered by every
/// input stream. With `bad_union` set, a sample is bad in every output
/// stream if the nearest sample is bad in any input stream; otherwise each
/// stream keeps its own flags. If any input is empty all outputs are empty.
pub fn nearest_union(
    streams: &[&SampleStream],
    times: AlignTimes<'_>,
    bad_union: bool,
) -> Result<Vec<SampleStream>> {
    if streams.iter().any(|s| s.is_empty()) {
        return Ok(streams
            .iter()
            .map(|s| SampleStream::empty(s.msid.clone(), s.values.empty_like(), s.unit.clone()))
            .collect());
    }

    let base: &[f64] = match times {
        AlignTimes::Reference(i) => {
            &streams
                .get(i)
                .ok_or_else(|| {
                    TlmError::Config(format!(
                        "reference stream {} out of range ({} streams)",
                        i,
                        streams.len()
                    ))
                })?
                .times
        }
        AlignTimes::Explicit(t) => t,
    };

    let lo = streams
        .iter()
        .filter_map(|s| s.times.first().copied())
        .fold(f64::NEG_INFINITY, f64::max);
    let hi = streams
        .iter()
        .filter_map(|s| s.times.last().copied())
        .fold(f64::INFINITY, f64::min);
    let out_times: Vec<f64> = base
        .iter()
        .copied()
        .filter(|&t| t >= lo && t <= hi)
        .collect();

    let indices: Vec<Vec<usize>> = streams
        .iter()
        .map(|s| {
            out_times
                .iter()
                .map(|&t| nearest_index(&s.times, t).unwrap_or(0))
                .collect()
        })
        .collect();

    let union: Vec<bool> = (0..out_times.len())
        .map(|k| {
            streams
                .iter()
                .zip(&indices)
                .any(|(s, idx)| s.bads[idx[k]])
        })
        .collect();

    streams
        .iter()
        .zip(&indices)
        .map(|(s, idx)| {
            let bads = if bad_union {
                union.clone()
            } else {
                idx.iter().map(|&i| s.bads[i]).collect()
            };
            SampleStream::new(
                s.msid.clone(),
                out_times.clone(),
                s.values.select(idx),
                bads,
                s.unit.clone(),
            )
        })
        .collect()
}

/// Linearly interpolate a numeric stream at `times`.
///
/// Outside the stream's span the edge value is held. An output sample is bad
/// if either bracketing input sample is bad. An empty input yields NaN
/// values flagged bad at every requested time.
pub fn linear(stream: &SampleStream, times: &[f64]) -> Result<SampleStream> {
    let fp = stream.f64_values()?;
    let xp = &stream.times;

    if xp.is_empty() {
        return SampleStream::new(
            stream.msid.clone(),
            times.to_vec(),
            Values::Float(vec![f64::NAN; times.len()]),
            vec![true; times.len()],
            stream.unit.clone(),
        );
    }

    let n = xp.len();
    let mut vals = Vec::with_capacity(times.len());
    let mut bads = Vec::with_capacity(times.len());
    for &t in times {
        vals.push(interp(t, xp, &fp));
        let i = xp.partition_point(|&v| v <= t);
        let bad = if i == 0 {
            stream.bads[0]
        } else if i >= n {
            stream.bads[n - 1]
        } else {
            stream.bads[i - 1] || stream.bads[i]
        };
        bads.push(bad);
    }

    SampleStream::new(
        stream.msid.clone(),
        times.to_vec(),
        Values::Float(vals),
        bads,
        stream.unit.clone(),
    )
}
