//! Core data types for the derived-telemetry engine
//!
//! This module contains the value objects passed between components:
//!
//! - [`Values`] - Typed sample values (float, integer, boolean, string, quaternion)
//! - [`SampleStream`] - Times, values, bad flags and unit for one channel
//! - [`UnitSystem`] / [`UnitSpec`] - Unit systems and per-handler unit declarations
//! - [`StatInterval`] - Roll-up interval selector for statistics queries
//! - [`ComputedResult`] - What the dispatcher hands back to callers
//!
//! # Invariants
//!
//! A [`SampleStream`] always has `times`, `values` and `bads` of equal
//! length; the constructor rejects anything else. Streams are never mutated
//! in place once returned: filtering, selection and concatenation all build a
//! new instance.

use crate::error::{Result, TlmError};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::str::FromStr;

// ==================== Values ====================

/// Typed per-sample values of a stream
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "lowercase")]
pub enum Values {
    /// Double-precision numeric samples
    Float(Vec<f64>),
    /// Integer samples (raw counts, enumerations)
    Int(Vec<i64>),
    /// Boolean samples
    Bool(Vec<bool>),
    /// Fixed-width string samples (state codes such as `NPNT`)
    Str(Vec<String>),
    /// Attitude quaternions `[q1, q2, q3, q4]` with q4 the scalar part
    Quat(Vec<[f64; 4]>),
}

impl Values {
    /// Number of samples
    pub fn len(&self) -> usize {
        match self {
            Values::Float(v) => v.len(),
            Values::Int(v) => v.len(),
            Values::Bool(v) => v.len(),
            Values::Str(v) => v.len(),
            Values::Quat(v) => v.len(),
        }
    }

    /// Returns true if there are no samples
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Short name of the value kind, for messages
    pub fn kind(&self) -> &'static str {
        match self {
            Values::Float(_) => "float",
            Values::Int(_) => "int",
            Values::Bool(_) => "bool",
            Values::Str(_) => "str",
            Values::Quat(_) => "quat",
        }
    }

    /// Empty values of the same kind
    pub fn empty_like(&self) -> Values {
        match self {
            Values::Float(_) => Values::Float(Vec::new()),
            Values::Int(_) => Values::Int(Vec::new()),
            Values::Bool(_) => Values::Bool(Vec::new()),
            Values::Str(_) => Values::Str(Vec::new()),
            Values::Quat(_) => Values::Quat(Vec::new()),
        }
    }

    /// Returns true for kinds that support weighted statistics
    pub fn is_numeric(&self) -> bool {
        matches!(self, Values::Float(_) | Values::Int(_) | Values::Bool(_))
    }

    /// Numeric sample `i` as f64 (booleans map to 0.0 / 1.0)
    pub fn get_f64(&self, i: usize) -> Option<f64> {
        match self {
            Values::Float(v) => v.get(i).copied(),
            Values::Int(v) => v.get(i).map(|&x| x as f64),
            Values::Bool(v) => v.get(i).map(|&x| if x { 1.0 } else { 0.0 }),
            Values::Str(_) | Values::Quat(_) => None,
        }
    }

    /// All samples as f64, for numeric kinds only
    pub fn to_f64(&self) -> Result<Vec<f64>> {
        match self {
            Values::Float(v) => Ok(v.clone()),
            Values::Int(v) => Ok(v.iter().map(|&x| x as f64).collect()),
            Values::Bool(v) => Ok(v.iter().map(|&x| if x { 1.0 } else { 0.0 }).collect()),
            other => Err(TlmError::UnsupportedValues(format!(
                "expected numeric values, found {}",
                other.kind()
            ))),
        }
    }

    /// Borrow float samples without copying
    pub fn as_f64_slice(&self) -> Option<&[f64]> {
        match self {
            Values::Float(v) => Some(v),
            _ => None,
        }
    }

    /// New values made of the samples at `indices` (in the given order)
    pub fn select(&self, indices: &[usize]) -> Values {
        match self {
            Values::Float(v) => Values::Float(indices.iter().map(|&i| v[i]).collect()),
            Values::Int(v) => Values::Int(indices.iter().map(|&i| v[i]).collect()),
            Values::Bool(v) => Values::Bool(indices.iter().map(|&i| v[i]).collect()),
            Values::Str(v) => Values::Str(indices.iter().map(|&i| v[i].clone()).collect()),
            Values::Quat(v) => Values::Quat(indices.iter().map(|&i| v[i]).collect()),
        }
    }

    /// Copy of the contiguous range `start..end`
    pub fn slice(&self, start: usize, end: usize) -> Values {
        match self {
            Values::Float(v) => Values::Float(v[start..end].to_vec()),
            Values::Int(v) => Values::Int(v[start..end].to_vec()),
            Values::Bool(v) => Values::Bool(v[start..end].to_vec()),
            Values::Str(v) => Values::Str(v[start..end].to_vec()),
            Values::Quat(v) => Values::Quat(v[start..end].to_vec()),
        }
    }

    /// Append samples of the same kind
    pub fn extend(&mut self, other: &Values) -> Result<()> {
        match (self, other) {
            (Values::Float(a), Values::Float(b)) => a.extend_from_slice(b),
            (Values::Int(a), Values::Int(b)) => a.extend_from_slice(b),
            (Values::Bool(a), Values::Bool(b)) => a.extend_from_slice(b),
            (Values::Str(a), Values::Str(b)) => a.extend_from_slice(b),
            (Values::Quat(a), Values::Quat(b)) => a.extend_from_slice(b),
            (a, b) => {
                return Err(TlmError::UnsupportedValues(format!(
                    "cannot concatenate {} with {}",
                    a.kind(),
                    b.kind()
                )))
            }
        }
        Ok(())
    }
}

// ==================== Sample Stream ====================

/// Time-ordered samples of one channel with validity flags
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SampleStream {
    /// Channel name (lower case)
    pub msid: String,
    /// Sample times in CXC seconds, non-decreasing
    pub times: Vec<f64>,
    /// Sample values
    pub values: Values,
    /// Per-sample bad flags (true = invalid)
    pub bads: Vec<bool>,
    /// Unit label, `None` for dimensionless or state values
    #[serde(default)]
    pub unit: Option<String>,
}

impl SampleStream {
    /// Create a stream, checking that all parallel arrays share a length
    pub fn new(
        msid: impl Into<String>,
        times: Vec<f64>,
        values: Values,
        bads: Vec<bool>,
        unit: Option<String>,
    ) -> Result<Self> {
        let msid = msid.into();
        if times.len() != values.len() || times.len() != bads.len() {
            return Err(TlmError::LengthMismatch(format!(
                "{}: times={} values={} bads={}",
                msid,
                times.len(),
                values.len(),
                bads.len()
            )));
        }
        Ok(Self {
            msid,
            times,
            values,
            bads,
            unit,
        })
    }

    /// Create a float stream with all samples good
    pub fn from_f64(
        msid: impl Into<String>,
        times: Vec<f64>,
        values: Vec<f64>,
        unit: Option<&str>,
    ) -> Result<Self> {
        let bads = vec![false; times.len()];
        Self::new(
            msid,
            times,
            Values::Float(values),
            bads,
            unit.map(str::to_string),
        )
    }

    /// Empty stream of the given kind
    pub fn empty(msid: impl Into<String>, values: Values, unit: Option<String>) -> Self {
        Self {
            msid: msid.into(),
            times: Vec::new(),
            values: values.empty_like(),
            bads: Vec::new(),
            unit,
        }
    }

    /// Number of samples
    pub fn len(&self) -> usize {
        self.times.len()
    }

    /// Returns true if the stream has no samples
    pub fn is_empty(&self) -> bool {
        self.times.is_empty()
    }

    /// Time span `(first, last)` of the stream
    pub fn time_range(&self) -> Option<(f64, f64)> {
        match (self.times.first(), self.times.last()) {
            (Some(&a), Some(&b)) => Some((a, b)),
            _ => None,
        }
    }

    /// Number of samples flagged bad
    pub fn n_bad(&self) -> usize {
        self.bads.iter().filter(|&&b| b).count()
    }

    /// New stream holding the samples at `indices`
    pub fn select(&self, indices: &[usize]) -> Self {
        Self {
            msid: self.msid.clone(),
            times: indices.iter().map(|&i| self.times[i]).collect(),
            values: self.values.select(indices),
            bads: indices.iter().map(|&i| self.bads[i]).collect(),
            unit: self.unit.clone(),
        }
    }

    /// New stream with bad samples removed
    pub fn filter_bad(&self) -> Self {
        let good: Vec<usize> = (0..self.len()).filter(|&i| !self.bads[i]).collect();
        self.select(&good)
    }

    /// New stream restricted to the half-open interval `[tstart, tstop)`
    pub fn time_slice(&self, tstart: f64, tstop: f64) -> Self {
        let i0 = self.times.partition_point(|&t| t < tstart);
        let i1 = self.times.partition_point(|&t| t < tstop).max(i0);
        Self {
            msid: self.msid.clone(),
            times: self.times[i0..i1].to_vec(),
            values: self.values.slice(i0, i1),
            bads: self.bads[i0..i1].to_vec(),
            unit: self.unit.clone(),
        }
    }

    /// Same times and bads with new values
    pub fn with_values(&self, values: Values) -> Result<Self> {
        Self::new(
            self.msid.clone(),
            self.times.clone(),
            values,
            self.bads.clone(),
            self.unit.clone(),
        )
    }

    /// Numeric values as f64
    pub fn f64_values(&self) -> Result<Vec<f64>> {
        self.values
            .to_f64()
            .map_err(|e| e.with_context(format!("channel {}", self.msid)))
    }

    /// Concatenate time-ordered pieces of one channel into a single stream
    pub fn concat(msid: impl Into<String>, parts: Vec<SampleStream>) -> Result<Self> {
        let msid = msid.into();
        let mut iter = parts.into_iter();
        let Some(mut out) = iter.next() else {
            return Ok(Self::empty(msid, Values::Float(Vec::new()), None));
        };
        out.msid = msid;
        for part in iter {
            out.times.extend_from_slice(&part.times);
            out.values.extend(&part.values)?;
            out.bads.extend_from_slice(&part.bads);
        }
        Ok(out)
    }
}

// ==================== Units ====================

/// Unit systems a caller may request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum UnitSystem {
    /// Archive native units (SI-ish, Kelvin)
    #[default]
    Cxc,
    /// Science units (Celsius)
    Sci,
    /// Engineering units (Fahrenheit, PSIA)
    Eng,
}

impl UnitSystem {
    /// All unit systems
    pub fn all() -> &'static [UnitSystem] {
        &[UnitSystem::Cxc, UnitSystem::Sci, UnitSystem::Eng]
    }
}

impl std::fmt::Display for UnitSystem {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            UnitSystem::Cxc => write!(f, "cxc"),
            UnitSystem::Sci => write!(f, "sci"),
            UnitSystem::Eng => write!(f, "eng"),
        }
    }
}

impl FromStr for UnitSystem {
    type Err = TlmError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "cxc" => Ok(UnitSystem::Cxc),
            "sci" => Ok(UnitSystem::Sci),
            "eng" => Ok(UnitSystem::Eng),
            other => Err(TlmError::Config(format!("Unknown unit system '{}'", other))),
        }
    }
}

/// Unit declaration attached to a handler
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UnitSpec {
    /// System the handler computes in
    pub internal_system: UnitSystem,
    /// Unit label in the CXC system
    pub cxc: String,
    /// Unit label in the science system
    pub sci: String,
    /// Unit label in the engineering system
    pub eng: String,
    /// Output fields that carry converted quantities
    pub convert_attrs: Vec<String>,
}

impl UnitSpec {
    /// Temperature declaration computed in Fahrenheit
    pub fn temperature_eng() -> Self {
        Self {
            internal_system: UnitSystem::Eng,
            cxc: "K".to_string(),
            sci: "DEGC".to_string(),
            eng: "DEGF".to_string(),
            convert_attrs: vec!["vals".to_string()],
        }
    }

    /// Unit label for a system
    pub fn label(&self, system: UnitSystem) -> &str {
        match system {
            UnitSystem::Cxc => &self.cxc,
            UnitSystem::Sci => &self.sci,
            UnitSystem::Eng => &self.eng,
        }
    }

    /// Label in the internal system
    pub fn internal_label(&self) -> &str {
        self.label(self.internal_system)
    }
}

// ==================== Statistics Interval ====================

/// Roll-up interval for statistics queries
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StatInterval {
    /// Short interval (328 s by default)
    #[serde(alias = "5min")]
    Short,
    /// Daily interval (86400 s)
    Daily,
}

impl StatInterval {
    /// Whether the interval carries spread statistics (std, percentiles)
    pub fn has_spread(&self) -> bool {
        matches!(self, StatInterval::Daily)
    }
}

impl std::fmt::Display for StatInterval {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StatInterval::Short => write!(f, "5min"),
            StatInterval::Daily => write!(f, "daily"),
        }
    }
}

impl FromStr for StatInterval {
    type Err = TlmError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "5min" | "short" => Ok(StatInterval::Short),
            "daily" | "long" => Ok(StatInterval::Daily),
            other => Err(TlmError::Config(format!("Unknown stat interval '{}'", other))),
        }
    }
}

// ==================== Computed Result ====================

/// Output of a dispatch: a complete sample stream plus named extra fields
///
/// For full-resolution queries `extra` holds handler-specific arrays (for
/// example the reconciliation `source` labels). For statistics queries it
/// holds `indexes`, `samples`, `midvals`, `mins`, `maxes`, `means` and, for
/// the daily interval, `stds` and the percentile fields.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComputedResult {
    /// Requested channel name (lower case)
    pub name: String,
    /// Sample or bin-center times
    pub times: Vec<f64>,
    /// Values (bin means for statistics queries)
    pub vals: Values,
    /// Bad flags
    pub bads: Vec<bool>,
    /// Unit of `vals`
    pub unit: Option<String>,
    /// Statistics interval, if this is a roll-up result
    pub interval: Option<StatInterval>,
    /// Additional named arrays
    pub extra: BTreeMap<String, Values>,
}

impl ComputedResult {
    /// Number of samples (or bins)
    pub fn len(&self) -> usize {
        self.times.len()
    }

    /// Returns true if the result is empty
    pub fn is_empty(&self) -> bool {
        self.times.is_empty()
    }

    /// Look up a field by output name (`vals` or any extra field)
    pub fn field(&self, name: &str) -> Option<&Values> {
        if name == "vals" {
            Some(&self.vals)
        } else {
            self.extra.get(name)
        }
    }
}
