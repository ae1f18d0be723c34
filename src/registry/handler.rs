//! Handler contract for virtual channels

use crate::backend::{CommandStates, RawFetch, ThermalModel};
use crate::config::EngineConfig;
use crate::error::{Result, TlmError};
use crate::types::{ComputedResult, SampleStream, UnitSpec, Values};
use crate::units::UnitConverter;
use std::collections::BTreeMap;

/// Collaborators and settings available to a handler during one dispatch
#[derive(Clone, Copy)]
pub struct HandlerContext<'a> {
    /// Raw telemetry source
    pub fetch: &'a dyn RawFetch,
    /// Thermal model evaluator
    pub model: &'a dyn ThermalModel,
    /// Commanded-state source
    pub states: &'a dyn CommandStates,
    /// Unit conversion functions
    pub units: &'a dyn UnitConverter,
    /// Engine configuration
    pub config: &'a EngineConfig,
    /// Identity of the dispatcher that owns these collaborators. Handler
    /// caches include it in their keys.
    pub source: u64,
}

/// What a handler hands back before validation.
///
/// `values`, `times`, `bads` and `unit` are mandatory; the dispatcher raises
/// [`TlmError::IncompleteResult`] for any left as `None`. `unit:
/// Some(None)` declares a dimensionless result.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PartialResult {
    pub values: Option<Values>,
    pub times: Option<Vec<f64>>,
    pub bads: Option<Vec<bool>>,
    pub unit: Option<Option<String>>,
    /// Handler-specific additional arrays, same length as `times`
    pub extra: BTreeMap<String, Values>,
}

impl PartialResult {
    /// Result with every mandatory field taken from a stream
    pub fn from_stream(stream: SampleStream) -> Self {
        Self {
            values: Some(stream.values),
            times: Some(stream.times),
            bads: Some(stream.bads),
            unit: Some(stream.unit),
            extra: BTreeMap::new(),
        }
    }

    /// Attach an additional named array
    pub fn with_extra(mut self, name: impl Into<String>, values: Values) -> Self {
        self.extra.insert(name.into(), values);
        self
    }

    /// Names of mandatory fields that are missing
    pub fn missing_fields(&self) -> Vec<&'static str> {
        let mut missing = Vec::new();
        if self.values.is_none() {
            missing.push("values");
        }
        if self.times.is_none() {
            missing.push("times");
        }
        if self.bads.is_none() {
            missing.push("bads");
        }
        if self.unit.is_none() {
            missing.push("unit");
        }
        missing
    }

    /// Validate and convert into a complete stream plus extra fields
    pub fn into_parts(self, name: &str) -> Result<(SampleStream, BTreeMap<String, Values>)> {
        let missing = self.missing_fields();
        let (Some(values), Some(times), Some(bads), Some(unit)) =
            (self.values, self.times, self.bads, self.unit)
        else {
            return Err(TlmError::IncompleteResult {
                name: name.to_string(),
                missing,
            });
        };

        if let Some((field, v)) = self.extra.iter().find(|(_, v)| v.len() != times.len()) {
            return Err(TlmError::LengthMismatch(format!(
                "{}: extra field {} has {} samples, times has {}",
                name,
                field,
                v.len(),
                times.len()
            )));
        }

        let stream = SampleStream::new(name, times, values, bads, unit)?;
        Ok((stream, self.extra))
    }

    /// Validate and convert into a full-resolution result
    pub fn into_result(self, name: &str) -> Result<ComputedResult> {
        let (stream, extra) = self.into_parts(name)?;
        Ok(ComputedResult {
            name: stream.msid,
            times: stream.times,
            vals: stream.values,
            bads: stream.bads,
            unit: stream.unit,
            interval: None,
            extra,
        })
    }
}

/// Computation behind one family of virtual channels
pub trait Handler: Send + Sync {
    /// Short handler name for logs
    fn name(&self) -> &str;

    /// Compute the channel over `[tstart, tstop)`.
    ///
    /// `args` are the pattern's capture groups, lower-cased, with `None` for
    /// optional groups that did not participate in the match.
    fn compute(
        &self,
        ctx: &HandlerContext<'_>,
        tstart: f64,
        tstop: f64,
        args: &[Option<String>],
    ) -> Result<PartialResult>;

    /// Unit declaration, if the result can be converted between systems
    fn unit_spec(&self) -> Option<&UnitSpec> {
        None
    }

    /// Whether statistics queries are supported
    fn is_stats_capable(&self) -> bool {
        true
    }
}

/// Capture group `i`, or a configuration error naming the handler
pub fn required_arg<'a>(handler: &str, args: &'a [Option<String>], i: usize) -> Result<&'a str> {
    args.get(i)
        .and_then(|a| a.as_deref())
        .ok_or_else(|| TlmError::Config(format!("{} expects capture group {}", handler, i + 1)))
}
