//! MUPS valve temperature cleaning
//!
//! The valve thermistors `pm2thv1t` and `pm1thv2t` read through a voltage
//! divider whose series resistor shifts the reported temperature, and the
//! raw signal carries telemetry dropouts. `<msid>_clean[_<version>]`
//! reconciles two candidate signals against the thermal model:
//!
//! 1. the raw telemetry after a running median filter;
//! 2. the same filtered telemetry with the resistor effect removed.
//!
//! Samples where neither candidate follows the model within tolerance are
//! bridged with the model and flagged bad. The per-sample provenance is
//! returned as the `source` field (0 = model, 1 = filtered, 2 = corrected).

use crate::analysis::filter::{interp, interp_many, median_filter};
use crate::analysis::reconcile::reconcile;
use crate::backend::ModelSpec;
use crate::cache::LazyTable;
use crate::error::{Result, ResultExt, Stage, TlmError};
use crate::registry::{required_arg, Handler, HandlerContext, PartialResult};
use crate::types::{SampleStream, UnitSpec, Values};
use std::collections::HashMap;

/// Temperature unit the cleaning runs in
const WORK_UNIT: &str = "DEGF";

/// Model output unit
const MODEL_UNIT: &str = "DEGC";

/// ADC volts per count
const VOLTS_PER_COUNT: f64 = 5.12 / 256.0;

/// Thermistor point pairs: counts (ascending) and DEGF
const PP_COUNTS: [f64; 13] = [
    10.0, 30.0, 50.0, 70.0, 90.0, 110.0, 130.0, 150.0, 170.0, 190.0, 210.0, 230.0, 250.0,
];
const PP_TEMPS: [f64; 13] = [
    300.0, 220.0, 180.0, 155.0, 135.0, 118.0, 103.0, 89.0, 75.0, 60.0, 43.0, 20.0, -20.0,
];

/// Divider output with and without the series resistor (volts)
const VOLTS_WITH: [f64; 11] = [0.0, 0.5, 1.0, 1.5, 2.0, 2.5, 3.0, 3.5, 4.0, 4.5, 5.0];
const VOLTS_WITHOUT: [f64; 11] = [0.0, 0.46, 0.93, 1.41, 1.90, 2.40, 2.91, 3.43, 3.95, 4.48, 5.0];

/// Calibration of one valve thermistor
#[derive(Debug, Clone, PartialEq)]
pub struct Calibration {
    /// Counts, ascending
    counts: Vec<f64>,
    /// DEGF at `counts`
    temps: Vec<f64>,
    volts_with: Vec<f64>,
    volts_without: Vec<f64>,
}

impl Calibration {
    /// Build from point pairs; either order of `counts` is accepted
    pub fn new(counts: &[f64], temps: &[f64], volts_with: &[f64], volts_without: &[f64]) -> Result<Self> {
        if counts.len() != temps.len() || volts_with.len() != volts_without.len() {
            return Err(TlmError::LengthMismatch(
                "calibration point pairs differ in length".to_string(),
            ));
        }
        let mut pairs: Vec<(f64, f64)> = counts.iter().copied().zip(temps.iter().copied()).collect();
        pairs.sort_by(|a, b| a.0.total_cmp(&b.0));
        Ok(Self {
            counts: pairs.iter().map(|p| p.0).collect(),
            temps: pairs.iter().map(|p| p.1).collect(),
            volts_with: volts_with.to_vec(),
            volts_without: volts_without.to_vec(),
        })
    }

    /// Flight thermistor calibration
    pub fn flight() -> Self {
        Self {
            counts: PP_COUNTS.to_vec(),
            temps: PP_TEMPS.to_vec(),
            volts_with: VOLTS_WITH.to_vec(),
            volts_without: VOLTS_WITHOUT.to_vec(),
        }
    }

    fn counts_from_temp(&self, temp: f64) -> f64 {
        // Temperature falls as counts rise; interpolate on the reversed table
        let temps: Vec<f64> = self.temps.iter().rev().copied().collect();
        let counts: Vec<f64> = self.counts.iter().rev().copied().collect();
        interp(temp, &temps, &counts)
    }

    fn temp_from_counts(&self, counts: f64) -> f64 {
        interp(counts, &self.counts, &self.temps)
    }

    /// Reported temperature with the series-resistor effect removed
    pub fn correct(&self, temp: f64) -> f64 {
        let volts = self.counts_from_temp(temp) * VOLTS_PER_COUNT;
        let true_volts = interp(volts, &self.volts_with, &self.volts_without);
        self.temp_from_counts(true_volts / VOLTS_PER_COUNT)
    }
}

/// Handler for `(pm2thv1t|pm1thv2t)_clean(?:_(\w+))?`
pub struct ValveCleanHandler {
    calibrations: LazyTable<String, Calibration>,
    units: UnitSpec,
}

impl ValveCleanHandler {
    pub const PATTERN: &'static str = r"(pm2thv1t|pm1thv2t)_clean(?:_(\w+))?";

    pub fn new() -> Self {
        Self {
            calibrations: LazyTable::new(|| {
                ["pm2thv1t", "pm1thv2t"]
                    .into_iter()
                    .map(|msid| (msid.to_string(), Calibration::flight()))
                    .collect::<HashMap<_, _>>()
            }),
            units: UnitSpec::temperature_eng(),
        }
    }
}

impl Default for ValveCleanHandler {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for ValveCleanHandler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ValveCleanHandler")
            .field("calibrations_loaded", &self.calibrations.is_loaded())
            .finish()
    }
}

impl Handler for ValveCleanHandler {
    fn name(&self) -> &str {
        "valve_clean"
    }

    fn compute(
        &self,
        ctx: &HandlerContext<'_>,
        tstart: f64,
        tstop: f64,
        args: &[Option<String>],
    ) -> Result<PartialResult> {
        let msid = required_arg(self.name(), args, 0)?;
        let version = args
            .get(1)
            .cloned()
            .flatten()
            .or_else(|| ctx.config.clean.model_version.clone());
        let name = match args.get(1).and_then(|a| a.as_deref()) {
            Some(v) => format!("{}_clean_{}", msid, v),
            None => format!("{}_clean", msid),
        };
        let settings = &ctx.config.clean;

        let raw = ctx
            .fetch
            .fetch(msid, tstart, tstop)
            .at_stage(msid, Stage::Fetch)?
            .filter_bad();
        let raw_unit = raw.unit.as_deref().unwrap_or(WORK_UNIT);
        let telemetry = ctx
            .units
            .convert(&raw.f64_values()?, raw_unit, WORK_UNIT)
            .at_stage(msid, Stage::Conversion)?;

        let spec = ModelSpec::new(settings.model_name.as_str()).with_version(version);
        let pad = ctx.config.padding.ephemeris;
        let prediction = ctx
            .model
            .evaluate(&spec, msid, tstart - pad, tstop + pad)
            .at_stage(&name, Stage::Reconciliation)?;
        if prediction.times.is_empty() && !raw.is_empty() {
            return Err(TlmError::Model(format!(
                "{} has no prediction for node {} in range",
                spec, msid
            ))
            .at_stage(&name, Stage::Reconciliation));
        }
        let model_f = ctx
            .units
            .convert(&prediction.values, MODEL_UNIT, WORK_UNIT)
            .at_stage(&name, Stage::Conversion)?;
        let model = interp_many(&raw.times, &prediction.times, &model_f);

        let calibration = self.calibrations.get(&msid.to_string()).ok_or_else(|| {
            TlmError::Config(format!("no thermistor calibration for {}", msid))
        })?;
        let filtered = median_filter(&telemetry, settings.median_window);
        let corrected: Vec<f64> = filtered.iter().map(|&t| calibration.correct(t)).collect();

        let series = reconcile(&[&filtered, &corrected], &model, settings.tolerance)
            .at_stage(&name, Stage::Reconciliation)?;
        tracing::debug!(
            "{}: {} samples, {:.1}% from telemetry",
            name,
            series.out.len(),
            100.0 * series.recovered_fraction()
        );

        let bads = series.bads();
        let source = Values::Int(series.source.iter().map(|&s| i64::from(s)).collect());
        let stream = SampleStream::new(
            name,
            raw.times,
            Values::Float(series.out),
            bads,
            Some(WORK_UNIT.to_string()),
        )?;
        Ok(PartialResult::from_stream(stream).with_extra("source", source))
    }

    fn unit_spec(&self) -> Option<&UnitSpec> {
        Some(&self.units)
    }
}
