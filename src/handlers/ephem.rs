//! Ephemeris stitching
//!
//! `dp_<kind>ephem_<axis>` merges definitive ephemeris (`<kind>ephem1_*`)
//! with predictive ephemeris (`<kind>ephem0_*`): inside the span covered by
//! good definitive samples only definitive data is used, and predictive data
//! fills in before and after it.

use crate::cache::{LastCall, RangeKey};
use crate::error::{Result, ResultExt, Stage};
use crate::registry::{required_arg, Handler, HandlerContext, PartialResult};
use crate::types::{SampleStream, Values};

/// Handler for `dp_(orbit|lunar|solar)ephem_(x|y|z|vx|vy|vz)`
#[derive(Debug)]
pub struct EphemHandler {
    cache: LastCall<RangeKey, SampleStream>,
}

impl EphemHandler {
    pub const PATTERN: &'static str = r"dp_(orbit|lunar|solar)ephem_(x|y|z|vx|vy|vz)";

    pub fn new(cache_enabled: bool) -> Self {
        Self {
            cache: LastCall::new("ephemeris", cache_enabled),
        }
    }

    /// Cache statistics `(hits, misses)`
    pub fn cache_stats(&self) -> (u64, u64) {
        (self.cache.hits(), self.cache.misses())
    }
}

/// Output unit for an axis
pub fn axis_unit(axis: &str) -> &'static str {
    if axis.starts_with('v') {
        "KM/S"
    } else {
        "KM"
    }
}

/// Scale factor from an archive unit label to kilometres
fn km_scale(unit: Option<&str>) -> f64 {
    match unit.map(str::to_ascii_uppercase).as_deref() {
        Some("M") | Some("M/S") => 1.0e-3,
        _ => 1.0,
    }
}

/// Convert one archive stream to kilometres using its own unit label
fn to_km(stream: SampleStream, axis: &str) -> Result<SampleStream> {
    let scale = km_scale(stream.unit.as_deref());
    let km: Vec<f64> = stream.f64_values()?.iter().map(|v| v * scale).collect();
    let mut out = stream.with_values(Values::Float(km))?;
    out.unit = Some(axis_unit(axis).to_string());
    Ok(out)
}

/// Merge definitive samples over predictive ones.
///
/// Bad definitive samples are dropped before the covered span is computed.
pub fn stitch(msid: &str, definitive: &SampleStream, predictive: &SampleStream) -> Result<SampleStream> {
    let definitive = definitive.filter_bad();
    let Some((d0, d1)) = definitive.time_range() else {
        let mut out = predictive.clone();
        out.msid = msid.to_string();
        return Ok(out);
    };

    let before: Vec<usize> = (0..predictive.len())
        .filter(|&i| predictive.times[i] < d0)
        .collect();
    let after: Vec<usize> = (0..predictive.len())
        .filter(|&i| predictive.times[i] > d1)
        .collect();

    SampleStream::concat(
        msid,
        vec![
            predictive.select(&before),
            definitive,
            predictive.select(&after),
        ],
    )
}

/// Fetch and stitch one ephemeris component over `[tstart, tstop)` padded
/// by `padding.ephemeris` on both sides, converted to kilometres.
pub fn fetch_stitched(
    ctx: &HandlerContext<'_>,
    kind: &str,
    axis: &str,
    tstart: f64,
    tstop: f64,
) -> Result<SampleStream> {
    let msid = format!("dp_{}ephem_{}", kind, axis);
    let pad = ctx.config.padding.ephemeris;
    let predictive_msid = format!("{}ephem0_{}", kind, axis);
    let definitive_msid = format!("{}ephem1_{}", kind, axis);
    let predictive = ctx
        .fetch
        .fetch(&predictive_msid, tstart - pad, tstop + pad)
        .and_then(|s| to_km(s, axis))
        .at_stage(&predictive_msid, Stage::Fetch)?;
    let definitive = ctx
        .fetch
        .fetch(&definitive_msid, tstart - pad, tstop + pad)
        .and_then(|s| to_km(s, axis))
        .at_stage(&definitive_msid, Stage::Fetch)?;

    let out = stitch(&msid, &definitive, &predictive)?;
    tracing::debug!(
        "Stitched {}: {} samples ({} predictive, {} definitive)",
        msid,
        out.len(),
        predictive.len(),
        definitive.len()
    );
    Ok(out)
}

impl Handler for EphemHandler {
    fn name(&self) -> &str {
        "ephemeris"
    }

    fn compute(
        &self,
        ctx: &HandlerContext<'_>,
        tstart: f64,
        tstop: f64,
        args: &[Option<String>],
    ) -> Result<PartialResult> {
        let kind = required_arg(self.name(), args, 0)?;
        let axis = required_arg(self.name(), args, 1)?;
        let key = RangeKey::new(ctx.source, format!("dp_{}ephem_{}", kind, axis), tstart, tstop);

        let stream = self.cache.get_or_try_insert_with(key, || {
            fetch_stitched(ctx, kind, axis, tstart, tstop)
        })?;

        Ok(PartialResult::from_stream(stream.time_slice(tstart, tstop)))
    }
}
