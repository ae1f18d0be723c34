//! Attitude quaternion assembly
//!
//! `quat_<root>` combines the component channels `<root>1..<root>4` into
//! normalized quaternions. The `aoatupq` root only telemeters three
//! components; the scalar part is rebuilt as `sqrt(|1 - q1² - q2² - q3²|)`.
//!
//! Components are aligned by nearest neighbour on the first component's
//! sample times, and a sample is bad if any component is bad there.

use crate::analysis::align::AlignTimes;
use crate::error::{Result, ResultExt, Stage};
use crate::registry::{required_arg, Handler, HandlerContext, PartialResult};
use crate::types::{SampleStream, Values};

/// Roots that telemeter only the vector part
const THREE_COMPONENT_ROOTS: [&str; 1] = ["aoatupq"];

/// Handler for `quat_(aoattqt|aocmdqt|aotarqt|aoatupq)`
#[derive(Debug, Default)]
pub struct QuatHandler;

impl QuatHandler {
    pub const PATTERN: &'static str = r"quat_(aoattqt|aocmdqt|aotarqt|aoatupq)";

    pub fn new() -> Self {
        Self
    }
}

/// Component channel names for a quaternion root
pub fn component_msids(root: &str) -> Vec<String> {
    let n = if THREE_COMPONENT_ROOTS.contains(&root) { 3 } else { 4 };
    (1..=n).map(|i| format!("{}{}", root, i)).collect()
}

/// Build unit quaternions from aligned component columns.
///
/// With three columns the scalar part is reconstructed first. A zero-norm
/// quaternion is returned as-is.
pub fn assemble(columns: &[Vec<f64>]) -> Vec<[f64; 4]> {
    let n = columns.first().map_or(0, Vec::len);
    (0..n)
        .map(|i| {
            let mut q = [0.0; 4];
            for (k, col) in columns.iter().take(4).enumerate() {
                q[k] = col[i];
            }
            if columns.len() == 3 {
                q[3] = (1.0 - q[0] * q[0] - q[1] * q[1] - q[2] * q[2]).abs().sqrt();
            }
            normalize(q)
        })
        .collect()
}

fn normalize(q: [f64; 4]) -> [f64; 4] {
    let norm = q.iter().map(|x| x * x).sum::<f64>().sqrt();
    if norm > 0.0 {
        q.map(|x| x / norm)
    } else {
        q
    }
}

/// Normalized quaternions for `root` over `[tstart, tstop)`.
///
/// Components are fetched with high-rate padding and aligned before the
/// window is cut back to the requested range.
pub fn attitude(ctx: &HandlerContext<'_>, root: &str, tstart: f64, tstop: f64) -> Result<SampleStream> {
    let msids = component_msids(root);
    let pad = ctx.config.padding.high_rate;

    let raw = ctx
        .fetch
        .fetch_set(&msids, tstart - pad, tstop + pad)
        .at_stage(root, Stage::Fetch)?;
    let aligned = raw
        .interpolate_nearest(AlignTimes::Reference(0), true)
        .at_stage(root, Stage::Alignment)?;

    let streams = aligned.into_streams();
    let columns = streams
        .iter()
        .map(SampleStream::f64_values)
        .collect::<Result<Vec<_>>>()
        .at_stage(root, Stage::Compute)?;
    let (times, bads) = match streams.first() {
        Some(s) => (s.times.clone(), s.bads.clone()),
        None => (Vec::new(), Vec::new()),
    };

    let quats = SampleStream::new(
        format!("quat_{}", root),
        times,
        Values::Quat(assemble(&columns)),
        bads,
        None,
    )?
    .time_slice(tstart, tstop);

    tracing::debug!(
        "Assembled {} quaternions from {} ({} bad)",
        quats.len(),
        root,
        quats.n_bad()
    );
    Ok(quats)
}

impl Handler for QuatHandler {
    fn name(&self) -> &str {
        "quat"
    }

    fn compute(
        &self,
        ctx: &HandlerContext<'_>,
        tstart: f64,
        tstop: f64,
        args: &[Option<String>],
    ) -> Result<PartialResult> {
        let root = required_arg(self.name(), args, 0)?;
        Ok(PartialResult::from_stream(attitude(ctx, root, tstart, tstop)?))
    }

    fn is_stats_capable(&self) -> bool {
        false
    }
}
