//! Commanded-state sampling
//!
//! `cmd_state_<key>_<frames>` samples the commanded state `<key>` every
//! `frames` minor frames (1.025 s each). Sample times are the multiples of
//! that spacing inside `[tstart, tstop)`, so repeated queries over
//! overlapping ranges share a time grid.

use crate::backend::states::{state_values, StateValue};
use crate::error::{Result, ResultExt, Stage, TlmError};
use crate::registry::{required_arg, Handler, HandlerContext, PartialResult};
use crate::types::{SampleStream, Values};

/// Minor frame length in milliseconds
const FRAME_MS: u64 = 1025;

/// Handler for `cmd_state_<key>_<frames>`
#[derive(Debug, Default)]
pub struct CmdStateHandler;

impl CmdStateHandler {
    pub const PATTERN: &'static str = r"cmd_state_(\w+?)_(\d+)";

    pub fn new() -> Self {
        Self
    }
}

/// Sample spacing in seconds for a positive frame count
pub fn frame_spacing(frames: u64) -> Result<f64> {
    if frames == 0 {
        return Err(TlmError::Config("frame count must be positive".to_string()));
    }
    let ms = frames
        .checked_mul(FRAME_MS)
        .ok_or_else(|| TlmError::Config(format!("frame count {} is too large", frames)))?;
    Ok(ms as f64 / 1000.0)
}

/// Multiples of `dt` inside `[tstart, tstop)`
pub fn sample_grid(tstart: f64, tstop: f64, dt: f64) -> Vec<f64> {
    let first = (tstart / dt).ceil() as i64;
    (first..)
        .map(|k| k as f64 * dt)
        .take_while(|&t| t < tstop)
        .collect()
}

impl Handler for CmdStateHandler {
    fn name(&self) -> &str {
        "cmd_state"
    }

    fn compute(
        &self,
        ctx: &HandlerContext<'_>,
        tstart: f64,
        tstop: f64,
        args: &[Option<String>],
    ) -> Result<PartialResult> {
        let key = required_arg(self.name(), args, 0)?;
        let frames: u64 = required_arg(self.name(), args, 1)?
            .parse()
            .map_err(|e| TlmError::Config(format!("invalid frame count: {}", e)))?;
        let dt = frame_spacing(frames)?;
        let times = sample_grid(tstart, tstop, dt);
        let intervals = ctx
            .states
            .states(key, tstart, tstop)
            .at_stage(key, Stage::Fetch)?;

        let msid = format!("cmd_state_{}_{}", key, frames);
        if intervals.is_empty() {
            let n = times.len();
            let stream = SampleStream::new(
                msid,
                times,
                Values::Float(vec![f64::NAN; n]),
                vec![true; n],
                None,
            )?;
            return Ok(PartialResult::from_stream(stream));
        }

        // Walk the grid and the (time-ordered) intervals together
        let mut picked: Vec<&StateValue> = Vec::with_capacity(times.len());
        let mut bads = Vec::with_capacity(times.len());
        let mut j = 0;
        for &t in &times {
            while j + 1 < intervals.len() && intervals[j].tstop <= t {
                j += 1;
            }
            let iv = &intervals[j];
            picked.push(&iv.value);
            bads.push(!(iv.tstart <= t && t < iv.tstop));
        }

        tracing::debug!(
            "Sampled {} states of {} every {}s",
            times.len(),
            key,
            dt
        );
        let stream = SampleStream::new(msid, times, state_values(&picked), bads, None)?;
        Ok(PartialResult::from_stream(stream))
    }
}
