//! Computed sun pitch and off-nominal roll
//!
//! `pitch_comp` and `roll_comp` are mode-aware. In normal pointing and
//! maneuver modes the sun direction is derived from the attitude quaternion
//! and the orbit and solar ephemerides. In safe sun-pointing mode the
//! on-board sun-sensor vector `aosunsa1..3` is used directly. Transitional
//! spans follow the configured mode policy.

use super::ephem::fetch_stitched;
use super::mode::{ModeClass, ModeSegmenter};
use super::quat::attitude;
use crate::analysis::align::{linear, AlignTimes};
use crate::cache::{LastCall, RangeKey};
use crate::error::{Result, ResultExt, Stage, TlmError};
use crate::registry::{required_arg, Handler, HandlerContext, PartialResult};
use crate::types::{SampleStream, Values};

/// Attitude quaternion used for the normal-mode geometry
const ATTITUDE_ROOT: &str = "aoattqt";

/// Safe-mode sun-sensor vector components
const SUN_SENSOR_MSIDS: [&str; 3] = ["aosunsa1", "aosunsa2", "aosunsa3"];

const AXES: [&str; 3] = ["x", "y", "z"];

/// Angles over one span: times, pitch, roll, bads
#[derive(Debug, Clone, Default, PartialEq)]
struct Angles {
    times: Vec<f64>,
    pitch: Vec<f64>,
    roll: Vec<f64>,
    bads: Vec<bool>,
}

impl Angles {
    fn extend(&mut self, other: Angles) {
        self.times.extend(other.times);
        self.pitch.extend(other.pitch);
        self.roll.extend(other.roll);
        self.bads.extend(other.bads);
    }
}

/// Handler for `(pitch|roll)_comp`
#[derive(Debug)]
pub struct PitchRollHandler {
    modes: ModeSegmenter,
    safe_sensor: LastCall<RangeKey, Vec<SampleStream>>,
}

impl PitchRollHandler {
    pub const PATTERN: &'static str = r"(pitch|roll)_comp";

    pub fn new(modes_cache: bool, safe_sensor_cache: bool) -> Self {
        Self {
            modes: ModeSegmenter::new(modes_cache),
            safe_sensor: LastCall::new("safe_sensor", safe_sensor_cache),
        }
    }

    /// Aligned sun-sensor components over the whole query range
    fn sun_sensor(&self, ctx: &HandlerContext<'_>, tstart: f64, tstop: f64) -> Result<Vec<SampleStream>> {
        self.safe_sensor
            .get_or_try_insert_with(RangeKey::new(ctx.source, "aosunsa", tstart, tstop), || {
                let msids: Vec<String> = SUN_SENSOR_MSIDS.iter().map(|s| s.to_string()).collect();
                let raw = ctx
                    .fetch
                    .fetch_set(&msids, tstart, tstop)
                    .at_stage("aosunsa", Stage::Fetch)?;
                let aligned = raw
                    .interpolate_nearest(AlignTimes::Reference(0), true)
                    .at_stage("aosunsa", Stage::Alignment)?;
                Ok(aligned.into_streams())
            })
    }

    fn safe_angles(&self, ctx: &HandlerContext<'_>, range: (f64, f64), span: (f64, f64)) -> Result<Angles> {
        let table = self.sun_sensor(ctx, range.0, range.1)?;
        let cols = table
            .iter()
            .map(|s| s.time_slice(span.0, span.1))
            .collect::<Vec<_>>();
        let Some(first) = cols.first() else {
            return Ok(Angles::default());
        };
        let xyz = cols
            .iter()
            .map(SampleStream::f64_values)
            .collect::<Result<Vec<_>>>()?;

        let mut out = Angles {
            times: first.times.clone(),
            bads: first.bads.clone(),
            ..Default::default()
        };
        for i in 0..first.len() {
            let (p, r) = pitch_roll([xyz[0][i], xyz[1][i], xyz[2][i]]);
            out.pitch.push(p);
            out.roll.push(r);
        }
        Ok(out)
    }

    fn normal_angles(&self, ctx: &HandlerContext<'_>, span: (f64, f64)) -> Result<Angles> {
        let quats = attitude(ctx, ATTITUDE_ROOT, span.0, span.1)?;
        let Values::Quat(q) = &quats.values else {
            return Err(TlmError::UnsupportedValues(format!(
                "expected quaternions, found {}",
                quats.values.kind()
            )));
        };
        let times = &quats.times;
        let mut bads = quats.bads.clone();

        // Sun position relative to the spacecraft, ECI, per axis
        let mut sun = Vec::with_capacity(3);
        for axis in AXES {
            let orbit = linear(&fetch_stitched(ctx, "orbit", axis, span.0, span.1)?, times)
                .at_stage("orbitephem", Stage::Alignment)?;
            let solar = linear(&fetch_stitched(ctx, "solar", axis, span.0, span.1)?, times)
                .at_stage("solarephem", Stage::Alignment)?;
            let (o, s) = (orbit.f64_values()?, solar.f64_values()?);
            for (i, bad) in bads.iter_mut().enumerate() {
                *bad |= orbit.bads[i] || solar.bads[i];
            }
            sun.push(s.iter().zip(&o).map(|(s, o)| s - o).collect::<Vec<f64>>());
        }

        let mut out = Angles {
            times: times.clone(),
            bads,
            ..Default::default()
        };
        for (i, quat) in q.iter().enumerate() {
            let body = sun_body_vector(quat, [sun[0][i], sun[1][i], sun[2][i]]);
            let (p, r) = pitch_roll(body);
            out.pitch.push(p);
            out.roll.push(r);
        }
        Ok(out)
    }
}

/// Rotate an ECI vector into the body frame of attitude `q` (`q[3]` scalar)
pub fn sun_body_vector(q: &[f64; 4], eci: [f64; 3]) -> [f64; 3] {
    let [q1, q2, q3, q4] = *q;
    // Body-to-ECI rotation matrix
    let t = [
        [
            1.0 - 2.0 * (q2 * q2 + q3 * q3),
            2.0 * (q1 * q2 - q3 * q4),
            2.0 * (q3 * q1 + q2 * q4),
        ],
        [
            2.0 * (q1 * q2 + q3 * q4),
            1.0 - 2.0 * (q3 * q3 + q1 * q1),
            2.0 * (q2 * q3 - q1 * q4),
        ],
        [
            2.0 * (q3 * q1 - q2 * q4),
            2.0 * (q2 * q3 + q1 * q4),
            1.0 - 2.0 * (q1 * q1 + q2 * q2),
        ],
    ];
    let mut body = [0.0; 3];
    for (j, b) in body.iter_mut().enumerate() {
        *b = (0..3).map(|i| t[i][j] * eci[i]).sum();
    }
    body
}

/// Sun pitch and off-nominal roll (degrees) of a body-frame sun vector
pub fn pitch_roll(body: [f64; 3]) -> (f64, f64) {
    let norm = body.iter().map(|x| x * x).sum::<f64>().sqrt();
    let pitch = (body[0] / norm).clamp(-1.0, 1.0).acos().to_degrees();
    let roll = (-body[1]).atan2(-body[2]).to_degrees();
    (pitch, roll)
}

impl Handler for PitchRollHandler {
    fn name(&self) -> &str {
        "pitch_roll"
    }

    fn compute(
        &self,
        ctx: &HandlerContext<'_>,
        tstart: f64,
        tstop: f64,
        args: &[Option<String>],
    ) -> Result<PartialResult> {
        let which = required_arg(self.name(), args, 0)?;
        let name = format!("{}_comp", which);

        let segments = self.modes.segments(ctx, tstart, tstop)?;
        let mut angles = Angles::default();
        for seg in &segments {
            let Some(span) = seg.clip(tstart, tstop) else {
                continue;
            };
            let part = match seg.class {
                ModeClass::Normal => self.normal_angles(ctx, span),
                ModeClass::Safe => self.safe_angles(ctx, (tstart, tstop), span),
            }
            .at_stage(&name, Stage::Compute)?;
            tracing::debug!("{}: {:?} span with {} samples", name, seg.class, part.times.len());
            angles.extend(part);
        }

        let values = if which == "pitch" { angles.pitch } else { angles.roll };
        let stream = SampleStream::new(
            name,
            angles.times,
            Values::Float(values),
            angles.bads,
            Some("DEG".to_string()),
        )?;
        Ok(PartialResult::from_stream(stream))
    }
}
