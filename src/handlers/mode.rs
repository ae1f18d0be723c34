//! Operational-mode segmentation
//!
//! Mode-aware handlers split their query range into contiguous runs of one
//! operational mode and compute each run with the method valid in that mode.
//! Values the classifier does not recognise are transitional and are handled
//! according to [`TransitionPolicy`].

use crate::cache::{LastCall, RangeKey};
use crate::config::{ModeSettings, TransitionPolicy};
use crate::error::{Result, ResultExt, Stage, TlmError};
use crate::registry::HandlerContext;
use crate::time::cxc_to_date;
use crate::types::{SampleStream, Values};

/// Attitude-control regime a sample belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ModeClass {
    /// Normal pointing or maneuvering
    Normal,
    /// Safe sun-pointing
    Safe,
}

/// A maximal run of one classified mode, covering `[tstart, tstop)`.
///
/// The last segment of a stream is open-ended (`tstop` is infinite); callers
/// clip segments to their own query range.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ModeSegment<C> {
    pub class: C,
    pub tstart: f64,
    pub tstop: f64,
}

impl<C> ModeSegment<C> {
    /// Overlap with `[tstart, tstop)`, if any
    pub fn clip(&self, tstart: f64, tstop: f64) -> Option<(f64, f64)> {
        let t0 = self.tstart.max(tstart);
        let t1 = self.tstop.min(tstop);
        (t0 < t1).then_some((t0, t1))
    }
}

/// Mode values as text, whatever their stored kind
fn mode_labels(values: &Values) -> Vec<String> {
    match values {
        Values::Str(v) => v.iter().map(|s| s.trim().to_ascii_uppercase()).collect(),
        Values::Int(v) => v.iter().map(i64::to_string).collect(),
        Values::Bool(v) => v.iter().map(bool::to_string).collect(),
        Values::Float(v) => v.iter().map(f64::to_string).collect(),
        Values::Quat(v) => v.iter().map(|q| format!("{:?}", q)).collect(),
    }
}

/// Split a mode stream into maximal runs of classified values.
///
/// Bad samples are ignored. A run starts at the first sample of its class
/// and ends at the first sample of a different class. Under
/// [`TransitionPolicy::Drop`] transitional spans produce no segment; under
/// [`TransitionPolicy::HoldPrevious`] they extend the preceding run (a
/// leading transitional span is still dropped).
pub fn segment<C, F>(mode: &SampleStream, classify: F, policy: TransitionPolicy) -> Vec<ModeSegment<C>>
where
    C: Copy + PartialEq,
    F: Fn(&str) -> Option<C>,
{
    let labels = mode_labels(&mode.values);
    let mut segments: Vec<ModeSegment<C>> = Vec::new();
    // Current run: class (None = transitional) and start time
    let mut current: Option<(Option<C>, f64)> = None;

    for (i, label) in labels.iter().enumerate() {
        if mode.bads[i] {
            continue;
        }
        let t = mode.times[i];
        let mut class = classify(label.as_str());
        if class.is_none() && policy == TransitionPolicy::HoldPrevious {
            if let Some((Some(prev), _)) = current {
                class = Some(prev);
            }
        }

        match current {
            Some((c, _)) if c == class => {}
            Some((c, start)) => {
                close_run(&mut segments, c, start, t, &mode.msid);
                current = Some((class, t));
            }
            None => current = Some((class, t)),
        }
    }
    if let Some((c, start)) = current {
        close_run(&mut segments, c, start, f64::INFINITY, &mode.msid);
    }
    segments
}

fn close_run<C>(segments: &mut Vec<ModeSegment<C>>, class: Option<C>, tstart: f64, tstop: f64, msid: &str) {
    match class {
        Some(class) => segments.push(ModeSegment { class, tstart, tstop }),
        None => tracing::warn!(
            "Dropping transitional {} span starting {}",
            msid,
            cxc_to_date(tstart)
        ),
    }
}

/// Classifier built from the configured mode lists
pub fn classifier(settings: &ModeSettings) -> impl Fn(&str) -> Option<ModeClass> + '_ {
    move |label: &str| {
        if settings.normal_modes.iter().any(|m| m.eq_ignore_ascii_case(label)) {
            Some(ModeClass::Normal)
        } else if settings.safe_modes.iter().any(|m| m.eq_ignore_ascii_case(label)) {
            Some(ModeClass::Safe)
        } else {
            None
        }
    }
}

/// Mode segmentation with a single-entry cache of the most recent range
#[derive(Debug)]
pub struct ModeSegmenter {
    cache: LastCall<RangeKey, Vec<ModeSegment<ModeClass>>>,
}

impl ModeSegmenter {
    pub fn new(cache_enabled: bool) -> Self {
        Self {
            cache: LastCall::new("modes", cache_enabled),
        }
    }

    /// Segments covering `[tstart, tstop)`.
    ///
    /// The mode channel is fetched with high-rate padding before `tstart` so
    /// the mode in force at the start of the range is known.
    pub fn segments(
        &self,
        ctx: &HandlerContext<'_>,
        tstart: f64,
        tstop: f64,
    ) -> Result<Vec<ModeSegment<ModeClass>>> {
        let settings = &ctx.config.modes;
        let key = RangeKey::new(ctx.source, settings.mode_msid.as_str(), tstart, tstop);
        self.cache.get_or_try_insert_with(key, || {
            let msid = settings.mode_msid.as_str();
            let mode = ctx
                .fetch
                .fetch(msid, tstart - ctx.config.padding.high_rate, tstop)
                .at_stage(msid, Stage::Fetch)?
                .filter_bad();
            if mode.is_empty() {
                return Err(TlmError::NoTelemetry {
                    msid: msid.to_string(),
                    start: cxc_to_date(tstart),
                    stop: cxc_to_date(tstop),
                });
            }
            let segments: Vec<_> = segment(&mode, classifier(settings), settings.transition_policy)
                .into_iter()
                .filter(|s| s.clip(tstart, tstop).is_some())
                .collect();
            tracing::debug!("{} mode segments in {}", segments.len(), msid);
            Ok(segments)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn modes(times: Vec<f64>, labels: &[&str]) -> SampleStream {
        let n = times.len();
        SampleStream::new(
            "aopcadmd",
            times,
            Values::Str(labels.iter().map(|s| s.to_string()).collect()),
            vec![false; n],
            None,
        )
        .unwrap()
    }

    fn classify(label: &str) -> Option<ModeClass> {
        classifier(&ModeSettings::default())(label)
    }

    #[test]
    fn test_segments_are_maximal_runs() {
        let m = modes(
            vec![0.0, 10.0, 20.0, 30.0, 40.0],
            &["NPNT", "NMAN", "NSUN", "NSUN", "NPNT"],
        );
        let s = segment(&m, classify, TransitionPolicy::Drop);
        assert_eq!(s.len(), 3);
        assert_eq!((s[0].class, s[0].tstart, s[0].tstop), (ModeClass::Normal, 0.0, 20.0));
        assert_eq!((s[1].class, s[1].tstart, s[1].tstop), (ModeClass::Safe, 20.0, 40.0));
        assert_eq!(s[2].class, ModeClass::Normal);
        assert!(s[2].tstop.is_infinite());
    }

    #[test]
    fn test_transitional_dropped() {
        let m = modes(vec![0.0, 10.0, 20.0], &["NPNT", "STBY", "NSUN"]);
        let s = segment(&m, classify, TransitionPolicy::Drop);
        assert_eq!(s.len(), 2);
        assert_eq!(s[0].tstop, 10.0);
        assert_eq!(s[1].tstart, 20.0);
    }

    #[test]
    fn test_transitional_held() {
        let m = modes(vec![0.0, 10.0, 20.0], &["NPNT", "STBY", "NSUN"]);
        let s = segment(&m, classify, TransitionPolicy::HoldPrevious);
        assert_eq!(s.len(), 2);
        assert_eq!((s[0].tstart, s[0].tstop), (0.0, 20.0));
    }

    #[test]
    fn test_leading_transitional_dropped_when_held() {
        let m = modes(vec![0.0, 10.0], &["STBY", "NSUN"]);
        let s = segment(&m, classify, TransitionPolicy::HoldPrevious);
        assert_eq!(s.len(), 1);
        assert_eq!(s[0].tstart, 10.0);
    }

    #[test]
    fn test_bad_samples_ignored() {
        let mut m = modes(vec![0.0, 10.0, 20.0], &["NPNT", "NSUN", "NPNT"]);
        m.bads[1] = true;
        let s = segment(&m, classify, TransitionPolicy::Drop);
        assert_eq!(s.len(), 1);
    }

    #[test]
    fn test_clip() {
        let seg = ModeSegment {
            class: ModeClass::Safe,
            tstart: 10.0,
            tstop: f64::INFINITY,
        };
        assert_eq!(seg.clip(0.0, 100.0), Some((10.0, 100.0)));
        assert_eq!(seg.clip(0.0, 10.0), None);
    }
}
