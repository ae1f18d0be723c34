//! Collaborators the engine computes against
//!
//! The engine never reads archive files itself. Everything it needs from the
//! outside world arrives through three traits:
//!
//! - [`RawFetch`] - raw telemetry streams over a half-open time range
//! - [`ThermalModel`] - model predictions for a named physical node
//! - [`CommandStates`] - commanded-state intervals (pitch, PCAD mode, ...)
//!
//! In-memory implementations ([`MemoryArchive`], [`TabulatedModel`],
//! [`MemoryStates`]) back the CLI and the tests, and can all be loaded from
//! one JSON [`ArchiveSnapshot`].
//!
//! # Example
//!
//! ```ignore
//! use derived_tlm::backend::{ArchiveSnapshot, RawFetch};
//!
//! let snapshot = ArchiveSnapshot::load_json("snapshot.json".as_ref())?;
//! let (archive, model, states) = snapshot.into_collaborators();
//! let stream = archive.fetch("aosares1", 0.0, 86400.0)?;
//! ```

pub mod memory;
pub mod model;
pub mod states;

pub use memory::{ArchiveSnapshot, MemoryArchive};
pub use model::{ModelPrediction, ModelSpec, ModelTable, TabulatedModel, ThermalModel};
pub use states::{CommandStates, MemoryStates, StateInterval, StateTable, StateValue};

use crate::analysis::align::{nearest_union, AlignTimes};
use crate::error::{Result, TlmError};
use crate::types::SampleStream;

/// Source of raw telemetry
#[cfg_attr(test, mockall::automock)]
pub trait RawFetch: Send + Sync {
    /// Samples of `msid` with `tstart <= t < tstop`
    fn fetch(&self, msid: &str, tstart: f64, tstop: f64) -> Result<SampleStream>;

    /// Fetch several channels over the same range
    fn fetch_set(&self, msids: &[String], tstart: f64, tstop: f64) -> Result<MsidSet> {
        let streams = msids
            .iter()
            .map(|msid| self.fetch(msid, tstart, tstop))
            .collect::<Result<Vec<_>>>()?;
        Ok(MsidSet::new(streams))
    }
}

/// Ordered collection of streams fetched together
#[derive(Debug, Clone, PartialEq)]
pub struct MsidSet {
    streams: Vec<SampleStream>,
}

impl MsidSet {
    /// Wrap streams, keeping their order
    pub fn new(streams: Vec<SampleStream>) -> Self {
        Self { streams }
    }

    /// Stream by channel name (case-insensitive)
    pub fn get(&self, msid: &str) -> Option<&SampleStream> {
        self.streams
            .iter()
            .find(|s| s.msid.eq_ignore_ascii_case(msid))
    }

    /// Stream by channel name, or a fetch error naming the channel
    pub fn require(&self, msid: &str) -> Result<&SampleStream> {
        self.get(msid).ok_or_else(|| TlmError::Fetch {
            msid: msid.to_string(),
            message: "missing from fetched set".to_string(),
        })
    }

    /// Streams in fetch order
    pub fn streams(&self) -> &[SampleStream] {
        &self.streams
    }

    /// Consume the set, yielding streams in fetch order
    pub fn into_streams(self) -> Vec<SampleStream> {
        self.streams
    }

    /// Number of streams
    pub fn len(&self) -> usize {
        self.streams.len()
    }

    /// Returns true if the set holds no streams
    pub fn is_empty(&self) -> bool {
        self.streams.is_empty()
    }

    /// Resample every stream onto one time base by nearest neighbour.
    ///
    /// See [`nearest_union`] for the time-base and bad-flag rules.
    pub fn interpolate_nearest(&self, times: AlignTimes<'_>, bad_union: bool) -> Result<MsidSet> {
        let refs: Vec<&SampleStream> = self.streams.iter().collect();
        Ok(MsidSet::new(nearest_union(&refs, times, bad_union)?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Values;

    #[test]
    fn test_fetch_set_keeps_order() {
        let mut archive = MemoryArchive::default();
        archive.insert(SampleStream::from_f64("b", vec![0.0, 1.0], vec![1.0, 2.0], None).unwrap());
        archive.insert(SampleStream::from_f64("a", vec![0.0, 1.0], vec![3.0, 4.0], None).unwrap());

        let set = archive
            .fetch_set(&["a".to_string(), "b".to_string()], 0.0, 1.0)
            .unwrap();
        assert_eq!(set.len(), 2);
        assert_eq!(set.streams()[0].msid, "a");
        assert_eq!(set.get("B").unwrap().times, vec![0.0]);
        assert!(matches!(set.require("c"), Err(TlmError::Fetch { .. })));
    }

    #[test]
    fn test_interpolate_nearest_bad_union() {
        let a = SampleStream::new(
            "a",
            vec![0.0, 1.0, 2.0],
            Values::Float(vec![0.0, 1.0, 2.0]),
            vec![false, true, false],
            None,
        )
        .unwrap();
        let b = SampleStream::from_f64("b", vec![0.0, 1.0, 2.0], vec![5.0; 3], None).unwrap();
        let set = MsidSet::new(vec![a, b]);
        let out = set.interpolate_nearest(AlignTimes::Reference(0), true).unwrap();
        assert_eq!(out.require("b").unwrap().bads, vec![false, true, false]);
    }
}
