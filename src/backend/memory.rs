//! In-memory archive and JSON snapshots

use super::model::{ModelTable, TabulatedModel};
use super::states::{MemoryStates, StateTable};
use super::RawFetch;
use crate::error::{Result, ResultExt, TlmError};
use crate::types::SampleStream;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;

/// Raw telemetry held in memory, keyed by lower-case channel name
#[derive(Debug, Clone, Default)]
pub struct MemoryArchive {
    streams: HashMap<String, SampleStream>,
}

impl MemoryArchive {
    /// Create an empty archive
    pub fn new() -> Self {
        Self::default()
    }

    /// Add (or replace) a channel
    pub fn insert(&mut self, mut stream: SampleStream) {
        stream.msid = stream.msid.to_ascii_lowercase();
        self.streams.insert(stream.msid.clone(), stream);
    }

    /// Returns true if the channel is present
    pub fn contains(&self, msid: &str) -> bool {
        self.streams.contains_key(&msid.to_ascii_lowercase())
    }

    /// Channel names, sorted
    pub fn msids(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.streams.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }
}

impl FromIterator<SampleStream> for MemoryArchive {
    fn from_iter<I: IntoIterator<Item = SampleStream>>(iter: I) -> Self {
        let mut archive = MemoryArchive::new();
        for stream in iter {
            archive.insert(stream);
        }
        archive
    }
}

impl RawFetch for MemoryArchive {
    fn fetch(&self, msid: &str, tstart: f64, tstop: f64) -> Result<SampleStream> {
        let stream = self
            .streams
            .get(&msid.to_ascii_lowercase())
            .ok_or_else(|| TlmError::Fetch {
                msid: msid.to_string(),
                message: "not in archive".to_string(),
            })?;
        let out = stream.time_slice(tstart, tstop);
        tracing::trace!("Fetched {} samples of {}", out.len(), out.msid);
        Ok(out)
    }
}

/// Serialized archive contents: raw streams, model tables and state histories
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ArchiveSnapshot {
    #[serde(default)]
    pub streams: Vec<SampleStream>,
    #[serde(default)]
    pub models: Vec<ModelTable>,
    #[serde(default)]
    pub states: Vec<StateTable>,
}

impl ArchiveSnapshot {
    /// Parse a snapshot from a JSON string
    pub fn from_json_str(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Load a snapshot from a JSON file
    pub fn load_json(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(TlmError::from)
            .with_context(|| format!("Failed to read snapshot {}", path.display()))?;
        let snapshot = Self::from_json_str(&content)
            .with_context(|| format!("Failed to parse snapshot {}", path.display()))?;
        for stream in &snapshot.streams {
            if stream.times.len() != stream.values.len() || stream.times.len() != stream.bads.len()
            {
                return Err(TlmError::LengthMismatch(format!(
                    "{} in {}",
                    stream.msid,
                    path.display()
                )));
            }
        }
        tracing::info!(
            "Loaded snapshot {} ({} streams, {} model tables, {} state tables)",
            path.display(),
            snapshot.streams.len(),
            snapshot.models.len(),
            snapshot.states.len()
        );
        Ok(snapshot)
    }

    /// Split the snapshot into the three collaborators
    pub fn into_collaborators(self) -> (MemoryArchive, TabulatedModel, MemoryStates) {
        (
            self.streams.into_iter().collect(),
            self.models.into_iter().collect(),
            self.states.into_iter().collect(),
        )
    }
}
