//! Commanded-state collaborator
//!
//! Commanded states are piecewise-constant: each [`StateInterval`] holds one
//! value over `[tstart, tstop)`.

use crate::error::{Result, TlmError};
use crate::types::Values;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Value of a commanded state
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum StateValue {
    Int(i64),
    Float(f64),
    Str(String),
}

/// One constant-value span of a commanded state
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StateInterval {
    pub tstart: f64,
    pub tstop: f64,
    pub value: StateValue,
}

/// Source of commanded states
pub trait CommandStates: Send + Sync {
    /// Intervals of state `key` overlapping `[tstart, tstop)`, in time order
    fn states(&self, key: &str, tstart: f64, tstop: f64) -> Result<Vec<StateInterval>>;
}

/// Pack per-sample state values into the narrowest [`Values`] kind.
///
/// All integers stay integers; any mix of numbers becomes float; anything
/// containing a string becomes strings.
pub fn state_values(samples: &[&StateValue]) -> Values {
    let all_int = samples.iter().all(|v| matches!(v, StateValue::Int(_)));
    let all_num = samples.iter().all(|v| !matches!(v, StateValue::Str(_)));

    if all_int {
        Values::Int(
            samples
                .iter()
                .map(|v| match v {
                    StateValue::Int(i) => *i,
                    _ => 0,
                })
                .collect(),
        )
    } else if all_num {
        Values::Float(
            samples
                .iter()
                .map(|v| match v {
                    StateValue::Int(i) => *i as f64,
                    StateValue::Float(f) => *f,
                    StateValue::Str(_) => f64::NAN,
                })
                .collect(),
        )
    } else {
        Values::Str(
            samples
                .iter()
                .map(|v| match v {
                    StateValue::Int(i) => i.to_string(),
                    StateValue::Float(f) => f.to_string(),
                    StateValue::Str(s) => s.clone(),
                })
                .collect(),
        )
    }
}

/// Named state history in a snapshot
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StateTable {
    pub key: String,
    pub intervals: Vec<StateInterval>,
}

/// In-memory commanded states
#[derive(Debug, Clone, Default)]
pub struct MemoryStates {
    tables: HashMap<String, Vec<StateInterval>>,
}

impl MemoryStates {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Add (or replace) the history for one state key
    pub fn insert(&mut self, table: StateTable) {
        let mut intervals = table.intervals;
        intervals.sort_by(|a, b| a.tstart.total_cmp(&b.tstart));
        self.tables
            .insert(table.key.to_ascii_lowercase(), intervals);
    }
}

impl FromIterator<StateTable> for MemoryStates {
    fn from_iter<I: IntoIterator<Item = StateTable>>(iter: I) -> Self {
        let mut states = MemoryStates::new();
        for table in iter {
            states.insert(table);
        }
        states
    }
}

impl CommandStates for MemoryStates {
    fn states(&self, key: &str, tstart: f64, tstop: f64) -> Result<Vec<StateInterval>> {
        let intervals = self
            .tables
            .get(&key.to_ascii_lowercase())
            .ok_or_else(|| TlmError::Fetch {
                msid: key.to_string(),
                message: "unknown commanded state".to_string(),
            })?;
        Ok(intervals
            .iter()
            .filter(|iv| iv.tstop > tstart && iv.tstart < tstop)
            .cloned()
            .collect())
    }
}
