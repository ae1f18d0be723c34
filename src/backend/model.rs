//! Thermal model collaborator
//!
//! A model is identified by an opaque [`ModelSpec`] (name plus optional
//! revision) and evaluated for one named node over a time range.

use crate::error::{Result, TlmError};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Versioned model identifier
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ModelSpec {
    /// Model configuration name (e.g. `mups_valve`)
    pub name: String,
    /// Revision token; `None` selects the default revision
    #[serde(default)]
    pub version: Option<String>,
}

impl ModelSpec {
    /// Spec for the default revision of `name`
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            version: None,
        }
    }

    /// Same model at a specific revision
    pub fn with_version(mut self, version: Option<String>) -> Self {
        self.version = version;
        self
    }
}

impl std::fmt::Display for ModelSpec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.version {
            Some(v) => write!(f, "{}@{}", self.name, v),
            None => write!(f, "{}", self.name),
        }
    }
}

/// Predicted node values
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ModelPrediction {
    /// Prediction times (CXC seconds)
    pub times: Vec<f64>,
    /// Predicted values (degrees C for thermal nodes)
    pub values: Vec<f64>,
}

/// Source of model predictions
pub trait ThermalModel: Send + Sync {
    /// Evaluate `node` of the model `spec` over `[tstart, tstop]`
    fn evaluate(&self, spec: &ModelSpec, node: &str, tstart: f64, tstop: f64)
        -> Result<ModelPrediction>;
}

/// One precomputed node prediction in a snapshot
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelTable {
    #[serde(flatten)]
    pub spec: ModelSpec,
    pub node: String,
    #[serde(flatten)]
    pub prediction: ModelPrediction,
}

/// Model backed by precomputed prediction tables
#[derive(Debug, Clone, Default)]
pub struct TabulatedModel {
    tables: HashMap<(ModelSpec, String), ModelPrediction>,
}

impl TabulatedModel {
    /// Create an empty model
    pub fn new() -> Self {
        Self::default()
    }

    /// Add (or replace) the prediction for one node
    pub fn insert(&mut self, table: ModelTable) {
        self.tables
            .insert((table.spec, table.node.to_ascii_lowercase()), table.prediction);
    }

    /// Number of tabulated nodes
    pub fn len(&self) -> usize {
        self.tables.len()
    }

    /// Returns true if nothing is tabulated
    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
    }
}

impl FromIterator<ModelTable> for TabulatedModel {
    fn from_iter<I: IntoIterator<Item = ModelTable>>(iter: I) -> Self {
        let mut model = TabulatedModel::new();
        for table in iter {
            model.insert(table);
        }
        model
    }
}

impl ThermalModel for TabulatedModel {
    fn evaluate(
        &self,
        spec: &ModelSpec,
        node: &str,
        tstart: f64,
        tstop: f64,
    ) -> Result<ModelPrediction> {
        let key = (spec.clone(), node.to_ascii_lowercase());
        let table = self
            .tables
            .get(&key)
            .ok_or_else(|| TlmError::Model(format!("no prediction for {} node {}", spec, node)))?;

        let i0 = table.times.partition_point(|&t| t < tstart);
        let i1 = table.times.partition_point(|&t| t <= tstop).max(i0);
        tracing::debug!(
            "Model {} node {}: {} predictions in range",
            spec,
            node,
            i1 - i0
        );
        Ok(ModelPrediction {
            times: table.times[i0..i1].to_vec(),
            values: table.values[i0..i1].to_vec(),
        })
    }
}
