//! Test data builders for creating test objects

use derived_tlm::backend::{
    ModelPrediction, ModelSpec, ModelTable, StateInterval, StateTable, StateValue,
};
use derived_tlm::{SampleStream, Values};

/// Builder for creating test sample streams
pub struct StreamBuilder {
    msid: String,
    times: Vec<f64>,
    values: Option<Values>,
    bad_indices: Vec<usize>,
    unit: Option<String>,
}

impl StreamBuilder {
    pub fn new(msid: &str) -> Self {
        Self {
            msid: msid.to_string(),
            times: Vec::new(),
            values: None,
            bad_indices: Vec::new(),
            unit: None,
        }
    }

    /// `n` samples every `dt` seconds starting at `t0`
    pub fn regular(mut self, t0: f64, dt: f64, n: usize) -> Self {
        self.times = (0..n).map(|i| t0 + i as f64 * dt).collect();
        self
    }

    /// Explicit sample times
    pub fn times(mut self, times: &[f64]) -> Self {
        self.times = times.to_vec();
        self
    }

    /// Float values computed from each sample time
    pub fn values_fn(mut self, f: impl Fn(f64) -> f64) -> Self {
        self.values = Some(Values::Float(self.times.iter().map(|&t| f(t)).collect()));
        self
    }

    /// The same float value at every sample
    pub fn constant(self, value: f64) -> Self {
        self.values_fn(move |_| value)
    }

    /// String values, one label per sample
    pub fn labels(mut self, labels: Vec<String>) -> Self {
        self.values = Some(Values::Str(labels));
        self
    }

    pub fn bad_at(mut self, index: usize) -> Self {
        self.bad_indices.push(index);
        self
    }

    pub fn unit(mut self, unit: &str) -> Self {
        self.unit = Some(unit.to_string());
        self
    }

    pub fn build(self) -> SampleStream {
        let n = self.times.len();
        let mut bads = vec![false; n];
        for i in self.bad_indices {
            bads[i] = true;
        }
        let values = self
            .values
            .unwrap_or_else(|| Values::Float(vec![0.0; n]));
        SampleStream::new(self.msid, self.times, values, bads, self.unit).unwrap()
    }
}

/// Prediction table for `node` of the default revision of `model`
pub fn model_table(model: &str, node: &str, times: Vec<f64>, values: Vec<f64>) -> ModelTable {
    ModelTable {
        spec: ModelSpec::new(model),
        node: node.to_string(),
        prediction: ModelPrediction { times, values },
    }
}

/// Commanded-state history from `(tstart, tstop, value)` spans
pub fn state_table(key: &str, spans: &[(f64, f64, f64)]) -> StateTable {
    StateTable {
        key: key.to_string(),
        intervals: spans
            .iter()
            .map(|&(tstart, tstop, v)| StateInterval {
                tstart,
                tstop,
                value: StateValue::Float(v),
            })
            .collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stream_builder() {
        let stream = StreamBuilder::new("tephin")
            .regular(10.0, 2.0, 3)
            .values_fn(|t| t * 2.0)
            .bad_at(1)
            .unit("K")
            .build();

        assert_eq!(stream.times, vec![10.0, 12.0, 14.0]);
        assert_eq!(stream.values, Values::Float(vec![20.0, 24.0, 28.0]));
        assert_eq!(stream.bads, vec![false, true, false]);
        assert_eq!(stream.unit.as_deref(), Some("K"));
    }
}
