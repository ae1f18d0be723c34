//! Model-guided signal reconciliation
//!
//! Given candidate signals `C1..Ck` and a model prediction `M`, all aligned
//! to the same time base, builds one cleaned series in a single causal pass:
//!
//! - At `i = 0` the reference is `M[0]`.
//! - At `i > 0` the reference is `out[i - 1] + (M[i] - M[i - 1])`, the last
//!   accepted value advanced by the model's local change.
//! - The first candidate (declaration order) strictly within `tolerance` of
//!   the reference is accepted and labelled with its 1-based position.
//! - If none qualifies the reference itself is emitted with label 0.
//!
//! NaN candidates never qualify. A sample labelled 0 is model-derived and
//! reported bad by callers.

use crate::error::{Result, TlmError};

/// Label for samples bridged by the model
pub const MODEL_SOURCE: u8 = 0;

/// Reconciled values with per-sample provenance
#[derive(Debug, Clone, PartialEq)]
pub struct ReconciledSeries {
    /// Selected or propagated values
    pub out: Vec<f64>,
    /// 0 for model-derived samples, otherwise the 1-based candidate index
    pub source: Vec<u8>,
}

impl ReconciledSeries {
    /// Bad flags derived from provenance (`source == 0`)
    pub fn bads(&self) -> Vec<bool> {
        self.source.iter().map(|&s| s == MODEL_SOURCE).collect()
    }

    /// Fraction of samples taken from a candidate
    pub fn recovered_fraction(&self) -> f64 {
        if self.source.is_empty() {
            return 0.0;
        }
        let good = self.source.iter().filter(|&&s| s != MODEL_SOURCE).count();
        good as f64 / self.source.len() as f64
    }
}

/// Reconcile `candidates` against `model` with the given `tolerance`.
///
/// Every candidate must have the model's length; at most 255 candidates are
/// supported.
pub fn reconcile(candidates: &[&[f64]], model: &[f64], tolerance: f64) -> Result<ReconciledSeries> {
    if candidates.len() > u8::MAX as usize {
        return Err(TlmError::Config(format!(
            "too many candidates for reconciliation: {}",
            candidates.len()
        )));
    }
    if let Some((k, c)) = candidates
        .iter()
        .enumerate()
        .find(|(_, c)| c.len() != model.len())
    {
        return Err(TlmError::LengthMismatch(format!(
            "candidate {} has {} samples, model has {}",
            k + 1,
            c.len(),
            model.len()
        )));
    }

    let n = model.len();
    let mut out = Vec::with_capacity(n);
    let mut source = Vec::with_capacity(n);

    for i in 0..n {
        let reference = match out.last() {
            Some(&prev) => prev + (model[i] - model[i - 1]),
            None => model[i],
        };

        let pick = candidates
            .iter()
            .position(|c| (c[i] - reference).abs() < tolerance);

        match pick {
            Some(k) => {
                out.push(candidates[k][i]);
                source.push((k + 1) as u8);
            }
            None => {
                out.push(reference);
                source.push(MODEL_SOURCE);
            }
        }
    }

    let series = ReconciledSeries { out, source };
    tracing::debug!(
        "Reconciled {} samples from {} candidates, {:.1}% recovered",
        n,
        candidates.len(),
        series.recovered_fraction() * 100.0
    );
    Ok(series)
}
