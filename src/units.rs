//! Unit conversion layer
//!
//! Conversion is a pure function of `(unit_from, unit_to)`: the lookup of
//! the conversion function is delegated to a [`UnitConverter`] (the units
//! collaborator) and applied elementwise to every field a handler lists in
//! its [`UnitSpec::convert_attrs`]. Times and bad flags are never touched and
//! array lengths never change.
//!
//! [`StandardUnits`] is the built-in table. Every pair it knows is registered
//! in both directions, and every function is monotonic increasing.

use crate::error::{Result, TlmError};
use crate::types::{ComputedResult, UnitSpec, UnitSystem, Values};

/// Source of unit conversion functions
pub trait UnitConverter: Send + Sync {
    /// Convert `values` from `unit_from` to `unit_to`
    fn convert(&self, values: &[f64], unit_from: &str, unit_to: &str) -> Result<Vec<f64>>;
}

type ConvertFn = fn(f64) -> f64;

type Entry = (&'static str, &'static str, ConvertFn);

fn entry(from: &'static str, to: &'static str, f: ConvertFn) -> Entry {
    (from, to, f)
}

/// Built-in conversion table
pub struct StandardUnits {
    table: Vec<Entry>,
}

impl StandardUnits {
    /// Create the table with all built-in pairs
    pub fn new() -> Self {
        let table = vec![
            entry("K", "DEGC", |x| x - 273.15),
            entry("DEGC", "K", |x| x + 273.15),
            entry("DEGC", "DEGF", |x| x * 1.8 + 32.0),
            entry("DEGF", "DEGC", |x| (x - 32.0) / 1.8),
            entry("K", "DEGF", |x| (x - 273.15) * 1.8 + 32.0),
            entry("DEGF", "K", |x| (x - 32.0) / 1.8 + 273.15),
            entry("RAD", "DEG", |x| x.to_degrees()),
            entry("DEG", "RAD", |x| x.to_radians()),
            entry("PSIA", "KPA", |x| x * 6.894_757_293_168),
            entry("KPA", "PSIA", |x| x / 6.894_757_293_168),
            entry("V", "MV", |x| x * 1000.0),
            entry("MV", "V", |x| x / 1000.0),
        ];

        Self { table }
    }

    /// All registered `(from, to)` pairs
    pub fn pairs(&self) -> Vec<(&'static str, &'static str)> {
        self.table.iter().map(|&(a, b, _)| (a, b)).collect()
    }
}

impl Default for StandardUnits {
    fn default() -> Self {
        Self::new()
    }
}

impl UnitConverter for StandardUnits {
    fn convert(&self, values: &[f64], unit_from: &str, unit_to: &str) -> Result<Vec<f64>> {
        if unit_from == unit_to {
            return Ok(values.to_vec());
        }
        let f = self
            .table
            .iter()
            .find(|(a, b, _)| *a == unit_from && *b == unit_to)
            .map(|&(_, _, f)| f)
            .ok_or_else(|| {
                TlmError::Conversion(format!("no conversion from {} to {}", unit_from, unit_to))
            })?;
        Ok(values.iter().map(|&x| f(x)).collect())
    }
}

/// Fields that are spreads (differences) rather than levels
fn is_spread_field(field: &str) -> bool {
    field == "stds"
}

/// Convert a computed result from the handler's internal system to `target`.
///
/// Level fields get the full conversion; spread fields (`stds`) only get the
/// linear scale factor, derived by converting `[0, 1]`. Fields named in
/// `convert_attrs` but absent from the result are skipped.
pub fn convert_result(
    result: &mut ComputedResult,
    spec: &UnitSpec,
    target: UnitSystem,
    converter: &dyn UnitConverter,
) -> Result<()> {
    let from = spec.internal_label().to_string();
    let to = spec.label(target).to_string();
    if from == to {
        result.unit = Some(to);
        return Ok(());
    }

    let scale = {
        let ends = converter.convert(&[0.0, 1.0], &from, &to)?;
        ends[1] - ends[0]
    };

    for field in &spec.convert_attrs {
        let slot = if field == "vals" {
            Some(&mut result.vals)
        } else {
            result.extra.get_mut(field.as_str())
        };
        let Some(values) = slot else {
            continue;
        };
        if !values.is_numeric() {
            continue;
        }
        let raw = values.to_f64()?;
        let converted = if is_spread_field(field) {
            raw.iter().map(|&x| x * scale).collect()
        } else {
            converter.convert(&raw, &from, &to)?
        };
        if converted.len() != raw.len() {
            return Err(TlmError::Conversion(format!(
                "converter changed length of {} from {} to {}",
                field,
                raw.len(),
                converted.len()
            )));
        }
        *values = Values::Float(converted);
    }

    tracing::trace!("Converted {} from {} to {}", result.name, from, to);
    result.unit = Some(to);
    Ok(())
}
