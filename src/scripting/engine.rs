//! Rhai Script Engine Implementation
//!
//! This module provides the engine that evaluates derived-channel
//! expressions. Input channels are pushed into the scope by name before each
//! evaluation; `time()` reads the sample time of the current evaluation.

use crate::error::{Result, TlmError};
use crate::scripting::CompiledExpression;
use rhai::{Dynamic, Engine, Scope};
use std::cell::Cell;
use std::collections::HashMap;
use std::sync::RwLock;

thread_local! {
    // Evaluation is synchronous, so each worker thread sees only its own
    // current sample time
    static SAMPLE_TIME: Cell<f64> = const { Cell::new(f64::NAN) };
}

/// The script engine for derived-channel expressions
pub struct ScriptEngine {
    /// The Rhai engine instance
    engine: Engine,
    /// Compiled expressions keyed by source text
    compiled: RwLock<HashMap<String, CompiledExpression>>,
}

impl ScriptEngine {
    /// Create a new script engine with default configuration
    pub fn new() -> Self {
        let mut engine = Engine::new();
        Self::configure_engine(&mut engine);
        Self {
            engine,
            compiled: RwLock::new(HashMap::new()),
        }
    }

    /// Configure the Rhai engine with built-in functions and safety limits
    fn configure_engine(engine: &mut Engine) {
        // Set safety limits
        engine.set_max_expr_depths(64, 64);
        engine.set_max_call_levels(32);
        engine.set_max_operations(10_000);
        engine.set_max_string_size(10_000);
        engine.set_max_array_size(1_000);
        engine.set_max_map_size(1_000);

        engine.register_fn("time", || -> f64 { SAMPLE_TIME.with(Cell::get) });

        // ===== Mathematical Functions =====

        engine.register_fn("abs", |x: f64| x.abs());
        engine.register_fn("sqrt", |x: f64| x.sqrt());
        engine.register_fn("pow", |x: f64, y: f64| x.powf(y));
        engine.register_fn("exp", |x: f64| x.exp());
        engine.register_fn("ln", |x: f64| x.ln());
        engine.register_fn("log10", |x: f64| x.log10());
        engine.register_fn("sin", |x: f64| x.sin());
        engine.register_fn("cos", |x: f64| x.cos());
        engine.register_fn("tan", |x: f64| x.tan());
        engine.register_fn("asin", |x: f64| x.asin());
        engine.register_fn("acos", |x: f64| x.acos());
        engine.register_fn("atan", |x: f64| x.atan());
        engine.register_fn("atan2", |y: f64, x: f64| y.atan2(x));
        engine.register_fn("degrees", |x: f64| x.to_degrees());
        engine.register_fn("radians", |x: f64| x.to_radians());

        // Rounding functions
        engine.register_fn("floor", |x: f64| x.floor());
        engine.register_fn("ceil", |x: f64| x.ceil());
        engine.register_fn("round", |x: f64| x.round());

        // Clamping and limiting
        engine.register_fn("clamp", |x: f64, min: f64, max: f64| x.clamp(min, max));
        engine.register_fn("min", |a: f64, b: f64| a.min(b));
        engine.register_fn("max", |a: f64, b: f64| a.max(b));

        // Constants
        engine.register_fn("pi", || std::f64::consts::PI);

        // Utility functions
        engine.register_fn("is_nan", |x: f64| x.is_nan());
        engine.register_fn("is_finite", |x: f64| x.is_finite());

        // Map value from one range to another
        engine.register_fn(
            "map_range",
            |x: f64, in_min: f64, in_max: f64, out_min: f64, out_max: f64| {
                (x - in_min) * (out_max - out_min) / (in_max - in_min) + out_min
            },
        );
    }

    /// Compile an expression, reusing an earlier compilation of the same
    /// source. Statements are rejected; only a single expression is allowed.
    pub fn compile(&self, name: &str, source: &str) -> Result<CompiledExpression> {
        let lock_err = |e: String| TlmError::Script(format!("expression cache lock poisoned: {}", e));

        if let Some(expr) = self
            .compiled
            .read()
            .map_err(|e| lock_err(e.to_string()))?
            .get(source)
        {
            tracing::trace!("Reusing compiled expression for {}", name);
            return Ok(CompiledExpression {
                ast: expr.ast().clone(),
                name: name.to_string(),
            });
        }

        let ast = self
            .engine
            .compile_expression(source)
            .map_err(|e| TlmError::Script(format!("Compilation error in {}: {}", name, e)))?;
        let expr = CompiledExpression {
            ast,
            name: name.to_string(),
        };
        self.compiled
            .write()
            .map_err(|e| lock_err(e.to_string()))?
            .insert(source.to_string(), expr.clone());
        Ok(expr)
    }

    /// Number of distinct compiled sources
    pub fn compiled_count(&self) -> usize {
        self.compiled.read().map(|c| c.len()).unwrap_or(0)
    }

    /// Evaluate an expression for one sample
    pub fn execute(
        &self,
        expr: &CompiledExpression,
        inputs: &[(&str, f64)],
        time: f64,
    ) -> Result<f64> {
        SAMPLE_TIME.with(|t| t.set(time));

        let mut scope = Scope::new();
        for (name, value) in inputs {
            scope.push_constant(*name, *value);
        }

        let value = self
            .engine
            .eval_ast_with_scope::<Dynamic>(&mut scope, expr.ast())
            .map_err(|e| TlmError::Script(format!("Execution error in {}: {}", expr.name(), e)))?;

        if let Ok(f) = value.as_float() {
            Ok(f)
        } else if let Ok(i) = value.as_int() {
            Ok(i as f64)
        } else if let Ok(b) = value.as_bool() {
            Ok(if b { 1.0 } else { 0.0 })
        } else {
            Err(TlmError::Script(format!(
                "{} must return a numeric value, got {}",
                expr.name(),
                value.type_name()
            )))
        }
    }

    /// Evaluate an expression at every sample of aligned input columns
    pub fn execute_series(
        &self,
        expr: &CompiledExpression,
        names: &[String],
        columns: &[Vec<f64>],
        times: &[f64],
    ) -> Result<Vec<f64>> {
        if names.len() != columns.len() || columns.iter().any(|c| c.len() != times.len()) {
            return Err(TlmError::LengthMismatch(format!(
                "{}: {} names, {} columns, {} times",
                expr.name(),
                names.len(),
                columns.len(),
                times.len()
            )));
        }

        let mut inputs: Vec<(&str, f64)> = names.iter().map(|n| (n.as_str(), 0.0)).collect();
        let mut out = Vec::with_capacity(times.len());
        for (i, &t) in times.iter().enumerate() {
            for (slot, column) in inputs.iter_mut().zip(columns) {
                slot.1 = column[i];
            }
            out.push(self.execute(expr, &inputs, t)?);
        }
        Ok(out)
    }
}

impl Default for ScriptEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for ScriptEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScriptEngine")
            .field("compiled", &self.compiled_count())
            .finish()
    }
}
