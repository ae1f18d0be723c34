//! Rhai Scripting Engine for Derived-Channel Expressions
//!
//! This module lets a configuration define a virtual channel as an
//! expression over other channels, evaluated once per aligned sample.
//!
//! ## Dynamic Variables
//!
//! The following variables and functions are available in expressions:
//!
//! - `<msid>` - Every input channel, bound by its lower-case name
//! - `time()` - Sample time in CXC seconds
//!
//! ## Example Expressions
//!
//! Difference of two thermistors:
//! ```rhai
//! tephin - tcylaft6
//! ```
//!
//! Vector magnitude of the sun-sensor components:
//! ```rhai
//! sqrt(aosunsa1 * aosunsa1 + aosunsa2 * aosunsa2 + aosunsa3 * aosunsa3)
//! ```
//!
//! Converting raw counts with a two-point calibration:
//! ```rhai
//! map_range(pm2thv1t, 0.0, 255.0, -40.0, 260.0)
//! ```

mod engine;

pub use engine::ScriptEngine;

use rhai::AST;

/// A channel expression compiled once at registration
#[derive(Clone)]
pub struct CompiledExpression {
    ast: AST,
    name: String,
}

impl CompiledExpression {
    /// Channel this expression defines
    pub fn name(&self) -> &str {
        &self.name
    }

    pub(crate) fn ast(&self) -> &AST {
        &self.ast
    }
}

impl std::fmt::Debug for CompiledExpression {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CompiledExpression")
            .field("name", &self.name)
            .finish()
    }
}
