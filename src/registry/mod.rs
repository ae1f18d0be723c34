//! Virtual channel registry
//!
//! An ordered, append-only table of `(pattern, handler)` pairs. Resolution
//! is a single first-match scan in registration order; patterns are
//! anchored and case-insensitive.
//!
//! The registry is built once at process start and then shared read-only
//! (usually behind an `Arc`) by the [`Dispatcher`].
//!
//! # Example
//!
//! ```ignore
//! use derived_tlm::registry::Registry;
//!
//! let mut registry = Registry::new();
//! registry.register(r"quat_(aoattqt|aocmdqt|aotarqt|aoatupq)", QuatHandler::new())?;
//! let resolved = registry.resolve("QUAT_AOATTQT")?;
//! assert_eq!(resolved.args, vec![Some("aoattqt".to_string())]);
//! ```

pub mod dispatcher;
pub mod handler;

pub use dispatcher::Dispatcher;
pub use handler::{required_arg, Handler, HandlerContext, PartialResult};

use crate::error::{Result, TlmError};
use regex::{Regex, RegexBuilder};
use std::sync::Arc;

/// One registered virtual channel family
pub struct VirtualChannelSpec {
    /// Pattern as registered (unanchored)
    source: String,
    /// Compiled anchored pattern
    pattern: Regex,
    /// Handler invoked on a match
    handler: Arc<dyn Handler>,
}

impl VirtualChannelSpec {
    /// Pattern as registered
    pub fn source(&self) -> &str {
        &self.source
    }

    /// Handler for this family
    pub fn handler(&self) -> &dyn Handler {
        self.handler.as_ref()
    }

    /// Returns true if `name` matches this spec
    pub fn matches(&self, name: &str) -> bool {
        self.pattern.is_match(name)
    }
}

impl std::fmt::Debug for VirtualChannelSpec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VirtualChannelSpec")
            .field("pattern", &self.source)
            .field("handler", &self.handler.name())
            .finish()
    }
}

/// A successful name resolution
#[derive(Clone)]
pub struct Resolved<'a> {
    /// Registration index of the matching spec
    pub index: usize,
    /// Pattern that matched
    pub pattern: &'a str,
    /// Matching handler
    pub handler: &'a dyn Handler,
    /// Capture groups, lower-cased
    pub args: Vec<Option<String>>,
}

impl std::fmt::Debug for Resolved<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Resolved")
            .field("index", &self.index)
            .field("pattern", &self.pattern)
            .field("handler", &self.handler.name())
            .field("args", &self.args)
            .finish()
    }
}

/// Ordered table of virtual channel specs
#[derive(Debug, Default)]
pub struct Registry {
    specs: Vec<VirtualChannelSpec>,
}

impl Registry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a handler for names fully matching `pattern`
    pub fn register(&mut self, pattern: &str, handler: impl Handler + 'static) -> Result<()> {
        self.register_arc(pattern, Arc::new(handler))
    }

    /// Register a shared handler for names fully matching `pattern`
    pub fn register_arc(&mut self, pattern: &str, handler: Arc<dyn Handler>) -> Result<()> {
        if self.specs.iter().any(|s| s.source == pattern) {
            return Err(TlmError::Config(format!(
                "pattern '{}' is already registered",
                pattern
            )));
        }
        let compiled = RegexBuilder::new(&format!("^(?:{})$", pattern))
            .case_insensitive(true)
            .build()
            .map_err(|e| TlmError::Config(format!("invalid pattern '{}': {}", pattern, e)))?;

        tracing::debug!(
            "Registered virtual channel pattern {} -> {}",
            pattern,
            handler.name()
        );
        self.specs.push(VirtualChannelSpec {
            source: pattern.to_string(),
            pattern: compiled,
            handler,
        });
        Ok(())
    }

    /// Find the first spec fully matching `name`
    pub fn resolve(&self, name: &str) -> Result<Resolved<'_>> {
        for (index, spec) in self.specs.iter().enumerate() {
            let Some(caps) = spec.pattern.captures(name) else {
                continue;
            };
            let args = caps
                .iter()
                .skip(1)
                .map(|m| m.map(|m| m.as_str().to_ascii_lowercase()))
                .collect();
            return Ok(Resolved {
                index,
                pattern: &spec.source,
                handler: spec.handler.as_ref(),
                args,
            });
        }
        Err(TlmError::UnresolvedChannel {
            name: name.to_string(),
        })
    }

    /// Registered specs in registration order
    pub fn specs(&self) -> &[VirtualChannelSpec] {
        &self.specs
    }

    /// Number of registered specs
    pub fn len(&self) -> usize {
        self.specs.len()
    }

    /// Returns true if nothing is registered
    pub fn is_empty(&self) -> bool {
        self.specs.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Named(&'static str);

    impl Handler for Named {
        fn name(&self) -> &str {
            self.0
        }

        fn compute(
            &self,
            _ctx: &HandlerContext<'_>,
            _tstart: f64,
            _tstop: f64,
            _args: &[Option<String>],
        ) -> Result<PartialResult> {
            Ok(PartialResult::default())
        }
    }

    #[test]
    fn test_resolve_case_insensitive_with_captures() {
        let mut registry = Registry::new();
        registry
            .register(r"(pm2thv1t|pm1thv2t)_clean(?:_(\w+))?", Named("valve"))
            .unwrap();

        let r = registry.resolve("PM2THV1T_CLEAN_V3").unwrap();
        assert_eq!(r.handler.name(), "valve");
        assert_eq!(
            r.args,
            vec![Some("pm2thv1t".to_string()), Some("v3".to_string())]
        );

        let r = registry.resolve("pm1thv2t_clean").unwrap();
        assert_eq!(r.args, vec![Some("pm1thv2t".to_string()), None]);
    }

    #[test]
    fn test_resolve_requires_full_match() {
        let mut registry = Registry::new();
        registry.register("pitch_comp", Named("pitch")).unwrap();
        assert!(matches!(
            registry.resolve("xpitch_comp"),
            Err(TlmError::UnresolvedChannel { .. })
        ));
        assert!(registry.resolve("pitch_comp_2").is_err());
    }

    #[test]
    fn test_first_match_wins() {
        let mut registry = Registry::new();
        registry.register(r"cmd_state_(\w+?)_(\d+)", Named("first")).unwrap();
        registry.register(r"cmd_state_\w+", Named("second")).unwrap();
        let r = registry.resolve("cmd_state_pitch_1000").unwrap();
        assert_eq!(r.index, 0);
        assert_eq!(
            r.args,
            vec![Some("pitch".to_string()), Some("1000".to_string())]
        );
    }

    #[test]
    fn test_invalid_and_duplicate_patterns() {
        let mut registry = Registry::new();
        assert!(matches!(
            registry.register("quat_(", Named("bad")),
            Err(TlmError::Config(_))
        ));
        registry.register("roll_comp", Named("roll")).unwrap();
        assert!(registry.register("roll_comp", Named("roll")).is_err());
        assert_eq!(registry.len(), 1);
    }
}
