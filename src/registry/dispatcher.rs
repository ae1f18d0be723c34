//! Dispatcher: the entry point for virtual channel queries
//!
//! `dispatch` resolves a name, runs the matched handler (directly or through
//! the statistics roll-up), validates the result and converts units. Every
//! error leaving the dispatcher carries the channel name and the stage that
//! failed.

use super::handler::HandlerContext;
use super::Registry;
use crate::analysis::stats::aggregate;
use crate::backend::{CommandStates, MemoryStates, RawFetch, TabulatedModel, ThermalModel};
use crate::config::EngineConfig;
use crate::error::{Result, ResultExt, Stage, TlmError};
use crate::types::{ComputedResult, StatInterval, UnitSpec, UnitSystem};
use crate::units::{convert_result, StandardUnits, UnitConverter};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Output fields of a statistics query that carry levels of the quantity
const STATS_LEVEL_FIELDS: [&str; 5] = ["vals", "midvals", "mins", "maxes", "means"];

static NEXT_SOURCE: AtomicU64 = AtomicU64::new(1);

/// Fresh identity for a collaborator set
fn next_source() -> u64 {
    NEXT_SOURCE.fetch_add(1, Ordering::Relaxed)
}

/// Resolves and evaluates virtual channels
pub struct Dispatcher {
    registry: Arc<Registry>,
    fetch: Arc<dyn RawFetch>,
    model: Arc<dyn ThermalModel>,
    states: Arc<dyn CommandStates>,
    units: Arc<dyn UnitConverter>,
    config: Arc<EngineConfig>,
    source: u64,
}

impl Dispatcher {
    /// Create a dispatcher with empty model and state collaborators and the
    /// built-in unit table
    pub fn new(registry: Arc<Registry>, fetch: Arc<dyn RawFetch>, config: EngineConfig) -> Self {
        Self {
            registry,
            fetch,
            model: Arc::new(TabulatedModel::new()),
            states: Arc::new(MemoryStates::new()),
            units: Arc::new(StandardUnits::new()),
            config: Arc::new(config),
            source: next_source(),
        }
    }

    /// Use a thermal model collaborator
    pub fn with_model(mut self, model: Arc<dyn ThermalModel>) -> Self {
        self.model = model;
        self.source = next_source();
        self
    }

    /// Use a commanded-state collaborator
    pub fn with_states(mut self, states: Arc<dyn CommandStates>) -> Self {
        self.states = states;
        self.source = next_source();
        self
    }

    /// Use a units collaborator
    pub fn with_units(mut self, units: Arc<dyn UnitConverter>) -> Self {
        self.units = units;
        self.source = next_source();
        self
    }

    /// The registry this dispatcher resolves against
    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Engine configuration
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    fn context(&self) -> HandlerContext<'_> {
        HandlerContext {
            fetch: self.fetch.as_ref(),
            model: self.model.as_ref(),
            states: self.states.as_ref(),
            units: self.units.as_ref(),
            config: &self.config,
            source: self.source,
        }
    }

    /// Evaluate `name` over `[tstart, tstop)`.
    ///
    /// With an `interval` the full-resolution result is computed over the
    /// covering bins, bad samples are dropped and the statistics roll-up is
    /// returned instead. With a `unit_system` (or a configured default) and a
    /// handler unit declaration, the result is converted to that system.
    pub fn dispatch(
        &self,
        name: &str,
        tstart: f64,
        tstop: f64,
        interval: Option<StatInterval>,
        unit_system: Option<UnitSystem>,
    ) -> Result<ComputedResult> {
        let name = name.to_ascii_lowercase();
        if tstop < tstart {
            return Err(TlmError::Config(format!(
                "stop time {} precedes start time {}",
                tstop, tstart
            ))
            .at_stage(&name, Stage::Resolution));
        }

        let resolved = self.registry.resolve(&name).at_stage(&name, Stage::Resolution)?;
        let handler = resolved.handler;
        tracing::debug!(
            "Dispatching {} to {} (args {:?}, interval {:?})",
            name,
            handler.name(),
            resolved.args,
            interval
        );

        let ctx = self.context();
        let mut result = match interval {
            None => handler
                .compute(&ctx, tstart, tstop, &resolved.args)
                .and_then(|partial| partial.into_result(&name))
                .at_stage(&name, Stage::Compute)?,
            Some(interval) => {
                if !handler.is_stats_capable() {
                    return Err(TlmError::Config(format!(
                        "{} does not support {} statistics",
                        handler.name(),
                        interval
                    ))
                    .at_stage(&name, Stage::Aggregation));
                }
                let dt = self.config.stats.dt(interval);
                let t0 = (tstart / dt).floor() * dt;
                let t1 = (tstop / dt).ceil() * dt;
                let (stream, _) = handler
                    .compute(&ctx, t0, t1, &resolved.args)
                    .and_then(|partial| partial.into_parts(&name))
                    .at_stage(&name, Stage::Compute)?;

                let good = stream.filter_bad();
                let summary = aggregate(
                    &good,
                    dt,
                    interval.has_spread(),
                    self.config.stats.weight_clamp(),
                )
                .at_stage(&name, Stage::Aggregation)?;
                summary.into_result(&name, stream.unit.clone(), interval)
            }
        };

        let target = unit_system.or(self.config.units.default_system);
        if let (Some(spec), Some(target)) = (handler.unit_spec(), target) {
            let spec = if interval.is_some() {
                stats_unit_spec(spec)
            } else {
                spec.clone()
            };
            convert_result(&mut result, &spec, target, self.units.as_ref())
                .at_stage(&name, Stage::Conversion)?;
        }

        tracing::debug!("{}: {} samples ({:?})", name, result.len(), result.unit);
        Ok(result)
    }
}

impl std::fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dispatcher")
            .field("registry", &self.registry)
            .finish_non_exhaustive()
    }
}

/// Unit spec for the roll-up of a channel whose values are converted
fn stats_unit_spec(spec: &UnitSpec) -> UnitSpec {
    let mut out = spec.clone();
    if spec.convert_attrs.iter().any(|a| a == "vals") {
        out.convert_attrs = STATS_LEVEL_FIELDS.iter().map(|s| s.to_string()).collect();
        out.convert_attrs.push("stds".to_string());
        out.convert_attrs
            .extend(crate::analysis::stats::QUANTILES.iter().map(|q| format!("p{:02}s", q)));
    }
    out
}
