//! Expression-defined derived channels
//!
//! Each configured [`ScriptChannel`] becomes one virtual channel matched by
//! its exact name. Inputs are fetched with high-rate padding, aligned by
//! nearest neighbour on the first input's times with bad-flag union, and the
//! expression is evaluated once per aligned sample.

use crate::analysis::align::AlignTimes;
use crate::config::ScriptChannel;
use crate::error::{Result, ResultExt, Stage};
use crate::registry::{Handler, HandlerContext, PartialResult};
use crate::scripting::{CompiledExpression, ScriptEngine};
use crate::types::{SampleStream, Values};
use std::sync::Arc;

/// Handler for one configured script channel
#[derive(Debug)]
pub struct ScriptHandler {
    name: String,
    inputs: Vec<String>,
    unit: Option<String>,
    engine: Arc<ScriptEngine>,
    expr: CompiledExpression,
}

impl ScriptHandler {
    /// Compile the channel's expression; a syntax error is a configuration error
    pub fn new(channel: &ScriptChannel, engine: Arc<ScriptEngine>) -> Result<Self> {
        let name = channel.name.to_ascii_lowercase();
        let expr = engine
            .compile(&name, &channel.expression)
            .map_err(|e| e.with_context(format!("script channel {}", name)))?;
        Ok(Self {
            inputs: channel.inputs.iter().map(|m| m.to_ascii_lowercase()).collect(),
            unit: channel.unit.clone(),
            name,
            engine,
            expr,
        })
    }

    /// Registry pattern matching exactly this channel's name
    pub fn pattern(&self) -> String {
        regex::escape(&self.name)
    }
}

impl Handler for ScriptHandler {
    fn name(&self) -> &str {
        "script"
    }

    fn compute(
        &self,
        ctx: &HandlerContext<'_>,
        tstart: f64,
        tstop: f64,
        _args: &[Option<String>],
    ) -> Result<PartialResult> {
        let pad = ctx.config.padding.high_rate;
        let raw = ctx
            .fetch
            .fetch_set(&self.inputs, tstart - pad, tstop + pad)
            .at_stage(&self.name, Stage::Fetch)?;
        let aligned = raw
            .interpolate_nearest(AlignTimes::Reference(0), true)
            .at_stage(&self.name, Stage::Alignment)?;

        let streams = aligned.into_streams();
        let columns = streams
            .iter()
            .map(SampleStream::f64_values)
            .collect::<Result<Vec<_>>>()?;
        let (times, bads) = match streams.first() {
            Some(s) => (s.times.clone(), s.bads.clone()),
            None => (Vec::new(), Vec::new()),
        };

        let values = self
            .engine
            .execute_series(&self.expr, &self.inputs, &columns, &times)?;
        tracing::debug!("{}: evaluated {} samples", self.name, values.len());

        let stream = SampleStream::new(
            self.name.clone(),
            times,
            Values::Float(values),
            bads,
            self.unit.clone(),
        )?
        .time_slice(tstart, tstop);
        Ok(PartialResult::from_stream(stream))
    }
}
