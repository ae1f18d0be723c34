//! Error handling for the derived-telemetry engine
//!
//! This module defines the error taxonomy shared by every component and a
//! Result alias used throughout the crate.
//!
//! # Taxonomy
//!
//! - **Configuration** errors ([`TlmError::Config`]) are raised while the
//!   registry or the engine configuration is being built.
//! - **Resolution** errors ([`TlmError::UnresolvedChannel`]) are surfaced to
//!   the caller and never retried.
//! - **Contract violations** ([`TlmError::IncompleteResult`]) mean a handler
//!   omitted a mandatory field.
//! - **Data errors** ([`TlmError::NegativeTimeDelta`]) indicate archive
//!   corruption and are always fatal.
//! - **Collaborator** errors ([`TlmError::Fetch`], [`TlmError::Model`]) are
//!   passed through unchanged; retry policy belongs to the collaborator.
//!
//! Errors escaping the dispatcher are wrapped in [`TlmError::Stage`] so the
//! top-level caller sees the channel name and the failing stage.

use thiserror::Error;

/// Processing stage at which a dispatch failed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    /// Matching the channel name against the registry
    Resolution,
    /// Fetching raw telemetry or collaborator data
    Fetch,
    /// Combining streams onto a common time base
    Alignment,
    /// Handler computation
    Compute,
    /// Statistical roll-up
    Aggregation,
    /// Model-guided signal reconciliation
    Reconciliation,
    /// Unit conversion of the result
    Conversion,
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Stage::Resolution => "resolution",
            Stage::Fetch => "fetch",
            Stage::Alignment => "alignment",
            Stage::Compute => "compute",
            Stage::Aggregation => "aggregation",
            Stage::Reconciliation => "reconciliation",
            Stage::Conversion => "conversion",
        };
        f.write_str(name)
    }
}

/// Main error type for derived-telemetry operations
#[derive(Error, Debug)]
pub enum TlmError {
    /// Registry or engine configuration problems
    #[error("Configuration error: {0}")]
    Config(String),

    /// No registered pattern matches the requested channel
    #[error("Unresolved channel: no virtual channel matches '{name}'")]
    UnresolvedChannel { name: String },

    /// Handler result is missing one or more mandatory fields
    #[error("Incomplete result for '{name}': missing {}", missing.join(", "))]
    IncompleteResult { name: String, missing: Vec<&'static str> },

    /// Out-of-order timestamps found during statistics aggregation
    #[error("Negative time delta {dt:.3}s in {msid} at {date}")]
    NegativeTimeDelta { msid: String, date: String, dt: f64 },

    /// The operational-mode signal has no samples in the requested range
    #[error("No telemetry for {msid} between {start} and {stop}")]
    NoTelemetry {
        msid: String,
        start: String,
        stop: String,
    },

    /// Parallel arrays that must share a length do not
    #[error("Length mismatch: {0}")]
    LengthMismatch(String),

    /// Unit conversion lookup or application failure
    #[error("Unit conversion error: {0}")]
    Conversion(String),

    /// Raw telemetry fetch failure
    #[error("Fetch error for {msid}: {message}")]
    Fetch { msid: String, message: String },

    /// Model evaluation failure
    #[error("Model error: {0}")]
    Model(String),

    /// The query service has shut down or a worker went away
    #[error("Query service is not running")]
    ServiceStopped,

    /// Errors related to Rhai script execution
    #[error("Script error: {0}")]
    Script(String),

    /// Values of the wrong kind for the requested operation
    #[error("Unsupported value kind: {0}")]
    UnsupportedValues(String),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization errors
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Error annotated with the channel and the stage where it occurred
    #[error("{channel} [{stage}]: {source}")]
    Stage {
        channel: String,
        stage: Stage,
        #[source]
        source: Box<TlmError>,
    },

    /// Generic errors with context
    #[error("{context}: {source}")]
    WithContext {
        context: String,
        #[source]
        source: Box<TlmError>,
    },
}

impl TlmError {
    /// Add context to an error
    pub fn with_context(self, context: impl Into<String>) -> Self {
        TlmError::WithContext {
            context: context.into(),
            source: Box::new(self),
        }
    }

    /// Tag an error with the channel and stage it came from.
    ///
    /// Errors already tagged keep their original (innermost) stage; a
    /// different outer channel name is added as context.
    pub fn at_stage(self, channel: impl Into<String>, stage: Stage) -> Self {
        let channel = channel.into();
        match self {
            TlmError::Stage {
                channel: ref inner, ..
            } if *inner == channel => self,
            TlmError::WithContext {
                context: ref outer, ..
            } if *outer == channel && self.stage().is_some() => self,
            TlmError::Stage { .. } | TlmError::WithContext { .. } if self.stage().is_some() => {
                self.with_context(channel)
            }
            other => TlmError::Stage {
                channel,
                stage,
                source: Box::new(other),
            },
        }
    }

    /// Stage recorded on this error, if any
    pub fn stage(&self) -> Option<Stage> {
        match self {
            TlmError::Stage { stage, .. } => Some(*stage),
            TlmError::WithContext { source, .. } => source.stage(),
            _ => None,
        }
    }

    /// Innermost error, with stage and context wrappers removed
    pub fn root(&self) -> &TlmError {
        match self {
            TlmError::Stage { source, .. } | TlmError::WithContext { source, .. } => source.root(),
            other => other,
        }
    }

    /// Create a script error from a Rhai error
    pub fn from_rhai_error(err: Box<rhai::EvalAltResult>) -> Self {
        TlmError::Script(err.to_string())
    }
}

impl From<serde_json::Error> for TlmError {
    fn from(err: serde_json::Error) -> Self {
        TlmError::Serialization(err.to_string())
    }
}

/// Result type alias for derived-telemetry operations
pub type Result<T> = std::result::Result<T, TlmError>;

/// Extension trait for adding context to Results
pub trait ResultExt<T> {
    /// Add context to an error result
    fn context(self, context: impl Into<String>) -> Result<T>;

    /// Add context lazily to an error result
    fn with_context<F>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> String;

    /// Tag an error result with channel name and stage
    fn at_stage(self, channel: &str, stage: Stage) -> Result<T>;
}

impl<T> ResultExt<T> for Result<T> {
    fn context(self, context: impl Into<String>) -> Result<T> {
        self.map_err(|e| e.with_context(context))
    }

    fn with_context<F>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> String,
    {
        self.map_err(|e| e.with_context(f()))
    }

    fn at_stage(self, channel: &str, stage: Stage) -> Result<T> {
        self.map_err(|e| e.at_stage(channel, stage))
    }
}

impl<T> ResultExt<T> for std::result::Result<T, Box<rhai::EvalAltResult>> {
    fn context(self, context: impl Into<String>) -> Result<T> {
        self.map_err(|e| TlmError::from_rhai_error(e).with_context(context))
    }

    fn with_context<F>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> String,
    {
        self.map_err(|e| TlmError::from_rhai_error(e).with_context(f()))
    }

    fn at_stage(self, channel: &str, stage: Stage) -> Result<T> {
        self.map_err(|e| TlmError::from_rhai_error(e).at_stage(channel, stage))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = TlmError::UnresolvedChannel {
            name: "not_a_channel".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "Unresolved channel: no virtual channel matches 'not_a_channel'"
        );
    }

    #[test]
    fn test_incomplete_result_lists_fields() {
        let err = TlmError::IncompleteResult {
            name: "quat_aoattqt".to_string(),
            missing: vec!["bads", "unit"],
        };
        assert!(err.to_string().contains("bads, unit"));
    }

    #[test]
    fn test_stage_wrapping_keeps_innermost() {
        let err = TlmError::Model("no such node".to_string())
            .at_stage("pm2thv1t_clean", Stage::Reconciliation)
            .at_stage("pm2thv1t_clean", Stage::Compute);
        assert_eq!(err.stage(), Some(Stage::Reconciliation));
        assert!(err.to_string().contains("pm2thv1t_clean [reconciliation]"));
        assert!(matches!(err.root(), TlmError::Model(_)));
    }

    #[test]
    fn test_outer_channel_added_as_context() {
        let err = TlmError::Fetch {
            msid: "aoattqt1".to_string(),
            message: "timeout".to_string(),
        }
        .at_stage("aoattqt1", Stage::Fetch)
        .at_stage("quat_aoattqt", Stage::Compute)
        .at_stage("quat_aoattqt", Stage::Compute);
        assert_eq!(err.stage(), Some(Stage::Fetch));
        assert_eq!(
            err.to_string(),
            "quat_aoattqt: aoattqt1 [fetch]: Fetch error for aoattqt1: timeout"
        );
    }

    #[test]
    fn test_error_with_context() {
        let err = TlmError::Config("bad pattern".to_string());
        let with_ctx = err.with_context("Failed to build registry");
        assert!(with_ctx.to_string().contains("Failed to build registry"));
        assert!(matches!(with_ctx.root(), TlmError::Config(_)));
    }
}
