//! # derived-tlm: Derived-Telemetry Computation Engine
//!
//! Computes virtual telemetry channels on demand from raw spacecraft
//! telemetry, commanded states, ephemerides and thermal model predictions.
//! A caller asks for a channel by name over a time range; the engine matches
//! the name against a registry of patterns, runs the matching handler and
//! returns time-tagged values with bad-data flags, optionally rolled up into
//! interval statistics and converted to another unit system.
//!
//! ## Architecture
//!
//! - **Registry / Dispatcher**: Ordered `(pattern, handler)` table and the
//!   entry point that resolves, computes, validates and converts
//! - **Handlers**: One plugin per channel family (quaternions, commanded
//!   states, ephemeris, pitch/roll, valve cleaning, scripted channels)
//! - **Analysis**: Time-series alignment, statistics roll-up and
//!   model-guided signal reconciliation
//! - **Backend**: Collaborator traits (raw fetch, thermal model, commanded
//!   states) and in-memory implementations
//! - **Service**: Worker pool answering queries over crossbeam channels
//!
//! ## Configuration
//!
//! Engine settings are read from `config.toml` in the platform-appropriate
//! config directory under `derived-tlm` (see [`config`]).
//!
//! ## Example
//!
//! ```ignore
//! use derived_tlm::{
//!     backend::ArchiveSnapshot,
//!     config::EngineConfig,
//!     handlers::register_defaults,
//!     registry::{Dispatcher, Registry},
//! };
//! use std::sync::Arc;
//!
//! let config = EngineConfig::load_or_default(None);
//! let (archive, model, states) = ArchiveSnapshot::load_json("snapshot.json".as_ref())?
//!     .into_collaborators();
//!
//! let mut registry = Registry::new();
//! register_defaults(&mut registry, &config)?;
//!
//! let dispatcher = Dispatcher::new(Arc::new(registry), Arc::new(archive), config)
//!     .with_model(Arc::new(model))
//!     .with_states(Arc::new(states));
//! let result = dispatcher.dispatch("pitch_comp", t0, t1, None, None)?;
//! ```

pub mod analysis;
pub mod backend;
pub mod cache;
pub mod config;
pub mod error;
pub mod handlers;
pub mod registry;
pub mod scripting;
pub mod service;
pub mod time;
pub mod types;
pub mod units;

// Re-export commonly used types
pub use config::EngineConfig;
pub use error::{Result, Stage, TlmError};
pub use registry::{Dispatcher, Handler, Registry};
pub use service::{Query, QueryService};
pub use types::{ComputedResult, SampleStream, StatInterval, UnitSystem, Values};
