//! Common test utilities and helpers

#![allow(dead_code)] // Test utilities may not all be used in every test file

pub mod builders;

use derived_tlm::backend::{MemoryArchive, MemoryStates, TabulatedModel};
use derived_tlm::handlers::register_defaults;
use derived_tlm::registry::{Dispatcher, Registry};
use derived_tlm::EngineConfig;
use std::sync::Arc;

/// Assert two floats are approximately equal
pub fn assert_float_eq(a: f64, b: f64, epsilon: f64) {
    assert!(
        (a - b).abs() < epsilon,
        "Expected {} to be approximately equal to {} (epsilon: {})",
        a,
        b,
        epsilon
    );
}

/// Dispatcher with every built-in handler over in-memory collaborators
pub fn dispatcher(
    archive: MemoryArchive,
    model: TabulatedModel,
    states: MemoryStates,
    config: EngineConfig,
) -> Dispatcher {
    let mut registry = Registry::new();
    register_defaults(&mut registry, &config).expect("default handlers register");
    Dispatcher::new(Arc::new(registry), Arc::new(archive), config)
        .with_model(Arc::new(model))
        .with_states(Arc::new(states))
}

/// Dispatcher over an archive only, with the default configuration
pub fn archive_dispatcher(archive: MemoryArchive) -> Dispatcher {
    dispatcher(
        archive,
        TabulatedModel::new(),
        MemoryStates::new(),
        EngineConfig::default(),
    )
}
