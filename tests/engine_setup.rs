//! Engine construction from configuration
//!
//! Builds dispatchers the way the binary does (config file, default
//! handlers, in-memory collaborators) and checks that configuration
//! choices reach the dispatched results.

mod common;

use common::builders::StreamBuilder;
use derived_tlm::backend::{MemoryArchive, MemoryStates, TabulatedModel};
use derived_tlm::{EngineConfig, TlmError, Values};
use std::io::Write;

fn ephemeris_archive() -> MemoryArchive {
    [
        StreamBuilder::new("lunarephem0_z")
            .regular(0.0, 60.0, 20)
            .values_fn(|t| t * 10.0)
            .unit("M")
            .build(),
        StreamBuilder::new("lunarephem1_z")
            .regular(300.0, 60.0, 5)
            .values_fn(|t| t * 20.0)
            .unit("M")
            .build(),
    ]
    .into_iter()
    .collect()
}

#[test]
fn test_config_file_defines_script_channel() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    write!(
        file,
        r#"
[[script_channels]]
name = "DP_SCALED"
inputs = ["tephin"]
expression = "tephin * 0.5"
unit = "K"
"#
    )
    .unwrap();

    let config = EngineConfig::load(Some(file.path())).unwrap();
    assert_eq!(config.script_channels.len(), 1);

    let archive: MemoryArchive = [StreamBuilder::new("tephin")
        .regular(0.0, 10.0, 10)
        .constant(300.0)
        .unit("K")
        .build()]
    .into_iter()
    .collect();
    let dispatcher = common::dispatcher(archive, TabulatedModel::new(), MemoryStates::new(), config);

    let result = dispatcher.dispatch("dp_scaled", 0.0, 100.0, None, None).unwrap();
    assert_eq!(result.vals, Values::Float(vec![150.0; 10]));
    assert_eq!(result.unit.as_deref(), Some("K"));
}

#[test]
fn test_bad_expression_fails_at_startup() {
    let mut config = EngineConfig::default();
    config.script_channels.push(derived_tlm::config::ScriptChannel {
        name: "dp_broken".to_string(),
        inputs: vec!["tephin".to_string()],
        expression: "tephin *".to_string(),
        unit: None,
    });

    let mut registry = derived_tlm::Registry::new();
    let err = derived_tlm::handlers::register_defaults(&mut registry, &config).unwrap_err();
    assert!(matches!(err.root(), TlmError::Script(_)));
    assert!(err.to_string().contains("dp_broken"));
}

#[test]
fn test_caches_do_not_change_results() {
    let mut uncached = EngineConfig::default();
    uncached.cache.ephemeris = false;

    let cached = common::archive_dispatcher(ephemeris_archive());
    let plain = common::dispatcher(
        ephemeris_archive(),
        TabulatedModel::new(),
        MemoryStates::new(),
        uncached,
    );

    for (tstart, tstop) in [(0.0, 1200.0), (0.0, 1200.0), (120.0, 600.0)] {
        let a = cached
            .dispatch("dp_lunarephem_z", tstart, tstop, None, None)
            .unwrap();
        let b = plain
            .dispatch("dp_lunarephem_z", tstart, tstop, None, None)
            .unwrap();
        assert_eq!(a, b);
    }

    let full = cached
        .dispatch("dp_lunarephem_z", 0.0, 1200.0, None, None)
        .unwrap();
    assert_eq!(full.unit.as_deref(), Some("KM"));
    // Definitive samples cover 300..=540, predictive fills the rest
    assert_eq!(full.len(), 5 + 5 + 10);
}
