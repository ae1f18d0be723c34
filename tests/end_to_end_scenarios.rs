//! End-to-end scenarios for the built-in handlers
//!
//! Each test builds an in-memory archive (plus model tables and commanded
//! states where needed), registers the default handlers and dispatches by
//! channel name, the way a caller would.

mod common;

use common::assert_float_eq;
use common::builders::{model_table, state_table, StreamBuilder};
use derived_tlm::backend::{MemoryArchive, MemoryStates, TabulatedModel};
use derived_tlm::config::ScriptChannel;
use derived_tlm::{
    EngineConfig, Query, QueryService, SampleStream, Stage, StatInterval, TlmError, UnitSystem,
    Values,
};
use std::sync::Arc;

// ==================== Commanded states ====================

#[test]
fn test_cmd_state_spacing_is_exact() {
    let t0 = 1_025_000.0;
    let states: MemoryStates = [state_table(
        "pitch",
        &[(0.0, t0 + 3000.0, 90.0), (t0 + 3000.0, 2.0e7, 150.0)],
    )]
    .into_iter()
    .collect();
    let dispatcher = common::dispatcher(
        MemoryArchive::new(),
        TabulatedModel::new(),
        states,
        EngineConfig::default(),
    );

    let result = dispatcher
        .dispatch("cmd_state_pitch_1000", t0, t0 + 7200.0, None, None)
        .unwrap();

    assert_eq!(result.len(), 8);
    for pair in result.times.windows(2) {
        assert_eq!(pair[1] - pair[0], 1025.0);
    }
    assert!(result.times.iter().all(|t| t % 1025.0 == 0.0));
    let vals = result.vals.to_f64().unwrap();
    assert_eq!(vals[0], 90.0);
    assert_eq!(vals[2], 90.0);
    assert_eq!(vals[3], 150.0);
    assert!(result.bads.iter().all(|&b| !b));
}

#[test]
fn test_cmd_state_without_intervals_is_bad() {
    let states: MemoryStates = [state_table("pitch", &[(0.0, 10.0, 90.0)])]
        .into_iter()
        .collect();
    let dispatcher = common::dispatcher(
        MemoryArchive::new(),
        TabulatedModel::new(),
        states,
        EngineConfig::default(),
    );

    let result = dispatcher
        .dispatch("cmd_state_pitch_10", 1000.0, 1100.0, None, None)
        .unwrap();
    assert!(!result.is_empty());
    assert!(result.bads.iter().all(|&b| b));
}

#[test]
fn test_cmd_state_frame_count_out_of_range() {
    let states: MemoryStates = [state_table("pitch", &[(0.0, 1.0e6, 90.0)])]
        .into_iter()
        .collect();
    let dispatcher = common::dispatcher(
        MemoryArchive::new(),
        TabulatedModel::new(),
        states,
        EngineConfig::default(),
    );

    for name in ["cmd_state_pitch_100000000000000000", "cmd_state_pitch_0"] {
        let err = dispatcher.dispatch(name, 0.0, 1000.0, None, None).unwrap_err();
        assert_eq!(err.stage(), Some(Stage::Compute), "{}", name);
        assert!(matches!(err.root(), TlmError::Config(_)), "{}", name);
    }
}

// ==================== Quaternions ====================

fn quaternion_archive() -> MemoryArchive {
    // Slowly rotating about Z, deliberately not unit-norm
    let half_angle = |t: f64| 0.001 * t;
    [
        StreamBuilder::new("aoattqt1").regular(0.0, 1.0, 100).constant(0.0).build(),
        StreamBuilder::new("aoattqt2").regular(0.0, 1.0, 100).constant(0.0).build(),
        StreamBuilder::new("aoattqt3")
            .regular(0.0, 1.0, 100)
            .values_fn(move |t| 1.001 * half_angle(t).sin())
            .bad_at(50)
            .build(),
        StreamBuilder::new("aoattqt4")
            .regular(0.0, 1.0, 100)
            .values_fn(move |t| 1.001 * half_angle(t).cos())
            .build(),
    ]
    .into_iter()
    .collect()
}

#[test]
fn test_quaternions_unit_norm_with_bad_union() {
    let dispatcher = common::archive_dispatcher(quaternion_archive());
    let result = dispatcher
        .dispatch("QUAT_AOATTQT", 10.0, 90.0, None, None)
        .unwrap();

    assert_eq!(result.len(), 80);
    let Values::Quat(quats) = &result.vals else {
        panic!("expected quaternions, got {}", result.vals.kind());
    };
    for q in quats {
        let norm = q.iter().map(|x| x * x).sum::<f64>().sqrt();
        assert_float_eq(norm, 1.0, 1e-8);
    }

    let bad_times: Vec<f64> = result
        .times
        .iter()
        .zip(&result.bads)
        .filter(|(_, b)| **b)
        .map(|(&t, _)| t)
        .collect();
    assert_eq!(bad_times, vec![50.0]);
}

#[test]
fn test_quaternions_reject_statistics() {
    let dispatcher = common::archive_dispatcher(quaternion_archive());
    let err = dispatcher
        .dispatch("quat_aoattqt", 0.0, 100.0, Some(StatInterval::Short), None)
        .unwrap_err();
    assert_eq!(err.stage(), Some(Stage::Aggregation));
}

#[test]
fn test_missing_component_is_fetch_error() {
    let mut archive = quaternion_archive();
    archive.insert(StreamBuilder::new("aocmdqt1").regular(0.0, 1.0, 10).build());
    let dispatcher = common::archive_dispatcher(archive);

    let err = dispatcher
        .dispatch("quat_aocmdqt", 0.0, 10.0, None, None)
        .unwrap_err();
    assert_eq!(err.stage(), Some(Stage::Fetch));
    assert!(matches!(err.root(), TlmError::Fetch { .. }));
    assert!(err.to_string().starts_with("quat_aocmdqt"));
}

// ==================== Ephemeris ====================

#[test]
fn test_ephemeris_prefers_definitive() {
    let archive: MemoryArchive = [
        StreamBuilder::new("orbitephem0_x")
            .regular(0.0, 1000.0, 11)
            .values_fn(|t| t / 1000.0)
            .unit("KM")
            .build(),
        StreamBuilder::new("orbitephem1_x")
            .regular(2500.0, 1000.0, 5)
            .constant(-1.0)
            .unit("KM")
            .build(),
    ]
    .into_iter()
    .collect();
    let dispatcher = common::archive_dispatcher(archive);

    let result = dispatcher
        .dispatch("dp_orbitephem_x", 0.0, 10_000.0, None, None)
        .unwrap();
    assert_eq!(
        result.times,
        vec![0.0, 1000.0, 2000.0, 2500.0, 3500.0, 4500.0, 5500.0, 6500.0, 7000.0, 8000.0, 9000.0]
    );
    let vals = result.vals.to_f64().unwrap();
    assert_eq!(&vals[..4], &[0.0, 1.0, 2.0, -1.0]);
    assert_eq!(vals[8], 7.0);
    assert_eq!(result.unit.as_deref(), Some("KM"));
}

#[test]
fn test_ephemeris_velocity_metres_to_km() {
    let archive: MemoryArchive = [
        StreamBuilder::new("solarephem0_vy")
            .regular(0.0, 100.0, 5)
            .constant(2500.0)
            .unit("M/S")
            .build(),
        StreamBuilder::new("solarephem1_vy").unit("M/S").build(),
    ]
    .into_iter()
    .collect();
    let dispatcher = common::archive_dispatcher(archive);

    let result = dispatcher
        .dispatch("dp_solarephem_vy", 0.0, 500.0, None, None)
        .unwrap();
    assert_eq!(result.unit.as_deref(), Some("KM/S"));
    for v in result.vals.to_f64().unwrap() {
        assert_float_eq(v, 2.5, 1e-12);
    }
}

// ==================== Valve cleaning ====================

fn valve_engine() -> derived_tlm::Dispatcher {
    // 104.5 F telemetry every minute with a six-sample dropout to zero
    let telemetry = StreamBuilder::new("pm2thv1t")
        .regular(0.0, 60.0, 100)
        .values_fn(|t| {
            let i = (t / 60.0).round() as usize;
            if (40..=45).contains(&i) {
                0.0
            } else {
                104.5
            }
        })
        .unit("DEGF")
        .build();
    let archive: MemoryArchive = [telemetry].into_iter().collect();

    // Model at 40 C (104 F)
    let times: Vec<f64> = (0..50).map(|i| -3600.0 + i as f64 * 300.0).collect();
    let model: TabulatedModel = [model_table(
        "mups_valve",
        "pm2thv1t",
        times.clone(),
        vec![40.0; times.len()],
    )]
    .into_iter()
    .collect();

    common::dispatcher(archive, model, MemoryStates::new(), EngineConfig::default())
}

#[test]
fn test_valve_dropout_bridged_by_model() {
    let result = valve_engine()
        .dispatch("pm2thv1t_clean", 0.0, 6000.0, None, None)
        .unwrap();
    assert_eq!(result.len(), 100);
    assert_eq!(result.unit.as_deref(), Some("DEGF"));

    let Values::Int(source) = &result.extra["source"] else {
        panic!("source should be integer labels");
    };
    for (i, &s) in source.iter().enumerate() {
        let in_dropout = (40..=45).contains(&i);
        assert_eq!(s == 0, in_dropout, "sample {} has source {}", i, s);
        assert_eq!(result.bads[i], in_dropout);
    }
    for v in result.vals.to_f64().unwrap() {
        assert_float_eq(v, 104.5, 1e-9);
    }
}

#[test]
fn test_valve_converted_to_science_units() {
    let result = valve_engine()
        .dispatch("pm2thv1t_clean", 0.0, 6000.0, None, Some(UnitSystem::Sci))
        .unwrap();
    assert_eq!(result.unit.as_deref(), Some("DEGC"));
    assert_float_eq(result.vals.to_f64().unwrap()[0], (104.5 - 32.0) / 1.8, 1e-9);
    // Provenance is not a temperature
    assert!(matches!(result.extra["source"], Values::Int(_)));
}

#[test]
fn test_valve_unknown_model_version() {
    let err = valve_engine()
        .dispatch("pm2thv1t_clean_v99", 0.0, 6000.0, None, None)
        .unwrap_err();
    assert_eq!(err.stage(), Some(Stage::Reconciliation));
    assert!(matches!(err.root(), TlmError::Model(_)));
}

// ==================== Pitch and roll ====================

/// Mode NPNT before t=300, NSUN after. Ephemeris puts the sun at 60 deg
/// pitch for an identity attitude; the sun sensor reads 45 deg pitch.
fn pitch_archive() -> MemoryArchive {
    let modes = StreamBuilder::new("aopcadmd")
        .regular(-100.0, 10.0, 60)
        .labels(
            (0..60)
                .map(|i| if -100.0 + 10.0 * (i as f64) < 300.0 { "NPNT" } else { "NSUN" })
                .map(str::to_string)
                .collect(),
        )
        .build();

    let mut streams = vec![modes];
    for (msid, value) in [
        ("aoattqt1", 0.0),
        ("aoattqt2", 0.0),
        ("aoattqt3", 0.0),
        ("aoattqt4", 1.0),
    ] {
        streams.push(StreamBuilder::new(msid).regular(-100.0, 10.0, 70).constant(value).build());
    }

    let sun = 1.0e8;
    for (axis, orbit, solar) in [
        ("x", 0.0, 0.5 * sun),
        ("y", 0.0, 0.0),
        ("z", 0.0, -(0.75f64).sqrt() * sun),
    ] {
        streams.push(
            StreamBuilder::new(&format!("orbitephem0_{}", axis))
                .regular(-7200.0, 300.0, 60)
                .constant(orbit)
                .unit("KM")
                .build(),
        );
        streams.push(StreamBuilder::new(&format!("orbitephem1_{}", axis)).build());
        streams.push(
            StreamBuilder::new(&format!("solarephem0_{}", axis))
                .regular(-7200.0, 300.0, 60)
                .constant(solar)
                .unit("KM")
                .build(),
        );
        streams.push(StreamBuilder::new(&format!("solarephem1_{}", axis)).build());
    }

    let h = std::f64::consts::FRAC_1_SQRT_2;
    for (msid, value) in [("aosunsa1", h), ("aosunsa2", 0.0), ("aosunsa3", -h)] {
        streams.push(StreamBuilder::new(msid).regular(0.0, 10.0, 100).constant(value).build());
    }

    streams.into_iter().collect()
}

#[test]
fn test_pitch_follows_mode_segments() {
    let dispatcher = common::archive_dispatcher(pitch_archive());
    let result = dispatcher.dispatch("pitch_comp", 0.0, 500.0, None, None).unwrap();

    assert_eq!(result.unit.as_deref(), Some("DEG"));
    assert_eq!(result.len(), 50);
    assert!(result.times.windows(2).all(|w| w[0] < w[1]));

    let vals = result.vals.to_f64().unwrap();
    for (t, v) in result.times.iter().zip(&vals) {
        let expected = if *t < 300.0 { 60.0 } else { 45.0 };
        assert_float_eq(*v, expected, 1e-9);
    }
}

#[test]
fn test_roll_is_zero_for_sun_in_xz_plane() {
    let dispatcher = common::archive_dispatcher(pitch_archive());
    let result = dispatcher.dispatch("roll_comp", 0.0, 500.0, None, None).unwrap();
    for v in result.vals.to_f64().unwrap() {
        assert_float_eq(v, 0.0, 1e-9);
    }
}

#[test]
fn test_pitch_without_mode_telemetry() {
    let dispatcher = common::archive_dispatcher(pitch_archive());
    let err = dispatcher
        .dispatch("pitch_comp", 10_000.0, 11_000.0, None, None)
        .unwrap_err();
    assert!(matches!(err.root(), TlmError::NoTelemetry { .. }));
}

#[test]
fn test_pitch_with_only_bad_mode_samples() {
    let mut archive = pitch_archive();
    let times: Vec<f64> = (0..60).map(|i| -100.0 + 10.0 * i as f64).collect();
    archive.insert(
        SampleStream::new(
            "aopcadmd",
            times,
            Values::Str(vec!["NPNT".to_string(); 60]),
            vec![true; 60],
            None,
        )
        .unwrap(),
    );
    let dispatcher = common::archive_dispatcher(archive);

    let err = dispatcher
        .dispatch("pitch_comp", 0.0, 500.0, None, None)
        .unwrap_err();
    assert!(matches!(err.root(), TlmError::NoTelemetry { .. }));
}

#[test]
fn test_dispatchers_sharing_a_registry_keep_their_own_data() {
    let archive = |level: f64| -> MemoryArchive {
        [
            StreamBuilder::new("orbitephem0_x")
                .regular(0.0, 100.0, 10)
                .constant(level)
                .unit("KM")
                .build(),
            StreamBuilder::new("orbitephem1_x").unit("KM").build(),
        ]
        .into_iter()
        .collect()
    };
    let mut registry = derived_tlm::Registry::new();
    derived_tlm::handlers::register_defaults(&mut registry, &EngineConfig::default()).unwrap();
    let registry = Arc::new(registry);
    let first = derived_tlm::Dispatcher::new(
        registry.clone(),
        Arc::new(archive(1.0)),
        EngineConfig::default(),
    );
    let second =
        derived_tlm::Dispatcher::new(registry, Arc::new(archive(2.0)), EngineConfig::default());

    let a = first.dispatch("dp_orbitephem_x", 0.0, 500.0, None, None).unwrap();
    let b = second.dispatch("dp_orbitephem_x", 0.0, 500.0, None, None).unwrap();
    assert_eq!(a.vals, Values::Float(vec![1.0; 5]));
    assert_eq!(b.vals, Values::Float(vec![2.0; 5]));
}

// ==================== Script channels ====================

fn script_config() -> EngineConfig {
    let mut config = EngineConfig::default();
    config.script_channels.push(ScriptChannel {
        name: "dp_tank_delta".to_string(),
        inputs: vec!["pmtank1t".to_string(), "pmtank2t".to_string()],
        expression: "pmtank1t - pmtank2t".to_string(),
        unit: Some("DEGF".to_string()),
    });
    config
}

fn tank_archive() -> MemoryArchive {
    [
        StreamBuilder::new("pmtank1t")
            .regular(0.0, 10.0, 100)
            .values_fn(|t| 70.0 + t / 100.0)
            .build(),
        StreamBuilder::new("pmtank2t")
            .regular(0.0, 10.0, 100)
            .constant(65.0)
            .bad_at(20)
            .build(),
    ]
    .into_iter()
    .collect()
}

#[test]
fn test_script_channel_difference() {
    let dispatcher = common::dispatcher(
        tank_archive(),
        TabulatedModel::new(),
        MemoryStates::new(),
        script_config(),
    );
    let result = dispatcher
        .dispatch("dp_tank_delta", 100.0, 300.0, None, None)
        .unwrap();

    assert_eq!(result.len(), 20);
    assert_eq!(result.unit.as_deref(), Some("DEGF"));
    for (t, v) in result.times.iter().zip(result.vals.to_f64().unwrap()) {
        assert_float_eq(v, 5.0 + t / 100.0, 1e-9);
    }
    // Sample at t=200 is bad in pmtank2t
    assert_eq!(result.bads.iter().filter(|&&b| b).count(), 1);
    assert!(result.bads[10]);
}

#[test]
fn test_script_channel_statistics() {
    let dispatcher = common::dispatcher(
        tank_archive(),
        TabulatedModel::new(),
        MemoryStates::new(),
        script_config(),
    );
    let result = dispatcher
        .dispatch("dp_tank_delta", 0.0, 990.0, Some(StatInterval::Short), None)
        .unwrap();

    assert_eq!(result.extra["indexes"], Values::Int(vec![0, 1, 2, 3]));
    assert!(result.bads.iter().all(|&b| !b));
    // Bin 0 covers t = 0..320 minus the bad sample at t=200
    assert_eq!(result.extra["samples"], Values::Int(vec![32, 33, 33, 1]));
}

// ==================== Query service ====================

#[test]
fn test_service_matches_direct_dispatch() {
    let dispatcher = Arc::new(common::dispatcher(
        tank_archive(),
        TabulatedModel::new(),
        MemoryStates::new(),
        script_config(),
    ));
    let direct = dispatcher
        .dispatch("dp_tank_delta", 0.0, 500.0, None, None)
        .unwrap();

    let service = QueryService::start(dispatcher.clone(), &dispatcher.config().service).unwrap();
    let pending: Vec<_> = (0..8)
        .map(|_| {
            service
                .submit(Query::new("DP_TANK_DELTA", 0.0, 500.0))
                .unwrap()
        })
        .collect();
    for p in pending {
        assert_eq!(p.wait().unwrap(), direct);
    }

    let daily = service
        .query(
            Query::new("dp_tank_delta", 0.0, 500.0)
                .with_interval(StatInterval::Daily)
                .with_units(UnitSystem::Sci),
        )
        .unwrap();
    // Script channels carry no unit declaration, so the unit is unchanged
    assert_eq!(daily.unit.as_deref(), Some("DEGF"));
    assert_eq!(daily.extra["indexes"], Values::Int(vec![0]));
    service.shutdown();
}
