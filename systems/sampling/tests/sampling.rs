use woodgrain_core::{WoodgrainConfig, ZKey};
use woodgrain_gcode::Program;
use woodgrain_system_sampling::{
    AcceptanceRule, GrainSampler, SampleMap, DEGENERATE_NOISE,
};

fn sampler(config: &WoodgrainConfig) -> GrainSampler {
    GrainSampler::from_config(config).expect("valid configuration")
}

fn collect(lines: &[&str], config: &WoodgrainConfig) -> SampleMap {
    let program = Program::parse(lines);
    SampleMap::collect(
        program.lines(),
        &sampler(config),
        AcceptanceRule::from_config(config),
    )
}

#[test]
fn build_plate_is_always_sampled() {
    let config = WoodgrainConfig::default();
    let samples = collect(&[";no moves here", "M104 S200"], &config);
    assert_eq!(samples.len(), 1);
    assert!(samples.get(ZKey::ZERO).is_some());
}

#[test]
fn samples_every_distinct_layer() {
    let config = WoodgrainConfig::default();
    let samples = collect(
        &[
            "G0 Z0.2",
            "G1 X10 Y10 E1",
            "G1 X20 Y10 E2",
            "G0 Z0.4",
            "G1 X10 Y10 E3",
            "G0 Z0.6",
        ],
        &config,
    );
    let keys: Vec<ZKey> = samples.iter().map(|(&key, _)| key).collect();
    assert_eq!(
        keys,
        vec![
            ZKey::ZERO,
            ZKey::from_mm(0.2),
            ZKey::from_mm(0.4),
            ZKey::from_mm(0.6)
        ]
    );
}

#[test]
fn heights_within_minimum_delta_are_merged() {
    let config = WoodgrainConfig::default();
    let samples = collect(&["G0 Z0.2", "G0 Z0.25", "G0 Z0.28", "G0 Z0.35"], &config);
    assert!(samples.get(ZKey::from_mm(0.25)).is_none());
    assert!(samples.get(ZKey::from_mm(0.28)).is_none());
    assert!(samples.get(ZKey::from_mm(0.35)).is_some());
}

#[test]
fn large_jump_forces_a_new_layer() {
    let config = WoodgrainConfig {
        min_layer_delta_mm: 5.0,
        max_layer_jump_mm: 2.0,
        ..WoodgrainConfig::default()
    };
    let samples = collect(&["G0 Z0.2", "G0 Z1.0", "G0 Z3.5"], &config);
    assert!(samples.get(ZKey::from_mm(1.0)).is_none());
    assert!(samples.get(ZKey::from_mm(3.5)).is_some());
}

#[test]
fn raw_samples_lie_in_unit_interval() {
    let config = WoodgrainConfig::default();
    let sampler = sampler(&config);
    for step in 0..500 {
        let z = f64::from(step) * 0.1;
        let value = sampler.sample(z);
        assert!((0.0..1.0).contains(&value), "sample {value} at z={z}");
    }
}

#[test]
fn spikiness_raises_samples_to_a_power() {
    let flat = sampler(&WoodgrainConfig::default());
    let spiky = sampler(&WoodgrainConfig {
        spikiness_power: 2.0,
        ..WoodgrainConfig::default()
    });
    for z in [0.2, 1.4, 7.9] {
        let expected = flat.sample(z).powf(2.0);
        assert!((spiky.sample(z) - expected).abs() < 1e-12);
    }
}

#[test]
fn normalized_field_spans_unit_interval() {
    let config = WoodgrainConfig::default();
    let lines: Vec<String> = (1..=60)
        .map(|layer| format!("G1 Z{:.2} X1 Y1 E1", f64::from(layer) * 0.2))
        .collect();
    let program = Program::parse(&lines);
    let samples = SampleMap::collect(
        program.lines(),
        &sampler(&config),
        AcceptanceRule::from_config(&config),
    );
    let field = samples.normalize();

    assert!(!field.is_degenerate());
    assert_eq!(field.len(), samples.len());
    let min = field.iter().map(|(_, &value)| value).fold(f64::INFINITY, f64::min);
    let max = field
        .iter()
        .map(|(_, &value)| value)
        .fold(f64::NEG_INFINITY, f64::max);
    assert_eq!(min, 0.0);
    assert_eq!(max, 1.0);
}

#[test]
fn flat_samples_map_to_neutral_value() {
    let config = WoodgrainConfig::default();
    let field = collect(&["G28", "M104 S210"], &config).normalize();
    assert!(field.is_degenerate());
    assert_eq!(field.get(ZKey::ZERO), Some(DEGENERATE_NOISE));
    assert!(field.iter().all(|(_, value)| !value.is_nan()));
}

#[test]
fn sampling_replays_deterministically() {
    let config = WoodgrainConfig::default();
    let lines = ["G0 Z0.2", "G0 Z0.3", "G0 Z0.4", "G0 Z2.4"];
    assert_eq!(collect(&lines, &config), collect(&lines, &config));
}
