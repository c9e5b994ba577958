#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Per-layer noise sampling and global normalisation.
//!
//! The sampler walks the program once, deciding which Z heights are distinct
//! layers and evaluating the noise field for each of them. Because the
//! temperature mapping needs the global minimum and maximum of those samples,
//! the whole map is built and normalised before the rewriter emits anything.

use std::collections::{btree_map, BTreeMap};

use tracing::{debug, warn};
use woodgrain_core::{ConfigError, WoodgrainConfig, ZKey};
use woodgrain_gcode::GcodeLine;
use woodgrain_system_noise::NoiseField;

/// Multiplier applied to the fractal sum before taking its fractional part.
pub const BANDING: f64 = 3.0;
/// Octaves summed per sample.
pub const OCTAVES: u32 = 3;
/// Amplitude ratio between consecutive octaves.
pub const PERSISTENCE: f64 = 0.6;
/// Value assigned to every layer when all raw samples are equal.
pub const DEGENERATE_NOISE: f64 = 0.5;

const SEED_X_SCALE: f64 = 0.731;
const SEED_Y_SCALE: f64 = 0.193;
const Z_DRIFT: f64 = 0.15;
const Y_DRIFT_RATIO: f64 = 0.7;

/// Maps a layer height to a raw woodgrain sample in `[0, 1)`.
#[derive(Clone, Debug)]
pub struct GrainSampler {
    field: NoiseField,
    seed: f64,
    grain_size_mm: f64,
    spikiness_power: f64,
}

impl GrainSampler {
    /// Creates a sampler over an existing field.
    #[must_use]
    pub fn new(field: NoiseField, seed: u64, grain_size_mm: f64, spikiness_power: f64) -> Self {
        Self {
            field,
            seed: seed as f64,
            grain_size_mm,
            spikiness_power,
        }
    }

    /// Builds the noise field and sampler described by the configuration.
    pub fn from_config(config: &WoodgrainConfig) -> Result<Self, ConfigError> {
        let field = NoiseField::new(config.seed, config.tile_dimension)?;
        Ok(Self::new(
            field,
            config.seed,
            config.grain_size_mm,
            config.spikiness_power,
        ))
    }

    /// Raw sample for the given height.
    ///
    /// The X and Y coordinates drift slowly with Z so that consecutive grain
    /// bands do not repeat; Z is scaled so one lattice cell spans two grains.
    #[must_use]
    pub fn sample(&self, z: f64) -> f64 {
        let x = self.seed * SEED_X_SCALE + z * Z_DRIFT;
        let y = self.seed * SEED_Y_SCALE + z * Z_DRIFT * Y_DRIFT_RATIO;
        let z_scaled = z / (self.grain_size_mm * 2.0);

        let noise = BANDING * self.field.fractal(OCTAVES, PERSISTENCE, x, y, z_scaled, 1.0);
        let mut banded = noise - noise.floor();
        // Tiny negative sums round up to exactly one.
        if banded >= 1.0 {
            banded = 0.0;
        }
        banded.powf(self.spikiness_power)
    }
}

/// Decides whether a Z height starts a new layer.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct AcceptanceRule {
    min_delta_mm: f64,
    max_jump_mm: f64,
}

impl AcceptanceRule {
    /// Creates a rule from explicit thresholds.
    #[must_use]
    pub const fn new(min_delta_mm: f64, max_jump_mm: f64) -> Self {
        Self {
            min_delta_mm,
            max_jump_mm,
        }
    }

    /// Thresholds described by the configuration.
    #[must_use]
    pub fn from_config(config: &WoodgrainConfig) -> Self {
        Self::new(config.min_layer_delta_mm, config.max_layer_jump_mm)
    }

    /// Returns whether `z` is a new layer given the last accepted and the
    /// previously seen heights.
    #[must_use]
    pub fn accepts(&self, last_accepted: Option<f64>, previous: Option<f64>, z: f64) -> bool {
        let Some(last) = last_accepted else {
            return true;
        };
        if (z - last).abs() > self.min_delta_mm {
            return true;
        }
        previous.is_some_and(|previous| (z - previous).abs() > self.max_jump_mm)
    }
}

/// Raw samples keyed by canonical layer height.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct SampleMap {
    samples: BTreeMap<ZKey, f64>,
}

impl SampleMap {
    /// Scans the program once and samples every accepted layer.
    ///
    /// The build plate is always sampled. Samples are evaluated at the
    /// canonical key height, so drifting spellings of one height agree.
    #[must_use]
    pub fn collect(lines: &[GcodeLine], sampler: &GrainSampler, rule: AcceptanceRule) -> Self {
        let mut samples = BTreeMap::new();
        let _ = samples.insert(ZKey::ZERO, sampler.sample(0.0));

        let mut last_accepted = None;
        let mut previous = None;
        for z in lines.iter().filter_map(GcodeLine::z) {
            if rule.accepts(last_accepted, previous, z) {
                let key = ZKey::from_mm(z);
                let _ = samples
                    .entry(key)
                    .or_insert_with(|| sampler.sample(key.mm()));
                last_accepted = Some(z);
            }
            previous = Some(z);
        }

        debug!(layers = samples.len(), "sampled woodgrain layers");
        Self { samples }
    }

    /// Raw sample stored for the key.
    #[must_use]
    pub fn get(&self, key: ZKey) -> Option<f64> {
        self.samples.get(&key).copied()
    }

    /// Number of sampled layers, the build plate included.
    #[must_use]
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    /// Returns whether no layer was sampled.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Samples in ascending height order.
    pub fn iter(&self) -> btree_map::Iter<'_, ZKey, f64> {
        self.samples.iter()
    }

    /// Rescales every sample to `[0, 1]`.
    ///
    /// When all samples are equal there is no range to stretch; every layer
    /// then maps to [`DEGENERATE_NOISE`].
    #[must_use]
    pub fn normalize(&self) -> NormalizedField {
        let (min, max) = self
            .samples
            .values()
            .fold((f64::INFINITY, f64::NEG_INFINITY), |(min, max), &value| {
                (min.min(value), max.max(value))
            });

        if !(max > min) {
            warn!(
                layers = self.samples.len(),
                "noise samples have no range; using the neutral value for every layer"
            );
            return NormalizedField {
                values: self
                    .samples
                    .keys()
                    .map(|&key| (key, DEGENERATE_NOISE))
                    .collect(),
                degenerate: true,
            };
        }

        let span = max - min;
        NormalizedField {
            values: self
                .samples
                .iter()
                .map(|(&key, &value)| (key, (value - min) / span))
                .collect(),
            degenerate: false,
        }
    }
}

/// Samples rescaled to `[0, 1]`, keyed like the [`SampleMap`] they came from.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct NormalizedField {
    values: BTreeMap<ZKey, f64>,
    degenerate: bool,
}

impl NormalizedField {
    /// Normalised sample for the key.
    #[must_use]
    pub fn get(&self, key: ZKey) -> Option<f64> {
        self.values.get(&key).copied()
    }

    /// Returns whether the key is a sampled layer.
    #[must_use]
    pub fn contains(&self, key: ZKey) -> bool {
        self.values.contains_key(&key)
    }

    /// Number of layers.
    #[must_use]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Returns whether the field holds no layers.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Returns whether the neutral value replaced every sample.
    #[must_use]
    pub const fn is_degenerate(&self) -> bool {
        self.degenerate
    }

    /// Values in ascending height order.
    pub fn iter(&self) -> btree_map::Iter<'_, ZKey, f64> {
        self.values.iter()
    }
}
