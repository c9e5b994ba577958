#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Core contracts shared across the woodgrain post-processor.
//!
//! This crate defines the vocabulary that connects the host adapters with the
//! pure systems. Hosts build a [`WoodgrainConfig`], hand it to the rewriter
//! together with the raw gcode, and observe the run through a
//! [`ProgressSink`]. Systems exchange layer heights as canonical [`ZKey`]
//! values so that floating-point drift between slicer output lines never
//! splits one physical layer into two.

use std::fmt;

use serde::{Deserialize, Serialize};

mod config;
mod progress;

pub use config::{CarryPolicy, ConfigError, TempCommand, WoodgrainConfig};
pub use progress::{Progress, ProgressSink};

/// Prefix shared by every line of the trailer graph block.
pub const WOODGRAPH_PREFIX: &str = ";WoodGraph:";

/// Comment written as the first line of every rewritten document.
pub const WOODIFIED_HEADER: &str = ";woodified gcode";

/// Prefix of the feature markers emitted by the slicer.
pub const FEATURE_MARKER_PREFIX: &str = ";TYPE:";

/// Prefix of the layer markers emitted by the slicer.
pub const LAYER_MARKER_PREFIX: &str = ";LAYER:";

/// Feature names starting with this prefix denote wall segments.
pub const WALL_FEATURE_PREFIX: &str = "WALL-";

/// Number of key units per millimetre.
const KEY_UNITS_PER_MM: f64 = 1_000.0;

/// Layer height canonicalised to whole micrometres.
///
/// Heights that round to the same micrometre are treated as the same layer.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ZKey(i64);

impl ZKey {
    /// The build plate.
    pub const ZERO: Self = Self(0);

    /// Quantises a height expressed in millimetres.
    #[must_use]
    pub fn from_mm(z: f64) -> Self {
        Self((z * KEY_UNITS_PER_MM).round() as i64)
    }

    /// Height represented by the key, in millimetres.
    #[must_use]
    pub fn mm(self) -> f64 {
        self.0 as f64 / KEY_UNITS_PER_MM
    }

    /// Raw micrometre count.
    #[must_use]
    pub const fn micrometres(self) -> i64 {
        self.0
    }
}

impl fmt::Display for ZKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.3}", self.mm())
    }
}

/// Closed temperature interval `[avg - variation, avg + variation]`.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct TemperatureRange {
    min: f64,
    max: f64,
}

impl TemperatureRange {
    /// Creates a range centred on `average` spanning `variation` on each side.
    #[must_use]
    pub fn around(average: f64, variation: f64) -> Self {
        Self {
            min: average - variation,
            max: average + variation,
        }
    }

    /// Derives the range described by the configuration.
    #[must_use]
    pub fn from_config(config: &WoodgrainConfig) -> Self {
        Self::around(config.avg_temp, config.temp_variation)
    }

    /// Coolest temperature the effect may request.
    #[must_use]
    pub const fn min(&self) -> f64 {
        self.min
    }

    /// Hottest temperature the effect may request.
    #[must_use]
    pub const fn max(&self) -> f64 {
        self.max
    }

    /// Width of the interval.
    #[must_use]
    pub fn span(&self) -> f64 {
        self.max - self.min
    }

    /// Returns whether the temperature lies inside the closed interval.
    #[must_use]
    pub fn contains(&self, temperature: f64) -> bool {
        temperature >= self.min && temperature <= self.max
    }

    /// Linear position of the temperature inside the interval, `0` at the minimum.
    #[must_use]
    pub fn position(&self, temperature: f64) -> f64 {
        let span = self.span();
        if span <= 0.0 {
            return 0.5;
        }
        (temperature - self.min) / span
    }
}
