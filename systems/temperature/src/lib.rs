#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Noise to temperature mapping with a per-layer rate limit.

use serde::Serialize;
use tracing::debug;
use woodgrain_core::{CarryPolicy, TemperatureRange, WoodgrainConfig, ZKey};

/// Mutable state threaded through consecutive accepted layers.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct LayerTempState {
    postponed_delta: f64,
    last_accepted: Option<f64>,
}

impl LayerTempState {
    /// Clamp overflow carried into the next layer.
    #[must_use]
    pub const fn postponed_delta(&self) -> f64 {
        self.postponed_delta
    }

    /// Temperature of the last layer that went through the clamp.
    #[must_use]
    pub const fn last_accepted(&self) -> Option<f64> {
        self.last_accepted
    }
}

/// Origin of a layer temperature.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TemperatureSource {
    /// Derived from the noise field.
    Noise,
    /// The fixed first-layer temperature.
    FirstLayerOverride,
}

/// Temperature resolved for an accepted layer.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct LayerTemperature {
    temperature: f64,
    source: TemperatureSource,
}

impl LayerTemperature {
    /// Temperature in °C.
    #[must_use]
    pub const fn temperature(&self) -> f64 {
        self.temperature
    }

    /// Where the temperature came from.
    #[must_use]
    pub const fn source(&self) -> TemperatureSource {
        self.source
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
struct FirstLayerOverride {
    temperature: f64,
    max_z: ZKey,
}

/// Stateful noise to temperature mapper for one run.
#[derive(Clone, Debug)]
pub struct TemperatureMapper {
    range: TemperatureRange,
    max_delta: f64,
    carry_policy: CarryPolicy,
    first_layer: Option<FirstLayerOverride>,
    state: LayerTempState,
}

impl TemperatureMapper {
    /// Creates a mapper with fresh state.
    #[must_use]
    pub fn from_config(config: &WoodgrainConfig) -> Self {
        Self {
            range: TemperatureRange::from_config(config),
            max_delta: config.max_delta_per_layer,
            carry_policy: config.carry_policy,
            first_layer: config.first_layer_temp.map(|temperature| FirstLayerOverride {
                temperature,
                max_z: ZKey::from_mm(config.first_layer_max_z_mm),
            }),
            state: LayerTempState::default(),
        }
    }

    /// Temperature band the mapper targets.
    #[must_use]
    pub const fn range(&self) -> TemperatureRange {
        self.range
    }

    /// Current clamp state.
    #[must_use]
    pub const fn state(&self) -> &LayerTempState {
        &self.state
    }

    /// Linear map from `[0, 1]` onto the temperature band.
    #[must_use]
    pub fn noise_to_temp(&self, noise: f64) -> f64 {
        self.range.min() + noise * self.range.span()
    }

    /// Resolves the temperature of a newly accepted layer.
    ///
    /// Overflow beyond the per-layer delta is postponed to the next layer.
    /// The result is then hard-clamped to the band; the carry policy decides
    /// which bound throws the postponed overflow away.
    pub fn accept_layer(&mut self, z: ZKey, noise: f64) -> LayerTemperature {
        if let Some(first_layer) = self.first_layer {
            if z <= first_layer.max_z {
                debug!(%z, temperature = first_layer.temperature, "first layer override");
                return LayerTemperature {
                    temperature: first_layer.temperature,
                    source: TemperatureSource::FirstLayerOverride,
                };
            }
        }

        let mut temperature = self.noise_to_temp(noise) + self.state.postponed_delta;
        self.state.postponed_delta = 0.0;

        if let Some(last) = self.state.last_accepted {
            if self.max_delta > 0.0 {
                let ceiling = last + self.max_delta;
                let floor = last - self.max_delta;
                if temperature > ceiling {
                    self.state.postponed_delta = temperature - ceiling;
                    temperature = ceiling;
                } else if temperature < floor {
                    self.state.postponed_delta = temperature - floor;
                    temperature = floor;
                }
            }
        }

        if temperature >= self.range.max() {
            temperature = self.range.max();
            self.state.postponed_delta = 0.0;
        } else if temperature <= self.range.min() {
            temperature = self.range.min();
            if self.carry_policy == CarryPolicy::DiscardAtBothBounds {
                self.state.postponed_delta = 0.0;
            }
        }

        self.state.last_accepted = Some(temperature);
        debug!(
            %z,
            temperature,
            postponed = self.state.postponed_delta,
            "resolved layer temperature"
        );
        LayerTemperature {
            temperature,
            source: TemperatureSource::Noise,
        }
    }
}
