use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Hotend temperature directive written for every accepted layer.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum TempCommand {
    /// Set the target temperature and keep printing.
    #[default]
    #[serde(rename = "M104")]
    M104,
    /// Set the target temperature and block until it is reached.
    #[serde(rename = "M109")]
    M109,
}

impl TempCommand {
    /// Gcode mnemonic of the directive.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::M104 => "M104",
            Self::M109 => "M109",
        }
    }
}

/// Decides which hard temperature bound discards the carried clamp overflow.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CarryPolicy {
    /// Reaching the ceiling drops the carry, reaching the floor keeps it.
    #[default]
    DiscardAtCeiling,
    /// Reaching either bound drops the carry.
    DiscardAtBothBounds,
}

/// Immutable parameter bundle for a single woodgrain run.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct WoodgrainConfig {
    /// Temperature at the centre of the variation band, in °C.
    pub avg_temp: f64,
    /// Half-width of the variation band, in °C.
    pub temp_variation: f64,
    /// Largest temperature change allowed between consecutive layers; `0` disables the clamp.
    pub max_delta_per_layer: f64,
    /// Temperature forced on every directive before the first layer.
    pub raft_temp: f64,
    /// Average height of one grain band, in millimetres.
    pub grain_size_mm: f64,
    /// Exponent applied to every sample; values above one sharpen the peaks.
    pub spikiness_power: f64,
    /// Seed of the noise field.
    pub seed: u64,
    /// Number of following move lines inspected for z-hops; `0` disables the scan.
    pub scan_for_zhop_lines: usize,
    /// Maximum wall feedrate deviation, as a percentage of the sliced feedrate.
    pub wall_feedrate_variation_pct: f64,
    /// Lowest wall feedrate ever written, in mm/min.
    pub minimum_feedrate: f64,
    /// Absolute ceiling for rewritten wall feedrates, in mm/min.
    pub max_wall_feedrate: f64,
    /// Side length of the noise lattice; must be a power of two.
    pub tile_dimension: usize,
    /// Heights closer than this to the last accepted layer are not new layers.
    pub min_layer_delta_mm: f64,
    /// A single jump larger than this is always accepted as a new layer.
    pub max_layer_jump_mm: f64,
    /// Fixed temperature for layers at or below [`Self::first_layer_max_z_mm`].
    #[serde(skip_serializing_if = "Option::is_none")]
    pub first_layer_temp: Option<f64>,
    /// Highest Z that still counts as the first layer.
    pub first_layer_max_z_mm: f64,
    /// Directive used for injected temperature changes.
    pub temp_command: TempCommand,
    /// Handling of carried clamp overflow at the hard temperature bounds.
    pub carry_policy: CarryPolicy,
}

impl Default for WoodgrainConfig {
    fn default() -> Self {
        Self {
            avg_temp: 210.0,
            temp_variation: 20.0,
            max_delta_per_layer: 2.5,
            raft_temp: 210.0,
            grain_size_mm: 2.0,
            spikiness_power: 1.0,
            seed: 42,
            scan_for_zhop_lines: 5,
            wall_feedrate_variation_pct: 20.0,
            minimum_feedrate: 100.0,
            max_wall_feedrate: 6_000.0,
            tile_dimension: 256,
            min_layer_delta_mm: 0.1,
            max_layer_jump_mm: 2.0,
            first_layer_temp: None,
            first_layer_max_z_mm: 0.5,
            temp_command: TempCommand::M104,
            carry_policy: CarryPolicy::DiscardAtCeiling,
        }
    }
}

impl WoodgrainConfig {
    /// Checks every parameter that does not depend on the input.
    pub fn validate(&self) -> Result<(), ConfigError> {
        for (parameter, value) in self.real_parameters() {
            if !value.is_finite() {
                return Err(ConfigError::NonFinite { parameter, value });
            }
        }

        if self.grain_size_mm <= 0.0 {
            return Err(ConfigError::GrainSize(self.grain_size_mm));
        }
        if self.temp_variation <= 0.0 {
            return Err(ConfigError::TempVariation(self.temp_variation));
        }
        if self.max_delta_per_layer < 0.0 {
            return Err(ConfigError::MaxDelta(self.max_delta_per_layer));
        }
        if self.spikiness_power <= 0.0 {
            return Err(ConfigError::Spikiness(self.spikiness_power));
        }
        if !(0.0..=100.0).contains(&self.wall_feedrate_variation_pct) {
            return Err(ConfigError::WallVariation(
                self.wall_feedrate_variation_pct,
            ));
        }
        if self.minimum_feedrate <= 0.0 {
            return Err(ConfigError::Feedrate {
                parameter: "minimum_feedrate",
                value: self.minimum_feedrate,
            });
        }
        if self.max_wall_feedrate <= 0.0 {
            return Err(ConfigError::Feedrate {
                parameter: "max_wall_feedrate",
                value: self.max_wall_feedrate,
            });
        }
        if self.min_layer_delta_mm < 0.0 {
            return Err(ConfigError::LayerDelta {
                parameter: "min_layer_delta_mm",
                value: self.min_layer_delta_mm,
            });
        }
        if self.max_layer_jump_mm < 0.0 {
            return Err(ConfigError::LayerDelta {
                parameter: "max_layer_jump_mm",
                value: self.max_layer_jump_mm,
            });
        }
        if self.tile_dimension == 0 || !self.tile_dimension.is_power_of_two() {
            return Err(ConfigError::TileDimension(self.tile_dimension));
        }

        Ok(())
    }

    /// Checks every parameter, including those bounded by the input length.
    pub fn validate_for_input(&self, total_lines: usize) -> Result<(), ConfigError> {
        self.validate()?;
        if self.scan_for_zhop_lines > total_lines {
            return Err(ConfigError::ScanExceedsInput {
                scan: self.scan_for_zhop_lines,
                lines: total_lines,
            });
        }
        Ok(())
    }

    fn real_parameters(&self) -> impl Iterator<Item = (&'static str, f64)> {
        [
            ("avg_temp", self.avg_temp),
            ("temp_variation", self.temp_variation),
            ("max_delta_per_layer", self.max_delta_per_layer),
            ("raft_temp", self.raft_temp),
            ("grain_size_mm", self.grain_size_mm),
            ("spikiness_power", self.spikiness_power),
            ("wall_feedrate_variation_pct", self.wall_feedrate_variation_pct),
            ("minimum_feedrate", self.minimum_feedrate),
            ("max_wall_feedrate", self.max_wall_feedrate),
            ("min_layer_delta_mm", self.min_layer_delta_mm),
            ("max_layer_jump_mm", self.max_layer_jump_mm),
            ("first_layer_temp", self.first_layer_temp.unwrap_or(0.0)),
            ("first_layer_max_z_mm", self.first_layer_max_z_mm),
        ]
        .into_iter()
    }
}

/// Parameter combinations rejected before any line is processed.
#[derive(Clone, Debug, PartialEq, Error)]
pub enum ConfigError {
    /// A real-valued parameter was NaN or infinite.
    #[error("parameter `{parameter}` must be finite, got {value}")]
    NonFinite {
        /// Name of the offending parameter.
        parameter: &'static str,
        /// Rejected value.
        value: f64,
    },
    /// The grain size was zero or negative.
    #[error("grain size must be positive, got {0} mm")]
    GrainSize(f64),
    /// The temperature variation was zero or negative.
    #[error("temperature variation must be positive, got {0} °C")]
    TempVariation(f64),
    /// The per-layer delta clamp was negative.
    #[error("max temperature change per layer must not be negative, got {0} °C")]
    MaxDelta(f64),
    /// The spikiness exponent was zero or negative.
    #[error("spikiness power must be positive, got {0}")]
    Spikiness(f64),
    /// The wall feedrate variation was outside `[0, 100]`.
    #[error("wall feedrate variation must lie within 0..=100 %, got {0}")]
    WallVariation(f64),
    /// A feedrate bound was zero or negative.
    #[error("feedrate `{parameter}` must be positive, got {value} mm/min")]
    Feedrate {
        /// Name of the offending parameter.
        parameter: &'static str,
        /// Rejected value.
        value: f64,
    },
    /// A layer acceptance threshold was negative.
    #[error("layer threshold `{parameter}` must not be negative, got {value} mm")]
    LayerDelta {
        /// Name of the offending parameter.
        parameter: &'static str,
        /// Rejected value.
        value: f64,
    },
    /// The noise lattice size was zero or not a power of two.
    #[error("tile dimension must be a non-zero power of two, got {0}")]
    TileDimension(usize),
    /// The z-hop lookahead reaches past the end of the input.
    #[error("z-hop scan of {scan} lines exceeds the {lines} input lines")]
    ScanExceedsInput {
        /// Requested lookahead.
        scan: usize,
        /// Number of input lines.
        lines: usize,
    },
}
