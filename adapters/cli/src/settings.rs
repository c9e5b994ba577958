use std::{fs, path::Path};

use anyhow::{Context, Result};
use clap::Args;
use woodgrain_core::WoodgrainConfig;

/// Parameters that override the configuration file from the command line.
#[derive(Args, Clone, Debug, Default, PartialEq)]
pub(crate) struct ConfigOverrides {
    /// Seed of the noise field
    #[arg(long)]
    pub(crate) seed: Option<u64>,

    /// Temperature at the centre of the variation band, in °C
    #[arg(long)]
    pub(crate) avg_temp: Option<f64>,

    /// Half-width of the variation band, in °C
    #[arg(long)]
    pub(crate) temp_variation: Option<f64>,

    /// Largest temperature change between consecutive layers, in °C
    #[arg(long)]
    pub(crate) max_delta: Option<f64>,

    /// Temperature forced on directives before the first layer, in °C
    #[arg(long)]
    pub(crate) raft_temp: Option<f64>,

    /// Average height of one grain band, in millimetres
    #[arg(long)]
    pub(crate) grain_size: Option<f64>,

    /// Exponent applied to every noise sample
    #[arg(long)]
    pub(crate) spikiness: Option<f64>,

    /// Number of following moves inspected for z-hops; 0 disables the scan
    #[arg(long = "scan-for-zhop")]
    pub(crate) scan_for_zhop: Option<usize>,

    /// Maximum wall feedrate deviation, in percent
    #[arg(long)]
    pub(crate) wall_variation: Option<f64>,

    /// Fixed temperature for the first layer, in °C
    #[arg(long)]
    pub(crate) first_layer_temp: Option<f64>,
}

impl ConfigOverrides {
    /// Writes every provided flag over the configuration.
    pub(crate) fn apply_to(&self, config: &mut WoodgrainConfig) {
        if let Some(seed) = self.seed {
            config.seed = seed;
        }
        if let Some(avg_temp) = self.avg_temp {
            config.avg_temp = avg_temp;
        }
        if let Some(temp_variation) = self.temp_variation {
            config.temp_variation = temp_variation;
        }
        if let Some(max_delta) = self.max_delta {
            config.max_delta_per_layer = max_delta;
        }
        if let Some(raft_temp) = self.raft_temp {
            config.raft_temp = raft_temp;
        }
        if let Some(grain_size) = self.grain_size {
            config.grain_size_mm = grain_size;
        }
        if let Some(spikiness) = self.spikiness {
            config.spikiness_power = spikiness;
        }
        if let Some(scan) = self.scan_for_zhop {
            config.scan_for_zhop_lines = scan;
        }
        if let Some(variation) = self.wall_variation {
            config.wall_feedrate_variation_pct = variation;
        }
        if self.first_layer_temp.is_some() {
            config.first_layer_temp = self.first_layer_temp;
        }
    }
}

/// Loads the configuration file, if any, and applies the command-line overrides.
pub(crate) fn resolve_config(
    path: Option<&Path>,
    overrides: &ConfigOverrides,
) -> Result<WoodgrainConfig> {
    let mut config = match path {
        Some(path) => {
            let contents = fs::read_to_string(path)
                .with_context(|| format!("failed to read configuration at {}", path.display()))?;
            parse_config(&contents)
                .with_context(|| format!("invalid configuration in {}", path.display()))?
        }
        None => WoodgrainConfig::default(),
    };
    overrides.apply_to(&mut config);
    Ok(config)
}

fn parse_config(contents: &str) -> Result<WoodgrainConfig> {
    toml::from_str(contents).context("failed to parse configuration toml contents")
}

/// Default configuration rendered as TOML.
pub(crate) fn default_config_toml() -> Result<String> {
    toml::to_string_pretty(&WoodgrainConfig::default())
        .context("failed to serialise the default configuration")
}
