#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Wall feedrate modulation that follows the layer temperature.
//!
//! Hotter layers are printed slower and cooler layers faster, which deepens
//! the visible contrast between grain bands.

use woodgrain_core::WoodgrainConfig;

/// Closed interval a rewritten feedrate must fall into.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct FeedrateBounds {
    min: f64,
    max: f64,
}

impl FeedrateBounds {
    /// Slowest allowed feedrate.
    #[must_use]
    pub const fn min(&self) -> f64 {
        self.min
    }

    /// Fastest allowed feedrate.
    #[must_use]
    pub const fn max(&self) -> f64 {
        self.max
    }

    /// Clamps a feedrate into the interval.
    #[must_use]
    pub fn clamp(&self, feedrate: f64) -> f64 {
        feedrate.max(self.min).min(self.max)
    }
}

/// Maps a sliced wall feedrate and the layer temperature to a new feedrate.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct FeedrateMapper {
    avg_temp: f64,
    temp_variation: f64,
    fraction: f64,
    minimum: f64,
    ceiling: f64,
}

impl FeedrateMapper {
    /// Creates a mapper from explicit parameters; `variation_pct` is a percentage.
    #[must_use]
    pub fn new(
        avg_temp: f64,
        temp_variation: f64,
        variation_pct: f64,
        minimum: f64,
        ceiling: f64,
    ) -> Self {
        Self {
            avg_temp,
            temp_variation,
            fraction: variation_pct / 100.0,
            minimum,
            ceiling,
        }
    }

    /// Parameters described by the configuration.
    #[must_use]
    pub fn from_config(config: &WoodgrainConfig) -> Self {
        Self::new(
            config.avg_temp,
            config.temp_variation,
            config.wall_feedrate_variation_pct,
            config.minimum_feedrate,
            config.max_wall_feedrate,
        )
    }

    /// Interval the rewritten value of `original` is clamped to.
    ///
    /// The minimum feedrate raises the lower bound but never past the upper one.
    #[must_use]
    pub fn bounds(&self, original: f64) -> FeedrateBounds {
        let max = (original * (1.0 + self.fraction)).min(self.ceiling);
        let min = (original * (1.0 - self.fraction)).max(self.minimum).min(max);
        FeedrateBounds { min, max }
    }

    /// Wall feedrate for a layer printed at `temperature`.
    #[must_use]
    pub fn wall_feedrate(&self, original: f64, temperature: f64) -> f64 {
        let offset = (temperature - self.avg_temp) / self.temp_variation;
        let scaled = original * (1.0 - self.fraction * offset);
        self.bounds(original).clamp(scaled)
    }
}

/// Formats a feedrate with at most three decimals and no trailing zeros.
#[must_use]
pub fn format_feedrate(feedrate: f64) -> String {
    let formatted = format!("{feedrate:.3}");
    let trimmed = formatted.trim_end_matches('0').trim_end_matches('.');
    trimmed.to_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mapper() -> FeedrateMapper {
        FeedrateMapper::new(210.0, 20.0, 20.0, 100.0, 6_000.0)
    }

    #[test]
    fn average_temperature_keeps_feedrate() {
        assert_eq!(mapper().wall_feedrate(1_800.0, 210.0), 1_800.0);
    }

    #[test]
    fn hotter_layers_slow_down() {
        assert_eq!(mapper().wall_feedrate(1_800.0, 230.0), 1_440.0);
        assert_eq!(mapper().wall_feedrate(1_800.0, 220.0), 1_620.0);
    }

    #[test]
    fn cooler_layers_speed_up() {
        assert_eq!(mapper().wall_feedrate(1_800.0, 190.0), 2_160.0);
    }

    #[test]
    fn temperatures_outside_band_are_clamped() {
        let bounds = mapper().bounds(1_800.0);
        assert_eq!(mapper().wall_feedrate(1_800.0, 260.0), bounds.min());
        assert_eq!(mapper().wall_feedrate(1_800.0, 150.0), bounds.max());
    }

    #[test]
    fn hard_ceiling_caps_fast_walls() {
        let mapper = mapper();
        assert_eq!(mapper.bounds(5_500.0).max(), 6_000.0);
        assert_eq!(mapper.wall_feedrate(5_500.0, 190.0), 6_000.0);
    }

    #[test]
    fn minimum_feedrate_lifts_slow_walls() {
        let mapper = mapper();
        let bounds = mapper.bounds(110.0);
        assert_eq!(bounds.min(), 100.0);
        assert_eq!(mapper.wall_feedrate(110.0, 230.0), 100.0);
    }

    #[test]
    fn minimum_never_exceeds_maximum() {
        let bounds = mapper().bounds(50.0);
        assert!(bounds.min() <= bounds.max());
        assert_eq!(bounds.max(), 60.0);
    }

    #[test]
    fn zero_variation_is_identity() {
        let mapper = FeedrateMapper::new(210.0, 20.0, 0.0, 100.0, 6_000.0);
        assert_eq!(mapper.wall_feedrate(1_800.0, 230.0), 1_800.0);
    }

    #[test]
    fn formats_without_trailing_zeros() {
        assert_eq!(format_feedrate(1_800.0), "1800");
        assert_eq!(format_feedrate(1_620.5), "1620.5");
        assert_eq!(format_feedrate(1_234.567_89), "1234.568");
    }
}
