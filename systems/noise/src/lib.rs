#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Deterministic lattice noise used to grow the woodgrain bands.

use rand::{seq::SliceRandom, SeedableRng};
use rand_chacha::ChaCha8Rng;
use sha2::{Digest, Sha256};
use woodgrain_core::ConfigError;

/// Lattice size used when the configuration does not override it.
pub const DEFAULT_TILE_DIMENSION: usize = 256;

const RNG_STREAM_PERMUTATION: &str = "woodgrain/permutation";

/// Seeded Perlin-style noise field with fractal summation.
///
/// The permutation table holds every lattice index twice so that corner
/// hashing never needs a modulo. The field is immutable once built.
#[derive(Clone, Debug)]
pub struct NoiseField {
    mask: i64,
    permutation: Vec<usize>,
}

impl NoiseField {
    /// Builds the field for `seed` over a lattice of `tile_dimension` cells per axis.
    pub fn new(seed: u64, tile_dimension: usize) -> Result<Self, ConfigError> {
        if tile_dimension == 0 || !tile_dimension.is_power_of_two() {
            return Err(ConfigError::TileDimension(tile_dimension));
        }

        let mut shuffled: Vec<usize> = (0..tile_dimension).collect();
        let mut rng = ChaCha8Rng::seed_from_u64(derive_labeled_seed(
            seed,
            tile_dimension,
            RNG_STREAM_PERMUTATION,
        ));
        shuffled.shuffle(&mut rng);

        let mut permutation = Vec::with_capacity(tile_dimension * 2);
        permutation.extend_from_slice(&shuffled);
        permutation.extend_from_slice(&shuffled);

        Ok(Self {
            mask: tile_dimension as i64 - 1,
            permutation,
        })
    }

    /// Number of lattice cells per axis.
    #[must_use]
    pub fn tile_dimension(&self) -> usize {
        self.permutation.len() / 2
    }

    /// Samples the field at a single point; the result lies in `[-1, 1]`.
    #[must_use]
    pub fn noise3(&self, x: f64, y: f64, z: f64) -> f64 {
        let (cell_x, x) = self.split(x);
        let (cell_y, y) = self.split(y);
        let (cell_z, z) = self.split(z);

        let u = fade(x);
        let v = fade(y);
        let w = fade(z);

        let p = &self.permutation;
        let a = p[cell_x] + cell_y;
        let aa = p[a] + cell_z;
        let ab = p[a + 1] + cell_z;
        let b = p[cell_x + 1] + cell_y;
        let ba = p[b] + cell_z;
        let bb = p[b + 1] + cell_z;

        let value = lerp(
            w,
            lerp(
                v,
                lerp(u, grad(p[aa], x, y, z), grad(p[ba], x - 1.0, y, z)),
                lerp(
                    u,
                    grad(p[ab], x, y - 1.0, z),
                    grad(p[bb], x - 1.0, y - 1.0, z),
                ),
            ),
            lerp(
                v,
                lerp(
                    u,
                    grad(p[aa + 1], x, y, z - 1.0),
                    grad(p[ba + 1], x - 1.0, y, z - 1.0),
                ),
                lerp(
                    u,
                    grad(p[ab + 1], x, y - 1.0, z - 1.0),
                    grad(p[bb + 1], x - 1.0, y - 1.0, z - 1.0),
                ),
            ),
        );
        value.clamp(-1.0, 1.0)
    }

    /// Sums `octaves` layers of noise, doubling the frequency and scaling the
    /// amplitude by `persistence` at each step.
    ///
    /// The sum is divided by the accumulated amplitude, so the output range
    /// does not depend on the octave count. Zero octaves yield `0`.
    #[must_use]
    pub fn fractal(
        &self,
        octaves: u32,
        persistence: f64,
        x: f64,
        y: f64,
        z: f64,
        frequency: f64,
    ) -> f64 {
        let mut value = 0.0;
        let mut amplitude = 1.0;
        let mut total_amplitude = 0.0;
        let mut frequency = frequency;

        for _ in 0..octaves {
            value += amplitude * self.noise3(x * frequency, y * frequency, z * frequency);
            total_amplitude += amplitude;
            amplitude *= persistence;
            frequency *= 2.0;
        }

        if total_amplitude == 0.0 {
            return 0.0;
        }
        value / total_amplitude
    }

    fn split(&self, coordinate: f64) -> (usize, f64) {
        let floor = coordinate.floor();
        let cell = (floor as i64) & self.mask;
        (cell as usize, coordinate - floor)
    }
}

fn fade(t: f64) -> f64 {
    t * t * t * (t * (t * 6.0 - 15.0) + 10.0)
}

fn lerp(t: f64, a: f64, b: f64) -> f64 {
    a + t * (b - a)
}

fn grad(hash: usize, x: f64, y: f64, z: f64) -> f64 {
    let h = hash & 15;
    let u = if h < 8 { x } else { y };
    let v = if h < 4 {
        y
    } else if h == 12 || h == 14 {
        x
    } else {
        z
    };
    let first = if h & 1 == 0 { u } else { -u };
    let second = if h & 2 == 0 { v } else { -v };
    first + second
}

fn derive_labeled_seed(seed: u64, tile_dimension: usize, label: &str) -> u64 {
    let mut hasher = Sha256::new();
    hasher.update(seed.to_le_bytes());
    hasher.update((tile_dimension as u64).to_le_bytes());
    hasher.update(label.as_bytes());
    let digest = hasher.finalize();
    let mut bytes = [0u8; 8];
    bytes.copy_from_slice(&digest[0..8]);
    u64::from_le_bytes(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fade_hits_endpoints_flat() {
        assert_eq!(fade(0.0), 0.0);
        assert_eq!(fade(1.0), 1.0);
        assert_eq!(fade(0.5), 0.5);
    }

    #[test]
    fn gradient_selection_follows_hash_bits() {
        assert_eq!(grad(0, 1.0, 2.0, 3.0), 3.0);
        assert_eq!(grad(3, 1.0, 2.0, 3.0), -3.0);
        assert_eq!(grad(4, 1.0, 2.0, 3.0), 4.0);
        assert_eq!(grad(8, 1.0, 2.0, 3.0), 5.0);
        assert_eq!(grad(12, 1.0, 2.0, 3.0), 3.0);
        assert_eq!(grad(14, 1.0, 2.0, 3.0), 1.0);
        assert_eq!(grad(16, 1.0, 2.0, 3.0), grad(0, 1.0, 2.0, 3.0));
    }

    #[test]
    fn permutation_is_a_duplicated_shuffle() {
        let field = NoiseField::new(42, 16).expect("valid tile dimension");
        assert_eq!(field.tile_dimension(), 16);
        let (first, second) = field.permutation.split_at(16);
        assert_eq!(first, second);
        let mut sorted = first.to_vec();
        sorted.sort_unstable();
        assert_eq!(sorted, (0..16).collect::<Vec<_>>());
    }

    #[test]
    fn labeled_seeds_separate_tile_sizes() {
        assert_ne!(
            derive_labeled_seed(1, 256, RNG_STREAM_PERMUTATION),
            derive_labeled_seed(1, 128, RNG_STREAM_PERMUTATION)
        );
    }
}
