#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Lookahead that tells z-hops apart from genuine layer changes.

use woodgrain_core::ZKey;
use woodgrain_gcode::GcodeLine;

/// Scans the moves following a candidate layer change.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ZHopDetector {
    scan_lines: usize,
}

impl ZHopDetector {
    /// Creates a detector inspecting up to `scan_lines` following moves; `0` disables it.
    #[must_use]
    pub const fn new(scan_lines: usize) -> Self {
        Self { scan_lines }
    }

    /// Number of moves inspected after a candidate.
    #[must_use]
    pub const fn scan_lines(&self) -> usize {
        self.scan_lines
    }

    /// Returns whether the height reached at `index` is a transient lift.
    ///
    /// A lift returns below its own height within the next `scan_lines` move
    /// lines; a real layer change never does.
    #[must_use]
    pub fn is_transient(&self, lines: &[GcodeLine], index: usize, candidate: ZKey) -> bool {
        if self.scan_lines == 0 {
            return false;
        }

        lines
            .iter()
            .skip(index + 1)
            .filter(|line| line.is_move())
            .take(self.scan_lines)
            .filter_map(GcodeLine::z)
            .any(|z| ZKey::from_mm(z) < candidate)
    }
}
