//! Simulation clock.

use serde::{Deserialize, Serialize};

use crate::engine::types::Tick;

/// Clock resource advanced by the scheduler at the start of every tick.
///
/// `elapsed` accumulates the `f32` frame deltas widened to `f64`; it inherits
/// their rounding but not the extra error of an `f32` running sum.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Time {
    /// Seconds since the session started, including the current tick.
    pub elapsed: f64,
    /// Length of the current tick in seconds.
    pub delta: f32,
    /// Number of the current tick, starting at 1.
    pub tick: Tick,
}

impl Time {
    /// Moves the clock forward by one tick of `delta` seconds.
    pub fn advance(&mut self, delta: f32) {
        self.tick += 1;
        self.delta = delta;
        self.elapsed += f64::from(delta);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn advance_accumulates() {
        let mut time = Time::default();
        time.advance(0.5);
        time.advance(0.25);
        assert_eq!(time.tick, 2);
        assert_eq!(time.delta, 0.25);
        assert!((time.elapsed - 0.75).abs() < 1e-12);
    }
}
