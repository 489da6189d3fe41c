//! Per-texel numeric contracts of the simulation passes.
//!
//! The same arithmetic exists twice: here for the CPU executor and in
//! `shaders/simulate.wgsl` for the device. Anything tuned here must be tuned
//! there as well.

use crate::state_texture::Texel;
use cgmath::Vector3;

/// Kernel selector: which algebraic rule a pass applies.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum RenderMode {
    /// Advance previous state: position += direction * INTEGRATION_STEP.
    Integrate = 0,
    /// Overwrite the direction texel with the source vector.
    DirectionSeed = 1,
    /// Overwrite the position texel with inputs + source + jitter.
    PositionSeed = 2,
}

impl RenderMode {
    pub fn as_u32(self) -> u32 {
        self as u32
    }
}

/// World units a particle moves per frame per unit of direction.
pub const INTEGRATION_STEP: f32 = 0.01;

/// Per-component magnitude of seeding jitter.
pub const SEED_JITTER: f32 = 0.005;

/// Out-of-band time value signaling "initialize, don't integrate" to the
/// direction kernel on the very first pass.
pub const INIT_TIME_SENTINEL: f32 = -100.0;

/// Synthetic source the direction field is seeded from.
pub fn init_direction_source() -> Vector3<f32> {
    Vector3::new(0.0, -1.0, 0.0)
}

/// Direction kernel: `(previous, renderMode, sourceVector, time) -> direction`.
///
/// Seed mode overwrites with the source; every other mode carries the
/// previous value through unchanged. `time` is part of the contract so the
/// init sentinel shows up in traces, the arithmetic ignores it.
pub fn direction_kernel(prev: Texel, mode: RenderMode, source: Vector3<f32>, _time: f32) -> Texel {
    match mode {
        RenderMode::DirectionSeed => [source.x, source.y, source.z, 1.0],
        RenderMode::Integrate | RenderMode::PositionSeed => prev,
    }
}

/// Position kernel: `(previous, direction, renderMode, sourceVector) -> position`.
///
/// Seed mode lands on `previous + source` plus deterministic per-slot jitter
/// (with inputs unbound, `previous` reads as zero and the texel becomes the
/// source point itself). Integrate mode adds the scaled direction.
pub fn position_kernel(
    prev: Texel,
    dir: Texel,
    mode: RenderMode,
    source: Vector3<f32>,
    slot: u32,
) -> Texel {
    match mode {
        RenderMode::PositionSeed => [
            prev[0] + source.x + seed_jitter(slot, 0),
            prev[1] + source.y + seed_jitter(slot, 1),
            prev[2] + source.z + seed_jitter(slot, 2),
            1.0,
        ],
        RenderMode::Integrate => [
            prev[0] + dir[0] * INTEGRATION_STEP,
            prev[1] + dir[1] * INTEGRATION_STEP,
            prev[2] + dir[2] * INTEGRATION_STEP,
            prev[3],
        ],
        // Direction seeding never targets a position texture.
        RenderMode::DirectionSeed => prev,
    }
}

/// Deterministic jitter in `[-SEED_JITTER, SEED_JITTER]`, keyed by texel
/// identity so reseeding a slot is reproducible.
pub fn seed_jitter(slot: u32, channel: u32) -> f32 {
    let h = hash(slot.wrapping_mul(0x9e37_79b9) ^ channel.wrapping_mul(0x85eb_ca6b));
    (h as f32 / u32::MAX as f32 - 0.5) * 2.0 * SEED_JITTER
}

fn hash(mut x: u32) -> u32 {
    x ^= x >> 16;
    x = x.wrapping_mul(0x7feb_352d);
    x ^= x >> 15;
    x = x.wrapping_mul(0x846c_a68b);
    x ^= x >> 16;
    x
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn direction_seed_overwrites_with_source() {
        let out = direction_kernel(
            [9.0, 9.0, 9.0, 9.0],
            RenderMode::DirectionSeed,
            init_direction_source(),
            INIT_TIME_SENTINEL,
        );
        assert_eq!(out, [0.0, -1.0, 0.0, 1.0]);
    }

    #[test]
    fn integrate_adds_scaled_direction() {
        let out = position_kernel(
            [1.0, 2.0, 3.0, 0.5],
            [100.0, 0.0, -100.0, 0.0],
            RenderMode::Integrate,
            Vector3::new(0.0, 0.0, 0.0),
            0,
        );
        assert!((out[0] - 2.0).abs() < 1e-6);
        assert!((out[1] - 2.0).abs() < 1e-6);
        assert!((out[2] - 2.0).abs() < 1e-6);
        assert_eq!(out[3], 0.5);
    }

    #[test]
    fn position_seed_stays_within_jitter_of_source() {
        for slot in 0..64 {
            let out = position_kernel(
                [0.0; 4],
                [0.0; 4],
                RenderMode::PositionSeed,
                Vector3::new(1.0, 0.0, 0.0),
                slot,
            );
            assert!((out[0] - 1.0).abs() <= SEED_JITTER);
            assert!(out[1].abs() <= SEED_JITTER);
            assert!(out[2].abs() <= SEED_JITTER);
        }
    }

    #[test]
    fn jitter_is_deterministic_per_slot() {
        assert_eq!(seed_jitter(42, 1), seed_jitter(42, 1));
        assert_ne!(seed_jitter(42, 1), seed_jitter(43, 1));
    }
}
