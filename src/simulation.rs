//! Pure frame planning for the off-screen simulation.
//!
//! `SimState` is the explicit per-instance state (clock, init phase, ring
//! cursor) and turns one frame's inputs into a `FramePlan`: the ordered list
//! of render passes plus the ping-pong swap directive. The plan is executed
//! either by the GPU scheduler in `particle_system.rs` or by the CPU executor
//! in `cpu_simulator.rs`, which keeps a whole frame testable without a
//! display surface.

use crate::emitter::EmitSample;
use crate::kernels::{init_direction_source, RenderMode, INIT_TIME_SENTINEL};
use cgmath::Vector3;
use std::ops::Range;

/// Which texture a pass renders into. `CurrentPosition` is the committed
/// buffer of the ping-pong pair, `NextPosition` the one being written this
/// frame; the executor resolves both through its active index.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Attachment {
    Directions,
    CurrentPosition,
    NextPosition,
}

/// One off-screen render pass over a contiguous slot range.
#[derive(Clone, Debug)]
pub struct SimPass {
    pub attachment: Attachment,
    pub mode: RenderMode,
    pub range: Range<u32>,
    pub source: Vector3<f32>,
    /// When false the previous-position and direction inputs are treated as
    /// unbound and read as zero, so seed modes emit fresh values instead of
    /// integrating old ones.
    pub read_state: bool,
    pub time: f32,
}

/// Everything the executor needs to run one frame.
#[derive(Clone, Debug)]
pub struct FramePlan {
    pub passes: Vec<SimPass>,
    /// Flip the position pair after the passes so the next frame (and the
    /// visible point cloud) reads what was just written.
    pub swap: bool,
}

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Phase {
    Uninitialized,
    Seeded,
    Steady,
}

/// Scheduler state that survives between frames.
#[derive(Debug)]
pub struct SimState {
    slot_count: u32,
    emit_batch: u32,
    reseed_directions: bool,
    phase: Phase,
    cursor: u32,
    time: f32,
}

impl SimState {
    pub fn new(grid_size: u32, emit_batch: u32, reseed_directions: bool) -> Self {
        SimState {
            slot_count: grid_size * grid_size,
            emit_batch,
            reseed_directions,
            phase: Phase::Uninitialized,
            cursor: 0,
            time: 0.0,
        }
    }

    pub fn from_params(params: &crate::sim_params::SimParams) -> Self {
        SimState::new(
            params.particle_grid_size,
            params.emit_batch_size,
            params.reseed_directions,
        )
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn cursor(&self) -> u32 {
        self.cursor
    }

    pub fn slot_count(&self) -> u32 {
        self.slot_count
    }

    pub fn time(&self) -> f32 {
        self.time
    }

    /// Plans one frame: seed passes on the first call, then the steady step
    /// of full-range integration followed by per-emitter partial respawn,
    /// advancing the ring cursor batch by batch.
    pub fn plan_frame(&mut self, dt: f32, emits: &[EmitSample]) -> FramePlan {
        self.time += dt;
        let n = self.slot_count;
        let zero = Vector3::new(0.0, 0.0, 0.0);
        let mut passes = Vec::with_capacity(3 + 2 * emits.len());

        if self.phase == Phase::Uninitialized {
            // Capture the synthetic direction field, then commit the shape
            // seed as the initial position state.
            passes.push(SimPass {
                attachment: Attachment::Directions,
                mode: RenderMode::DirectionSeed,
                range: 0..n,
                source: init_direction_source(),
                read_state: true,
                time: INIT_TIME_SENTINEL,
            });
            passes.push(SimPass {
                attachment: Attachment::CurrentPosition,
                mode: RenderMode::PositionSeed,
                range: 0..n,
                source: zero,
                read_state: true,
                time: self.time,
            });
            self.phase = Phase::Seeded;
        }

        if self.reseed_directions {
            passes.push(SimPass {
                attachment: Attachment::Directions,
                mode: RenderMode::DirectionSeed,
                range: 0..n,
                source: init_direction_source(),
                read_state: true,
                time: self.time,
            });
        }

        passes.push(SimPass {
            attachment: Attachment::NextPosition,
            mode: RenderMode::Integrate,
            range: 0..n,
            source: zero,
            read_state: true,
            time: self.time,
        });

        for sample in emits {
            let start = self.cursor;
            // A batch touching the end of the index space is truncated there;
            // the cursor itself wraps.
            let end = (start + self.emit_batch).min(n);
            passes.push(SimPass {
                attachment: Attachment::Directions,
                mode: RenderMode::DirectionSeed,
                range: start..end,
                source: sample.direction,
                read_state: false,
                time: self.time,
            });
            passes.push(SimPass {
                attachment: Attachment::NextPosition,
                mode: RenderMode::PositionSeed,
                range: start..end,
                source: sample.position,
                read_state: false,
                time: self.time,
            });
            self.cursor = (start + self.emit_batch) % n;
        }

        self.phase = Phase::Steady;
        FramePlan {
            passes,
            swap: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(direction: [f32; 3], position: [f32; 3]) -> EmitSample {
        EmitSample {
            direction: Vector3::from(direction),
            position: Vector3::from(position),
        }
    }

    #[test]
    fn first_frame_prepends_seed_passes() {
        let mut state = SimState::new(4, 5, false);
        assert_eq!(state.phase(), Phase::Uninitialized);
        let plan = state.plan_frame(0.05, &[]);
        assert_eq!(plan.passes.len(), 3);
        assert_eq!(plan.passes[0].attachment, Attachment::Directions);
        assert_eq!(plan.passes[0].mode, RenderMode::DirectionSeed);
        assert_eq!(plan.passes[0].time, INIT_TIME_SENTINEL);
        assert_eq!(plan.passes[0].source, init_direction_source());
        assert_eq!(plan.passes[1].attachment, Attachment::CurrentPosition);
        assert_eq!(plan.passes[1].mode, RenderMode::PositionSeed);
        assert_eq!(plan.passes[2].mode, RenderMode::Integrate);
        assert_eq!(plan.passes[2].range, 0..16);
        assert!(plan.swap);
        assert_eq!(state.phase(), Phase::Steady);
    }

    #[test]
    fn steady_frame_without_emitters_is_pure_integration() {
        let mut state = SimState::new(4, 5, false);
        state.plan_frame(0.05, &[]);
        let plan = state.plan_frame(0.05, &[]);
        assert_eq!(plan.passes.len(), 1);
        assert_eq!(plan.passes[0].mode, RenderMode::Integrate);
        assert_eq!(plan.passes[0].attachment, Attachment::NextPosition);
        assert_eq!(state.cursor(), 0);
    }

    #[test]
    fn reseed_option_adds_a_full_range_direction_pass() {
        let mut state = SimState::new(4, 5, true);
        state.plan_frame(0.05, &[]);
        let plan = state.plan_frame(0.05, &[]);
        assert_eq!(plan.passes.len(), 2);
        assert_eq!(plan.passes[0].mode, RenderMode::DirectionSeed);
        assert_eq!(plan.passes[0].range, 0..16);
        assert_eq!(plan.passes[0].source, init_direction_source());
        assert_eq!(plan.passes[1].mode, RenderMode::Integrate);
    }

    #[test]
    fn emitters_get_ranged_passes_in_registration_order() {
        let mut state = SimState::new(4, 5, false);
        state.plan_frame(0.05, &[]);
        let emits = [
            sample([1.0, 0.0, 0.0], [0.1, 0.0, 0.0]),
            sample([0.0, 1.0, 0.0], [0.0, 0.1, 0.0]),
        ];
        let plan = state.plan_frame(0.05, &emits);
        // Integrate + (direction, position) per emitter.
        assert_eq!(plan.passes.len(), 5);
        assert_eq!(plan.passes[1].range, 0..5);
        assert_eq!(plan.passes[1].mode, RenderMode::DirectionSeed);
        assert!(!plan.passes[1].read_state);
        assert_eq!(plan.passes[2].range, 0..5);
        assert_eq!(plan.passes[2].mode, RenderMode::PositionSeed);
        assert_eq!(plan.passes[3].range, 5..10);
        assert_eq!(plan.passes[4].source, Vector3::new(0.0, 0.1, 0.0));
        assert_eq!(state.cursor(), 10);
    }

    #[test]
    fn ring_cursor_wraps_modulo_slot_count() {
        let mut state = SimState::new(4, 5, false);
        let emits = [sample([0.0; 3], [0.0; 3])];
        let batches = 7u32; // 7 * 5 = 35 > 16
        for _ in 0..batches {
            state.plan_frame(0.05, &emits);
        }
        assert_eq!(state.cursor(), (batches * 5) % 16);
        assert!(state.cursor() < 16);
    }

    #[test]
    fn batch_ranges_never_exceed_the_index_space() {
        let mut state = SimState::new(4, 5, false);
        let emits = [sample([0.0; 3], [0.0; 3])];
        for _ in 0..50 {
            let plan = state.plan_frame(0.05, &emits);
            for pass in &plan.passes {
                assert!(pass.range.end <= 16);
                assert!(pass.range.start < pass.range.end);
            }
        }
    }
}
