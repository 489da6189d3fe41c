//! CPU twin of the GPU pass executor.
//!
//! Runs `FramePlan`s against in-memory state textures with a real ping-pong
//! pair, using the same per-texel kernels the WGSL shaders implement. This is
//! what makes one simulation frame deterministic and testable without a
//! device; it is not a performance path.

use crate::kernels::{direction_kernel, position_kernel};
use crate::simulation::{Attachment, FramePlan};
use crate::state_texture::StateTexture;

pub struct CpuSimulator {
    positions: [StateTexture; 2],
    directions: StateTexture,
    active: usize,
    frame: u64,
    /// Frame number each position buffer was last written in.
    written: [u64; 2],
}

impl CpuSimulator {
    /// `seed` becomes the committed position state the first frame reads,
    /// mirroring the shape texture uploaded to the device at startup.
    pub fn new(seed: StateTexture) -> Self {
        let size = seed.size();
        CpuSimulator {
            positions: [seed, StateTexture::new(size)],
            directions: StateTexture::new(size),
            active: 0,
            frame: 0,
            written: [0, 0],
        }
    }

    /// The buffer the point cloud would be drawn from right now.
    pub fn current_positions(&self) -> &StateTexture {
        &self.positions[self.active]
    }

    pub fn directions(&self) -> &StateTexture {
        &self.directions
    }

    pub fn frame(&self) -> u64 {
        self.frame
    }

    /// True when the committed buffer is the one written this frame.
    pub fn current_is_fresh(&self) -> bool {
        self.written[self.active] == self.frame
    }

    pub fn execute(&mut self, plan: &FramePlan) {
        self.frame += 1;
        for pass in &plan.passes {
            match pass.attachment {
                Attachment::Directions => {
                    for slot in pass.range.clone() {
                        let prev = if pass.read_state {
                            self.directions.get(slot)
                        } else {
                            [0.0; 4]
                        };
                        self.directions.set(
                            slot,
                            direction_kernel(prev, pass.mode, pass.source, pass.time),
                        );
                    }
                }
                Attachment::CurrentPosition => {
                    // Seeding the committed buffer; kernels are per-texel so
                    // updating in place matches the device's separate seed
                    // texture read.
                    for slot in pass.range.clone() {
                        let prev = if pass.read_state {
                            self.positions[self.active].get(slot)
                        } else {
                            [0.0; 4]
                        };
                        let dir = if pass.read_state {
                            self.directions.get(slot)
                        } else {
                            [0.0; 4]
                        };
                        let out = position_kernel(prev, dir, pass.mode, pass.source, slot);
                        self.positions[self.active].set(slot, out);
                    }
                    self.written[self.active] = self.frame;
                }
                Attachment::NextPosition => {
                    let (front, back) = if self.active == 0 {
                        let (a, b) = self.positions.split_at_mut(1);
                        (&a[0], &mut b[0])
                    } else {
                        let (a, b) = self.positions.split_at_mut(1);
                        (&b[0], &mut a[0])
                    };
                    for slot in pass.range.clone() {
                        let prev = if pass.read_state {
                            front.get(slot)
                        } else {
                            [0.0; 4]
                        };
                        let dir = if pass.read_state {
                            self.directions.get(slot)
                        } else {
                            [0.0; 4]
                        };
                        back.set(slot, position_kernel(prev, dir, pass.mode, pass.source, slot));
                    }
                    self.written[self.active ^ 1] = self.frame;
                }
            }
        }
        if plan.swap {
            self.active ^= 1;
        }
    }
}
