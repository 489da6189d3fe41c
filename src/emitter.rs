use cgmath::{InnerSpace, Point3, Vector3};
use rand::Rng;

/// Frame-to-frame displacement is scaled up by this factor to act as an
/// instantaneous velocity-like vector.
pub const DISPLACEMENT_SCALE: f32 = 100.0;

/// One frame's emission inputs for one emitter, consumed by the scheduler the
/// same frame it is produced.
#[derive(Clone, Copy, Debug)]
pub struct EmitSample {
    /// Scaled (and possibly x-mirrored) displacement since last frame.
    pub direction: Vector3<f32>,
    /// World position fresh particles spawn at, mirrored together with the
    /// direction.
    pub position: Vector3<f32>,
}

/// Tracks one marker node's motion between frames.
#[derive(Debug)]
pub struct Emitter {
    pub label: String,
    prev: Point3<f32>,
}

/// The set of emitters discovered at startup. Append-only: emitters are
/// registered once and never removed during a session.
#[derive(Debug, Default)]
pub struct EmitterSet {
    emitters: Vec<Emitter>,
}

impl EmitterSet {
    pub fn new() -> Self {
        EmitterSet::default()
    }

    pub fn register(&mut self, label: &str, initial_position: Point3<f32>) {
        log::info!("Registered emitter '{}' at {:?}", label, initial_position);
        self.emitters.push(Emitter {
            label: label.to_string(),
            prev: initial_position,
        });
    }

    pub fn len(&self) -> usize {
        self.emitters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.emitters.is_empty()
    }

    /// Updates every emitter from its current world position and returns one
    /// sample per emitter, in registration order.
    ///
    /// `dir = (p - prev) * DISPLACEMENT_SCALE`; with 50% probability the x
    /// components of both the direction and the emission position are negated
    /// so emission alternates sides. A missing or degenerate position yields
    /// a zero direction (those particles go stationary, not an error).
    pub fn track<R: Rng>(&mut self, positions: &[Point3<f32>], rng: &mut R) -> Vec<EmitSample> {
        if positions.len() != self.emitters.len() {
            log::warn!(
                "Got {} positions for {} emitters",
                positions.len(),
                self.emitters.len()
            );
        }
        let mut samples = Vec::with_capacity(self.emitters.len());
        for (emitter, p) in self.emitters.iter_mut().zip(positions) {
            let mut p = *p;
            let mut dir = (p - emitter.prev) * DISPLACEMENT_SCALE;
            if !dir.magnitude2().is_finite() {
                log::warn!("Emitter '{}' has a degenerate position", emitter.label);
                dir = Vector3::new(0.0, 0.0, 0.0);
                p = emitter.prev;
            }
            emitter.prev = p;
            if rng.gen_bool(0.5) {
                dir.x = -dir.x;
                p.x = -p.x;
            }
            samples.push(EmitSample {
                direction: dir,
                position: Vector3::new(p.x, p.y, p.z),
            });
        }
        samples
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::{rngs::StdRng, SeedableRng};

    #[test]
    fn displacement_is_scaled() {
        let mut set = EmitterSet::new();
        set.register("wing", Point3::new(0.0, 0.0, 0.0));
        let mut rng = StdRng::seed_from_u64(1);
        let samples = set.track(&[Point3::new(0.01, 0.0, -0.02)], &mut rng);
        assert_eq!(samples.len(), 1);
        assert!((samples[0].direction.x.abs() - 1.0).abs() < 1e-4);
        assert!((samples[0].direction.z - -2.0).abs() < 1e-4);
    }

    #[test]
    fn stationary_emitter_yields_zero_direction() {
        let mut set = EmitterSet::new();
        set.register("still", Point3::new(0.5, 0.5, 0.5));
        let mut rng = StdRng::seed_from_u64(1);
        for _ in 0..4 {
            let samples = set.track(&[Point3::new(0.5, 0.5, 0.5)], &mut rng);
            assert_eq!(samples[0].direction.magnitude2(), 0.0);
        }
    }

    #[test]
    fn degenerate_position_is_not_an_error() {
        let mut set = EmitterSet::new();
        set.register("broken", Point3::new(0.0, 0.0, 0.0));
        let mut rng = StdRng::seed_from_u64(1);
        let samples = set.track(&[Point3::new(f32::NAN, 0.0, 0.0)], &mut rng);
        assert_eq!(samples[0].direction.magnitude2(), 0.0);
        // The tracker must also recover on the next frame.
        let samples = set.track(&[Point3::new(0.01, 0.0, 0.0)], &mut rng);
        assert!(samples[0].direction.magnitude2().is_finite());
    }

    #[test]
    fn mirroring_happens_about_half_the_time() {
        let mut set = EmitterSet::new();
        set.register("wing", Point3::new(0.0, 0.0, 0.0));
        let mut rng = StdRng::seed_from_u64(99);
        let mut mirrored = 0;
        let total = 2000;
        let mut x = 0.0;
        for _ in 0..total {
            x += 0.01;
            let samples = set.track(&[Point3::new(x, 0.0, 0.0)], &mut rng);
            // Forward motion is +x, so a negative direction means mirrored.
            if samples[0].direction.x < 0.0 {
                assert!(samples[0].position.x < 0.0);
                mirrored += 1;
            }
        }
        let rate = mirrored as f64 / total as f64;
        assert!(rate > 0.4 && rate < 0.6, "mirror rate {}", rate);
    }
}
