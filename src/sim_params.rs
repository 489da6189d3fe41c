use serde::{Deserialize, Serialize};

// Parameters that define the simulation. These don't change at runtime,
// except for `progress` which the frame driver may animate.
#[derive(Debug, Serialize, Deserialize, Clone, Copy)]
pub struct SimParams {
    /// Side length of the square state texture; the swarm holds
    /// `particle_grid_size^2` particles.
    pub particle_grid_size: u32,
    /// Particle slots overwritten per emitter per frame.
    pub emit_batch_size: u32,
    /// Externally driven blend scalar in `0..=1`, forwarded to the kernels.
    pub progress: f32,

    pub fps: f64,

    /// Re-run the full-range direction seed pass every steady frame before
    /// per-emitter overwrites, pulling every slot back toward the global
    /// drift. Off by default: emitted directions persist until overwritten.
    pub reseed_directions: bool,

    #[serde(default)]
    pub sampler: SamplerParams,

    #[serde(default)]
    pub display: DisplayParams,
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy)]
pub struct SamplerParams {
    /// Working resolution the silhouette image is rasterized to.
    pub raster_size: u32,
    /// Chance a slot is seeded as a stray outside the silhouette.
    pub stray_probability: f32,
}

impl Default for SamplerParams {
    fn default() -> Self {
        SamplerParams {
            raster_size: 200,
            stray_probability: 0.1,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy)]
pub struct DisplayParams {
    pub point_alpha: f32,
    pub background: [f32; 3],
}

impl Default for DisplayParams {
    fn default() -> Self {
        DisplayParams {
            point_alpha: 0.35,
            background: [0.13, 0.13, 0.13],
        }
    }
}

impl std::str::FromStr for SimParams {
    type Err = toml::de::Error;
    fn from_str(serialized: &str) -> Result<Self, Self::Err> {
        let params = toml::from_str(serialized)?;
        Ok(params)
    }
}

impl Default for SimParams {
    fn default() -> Self {
        SimParams {
            particle_grid_size: 256,
            emit_batch_size: 5,
            progress: 0.0,
            fps: 60.0,
            reseed_directions: false,
            sampler: SamplerParams::default(),
            display: DisplayParams::default(),
        }
    }
}

impl SimParams {
    pub fn slot_count(&self) -> u32 {
        self.particle_grid_size * self.particle_grid_size
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn smoke() {
        let params = SimParams {
            particle_grid_size: 128,
            emit_batch_size: 7,
            progress: 0.5,
            fps: 30.0,
            reseed_directions: true,
            sampler: SamplerParams::default(),
            display: DisplayParams::default(),
        };
        let serialized = toml::to_string(&params).unwrap();
        let deserialized: SimParams = toml::from_str(&serialized).unwrap();
        assert_eq!(params.particle_grid_size, deserialized.particle_grid_size);
        assert_eq!(params.emit_batch_size, deserialized.emit_batch_size);
        assert_eq!(params.reseed_directions, deserialized.reseed_directions);
        assert_eq!(deserialized.slot_count(), 128 * 128);
    }

    #[test]
    fn nested_sections_are_optional() {
        let deserialized: SimParams = toml::from_str(
            "particle_grid_size = 64\n\
             emit_batch_size = 5\n\
             progress = 0.0\n\
             fps = 60.0\n\
             reseed_directions = false\n",
        )
        .unwrap();
        assert_eq!(deserialized.sampler.raster_size, 200);
        assert!((deserialized.sampler.stray_probability - 0.1).abs() < 1e-6);
    }
}
