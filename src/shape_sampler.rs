use crate::kernels::SEED_JITTER;
use crate::sim_params::SamplerParams;
use crate::state_texture::StateTexture;
use rand::Rng;

/// Pixels with a red channel below this value count as silhouette interior.
pub const DARKNESS_THRESHOLD: u8 = 5;

/// Half-extent of the square strays are scattered over.
pub const STRAY_EXTENT: f32 = 1.5;

#[derive(Debug, thiserror::Error)]
pub enum SampleError {
    #[error("silhouette image has no pixels below the darkness threshold")]
    EmptySilhouette,
}

/// Seeds every slot with a point uniform on the unit sphere.
///
/// `phi = acos(U(-1,1))` rather than a uniform angle, so density does not
/// cluster at the poles. `w` carries low-magnitude jitter.
pub fn sphere<R: Rng>(size: u32, rng: &mut R) -> StateTexture {
    let mut grid = StateTexture::new(size);
    for slot in 0..grid.texel_count() {
        let theta = rng.gen_range(0.0..std::f32::consts::TAU);
        let phi = f32::acos(rng.gen_range(-1.0f32..1.0));
        grid.set(
            slot,
            [
                phi.sin() * theta.cos(),
                phi.sin() * theta.sin(),
                phi.cos(),
                jitter(rng),
            ],
        );
    }
    grid
}

/// Seeds every slot from the dark pixels of a rasterized 2-D silhouette.
///
/// The image is resampled to `params.raster_size` square and every pixel
/// darker than [`DARKNESS_THRESHOLD`] becomes a candidate, with coordinates
/// normalized to `[-0.5, 0.5]`. Each slot picks a uniformly random candidate
/// and jitters it, except that with `params.stray_probability` it instead
/// lands uniformly in `[-STRAY_EXTENT, STRAY_EXTENT]^2` as visual noise.
///
/// Fails if the source has no qualifying pixels; a fully bright image would
/// otherwise yield degenerate data.
pub fn silhouette<R: Rng>(
    image: &image::DynamicImage,
    size: u32,
    params: &SamplerParams,
    rng: &mut R,
) -> Result<StateTexture, SampleError> {
    let raster = params.raster_size;
    let raster_f = raster as f32;
    let resized = image
        .resize_exact(raster, raster, image::imageops::FilterType::Triangle)
        .to_rgba8();

    let mut candidates = Vec::new();
    for (x, y, pixel) in resized.enumerate_pixels() {
        if pixel.0[0] < DARKNESS_THRESHOLD {
            candidates.push((
                x as f32 / raster_f - 0.5,
                0.5 - y as f32 / raster_f,
            ));
        }
    }
    if candidates.is_empty() {
        return Err(SampleError::EmptySilhouette);
    }
    log::info!(
        "Silhouette candidates: {} of {} pixels",
        candidates.len(),
        raster * raster
    );

    let mut grid = StateTexture::new(size);
    for slot in 0..grid.texel_count() {
        let (x, y) = if rng.gen_bool(params.stray_probability as f64) {
            (
                rng.gen_range(-STRAY_EXTENT..STRAY_EXTENT),
                rng.gen_range(-STRAY_EXTENT..STRAY_EXTENT),
            )
        } else {
            candidates[rng.gen_range(0..candidates.len())]
        };
        grid.set(
            slot,
            [x + jitter(rng), y + jitter(rng), jitter(rng), jitter(rng)],
        );
    }
    Ok(grid)
}

fn jitter<R: Rng>(rng: &mut R) -> f32 {
    rng.gen_range(-SEED_JITTER..SEED_JITTER)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::{rngs::StdRng, SeedableRng};

    #[test]
    fn sphere_points_stay_on_the_unit_sphere() {
        let mut rng = StdRng::seed_from_u64(7);
        let grid = sphere(16, &mut rng);
        for slot in 0..grid.texel_count() {
            let [x, y, z, w] = grid.get(slot);
            let r2 = x * x + y * y + z * z;
            assert!((r2 - 1.0).abs() < 1e-5, "slot {} off sphere: {}", slot, r2);
            assert!(w.abs() <= SEED_JITTER);
        }
    }

    #[test]
    fn all_bright_silhouette_is_rejected() {
        let img = image::DynamicImage::ImageRgba8(image::RgbaImage::from_pixel(
            32,
            32,
            image::Rgba([255, 255, 255, 255]),
        ));
        let mut rng = StdRng::seed_from_u64(7);
        let result = silhouette(&img, 8, &SamplerParams::default(), &mut rng);
        assert!(matches!(result, Err(SampleError::EmptySilhouette)));
    }

    #[test]
    fn silhouette_slots_land_on_dark_pixels_or_strays() {
        // Dark left half, bright right half.
        let img = image::DynamicImage::ImageRgba8(image::RgbaImage::from_fn(64, 64, |x, _| {
            if x < 32 {
                image::Rgba([0, 0, 0, 255])
            } else {
                image::Rgba([255, 255, 255, 255])
            }
        }));
        let mut rng = StdRng::seed_from_u64(7);
        let params = SamplerParams::default();
        let grid = silhouette(&img, 16, &params, &mut rng).unwrap();
        let bound = STRAY_EXTENT + SEED_JITTER;
        let mut strays = 0;
        for slot in 0..grid.texel_count() {
            let [x, y, z, _] = grid.get(slot);
            assert!(x.abs() <= bound && y.abs() <= bound);
            assert!(z.abs() <= SEED_JITTER);
            // Candidates only exist in the dark (left) half.
            if x > SEED_JITTER {
                strays += 1;
            }
        }
        // Roughly half of the 10% strays fall on the bright side.
        let stray_rate = strays as f32 / grid.texel_count() as f32;
        assert!(stray_rate > 0.01 && stray_rate < 0.15, "{}", stray_rate);
    }
}
