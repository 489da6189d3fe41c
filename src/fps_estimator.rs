use log::info;

/// Measures the wall-clock duration of each display frame. The device is
/// flow-controlled by the display's cadence, so this is measurement only, no
/// explicit sleeping.
#[derive(Debug)]
pub struct FpsEstimator {
    iteration_start: std::time::Instant,
    pub iteration_duration: std::time::Duration,
}

impl FpsEstimator {
    pub fn new(fps: f64) -> FpsEstimator {
        FpsEstimator {
            iteration_start: std::time::Instant::now(),
            iteration_duration: std::time::Duration::from_secs_f64(1.0 / fps),
        }
    }

    pub fn tick(&mut self) -> std::time::Duration {
        let budget = self.iteration_start + self.iteration_duration;
        let now = std::time::Instant::now();
        if now > budget {
            info!("Over time budget by: {:?}", now - budget);
        }
        let delta_t = self.iteration_start.elapsed();
        self.iteration_start = std::time::Instant::now();
        delta_t
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tick_measures_elapsed_time() {
        let mut fps = FpsEstimator::new(1000.0);
        std::thread::sleep(std::time::Duration::from_millis(2));
        let dt = fps.tick();
        assert!(dt >= std::time::Duration::from_millis(2));
    }
}
