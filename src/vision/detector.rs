use super::types::PixelPosition;
use crate::error::VisionError;
use crate::frame::Frame;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::trace;

/// Capability interface for anything that can locate the ball in a frame.
///
/// Implementations receive frames that already passed size validation.
pub trait BallDetector: Send {
    fn detect(&mut self, frame: &Frame) -> Result<PixelPosition, VisionError>;
}

/// Bounded per-axis noise added to detections
#[derive(Debug)]
pub struct Jitter {
    amount: f64,
    rng: StdRng,
}

impl Jitter {
    /// Uniform noise in `[-amount, amount]`; `seed` makes it reproducible
    pub fn new(amount: f64, seed: Option<u64>) -> Self {
        let seed = seed.unwrap_or_else(rand::random);
        Self {
            amount: amount.abs(),
            rng: StdRng::seed_from_u64(seed),
        }
    }

    fn sample(&mut self) -> f64 {
        if self.amount == 0.0 {
            return 0.0;
        }
        self.rng.random_range(-self.amount..=self.amount)
    }
}

/// Heuristic detector picking the brightest pixel inside a padded region.
///
/// Scans top-to-bottom, left-to-right and keeps the first maximum, so the
/// result is deterministic when jitter is disabled.
#[derive(Debug)]
pub struct BrightestPixelDetector {
    padding: u32,
    jitter: Option<Jitter>,
}

impl BrightestPixelDetector {
    pub fn new(padding: u32) -> Self {
        Self {
            padding,
            jitter: None,
        }
    }

    pub fn with_jitter(mut self, jitter: Jitter) -> Self {
        self.jitter = Some(jitter);
        self
    }

    pub fn padding(&self) -> u32 {
        self.padding
    }

    /// Inclusive search bounds `(x_min, x_max, y_min, y_max)`
    fn search_region(&self, width: u32, height: u32) -> Option<(u32, u32, u32, u32)> {
        if width == 0 || height == 0 {
            return None;
        }
        let x_min = self.padding;
        let x_max = width.saturating_sub(self.padding).min(width - 1);
        let y_min = self.padding;
        let y_max = height.saturating_sub(self.padding).min(height - 1);

        if x_min > x_max || y_min > y_max {
            None
        } else {
            Some((x_min, x_max, y_min, y_max))
        }
    }
}

impl BallDetector for BrightestPixelDetector {
    fn detect(&mut self, frame: &Frame) -> Result<PixelPosition, VisionError> {
        let (x_min, x_max, y_min, y_max) = self
            .search_region(frame.width, frame.height)
            .ok_or(VisionError::EmptySearchRegion {
                width: frame.width,
                height: frame.height,
                padding: self.padding,
            })?;

        let mut best = (x_min, y_min);
        let mut best_intensity = None;

        for y in y_min..=y_max {
            for x in x_min..=x_max {
                let intensity = frame.intensity_at(x, y).unwrap_or(0);
                if best_intensity.map_or(true, |current| intensity > current) {
                    best_intensity = Some(intensity);
                    best = (x, y);
                }
            }
        }

        trace!(
            "Brightest pixel at ({}, {}) intensity {:?}",
            best.0,
            best.1,
            best_intensity
        );

        let (mut x, mut y) = (best.0 as f64, best.1 as f64);
        if let Some(jitter) = self.jitter.as_mut() {
            x += jitter.sample();
            y += jitter.sample();
        }

        Ok(PixelPosition::new(
            x.clamp(x_min as f64, x_max as f64),
            y.clamp(y_min as f64, y_max as f64),
        ))
    }
}
