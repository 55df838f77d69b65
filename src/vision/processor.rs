use super::detector::{BallDetector, BrightestPixelDetector, Jitter};
use super::types::{BallVelocity, FallbackData, PixelPosition, ProcessingResult};
use crate::config::VisionConfig;
use crate::error::VisionError;
use crate::frame::Frame;
use tracing::{debug, info, warn};

/// Per-frame ball detection and velocity estimation
pub struct ComputerVisionProcessor {
    detector: Box<dyn BallDetector>,
    pixels_to_meters: f64,
    last_position: Option<PixelPosition>,
    frame_count: u64,
}

impl ComputerVisionProcessor {
    /// Create a processor using the brightest-pixel detector
    pub fn new(config: &VisionConfig) -> Self {
        info!(
            "Initializing vision processor (padding {}px, {} m/px, jitter ±{}px)",
            config.padding, config.pixels_to_meters, config.jitter_px
        );

        let mut detector = BrightestPixelDetector::new(config.padding);
        if config.jitter_px > 0.0 {
            detector = detector.with_jitter(Jitter::new(config.jitter_px, config.jitter_seed));
        }

        Self::with_detector(Box::new(detector), config.pixels_to_meters)
    }

    /// Create a processor around any detector
    pub fn with_detector(detector: Box<dyn BallDetector>, pixels_to_meters: f64) -> Self {
        Self {
            detector,
            pixels_to_meters,
            last_position: None,
            frame_count: 0,
        }
    }

    /// Detect the ball in `frame` and estimate its velocity.
    ///
    /// Never fails: problems are reported through `error`, together with the
    /// last known position when there is one.
    pub fn process_frame(&mut self, frame: &Frame) -> ProcessingResult {
        match self.try_process(frame) {
            Ok((position, velocity)) => ProcessingResult::detected(position, velocity),
            Err(e) => {
                warn!("Frame {} rejected: {}", frame.id, e);
                let fallback = self.last_position.map(|last_known_position| FallbackData {
                    frame_count: self.frame_count,
                    last_known_position,
                });
                ProcessingResult::failed(e.to_string(), fallback)
            }
        }
    }

    fn try_process(&mut self, frame: &Frame) -> Result<(PixelPosition, BallVelocity), VisionError> {
        Self::validate(frame)?;
        self.frame_count += 1;

        let position = self.detector.detect(frame)?;
        let velocity = self.velocity_to(position);
        self.last_position = Some(position);

        debug!(
            "Frame {}: ball at ({:.1}, {:.1}), velocity ({:.3}, {:.3}) m",
            frame.id, position.x, position.y, velocity.x, velocity.y
        );
        Ok((position, velocity))
    }

    fn validate(frame: &Frame) -> Result<(), VisionError> {
        if frame.validate_size() {
            return Ok(());
        }
        Err(VisionError::InvalidFrameData {
            details: format!(
                "{} bytes for {}x{} RGBA frame (expected {})",
                frame.data.len(),
                frame.width,
                frame.height,
                frame.expected_size()
            ),
        })
    }

    fn velocity_to(&self, current: PixelPosition) -> BallVelocity {
        match self.last_position {
            Some(last) => BallVelocity {
                x: (current.x - last.x) * self.pixels_to_meters,
                y: (current.y - last.y) * self.pixels_to_meters,
            },
            None => BallVelocity::ZERO,
        }
    }

    /// Forget the previous detection; call at every new session
    pub fn reset(&mut self) {
        self.last_position = None;
        self.frame_count = 0;
    }

    pub fn last_position(&self) -> Option<PixelPosition> {
        self.last_position
    }

    pub fn frame_count(&self) -> u64 {
        self.frame_count
    }
}
