mod detector;
mod processor;
mod types;

pub use detector::{BallDetector, BrightestPixelDetector, Jitter};
pub use processor::ComputerVisionProcessor;
pub use types::{BallVelocity, FallbackData, PixelPosition, ProcessingResult};
