use serde::Serialize;

/// Detected ball location in image pixels
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct PixelPosition {
    pub x: f64,
    pub y: f64,
}

impl PixelPosition {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

/// Frame-to-frame ball displacement in meters
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct BallVelocity {
    pub x: f64,
    pub y: f64,
}

impl BallVelocity {
    pub const ZERO: BallVelocity = BallVelocity { x: 0.0, y: 0.0 };

    pub fn speed(&self) -> f64 {
        (self.x * self.x + self.y * self.y).sqrt()
    }
}

/// Last good detection handed out when a frame cannot be processed
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct FallbackData {
    pub frame_count: u64,
    pub last_known_position: PixelPosition,
}

/// Outcome of processing one frame
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct ProcessingResult {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ball_position: Option<PixelPosition>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ball_velocity: Option<BallVelocity>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fallback: Option<FallbackData>,
}

impl ProcessingResult {
    pub fn detected(position: PixelPosition, velocity: BallVelocity) -> Self {
        Self {
            ball_position: Some(position),
            ball_velocity: Some(velocity),
            ..Self::default()
        }
    }

    pub fn failed(error: String, fallback: Option<FallbackData>) -> Self {
        Self {
            error: Some(error),
            fallback,
            ..Self::default()
        }
    }

    pub fn is_detection(&self) -> bool {
        self.ball_position.is_some()
    }
}
