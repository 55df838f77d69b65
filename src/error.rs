use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum PadelError {
    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] toml::ser::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Image export error: {0}")]
    Image(#[from] image::ImageError),

    #[error("Stream error: {0}")]
    Stream(#[from] StreamError),

    #[error("Vision error: {0}")]
    Vision(#[from] VisionError),

    #[error("Performance error: {0}")]
    Performance(#[from] PerformanceError),

    #[error("Pipeline error: {0}")]
    Pipeline(#[from] PipelineError),

    #[error("System error: {message}")]
    System { message: String },

    #[error("Component error in {component}: {message}")]
    Component { component: String, message: String },
}

/// Errors raised while acquiring, switching or reading camera streams
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StreamError {
    #[error("Camera access denied")]
    CameraAccessDenied,

    #[error("Frame dropped")]
    FrameDropped,

    #[error("Stream inactive")]
    StreamInactive,

    #[error("Video not ready")]
    VideoNotReady,

    #[error("Stream not initialized")]
    NotInitialized,

    #[error("Stream acquisition failed: {details}")]
    Acquisition { details: String },

    #[error("Device enumeration failed: {details}")]
    DeviceEnumeration { details: String },

    #[error("Playback failed: {details}")]
    Playback { details: String },

    #[error("Constraints rejected: {details}")]
    Constraints { details: String },

    #[error("Invalid resolution {width}x{height}")]
    InvalidResolution { width: u32, height: u32 },
}

/// Errors raised by the ball detector
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum VisionError {
    #[error("Invalid or corrupted image data: {details}")]
    InvalidFrameData { details: String },

    #[error("No pixels to search in {width}x{height} frame with {padding}px padding")]
    EmptySearchRegion { width: u32, height: u32, padding: u32 },
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PerformanceError {
    #[error("No start time found for metric: {metric}")]
    MissingStart { metric: String },
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PipelineError {
    #[error("Too many errors ({errors} within {window:?}), stopping processing")]
    ErrorBudgetExceeded { errors: u32, window: Duration },

    #[error("Stream stalled again after reconnecting ({cycles} inactive cycles)")]
    StreamStalled { cycles: u32 },
}

/// How an error should be treated by the frame loop
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// Needs user action (camera permission); never retried automatically
    Fatal,
    /// Pacing miss; silently counted
    Expected,
    /// Stream still settling; retried after a short backoff
    Transient,
    /// Corrupt frame data; reported with the last known good detection
    DataIntegrity,
    /// Anything else; counted against the error budget
    Unexpected,
}

impl StreamError {
    pub fn category(&self) -> ErrorCategory {
        match self {
            StreamError::CameraAccessDenied => ErrorCategory::Fatal,
            StreamError::FrameDropped => ErrorCategory::Expected,
            StreamError::StreamInactive | StreamError::VideoNotReady => ErrorCategory::Transient,
            _ => ErrorCategory::Unexpected,
        }
    }
}

impl PadelError {
    pub fn system<S: Into<String>>(message: S) -> Self {
        Self::System {
            message: message.into(),
        }
    }

    pub fn component<S: Into<String>>(component: S, message: S) -> Self {
        Self::Component {
            component: component.into(),
            message: message.into(),
        }
    }

    pub fn category(&self) -> ErrorCategory {
        match self {
            PadelError::Stream(e) => e.category(),
            PadelError::Vision(_) => ErrorCategory::DataIntegrity,
            PadelError::Pipeline(_) => ErrorCategory::Fatal,
            _ => ErrorCategory::Unexpected,
        }
    }
}

pub type Result<T> = std::result::Result<T, PadelError>;
