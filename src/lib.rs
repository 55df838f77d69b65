pub mod analytics;
pub mod config;
pub mod error;
pub mod error_bus;
pub mod frame;
pub mod media;
pub mod performance;
pub mod pipeline;
pub mod recovery;
pub mod report;
pub mod stream_manager;
pub mod vision;

pub use analytics::{
    AnalyticsSnapshot, BallPosition, BallTrackingAnalytics, HeatmapCell, PositionStats, VelocityStats,
};
pub use config::PadelConfig;
pub use error::{ErrorCategory, PadelError, Result};
pub use error_bus::{ErrorHandler, ErrorKind, ErrorRecord};
pub use frame::Frame;
pub use media::{MediaDevices, MediaStream, SyntheticCamera};
pub use performance::PerformanceMonitor;
pub use pipeline::{Detection, LiveSession, SessionSummary, StopReason};
pub use recovery::{ErrorBudget, RecoveryAction, RecoveryPolicy};
pub use report::SessionReport;
pub use stream_manager::{SceneSwitch, StreamStats, VideoStreamManager, VideoStreamManagerBuilder};
pub use vision::{BallDetector, BallVelocity, ComputerVisionProcessor, PixelPosition, ProcessingResult};
