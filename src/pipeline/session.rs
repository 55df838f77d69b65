use crate::analytics::BallTrackingAnalytics;
use crate::config::{PadelConfig, PipelineConfig};
use crate::error::{PadelError, PipelineError, Result, StreamError};
use crate::error_bus::ErrorKind;
use crate::performance::PerformanceMonitor;
use crate::recovery::{ErrorBudget, RecoveryAction, RecoveryPolicy};
use crate::stream_manager::VideoStreamManager;
use crate::vision::{BallVelocity, ComputerVisionProcessor, PixelPosition, ProcessingResult};
use parking_lot::Mutex;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

pub const FRAME_METRIC: &str = "frame_processing";

/// A ball found in one frame
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Detection {
    pub frame_id: u64,
    pub position: PixelPosition,
    pub velocity: BallVelocity,
}

/// Why a session ended without error
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    #[default]
    Cancelled,
    FrameLimit,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SessionSummary {
    pub frames_processed: u64,
    pub detections: u64,
    pub frames_dropped: u64,
    pub transient_retries: u64,
    pub corrupt_frames: u64,
    pub slow_frames: u64,
    pub unexpected_errors: u64,
    pub reconnects: u64,
    pub stop_reason: StopReason,
}

/// Releases every camera track when the session ends, however it ends
struct CleanupGuard(Arc<VideoStreamManager>);

impl Drop for CleanupGuard {
    fn drop(&mut self) {
        debug!("Session ended, releasing camera streams");
        self.0.cleanup();
    }
}

/// The live frame loop: capture, detect, record, notify
pub struct LiveSession {
    manager: Arc<VideoStreamManager>,
    processor: ComputerVisionProcessor,
    analytics: Arc<Mutex<BallTrackingAnalytics>>,
    monitor: PerformanceMonitor,
    config: PipelineConfig,
    policy: RecoveryPolicy,
    court_follows_stream: bool,
    frame_limit: Option<u64>,
}

impl LiveSession {
    pub fn new(manager: Arc<VideoStreamManager>, config: &PadelConfig) -> Self {
        let (court_width, court_height) = config.analytics.court_size(&manager.config());
        Self {
            manager,
            processor: ComputerVisionProcessor::new(&config.vision),
            analytics: Arc::new(Mutex::new(BallTrackingAnalytics::new(
                &config.analytics,
                court_width,
                court_height,
            ))),
            monitor: PerformanceMonitor::new(),
            config: config.pipeline.clone(),
            policy: RecoveryPolicy::from_config(&config.pipeline),
            court_follows_stream: config.analytics.fixed_court_size().is_none(),
            frame_limit: None,
        }
    }

    /// Stop after `limit` processed frames
    pub fn with_frame_limit(mut self, limit: u64) -> Self {
        self.frame_limit = Some(limit);
        self
    }

    pub fn with_processor(mut self, processor: ComputerVisionProcessor) -> Self {
        self.processor = processor;
        self
    }

    pub fn manager(&self) -> &Arc<VideoStreamManager> {
        &self.manager
    }

    pub fn analytics(&self) -> Arc<Mutex<BallTrackingAnalytics>> {
        Arc::clone(&self.analytics)
    }

    pub fn monitor(&self) -> &PerformanceMonitor {
        &self.monitor
    }

    /// Run until cancelled, the frame limit is reached or the error budget
    /// is spent. A stream that stays inactive for `stall_threshold` retries
    /// is reconnected once; stalling again before a frame arrives is fatal.
    /// Camera streams are released on every exit path.
    pub async fn run<F>(&mut self, cancel: CancellationToken, mut on_ball: F) -> Result<SessionSummary>
    where
        F: FnMut(&Detection),
    {
        let _cleanup = CleanupGuard(Arc::clone(&self.manager));

        self.manager.initialize().await?;
        self.processor.reset();
        self.analytics.lock().reset();
        self.monitor.clear_metrics();

        let mut ticker = tokio::time::interval(self.config.redraw_interval().max(Duration::from_millis(1)));
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut budget = ErrorBudget::from_config(&self.config);
        let mut summary = SessionSummary::default();
        let mut inactive_streak = 0u32;
        let mut reconnected = false;

        info!("Live session started");
        loop {
            if self.frame_limit.is_some_and(|limit| summary.frames_processed >= limit) {
                summary.stop_reason = StopReason::FrameLimit;
                break;
            }

            tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    summary.stop_reason = StopReason::Cancelled;
                    break;
                }
                _ = ticker.tick() => {}
            }

            let error = match self.process_next(&mut summary, &mut on_ball) {
                Ok(()) => {
                    inactive_streak = 0;
                    reconnected = false;
                    continue;
                }
                Err(e) => e,
            };

            match self.policy.action_for(&error) {
                RecoveryAction::Skip => summary.frames_dropped += 1,
                RecoveryAction::RetryAfterDelay(delay) => {
                    summary.transient_retries += 1;
                    if matches!(error, PadelError::Stream(StreamError::StreamInactive)) {
                        inactive_streak += 1;
                    }

                    if inactive_streak >= self.config.stall_threshold {
                        inactive_streak = 0;
                        if reconnected {
                            error!("Camera stalled again after reconnecting, stopping video processing");
                            return Err(PipelineError::StreamStalled {
                                cycles: self.config.stall_threshold,
                            }
                            .into());
                        }
                        reconnected = true;

                        warn!(
                            "Stream inactive for {} retries, reconnecting camera",
                            self.config.stall_threshold
                        );
                        tokio::select! {
                            biased;
                            _ = cancel.cancelled() => {
                                summary.stop_reason = StopReason::Cancelled;
                                break;
                            }
                            result = self.manager.recover_connection() => {
                                let stream = result.map_err(|e| {
                                    error!("Camera reconnection failed: {}", e);
                                    e
                                })?;
                                summary.reconnects += 1;
                                info!("Camera reconnected on {}", stream.device_id());
                            }
                        }
                        continue;
                    }

                    debug!("Waiting {:?} for the stream: {}", delay, error);
                    tokio::select! {
                        biased;
                        _ = cancel.cancelled() => {
                            summary.stop_reason = StopReason::Cancelled;
                            break;
                        }
                        _ = tokio::time::sleep(delay) => {}
                    }
                }
                RecoveryAction::ReportCorruptFrame => {
                    self.report_corrupt_frame(error.to_string(), &mut summary);
                }
                RecoveryAction::CountAgainstBudget => {
                    summary.unexpected_errors += 1;
                    error!("Frame processing error: {}", error);
                    if budget.record(Instant::now()) {
                        error!("Too many errors, stopping video processing");
                        return Err(PipelineError::ErrorBudgetExceeded {
                            errors: budget.count(),
                            window: budget.window(),
                        }
                        .into());
                    }
                }
                RecoveryAction::Shutdown => {
                    error!("Stopping video processing: {}", error);
                    return Err(error);
                }
            }
        }

        info!(
            "Live session stopped ({:?}): {} frames, {} detections",
            summary.stop_reason, summary.frames_processed, summary.detections
        );
        Ok(summary)
    }

    fn process_next<F>(&mut self, summary: &mut SessionSummary, on_ball: &mut F) -> Result<()>
    where
        F: FnMut(&Detection),
    {
        self.monitor.start(FRAME_METRIC);
        let frame = self.manager.capture_frame()?;
        summary.frames_processed += 1;
        if self.court_follows_stream {
            self.analytics.lock().set_court_size(frame.width, frame.height);
        }

        let result = self.processor.process_frame(&frame);
        match (result.ball_position, result.ball_velocity) {
            (Some(position), Some(velocity)) => {
                self.analytics.lock().add_position(position.x, position.y);
                summary.detections += 1;
                on_ball(&Detection {
                    frame_id: frame.id,
                    position,
                    velocity,
                });
            }
            _ => self.report_failed_result(&result, summary),
        }

        let elapsed = self.monitor.end(FRAME_METRIC)?;
        self.check_processing_time(elapsed, frame.id, summary);
        Ok(())
    }

    fn report_failed_result(&self, result: &ProcessingResult, summary: &mut SessionSummary) {
        summary.corrupt_frames += 1;
        let details = serde_json::to_value(result).ok();
        let message = result
            .error
            .clone()
            .unwrap_or_else(|| "No ball position produced".to_string());
        self.manager
            .error_handler()
            .handle_error(ErrorKind::FrameCorrupt, message, details);
    }

    fn report_corrupt_frame(&self, message: String, summary: &mut SessionSummary) {
        summary.corrupt_frames += 1;
        let details = self.processor.last_position().map(|last_known_position| {
            serde_json::json!({
                "frame_count": self.processor.frame_count(),
                "last_known_position": last_known_position,
            })
        });
        self.manager
            .error_handler()
            .handle_error(ErrorKind::FrameCorrupt, message, details);
    }

    fn check_processing_time(&self, elapsed: Duration, frame_id: u64, summary: &mut SessionSummary) {
        let budget = self.config.processing_budget();
        if elapsed <= budget {
            return;
        }

        summary.slow_frames += 1;
        warn!("Frame {} took {:?} (budget {:?})", frame_id, elapsed, budget);
        self.manager.error_handler().handle_error(
            ErrorKind::ProcessingTimeout,
            format!("Frame {} took {}ms", frame_id, elapsed.as_millis()),
            Some(serde_json::json!({
                "frame_id": frame_id,
                "elapsed_ms": elapsed.as_secs_f64() * 1000.0,
                "budget_ms": budget.as_millis() as u64,
            })),
        );
    }
}
