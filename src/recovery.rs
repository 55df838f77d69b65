use crate::config::PipelineConfig;
use crate::error::{ErrorCategory, PadelError};
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, warn};

/// Recovery action to take after a frame cycle fails
#[derive(Debug, Clone, PartialEq)]
pub enum RecoveryAction {
    /// Drop this cycle and carry on
    Skip,
    /// Retry after a delay
    RetryAfterDelay(Duration),
    /// Report the bad frame and carry on
    ReportCorruptFrame,
    /// Count the error; stop once the budget is spent
    CountAgainstBudget,
    /// Stop processing
    Shutdown,
}

/// Maps errors to recovery actions
#[derive(Debug, Clone)]
pub struct RecoveryPolicy {
    transient_backoff: Duration,
}

impl RecoveryPolicy {
    pub fn new(transient_backoff: Duration) -> Self {
        Self { transient_backoff }
    }

    pub fn from_config(config: &PipelineConfig) -> Self {
        Self::new(config.transient_backoff())
    }

    /// Determine recovery action for an error
    pub fn action_for(&self, error: &PadelError) -> RecoveryAction {
        match error.category() {
            ErrorCategory::Fatal => {
                warn!("Non-recoverable error: {}", error);
                RecoveryAction::Shutdown
            }
            ErrorCategory::Expected => RecoveryAction::Skip,
            ErrorCategory::Transient => {
                debug!("Transient error, retrying in {:?}: {}", self.transient_backoff, error);
                RecoveryAction::RetryAfterDelay(self.transient_backoff)
            }
            ErrorCategory::DataIntegrity => RecoveryAction::ReportCorruptFrame,
            ErrorCategory::Unexpected => RecoveryAction::CountAgainstBudget,
        }
    }
}

impl Default for RecoveryPolicy {
    fn default() -> Self {
        Self::from_config(&PipelineConfig::default())
    }
}

/// Counts unexpected errors in a fixed window that restarts once it has
/// elapsed
#[derive(Debug, Clone)]
pub struct ErrorBudget {
    max_errors: u32,
    window: Duration,
    count: u32,
    window_start: Option<Instant>,
}

impl ErrorBudget {
    pub fn new(max_errors: u32, window: Duration) -> Self {
        Self {
            max_errors: max_errors.max(1),
            window,
            count: 0,
            window_start: None,
        }
    }

    pub fn from_config(config: &PipelineConfig) -> Self {
        Self::new(config.max_errors, config.error_window())
    }

    /// Record an error at `now`; returns true once the budget is exhausted
    pub fn record(&mut self, now: Instant) -> bool {
        match self.window_start {
            Some(start) if now.duration_since(start) <= self.window => {}
            _ => {
                self.window_start = Some(now);
                self.count = 0;
            }
        }

        self.count += 1;
        debug!(
            "Error budget: {}/{} within {:?}",
            self.count, self.max_errors, self.window
        );
        self.count >= self.max_errors
    }

    pub fn count(&self) -> u32 {
        self.count
    }

    pub fn max_errors(&self) -> u32 {
        self.max_errors
    }

    pub fn window(&self) -> Duration {
        self.window
    }

    pub fn reset(&mut self) {
        self.count = 0;
        self.window_start = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{PipelineError, StreamError, VisionError};

    #[test]
    fn test_actions_follow_error_category() {
        let policy = RecoveryPolicy::new(Duration::from_millis(100));

        assert_eq!(
            policy.action_for(&StreamError::CameraAccessDenied.into()),
            RecoveryAction::Shutdown
        );
        assert_eq!(
            policy.action_for(&StreamError::FrameDropped.into()),
            RecoveryAction::Skip
        );
        assert_eq!(
            policy.action_for(&StreamError::VideoNotReady.into()),
            RecoveryAction::RetryAfterDelay(Duration::from_millis(100))
        );
        assert_eq!(
            policy.action_for(&StreamError::StreamInactive.into()),
            RecoveryAction::RetryAfterDelay(Duration::from_millis(100))
        );
        assert_eq!(
            policy.action_for(
                &VisionError::InvalidFrameData {
                    details: "empty".to_string()
                }
                .into()
            ),
            RecoveryAction::ReportCorruptFrame
        );
        assert_eq!(
            policy.action_for(&PadelError::system("boom")),
            RecoveryAction::CountAgainstBudget
        );
        assert_eq!(
            policy.action_for(
                &PipelineError::ErrorBudgetExceeded {
                    errors: 5,
                    window: Duration::from_secs(5)
                }
                .into()
            ),
            RecoveryAction::Shutdown
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_budget_exhausted_within_window() {
        let mut budget = ErrorBudget::new(5, Duration::from_secs(5));
        for _ in 0..4 {
            assert!(!budget.record(Instant::now()));
            tokio::time::advance(Duration::from_millis(500)).await;
        }
        assert!(budget.record(Instant::now()));
    }

    #[tokio::test(start_paused = true)]
    async fn test_budget_window_restarts() {
        let mut budget = ErrorBudget::new(3, Duration::from_secs(5));
        assert!(!budget.record(Instant::now()));
        assert!(!budget.record(Instant::now()));

        tokio::time::advance(Duration::from_secs(6)).await;
        assert!(!budget.record(Instant::now()));
        assert_eq!(budget.count(), 1);

        budget.reset();
        assert_eq!(budget.count(), 0);
    }
}
