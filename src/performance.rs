use crate::error::PerformanceError;
use std::collections::HashMap;
use std::time::Duration;
use tokio::time::Instant;
use tracing::trace;

/// Named-metric stopwatch
#[derive(Debug, Default)]
pub struct PerformanceMonitor {
    metrics: HashMap<String, Duration>,
    start_times: HashMap<String, Instant>,
}

impl PerformanceMonitor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the start time of `metric`, replacing any earlier start
    pub fn start(&mut self, metric: &str) {
        self.start_times.insert(metric.to_string(), Instant::now());
    }

    /// Store and return the time elapsed since the matching `start`
    pub fn end(&mut self, metric: &str) -> Result<Duration, PerformanceError> {
        let started = self
            .start_times
            .get(metric)
            .ok_or_else(|| PerformanceError::MissingStart {
                metric: metric.to_string(),
            })?;

        let duration = started.elapsed();
        trace!("Metric {} took {:?}", metric, duration);
        self.metrics.insert(metric.to_string(), duration);
        Ok(duration)
    }

    /// Time a closure under `metric`
    pub fn measure<T, F: FnOnce() -> T>(&mut self, metric: &str, f: F) -> (T, Duration) {
        let started = Instant::now();
        let value = f();
        let duration = started.elapsed();
        self.metrics.insert(metric.to_string(), duration);
        (value, duration)
    }

    pub fn metric(&self, metric: &str) -> Option<Duration> {
        self.metrics.get(metric).copied()
    }

    pub fn all_metrics(&self) -> HashMap<String, Duration> {
        self.metrics.clone()
    }

    pub fn clear_metrics(&mut self) {
        self.metrics.clear();
        self.start_times.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_start_end_records_elapsed() {
        let mut monitor = PerformanceMonitor::new();
        monitor.start("frame");
        tokio::time::advance(Duration::from_millis(12)).await;

        let elapsed = monitor.end("frame").unwrap();
        assert_eq!(elapsed, Duration::from_millis(12));
        assert_eq!(monitor.metric("frame"), Some(elapsed));
    }

    #[test]
    fn test_end_without_start_fails() {
        let mut monitor = PerformanceMonitor::new();
        let err = monitor.end("frame").unwrap_err();
        assert_eq!(
            err,
            PerformanceError::MissingStart {
                metric: "frame".to_string()
            }
        );
        assert!(monitor.metric("frame").is_none());
    }

    #[test]
    fn test_clear_metrics_forgets_starts() {
        let mut monitor = PerformanceMonitor::new();
        monitor.start("detect");
        monitor.end("detect").unwrap();
        let (value, _) = monitor.measure("sum", || 2 + 2);
        assert_eq!(value, 4);
        assert_eq!(monitor.all_metrics().len(), 2);

        monitor.clear_metrics();
        assert!(monitor.all_metrics().is_empty());
        assert!(monitor.end("detect").is_err());
    }
}
