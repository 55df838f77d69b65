use serde::Serialize;
use std::time::Duration;

/// Capture statistics for the manager's lifetime (or since the last reset)
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct StreamStats {
    pub dropped_frames: u64,
    pub recovery_attempts: u64,
    pub average_frame_rate: f64,
    pub total_frames: u64,
}

impl StreamStats {
    pub fn record_dropped_frame(&mut self) {
        self.dropped_frames += 1;
    }

    pub fn record_recovery_attempt(&mut self) {
        self.recovery_attempts += 1;
    }

    /// Count a delivered frame; `since_first` is the time since the first
    /// frame counted after the last reset
    pub fn record_frame(&mut self, since_first: Duration) {
        self.total_frames += 1;
        let elapsed = since_first.as_secs_f64();
        self.average_frame_rate = if self.total_frames > 1 && elapsed > 0.0 {
            (self.total_frames - 1) as f64 / elapsed
        } else {
            0.0
        };
    }

    /// Fraction of capture attempts that produced a frame
    pub fn efficiency(&self) -> f64 {
        let total = self.total_frames + self.dropped_frames;
        if total > 0 {
            self.total_frames as f64 / total as f64
        } else {
            1.0
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frame_rate_counts_intervals() {
        let mut stats = StreamStats::default();
        stats.record_frame(Duration::ZERO);
        assert_eq!(stats.average_frame_rate, 0.0);

        stats.record_frame(Duration::from_millis(50));
        stats.record_frame(Duration::from_millis(100));
        assert_eq!(stats.total_frames, 3);
        assert!((stats.average_frame_rate - 20.0).abs() < 1e-9);
    }

    #[test]
    fn test_efficiency() {
        let mut stats = StreamStats::default();
        assert_eq!(stats.efficiency(), 1.0);
        stats.record_frame(Duration::ZERO);
        stats.record_dropped_frame();
        assert_eq!(stats.efficiency(), 0.5);
    }
}
