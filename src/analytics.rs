use crate::config::AnalyticsConfig;
use serde::Serialize;
use std::collections::VecDeque;
use tokio::time::Instant;
use tracing::debug;

/// One ball observation in image pixels
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct BallPosition {
    pub x: f64,
    pub y: f64,
    /// Milliseconds since the analytics instance was created
    pub timestamp_ms: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct HeatmapCell {
    pub grid_x: u32,
    pub grid_y: u32,
    pub intensity: f64,
}

/// Ball speed statistics in pixels per millisecond
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct VelocityStats {
    pub average: f64,
    pub max: f64,
    pub min: f64,
}

/// Fraction of observations on each half of the court
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct PositionStats {
    pub left_side: f64,
    pub right_side: f64,
    pub front_court: f64,
    pub back_court: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct AnalyticsSnapshot {
    pub heatmap: Vec<HeatmapCell>,
    pub velocity_stats: VelocityStats,
    pub position_stats: PositionStats,
    pub positions_tracked: usize,
}

/// Bounded history of ball positions with on-demand statistics
#[derive(Debug)]
pub struct BallTrackingAnalytics {
    positions: VecDeque<BallPosition>,
    max_positions: usize,
    heatmap_resolution: u32,
    court_width: u32,
    court_height: u32,
    origin: Instant,
}

impl BallTrackingAnalytics {
    pub fn new(config: &AnalyticsConfig, court_width: u32, court_height: u32) -> Self {
        debug!(
            "Creating ball tracking analytics (cap {}, {}x{} court, {}px cells)",
            config.max_positions, court_width, court_height, config.heatmap_resolution
        );

        Self {
            positions: VecDeque::with_capacity(config.max_positions.min(4096)),
            max_positions: config.max_positions.max(1),
            heatmap_resolution: config.heatmap_resolution.max(1),
            court_width,
            court_height,
            origin: Instant::now(),
        }
    }

    pub fn court_size(&self) -> (u32, u32) {
        (self.court_width, self.court_height)
    }

    /// Rescale the court to a new frame size. Buffered positions are kept
    /// and binned against the new grid.
    pub fn set_court_size(&mut self, width: u32, height: u32) {
        if (width, height) != self.court_size() {
            debug!(
                "Court resized from {}x{} to {}x{}",
                self.court_width, self.court_height, width, height
            );
            self.court_width = width;
            self.court_height = height;
        }
    }

    /// Record a position stamped with the current time
    pub fn add_position(&mut self, x: f64, y: f64) {
        let timestamp_ms = self.origin.elapsed().as_secs_f64() * 1000.0;
        self.add_position_at(x, y, timestamp_ms);
    }

    /// Record a position with an explicit timestamp
    pub fn add_position_at(&mut self, x: f64, y: f64, timestamp_ms: f64) {
        self.positions.push_back(BallPosition { x, y, timestamp_ms });
        while self.positions.len() > self.max_positions {
            self.positions.pop_front();
        }
    }

    /// Heatmap dimensions in cells
    pub fn grid_size(&self) -> (u32, u32) {
        (
            self.court_width / self.heatmap_resolution,
            self.court_height / self.heatmap_resolution,
        )
    }

    /// Occupancy grid normalized by the busiest cell, row-major
    pub fn generate_heatmap(&self) -> Vec<HeatmapCell> {
        let resolution = self.heatmap_resolution;
        let (grid_w, grid_h) = self.grid_size();
        let mut counts = vec![0u32; grid_w as usize * grid_h as usize];

        for pos in &self.positions {
            let gx = (pos.x / resolution as f64).floor();
            let gy = (pos.y / resolution as f64).floor();
            if !(gx >= 0.0 && gy >= 0.0 && gx < grid_w as f64 && gy < grid_h as f64) {
                continue;
            }
            counts[gy as usize * grid_w as usize + gx as usize] += 1;
        }

        let max_count = counts.iter().copied().max().unwrap_or(0);
        let mut heatmap = Vec::with_capacity(counts.len());
        for grid_y in 0..grid_h {
            for grid_x in 0..grid_w {
                let count = counts[(grid_y * grid_w + grid_x) as usize];
                let intensity = if max_count == 0 {
                    0.0
                } else {
                    count as f64 / max_count as f64
                };
                heatmap.push(HeatmapCell {
                    grid_x,
                    grid_y,
                    intensity,
                });
            }
        }
        heatmap
    }

    /// Speed statistics over consecutive buffered positions
    pub fn calculate_velocity_stats(&self) -> VelocityStats {
        let speeds: Vec<f64> = self
            .positions
            .iter()
            .zip(self.positions.iter().skip(1))
            .filter_map(|(prev, curr)| {
                let dt = curr.timestamp_ms - prev.timestamp_ms;
                if dt <= 0.0 {
                    return None;
                }
                let dx = curr.x - prev.x;
                let dy = curr.y - prev.y;
                Some((dx * dx + dy * dy).sqrt() / dt)
            })
            .collect();

        if speeds.is_empty() {
            return VelocityStats::default();
        }

        let sum: f64 = speeds.iter().sum();
        VelocityStats {
            average: sum / speeds.len() as f64,
            max: speeds.iter().copied().fold(f64::MIN, f64::max),
            min: speeds.iter().copied().fold(f64::MAX, f64::min),
        }
    }

    /// Court-half fractions, or `None` when nothing has been tracked
    pub fn calculate_position_stats(&self) -> Option<PositionStats> {
        let total = self.positions.len();
        if total == 0 {
            return None;
        }

        let mid_x = self.court_width as f64 / 2.0;
        let mid_y = self.court_height as f64 / 2.0;
        let left = self.positions.iter().filter(|p| p.x < mid_x).count();
        let front = self.positions.iter().filter(|p| p.y < mid_y).count();

        let total = total as f64;
        Some(PositionStats {
            left_side: left as f64 / total,
            right_side: 1.0 - left as f64 / total,
            front_court: front as f64 / total,
            back_court: 1.0 - front as f64 / total,
        })
    }

    pub fn analytics_snapshot(&self) -> AnalyticsSnapshot {
        AnalyticsSnapshot {
            heatmap: self.generate_heatmap(),
            velocity_stats: self.calculate_velocity_stats(),
            position_stats: self.calculate_position_stats().unwrap_or_default(),
            positions_tracked: self.positions.len(),
        }
    }

    /// Buffered positions, oldest first
    pub fn positions(&self) -> impl Iterator<Item = &BallPosition> {
        self.positions.iter()
    }

    pub fn len(&self) -> usize {
        self.positions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }

    pub fn reset(&mut self) {
        self.positions.clear();
    }
}
