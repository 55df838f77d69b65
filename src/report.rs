use crate::analytics::{BallTrackingAnalytics, HeatmapCell, PositionStats, VelocityStats};
use crate::error::{PadelError, Result};
use crate::performance::PerformanceMonitor;
use crate::pipeline::SessionSummary;
use crate::stream_manager::StreamStats;
use chrono::{DateTime, Utc};
use image::{GrayImage, Luma};
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::Path;
use tracing::info;

/// Cells listed in the report, busiest first
pub const HOT_CELL_COUNT: usize = 10;

/// End-of-session summary written by the CLI
#[derive(Debug, Clone, Serialize)]
pub struct SessionReport {
    pub generated_at: DateTime<Utc>,
    pub session: SessionSummary,
    pub stream: StreamStats,
    pub velocity: VelocityStats,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub position: Option<PositionStats>,
    pub positions_tracked: usize,
    pub hot_cells: Vec<HeatmapCell>,
    pub metrics_ms: BTreeMap<String, f64>,
    pub errors_reported: u64,
}

impl SessionReport {
    pub fn build(
        session: SessionSummary,
        stream: StreamStats,
        analytics: &BallTrackingAnalytics,
        monitor: &PerformanceMonitor,
        errors_reported: u64,
    ) -> Self {
        let metrics_ms = monitor
            .all_metrics()
            .into_iter()
            .map(|(name, duration)| (name, duration.as_secs_f64() * 1000.0))
            .collect();

        Self {
            generated_at: Utc::now(),
            session,
            stream,
            velocity: analytics.calculate_velocity_stats(),
            position: analytics.calculate_position_stats(),
            positions_tracked: analytics.len(),
            hot_cells: hottest_cells(&analytics.generate_heatmap(), HOT_CELL_COUNT),
            metrics_ms,
            errors_reported,
        }
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn write_to<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        std::fs::write(path.as_ref(), self.to_json()?)?;
        info!("Session report written to {}", path.as_ref().display());
        Ok(())
    }
}

/// Non-empty cells ordered by intensity, ties in grid order
pub fn hottest_cells(heatmap: &[HeatmapCell], count: usize) -> Vec<HeatmapCell> {
    let mut cells: Vec<HeatmapCell> = heatmap.iter().copied().filter(|c| c.intensity > 0.0).collect();
    cells.sort_by(|a, b| b.intensity.total_cmp(&a.intensity));
    cells.truncate(count);
    cells
}

/// One grey pixel per heatmap cell, white for the busiest
pub fn heatmap_image(analytics: &BallTrackingAnalytics) -> GrayImage {
    let (grid_w, grid_h) = analytics.grid_size();
    let heatmap = analytics.generate_heatmap();
    GrayImage::from_fn(grid_w, grid_h, |x, y| {
        let intensity = heatmap
            .get((y * grid_w + x) as usize)
            .map(|c| c.intensity)
            .unwrap_or(0.0);
        Luma([(intensity * 255.0).round() as u8])
    })
}

pub fn export_heatmap_png<P: AsRef<Path>>(analytics: &BallTrackingAnalytics, path: P) -> Result<()> {
    let image = heatmap_image(analytics);
    if image.width() == 0 || image.height() == 0 {
        return Err(PadelError::component(
            "report".to_string(),
            "court is smaller than one heatmap cell".to_string(),
        ));
    }
    image.save(path.as_ref())?;
    info!(
        "Heatmap ({}x{} cells) exported to {}",
        image.width(),
        image.height(),
        path.as_ref().display()
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AnalyticsConfig;
    use tempfile::tempdir;

    fn analytics_with_positions() -> BallTrackingAnalytics {
        let config = AnalyticsConfig {
            max_positions: 100,
            heatmap_resolution: 10,
            ..AnalyticsConfig::default()
        };
        let mut analytics = BallTrackingAnalytics::new(&config, 100, 50);
        analytics.add_position_at(5.0, 5.0, 0.0);
        analytics.add_position_at(6.0, 6.0, 10.0);
        analytics.add_position_at(95.0, 45.0, 20.0);
        analytics
    }

    #[test]
    fn test_hottest_cells_ordering() {
        let heatmap = analytics_with_positions().generate_heatmap();
        let hot = hottest_cells(&heatmap, 10);

        assert_eq!(hot.len(), 2);
        assert_eq!((hot[0].grid_x, hot[0].grid_y, hot[0].intensity), (0, 0, 1.0));
        assert_eq!((hot[1].grid_x, hot[1].grid_y, hot[1].intensity), (9, 4, 0.5));
        assert_eq!(hottest_cells(&heatmap, 1).len(), 1);
    }

    #[test]
    fn test_heatmap_image_pixels() {
        let image = heatmap_image(&analytics_with_positions());
        assert_eq!(image.dimensions(), (10, 5));
        assert_eq!(image.get_pixel(0, 0)[0], 255);
        assert_eq!(image.get_pixel(9, 4)[0], 128);
        assert_eq!(image.get_pixel(5, 2)[0], 0);
    }

    #[test]
    fn test_export_heatmap_png() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("heatmap.png");
        export_heatmap_png(&analytics_with_positions(), &path).unwrap();

        let loaded = image::open(&path).unwrap().to_luma8();
        assert_eq!(loaded.dimensions(), (10, 5));
        assert_eq!(loaded.get_pixel(0, 0)[0], 255);
    }

    #[test]
    fn test_report_json() {
        let analytics = analytics_with_positions();
        let mut monitor = PerformanceMonitor::new();
        monitor.measure("frame_processing", || ());

        let report = SessionReport::build(
            SessionSummary::default(),
            StreamStats::default(),
            &analytics,
            &monitor,
            2,
        );
        let json: serde_json::Value = serde_json::from_str(&report.to_json().unwrap()).unwrap();

        assert_eq!(json["positions_tracked"], 3);
        assert_eq!(json["errors_reported"], 2);
        assert_eq!(json["session"]["stop_reason"], "cancelled");
        assert_eq!(json["hot_cells"].as_array().unwrap().len(), 2);
        assert!(json["metrics_ms"]["frame_processing"].is_number());

        let dir = tempdir().unwrap();
        let path = dir.path().join("report.json");
        report.write_to(&path).unwrap();
        assert!(std::fs::read_to_string(&path).unwrap().contains("velocity"));
    }
}
