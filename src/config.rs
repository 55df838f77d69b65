use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use std::time::Duration;
use tracing::{debug, info};

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct PadelConfig {
    pub stream: StreamConfig,
    pub vision: VisionConfig,
    pub analytics: AnalyticsConfig,
    pub pipeline: PipelineConfig,
    pub synthetic: SyntheticConfig,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct StreamConfig {
    /// Ideal capture width in pixels
    #[serde(default = "default_stream_width")]
    pub width: u32,

    /// Ideal capture height in pixels
    #[serde(default = "default_stream_height")]
    pub height: u32,

    /// Target frames per second; also the capture pacing limit
    #[serde(default = "default_stream_frame_rate")]
    pub frame_rate: u32,

    /// Device label fragments preferred over the system default camera
    #[serde(default = "default_preferred_camera_labels")]
    pub preferred_camera_labels: Vec<String>,

    /// Scene started by `initialize`
    #[serde(default = "default_scene")]
    pub default_scene: String,

    /// Optional scene name -> device label fragment
    #[serde(default)]
    pub scene_devices: HashMap<String, String>,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct VisionConfig {
    /// Inward margin excluded from the ball search
    #[serde(default = "default_padding")]
    pub padding: u32,

    /// Court distance covered by one pixel, in meters
    #[serde(default = "default_pixels_to_meters")]
    pub pixels_to_meters: f64,

    /// Maximum detection jitter per axis in pixels (0 disables)
    #[serde(default = "default_jitter_px")]
    pub jitter_px: f64,

    /// Seed for the jitter generator
    #[serde(default)]
    pub jitter_seed: Option<u64>,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct AnalyticsConfig {
    /// Number of positions kept in the tracking buffer
    #[serde(default = "default_max_positions")]
    pub max_positions: usize,

    /// Heatmap cell size in pixels
    #[serde(default = "default_heatmap_resolution")]
    pub heatmap_resolution: u32,

    /// Width of the court image used for heatmap and side statistics;
    /// follows the captured frame width when unset
    #[serde(default)]
    pub court_width: Option<u32>,

    /// Height of the court image; follows the captured frame height when unset
    #[serde(default)]
    pub court_height: Option<u32>,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct PipelineConfig {
    /// Unexpected errors tolerated within one window before stopping
    #[serde(default = "default_max_errors")]
    pub max_errors: u32,

    /// Length of the error counting window in milliseconds
    #[serde(default = "default_error_window_ms")]
    pub error_window_ms: u64,

    /// Backoff after a transient stream error in milliseconds
    #[serde(default = "default_transient_backoff_ms")]
    pub transient_backoff_ms: u64,

    /// Redraw tick of the processing loop in milliseconds
    #[serde(default = "default_redraw_interval_ms")]
    pub redraw_interval_ms: u64,

    /// Per-frame processing budget in milliseconds
    #[serde(default = "default_processing_budget_ms")]
    pub processing_budget_ms: u64,

    /// Consecutive inactive-stream retries before reconnecting the camera
    #[serde(default = "default_stall_threshold")]
    pub stall_threshold: u32,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct SyntheticConfig {
    /// Labels of the simulated capture devices
    #[serde(default = "default_synthetic_devices")]
    pub devices: Vec<String>,

    /// Simulated permission prompt / device open latency in milliseconds
    #[serde(default = "default_acquire_delay_ms")]
    pub acquire_delay_ms: u64,

    /// Simulated time until playback starts in milliseconds
    #[serde(default = "default_startup_delay_ms")]
    pub startup_delay_ms: u64,

    /// Ball speed in pixels per rendered frame
    #[serde(default = "default_ball_speed")]
    pub ball_speed: f64,
}

impl StreamConfig {
    /// Minimum time between two captured frames
    pub fn frame_interval(&self) -> Duration {
        Duration::from_secs_f64(1.0 / self.frame_rate.max(1) as f64)
    }
}

impl AnalyticsConfig {
    /// Fixed court size, if configured
    pub fn fixed_court_size(&self) -> Option<(u32, u32)> {
        self.court_width.zip(self.court_height)
    }

    /// Court size for a stream of the given resolution
    pub fn court_size(&self, stream: &StreamConfig) -> (u32, u32) {
        self.fixed_court_size().unwrap_or((stream.width, stream.height))
    }
}

impl PipelineConfig {
    pub fn error_window(&self) -> Duration {
        Duration::from_millis(self.error_window_ms)
    }

    pub fn transient_backoff(&self) -> Duration {
        Duration::from_millis(self.transient_backoff_ms)
    }

    pub fn redraw_interval(&self) -> Duration {
        Duration::from_millis(self.redraw_interval_ms)
    }

    pub fn processing_budget(&self) -> Duration {
        Duration::from_millis(self.processing_budget_ms)
    }
}

impl PadelConfig {
    /// Load configuration from default sources (file + environment variables)
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from_file("padelvision.toml")
    }

    /// Load configuration from a specific file path
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path_str = path.as_ref().to_string_lossy();
        debug!("Loading configuration from: {}", path_str);

        let settings = Config::builder()
            .set_default("stream.width", default_stream_width())?
            .set_default("stream.height", default_stream_height())?
            .set_default("stream.frame_rate", default_stream_frame_rate())?
            .set_default(
                "stream.preferred_camera_labels",
                default_preferred_camera_labels(),
            )?
            .set_default("stream.default_scene", default_scene())?
            .set_default("vision.padding", default_padding())?
            .set_default("vision.pixels_to_meters", default_pixels_to_meters())?
            .set_default("vision.jitter_px", default_jitter_px())?
            .set_default("analytics.max_positions", default_max_positions() as i64)?
            .set_default("analytics.heatmap_resolution", default_heatmap_resolution())?
            .set_default("pipeline.max_errors", default_max_errors())?
            .set_default("pipeline.error_window_ms", default_error_window_ms())?
            .set_default("pipeline.transient_backoff_ms", default_transient_backoff_ms())?
            .set_default("pipeline.redraw_interval_ms", default_redraw_interval_ms())?
            .set_default("pipeline.processing_budget_ms", default_processing_budget_ms())?
            .set_default("pipeline.stall_threshold", default_stall_threshold())?
            .set_default("synthetic.devices", default_synthetic_devices())?
            .set_default("synthetic.acquire_delay_ms", default_acquire_delay_ms())?
            .set_default("synthetic.startup_delay_ms", default_startup_delay_ms())?
            .set_default("synthetic.ball_speed", default_ball_speed())?
            // Add configuration file (optional)
            .add_source(File::with_name(&path_str).required(false))
            // Environment variables, e.g. PADEL_STREAM__FRAME_RATE=25
            .add_source(Environment::with_prefix("PADEL").separator("__"))
            .build()?;

        let config: PadelConfig = settings.try_deserialize()?;

        info!("Configuration loaded successfully");
        debug!("Final configuration: {:#?}", config);

        Ok(config)
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.stream.width == 0 || self.stream.height == 0 {
            return Err(ConfigError::Message(
                "Stream resolution must be greater than 0".to_string(),
            ));
        }

        if self.stream.frame_rate == 0 {
            return Err(ConfigError::Message(
                "Stream frame_rate must be greater than 0".to_string(),
            ));
        }

        if self.stream.default_scene.is_empty() {
            return Err(ConfigError::Message(
                "Stream default_scene must not be empty".to_string(),
            ));
        }

        if self.vision.pixels_to_meters <= 0.0 {
            return Err(ConfigError::Message(
                "Vision pixels_to_meters must be greater than 0".to_string(),
            ));
        }

        if self.vision.jitter_px < 0.0 {
            return Err(ConfigError::Message(
                "Vision jitter_px must not be negative".to_string(),
            ));
        }

        if self.analytics.max_positions == 0 {
            return Err(ConfigError::Message(
                "Analytics max_positions must be greater than 0".to_string(),
            ));
        }

        if self.analytics.heatmap_resolution == 0 {
            return Err(ConfigError::Message(
                "Analytics heatmap_resolution must be greater than 0".to_string(),
            ));
        }

        if self.analytics.court_width.is_some() != self.analytics.court_height.is_some() {
            return Err(ConfigError::Message(
                "Analytics court_width and court_height must be set together".to_string(),
            ));
        }

        if let Some((width, height)) = self.analytics.fixed_court_size() {
            if width == 0 || height == 0 {
                return Err(ConfigError::Message(
                    "Analytics court size must be greater than 0".to_string(),
                ));
            }
        }

        if self.pipeline.max_errors == 0 {
            return Err(ConfigError::Message(
                "Pipeline max_errors must be greater than 0".to_string(),
            ));
        }

        if self.pipeline.redraw_interval_ms == 0 {
            return Err(ConfigError::Message(
                "Pipeline redraw_interval_ms must be greater than 0".to_string(),
            ));
        }

        if self.pipeline.stall_threshold == 0 {
            return Err(ConfigError::Message(
                "Pipeline stall_threshold must be greater than 0".to_string(),
            ));
        }

        Ok(())
    }
}

impl Default for PadelConfig {
    fn default() -> Self {
        Self {
            stream: StreamConfig::default(),
            vision: VisionConfig::default(),
            analytics: AnalyticsConfig::default(),
            pipeline: PipelineConfig::default(),
            synthetic: SyntheticConfig::default(),
        }
    }
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            width: default_stream_width(),
            height: default_stream_height(),
            frame_rate: default_stream_frame_rate(),
            preferred_camera_labels: default_preferred_camera_labels(),
            default_scene: default_scene(),
            scene_devices: HashMap::new(),
        }
    }
}

impl Default for VisionConfig {
    fn default() -> Self {
        Self {
            padding: default_padding(),
            pixels_to_meters: default_pixels_to_meters(),
            jitter_px: default_jitter_px(),
            jitter_seed: None,
        }
    }
}

impl Default for AnalyticsConfig {
    fn default() -> Self {
        Self {
            max_positions: default_max_positions(),
            heatmap_resolution: default_heatmap_resolution(),
            court_width: None,
            court_height: None,
        }
    }
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            max_errors: default_max_errors(),
            error_window_ms: default_error_window_ms(),
            transient_backoff_ms: default_transient_backoff_ms(),
            redraw_interval_ms: default_redraw_interval_ms(),
            processing_budget_ms: default_processing_budget_ms(),
            stall_threshold: default_stall_threshold(),
        }
    }
}

impl Default for SyntheticConfig {
    fn default() -> Self {
        Self {
            devices: default_synthetic_devices(),
            acquire_delay_ms: default_acquire_delay_ms(),
            startup_delay_ms: default_startup_delay_ms(),
            ball_speed: default_ball_speed(),
        }
    }
}

// Default value functions
fn default_stream_width() -> u32 {
    1280
}
fn default_stream_height() -> u32 {
    720
}
fn default_stream_frame_rate() -> u32 {
    30
}
fn default_preferred_camera_labels() -> Vec<String> {
    vec!["external".to_string(), "streamlabs".to_string()]
}
fn default_scene() -> String {
    "main".to_string()
}

fn default_padding() -> u32 {
    10
}
fn default_pixels_to_meters() -> f64 {
    0.02
} // 1 pixel is roughly 2cm of court
fn default_jitter_px() -> f64 {
    2.0
}

fn default_max_positions() -> usize {
    1000
}
fn default_heatmap_resolution() -> u32 {
    10
}

fn default_max_errors() -> u32 {
    5
}
fn default_error_window_ms() -> u64 {
    5000
}
fn default_transient_backoff_ms() -> u64 {
    100
}
fn default_redraw_interval_ms() -> u64 {
    16
}
fn default_processing_budget_ms() -> u64 {
    50
}
fn default_stall_threshold() -> u32 {
    10
}

fn default_synthetic_devices() -> Vec<String> {
    vec![
        "Integrated Camera".to_string(),
        "External Court Camera".to_string(),
    ]
}
fn default_acquire_delay_ms() -> u64 {
    50
}
fn default_startup_delay_ms() -> u64 {
    20
}
fn default_ball_speed() -> f64 {
    9.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_default_config() {
        let config = PadelConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.stream.frame_rate, 30);
        assert_eq!(config.analytics.max_positions, 1000);
        assert_eq!(config.pipeline.max_errors, 5);
        assert_eq!(config.stream.frame_interval(), Duration::from_secs_f64(1.0 / 30.0));
    }

    #[test]
    fn test_config_validation() {
        let mut config = PadelConfig::default();
        config.stream.frame_rate = 0;
        assert!(config.validate().is_err());

        config.stream.frame_rate = 25;
        config.analytics.heatmap_resolution = 0;
        assert!(config.validate().is_err());

        config.analytics.heatmap_resolution = 10;
        config.vision.pixels_to_meters = 0.0;
        assert!(config.validate().is_err());

        config.vision.pixels_to_meters = 0.02;
        assert!(config.validate().is_ok());

        config.pipeline.stall_threshold = 0;
        assert!(config.validate().is_err());
        config.pipeline.stall_threshold = 10;

        config.analytics.court_width = Some(640);
        assert!(config.validate().is_err());
        config.analytics.court_height = Some(0);
        assert!(config.validate().is_err());
        config.analytics.court_height = Some(360);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_court_size_follows_stream() {
        let mut config = PadelConfig::default();
        config.stream.width = 320;
        config.stream.height = 180;
        assert_eq!(config.analytics.fixed_court_size(), None);
        assert_eq!(config.analytics.court_size(&config.stream), (320, 180));

        config.analytics.court_width = Some(640);
        config.analytics.court_height = Some(360);
        assert_eq!(config.analytics.court_size(&config.stream), (640, 360));
    }

    #[test]
    fn test_load_from_file_overrides_defaults() {
        let mut file = tempfile::Builder::new()
            .suffix(".toml")
            .tempfile()
            .unwrap();
        writeln!(
            file,
            "[stream]\nframe_rate = 25\ndefault_scene = \"court-1\"\n\n[stream.scene_devices]\nreplay = \"external\"\n\n[vision]\njitter_px = 0.0\njitter_seed = 7"
        )
        .unwrap();

        let config = PadelConfig::load_from_file(file.path()).unwrap();
        assert_eq!(config.stream.frame_rate, 25);
        assert_eq!(config.stream.default_scene, "court-1");
        assert_eq!(config.stream.width, 1280);
        assert_eq!(
            config.stream.scene_devices.get("replay").map(String::as_str),
            Some("external")
        );
        assert_eq!(config.vision.jitter_px, 0.0);
        assert_eq!(config.vision.jitter_seed, Some(7));
        assert_eq!(config.pipeline.transient_backoff_ms, 100);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_missing_file_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = PadelConfig::load_from_file(dir.path().join("absent.toml")).unwrap();
        assert_eq!(config.stream.default_scene, "main");
        assert_eq!(config.synthetic.devices.len(), 2);
    }
}
