use super::devices::{DeviceInfo, DeviceKind, MediaDevices, VideoConstraints};
use super::stream::{FrameRenderer, MediaStream, TrackCapabilities, TrackSettings, VideoTrack};
use crate::config::SyntheticConfig;
use crate::error::StreamError;
use async_trait::async_trait;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

const MAX_WIDTH: u32 = 1920;
const MAX_HEIGHT: u32 = 1080;
const MAX_FRAME_RATE: f64 = 60.0;

const COURT: [u8; 4] = [24, 96, 64, 255];
const LINE: [u8; 4] = [190, 190, 190, 255];
const BALL: [u8; 4] = [255, 240, 120, 255];

/// Simulated capture backend: a padel court seen from above with one ball
/// bouncing inside it. Each opened stream gets its own ball.
pub struct SyntheticCamera {
    devices: Vec<DeviceInfo>,
    permission_granted: AtomicBool,
    acquire_delay: Mutex<Duration>,
    startup_delay: Mutex<Duration>,
    ball_speed: f64,
    acquisitions: AtomicU64,
    fail_next: Mutex<Option<StreamError>>,
    opened: Mutex<Vec<MediaStream>>,
}

impl SyntheticCamera {
    pub fn new(config: &SyntheticConfig) -> Self {
        info!(
            "Creating synthetic camera backend with {} device(s)",
            config.devices.len()
        );

        let devices = config
            .devices
            .iter()
            .enumerate()
            .map(|(i, label)| DeviceInfo {
                device_id: format!("synthetic-{}", i),
                kind: DeviceKind::VideoInput,
                label: label.clone(),
            })
            .collect();

        Self {
            devices,
            permission_granted: AtomicBool::new(true),
            acquire_delay: Mutex::new(Duration::from_millis(config.acquire_delay_ms)),
            startup_delay: Mutex::new(Duration::from_millis(config.startup_delay_ms)),
            ball_speed: config.ball_speed,
            acquisitions: AtomicU64::new(0),
            fail_next: Mutex::new(None),
            opened: Mutex::new(Vec::new()),
        }
    }

    /// Backend with no artificial latency
    pub fn instant() -> Self {
        Self::new(&SyntheticConfig {
            acquire_delay_ms: 0,
            startup_delay_ms: 0,
            ..SyntheticConfig::default()
        })
    }

    pub fn deny_access(&self) {
        self.permission_granted.store(false, Ordering::Relaxed);
    }

    pub fn grant_access(&self) {
        self.permission_granted.store(true, Ordering::Relaxed);
    }

    pub fn set_acquire_delay(&self, delay: Duration) {
        *self.acquire_delay.lock() = delay;
    }

    pub fn set_startup_delay(&self, delay: Duration) {
        *self.startup_delay.lock() = delay;
    }

    /// Make the next `get_user_media` call fail with `error`
    pub fn fail_next_acquisition(&self, error: StreamError) {
        *self.fail_next.lock() = Some(error);
    }

    /// Number of `get_user_media` calls so far
    pub fn acquisitions(&self) -> u64 {
        self.acquisitions.load(Ordering::Relaxed)
    }

    /// Every stream handed out so far
    pub fn opened_streams(&self) -> Vec<MediaStream> {
        self.opened.lock().clone()
    }

    fn resolve_device(&self, requested: Option<&str>) -> Result<&DeviceInfo, StreamError> {
        let mut video = self.devices.iter().filter(|d| d.kind == DeviceKind::VideoInput);
        match requested {
            Some(id) => video.find(|d| d.device_id == id).ok_or_else(|| StreamError::Acquisition {
                details: format!("device {} not found", id),
            }),
            None => video.next().ok_or_else(|| StreamError::Acquisition {
                details: "no video input devices".to_string(),
            }),
        }
    }
}

#[async_trait]
impl MediaDevices for SyntheticCamera {
    async fn enumerate_devices(&self) -> Result<Vec<DeviceInfo>, StreamError> {
        Ok(self.devices.clone())
    }

    async fn get_user_media(&self, constraints: &VideoConstraints) -> Result<MediaStream, StreamError> {
        let seq = self.acquisitions.fetch_add(1, Ordering::Relaxed);

        let delay = *self.acquire_delay.lock();
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }

        if !self.permission_granted.load(Ordering::Relaxed) {
            warn!("Synthetic camera permission refused");
            return Err(StreamError::CameraAccessDenied);
        }
        if let Some(error) = self.fail_next.lock().take() {
            return Err(error);
        }

        let device = self.resolve_device(constraints.device_id.as_deref())?;
        let settings = TrackSettings {
            width: constraints.ideal_width.clamp(1, MAX_WIDTH),
            height: constraints.ideal_height.clamp(1, MAX_HEIGHT),
            frame_rate: (constraints.ideal_frame_rate as f64).clamp(1.0, MAX_FRAME_RATE),
        };
        let track = Arc::new(VideoTrack::new(
            device.label.clone(),
            settings,
            TrackCapabilities {
                max_width: MAX_WIDTH,
                max_height: MAX_HEIGHT,
                max_frame_rate: MAX_FRAME_RATE,
            },
        ));

        let renderer = Arc::new(CourtRenderer::new(self.ball_speed, seq));
        let stream = MediaStream::new(
            device.device_id.clone(),
            vec![track],
            renderer,
            *self.startup_delay.lock(),
        );

        debug!(
            "Opened synthetic stream {} on {} ({}x{} @ {}fps)",
            stream.id(),
            device.label,
            settings.width,
            settings.height,
            settings.frame_rate
        );
        self.opened.lock().push(stream.clone());
        Ok(stream)
    }
}

/// Ball position and velocity in normalized court coordinates
struct BallState {
    x: f64,
    y: f64,
    vx: f64,
    vy: f64,
}

struct CourtRenderer {
    ball: Mutex<BallState>,
}

impl CourtRenderer {
    fn new(speed_px: f64, seq: u64) -> Self {
        // Spread successive streams over the court so scenes differ
        let phase = (seq % 7) as f64 / 7.0;
        let speed = speed_px / 1280.0;
        Self {
            ball: Mutex::new(BallState {
                x: 0.2 + 0.6 * phase,
                y: 0.3 + 0.4 * (1.0 - phase),
                vx: speed,
                vy: speed * 0.6,
            }),
        }
    }

    fn advance(&self) -> (f64, f64) {
        let mut ball = self.ball.lock();
        ball.x += ball.vx;
        ball.y += ball.vy;
        if ball.x < 0.1 || ball.x > 0.9 {
            ball.vx = -ball.vx;
            ball.x = ball.x.clamp(0.1, 0.9);
        }
        if ball.y < 0.1 || ball.y > 0.9 {
            ball.vy = -ball.vy;
            ball.y = ball.y.clamp(0.1, 0.9);
        }
        (ball.x, ball.y)
    }
}

impl FrameRenderer for CourtRenderer {
    fn render(&self, width: u32, height: u32) -> Vec<u8> {
        let (bx, by) = self.advance();
        let mut data = COURT.repeat(width as usize * height as usize);

        let mut put = |x: u32, y: u32, color: [u8; 4]| {
            if x < width && y < height {
                let i = (y as usize * width as usize + x as usize) * 4;
                data[i..i + 4].copy_from_slice(&color);
            }
        };

        // Outer lines, net and service line
        let (left, right) = (width / 20, width - width / 20 - 1);
        let (top, bottom) = (height / 20, height - height / 20 - 1);
        for x in left..=right {
            put(x, top, LINE);
            put(x, bottom, LINE);
            put(x, height / 2, LINE);
        }
        for y in top..=bottom {
            put(left, y, LINE);
            put(right, y, LINE);
            put(width / 2, y, LINE);
        }

        let cx = (bx * width as f64) as i64;
        let cy = (by * height as f64) as i64;
        let radius = (width / 160).max(2) as i64;
        for dy in -radius..=radius {
            for dx in -radius..=radius {
                if dx * dx + dy * dy <= radius * radius {
                    let (x, y) = (cx + dx, cy + dy);
                    if x >= 0 && y >= 0 {
                        put(x as u32, y as u32, BALL);
                    }
                }
            }
        }

        data
    }
}
