use crate::error::StreamError;
use parking_lot::Mutex;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, trace};
use uuid::Uuid;

/// Produces RGBA pixels for the current moment of a capture source
pub trait FrameRenderer: Send + Sync {
    fn render(&self, width: u32, height: u32) -> Vec<u8>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrackState {
    Live,
    Ended,
}

/// Settings a track is currently delivering
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TrackSettings {
    pub width: u32,
    pub height: u32,
    pub frame_rate: f64,
}

/// Largest mode the underlying device supports
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TrackCapabilities {
    pub max_width: u32,
    pub max_height: u32,
    pub max_frame_rate: f64,
}

/// A single video track of a capture stream
#[derive(Debug)]
pub struct VideoTrack {
    id: Uuid,
    label: String,
    state: Mutex<TrackState>,
    settings: Mutex<TrackSettings>,
    capabilities: TrackCapabilities,
}

impl VideoTrack {
    pub fn new(label: impl Into<String>, settings: TrackSettings, capabilities: TrackCapabilities) -> Self {
        Self {
            id: Uuid::new_v4(),
            label: label.into(),
            state: Mutex::new(TrackState::Live),
            settings: Mutex::new(settings),
            capabilities,
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn ready_state(&self) -> TrackState {
        *self.state.lock()
    }

    pub fn is_live(&self) -> bool {
        self.ready_state() == TrackState::Live
    }

    pub fn settings(&self) -> TrackSettings {
        *self.settings.lock()
    }

    /// End the track; returns whether it was live
    pub fn stop(&self) -> bool {
        let mut state = self.state.lock();
        let was_live = *state == TrackState::Live;
        *state = TrackState::Ended;
        if was_live {
            debug!("Stopped track {} ({})", self.id, self.label);
        }
        was_live
    }

    /// Ask the device for a new resolution
    pub fn apply_constraints(&self, width: u32, height: u32) -> Result<TrackSettings, StreamError> {
        if !self.is_live() {
            return Err(StreamError::Constraints {
                details: format!("track {} has ended", self.id),
            });
        }
        if width > self.capabilities.max_width || height > self.capabilities.max_height {
            return Err(StreamError::Constraints {
                details: format!(
                    "{}x{} exceeds device maximum {}x{}",
                    width, height, self.capabilities.max_width, self.capabilities.max_height
                ),
            });
        }

        let mut settings = self.settings.lock();
        settings.width = width;
        settings.height = height;
        trace!("Track {} now {}x{}", self.id, width, height);
        Ok(*settings)
    }
}

struct StreamInner {
    id: Uuid,
    device_id: String,
    tracks: Vec<Arc<VideoTrack>>,
    renderer: Arc<dyn FrameRenderer>,
    startup_delay: Duration,
}

/// Handle to an acquired capture stream; clones share the same tracks
#[derive(Clone)]
pub struct MediaStream {
    inner: Arc<StreamInner>,
}

impl MediaStream {
    pub fn new(
        device_id: impl Into<String>,
        tracks: Vec<Arc<VideoTrack>>,
        renderer: Arc<dyn FrameRenderer>,
        startup_delay: Duration,
    ) -> Self {
        Self {
            inner: Arc::new(StreamInner {
                id: Uuid::new_v4(),
                device_id: device_id.into(),
                tracks,
                renderer,
                startup_delay,
            }),
        }
    }

    pub fn id(&self) -> Uuid {
        self.inner.id
    }

    pub fn device_id(&self) -> &str {
        &self.inner.device_id
    }

    pub fn video_tracks(&self) -> &[Arc<VideoTrack>] {
        &self.inner.tracks
    }

    /// A stream is active while any of its tracks has not ended
    pub fn is_active(&self) -> bool {
        self.inner.tracks.iter().any(|t| t.is_live())
    }

    /// Stop every live track; returns how many were stopped
    pub fn stop_tracks(&self) -> usize {
        self.inner.tracks.iter().filter(|t| t.stop()).count()
    }

    /// Wait until the source delivers frames
    pub async fn start_playback(&self) -> Result<(), StreamError> {
        if !self.is_active() {
            return Err(StreamError::StreamInactive);
        }
        if !self.inner.startup_delay.is_zero() {
            tokio::time::sleep(self.inner.startup_delay).await;
        }
        if !self.is_active() {
            return Err(StreamError::Playback {
                details: format!("stream {} ended before playback started", self.id()),
            });
        }
        Ok(())
    }

    pub(crate) fn render(&self, width: u32, height: u32) -> Vec<u8> {
        self.inner.renderer.render(width, height)
    }
}

impl PartialEq for MediaStream {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl Eq for MediaStream {}

impl fmt::Debug for MediaStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MediaStream")
            .field("id", &self.inner.id)
            .field("device_id", &self.inner.device_id)
            .field("tracks", &self.inner.tracks.len())
            .field("active", &self.is_active())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Blank;

    impl FrameRenderer for Blank {
        fn render(&self, width: u32, height: u32) -> Vec<u8> {
            vec![0; (width * height * 4) as usize]
        }
    }

    fn track() -> Arc<VideoTrack> {
        Arc::new(VideoTrack::new(
            "cam",
            TrackSettings {
                width: 640,
                height: 480,
                frame_rate: 30.0,
            },
            TrackCapabilities {
                max_width: 1280,
                max_height: 720,
                max_frame_rate: 60.0,
            },
        ))
    }

    #[test]
    fn test_stop_tracks_ends_stream() {
        let stream = MediaStream::new("dev", vec![track()], Arc::new(Blank), Duration::ZERO);
        assert!(stream.is_active());

        assert_eq!(stream.stop_tracks(), 1);
        assert!(!stream.is_active());
        assert_eq!(stream.stop_tracks(), 0);
        assert_eq!(stream.video_tracks()[0].ready_state(), TrackState::Ended);
    }

    #[test]
    fn test_clones_compare_equal() {
        let stream = MediaStream::new("dev", vec![track()], Arc::new(Blank), Duration::ZERO);
        let other = MediaStream::new("dev", vec![track()], Arc::new(Blank), Duration::ZERO);
        assert_eq!(stream, stream.clone());
        assert_ne!(stream, other);
    }

    #[test]
    fn test_apply_constraints_respects_capabilities() {
        let track = track();
        assert!(track.apply_constraints(1280, 720).is_ok());
        assert_eq!(track.settings().width, 1280);
        assert!(track.apply_constraints(1920, 1080).is_err());

        track.stop();
        assert!(track.apply_constraints(640, 480).is_err());
    }

    #[tokio::test]
    async fn test_playback_fails_on_stopped_stream() {
        let stream = MediaStream::new("dev", vec![track()], Arc::new(Blank), Duration::ZERO);
        assert!(stream.start_playback().await.is_ok());
        stream.stop_tracks();
        assert_eq!(stream.start_playback().await, Err(StreamError::StreamInactive));
    }
}
