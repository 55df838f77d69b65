use super::scenes::SceneRegistry;
use super::stats::StreamStats;
use crate::config::StreamConfig;
use crate::error::StreamError;
use crate::error_bus::{ErrorHandler, ErrorKind};
use crate::frame::Frame;
use crate::media::{select_preferred_device, MediaDevices, MediaStream, VideoConstraints, VideoElement};
use futures::future::{BoxFuture, FutureExt, Shared};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

type SceneInit = Shared<BoxFuture<'static, Result<MediaStream, StreamError>>>;

/// Outcome of a scene switch request
#[derive(Debug, Clone, PartialEq)]
pub enum SceneSwitch {
    /// The requested scene is now displayed
    Switched(MediaStream),
    /// Another transition was running; carries the stream still displayed
    Busy(Option<MediaStream>),
}

struct ManagerState {
    config: StreamConfig,
    video: VideoElement,
    registry: SceneRegistry,
    stats: StreamStats,
    first_frame_time: Option<Instant>,
    last_frame_time: Option<Instant>,
    next_frame_id: u64,
    /// Bumped by cleanup so acquisitions started earlier are discarded
    epoch: u64,
}

/// Everything an acquisition needs, detached from the manager
struct AcquisitionRequest {
    constraints: VideoConstraints,
    preferred_labels: Vec<String>,
    scene_label: Option<String>,
}

/// Camera acquisition, paced frame capture and scene switching
pub struct VideoStreamManager {
    devices: Arc<dyn MediaDevices>,
    state: Mutex<ManagerState>,
    transition_in_progress: AtomicBool,
    pending: Mutex<HashMap<String, SceneInit>>,
    error_handler: ErrorHandler,
}

struct TransitionGuard<'a> {
    flag: &'a AtomicBool,
}

impl<'a> TransitionGuard<'a> {
    fn try_acquire(flag: &'a AtomicBool) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| Self { flag })
    }
}

impl Drop for TransitionGuard<'_> {
    fn drop(&mut self) {
        self.flag.store(false, Ordering::Release);
    }
}

impl VideoStreamManager {
    pub fn new(config: StreamConfig, devices: Arc<dyn MediaDevices>) -> Self {
        Self::with_error_handler(config, devices, ErrorHandler::new())
    }

    pub fn with_error_handler(
        config: StreamConfig,
        devices: Arc<dyn MediaDevices>,
        error_handler: ErrorHandler,
    ) -> Self {
        info!(
            "Creating video stream manager: {}x{} @ {}fps, default scene '{}'",
            config.width, config.height, config.frame_rate, config.default_scene
        );

        Self {
            devices,
            state: Mutex::new(ManagerState {
                config,
                video: VideoElement::new(),
                registry: SceneRegistry::new(),
                stats: StreamStats::default(),
                first_frame_time: None,
                last_frame_time: None,
                next_frame_id: 0,
                epoch: 0,
            }),
            transition_in_progress: AtomicBool::new(false),
            pending: Mutex::new(HashMap::new()),
            error_handler,
        }
    }

    /// Acquire the preferred camera and display it as the default scene
    pub async fn initialize(&self) -> Result<MediaStream, StreamError> {
        let (scene, request, epoch) = {
            let state = self.state.lock();
            if let Some(stream) = state.video.source() {
                if stream.is_active() && state.video.is_playing() {
                    debug!("Stream {} already displayed", stream.id());
                    return Ok(stream.clone());
                }
            }
            let scene = state.config.default_scene.clone();
            let request = Self::request_for(&state.config, &scene);
            (scene, request, state.epoch)
        };

        info!("Initializing camera for scene '{}'", scene);
        let stream = acquire(Arc::clone(&self.devices), request).await?;
        if let Err(e) = stream.start_playback().await {
            error!("Failed to start playback of stream {}: {}", stream.id(), e);
            stream.stop_tracks();
            return Err(e);
        }

        self.display(&scene, &stream, epoch)?;
        info!("Camera initialized with stream {} on {}", stream.id(), stream.device_id());
        Ok(stream)
    }

    /// Grab the current picture of the displayed stream
    pub fn capture_frame(&self) -> Result<Frame, StreamError> {
        let mut state = self.state.lock();
        if state.video.source().is_none() {
            return Err(StreamError::NotInitialized);
        }

        let now = Instant::now();
        if let Some(last) = state.last_frame_time {
            if now.duration_since(last) < state.config.frame_interval() {
                state.stats.record_dropped_frame();
                return Err(StreamError::FrameDropped);
            }
        }

        let (width, height) = (state.config.width, state.config.height);
        let data = state.video.draw(width, height)?;

        state.last_frame_time = Some(now);
        let first = *state.first_frame_time.get_or_insert(now);
        state.stats.record_frame(now.duration_since(first));

        let id = state.next_frame_id;
        state.next_frame_id += 1;
        Ok(Frame::from_rgba(id, data, width, height))
    }

    /// Capture `count` frames one frame interval apart
    pub async fn capture_frame_sequence(&self, count: usize) -> Result<Vec<Frame>, StreamError> {
        let interval = self.state.lock().config.frame_interval();
        let mut frames = Vec::with_capacity(count);
        for i in 0..count {
            if i > 0 {
                tokio::time::sleep(interval).await;
            }
            frames.push(self.capture_frame()?);
        }
        Ok(frames)
    }

    /// Display scene `name`, reusing its stream when still live. Returns
    /// `Busy` without waiting when another switch is running.
    pub async fn switch_scene(&self, name: &str) -> Result<SceneSwitch, StreamError> {
        let Some(_guard) = TransitionGuard::try_acquire(&self.transition_in_progress) else {
            debug!("Scene transition in progress, ignoring switch to '{}'", name);
            return Ok(SceneSwitch::Busy(self.current_stream()));
        };

        info!("Switching to scene '{}'", name);
        let epoch = self.state.lock().epoch;

        let in_flight = self.pending.lock().get(name).cloned();
        let stream = match in_flight {
            Some(init) => {
                debug!("Joining in-flight initialization of scene '{}'", name);
                self.await_init(name, init).await?
            }
            None => {
                let registered = self.state.lock().registry.live(name).cloned();
                match registered {
                    Some(stream) => {
                        debug!("Reusing live stream {} for scene '{}'", stream.id(), name);
                        stream
                    }
                    None => {
                        let init = self.scene_init(name);
                        self.await_init(name, init).await?
                    }
                }
            }
        };

        if let Err(e) = self.smooth_transition(name, &stream, epoch).await {
            warn!("Transition to scene '{}' failed: {}", name, e);
            self.release_if_orphaned(&stream);
            return Err(e);
        }

        info!("Scene '{}' now displaying stream {}", name, stream.id());
        Ok(SceneSwitch::Switched(stream))
    }

    /// Acquire and register a scene stream without displaying it.
    /// Concurrent requests for the same scene share one acquisition.
    pub async fn preload_scene(&self, name: &str) -> Result<MediaStream, StreamError> {
        if let Some(stream) = self.state.lock().registry.live(name).cloned() {
            return Ok(stream);
        }

        let epoch = self.state.lock().epoch;
        let init = self.scene_init(name);
        let stream = self.await_init(name, init).await?;

        let mut state = self.state.lock();
        if state.epoch != epoch {
            drop(state);
            self.release_if_orphaned(&stream);
            return Err(StreamError::NotInitialized);
        }
        if let Some(replaced) = state.registry.insert(name, stream.clone()) {
            if replaced != stream && state.video.source() != Some(&replaced) {
                replaced.stop_tracks();
            }
        }
        debug!("Preloaded scene '{}' with stream {}", name, stream.id());
        Ok(stream)
    }

    pub fn stream_stats(&self) -> StreamStats {
        self.state.lock().stats.clone()
    }

    pub fn reset_stats(&self) {
        let mut state = self.state.lock();
        state.stats = StreamStats::default();
        state.first_frame_time = None;
    }

    /// Change the capture size; the device is asked to follow best-effort
    pub fn set_resolution(&self, width: u32, height: u32) -> Result<(), StreamError> {
        if width == 0 || height == 0 {
            return Err(StreamError::InvalidResolution { width, height });
        }

        let mut state = self.state.lock();
        state.config.width = width;
        state.config.height = height;

        if let Some(track) = state
            .video
            .source()
            .and_then(|s| s.video_tracks().iter().find(|t| t.is_live()))
        {
            if let Err(e) = track.apply_constraints(width, height) {
                warn!("Device kept its resolution: {}", e);
            }
        }
        info!("Capture resolution set to {}x{}", width, height);
        Ok(())
    }

    /// Stop every track of every scene and detach the display
    pub fn cleanup(&self) {
        let mut stopped = 0;
        {
            let mut state = self.state.lock();
            state.epoch += 1;
            for stream in state.registry.drain() {
                stopped += stream.stop_tracks();
            }
            if let Some(stream) = state.video.detach() {
                stopped += stream.stop_tracks();
            }
            state.last_frame_time = None;
        }
        self.pending.lock().clear();

        if stopped > 0 {
            info!("Released {} camera track(s)", stopped);
        }
    }

    /// Replace a lost stream for the active scene
    pub async fn recover_connection(&self) -> Result<MediaStream, StreamError> {
        let (scene, lost, request, epoch) = {
            let mut state = self.state.lock();
            let lost = state.video.source().cloned().ok_or(StreamError::NotInitialized)?;
            state.stats.record_recovery_attempt();
            let scene = state
                .registry
                .active_name()
                .map(str::to_string)
                .unwrap_or_else(|| state.config.default_scene.clone());
            let request = Self::request_for(&state.config, &scene);
            (scene, lost, request, state.epoch)
        };

        lost.stop_tracks();
        self.error_handler.handle_error(
            ErrorKind::ConnectionLost,
            format!("Connection to scene '{}' lost", scene),
            Some(serde_json::json!({
                "scene": scene,
                "stream_id": lost.id().to_string(),
            })),
        );

        let stream = acquire(Arc::clone(&self.devices), request).await?;
        if let Err(e) = stream.start_playback().await {
            stream.stop_tracks();
            return Err(e);
        }
        self.display(&scene, &stream, epoch)?;
        info!("Recovered scene '{}' with stream {}", scene, stream.id());
        Ok(stream)
    }

    pub fn current_stream(&self) -> Option<MediaStream> {
        self.state.lock().video.source().cloned()
    }

    pub fn active_scene(&self) -> Option<String> {
        self.state.lock().registry.active_name().map(str::to_string)
    }

    pub fn scene_names(&self) -> Vec<String> {
        self.state.lock().registry.names()
    }

    pub fn is_transitioning(&self) -> bool {
        self.transition_in_progress.load(Ordering::Acquire)
    }

    pub fn config(&self) -> StreamConfig {
        self.state.lock().config.clone()
    }

    pub fn error_handler(&self) -> &ErrorHandler {
        &self.error_handler
    }

    /// Start `stream` off-screen, then swap it in once it plays
    async fn smooth_transition(&self, name: &str, stream: &MediaStream, epoch: u64) -> Result<(), StreamError> {
        let mut staging = VideoElement::new();
        staging.load(stream.clone());
        staging.play().await?;
        staging.detach();

        self.display(name, stream, epoch)
    }

    /// Show `stream` as scene `name` and release what it displaces
    fn display(&self, name: &str, stream: &MediaStream, epoch: u64) -> Result<(), StreamError> {
        let mut state = self.state.lock();
        if state.epoch != epoch {
            warn!("Manager was cleaned up while scene '{}' was starting", name);
            drop(state);
            stream.stop_tracks();
            return Err(StreamError::NotInitialized);
        }

        let replaced = state.registry.insert(name, stream.clone());
        state.registry.set_active(name);
        let previous = state.video.present(stream.clone());

        for old in replaced.into_iter().chain(previous) {
            if old != *stream && !state.registry.holds(&old) && old.stop_tracks() > 0 {
                debug!("Stopped displaced stream {}", old.id());
            }
        }
        Ok(())
    }

    /// Stop `stream` unless a scene or the display still holds it
    fn release_if_orphaned(&self, stream: &MediaStream) {
        let state = self.state.lock();
        if !state.registry.holds(stream) && state.video.source() != Some(stream) {
            stream.stop_tracks();
        }
    }

    /// Shared acquisition for `name`, joining one already in flight
    fn scene_init(&self, name: &str) -> SceneInit {
        let request = {
            let state = self.state.lock();
            Self::request_for(&state.config, name)
        };

        let mut pending = self.pending.lock();
        if let Some(init) = pending.get(name) {
            return init.clone();
        }
        let init = acquire(Arc::clone(&self.devices), request).boxed().shared();
        pending.insert(name.to_string(), init.clone());
        init
    }

    async fn await_init(&self, name: &str, init: SceneInit) -> Result<MediaStream, StreamError> {
        let result = init.clone().await;
        let mut pending = self.pending.lock();
        if pending.get(name).is_some_and(|p| p.ptr_eq(&init)) {
            pending.remove(name);
        }
        result
    }

    fn request_for(config: &StreamConfig, scene: &str) -> AcquisitionRequest {
        AcquisitionRequest {
            constraints: VideoConstraints {
                ideal_width: config.width,
                ideal_height: config.height,
                ideal_frame_rate: config.frame_rate,
                device_id: None,
            },
            preferred_labels: config.preferred_camera_labels.clone(),
            scene_label: config.scene_devices.get(scene).cloned(),
        }
    }
}

impl Drop for VideoStreamManager {
    fn drop(&mut self) {
        self.cleanup();
    }
}

impl std::fmt::Debug for VideoStreamManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.state.lock();
        f.debug_struct("VideoStreamManager")
            .field("active_scene", &state.registry.active_name())
            .field("scenes", &state.registry.len())
            .field("stats", &state.stats)
            .field("transitioning", &self.is_transitioning())
            .finish()
    }
}

/// Pick a device and open a stream for it
async fn acquire(devices: Arc<dyn MediaDevices>, request: AcquisitionRequest) -> Result<MediaStream, StreamError> {
    let device_id = match devices.enumerate_devices().await {
        Ok(list) => request
            .scene_label
            .as_ref()
            .and_then(|label| select_preferred_device(&list, std::slice::from_ref(label)))
            .or_else(|| select_preferred_device(&list, &request.preferred_labels)),
        Err(e) => {
            warn!("Device enumeration failed, using default camera: {}", e);
            None
        }
    };

    match &device_id {
        Some(id) => debug!("Requesting stream from device {}", id),
        None => debug!("Requesting stream from default device"),
    }

    let mut constraints = request.constraints;
    constraints.device_id = device_id;
    devices.get_user_media(&constraints).await.map_err(|e| {
        match &e {
            StreamError::CameraAccessDenied => error!("Camera access denied"),
            other => error!("Failed to acquire camera stream: {}", other),
        }
        e
    })
}
