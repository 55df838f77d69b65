use super::*;
use crate::config::PadelConfig;
use crate::error::{ErrorCategory, PadelError, PipelineError, StreamError};
use crate::error_bus::ErrorKind;
use crate::media::{
    DeviceInfo, FrameRenderer, MediaDevices, MediaStream, SyntheticCamera, TrackCapabilities,
    TrackSettings, VideoConstraints, VideoTrack,
};
use crate::stream_manager::VideoStreamManager;
use crate::vision::BallVelocity;
use async_trait::async_trait;
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

fn create_test_config() -> PadelConfig {
    let mut config = PadelConfig::default();
    config.stream.width = 320;
    config.stream.height = 180;
    config.vision.jitter_px = 0.0;
    config.synthetic.acquire_delay_ms = 0;
    config.synthetic.startup_delay_ms = 0;
    config
}

fn create_test_session(config: &PadelConfig) -> (LiveSession, Arc<SyntheticCamera>) {
    let camera = Arc::new(SyntheticCamera::new(&config.synthetic));
    let devices: Arc<dyn MediaDevices> = camera.clone();
    let manager = Arc::new(VideoStreamManager::new(config.stream.clone(), devices));
    (LiveSession::new(manager, config), camera)
}

fn record_kinds(session: &LiveSession) -> Arc<Mutex<Vec<ErrorKind>>> {
    let kinds = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&kinds);
    session
        .manager()
        .error_handler()
        .on_error(move |record| sink.lock().push(record.kind));
    kinds
}

/// Camera whose frames never match their declared size
struct BrokenCamera;

struct TruncatedRenderer;

impl FrameRenderer for TruncatedRenderer {
    fn render(&self, _width: u32, _height: u32) -> Vec<u8> {
        vec![0; 16]
    }
}

#[async_trait]
impl MediaDevices for BrokenCamera {
    async fn enumerate_devices(&self) -> Result<Vec<DeviceInfo>, StreamError> {
        Ok(Vec::new())
    }

    async fn get_user_media(&self, constraints: &VideoConstraints) -> Result<MediaStream, StreamError> {
        let track = Arc::new(VideoTrack::new(
            "broken",
            TrackSettings {
                width: constraints.ideal_width,
                height: constraints.ideal_height,
                frame_rate: 30.0,
            },
            TrackCapabilities {
                max_width: 1920,
                max_height: 1080,
                max_frame_rate: 60.0,
            },
        ));
        Ok(MediaStream::new(
            "broken-0",
            vec![track],
            Arc::new(TruncatedRenderer),
            Duration::ZERO,
        ))
    }
}

#[tokio::test(start_paused = true)]
async fn test_session_runs_to_frame_limit() {
    let config = create_test_config();
    let (session, camera) = create_test_session(&config);
    let mut session = session.with_frame_limit(5);

    let mut detections = Vec::new();
    let summary = session
        .run(CancellationToken::new(), |d| detections.push(*d))
        .await
        .unwrap();

    assert_eq!(summary.stop_reason, StopReason::FrameLimit);
    assert_eq!(summary.frames_processed, 5);
    assert_eq!(summary.detections, 5);
    assert_eq!(summary.unexpected_errors, 0);

    assert_eq!(detections.len(), 5);
    assert_eq!(detections[0].velocity, BallVelocity::ZERO);
    assert!(detections.windows(2).all(|w| w[0].frame_id < w[1].frame_id));
    assert_eq!(session.analytics().lock().len(), 5);
    assert!(session.monitor().metric(FRAME_METRIC).is_some());

    // Streams are released when the session ends
    assert!(camera.opened_streams().iter().all(|s| !s.is_active()));
    assert!(session.manager().current_stream().is_none());
}

#[tokio::test(start_paused = true)]
async fn test_new_run_starts_fresh() {
    let config = create_test_config();
    let (session, camera) = create_test_session(&config);
    let mut session = session.with_frame_limit(3);

    session.run(CancellationToken::new(), |_| {}).await.unwrap();
    let summary = session.run(CancellationToken::new(), |_| {}).await.unwrap();

    assert_eq!(summary.frames_processed, 3);
    assert_eq!(session.analytics().lock().len(), 3);
    assert_eq!(camera.acquisitions(), 2);
}

#[tokio::test]
async fn test_cancelled_session_stops_cleanly() {
    let config = create_test_config();
    let (mut session, camera) = create_test_session(&config);

    let cancel = CancellationToken::new();
    cancel.cancel();
    let summary = session.run(cancel, |_| {}).await.unwrap();

    assert_eq!(summary.stop_reason, StopReason::Cancelled);
    assert_eq!(summary.frames_processed, 0);
    assert_eq!(camera.acquisitions(), 1);
    assert!(camera.opened_streams().iter().all(|s| !s.is_active()));
}

#[tokio::test]
async fn test_permission_denied_is_fatal() {
    let config = create_test_config();
    let (mut session, camera) = create_test_session(&config);
    camera.deny_access();

    let err = session.run(CancellationToken::new(), |_| {}).await.unwrap_err();
    assert!(matches!(err, PadelError::Stream(StreamError::CameraAccessDenied)));
    assert_eq!(err.category(), ErrorCategory::Fatal);
}

#[tokio::test(start_paused = true)]
async fn test_error_budget_stops_session() {
    let config = create_test_config();
    let (mut session, camera) = create_test_session(&config);
    let manager = Arc::clone(session.manager());

    let (result, _) = tokio::join!(session.run(CancellationToken::new(), |_| {}), async {
        tokio::time::sleep(Duration::from_millis(200)).await;
        // Pulls the stream out from under the loop; every capture now fails
        manager.cleanup();
    });

    match result {
        Err(PadelError::Pipeline(PipelineError::ErrorBudgetExceeded { errors, window })) => {
            assert_eq!(errors, 5);
            assert_eq!(window, Duration::from_secs(5));
        }
        other => panic!("Expected the error budget to stop the session, got {:?}", other),
    }
    assert!(camera.opened_streams().iter().all(|s| !s.is_active()));
}

#[tokio::test(start_paused = true)]
async fn test_inactive_stream_backs_off() {
    let mut config = create_test_config();
    config.pipeline.stall_threshold = 100;
    let (mut session, _camera) = create_test_session(&config);
    let manager = Arc::clone(session.manager());
    let cancel = CancellationToken::new();

    let (result, _) = tokio::join!(session.run(cancel.clone(), |_| {}), async {
        tokio::time::sleep(Duration::from_millis(100)).await;
        if let Some(stream) = manager.current_stream() {
            stream.stop_tracks();
        }
        tokio::time::sleep(Duration::from_secs(1)).await;
        cancel.cancel();
    });

    let summary = result.unwrap();
    assert_eq!(summary.stop_reason, StopReason::Cancelled);
    assert_eq!(summary.unexpected_errors, 0);
    assert!(
        (5..=11).contains(&summary.transient_retries),
        "{} retries in one second",
        summary.transient_retries
    );
}

#[tokio::test(start_paused = true)]
async fn test_dead_camera_is_reconnected_once() {
    let config = create_test_config();
    let (mut session, camera) = create_test_session(&config);
    let manager = Arc::clone(session.manager());
    let kinds = record_kinds(&session);
    let cancel = CancellationToken::new();

    let (result, _) = tokio::join!(session.run(cancel.clone(), |_| {}), async {
        tokio::time::sleep(Duration::from_millis(100)).await;
        if let Some(stream) = manager.current_stream() {
            stream.stop_tracks();
        }
        tokio::time::sleep(Duration::from_secs(3)).await;
        cancel.cancel();
    });

    let summary = result.unwrap();
    assert_eq!(summary.stop_reason, StopReason::Cancelled);
    assert_eq!(summary.reconnects, 1);
    assert!(summary.transient_retries >= 10);
    assert!(summary.frames_processed > 30, "{} frames", summary.frames_processed);
    assert_eq!(camera.acquisitions(), 2);
    assert_eq!(manager.stream_stats().recovery_attempts, 1);
    assert!(kinds.lock().contains(&ErrorKind::ConnectionLost));
}

#[tokio::test(start_paused = true)]
async fn test_failed_reconnect_stops_session() {
    let config = create_test_config();
    let (mut session, camera) = create_test_session(&config);
    let manager = Arc::clone(session.manager());

    let (result, _) = tokio::join!(session.run(CancellationToken::new(), |_| {}), async {
        tokio::time::sleep(Duration::from_millis(100)).await;
        camera.fail_next_acquisition(StreamError::Acquisition {
            details: "camera unplugged".to_string(),
        });
        if let Some(stream) = manager.current_stream() {
            stream.stop_tracks();
        }
    });

    let err = result.unwrap_err();
    assert!(matches!(err, PadelError::Stream(StreamError::Acquisition { .. })));
    assert_eq!(manager.stream_stats().recovery_attempts, 1);
    assert_eq!(camera.acquisitions(), 2);
    assert!(camera.opened_streams().iter().all(|s| !s.is_active()));
}

#[tokio::test(start_paused = true)]
async fn test_court_follows_stream_size() {
    let config = create_test_config();
    assert_eq!(config.analytics.fixed_court_size(), None);
    let (session, _camera) = create_test_session(&config);
    let mut session = session.with_frame_limit(300);

    let summary = session.run(CancellationToken::new(), |_| {}).await.unwrap();
    assert_eq!(summary.detections, 300);

    let analytics = session.analytics();
    let analytics = analytics.lock();
    assert_eq!(analytics.court_size(), (320, 180));
    assert_eq!(analytics.grid_size(), (32, 18));

    let stats = analytics.calculate_position_stats().unwrap();
    assert!(stats.left_side > 0.0 && stats.left_side < 1.0, "{:?}", stats);
    assert!(stats.front_court > 0.0 && stats.front_court < 1.0, "{:?}", stats);
    assert!(analytics
        .positions()
        .all(|p| p.x < 320.0 && p.y < 180.0));
}

#[tokio::test(start_paused = true)]
async fn test_fixed_court_size_is_kept() {
    let mut config = create_test_config();
    config.analytics.court_width = Some(640);
    config.analytics.court_height = Some(360);
    let (session, _camera) = create_test_session(&config);
    let mut session = session.with_frame_limit(3);

    session.run(CancellationToken::new(), |_| {}).await.unwrap();
    assert_eq!(session.analytics().lock().court_size(), (640, 360));
}

#[tokio::test(start_paused = true)]
async fn test_corrupt_frames_are_reported_not_counted() {
    let config = create_test_config();
    let manager = Arc::new(VideoStreamManager::new(config.stream.clone(), Arc::new(BrokenCamera)));
    let mut session = LiveSession::new(manager, &config).with_frame_limit(6);
    let kinds = record_kinds(&session);

    let summary = session.run(CancellationToken::new(), |_| {}).await.unwrap();

    assert_eq!(summary.stop_reason, StopReason::FrameLimit);
    assert_eq!(summary.corrupt_frames, 6);
    assert_eq!(summary.detections, 0);
    assert_eq!(summary.unexpected_errors, 0);
    assert_eq!(*kinds.lock(), vec![ErrorKind::FrameCorrupt; 6]);
    assert!(session.analytics().lock().is_empty());
}

#[tokio::test]
async fn test_slow_frames_reported() {
    let mut config = create_test_config();
    config.pipeline.processing_budget_ms = 0;
    let (session, _camera) = create_test_session(&config);
    let mut session = session.with_frame_limit(2);
    let kinds = record_kinds(&session);

    let summary = session.run(CancellationToken::new(), |_| {}).await.unwrap();

    assert_eq!(summary.slow_frames, 2);
    assert_eq!(*kinds.lock(), vec![ErrorKind::ProcessingTimeout; 2]);
}
