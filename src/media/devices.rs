use super::stream::MediaStream;
use crate::error::StreamError;
use async_trait::async_trait;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceKind {
    VideoInput,
    AudioInput,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceInfo {
    pub device_id: String,
    pub kind: DeviceKind,
    pub label: String,
}

/// Requested capture mode. Dimensions and rate are ideal hints the device
/// may not honor exactly; `device_id` is exact when present.
#[derive(Debug, Clone, PartialEq)]
pub struct VideoConstraints {
    pub ideal_width: u32,
    pub ideal_height: u32,
    pub ideal_frame_rate: u32,
    pub device_id: Option<String>,
}

/// Host capture API
#[async_trait]
pub trait MediaDevices: Send + Sync {
    async fn enumerate_devices(&self) -> Result<Vec<DeviceInfo>, StreamError>;

    /// Open a video stream; refusal of permission must surface as
    /// `StreamError::CameraAccessDenied`
    async fn get_user_media(&self, constraints: &VideoConstraints) -> Result<MediaStream, StreamError>;
}

/// First video input whose label contains one of `preferred_labels`
/// (case-insensitive)
pub fn select_preferred_device(devices: &[DeviceInfo], preferred_labels: &[String]) -> Option<String> {
    devices
        .iter()
        .filter(|d| d.kind == DeviceKind::VideoInput)
        .find(|d| {
            let label = d.label.to_lowercase();
            preferred_labels
                .iter()
                .any(|wanted| !wanted.is_empty() && label.contains(&wanted.to_lowercase()))
        })
        .map(|d| d.device_id.clone())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn device(id: &str, kind: DeviceKind, label: &str) -> DeviceInfo {
        DeviceInfo {
            device_id: id.to_string(),
            kind,
            label: label.to_string(),
        }
    }

    #[test]
    fn test_prefers_external_camera() {
        let devices = vec![
            device("a", DeviceKind::VideoInput, "Integrated Webcam"),
            device("b", DeviceKind::AudioInput, "External Microphone"),
            device("c", DeviceKind::VideoInput, "USB External Camera"),
        ];
        let preferred = vec!["external".to_string(), "streamlabs".to_string()];
        assert_eq!(select_preferred_device(&devices, &preferred), Some("c".to_string()));
    }

    #[test]
    fn test_no_match_uses_default() {
        let devices = vec![device("a", DeviceKind::VideoInput, "Integrated Webcam")];
        let preferred = vec!["streamlabs".to_string()];
        assert_eq!(select_preferred_device(&devices, &preferred), None);
        assert_eq!(select_preferred_device(&devices, &[]), None);
    }
}
