use super::manager::VideoStreamManager;
use crate::config::StreamConfig;
use crate::error::{PadelError, Result};
use crate::error_bus::ErrorHandler;
use crate::media::MediaDevices;
use std::sync::Arc;

/// Builder for the video stream manager
pub struct VideoStreamManagerBuilder {
    config: Option<StreamConfig>,
    devices: Option<Arc<dyn MediaDevices>>,
    error_handler: Option<ErrorHandler>,
}

impl VideoStreamManagerBuilder {
    pub fn new() -> Self {
        Self {
            config: None,
            devices: None,
            error_handler: None,
        }
    }

    pub fn config(mut self, config: StreamConfig) -> Self {
        self.config = Some(config);
        self
    }

    pub fn devices(mut self, devices: Arc<dyn MediaDevices>) -> Self {
        self.devices = Some(devices);
        self
    }

    pub fn error_handler(mut self, error_handler: ErrorHandler) -> Self {
        self.error_handler = Some(error_handler);
        self
    }

    pub fn build(self) -> Result<VideoStreamManager> {
        let config = self
            .config
            .ok_or_else(|| PadelError::system("Stream configuration must be specified"))?;
        let devices = self
            .devices
            .ok_or_else(|| PadelError::system("A media device backend must be specified"))?;

        if config.width == 0 || config.height == 0 || config.frame_rate == 0 {
            return Err(PadelError::component(
                "stream_manager".to_string(),
                format!(
                    "invalid capture mode {}x{} @ {}fps",
                    config.width, config.height, config.frame_rate
                ),
            ));
        }

        Ok(VideoStreamManager::with_error_handler(
            config,
            devices,
            self.error_handler.unwrap_or_default(),
        ))
    }
}

impl Default for VideoStreamManagerBuilder {
    fn default() -> Self {
        Self::new()
    }
}
