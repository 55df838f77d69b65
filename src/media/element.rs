use super::stream::MediaStream;
use crate::error::StreamError;
use tracing::trace;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaybackState {
    Idle,
    Playing,
}

/// Playback surface bound to at most one stream
#[derive(Debug)]
pub struct VideoElement {
    source: Option<MediaStream>,
    state: PlaybackState,
}

impl VideoElement {
    pub fn new() -> Self {
        Self {
            source: None,
            state: PlaybackState::Idle,
        }
    }

    /// Bind a stream without starting it
    pub fn load(&mut self, stream: MediaStream) {
        self.source = Some(stream);
        self.state = PlaybackState::Idle;
    }

    /// Start playback of the bound stream
    pub async fn play(&mut self) -> Result<(), StreamError> {
        let stream = self.source.as_ref().ok_or(StreamError::NotInitialized)?;
        stream.start_playback().await?;
        self.state = PlaybackState::Playing;
        trace!("Video element playing stream {}", stream.id());
        Ok(())
    }

    /// Swap in a stream already confirmed playing; returns the previous source
    pub fn present(&mut self, stream: MediaStream) -> Option<MediaStream> {
        self.state = PlaybackState::Playing;
        self.source.replace(stream)
    }

    pub fn detach(&mut self) -> Option<MediaStream> {
        self.state = PlaybackState::Idle;
        self.source.take()
    }

    pub fn source(&self) -> Option<&MediaStream> {
        self.source.as_ref()
    }

    pub fn is_playing(&self) -> bool {
        self.state == PlaybackState::Playing
    }

    /// Draw the current picture scaled to `width` x `height`
    pub fn draw(&self, width: u32, height: u32) -> Result<Vec<u8>, StreamError> {
        let stream = self.source.as_ref().ok_or(StreamError::NotInitialized)?;
        if !stream.is_active() {
            return Err(StreamError::StreamInactive);
        }
        if !self.is_playing() {
            return Err(StreamError::VideoNotReady);
        }
        Ok(stream.render(width, height))
    }
}

impl Default for VideoElement {
    fn default() -> Self {
        Self::new()
    }
}
