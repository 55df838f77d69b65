use crate::media::MediaStream;
use std::collections::HashMap;

/// Named scene streams with at most one active scene
#[derive(Debug, Default)]
pub(crate) struct SceneRegistry {
    scenes: HashMap<String, MediaStream>,
    active: Option<String>,
}

impl SceneRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registered stream for `name` if it can still deliver frames
    pub fn live(&self, name: &str) -> Option<&MediaStream> {
        self.scenes.get(name).filter(|s| s.is_active())
    }

    /// Register `stream` under `name`, returning the stream it replaces
    pub fn insert(&mut self, name: &str, stream: MediaStream) -> Option<MediaStream> {
        self.scenes.insert(name.to_string(), stream)
    }

    pub fn set_active(&mut self, name: &str) {
        self.active = Some(name.to_string());
    }

    pub fn active_name(&self) -> Option<&str> {
        self.active.as_deref()
    }

    /// Whether any scene holds `stream`
    pub fn holds(&self, stream: &MediaStream) -> bool {
        self.scenes.values().any(|s| s == stream)
    }

    /// Scene names in sorted order
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.scenes.keys().cloned().collect();
        names.sort();
        names
    }

    pub fn len(&self) -> usize {
        self.scenes.len()
    }

    /// Remove every scene and clear the active key
    pub fn drain(&mut self) -> Vec<MediaStream> {
        self.active = None;
        self.scenes.drain().map(|(_, stream)| stream).collect()
    }
}
