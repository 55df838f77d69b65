use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::{error, warn};

/// Kinds of stream problems broadcast on the error bus
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[non_exhaustive]
pub enum ErrorKind {
    ConnectionLost,
    FrameCorrupt,
    ProcessingTimeout,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::ConnectionLost => "CONNECTION_LOST",
            ErrorKind::FrameCorrupt => "FRAME_CORRUPT",
            ErrorKind::ProcessingTimeout => "PROCESSING_TIMEOUT",
        }
    }
}

/// A timestamped error broadcast to every subscriber
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorRecord {
    pub kind: ErrorKind,
    pub message: String,
    pub timestamp: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

type Listener = Box<dyn Fn(&ErrorRecord) + Send + Sync>;

/// Typed error broadcast for the tracking pipeline
#[derive(Default)]
pub struct ErrorHandler {
    listeners: RwLock<Vec<Listener>>,
    recovery_attempts: AtomicU64,
}

impl ErrorHandler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a subscriber; subscribers run in registration order
    pub fn on_error<F>(&self, callback: F)
    where
        F: Fn(&ErrorRecord) + Send + Sync + 'static,
    {
        self.listeners.write().push(Box::new(callback));
    }

    /// Build a record, notify every subscriber and count a recovery attempt
    pub fn handle_error(
        &self,
        kind: ErrorKind,
        message: impl Into<String>,
        details: Option<serde_json::Value>,
    ) -> ErrorRecord {
        let record = ErrorRecord {
            kind,
            message: message.into(),
            timestamp: Utc::now(),
            details,
        };

        match kind {
            ErrorKind::ConnectionLost => error!("{}: {}", kind.as_str(), record.message),
            _ => warn!("{}: {}", kind.as_str(), record.message),
        }

        for listener in self.listeners.read().iter() {
            listener(&record);
        }
        self.recovery_attempts.fetch_add(1, Ordering::Relaxed);

        record
    }

    pub fn recovery_attempts(&self) -> u64 {
        self.recovery_attempts.load(Ordering::Relaxed)
    }

    pub fn reset_recovery_attempts(&self) {
        self.recovery_attempts.store(0, Ordering::Relaxed);
    }

    pub fn subscriber_count(&self) -> usize {
        self.listeners.read().len()
    }
}

impl std::fmt::Debug for ErrorHandler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ErrorHandler")
            .field("subscribers", &self.subscriber_count())
            .field("recovery_attempts", &self.recovery_attempts())
            .finish()
    }
}
