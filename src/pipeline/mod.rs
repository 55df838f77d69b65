//! Per-frame processing loop tying capture, detection and analytics together

pub mod session;

#[cfg(test)]
mod tests;

pub use session::{Detection, LiveSession, SessionSummary, StopReason, FRAME_METRIC};
