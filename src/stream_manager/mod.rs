//! Camera acquisition, paced frame capture and scene management

pub mod builder;
pub mod manager;
mod scenes;
pub mod stats;


pub use builder::VideoStreamManagerBuilder;
pub use manager::{SceneSwitch, VideoStreamManager};
pub use stats::StreamStats;
