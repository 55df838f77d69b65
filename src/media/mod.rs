//! Capture host abstraction: devices, streams and the playback surface

pub mod devices;
pub mod element;
pub mod stream;
pub mod synthetic;

pub use devices::{select_preferred_device, DeviceInfo, DeviceKind, MediaDevices, VideoConstraints};
pub use element::{PlaybackState, VideoElement};
pub use stream::{FrameRenderer, MediaStream, TrackCapabilities, TrackSettings, TrackState, VideoTrack};
pub use synthetic::SyntheticCamera;
