//! Camera acquisition for livecheck.
//!
//! The session owns exactly one [`VideoStream`] at a time, wrapped in a
//! [`StreamGuard`] so the stream's tracks are stopped exactly once on every
//! exit path.

pub mod camera;
pub mod frame;
pub mod still;

pub use camera::{CameraBackend, CameraError, StreamGuard, VideoStream};
pub use frame::Frame;
pub use still::StillImageCamera;
