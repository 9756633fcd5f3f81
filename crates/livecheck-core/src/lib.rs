//! Core of the livecheck liveness verification: facial landmark geometry,
//! the signal extractors built on it, and the blink / head-turn state machine.
//!
//! Nothing here touches a camera or a model. Landmarks arrive through the
//! [`LandmarkSource`] trait and the state machine is a pure function of the
//! samples it is fed.

pub mod landmarks;
pub mod liveness;
pub mod signals;

pub use landmarks::{BoundingBox, DetectorError, EyeContour, FaceLandmarks, LandmarkSource, Point};
pub use liveness::{
    reduce, LivenessConfig, LivenessConfigError, LivenessMachine, LivenessState, Phase, Progress,
    Step,
};
pub use signals::FrameSample;
