//! Liveness verification sessions.
//!
//! [`start_session`] acquires the camera, runs the blink / head-turn check on
//! a dedicated thread and hands back a [`SessionHandle`] exposing status
//! updates, the verification result and cancellation. A verified session's
//! selfie can then be sent to the backend with [`SubmissionClient`].

pub mod config;
pub mod session;
pub mod submission;

pub use config::{Config, ConfigError, SessionConfig};
pub use session::{
    start_session, Selfie, SessionError, SessionHandle, SessionStatus, VerificationResult,
};
pub use submission::{
    IdType, SubmissionClient, SubmissionError, SubmissionReceipt, Upload, VerificationSubmission,
};
