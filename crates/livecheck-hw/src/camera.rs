use thiserror::Error;

use crate::frame::Frame;

#[derive(Error, Debug)]
pub enum CameraError {
    #[error("camera access denied")]
    PermissionDenied,
    #[error("no user-facing camera found: {0}")]
    NotFound(String),
    #[error("frame capture failed: {0}")]
    Capture(String),
    #[error("still encoding failed: {0}")]
    Encode(String),
}

/// A source of user-facing video streams.
pub trait CameraBackend {
    type Stream: VideoStream + 'static;

    /// Request the user-facing camera. Called once per session.
    fn open_user_facing(&mut self) -> Result<Self::Stream, CameraError>;
}

/// An open video stream.
pub trait VideoStream: Send {
    /// Grab the current frame.
    fn capture_frame(&mut self) -> Result<Frame, CameraError>;

    /// Stop all tracks and release the device.
    fn stop(&mut self);
}

/// Owns an open stream and stops it exactly once.
///
/// [`StreamGuard::release`] stops the stream; dropping an unreleased guard
/// stops it too, so a session that exits by error or unwind still turns the
/// camera off.
pub struct StreamGuard<S: VideoStream> {
    stream: Option<S>,
}

impl<S: VideoStream> StreamGuard<S> {
    pub fn new(stream: S) -> Self {
        Self {
            stream: Some(stream),
        }
    }

    pub fn is_active(&self) -> bool {
        self.stream.is_some()
    }

    pub fn capture_frame(&mut self) -> Result<Frame, CameraError> {
        match self.stream.as_mut() {
            Some(stream) => stream.capture_frame(),
            None => Err(CameraError::Capture("stream already released".into())),
        }
    }

    /// Stop the stream. Further calls are no-ops.
    pub fn release(&mut self) {
        if let Some(mut stream) = self.stream.take() {
            stream.stop();
            tracing::debug!("camera stream released");
        }
    }
}

impl<S: VideoStream> Drop for StreamGuard<S> {
    fn drop(&mut self) {
        self.release();
    }
}
