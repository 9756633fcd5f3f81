use std::fmt;
use std::sync::mpsc::{self as std_mpsc, RecvTimeoutError};

use chrono::{DateTime, Utc};
use livecheck_core::{DetectorError, FrameSample, LandmarkSource, LivenessMachine, Progress, Step};
use livecheck_hw::{CameraBackend, CameraError, StreamGuard, VideoStream};
use thiserror::Error;
use tokio::sync::{oneshot, watch};
use uuid::Uuid;

use crate::config::{ConfigError, SessionConfig};

#[derive(Error, Debug)]
pub enum SessionError {
    #[error("camera access was denied; allow camera access and start again")]
    PermissionDenied,
    #[error("face detection model unavailable: {0}")]
    ModelUnavailable(String),
    #[error("camera error: {0}")]
    Camera(#[source] CameraError),
    #[error("detector error: {0}")]
    Detector(#[from] DetectorError),
    #[error("invalid session configuration: {0}")]
    Config(#[from] ConfigError),
    #[error("failed to spawn session thread: {0}")]
    Spawn(#[source] std::io::Error),
    #[error("session cancelled")]
    Cancelled,
    #[error("session thread exited")]
    ChannelClosed,
}

impl From<CameraError> for SessionError {
    fn from(e: CameraError) -> Self {
        match e {
            CameraError::PermissionDenied => SessionError::PermissionDenied,
            other => SessionError::Camera(other),
        }
    }
}

/// User-facing session status, published on every change.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionStatus {
    Starting,
    NoFace,
    Progress(Progress),
    Verified,
    Cancelled,
    Failed(String),
}

impl SessionStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            SessionStatus::Verified | SessionStatus::Cancelled | SessionStatus::Failed(_)
        )
    }
}

impl fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionStatus::Starting => f.write_str("starting camera"),
            SessionStatus::NoFace => f.write_str("no face detected"),
            SessionStatus::Progress(p) => {
                let done: Vec<&str> = [
                    (p.blinked, "blink OK"),
                    (p.turned_left, "left OK"),
                    (p.turned_right, "right OK"),
                ]
                .into_iter()
                .filter_map(|(ok, label)| ok.then_some(label))
                .collect();
                if done.is_empty() {
                    f.write_str("face detected: blink, then turn your head left and right")
                } else {
                    f.write_str(&done.join(", "))
                }
            }
            SessionStatus::Verified => f.write_str("liveness verified"),
            SessionStatus::Cancelled => f.write_str("cancelled"),
            SessionStatus::Failed(msg) => write!(f, "failed: {msg}"),
        }
    }
}

/// The still frame captured at the moment of verification.
#[derive(Debug, Clone)]
pub struct Selfie {
    pub jpeg: Vec<u8>,
    pub width: u32,
    pub height: u32,
}

/// Result of a completed session. The caller owns the captured frame.
#[derive(Debug, Clone)]
pub struct VerificationResult {
    pub session_id: Uuid,
    pub verified: bool,
    pub captured_frame: Option<Selfie>,
    pub captured_at: DateTime<Utc>,
}

/// Handle to a running session.
///
/// Dropping the handle cancels the session.
pub struct SessionHandle {
    id: Uuid,
    status: watch::Receiver<SessionStatus>,
    outcome: oneshot::Receiver<Result<VerificationResult, SessionError>>,
    cancel: std_mpsc::Sender<()>,
}

impl SessionHandle {
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Subscribe to status changes.
    pub fn status(&self) -> watch::Receiver<SessionStatus> {
        self.status.clone()
    }

    /// Wait for the session to finish.
    ///
    /// Resolves once the camera has been released.
    pub async fn verified(self) -> Result<VerificationResult, SessionError> {
        let Self {
            outcome, cancel, ..
        } = self;
        let result = outcome.await;
        drop(cancel);
        result.map_err(|_| SessionError::ChannelClosed)?
    }

    /// Stop the session and wait for the camera to be released.
    pub async fn cancel(self) {
        tracing::info!(session = %self.id, "cancel requested");
        let _ = self.cancel.send(());
        let _ = self.outcome.await;
    }
}

/// Start a liveness session.
///
/// Loads the landmark source first, then opens the user-facing camera. If
/// either fails no session is created; a model failure never touches the
/// camera.
pub fn start_session<B, L, F>(
    config: &SessionConfig,
    backend: &mut B,
    load_source: F,
) -> Result<SessionHandle, SessionError>
where
    B: CameraBackend,
    L: LandmarkSource + 'static,
    F: FnOnce() -> Result<L, DetectorError>,
{
    config.validate()?;
    let machine = LivenessMachine::new(config.liveness.clone()).map_err(ConfigError::from)?;

    let source = load_source().map_err(|e| {
        tracing::error!(error = %e, "landmark source failed to load");
        SessionError::ModelUnavailable(e.to_string())
    })?;

    let stream = backend.open_user_facing().map_err(|e| {
        tracing::warn!(error = %e, "camera acquisition failed");
        SessionError::from(e)
    })?;
    let camera = StreamGuard::new(stream);

    let id = Uuid::new_v4();
    let (status_tx, status_rx) = watch::channel(SessionStatus::Starting);
    let (outcome_tx, outcome_rx) = oneshot::channel();
    let (cancel_tx, cancel_rx) = std_mpsc::channel();

    let worker = Worker {
        id,
        camera,
        source,
        machine,
        poll_interval: config.poll_interval,
        jpeg_quality: config.selfie_jpeg_quality,
        cancel: cancel_rx,
    };

    std::thread::Builder::new()
        .name("livecheck-session".into())
        .spawn(move || {
            tracing::info!(session = %id, "session started");
            let result = worker.run(&status_tx);
            let terminal = match &result {
                Ok(_) => SessionStatus::Verified,
                Err(SessionError::Cancelled) => SessionStatus::Cancelled,
                Err(e) => SessionStatus::Failed(e.to_string()),
            };
            match &result {
                Ok(_) => tracing::info!(session = %id, "session verified"),
                Err(SessionError::Cancelled) => tracing::info!(session = %id, "session cancelled"),
                Err(e) => tracing::error!(session = %id, error = %e, "session failed"),
            }
            status_tx.send_replace(terminal);
            let _ = outcome_tx.send(result);
        })
        .map_err(SessionError::Spawn)?;

    Ok(SessionHandle {
        id,
        status: status_rx,
        outcome: outcome_rx,
        cancel: cancel_tx,
    })
}

/// State owned by the session thread. Dropping it releases the camera.
struct Worker<S: VideoStream, L: LandmarkSource> {
    id: Uuid,
    camera: StreamGuard<S>,
    source: L,
    machine: LivenessMachine,
    poll_interval: std::time::Duration,
    jpeg_quality: u8,
    cancel: std_mpsc::Receiver<()>,
}

impl<S: VideoStream, L: LandmarkSource> Worker<S, L> {
    /// Poll until verified, cancelled, or failed. Consumes the worker so the
    /// camera is released before the caller reports the outcome.
    fn run(mut self, status: &watch::Sender<SessionStatus>) -> Result<VerificationResult, SessionError> {
        self.machine.start();
        let mut ticks = 0u64;

        loop {
            // The wait doubles as the cancellation point; a tick never
            // starts before the previous one has finished.
            match self.cancel.recv_timeout(self.poll_interval) {
                Ok(()) | Err(RecvTimeoutError::Disconnected) => return Err(SessionError::Cancelled),
                Err(RecvTimeoutError::Timeout) => {}
            }
            ticks += 1;

            let frame = self.camera.capture_frame()?;
            let face = self.source.detect(&frame.data, frame.width, frame.height)?;
            let sample = FrameSample::from_landmarks(face.as_ref());

            match self.machine.observe(&sample) {
                Step::Ignored => {}
                Step::NoFace => {
                    tracing::trace!(session = %self.id, tick = ticks, "no face");
                    self.publish(status, SessionStatus::NoFace);
                }
                Step::Progress(progress) => self.publish(status, SessionStatus::Progress(progress)),
                Step::Verified(_) => {
                    let jpeg = frame.encode_jpeg(self.jpeg_quality)?;
                    self.camera.release();
                    tracing::debug!(
                        session = %self.id,
                        ticks,
                        bytes = jpeg.len(),
                        "selfie captured"
                    );
                    return Ok(VerificationResult {
                        session_id: self.id,
                        verified: true,
                        captured_frame: Some(Selfie {
                            jpeg,
                            width: frame.width,
                            height: frame.height,
                        }),
                        captured_at: Utc::now(),
                    });
                }
            }
        }
    }

    fn publish(&self, status: &watch::Sender<SessionStatus>, next: SessionStatus) {
        status.send_if_modified(|current| {
            if *current == next {
                return false;
            }
            tracing::debug!(session = %self.id, status = %next, "status changed");
            *current = next;
            true
        });
    }
}
