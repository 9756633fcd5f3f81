use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::camera::{CameraBackend, CameraError, VideoStream};
use crate::frame::Frame;

/// A camera that serves one still image as every frame.
///
/// Pairs with a recorded landmark stream to replay a session without a
/// physical device. `stopped()` reports whether the last opened stream has
/// been stopped.
pub struct StillImageCamera {
    frame: Frame,
    source: PathBuf,
    stopped: Arc<AtomicBool>,
}

impl StillImageCamera {
    /// Decode the image at `path` into an RGB frame.
    pub fn open(path: &Path) -> Result<Self, CameraError> {
        if !path.exists() {
            return Err(CameraError::NotFound(path.display().to_string()));
        }
        let img = image::open(path)
            .map_err(|e| CameraError::Capture(format!("{}: {e}", path.display())))?
            .to_rgb8();
        let (width, height) = img.dimensions();
        let frame = Frame::from_rgb(width, height, img.into_raw())?;
        tracing::debug!(
            path = %path.display(),
            width,
            height,
            brightness = frame.mean_brightness(),
            "still image loaded"
        );
        Ok(Self::from_frame(frame, path.to_path_buf()))
    }

    /// A uniform mid-grey frame of the given size.
    pub fn blank(width: u32, height: u32) -> Self {
        let data = vec![128u8; width as usize * height as usize * 3];
        let frame = Frame {
            width,
            height,
            data,
        };
        Self::from_frame(frame, PathBuf::from("<blank>"))
    }

    fn from_frame(frame: Frame, source: PathBuf) -> Self {
        Self {
            frame,
            source,
            stopped: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn stopped(&self) -> bool {
        self.stopped.load(Ordering::SeqCst)
    }
}

impl CameraBackend for StillImageCamera {
    type Stream = StillStream;

    fn open_user_facing(&mut self) -> Result<StillStream, CameraError> {
        tracing::info!(source = %self.source.display(), "still camera opened");
        self.stopped.store(false, Ordering::SeqCst);
        Ok(StillStream {
            frame: self.frame.clone(),
            stopped: self.stopped.clone(),
        })
    }
}

pub struct StillStream {
    frame: Frame,
    stopped: Arc<AtomicBool>,
}

impl VideoStream for StillStream {
    fn capture_frame(&mut self) -> Result<Frame, CameraError> {
        if self.stopped.load(Ordering::SeqCst) {
            return Err(CameraError::Capture("stream stopped".into()));
        }
        Ok(self.frame.clone())
    }

    fn stop(&mut self) {
        self.stopped.store(true, Ordering::SeqCst);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_is_not_found() {
        let err = StillImageCamera::open(Path::new("/nonexistent/frame.png")).err().unwrap();
        assert!(matches!(err, CameraError::NotFound(_)));
    }

    #[test]
    fn serves_decoded_image() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("face.png");
        image::RgbImage::from_pixel(6, 4, image::Rgb([10, 20, 30]))
            .save(&path)
            .unwrap();

        let mut camera = StillImageCamera::open(&path).unwrap();
        let mut stream = camera.open_user_facing().unwrap();
        let frame = stream.capture_frame().unwrap();
        assert_eq!((frame.width, frame.height), (6, 4));
        assert_eq!(&frame.data[..3], &[10, 20, 30]);

        stream.stop();
        assert!(camera.stopped());
        assert!(stream.capture_frame().is_err());
    }
}
