//! Landmark source backed by a recording.
//!
//! A recording is JSON Lines: one detection per line, either a
//! `FaceLandmarks` object or `null` for a frame without a face. Blank lines
//! and lines starting with `#` are skipped.

use std::collections::VecDeque;
use std::path::Path;

use livecheck_core::{DetectorError, FaceLandmarks, LandmarkSource};

pub struct RecordedLandmarks {
    frames: VecDeque<Option<FaceLandmarks>>,
}

impl RecordedLandmarks {
    pub fn load(path: &Path) -> Result<Self, DetectorError> {
        let text = std::fs::read_to_string(path).map_err(|e| {
            DetectorError::ModelUnavailable(format!("{}: {e}", path.display()))
        })?;
        Self::parse(&text)
    }

    pub fn parse(text: &str) -> Result<Self, DetectorError> {
        let mut frames = VecDeque::new();
        for (i, line) in text.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let frame: Option<FaceLandmarks> = serde_json::from_str(line).map_err(|e| {
                DetectorError::ModelUnavailable(format!("recording line {}: {e}", i + 1))
            })?;
            frames.push_back(frame);
        }
        if frames.is_empty() {
            return Err(DetectorError::ModelUnavailable("recording is empty".into()));
        }
        Ok(Self { frames })
    }

    pub fn remaining(&self) -> usize {
        self.frames.len()
    }
}

impl LandmarkSource for RecordedLandmarks {
    /// The frame itself is ignored; the next recorded detection is returned.
    /// An exhausted recording reports no face.
    fn detect(
        &mut self,
        _rgb: &[u8],
        _width: u32,
        _height: u32,
    ) -> Result<Option<FaceLandmarks>, DetectorError> {
        Ok(self.frames.pop_front().flatten())
    }
}
