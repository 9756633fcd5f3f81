use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Index of the nose tip within [`FaceLandmarks::nose`].
///
/// The 68-point model exposes the nose as points 27..=35; the bridge runs
/// 27..=30 and point 30 (index 3 of the set) is the tip.
pub const NOSE_TIP_INDEX: usize = 3;

/// A 2-D image coordinate in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Point {
    pub x: f32,
    pub y: f32,
}

impl Point {
    pub const fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    /// Euclidean distance to `other`.
    pub fn distance(&self, other: &Point) -> f32 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        (dx * dx + dy * dy).sqrt()
    }
}

/// Axis-aligned face bounding box, origin at the top-left corner.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct BoundingBox {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

/// Six ordered contour points of one eye.
///
/// Order: outer corner, two upper-lid points, inner corner, two lower-lid
/// points. Point 1 sits above point 5 and point 2 above point 4.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EyeContour(pub [Point; 6]);

impl EyeContour {
    pub fn points(&self) -> &[Point; 6] {
        &self.0
    }
}

/// One detected face as reported by a [`LandmarkSource`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FaceLandmarks {
    pub face_box: BoundingBox,
    pub left_eye: EyeContour,
    pub right_eye: EyeContour,
    pub nose: Vec<Point>,
}

impl FaceLandmarks {
    /// The nose tip, if the nose set is long enough to contain it.
    pub fn nose_tip(&self) -> Option<Point> {
        self.nose.get(NOSE_TIP_INDEX).copied()
    }
}

#[derive(Error, Debug)]
pub enum DetectorError {
    #[error("landmark model unavailable: {0}")]
    ModelUnavailable(String),
    #[error("invalid frame: {width}x{height} with {len} bytes")]
    InvalidFrame { width: u32, height: u32, len: usize },
    #[error("landmark detection failed: {0}")]
    Inference(String),
}

/// Per-frame facial landmark detection.
///
/// `rgb` is packed RGB8, `width * height * 3` bytes. Returns `Ok(None)` when
/// no face is in view; that is a normal outcome, not an error. When several
/// faces are visible the implementation reports the most confident one.
pub trait LandmarkSource: Send {
    fn detect(
        &mut self,
        rgb: &[u8],
        width: u32,
        height: u32,
    ) -> Result<Option<FaceLandmarks>, DetectorError>;
}
