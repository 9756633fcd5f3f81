//! Scalar signals derived from landmark geometry.
//!
//! Two signals drive the liveness check: the eye aspect ratio (EAR), a
//! scale-invariant proxy for how open the eyes are, and the horizontal
//! position of the nose tip within the face box, a proxy for head yaw.

use serde::Serialize;

use crate::landmarks::{BoundingBox, EyeContour, FaceLandmarks, Point};

/// Eye aspect ratio of one eye.
///
/// `(|p1 - p5| + |p2 - p4|) / (2 * |p0 - p3|)`: the two vertical lid gaps
/// averaged, over the horizontal eye width. Lower means more closed.
/// Returns `None` when the eye width is zero or not finite.
pub fn eye_aspect_ratio(eye: &EyeContour) -> Option<f32> {
    let [p0, p1, p2, p3, p4, p5] = eye.points();
    let width = p0.distance(p3);
    if !width.is_finite() || width <= f32::EPSILON {
        return None;
    }
    let vertical = p1.distance(p5) + p2.distance(p4);
    let ratio = vertical / (2.0 * width);
    ratio.is_finite().then_some(ratio)
}

/// Mean EAR of both eyes.
pub fn eye_openness_ratio(left: &EyeContour, right: &EyeContour) -> Option<f32> {
    let l = eye_aspect_ratio(left)?;
    let r = eye_aspect_ratio(right)?;
    Some((l + r) / 2.0)
}

/// Horizontal nose-tip position within the face box, in `[0, 1]`.
///
/// ~0.5 is a centred head; values towards 0 or 1 mean strong rotation.
///
/// The ratio is measured on the raw camera frame while the user watches a
/// mirrored preview, so a *low* ratio is what the user perceives as turning
/// to their *right*. The liveness thresholds are written against that
/// inversion; do not flip the ratio here.
pub fn head_position_ratio(nose_tip: Point, face_box: &BoundingBox) -> Option<f32> {
    if !face_box.width.is_finite() || face_box.width <= 0.0 {
        return None;
    }
    let ratio = (nose_tip.x - face_box.x) / face_box.width;
    ratio.is_finite().then(|| ratio.clamp(0.0, 1.0))
}

/// One poll tick's worth of signal, ready for the state machine.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct FrameSample {
    pub eye_openness_ratio: f32,
    pub head_position_ratio: f32,
    pub face_detected: bool,
}

impl FrameSample {
    pub fn new(eye_openness_ratio: f32, head_position_ratio: f32) -> Self {
        Self {
            eye_openness_ratio,
            head_position_ratio,
            face_detected: true,
        }
    }

    pub fn no_face() -> Self {
        Self {
            eye_openness_ratio: 0.0,
            head_position_ratio: 0.5,
            face_detected: false,
        }
    }

    /// Build a sample from a detection result.
    ///
    /// A missing face, a nose set without a tip, or degenerate geometry all
    /// yield [`FrameSample::no_face`].
    pub fn from_landmarks(face: Option<&FaceLandmarks>) -> Self {
        let Some(face) = face else {
            return Self::no_face();
        };
        let ear = eye_openness_ratio(&face.left_eye, &face.right_eye);
        let head = face
            .nose_tip()
            .and_then(|tip| head_position_ratio(tip, &face.face_box));
        match (ear, head) {
            (Some(ear), Some(head)) => Self::new(ear, head),
            _ => {
                tracing::trace!("degenerate landmark geometry, treating as no face");
                Self::no_face()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Eye of width 10 with both lid gaps equal to `gap`.
    fn eye(gap: f32) -> EyeContour {
        let h = gap / 2.0;
        EyeContour([
            Point::new(0.0, 0.0),
            Point::new(3.0, -h),
            Point::new(7.0, -h),
            Point::new(10.0, 0.0),
            Point::new(7.0, h),
            Point::new(3.0, h),
        ])
    }

    fn face(nose_x: f32, gap: f32) -> FaceLandmarks {
        let mut nose = vec![Point::new(50.0, 40.0); 9];
        nose[3] = Point::new(nose_x, 60.0);
        FaceLandmarks {
            face_box: BoundingBox {
                x: 0.0,
                y: 0.0,
                width: 100.0,
                height: 120.0,
            },
            left_eye: eye(gap),
            right_eye: eye(gap),
            nose,
        }
    }

    #[test]
    fn ear_of_known_geometry() {
        // gaps 4 and 4 over width 10 → 8 / 20 = 0.4
        assert!((eye_aspect_ratio(&eye(4.0)).unwrap() - 0.4).abs() < 1e-6);
    }

    #[test]
    fn ear_is_scale_invariant() {
        let small = eye(3.0);
        let big = EyeContour(small.0.map(|p| Point::new(p.x * 4.0, p.y * 4.0)));
        let a = eye_aspect_ratio(&small).unwrap();
        let b = eye_aspect_ratio(&big).unwrap();
        assert!((a - b).abs() < 1e-6);
    }

    #[test]
    fn ear_rejects_zero_width() {
        let collapsed = EyeContour([Point::new(5.0, 5.0); 6]);
        assert_eq!(eye_aspect_ratio(&collapsed), None);
    }

    #[test]
    fn openness_averages_both_eyes() {
        let r = eye_openness_ratio(&eye(2.0), &eye(4.0)).unwrap();
        // 0.2 and 0.4
        assert!((r - 0.3).abs() < 1e-6);
    }

    #[test]
    fn head_ratio_centred_and_clamped() {
        let b = BoundingBox {
            x: 100.0,
            y: 0.0,
            width: 200.0,
            height: 200.0,
        };
        assert!((head_position_ratio(Point::new(200.0, 0.0), &b).unwrap() - 0.5).abs() < 1e-6);
        assert_eq!(head_position_ratio(Point::new(50.0, 0.0), &b), Some(0.0));
        assert_eq!(head_position_ratio(Point::new(400.0, 0.0), &b), Some(1.0));
    }

    #[test]
    fn head_ratio_rejects_empty_box() {
        let b = BoundingBox::default();
        assert_eq!(head_position_ratio(Point::new(1.0, 1.0), &b), None);
    }

    #[test]
    fn sample_from_missing_face() {
        let s = FrameSample::from_landmarks(None);
        assert!(!s.face_detected);
    }

    #[test]
    fn sample_from_face() {
        let f = face(30.0, 4.0);
        let s = FrameSample::from_landmarks(Some(&f));
        assert!(s.face_detected);
        assert!((s.eye_openness_ratio - 0.4).abs() < 1e-6);
        assert!((s.head_position_ratio - 0.3).abs() < 1e-6);
    }

    #[test]
    fn sample_without_nose_tip_is_no_face() {
        let mut f = face(50.0, 4.0);
        f.nose.truncate(2);
        assert!(!FrameSample::from_landmarks(Some(&f)).face_detected);
    }
}
