//! Eye-openness ratio from eye-contour landmarks.
//!
//! The ratio is high while the eye is open and collapses toward zero as the
//! lids close, which is what the decision engine thresholds against.

use bscan_models::{LandmarkSet, Point};

/// Ratio reported when the eye-corner distance degenerates to zero.
///
/// Zero horizontal spread means the measurement is garbage, not that the eye
/// is closed; substituting a normal open-eye value keeps one bad frame from
/// registering as a blink.
pub const DEGENERATE_OPENNESS: f64 = 0.3;

/// Compute the openness ratio for one 6-point eye contour.
///
/// Points are ordered outer corner, two upper-lid points, inner corner, two
/// lower-lid points:
///
/// ```text
/// ratio = (|p2-p6| + |p3-p5|) / (2 * |p1-p4|)
/// ```
pub fn eye_aspect_ratio(eye: &[Point; 6]) -> f64 {
    let vertical_a = eye[1].distance(&eye[5]);
    let vertical_b = eye[2].distance(&eye[4]);
    let horizontal = eye[0].distance(&eye[3]);

    if horizontal == 0.0 {
        return DEGENERATE_OPENNESS;
    }

    (vertical_a + vertical_b) / (2.0 * horizontal)
}

/// Per-frame openness: the average of the left and right eye ratios.
pub fn frame_openness(landmarks: &LandmarkSet) -> f64 {
    let left = eye_aspect_ratio(&landmarks.left_eye());
    let right = eye_aspect_ratio(&landmarks.right_eye());
    (left + right) / 2.0
}
