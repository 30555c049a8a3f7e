//! Facial landmark sets using the 68-point convention.
//!
//! # Landmarks Layout (68-point model)
//!
//! - 0-16: Jaw outline
//! - 17-21: Left eyebrow
//! - 22-26: Right eyebrow
//! - 27-35: Nose
//! - 36-41: Left eye
//! - 42-47: Right eye
//! - 48-59: Outer lip
//! - 60-67: Inner lip
//!
//! Each eye contour is 6 points ordered outer corner, two upper-lid points,
//! inner corner, two lower-lid points — the ordering the eye-openness ratio
//! depends on.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::geometry::Point;

/// Number of points in a full landmark set.
pub const LANDMARK_COUNT: usize = 68;

/// Index range of the left eye contour.
pub const LEFT_EYE: std::ops::Range<usize> = 36..42;

/// Index range of the right eye contour.
pub const RIGHT_EYE: std::ops::Range<usize> = 42..48;

/// Error building a landmark set.
#[derive(Debug, Error)]
pub enum LandmarkError {
    #[error("expected {LANDMARK_COUNT} landmark points, got {0}")]
    WrongCount(usize),
}

/// 68-point facial landmarks for one detected face.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LandmarkSet {
    points: Vec<Point>,
}

impl LandmarkSet {
    /// Create a landmark set, validating the point count.
    pub fn new(points: Vec<Point>) -> Result<Self, LandmarkError> {
        if points.len() != LANDMARK_COUNT {
            return Err(LandmarkError::WrongCount(points.len()));
        }
        Ok(Self { points })
    }

    /// All 68 points in anatomical order.
    pub fn points(&self) -> &[Point] {
        &self.points
    }

    /// The 6-point left eye contour.
    pub fn left_eye(&self) -> [Point; 6] {
        self.eye_contour(LEFT_EYE)
    }

    /// The 6-point right eye contour.
    pub fn right_eye(&self) -> [Point; 6] {
        self.eye_contour(RIGHT_EYE)
    }

    fn eye_contour(&self, range: std::ops::Range<usize>) -> [Point; 6] {
        let mut contour = [Point::new(0.0, 0.0); 6];
        for (slot, idx) in range.enumerate() {
            contour[slot] = self.points[idx];
        }
        contour
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn uniform_set(x: f64, y: f64) -> Vec<Point> {
        vec![Point::new(x, y); LANDMARK_COUNT]
    }

    #[test]
    fn test_rejects_wrong_count() {
        let result = LandmarkSet::new(vec![Point::new(0.0, 0.0); 5]);
        assert!(matches!(result, Err(LandmarkError::WrongCount(5))));
    }

    #[test]
    fn test_eye_ranges_are_disjoint_and_in_bounds() {
        assert_eq!(LEFT_EYE.len(), 6);
        assert_eq!(RIGHT_EYE.len(), 6);
        assert_eq!(LEFT_EYE.end, RIGHT_EYE.start);
        assert!(RIGHT_EYE.end <= LANDMARK_COUNT);
    }

    #[test]
    fn test_eye_contours_pick_expected_indices() {
        let mut points = uniform_set(0.0, 0.0);
        points[36] = Point::new(1.0, 0.0);
        points[41] = Point::new(2.0, 0.0);
        points[42] = Point::new(3.0, 0.0);
        points[47] = Point::new(4.0, 0.0);

        let set = LandmarkSet::new(points).unwrap();
        assert_eq!(set.left_eye()[0].x, 1.0);
        assert_eq!(set.left_eye()[5].x, 2.0);
        assert_eq!(set.right_eye()[0].x, 3.0);
        assert_eq!(set.right_eye()[5].x, 4.0);
    }
}
