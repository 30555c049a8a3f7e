//! Shared data models for the BlinkScan pipeline.
//!
//! This crate provides Serde-serializable types for:
//! - Geometry primitives (points, bounding boxes)
//! - Facial landmark sets (68-point convention)
//! - Blink events and analysis reports

pub mod geometry;
pub mod landmarks;
pub mod report;

// Re-export common types
pub use geometry::{BoundingBox, Point};
pub use landmarks::{LandmarkError, LandmarkSet, LANDMARK_COUNT, LEFT_EYE, RIGHT_EYE};
pub use report::{BlinkReason, BlinkReport};
