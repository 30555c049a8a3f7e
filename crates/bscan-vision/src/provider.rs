//! Pluggable face/landmark localization backends.
//!
//! The pipeline consumes two capabilities per frame: face bounding boxes on
//! a (possibly downsampled) grayscale frame, and 68-point landmarks for one
//! face region on the full-resolution frame. Both sit behind one trait so
//! backends are constructed explicitly and injected, never reached through
//! module-level singletons — fakes in tests, heavyweight models in
//! production, each analysis free to own (or share) its provider.

use bscan_models::{BoundingBox, LandmarkSet};
use image::GrayImage;

#[cfg(feature = "inference")]
pub mod seeta_pfld;

#[cfg(feature = "inference")]
pub use seeta_pfld::SeetaPfldProvider;

/// Face and landmark localization over grayscale frames.
///
/// Methods take `&mut self`: detector state is commonly non-reentrant, and
/// the scan loop is strictly frame-sequential anyway.
pub trait LandmarkProvider: Send {
    /// Detect face bounding boxes in a grayscale frame. May be empty;
    /// implementations should order results most-confident first, since the
    /// pipeline analyzes only the first face.
    fn detect_faces(&mut self, frame: &GrayImage) -> Vec<BoundingBox>;

    /// Extract 68-point landmarks for a face region of a grayscale frame.
    /// `None` when the backend cannot produce a usable set for this region.
    fn landmarks(&mut self, frame: &GrayImage, face: &BoundingBox) -> Option<LandmarkSet>;
}

impl<P: LandmarkProvider + ?Sized> LandmarkProvider for Box<P> {
    fn detect_faces(&mut self, frame: &GrayImage) -> Vec<BoundingBox> {
        (**self).detect_faces(frame)
    }

    fn landmarks(&mut self, frame: &GrayImage, face: &BoundingBox) -> Option<LandmarkSet> {
        (**self).landmarks(frame, face)
    }
}
