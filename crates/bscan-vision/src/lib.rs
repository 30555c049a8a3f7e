#![deny(unreachable_patterns)]
//! Blink detection over encoded video.
//!
//! This crate provides:
//! - FFmpeg/FFprobe CLI wrappers for bounded grayscale frame decoding
//! - A pluggable face/landmark localization seam
//! - The eye-openness geometry metric
//! - An adaptive, debounced blink decision engine
//! - A total `BlinkCounter` driver that never fails, only reports zero
//!
//! The driver is the only piece the embedding fatigue-scoring service
//! calls; everything underneath is exported for direct use and testing.

pub mod config;
pub mod counter;
pub mod decode;
pub mod ear;
pub mod engine;
pub mod error;
pub mod probe;
pub mod provider;

pub use config::BlinkConfig;
pub use counter::BlinkCounter;
pub use decode::{open_frames, FrameStream};
pub use ear::{eye_aspect_ratio, frame_openness, DEGENERATE_OPENNESS};
pub use engine::BlinkEngine;
pub use error::{VisionError, VisionResult};
pub use probe::{probe_video, VideoProbe};
pub use provider::LandmarkProvider;

#[cfg(feature = "inference")]
pub use provider::SeetaPfldProvider;
