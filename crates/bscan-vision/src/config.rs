//! Configuration for the blink detection pipeline.

use serde::{Deserialize, Serialize};

/// Configuration for frame decoding and blink detection.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BlinkConfig {
    // === Frame Pipeline ===
    /// Hard cap on decoded frames (default: 450, ~15s at typical rates)
    pub max_frames: u64,

    /// Frames wider than this are downscaled to this width before
    /// processing, preserving aspect ratio (default: 640)
    pub max_frame_width: u32,

    /// Process every Nth decoded frame (default: 1 = every frame)
    pub frame_stride: u64,

    // === Detection Thresholds ===
    /// Fixed openness threshold used until enough history accumulates
    /// (default: 0.32)
    pub base_threshold: f64,

    /// Fraction of the recent-median baseline that counts as closed
    /// (default: 0.80)
    pub dynamic_ratio: f64,

    /// Lower clamp for the dynamic threshold (default: 0.22)
    pub dynamic_floor: f64,

    /// Upper clamp for the dynamic threshold (default: 0.35)
    pub dynamic_ceil: f64,

    /// Frame-to-frame openness drop that flags a blink on its own
    /// (default: 0.05)
    pub sudden_drop: f64,

    /// Fraction of the running average that counts as closed
    /// (default: 0.78)
    pub relative_ratio: f64,

    // === Debounce ===
    /// Frames a sample must stay below the dynamic threshold before
    /// flagging (default: 1 — any single low frame flags immediately)
    pub required_run: u32,

    /// Frames of suppression after each flagged blink (default: 3)
    pub cooldown_frames: u32,

    // === History ===
    /// Sliding window of retained openness samples (default: 30)
    pub history_window: usize,

    /// Samples needed before the median baseline activates (default: 15)
    pub median_window: usize,

    /// Samples needed before the running average activates (default: 10)
    pub mean_window: usize,

    /// Samples to accumulate before detection arms (default: 16, one past
    /// the median window so the adaptive baseline is established). Subjects
    /// whose resting openness sits below `base_threshold` would otherwise
    /// rapid-fire during the cold start. Set to 0 to arm immediately with
    /// the fixed base threshold.
    pub warmup_samples: usize,
}

impl Default for BlinkConfig {
    fn default() -> Self {
        Self {
            // Frame pipeline
            max_frames: 450,
            max_frame_width: 640,
            frame_stride: 1,

            // Thresholds
            base_threshold: 0.32,
            dynamic_ratio: 0.80,
            dynamic_floor: 0.22,
            dynamic_ceil: 0.35,
            sudden_drop: 0.05,
            relative_ratio: 0.78,

            // Debounce
            required_run: 1,
            cooldown_frames: 3,

            // History
            history_window: 30,
            median_window: 15,
            mean_window: 10,
            warmup_samples: 16,
        }
    }
}

impl BlinkConfig {
    /// Aggressive configuration that favors catching subtle blinks over
    /// suppressing noise.
    pub fn sensitive() -> Self {
        Self {
            base_threshold: 0.34,
            sudden_drop: 0.04,
            cooldown_frames: 2,
            ..Default::default()
        }
    }

    /// Conservative configuration for noisy, low-light footage.
    pub fn conservative() -> Self {
        Self {
            base_threshold: 0.28,
            sudden_drop: 0.07,
            required_run: 2,
            cooldown_frames: 4,
            ..Default::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_matches_tuned_constants() {
        let config = BlinkConfig::default();
        assert_eq!(config.max_frames, 450);
        assert_eq!(config.max_frame_width, 640);
        assert_eq!(config.required_run, 1);
        assert_eq!(config.cooldown_frames, 3);
        assert_eq!(config.warmup_samples, config.median_window + 1);
        assert!((config.base_threshold - 0.32).abs() < 1e-9);
        assert!((config.sudden_drop - 0.05).abs() < 1e-9);
    }

    #[test]
    fn test_presets_diverge_from_default() {
        let sensitive = BlinkConfig::sensitive();
        let conservative = BlinkConfig::conservative();
        assert!(sensitive.sudden_drop < conservative.sudden_drop);
        assert!(sensitive.cooldown_frames < conservative.cooldown_frames);
    }
}
