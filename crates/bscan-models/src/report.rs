//! Blink events and analysis reports.

use serde::{Deserialize, Serialize};

/// The detection criterion that flagged a blink.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BlinkReason {
    /// Openness fell below the adaptive (median-based) threshold
    Dynamic,
    /// Frame-to-frame openness drop exceeded the drop threshold
    SuddenDrop,
    /// Openness fell below the running-average threshold
    Relative,
    /// Closure still in progress when the stream ended
    Trailing,
}

impl std::fmt::Display for BlinkReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BlinkReason::Dynamic => write!(f, "dynamic"),
            BlinkReason::SuddenDrop => write!(f, "sudden_drop"),
            BlinkReason::Relative => write!(f, "relative"),
            BlinkReason::Trailing => write!(f, "trailing"),
        }
    }
}

/// Diagnostic statistics for one analyzed video.
///
/// `blink_count` is the only field the scoring service consumes; the rest
/// exists for logging and tuning.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BlinkReport {
    /// Total blinks detected
    pub blink_count: u64,
    /// Frames decoded from the container (budget-capped)
    pub frames_decoded: u64,
    /// Frames in which a face was found
    pub frames_with_face: u64,
    /// Blinks per triggering criterion, in criterion order
    /// (dynamic, sudden-drop, relative, trailing)
    pub blinks_by_reason: [u64; 4],
    /// Lowest openness sample observed
    pub openness_min: f64,
    /// Mean openness across face frames
    pub openness_mean: f64,
    /// Highest openness sample observed
    pub openness_max: f64,
    /// Wall-clock processing time in seconds
    pub elapsed_secs: f64,
}

impl BlinkReport {
    /// Record one blink against its criterion bucket.
    pub fn record_blink(&mut self, reason: BlinkReason) {
        self.blink_count += 1;
        let slot = match reason {
            BlinkReason::Dynamic => 0,
            BlinkReason::SuddenDrop => 1,
            BlinkReason::Relative => 2,
            BlinkReason::Trailing => 3,
        };
        self.blinks_by_reason[slot] += 1;
    }

    /// Fraction of decoded frames that contained a face.
    pub fn face_coverage(&self) -> f64 {
        if self.frames_decoded > 0 {
            self.frames_with_face as f64 / self.frames_decoded as f64
        } else {
            0.0
        }
    }
}
