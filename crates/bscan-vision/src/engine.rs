//! Adaptive blink decision engine.
//!
//! Folds a noisy per-frame eye-openness signal into discrete blink events.
//! Three cheap, complementary criteria are evaluated in strict priority
//! order each frame:
//!
//! 1. **Dynamic**: openness below a clamped fraction of the recent median
//!    baseline (fixed constant until enough history exists).
//! 2. **Sudden drop**: frame-to-frame openness fell faster than a blink-like
//!    closure rate.
//! 3. **Relative**: openness below a fraction of the recent running average.
//!
//! The order is behaviorally significant — a sample can satisfy more than
//! one criterion and only the first match is attributed. A short cooldown
//! after every flagged blink debounces the 2-4 partial-closure frames one
//! physical blink spans.

use std::collections::VecDeque;

use bscan_models::BlinkReason;
use tracing::{debug, trace};

use crate::config::BlinkConfig;
use crate::ear::DEGENERATE_OPENNESS;

/// Per-video (or per-session) blink detection state machine.
///
/// Feed one openness sample per processed frame via [`observe`], then call
/// [`finish`] when the stream ends. Each instance owns its state exclusively,
/// so concurrent analyses just use separate engines.
///
/// [`observe`]: BlinkEngine::observe
/// [`finish`]: BlinkEngine::finish
pub struct BlinkEngine {
    config: BlinkConfig,
    /// Bounded trailing window of openness samples
    history: VecDeque<f64>,
    /// Previous frame's sample, seeded with a normal open-eye value so the
    /// drop signal is live as soon as detection arms
    prev: f64,
    /// Frames remaining in the post-blink suppression window
    cooldown: u32,
    /// Consecutive samples below the dynamic threshold
    below_run: u32,
    /// Cumulative flagged blinks
    blink_count: u64,
}

impl BlinkEngine {
    /// Create an engine with the given tuning.
    pub fn new(config: BlinkConfig) -> Self {
        let capacity = config.history_window + 1;
        Self {
            config,
            history: VecDeque::with_capacity(capacity),
            prev: DEGENERATE_OPENNESS,
            cooldown: 0,
            below_run: 0,
            blink_count: 0,
        }
    }

    /// Total blinks flagged so far.
    pub fn blink_count(&self) -> u64 {
        self.blink_count
    }

    /// Whether the post-blink suppression window is active.
    pub fn cooldown_active(&self) -> bool {
        self.cooldown > 0
    }

    /// Openness samples currently retained.
    pub fn history_len(&self) -> usize {
        self.history.len()
    }

    /// Feed one openness sample; returns the criterion that flagged a blink
    /// on this frame, if any.
    pub fn observe(&mut self, openness: f64) -> Option<BlinkReason> {
        // While warming up, only accumulate baseline; a subject whose normal
        // openness sits under the fixed constant would otherwise rapid-fire
        // blinks until the adaptive thresholds take over. Clamped to the
        // retained window, since history never grows past it.
        let warmup = self.config.warmup_samples.min(self.config.history_window);
        if self.history.len() < warmup {
            self.push_sample(openness);
            return None;
        }

        if self.cooldown > 0 {
            self.cooldown -= 1;
        }

        let dynamic = self.dynamic_threshold();
        let relative = self.relative_threshold(dynamic);
        let drop = if self.prev > 0.0 {
            self.prev - openness
        } else {
            0.0
        };

        trace!(openness, dynamic, relative, drop, "Engine sample");

        let mut flagged = None;

        if openness < dynamic && self.cooldown == 0 {
            self.below_run += 1;
            if self.below_run >= self.config.required_run {
                flagged = Some(BlinkReason::Dynamic);
            }
        } else if drop > self.config.sudden_drop && self.cooldown == 0 {
            flagged = Some(BlinkReason::SuddenDrop);
        } else if openness < relative && self.cooldown == 0 {
            flagged = Some(BlinkReason::Relative);
        }

        // Eyes confirmed open only when the sample clears both adaptive
        // thresholds; clearing just one leaves a partial run intact.
        if openness >= dynamic && openness >= relative {
            self.below_run = 0;
        }

        if let Some(reason) = flagged {
            self.blink_count += 1;
            self.cooldown = self.config.cooldown_frames;
            debug!(
                blink = self.blink_count,
                %reason,
                openness,
                dynamic,
                relative,
                "Blink flagged"
            );
        }

        self.push_sample(openness);
        flagged
    }

    /// Flush state at end of stream.
    ///
    /// A closure still in progress on the final frame (an unflushed
    /// below-threshold run with idle cooldown) counts as one more blink.
    pub fn finish(&mut self) -> Option<BlinkReason> {
        if self.below_run >= self.config.required_run && self.cooldown == 0 {
            self.blink_count += 1;
            self.below_run = 0;
            debug!(blink = self.blink_count, "Trailing blink flagged");
            return Some(BlinkReason::Trailing);
        }
        None
    }

    fn push_sample(&mut self, openness: f64) {
        self.history.push_back(openness);
        while self.history.len() > self.config.history_window {
            self.history.pop_front();
        }
        self.prev = openness;
    }

    /// Openness cutoff derived from the recent median baseline.
    fn dynamic_threshold(&self) -> f64 {
        if self.history.len() > self.config.median_window {
            let baseline = median_of_last(&self.history, self.config.median_window);
            (baseline * self.config.dynamic_ratio)
                .clamp(self.config.dynamic_floor, self.config.dynamic_ceil)
        } else {
            self.config.base_threshold
        }
    }

    /// Openness cutoff derived from the recent running average.
    fn relative_threshold(&self, dynamic: f64) -> f64 {
        if self.history.len() > self.config.mean_window {
            mean_of_last(&self.history, self.config.mean_window) * self.config.relative_ratio
        } else {
            dynamic
        }
    }
}

/// Median of the last `window` samples.
fn median_of_last(history: &VecDeque<f64>, window: usize) -> f64 {
    let mut tail: Vec<f64> = history.iter().rev().take(window).copied().collect();
    tail.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));

    let mid = tail.len() / 2;
    if tail.len() % 2 == 1 {
        tail[mid]
    } else {
        (tail[mid - 1] + tail[mid]) / 2.0
    }
}

/// Mean of the last `window` samples.
fn mean_of_last(history: &VecDeque<f64>, window: usize) -> f64 {
    let taken = history.len().min(window);
    let sum: f64 = history.iter().rev().take(window).sum();
    sum / taken as f64
}

#[cfg(test)]
mod tests {
    use super::*;

    fn new_engine() -> BlinkEngine {
        BlinkEngine::new(BlinkConfig::default())
    }

    /// Feed a sequence and return the final count after the trailing check.
    fn run_sequence(samples: &[f64]) -> u64 {
        let mut engine = new_engine();
        for &s in samples {
            engine.observe(s);
        }
        engine.finish();
        engine.blink_count()
    }

    #[test]
    fn test_steady_open_eyes_never_blink() {
        let samples = vec![0.30; 60];
        assert_eq!(run_sequence(&samples), 0);
    }

    #[test]
    fn test_single_frame_dip_counts_exactly_one_blink() {
        // 20 steady samples, one closed frame, back to steady.
        let mut samples = vec![0.30; 20];
        samples.push(0.15);
        samples.extend(vec![0.30; 10]);
        assert_eq!(run_sequence(&samples), 1);
    }

    #[test]
    fn test_drops_inside_cooldown_debounce_to_one() {
        // Three consecutive closed frames land inside the 3-frame cooldown
        // opened by the first.
        let mut samples = vec![0.30; 20];
        samples.extend([0.15, 0.15, 0.15]);
        samples.extend(vec![0.30; 10]);
        assert_eq!(run_sequence(&samples), 1);
    }

    #[test]
    fn test_drops_spaced_past_cooldown_all_count() {
        // Dips 5 frames apart clear the 3-frame cooldown between each.
        let mut samples = vec![0.30; 20];
        for _ in 0..3 {
            samples.push(0.15);
            samples.extend(vec![0.30; 4]);
        }
        samples.extend(vec![0.30; 6]);
        assert_eq!(run_sequence(&samples), 3);
    }

    #[test]
    fn test_first_criterion_wins_attribution() {
        // A deep dip from steady state satisfies both the dynamic and the
        // sudden-drop criteria; attribution must go to the dynamic one.
        let mut engine = new_engine();
        for _ in 0..20 {
            engine.observe(0.30);
        }
        assert_eq!(engine.observe(0.15), Some(BlinkReason::Dynamic));
    }

    #[test]
    fn test_sudden_drop_from_high_baseline() {
        // 0.38 stays above the clamped dynamic ceiling (0.35), so only the
        // derivative criterion can catch this closure onset.
        let mut engine = new_engine();
        for _ in 0..20 {
            engine.observe(0.45);
        }
        assert_eq!(engine.observe(0.38), Some(BlinkReason::SuddenDrop));
    }

    #[test]
    fn test_relative_criterion_catches_slow_closure() {
        // Gradual descent from a high baseline: each step is too small for
        // the sudden-drop criterion and stays above the clamped dynamic
        // threshold, but falls under the running-average cutoff.
        let mut engine = new_engine();
        for _ in 0..20 {
            engine.observe(0.50);
        }
        assert_eq!(engine.observe(0.46), None);
        assert_eq!(engine.observe(0.42), None);
        assert_eq!(engine.observe(0.38), Some(BlinkReason::Relative));
    }

    #[test]
    fn test_no_detection_while_cooldown_active() {
        let mut engine = new_engine();
        for _ in 0..20 {
            engine.observe(0.30);
        }
        assert_eq!(engine.observe(0.15), Some(BlinkReason::Dynamic));
        assert!(engine.cooldown_active());
        assert_eq!(engine.observe(0.15), None);
        assert_eq!(engine.observe(0.15), None);
    }

    #[test]
    fn test_finish_is_quiet_after_clean_ending() {
        let mut engine = new_engine();
        for _ in 0..20 {
            engine.observe(0.30);
        }
        engine.observe(0.15);
        // Stream ends during cooldown; the run must not double-count.
        assert_eq!(engine.finish(), None);
        assert_eq!(engine.blink_count(), 1);
    }

    #[test]
    fn test_warmup_holds_fire_below_base_threshold() {
        // A subject whose resting openness sits under the fixed 0.32
        // constant must not rapid-fire during warm-up; the adaptive
        // thresholds adjust to the low baseline instead.
        let samples = vec![0.28; 40];
        assert_eq!(run_sequence(&samples), 0);
    }

    #[test]
    fn test_zero_warmup_restores_always_armed_mode() {
        // With the gate disabled, the fixed base threshold governs from the
        // first frame and 0.28 < 0.32 flags immediately.
        let config = BlinkConfig {
            warmup_samples: 0,
            ..Default::default()
        };
        let mut engine = BlinkEngine::new(config);
        assert_eq!(engine.observe(0.28), Some(BlinkReason::Dynamic));
    }

    #[test]
    fn test_history_stays_bounded() {
        let mut engine = new_engine();
        for _ in 0..500 {
            engine.observe(0.30);
        }
        assert_eq!(engine.history_len(), BlinkConfig::default().history_window);
    }

    #[test]
    fn test_dynamic_threshold_clamps() {
        // Very high baseline: 0.6 * 0.8 = 0.48, clamped to the 0.35 ceiling.
        let mut engine = new_engine();
        for _ in 0..20 {
            engine.observe(0.60);
        }
        assert!((engine.dynamic_threshold() - 0.35).abs() < 1e-9);

        // Very low baseline: 0.2 * 0.8 = 0.16, clamped to the 0.22 floor.
        let mut engine = new_engine();
        for _ in 0..20 {
            engine.observe(0.20);
        }
        assert!((engine.dynamic_threshold() - 0.22).abs() < 1e-9);
    }

    #[test]
    fn test_fixed_threshold_until_history_warms_up() {
        let mut engine = new_engine();
        for _ in 0..10 {
            engine.observe(0.30);
        }
        assert!((engine.dynamic_threshold() - 0.32).abs() < 1e-9);
    }

    #[test]
    fn test_median_and_mean_helpers() {
        let history: VecDeque<f64> = [0.1, 0.2, 0.3, 0.4, 0.5].into_iter().collect();
        assert!((median_of_last(&history, 5) - 0.3).abs() < 1e-9);
        assert!((median_of_last(&history, 3) - 0.4).abs() < 1e-9);
        assert!((median_of_last(&history, 2) - 0.45).abs() < 1e-9);
        assert!((mean_of_last(&history, 5) - 0.3).abs() < 1e-9);
        assert!((mean_of_last(&history, 2) - 0.45).abs() < 1e-9);
    }
}
