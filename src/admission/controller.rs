//! Frame admission: decides which camera frames reach the landmark detector.
//!
//! Two independent throttles:
//! - a skip rate (`counter % skip == 0`) adapted to measured throughput, and
//! - a still-scene filter that drops frames once the scene has stopped changing.

use crate::admission::motion::{FrameView, luma_proxy};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::time::Instant;

/// Configuration for [`FrameAdmissionController`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AdmissionConfig {
    pub min_frame_skip: u32,
    pub max_frame_skip: u32,
    /// Skip rate at session start (clamped to the range above).
    pub initial_frame_skip: u32,
    /// Desired rate of processed frames.
    pub target_fps: f32,
    /// Fractional band around `target_fps` where the skip rate holds.
    pub fps_tolerance: f32,
    /// Processed-frame intervals averaged per adjustment.
    pub fps_window: usize,
    pub motion_detection: bool,
    /// Mean luma delta (0-255 scale) below which a frame counts as still.
    pub motion_threshold: f32,
    /// Still frames admitted before skipping starts.
    pub max_still_frames: u32,
    /// Sample points per axis for the motion proxy.
    pub sample_grid: usize,
}

impl Default for AdmissionConfig {
    fn default() -> Self {
        Self {
            min_frame_skip: 1,
            max_frame_skip: 4,
            initial_frame_skip: 1,
            target_fps: 15.0,
            fps_tolerance: 0.2,
            fps_window: 10,
            motion_detection: true,
            motion_threshold: 2.0,
            max_still_frames: 5,
            sample_grid: 8,
        }
    }
}

/// Counters exposed for diagnostics.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AdmissionStats {
    pub admitted: u64,
    pub skipped_by_rate: u64,
    pub skipped_still: u64,
    pub motion_failures: u64,
}

/// Confidence hints in this range mean the classifier is unsure.
const LOW_CONFIDENCE_RANGE: std::ops::RangeInclusive<f32> = 0.1..=0.6;

pub struct FrameAdmissionController {
    config: AdmissionConfig,
    current_skip: u32,
    previous_proxy: Option<f32>,
    still_run: u32,
    override_toggle: bool,
    fps_samples: VecDeque<f32>,
    last_processed: Option<Instant>,
    stats: AdmissionStats,
}

impl FrameAdmissionController {
    pub fn new(config: AdmissionConfig) -> Self {
        let min = config.min_frame_skip.max(1);
        let max = config.max_frame_skip.max(min);
        let current_skip = config.initial_frame_skip.clamp(min, max);
        Self {
            fps_samples: VecDeque::with_capacity(config.fps_window.max(1)),
            config: AdmissionConfig {
                min_frame_skip: min,
                max_frame_skip: max,
                ..config
            },
            current_skip,
            previous_proxy: None,
            still_run: 0,
            override_toggle: false,
            last_processed: None,
            stats: AdmissionStats::default(),
        }
    }

    /// Decide whether `frame` goes to the detector.
    ///
    /// `confidence_hint` is the latest classifier confidence, if any.
    pub fn should_process(&mut self, frame: &FrameView<'_>, confidence_hint: Option<f32>) -> bool {
        if frame.counter == 1 {
            self.previous_proxy = luma_proxy(frame, self.config.sample_grid);
            self.still_run = 0;
            return self.admit();
        }

        if frame.counter % u64::from(self.current_skip) != 0 {
            self.stats.skipped_by_rate += 1;
            return false;
        }

        if !self.config.motion_detection {
            return self.admit();
        }

        let Some(proxy) = luma_proxy(frame, self.config.sample_grid) else {
            self.stats.motion_failures += 1;
            tracing::debug!(
                counter = frame.counter,
                "motion proxy unavailable, assuming motion"
            );
            return self.admit();
        };

        let still = self
            .previous_proxy
            .is_some_and(|previous| (proxy - previous).abs() < self.config.motion_threshold);

        if !still {
            self.still_run = 0;
            self.previous_proxy = Some(proxy);
            return self.admit();
        }

        self.still_run += 1;
        if self.still_run <= self.config.max_still_frames {
            self.previous_proxy = Some(proxy);
            return self.admit();
        }

        if confidence_hint.is_some_and(|c| LOW_CONFIDENCE_RANGE.contains(&c)) {
            self.override_toggle = !self.override_toggle;
            if self.override_toggle {
                self.previous_proxy = Some(proxy);
                return self.admit();
            }
        }

        self.stats.skipped_still += 1;
        false
    }

    fn admit(&mut self) -> bool {
        self.stats.admitted += 1;
        true
    }

    /// Record that a frame finished processing at `now`.
    pub fn record_processed(&mut self, now: Instant) {
        if let Some(last) = self.last_processed.replace(now) {
            let delta = now.saturating_duration_since(last).as_secs_f32();
            if delta > 0.0 {
                self.record_fps_sample(1.0 / delta);
            }
        }
    }

    /// Feed one instantaneous FPS measurement into the adaptation window.
    pub fn record_fps_sample(&mut self, fps: f32) {
        if !fps.is_finite() {
            return;
        }
        self.fps_samples.push_back(fps);
        if self.fps_samples.len() < self.config.fps_window.max(1) {
            return;
        }

        let mean = self.fps_samples.iter().sum::<f32>() / self.fps_samples.len() as f32;
        self.fps_samples.clear();

        let low = self.config.target_fps * (1.0 - self.config.fps_tolerance);
        let high = self.config.target_fps * (1.0 + self.config.fps_tolerance);
        let previous = self.current_skip;

        if mean < low {
            self.current_skip = (self.current_skip + 1).min(self.config.max_frame_skip);
        } else if mean > high {
            self.current_skip = self
                .current_skip
                .saturating_sub(1)
                .max(self.config.min_frame_skip);
        }

        if self.current_skip != previous {
            tracing::debug!(
                mean_fps = mean,
                from = previous,
                to = self.current_skip,
                "adjusted frame skip rate"
            );
        }
    }

    pub fn current_skip_rate(&self) -> u32 {
        self.current_skip
    }

    pub fn stats(&self) -> AdmissionStats {
        self.stats
    }

    /// Forget motion and throughput history; the skip rate is kept.
    pub fn reset(&mut self) {
        self.previous_proxy = None;
        self.still_run = 0;
        self.override_toggle = false;
        self.fps_samples.clear();
        self.last_processed = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    const W: u32 = 16;
    const H: u32 = 16;

    fn plane(value: u8) -> Vec<u8> {
        vec![value; (W * H) as usize]
    }

    fn controller(config: AdmissionConfig) -> FrameAdmissionController {
        FrameAdmissionController::new(config)
    }

    #[test]
    fn test_first_frame_always_admitted() {
        let mut ctl = controller(AdmissionConfig {
            initial_frame_skip: 3,
            ..Default::default()
        });
        let luma = plane(0);
        assert!(ctl.should_process(&FrameView::packed(1, W, H, &luma), None));
    }

    #[test]
    fn test_skip_rate_gates_by_counter() {
        let mut ctl = controller(AdmissionConfig {
            initial_frame_skip: 3,
            motion_detection: false,
            ..Default::default()
        });
        let luma = plane(0);
        let admitted: Vec<u64> = (1..=9)
            .filter(|&n| ctl.should_process(&FrameView::packed(n, W, H, &luma), None))
            .collect();
        assert_eq!(admitted, vec![1, 3, 6, 9]);
        assert_eq!(ctl.stats().skipped_by_rate, 5);
    }

    #[test]
    fn test_still_scene_is_skipped_after_limit() {
        let mut ctl = controller(AdmissionConfig {
            max_still_frames: 2,
            ..Default::default()
        });
        let luma = plane(100);
        assert!(ctl.should_process(&FrameView::packed(1, W, H, &luma), None));
        assert!(ctl.should_process(&FrameView::packed(2, W, H, &luma), None));
        assert!(ctl.should_process(&FrameView::packed(3, W, H, &luma), None));
        assert!(!ctl.should_process(&FrameView::packed(4, W, H, &luma), None));
        assert!(!ctl.should_process(&FrameView::packed(5, W, H, &luma), None));
        assert_eq!(ctl.stats().skipped_still, 2);
    }

    #[test]
    fn test_motion_resets_still_run() {
        let mut ctl = controller(AdmissionConfig {
            max_still_frames: 1,
            ..Default::default()
        });
        let still = plane(100);
        let moved = plane(180);
        ctl.should_process(&FrameView::packed(1, W, H, &still), None);
        ctl.should_process(&FrameView::packed(2, W, H, &still), None);
        assert!(!ctl.should_process(&FrameView::packed(3, W, H, &still), None));
        assert!(ctl.should_process(&FrameView::packed(4, W, H, &moved), None));
        assert!(ctl.should_process(&FrameView::packed(5, W, H, &moved), None));
    }

    #[test]
    fn test_low_confidence_overrides_every_other_still_frame() {
        let mut ctl = controller(AdmissionConfig {
            max_still_frames: 0,
            ..Default::default()
        });
        let luma = plane(50);
        ctl.should_process(&FrameView::packed(1, W, H, &luma), None);
        let decisions: Vec<bool> = (2..=7)
            .map(|n| ctl.should_process(&FrameView::packed(n, W, H, &luma), Some(0.3)))
            .collect();
        assert_eq!(decisions, vec![true, false, true, false, true, false]);
    }

    #[test]
    fn test_confident_hint_does_not_override() {
        let mut ctl = controller(AdmissionConfig {
            max_still_frames: 0,
            ..Default::default()
        });
        let luma = plane(50);
        ctl.should_process(&FrameView::packed(1, W, H, &luma), None);
        for n in 2..6 {
            assert!(!ctl.should_process(&FrameView::packed(n, W, H, &luma), Some(0.9)));
        }
    }

    #[test]
    fn test_malformed_frame_fails_open() {
        let mut ctl = controller(AdmissionConfig::default());
        let luma = plane(0);
        ctl.should_process(&FrameView::packed(1, W, H, &luma), None);
        let truncated = [0u8; 4];
        assert!(ctl.should_process(&FrameView::packed(2, W, H, &truncated), None));
        assert_eq!(ctl.stats().motion_failures, 1);
    }

    #[test]
    fn test_slow_trace_raises_skip_to_max() {
        let mut ctl = controller(AdmissionConfig::default());
        for _ in 0..200 {
            ctl.record_fps_sample(3.0);
        }
        assert_eq!(ctl.current_skip_rate(), 4);
    }

    #[test]
    fn test_fast_trace_lowers_skip_to_min() {
        let mut ctl = controller(AdmissionConfig {
            initial_frame_skip: 4,
            ..Default::default()
        });
        for _ in 0..200 {
            ctl.record_fps_sample(60.0);
        }
        assert_eq!(ctl.current_skip_rate(), 1);
    }

    #[test]
    fn test_skip_changes_only_once_window_is_full() {
        let mut ctl = controller(AdmissionConfig::default());
        for _ in 0..9 {
            ctl.record_fps_sample(3.0);
        }
        assert_eq!(ctl.current_skip_rate(), 1);
        ctl.record_fps_sample(3.0);
        assert_eq!(ctl.current_skip_rate(), 2);
    }

    #[test]
    fn test_within_band_holds() {
        let mut ctl = controller(AdmissionConfig {
            initial_frame_skip: 2,
            ..Default::default()
        });
        for _ in 0..50 {
            ctl.record_fps_sample(14.0);
        }
        assert_eq!(ctl.current_skip_rate(), 2);
    }

    #[test]
    fn test_record_processed_measures_intervals() {
        let mut ctl = controller(AdmissionConfig::default());
        let start = Instant::now();
        // 5 fps, well below the 15 fps target.
        for i in 0..=10u64 {
            ctl.record_processed(start + Duration::from_millis(200 * i));
        }
        assert_eq!(ctl.current_skip_rate(), 2);
    }

    #[test]
    fn test_initial_skip_clamped() {
        let ctl = controller(AdmissionConfig {
            initial_frame_skip: 99,
            ..Default::default()
        });
        assert_eq!(ctl.current_skip_rate(), 4);
    }
}
