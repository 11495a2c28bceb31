//! Temporal smoothing of logits and stuck-model detection.

use std::collections::VecDeque;

/// FIFO of recent raw logits; the average damps single-frame jitter.
#[derive(Debug, Clone)]
pub struct RollingLogitsWindow {
    depth: usize,
    frames: VecDeque<Vec<f32>>,
}

impl RollingLogitsWindow {
    pub fn new(depth: usize) -> Self {
        let depth = depth.max(1);
        Self {
            depth,
            frames: VecDeque::with_capacity(depth),
        }
    }

    /// Push raw logits, evicting the oldest beyond the depth.
    ///
    /// A vector of a different length than the stored ones restarts the window.
    pub fn push(&mut self, logits: Vec<f32>) {
        if self
            .frames
            .front()
            .is_some_and(|first| first.len() != logits.len())
        {
            self.frames.clear();
        }
        if self.frames.len() == self.depth {
            self.frames.pop_front();
        }
        self.frames.push_back(logits);
    }

    /// Element-wise mean of the stored frames.
    pub fn average(&self) -> Option<Vec<f32>> {
        let first = self.frames.front()?;
        let mut sum = vec![0.0f32; first.len()];
        for frame in &self.frames {
            for (acc, value) in sum.iter_mut().zip(frame) {
                *acc += value;
            }
        }
        let n = self.frames.len() as f32;
        Some(sum.into_iter().map(|s| s / n).collect())
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    pub fn depth(&self) -> usize {
        self.depth
    }

    pub fn clear(&mut self) {
        self.frames.clear();
    }
}

/// Numerically stable softmax (max subtracted before exponentiating).
pub fn softmax(logits: &[f32]) -> Vec<f32> {
    let max = logits.iter().copied().fold(f32::NEG_INFINITY, f32::max);
    if !max.is_finite() {
        return vec![0.0; logits.len()];
    }
    let exps: Vec<f32> = logits.iter().map(|v| (v - max).exp()).collect();
    let sum: f32 = exps.iter().sum();
    exps.into_iter().map(|e| e / sum).collect()
}

/// Index and value of the largest element.
pub fn argmax(values: &[f32]) -> Option<(usize, f32)> {
    values
        .iter()
        .copied()
        .enumerate()
        .fold(None, |best, (i, v)| match best {
            Some((_, b)) if b >= v => best,
            _ => Some((i, v)),
        })
}

/// Counts consecutive raw logits vectors identical to the previous one.
#[derive(Debug, Clone)]
pub struct StuckDetector {
    threshold: usize,
    tolerance: f32,
    previous: Option<Vec<f32>>,
    repeats: usize,
}

impl StuckDetector {
    pub fn new(threshold: usize, tolerance: f32) -> Self {
        Self {
            threshold: threshold.max(1),
            tolerance,
            previous: None,
            repeats: 0,
        }
    }

    /// Observe raw logits; true when the repeat count reaches the threshold.
    ///
    /// With threshold 3 this fires on the 4th identical vector in a row.
    pub fn observe(&mut self, logits: &[f32]) -> bool {
        let identical = self.previous.as_deref().is_some_and(|previous| {
            previous.len() == logits.len()
                && previous
                    .iter()
                    .zip(logits)
                    .all(|(a, b)| (a - b).abs() <= self.tolerance)
        });
        self.previous = Some(logits.to_vec());

        if !identical {
            self.repeats = 0;
            return false;
        }
        self.repeats += 1;
        if self.repeats >= self.threshold {
            self.repeats = 0;
            return true;
        }
        false
    }

    pub fn repeats(&self) -> usize {
        self.repeats
    }

    pub fn reset(&mut self) {
        self.previous = None;
        self.repeats = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_close(actual: &[f32], expected: &[f32]) {
        assert_eq!(actual.len(), expected.len());
        for (a, e) in actual.iter().zip(expected) {
            assert!((a - e).abs() < 1e-6, "{actual:?} != {expected:?}");
        }
    }

    #[test]
    fn test_average_of_one_push() {
        let mut window = RollingLogitsWindow::new(3);
        window.push(vec![1.0, 2.0]);
        assert_close(&window.average().unwrap(), &[1.0, 2.0]);
    }

    #[test]
    fn test_average_of_two_pushes() {
        let mut window = RollingLogitsWindow::new(3);
        window.push(vec![1.0, 2.0]);
        window.push(vec![3.0, 6.0]);
        assert_close(&window.average().unwrap(), &[2.0, 4.0]);
    }

    #[test]
    fn test_average_after_depth_plus_one_pushes() {
        let mut window = RollingLogitsWindow::new(3);
        window.push(vec![100.0]);
        window.push(vec![1.0]);
        window.push(vec![2.0]);
        window.push(vec![3.0]);
        assert_eq!(window.len(), 3);
        assert_close(&window.average().unwrap(), &[2.0]);
    }

    #[test]
    fn test_empty_window_has_no_average() {
        assert!(RollingLogitsWindow::new(3).average().is_none());
    }

    #[test]
    fn test_length_change_restarts_window() {
        let mut window = RollingLogitsWindow::new(3);
        window.push(vec![1.0, 1.0]);
        window.push(vec![5.0, 5.0, 5.0]);
        assert_eq!(window.len(), 1);
    }

    #[test]
    fn test_softmax_is_stable_for_large_logits() {
        let probs = softmax(&[1000.0, 1000.0]);
        assert_close(&probs, &[0.5, 0.5]);
        let sum: f32 = softmax(&[3.0, -2.0, 0.5]).iter().sum();
        assert!((sum - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_argmax_prefers_first_on_tie() {
        assert_eq!(argmax(&[1.0, 3.0, 3.0]), Some((1, 3.0)));
        assert_eq!(argmax(&[]), None);
    }

    #[test]
    fn test_stuck_fires_on_fourth_identical() {
        let mut detector = StuckDetector::new(3, 1e-6);
        let logits = [0.1, 0.9];
        assert!(!detector.observe(&logits));
        assert!(!detector.observe(&logits));
        assert!(!detector.observe(&logits));
        assert!(detector.observe(&logits));
        assert_eq!(detector.repeats(), 0);
    }

    #[test]
    fn test_stuck_resets_on_change() {
        let mut detector = StuckDetector::new(3, 1e-6);
        detector.observe(&[1.0]);
        detector.observe(&[1.0]);
        detector.observe(&[1.0]);
        assert!(!detector.observe(&[2.0]));
        assert_eq!(detector.repeats(), 0);
    }

    #[test]
    fn test_stuck_tolerance() {
        let mut detector = StuckDetector::new(1, 1e-6);
        detector.observe(&[1.0]);
        assert!(detector.observe(&[1.0 + 1e-7]));
        assert!(!detector.observe(&[1.1]));
    }
}
