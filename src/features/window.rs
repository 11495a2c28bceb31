//! Fixed-length temporal window of feature vectors.

use crate::features::vector::FeatureVector;
use std::collections::VecDeque;

/// FIFO of the most recent feature vectors, never longer than its capacity.
#[derive(Debug, Clone)]
pub struct TemporalWindow {
    frames: VecDeque<FeatureVector>,
    capacity: usize,
}

impl TemporalWindow {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            frames: VecDeque::with_capacity(capacity + 1),
            capacity,
        }
    }

    /// Push a vector, evicting the oldest entry once over capacity.
    ///
    /// An all-sentinel vector is not stored, but still ages the window by
    /// evicting its oldest entry. Returns whether the vector was stored.
    pub fn push(&mut self, vector: FeatureVector) -> bool {
        if vector.is_all_sentinel() {
            self.frames.pop_front();
            return false;
        }
        self.frames.push_back(vector);
        while self.frames.len() > self.capacity {
            self.frames.pop_front();
        }
        true
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    pub fn is_full(&self) -> bool {
        self.frames.len() == self.capacity
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Frames with at least one hand present.
    pub fn hand_frame_count(&self) -> usize {
        self.frames.iter().filter(|v| v.has_hand()).count()
    }

    /// Oldest to newest.
    pub fn iter(&self) -> impl Iterator<Item = &FeatureVector> {
        self.frames.iter()
    }

    pub fn clear(&mut self) {
        self.frames.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::vector::FeatureSection;

    fn hand_vector(marker: f32) -> FeatureVector {
        FeatureVector {
            right_hand: FeatureSection::Present(vec![[marker, 0.5, 0.5]]),
            ..FeatureVector::absent()
        }
    }

    fn marker(vector: &FeatureVector) -> f32 {
        match &vector.right_hand {
            FeatureSection::Present(points) => points[0][0],
            FeatureSection::Absent => f32::NAN,
        }
    }

    #[test]
    fn test_push_until_full() {
        let mut window = TemporalWindow::new(3);
        assert!(window.is_empty());
        for i in 0..3 {
            assert!(window.push(hand_vector(i as f32)));
        }
        assert!(window.is_full());
        assert_eq!(window.len(), 3);
    }

    #[test]
    fn test_overflow_evicts_oldest() {
        let mut window = TemporalWindow::new(3);
        for i in 0..5 {
            window.push(hand_vector(i as f32));
        }
        let markers: Vec<f32> = window.iter().map(marker).collect();
        assert_eq!(markers, vec![2.0, 3.0, 4.0]);
    }

    #[test]
    fn test_all_sentinel_vector_evicts_without_storing() {
        let mut window = TemporalWindow::new(3);
        window.push(hand_vector(1.0));
        window.push(hand_vector(2.0));

        assert!(!window.push(FeatureVector::absent()));
        assert_eq!(window.len(), 1);
        assert_eq!(marker(window.iter().next().unwrap()), 2.0);
    }

    #[test]
    fn test_all_sentinel_on_empty_window_is_noop() {
        let mut window = TemporalWindow::new(3);
        assert!(!window.push(FeatureVector::absent()));
        assert!(window.is_empty());
    }

    #[test]
    fn test_hand_frame_count_ignores_face_only() {
        let mut window = TemporalWindow::new(4);
        window.push(hand_vector(0.1));
        window.push(FeatureVector {
            face: FeatureSection::Present(vec![[0.5, 0.5, 0.5]]),
            ..FeatureVector::absent()
        });
        assert_eq!(window.len(), 2);
        assert_eq!(window.hand_frame_count(), 1);
    }

    #[test]
    fn test_zero_capacity_is_clamped() {
        let window = TemporalWindow::new(0);
        assert_eq!(window.capacity(), 1);
    }
}
