//! Per-frame feature vectors.
//!
//! Missing data stays typed ([`FeatureSection::Absent`]) until the vector is
//! packed into the dense model layout, where absent sections and missing
//! trailing points become [`SENTINEL`].

use crate::defaults::{FACE_LANDMARKS, FEATURES_PER_FRAME, HAND_LANDMARKS, SENTINEL};
use crate::features::landmarks::{Landmark, LandmarkFrame};
use crate::features::scaler::FeatureScaler;

/// Index of the middle fingertip in a hand landmark list.
const MIDDLE_FINGER_TIP: usize = 12;

/// Map a raw depth to [0, 1] so x, y and z share the same range.
pub fn normalize_z(z: f32) -> f32 {
    (z.clamp(-1.0, 1.0) + 1.0) / 2.0
}

/// One section (hand or face) of a feature vector.
#[derive(Debug, Clone, PartialEq)]
pub enum FeatureSection {
    /// Normalized `[x, y, z]` triples, at most the section capacity.
    Present(Vec<[f32; 3]>),
    Absent,
}

impl FeatureSection {
    pub fn is_absent(&self) -> bool {
        matches!(self, FeatureSection::Absent)
    }

    fn from_points(points: Option<&Vec<Landmark>>, capacity: usize) -> Self {
        let Some(points) = points.filter(|p| !p.is_empty()) else {
            return FeatureSection::Absent;
        };
        if points
            .iter()
            .any(|p| !(p.x.is_finite() && p.y.is_finite() && p.z.is_finite()))
        {
            tracing::debug!("dropping section with non-finite landmark coordinates");
            return FeatureSection::Absent;
        }
        FeatureSection::Present(
            points
                .iter()
                .take(capacity)
                .map(|p| [p.x, p.y, normalize_z(p.z)])
                .collect(),
        )
    }

    fn write_dense(&self, capacity: usize, out: &mut Vec<f32>) {
        let written = match self {
            FeatureSection::Present(points) => {
                for point in points.iter().take(capacity) {
                    out.extend_from_slice(point);
                }
                points.len().min(capacity)
            }
            FeatureSection::Absent => 0,
        };
        out.extend(std::iter::repeat_n(SENTINEL, (capacity - written) * 3));
    }
}

/// A single frame in model feature space.
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureVector {
    pub left_hand: FeatureSection,
    pub right_hand: FeatureSection,
    pub face: FeatureSection,
}

impl FeatureVector {
    /// A vector with every section absent.
    pub fn absent() -> Self {
        Self {
            left_hand: FeatureSection::Absent,
            right_hand: FeatureSection::Absent,
            face: FeatureSection::Absent,
        }
    }

    /// Convert a detector frame, section by section.
    ///
    /// Hands whose wrist to middle-fingertip span is under `min_hand_span`
    /// are treated as absent; pass 0.0 to keep every hand.
    pub fn from_frame(frame: &LandmarkFrame, min_hand_span: f32) -> Self {
        let hand = |points: Option<&Vec<Landmark>>| {
            if let Some(points) = points
                && is_ghost_hand(points, min_hand_span)
            {
                tracing::debug!("ignoring collapsed hand (span below {min_hand_span})");
                return FeatureSection::Absent;
            }
            FeatureSection::from_points(points, HAND_LANDMARKS)
        };

        Self {
            left_hand: hand(frame.left_hand.as_ref()),
            right_hand: hand(frame.right_hand.as_ref()),
            face: FeatureSection::from_points(frame.face.as_ref(), FACE_LANDMARKS),
        }
    }

    /// True when every section is absent (the dense form is all sentinel).
    pub fn is_all_sentinel(&self) -> bool {
        self.left_hand.is_absent() && self.right_hand.is_absent() && self.face.is_absent()
    }

    /// True when at least one hand section carries data.
    pub fn has_hand(&self) -> bool {
        !self.left_hand.is_absent() || !self.right_hand.is_absent()
    }

    /// Append the dense layout (left hand, right hand, face) to `out`,
    /// scaling valid values when a scaler is given.
    pub fn write_dense(&self, out: &mut Vec<f32>, scaler: Option<&FeatureScaler>) {
        let start = out.len();
        self.left_hand.write_dense(HAND_LANDMARKS, out);
        self.right_hand.write_dense(HAND_LANDMARKS, out);
        self.face.write_dense(FACE_LANDMARKS, out);
        if let Some(scaler) = scaler {
            scaler.apply(&mut out[start..]);
        }
    }

    /// Dense, unscaled layout of this vector.
    pub fn to_dense(&self) -> Vec<f32> {
        let mut out = Vec::with_capacity(FEATURES_PER_FRAME);
        self.write_dense(&mut out, None);
        out
    }
}

fn is_ghost_hand(points: &[Landmark], min_span: f32) -> bool {
    if min_span <= 0.0 || points.len() <= MIDDLE_FINGER_TIP {
        return false;
    }
    points[0].distance_2d(&points[MIDDLE_FINGER_TIP]) < min_span
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::defaults::{FACE_FEATURES, HAND_FEATURES};

    fn open_hand() -> Vec<Landmark> {
        (0..HAND_LANDMARKS)
            .map(|i| Landmark::new(0.3 + i as f32 * 0.01, 0.4 + i as f32 * 0.01, 0.0))
            .collect()
    }

    #[test]
    fn test_normalize_z_maps_range() {
        assert_eq!(normalize_z(-1.0), 0.0);
        assert_eq!(normalize_z(0.0), 0.5);
        assert_eq!(normalize_z(1.0), 1.0);
        assert_eq!(normalize_z(-5.0), 0.0);
        assert_eq!(normalize_z(3.0), 1.0);
    }

    #[test]
    fn test_absent_frame_is_all_sentinel() {
        let vector = FeatureVector::from_frame(&LandmarkFrame::empty(0), 0.0);
        assert!(vector.is_all_sentinel());
        let dense = vector.to_dense();
        assert_eq!(dense.len(), FEATURES_PER_FRAME);
        assert!(dense.iter().all(|&v| v == SENTINEL));
    }

    #[test]
    fn test_sections_are_filled_independently() {
        let frame = LandmarkFrame::empty(0).with_right_hand(open_hand());
        let vector = FeatureVector::from_frame(&frame, 0.0);
        let dense = vector.to_dense();

        assert!(dense[..HAND_FEATURES].iter().all(|&v| v == SENTINEL));
        assert!((dense[HAND_FEATURES] - 0.3).abs() < 1e-6);
        assert!((dense[HAND_FEATURES + 2] - 0.5).abs() < 1e-6);
        assert!(
            dense[HAND_FEATURES * 2..]
                .iter()
                .all(|&v| v == SENTINEL)
        );
        assert_eq!(dense.len() - HAND_FEATURES * 2, FACE_FEATURES);
    }

    #[test]
    fn test_short_point_list_pads_with_sentinel() {
        let frame = LandmarkFrame::empty(0).with_face(vec![Landmark::new(0.5, 0.5, 1.0)]);
        let dense = FeatureVector::from_frame(&frame, 0.0).to_dense();
        let face = &dense[HAND_FEATURES * 2..];
        assert_eq!(&face[..3], &[0.5, 0.5, 1.0]);
        assert!(face[3..].iter().all(|&v| v == SENTINEL));
    }

    #[test]
    fn test_extra_points_are_truncated() {
        let mut points = open_hand();
        points.extend(open_hand());
        let frame = LandmarkFrame::empty(0).with_left_hand(points);
        let vector = FeatureVector::from_frame(&frame, 0.0);
        assert_eq!(vector.to_dense().len(), FEATURES_PER_FRAME);
    }

    #[test]
    fn test_ghost_hand_is_absent() {
        let collapsed = vec![Landmark::new(0.5, 0.5, 0.0); HAND_LANDMARKS];
        let frame = LandmarkFrame::empty(0).with_left_hand(collapsed);
        let vector = FeatureVector::from_frame(&frame, 0.08);
        assert!(vector.left_hand.is_absent());
        assert!(!vector.has_hand());
    }

    #[test]
    fn test_open_hand_passes_span_check() {
        let frame = LandmarkFrame::empty(0).with_left_hand(open_hand());
        let vector = FeatureVector::from_frame(&frame, 0.08);
        assert!(vector.has_hand());
    }

    #[test]
    fn test_non_finite_coordinates_drop_section() {
        let mut hand = open_hand();
        hand[3].x = f32::NAN;
        let frame = LandmarkFrame::empty(0).with_right_hand(hand);
        let vector = FeatureVector::from_frame(&frame, 0.0);
        assert!(vector.right_hand.is_absent());
    }

    #[test]
    fn test_face_only_frame_is_not_all_sentinel() {
        let frame = LandmarkFrame::empty(0).with_face(vec![Landmark::new(0.5, 0.5, 0.0)]);
        let vector = FeatureVector::from_frame(&frame, 0.0);
        assert!(!vector.is_all_sentinel());
        assert!(!vector.has_hand());
    }
}
