//! Landmark observations delivered by the external detector.

use serde::{Deserialize, Serialize};

/// A single normalized 3D landmark.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Landmark {
    /// Horizontal position, 0.0 (left) to 1.0 (right).
    pub x: f32,
    /// Vertical position, 0.0 (top) to 1.0 (bottom).
    pub y: f32,
    /// Relative depth, roughly -1.0 to 1.0.
    #[serde(default)]
    pub z: f32,
}

impl Landmark {
    pub fn new(x: f32, y: f32, z: f32) -> Self {
        Self { x, y, z }
    }

    /// Planar distance to another landmark.
    pub fn distance_2d(&self, other: &Landmark) -> f32 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        (dx * dx + dy * dy).sqrt()
    }
}

/// One detector result: each section independently present or absent.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LandmarkFrame {
    #[serde(default)]
    pub left_hand: Option<Vec<Landmark>>,
    #[serde(default)]
    pub right_hand: Option<Vec<Landmark>>,
    /// Curated face subset, in a fixed index order.
    #[serde(default)]
    pub face: Option<Vec<Landmark>>,
    /// Capture or inference timestamp from the detector (ms).
    #[serde(default)]
    pub timestamp_ms: u64,
}

impl LandmarkFrame {
    /// A frame with nothing detected.
    pub fn empty(timestamp_ms: u64) -> Self {
        Self {
            timestamp_ms,
            ..Default::default()
        }
    }

    pub fn with_left_hand(mut self, points: Vec<Landmark>) -> Self {
        self.left_hand = Some(points);
        self
    }

    pub fn with_right_hand(mut self, points: Vec<Landmark>) -> Self {
        self.right_hand = Some(points);
        self
    }

    pub fn with_face(mut self, points: Vec<Landmark>) -> Self {
        self.face = Some(points);
        self
    }

    /// True when at least one hand section carries points.
    pub fn has_hand(&self) -> bool {
        [&self.left_hand, &self.right_hand]
            .iter()
            .any(|hand| hand.as_ref().is_some_and(|points| !points.is_empty()))
    }
}
