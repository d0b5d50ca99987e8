//! 5-point face landmarks: left eye, right eye, nose, left mouth, right mouth.
//!
//! The ordering matches the ArcFace alignment template, so landmarks can be
//! fed straight into [`super::alignment::SimilarityTransform::estimate`].

use super::detected_face::BoundingBox;

/// Landmark positions inside a unit face box, used when a detector does not
/// report keypoints. Derived from the 112x112 ArcFace template.
const BOX_RELATIVE_POINTS: [(f64, f64); 5] = [
    (0.342, 0.462),
    (0.657, 0.460),
    (0.500, 0.640),
    (0.371, 0.825),
    (0.632, 0.824),
];

#[derive(Clone, Debug, PartialEq)]
pub struct FaceLandmarks {
    /// Points with x <= 0 are treated as invisible.
    points: [(f64, f64); 5],
}

impl FaceLandmarks {
    pub fn new(points: [(f64, f64); 5]) -> Self {
        Self { points }
    }

    /// Approximates landmarks from a bounding box alone.
    pub fn estimate_from_box(bbox: &BoundingBox) -> Self {
        let points = BOX_RELATIVE_POINTS.map(|(rx, ry)| {
            (
                bbox.x1 + rx * bbox.width(),
                bbox.y1 + ry * bbox.height(),
            )
        });
        Self { points }
    }

    pub fn points(&self) -> &[(f64, f64); 5] {
        &self.points
    }

    pub fn has_visible(&self) -> bool {
        self.points.iter().any(|(x, _)| *x > 0.0)
    }

    /// True when every landmark is visible, which alignment requires.
    pub fn is_complete(&self) -> bool {
        self.points.iter().all(|(x, _)| *x > 0.0)
    }
}
