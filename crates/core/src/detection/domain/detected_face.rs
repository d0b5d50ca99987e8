use super::face_landmarks::FaceLandmarks;

/// Axis-aligned face box in frame pixel coordinates (corners, not size).
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct BoundingBox {
    pub x1: f64,
    pub y1: f64,
    pub x2: f64,
    pub y2: f64,
}

impl BoundingBox {
    pub fn new(x1: f64, y1: f64, x2: f64, y2: f64) -> Self {
        Self { x1, y1, x2, y2 }
    }

    pub fn width(&self) -> f64 {
        (self.x2 - self.x1).max(0.0)
    }

    pub fn height(&self) -> f64 {
        (self.y2 - self.y1).max(0.0)
    }

    pub fn area(&self) -> f64 {
        self.width() * self.height()
    }

    pub fn iou(&self, other: &BoundingBox) -> f64 {
        let x1 = self.x1.max(other.x1);
        let y1 = self.y1.max(other.y1);
        let x2 = self.x2.min(other.x2);
        let y2 = self.y2.min(other.y2);

        let inter = (x2 - x1).max(0.0) * (y2 - y1).max(0.0);
        if inter == 0.0 {
            return 0.0;
        }
        inter / (self.area() + other.area() - inter)
    }

    /// Integer pixel rectangle `(x, y, width, height)` clipped to the frame.
    /// Returns `None` when nothing of the box is inside the frame.
    pub fn clamped(&self, frame_w: u32, frame_h: u32) -> Option<(u32, u32, u32, u32)> {
        let x1 = self.x1.floor().clamp(0.0, frame_w as f64) as u32;
        let y1 = self.y1.floor().clamp(0.0, frame_h as f64) as u32;
        let x2 = self.x2.ceil().clamp(0.0, frame_w as f64) as u32;
        let y2 = self.y2.ceil().clamp(0.0, frame_h as f64) as u32;
        if x2 <= x1 || y2 <= y1 {
            return None;
        }
        Some((x1, y1, x2 - x1, y2 - y1))
    }
}

/// One face found in one frame. Discarded once that frame is presented.
#[derive(Clone, Debug, PartialEq)]
pub struct DetectedFace {
    pub bbox: BoundingBox,
    pub landmarks: Option<FaceLandmarks>,
    pub confidence: f64,
}

impl DetectedFace {
    /// Landmarks for alignment: reported keypoints when all five are
    /// visible, otherwise an estimate from the bounding box.
    pub fn alignment_landmarks(&self) -> FaceLandmarks {
        match &self.landmarks {
            Some(lm) if lm.is_complete() => lm.clone(),
            _ => FaceLandmarks::estimate_from_box(&self.bbox),
        }
    }

    /// Index of the most confident face; ties resolve to the earliest.
    pub fn most_confident(faces: &[DetectedFace]) -> Option<usize> {
        faces
            .iter()
            .enumerate()
            .fold(None, |best: Option<(usize, f64)>, (i, f)| match best {
                Some((_, c)) if c >= f.confidence => best,
                _ => Some((i, f.confidence)),
            })
            .map(|(i, _)| i)
    }
}
