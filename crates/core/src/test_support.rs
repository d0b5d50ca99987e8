//! Stub adapters shared by unit tests.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use crate::detection::domain::detected_face::{BoundingBox, DetectedFace};
use crate::detection::domain::embedding::Embedding;
use crate::detection::domain::face_detector::FaceDetector;
use crate::detection::domain::face_embedder::FaceEmbedder;
use crate::models::domain::model_loader::LoadedModels;
use crate::settings::domain::settings::Quality;
use crate::shared::frame::{Frame, PixelFormat};
use crate::swapping::domain::face_swapper::FaceSwapper;
use crate::swapping::domain::pixel_region::PixelRegion;

pub fn face_at(x: f64, y: f64, size: f64, confidence: f64) -> DetectedFace {
    DetectedFace {
        bbox: BoundingBox::new(x, y, x + size, y + size),
        landmarks: None,
        confidence,
    }
}

pub fn solid_frame(width: u32, height: u32, value: u8, sequence: u64) -> Frame {
    Frame::new(
        vec![value; (width * height * 3) as usize],
        width,
        height,
        PixelFormat::Rgb24,
        sequence,
    )
}

/// Returns the same faces for every frame. Frames whose first byte is 0 are
/// treated as face-free, which lets tests mix face and no-face inputs.
pub struct StubDetector {
    faces: Vec<DetectedFace>,
    pub calls: Arc<AtomicUsize>,
    pub fail: Arc<AtomicBool>,
}

impl StubDetector {
    pub fn new(faces: Vec<DetectedFace>) -> Self {
        Self {
            faces,
            calls: Arc::new(AtomicUsize::new(0)),
            fail: Arc::new(AtomicBool::new(false)),
        }
    }
}

impl FaceDetector for StubDetector {
    fn detect(&self, frame: &Frame) -> Result<Vec<DetectedFace>, Box<dyn std::error::Error>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail.load(Ordering::SeqCst) {
            return Err("detector exploded".into());
        }
        if frame.data().first() == Some(&0) {
            return Ok(Vec::new());
        }
        Ok(self.faces.clone())
    }
}

/// Embedding derived from the frame's first pixel, so different images
/// give different identities.
pub struct StubEmbedder;

impl FaceEmbedder for StubEmbedder {
    fn embed(
        &self,
        frame: &Frame,
        _face: &DetectedFace,
    ) -> Result<Embedding, Box<dyn std::error::Error>> {
        let [r, g, b] = frame.rgb_at(0, 0);
        Ok(Embedding::new(vec![r as f32 + 1.0, g as f32, b as f32, 1.0]))
    }
}

/// Fills each face box with a solid colour and records the sequence number
/// of every frame it was asked to swap.
pub struct StubSwapper {
    color: [u8; 3],
    failing: bool,
    pub calls: Arc<Mutex<Vec<u64>>>,
}

impl StubSwapper {
    pub fn new(color: [u8; 3]) -> Self {
        Self {
            color,
            failing: false,
            calls: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn failing() -> Self {
        Self {
            failing: true,
            ..Self::new([0, 0, 0])
        }
    }
}

impl FaceSwapper for StubSwapper {
    fn swap(
        &self,
        frame: &Frame,
        face: &DetectedFace,
        _source: &Embedding,
        _quality: Quality,
    ) -> Result<PixelRegion, Box<dyn std::error::Error>> {
        self.calls.lock().unwrap().push(frame.sequence());
        if self.failing {
            return Err("swap model exploded".into());
        }
        let (x, y, w, h) = face
            .bbox
            .clamped(frame.width(), frame.height())
            .ok_or("face outside frame")?;
        Ok(PixelRegion::solid(x, y, w, h, self.color))
    }
}

pub fn stub_models(faces: Vec<DetectedFace>) -> LoadedModels {
    LoadedModels {
        detector: Box::new(StubDetector::new(faces)),
        embedder: Box::new(StubEmbedder),
        swapper: Box::new(StubSwapper::new([255, 0, 0])),
    }
}
