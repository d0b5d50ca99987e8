/// ArcFace identity embedder using ONNX Runtime.
///
/// Aligns the face onto the 112x112 ArcFace template, normalizes to
/// `[-1, 1]`, and L2-normalizes the 512-d output.
use std::path::Path;
use std::sync::Mutex;

use crate::detection::domain::alignment::{template_for, warp_crop, SimilarityTransform};
use crate::detection::domain::detected_face::DetectedFace;
use crate::detection::domain::embedding::Embedding;
use crate::detection::domain::face_embedder::FaceEmbedder;
use crate::detection::infrastructure::onnx_session::build_session;
use crate::shared::frame::Frame;

const INPUT_SIZE: u32 = 112;
const NORM_MEAN: f32 = 127.5;
const NORM_STD: f32 = 127.5;

pub struct OnnxArcFaceEmbedder {
    session: Mutex<ort::session::Session>,
}

impl OnnxArcFaceEmbedder {
    pub fn new(model_path: &Path) -> Result<Self, Box<dyn std::error::Error>> {
        Ok(Self {
            session: Mutex::new(build_session(model_path)?),
        })
    }
}

impl FaceEmbedder for OnnxArcFaceEmbedder {
    fn embed(
        &self,
        frame: &Frame,
        face: &DetectedFace,
    ) -> Result<Embedding, Box<dyn std::error::Error>> {
        let landmarks = face.alignment_landmarks();
        let transform = SimilarityTransform::estimate(landmarks.points(), &template_for(INPUT_SIZE))
            .ok_or("Degenerate landmarks, cannot align face")?;
        let crop = warp_crop(frame, transform, INPUT_SIZE).ok_or("Singular alignment transform")?;

        let tensor = preprocess(&crop.rgb, INPUT_SIZE as usize);
        let input_value = ort::value::Tensor::from_array(tensor)?;
        let mut session = self
            .session
            .lock()
            .map_err(|e| format!("Lock poisoned: {e}"))?;
        let outputs = session.run(ort::inputs![input_value])?;
        let embedding_array = outputs[0].try_extract_array::<f32>()?;
        let embedding_slice = embedding_array
            .as_slice()
            .ok_or("Cannot get embedding slice")?;

        Ok(Embedding::new(embedding_slice.to_vec()))
    }
}

/// Aligned RGB crop → normalized NCHW tensor.
fn preprocess(rgb: &[u8], size: usize) -> ndarray::Array4<f32> {
    let mut tensor = ndarray::Array4::<f32>::zeros((1, 3, size, size));
    for y in 0..size {
        for x in 0..size {
            let offset = (y * size + x) * 3;
            for c in 0..3 {
                tensor[[0, c, y, x]] = (rgb[offset + c] as f32 - NORM_MEAN) / NORM_STD;
            }
        }
    }
    tensor
}
