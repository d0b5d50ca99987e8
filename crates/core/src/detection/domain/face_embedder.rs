use crate::detection::domain::detected_face::DetectedFace;
use crate::detection::domain::embedding::Embedding;
use crate::shared::frame::Frame;

/// Computes the identity embedding of one detected face.
pub trait FaceEmbedder: Send + Sync {
    fn embed(
        &self,
        frame: &Frame,
        face: &DetectedFace,
    ) -> Result<Embedding, Box<dyn std::error::Error>>;
}
