use crate::detection::domain::face_detector::FaceDetector;
use crate::detection::domain::face_embedder::FaceEmbedder;
use crate::swapping::domain::face_swapper::FaceSwapper;

/// The inference resources the pipeline and registry need. Immutable once
/// built; shared behind an `Arc` after publication.
pub struct LoadedModels {
    pub detector: Box<dyn FaceDetector>,
    pub embedder: Box<dyn FaceEmbedder>,
    pub swapper: Box<dyn FaceSwapper>,
}

/// Produces the model set. Runs once, on the loader thread.
pub trait ModelLoader: Send {
    fn load(&self) -> Result<LoadedModels, Box<dyn std::error::Error>>;
}
