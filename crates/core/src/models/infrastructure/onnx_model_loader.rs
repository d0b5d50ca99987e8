use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::detection::infrastructure::onnx_arcface_embedder::OnnxArcFaceEmbedder;
use crate::detection::infrastructure::onnx_yolo_detector::OnnxYoloDetector;
use crate::models::domain::model_loader::{LoadedModels, ModelLoader};
use crate::shared::constants::{
    DEFAULT_CONFIDENCE, EMBEDDING_MODEL_NAME, EMBEDDING_MODEL_URL, INSIGHTFACE_MODEL_DIR,
    SWAP_EMAP_NAME, SWAP_MODEL_NAME, YOLO_MODEL_NAME, YOLO_MODEL_URL,
};
use crate::shared::model_resolver::{self, ProgressFn};
use crate::swapping::infrastructure::onnx_inswapper::OnnxInswapper;

/// Resolves (downloading where allowed) and opens the three ONNX models.
///
/// The detector and embedder are fetched from their release URLs on first
/// use. The swap model is never downloaded: it must be placed in the model
/// cache, an extra model directory, or `~/.insightface/models`.
pub struct OnnxModelLoader {
    confidence: f64,
    model_dirs: Vec<PathBuf>,
}

impl OnnxModelLoader {
    pub fn new() -> Self {
        Self {
            confidence: DEFAULT_CONFIDENCE,
            model_dirs: Vec::new(),
        }
    }

    pub fn with_confidence(mut self, confidence: f64) -> Self {
        self.confidence = confidence;
        self
    }

    /// Additional directories searched after the user cache.
    pub fn with_model_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.model_dirs.push(dir.into());
        self
    }

    fn swap_model_dirs(&self) -> Vec<PathBuf> {
        let mut dirs = self.model_dirs.clone();
        if let Some(home) = dirs::home_dir() {
            dirs.push(home.join(INSIGHTFACE_MODEL_DIR));
        }
        dirs
    }
}

impl Default for OnnxModelLoader {
    fn default() -> Self {
        Self::new()
    }
}

impl ModelLoader for OnnxModelLoader {
    fn load(&self) -> Result<LoadedModels, Box<dyn std::error::Error>> {
        let yolo_path = model_resolver::resolve(
            YOLO_MODEL_NAME,
            Some(YOLO_MODEL_URL),
            &self.model_dirs,
            Some(logging_progress(YOLO_MODEL_NAME)),
        )?;
        let embedding_path = model_resolver::resolve(
            EMBEDDING_MODEL_NAME,
            Some(EMBEDDING_MODEL_URL),
            &self.model_dirs,
            Some(logging_progress(EMBEDDING_MODEL_NAME)),
        )?;
        let swap_path =
            model_resolver::resolve(SWAP_MODEL_NAME, None, &self.swap_model_dirs(), None)?;
        let emap_path = swap_path.with_file_name(SWAP_EMAP_NAME);

        log::info!("Detector: {}", yolo_path.display());
        log::info!("Embedder: {}", embedding_path.display());
        log::info!("Swapper: {}", swap_path.display());

        Ok(LoadedModels {
            detector: Box::new(OnnxYoloDetector::new(&yolo_path, self.confidence)?),
            embedder: Box::new(OnnxArcFaceEmbedder::new(&embedding_path)?),
            swapper: Box::new(OnnxInswapper::new(&swap_path, &emap_path)?),
        })
    }
}

/// Logs download progress in 10% steps.
fn logging_progress(name: &'static str) -> ProgressFn {
    let last_step = AtomicU64::new(u64::MAX);
    Box::new(move |downloaded, total| {
        if total == 0 {
            return;
        }
        let step = downloaded * 10 / total;
        if last_step.swap(step, Ordering::Relaxed) != step {
            log::info!("Downloading {name}: {}%", step * 10);
        }
    })
}
