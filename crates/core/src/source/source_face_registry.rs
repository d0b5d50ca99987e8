use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::detection::domain::detected_face::DetectedFace;
use crate::detection::domain::embedding::Embedding;
use crate::models::model_handle::ModelHandle;
use crate::shared::constants::THUMBNAIL_SIZE;
use crate::shared::error::FaceSwapError;
use crate::source::domain::image_decoder::ImageDecoder;
use crate::source::domain::source_face::{SourceFace, SourceFaceId};

/// Candidate source identities and the active selection.
///
/// Decoding, detection and embedding happen before any lock is taken; the
/// finished entry is then published under a short write lock, so readers
/// (the pipeline, once per frame) never wait on that work and never see a
/// half-built entry. The first face added to an empty registry becomes
/// active.
pub struct SourceFaceRegistry {
    decoder: Box<dyn ImageDecoder>,
    models: ModelHandle,
    state: RwLock<RegistryState>,
    next_id: AtomicU64,
}

#[derive(Default)]
struct RegistryState {
    faces: Vec<SourceFace>,
    active: Option<SourceFaceId>,
}

impl SourceFaceRegistry {
    pub fn new(decoder: impl ImageDecoder + 'static, models: ModelHandle) -> Self {
        Self::with_decoder(Box::new(decoder), models)
    }

    pub fn with_decoder(decoder: Box<dyn ImageDecoder>, models: ModelHandle) -> Self {
        Self {
            decoder,
            models,
            state: RwLock::new(RegistryState::default()),
            next_id: AtomicU64::new(1),
        }
    }

    pub fn add(&self, image: &[u8]) -> Result<SourceFaceId, FaceSwapError> {
        self.add_named("image", image)
    }

    /// Registers `image` under a display name (typically the file name).
    pub fn add_named(&self, name: &str, image: &[u8]) -> Result<SourceFaceId, FaceSwapError> {
        let face = self.build(name, image)?;
        let id = face.id;
        let mut state = self.write();
        state.faces.push(face);
        if state.faces.len() == 1 {
            state.active = Some(id);
        }
        log::info!("Added source face {id} ({name})");
        Ok(id)
    }

    /// Replaces every registered face with the given images. Images without
    /// a usable face are reported and skipped; the first one that succeeds
    /// becomes active. Readers see either the old set or the new set.
    pub fn set_source_images(
        &self,
        images: &[(String, Vec<u8>)],
    ) -> Vec<Result<SourceFaceId, FaceSwapError>> {
        let mut built = Vec::new();
        let results: Vec<_> = images
            .iter()
            .map(|(name, bytes)| {
                self.build(name, bytes).map(|face| {
                    let id = face.id;
                    built.push(face);
                    id
                })
            })
            .collect();

        let mut state = self.write();
        state.active = built.first().map(|f| f.id);
        state.faces = built;
        log::info!(
            "Source images replaced: {} usable of {}",
            state.faces.len(),
            images.len()
        );
        results
    }

    pub fn select(&self, id: SourceFaceId) -> Result<(), FaceSwapError> {
        let mut state = self.write();
        if !state.faces.iter().any(|f| f.id == id) {
            return Err(FaceSwapError::UnknownId(id));
        }
        state.active = Some(id);
        log::info!("Selected source face {id}");
        Ok(())
    }

    pub fn remove(&self, id: SourceFaceId) -> Result<(), FaceSwapError> {
        let mut state = self.write();
        let index = state
            .faces
            .iter()
            .position(|f| f.id == id)
            .ok_or(FaceSwapError::UnknownId(id))?;
        state.faces.remove(index);
        if state.active == Some(id) {
            state.active = None;
        }
        Ok(())
    }

    /// Embedding of the active face, if any. Cheap: clones an `Arc`.
    pub fn active_embedding(&self) -> Option<Embedding> {
        let state = self.read();
        let active = state.active?;
        state
            .faces
            .iter()
            .find(|f| f.id == active)
            .map(|f| f.embedding.clone())
    }

    pub fn active_id(&self) -> Option<SourceFaceId> {
        self.read().active
    }

    pub fn len(&self) -> usize {
        self.read().faces.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Snapshot of all registered faces, in insertion order.
    pub fn list(&self) -> Vec<SourceFace> {
        self.read().faces.clone()
    }

    fn build(&self, name: &str, image: &[u8]) -> Result<SourceFace, FaceSwapError> {
        let frame = self
            .decoder
            .decode(image)
            .map_err(|e| FaceSwapError::InvalidImage(format!("{name}: {e}")))?;
        let models = self.models.models()?;
        let faces = models
            .detector
            .detect(&frame)
            .map_err(|e| FaceSwapError::InvalidImage(format!("{name}: {e}")))?;
        let face = DetectedFace::most_confident(&faces)
            .map(|i| &faces[i])
            .ok_or_else(|| FaceSwapError::InvalidImage(format!("{name}: no face detected")))?;
        let embedding = models
            .embedder
            .embed(&frame, face)
            .map_err(|e| FaceSwapError::InvalidImage(format!("{name}: {e}")))?;
        let thumbnail = self.decoder.thumbnail(&frame, face, THUMBNAIL_SIZE);

        Ok(SourceFace {
            id: self.allocate_id(),
            name: name.to_string(),
            thumbnail,
            embedding,
        })
    }

    fn allocate_id(&self) -> SourceFaceId {
        SourceFaceId::new(self.next_id.fetch_add(1, Ordering::Relaxed))
    }

    fn read(&self) -> RwLockReadGuard<'_, RegistryState> {
        self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, RegistryState> {
        self.state.write().unwrap_or_else(PoisonError::into_inner)
    }
}
