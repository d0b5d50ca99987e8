use crate::detection::domain::detected_face::DetectedFace;
use crate::detection::domain::embedding::Embedding;
use crate::settings::domain::settings::Quality;
use crate::shared::frame::Frame;
use crate::swapping::domain::pixel_region::PixelRegion;

/// Replaces the identity of `face` in `frame` with the identity carried by
/// `source`, returning the pixels to composite back over the frame.
pub trait FaceSwapper: Send + Sync {
    fn swap(
        &self,
        frame: &Frame,
        face: &DetectedFace,
        source: &Embedding,
        quality: Quality,
    ) -> Result<PixelRegion, Box<dyn std::error::Error>>;
}
