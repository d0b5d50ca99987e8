use crate::detection::domain::detected_face::DetectedFace;
use crate::shared::frame::Frame;
use crate::source::domain::source_face::Thumbnail;

/// Turns encoded image bytes into frames and face previews.
pub trait ImageDecoder: Send + Sync {
    fn decode(&self, bytes: &[u8]) -> Result<Frame, Box<dyn std::error::Error>>;

    /// Crop of `face` scaled so its longest edge is at most `max_edge`.
    fn thumbnail(&self, frame: &Frame, face: &DetectedFace, max_edge: u32) -> Thumbnail;
}
