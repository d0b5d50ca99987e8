use crate::detection::domain::detected_face::DetectedFace;
use crate::shared::frame::{Frame, PixelFormat};
use crate::source::domain::image_decoder::ImageDecoder;
use crate::source::domain::source_face::Thumbnail;

/// Decodes source images with the `image` crate (PNG, JPEG, BMP, WebP).
pub struct ImageCrateDecoder;

impl ImageCrateDecoder {
    pub fn new() -> Self {
        Self
    }
}

impl Default for ImageCrateDecoder {
    fn default() -> Self {
        Self::new()
    }
}

impl ImageDecoder for ImageCrateDecoder {
    fn decode(&self, bytes: &[u8]) -> Result<Frame, Box<dyn std::error::Error>> {
        let img = image::load_from_memory(bytes)?.to_rgb8();
        let (width, height) = img.dimensions();
        Ok(Frame::new(img.into_raw(), width, height, PixelFormat::Rgb24, 0))
    }

    fn thumbnail(&self, frame: &Frame, face: &DetectedFace, max_edge: u32) -> Thumbnail {
        let full = (0, 0, frame.width(), frame.height());
        let (x, y, w, h) = face
            .bbox
            .clamped(frame.width(), frame.height())
            .unwrap_or(full);

        let Some(img) = image::RgbImage::from_raw(frame.width(), frame.height(), frame.to_rgb())
        else {
            return Thumbnail {
                width: 0,
                height: 0,
                rgb: Vec::new(),
            };
        };
        let crop = image::imageops::crop_imm(&img, x, y, w, h).to_image();

        let scale = (max_edge as f64 / w.max(h) as f64).min(1.0);
        let tw = ((w as f64 * scale).round() as u32).max(1);
        let th = ((h as f64 * scale).round() as u32).max(1);
        let thumb = image::imageops::resize(&crop, tw, th, image::imageops::FilterType::Triangle);

        Thumbnail {
            width: tw,
            height: th,
            rgb: thumb.into_raw(),
        }
    }
}
