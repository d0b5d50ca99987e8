/// 128px identity swap model (inswapper) using ONNX Runtime.
///
/// The target face is aligned onto the 128px template, swapped against the
/// source identity latent, and pasted back through the inverse alignment
/// with a feathered mask.
use std::path::Path;
use std::sync::Mutex;

use ndarray::{Array2, Array4, Ix4};

use crate::detection::domain::alignment::{
    sample_bilinear, template_for, warp_crop, SimilarityTransform,
};
use crate::detection::domain::detected_face::DetectedFace;
use crate::detection::domain::embedding::{l2_normalize, Embedding};
use crate::detection::infrastructure::onnx_session::{build_session, declared_input_size};
use crate::settings::domain::settings::Quality;
use crate::shared::frame::{Frame, PixelFormat};
use crate::swapping::domain::face_swapper::FaceSwapper;
use crate::swapping::domain::pixel_region::PixelRegion;

const DEFAULT_INPUT_SIZE: u32 = 128;

pub struct OnnxInswapper {
    session: Mutex<ort::session::Session>,
    input_size: u32,
    emap: Option<Array2<f32>>,
}

impl OnnxInswapper {
    /// Loads the swap model and, when present, the identity projection
    /// matrix at `emap_path`.
    pub fn new(model_path: &Path, emap_path: &Path) -> Result<Self, Box<dyn std::error::Error>> {
        let session = build_session(model_path)?;
        let input_size = declared_input_size(&session, 0).unwrap_or(DEFAULT_INPUT_SIZE);
        let emap = load_emap(emap_path)?;
        if emap.is_none() {
            log::warn!(
                "No identity projection at {}, using raw embeddings",
                emap_path.display()
            );
        }
        Ok(Self {
            session: Mutex::new(session),
            input_size,
            emap,
        })
    }
}

impl FaceSwapper for OnnxInswapper {
    fn swap(
        &self,
        frame: &Frame,
        face: &DetectedFace,
        source: &Embedding,
        quality: Quality,
    ) -> Result<PixelRegion, Box<dyn std::error::Error>> {
        let size = self.input_size;
        let landmarks = face.alignment_landmarks();
        let transform = SimilarityTransform::estimate(landmarks.points(), &template_for(size))
            .ok_or("Degenerate landmarks, cannot align face")?;
        let crop = warp_crop(frame, transform, size).ok_or("Singular alignment transform")?;

        let target = ort::value::Tensor::from_array(preprocess(&crop.rgb, size as usize))?;
        let latent = ort::value::Tensor::from_array(project_latent(
            source.values(),
            self.emap.as_ref(),
        ))?;

        let swapped_rgb = {
            let mut session = self
                .session
                .lock()
                .map_err(|e| format!("Lock poisoned: {e}"))?;
            let outputs = session.run(ort::inputs![target, latent])?;
            let output = outputs[0].try_extract_array::<f32>()?;
            postprocess(output.into_dimensionality::<Ix4>()?, size as usize)
        };
        let swapped = Frame::new(swapped_rgb, size, size, PixelFormat::Rgb24, frame.sequence());

        paste_back(frame.width(), frame.height(), &swapped, transform, quality)
            .ok_or_else(|| "Swapped face lies outside the frame".into())
    }
}

/// Reads a raw little-endian `f32` square matrix. `Ok(None)` when the file
/// does not exist.
pub fn load_emap(path: &Path) -> Result<Option<Array2<f32>>, Box<dyn std::error::Error>> {
    if !path.exists() {
        return Ok(None);
    }
    let bytes = std::fs::read(path)?;
    let floats = bytes.len() / 4;
    let dim = (floats as f64).sqrt() as usize;
    if bytes.len() % 4 != 0 || dim * dim != floats || dim == 0 {
        return Err(format!(
            "{} is not a square f32 matrix ({} bytes)",
            path.display(),
            bytes.len()
        )
        .into());
    }
    let values: Vec<f32> = bytes
        .chunks_exact(4)
        .map(|b| f32::from_le_bytes([b[0], b[1], b[2], b[3]]))
        .collect();
    Ok(Some(Array2::from_shape_vec((dim, dim), values)?))
}

/// `embedding x emap`, L2-normalized, as a `[1, n]` batch.
fn project_latent(embedding: &[f32], emap: Option<&Array2<f32>>) -> Array2<f32> {
    let mut latent: Vec<f32> = match emap {
        Some(m) if m.nrows() == embedding.len() => {
            let row = ndarray::ArrayView1::from(embedding);
            row.dot(m).to_vec()
        }
        _ => embedding.to_vec(),
    };
    l2_normalize(&mut latent);
    let n = latent.len();
    Array2::from_shape_vec((1, n), latent).unwrap_or_else(|_| Array2::zeros((1, n)))
}

/// Aligned RGB crop -> `[0, 1]` NCHW tensor.
fn preprocess(rgb: &[u8], size: usize) -> Array4<f32> {
    let mut tensor = Array4::<f32>::zeros((1, 3, size, size));
    for y in 0..size {
        for x in 0..size {
            let offset = (y * size + x) * 3;
            for c in 0..3 {
                tensor[[0, c, y, x]] = rgb[offset + c] as f32 / 255.0;
            }
        }
    }
    tensor
}

/// `[0, 1]` NCHW model output -> packed RGB bytes.
fn postprocess(output: ndarray::ArrayView4<'_, f32>, size: usize) -> Vec<u8> {
    let mut rgb = vec![0u8; size * size * 3];
    for y in 0..size {
        for x in 0..size {
            let offset = (y * size + x) * 3;
            for c in 0..3 {
                rgb[offset + c] = (output[[0, c, y, x]] * 255.0).round().clamp(0.0, 255.0) as u8;
            }
        }
    }
    rgb
}

/// Higher quality keeps more of the swapped face.
fn blend_weight(quality: Quality) -> f32 {
    (0.5 + 0.5 * quality.fraction()) as f32
}

/// Width of the soft border, in crop pixels. Higher quality means a
/// tighter, sharper edge.
fn feather_width(size: u32, quality: Quality) -> f32 {
    size as f32 * (0.20 - 0.12 * quality.fraction() as f32)
}

/// Mask coverage at crop coordinates `(u, v)`: 0 on the crop border,
/// rising smoothly to 1 once `feather` pixels inside.
fn mask_alpha(u: f32, v: f32, size: u32, feather: f32) -> f32 {
    let edge = (size - 1) as f32;
    let d = u.min(v).min(edge - u).min(edge - v);
    if d < 0.0 {
        return 0.0;
    }
    if feather <= 0.0 {
        return 1.0;
    }
    let t = (d / feather).clamp(0.0, 1.0);
    t * t * (3.0 - 2.0 * t)
}

/// Maps the swapped crop back into frame space. The region is the frame
/// rectangle covered by the crop; pixels outside the crop get zero alpha.
fn paste_back(
    frame_w: u32,
    frame_h: u32,
    swapped: &Frame,
    frame_to_crop: SimilarityTransform,
    quality: Quality,
) -> Option<PixelRegion> {
    let size = swapped.width();
    let crop_to_frame = frame_to_crop.inverse()?;
    let edge = (size - 1) as f64;
    let corners = [(0.0, 0.0), (edge, 0.0), (0.0, edge), (edge, edge)]
        .map(|(u, v)| crop_to_frame.apply(u, v));
    let min_x = corners.iter().map(|c| c.0).fold(f64::INFINITY, f64::min);
    let max_x = corners.iter().map(|c| c.0).fold(f64::NEG_INFINITY, f64::max);
    let min_y = corners.iter().map(|c| c.1).fold(f64::INFINITY, f64::min);
    let max_y = corners.iter().map(|c| c.1).fold(f64::NEG_INFINITY, f64::max);

    let x0 = min_x.floor().clamp(0.0, frame_w as f64) as u32;
    let y0 = min_y.floor().clamp(0.0, frame_h as f64) as u32;
    let x1 = (max_x.ceil() + 1.0).clamp(0.0, frame_w as f64) as u32;
    let y1 = (max_y.ceil() + 1.0).clamp(0.0, frame_h as f64) as u32;
    if x1 <= x0 || y1 <= y0 {
        return None;
    }

    let (width, height) = (x1 - x0, y1 - y0);
    let n = (width as usize) * (height as usize);
    let mut rgb = vec![0u8; n * 3];
    let mut alpha = vec![0f32; n];
    let feather = feather_width(size, quality);
    let blend = blend_weight(quality);

    for y in y0..y1 {
        for x in x0..x1 {
            let (u, v) = frame_to_crop.apply(x as f64, y as f64);
            let Some(px) = sample_bilinear(swapped, u, v) else {
                continue;
            };
            let i = ((y - y0) * width + (x - x0)) as usize;
            rgb[i * 3..i * 3 + 3].copy_from_slice(&px);
            alpha[i] = mask_alpha(u as f32, v as f32, size, feather) * blend;
        }
    }

    Some(PixelRegion {
        x: x0,
        y: y0,
        width,
        height,
        rgb,
        alpha,
    })
}
