//! Landmark-based face alignment.
//!
//! Recognition and swap models expect faces warped onto a canonical
//! 5-point template. The warp is a 2-D similarity (rotation, uniform scale,
//! translation) fitted to the landmarks by least squares.

use crate::shared::frame::Frame;

/// ArcFace reference landmarks for a 112x112 crop.
pub const ARCFACE_TEMPLATE_112: [(f64, f64); 5] = [
    (38.2946, 51.6963),
    (73.5318, 51.5014),
    (56.0252, 71.7366),
    (41.5493, 92.3655),
    (70.7299, 92.2041),
];

/// Template scaled to `size`. Sizes that are not a multiple of 112 are
/// based on a 128 grid with an 8px horizontal margin, the layout swap
/// models are trained on.
pub fn template_for(size: u32) -> [(f64, f64); 5] {
    let (ratio, diff_x) = if size % 112 == 0 {
        (size as f64 / 112.0, 0.0)
    } else {
        let ratio = size as f64 / 128.0;
        (ratio, 8.0 * ratio)
    };
    ARCFACE_TEMPLATE_112.map(|(x, y)| (x * ratio + diff_x, y * ratio))
}

/// `x' = a*x - b*y + tx`, `y' = b*x + a*y + ty`.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SimilarityTransform {
    pub a: f64,
    pub b: f64,
    pub tx: f64,
    pub ty: f64,
}

impl SimilarityTransform {
    pub fn identity() -> Self {
        Self {
            a: 1.0,
            b: 0.0,
            tx: 0.0,
            ty: 0.0,
        }
    }

    /// Least-squares similarity mapping `src` points onto `dst` points.
    /// Returns `None` when the source points are degenerate (all coincident).
    pub fn estimate(src: &[(f64, f64)], dst: &[(f64, f64)]) -> Option<Self> {
        let n = src.len().min(dst.len());
        if n < 2 {
            return None;
        }
        let nf = n as f64;
        let (smx, smy) = mean(&src[..n]);
        let (dmx, dmy) = mean(&dst[..n]);

        let mut num_a = 0.0;
        let mut num_b = 0.0;
        let mut denom = 0.0;
        for i in 0..n {
            let sx = src[i].0 - smx;
            let sy = src[i].1 - smy;
            let dx = dst[i].0 - dmx;
            let dy = dst[i].1 - dmy;
            num_a += sx * dx + sy * dy;
            num_b += sx * dy - sy * dx;
            denom += sx * sx + sy * sy;
        }
        if denom / nf < 1e-12 {
            return None;
        }

        let a = num_a / denom;
        let b = num_b / denom;
        Some(Self {
            a,
            b,
            tx: dmx - (a * smx - b * smy),
            ty: dmy - (b * smx + a * smy),
        })
    }

    pub fn apply(&self, x: f64, y: f64) -> (f64, f64) {
        (
            self.a * x - self.b * y + self.tx,
            self.b * x + self.a * y + self.ty,
        )
    }

    pub fn scale(&self) -> f64 {
        (self.a * self.a + self.b * self.b).sqrt()
    }

    pub fn inverse(&self) -> Option<Self> {
        let s2 = self.a * self.a + self.b * self.b;
        if s2 < 1e-12 {
            return None;
        }
        let a = self.a / s2;
        let b = -self.b / s2;
        Some(Self {
            a,
            b,
            tx: -(a * self.tx - b * self.ty),
            ty: -(b * self.tx + a * self.ty),
        })
    }
}

fn mean(points: &[(f64, f64)]) -> (f64, f64) {
    let n = points.len() as f64;
    let (sx, sy) = points
        .iter()
        .fold((0.0, 0.0), |(ax, ay), (x, y)| (ax + x, ay + y));
    (sx / n, sy / n)
}

/// Square RGB crop produced by warping a frame onto a template.
#[derive(Clone, Debug)]
pub struct AlignedCrop {
    pub size: u32,
    /// Tightly packed RGB, `size * size * 3` bytes.
    pub rgb: Vec<u8>,
    /// Maps frame coordinates into crop coordinates.
    pub transform: SimilarityTransform,
}

/// Warps `frame` into a `size`x`size` crop where `frame_to_crop` maps frame
/// coordinates to crop coordinates. Out-of-frame samples are black.
pub fn warp_crop(frame: &Frame, frame_to_crop: SimilarityTransform, size: u32) -> Option<AlignedCrop> {
    let crop_to_frame = frame_to_crop.inverse()?;
    let s = size as usize;
    let mut rgb = vec![0u8; s * s * 3];
    for y in 0..s {
        for x in 0..s {
            let (fx, fy) = crop_to_frame.apply(x as f64, y as f64);
            if let Some(px) = sample_bilinear(frame, fx, fy) {
                let o = (y * s + x) * 3;
                rgb[o..o + 3].copy_from_slice(&px);
            }
        }
    }
    Some(AlignedCrop {
        size,
        rgb,
        transform: frame_to_crop,
    })
}

/// Bilinear RGB sample at fractional frame coordinates, `None` outside the frame.
pub fn sample_bilinear(frame: &Frame, x: f64, y: f64) -> Option<[u8; 3]> {
    let w = frame.width() as usize;
    let h = frame.height() as usize;
    if w == 0 || h == 0 || x < 0.0 || y < 0.0 || x > (w - 1) as f64 || y > (h - 1) as f64 {
        return None;
    }
    let x0 = x.floor() as usize;
    let y0 = y.floor() as usize;
    let x1 = (x0 + 1).min(w - 1);
    let y1 = (y0 + 1).min(h - 1);
    let fx = x - x0 as f64;
    let fy = y - y0 as f64;

    let p00 = frame.rgb_at(x0, y0);
    let p10 = frame.rgb_at(x1, y0);
    let p01 = frame.rgb_at(x0, y1);
    let p11 = frame.rgb_at(x1, y1);

    let mut out = [0u8; 3];
    for c in 0..3 {
        let top = p00[c] as f64 * (1.0 - fx) + p10[c] as f64 * fx;
        let bottom = p01[c] as f64 * (1.0 - fx) + p11[c] as f64 * fx;
        out[c] = (top * (1.0 - fy) + bottom * fy).round().clamp(0.0, 255.0) as u8;
    }
    Some(out)
}
