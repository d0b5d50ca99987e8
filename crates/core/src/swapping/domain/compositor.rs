use crate::shared::frame::{Frame, PixelFormat};
use crate::swapping::domain::pixel_region::PixelRegion;

/// Alpha-blends swapped regions over a copy of `frame`.
///
/// Regions are clipped to the frame; malformed regions are skipped. The
/// source frame is never modified, and the result keeps its sequence number.
pub fn composite(frame: &Frame, regions: &[PixelRegion]) -> Frame {
    let fw = frame.width() as usize;
    let fh = frame.height() as usize;
    let channels = frame.channels() as usize;
    let mut data = frame.data().to_vec();

    for region in regions {
        if region.is_empty() || !region.is_well_formed() {
            log::debug!("Skipping malformed swap region at ({}, {})", region.x, region.y);
            continue;
        }
        let rx = region.x as usize;
        let ry = region.y as usize;
        let rw = region.width as usize;
        let x_end = (rx + rw).min(fw);
        let y_end = (ry + region.height as usize).min(fh);

        for y in ry..y_end {
            for x in rx..x_end {
                let ri = (y - ry) * rw + (x - rx);
                let alpha = region.alpha[ri].clamp(0.0, 1.0);
                if alpha <= 0.0 {
                    continue;
                }
                let src = &region.rgb[ri * 3..ri * 3 + 3];
                let di = (y * fw + x) * channels;
                for c in 0..3 {
                    let dc = match frame.format() {
                        PixelFormat::Rgb24 => c,
                        PixelFormat::Bgr24 => 2 - c,
                    };
                    let dst = data[di + dc] as f32;
                    data[di + dc] = (src[c] as f32 * alpha + dst * (1.0 - alpha))
                        .round()
                        .clamp(0.0, 255.0) as u8;
                }
            }
        }
    }

    frame.with_data(data)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn black_frame(w: u32, h: u32, format: PixelFormat) -> Frame {
        Frame::new(vec![0u8; (w * h * 3) as usize], w, h, format, 3)
    }

    #[test]
    fn test_opaque_region_replaces_pixels() {
        let frame = black_frame(4, 4, PixelFormat::Rgb24);
        let region = PixelRegion::solid(1, 1, 2, 2, [200, 100, 50]);

        let out = composite(&frame, &[region]);

        assert_eq!(out.rgb_at(1, 1), [200, 100, 50]);
        assert_eq!(out.rgb_at(2, 2), [200, 100, 50]);
        assert_eq!(out.rgb_at(0, 0), [0, 0, 0]);
        assert_eq!(out.rgb_at(3, 3), [0, 0, 0]);
        assert_eq!(out.sequence(), 3);
        assert_eq!(frame.data().iter().copied().max(), Some(0));
    }

    #[test]
    fn test_half_alpha_blends() {
        let frame = black_frame(1, 1, PixelFormat::Rgb24);
        let mut region = PixelRegion::solid(0, 0, 1, 1, [200, 200, 200]);
        region.alpha[0] = 0.5;

        let out = composite(&frame, &[region]);

        assert_eq!(out.rgb_at(0, 0), [100, 100, 100]);
    }

    #[test]
    fn test_bgr_frame_receives_rgb_region_correctly() {
        let frame = black_frame(1, 1, PixelFormat::Bgr24);
        let out = composite(&frame, &[PixelRegion::solid(0, 0, 1, 1, [255, 0, 0])]);
        assert_eq!(out.data(), &[0, 0, 255]);
        assert_eq!(out.rgb_at(0, 0), [255, 0, 0]);
    }

    #[test]
    fn test_region_clipped_at_frame_edge() {
        let frame = black_frame(3, 3, PixelFormat::Rgb24);
        let out = composite(&frame, &[PixelRegion::solid(2, 2, 5, 5, [9, 9, 9])]);
        assert_eq!(out.rgb_at(2, 2), [9, 9, 9]);
        assert_eq!(out.rgb_at(1, 1), [0, 0, 0]);
    }

    #[test]
    fn test_malformed_region_skipped() {
        let frame = black_frame(2, 2, PixelFormat::Rgb24);
        let mut region = PixelRegion::solid(0, 0, 2, 2, [9, 9, 9]);
        region.rgb.truncate(3);
        let out = composite(&frame, &[region]);
        assert_eq!(out.data(), frame.data());
    }
}
