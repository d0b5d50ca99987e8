use crate::detection::domain::detected_face::DetectedFace;
use crate::shared::frame::{Frame, PixelFormat};

const OUTLINE_RGB: [u8; 3] = [0, 255, 0];
const OUTLINE_THICKNESS: u32 = 2;

/// Copy of `frame` with a rectangle outline around every face.
pub fn annotate_faces(frame: &Frame, faces: &[DetectedFace]) -> Frame {
    let mut data = frame.data().to_vec();
    let color = match frame.format() {
        PixelFormat::Rgb24 => OUTLINE_RGB,
        PixelFormat::Bgr24 => [OUTLINE_RGB[2], OUTLINE_RGB[1], OUTLINE_RGB[0]],
    };
    for face in faces {
        if let Some((x, y, w, h)) = face.bbox.clamped(frame.width(), frame.height()) {
            draw_rectangle(&mut data, frame, (x, y, x + w, y + h), color);
        }
    }
    frame.with_data(data)
}

/// Outline of the half-open rectangle `(left, top, right, bottom)`.
fn draw_rectangle(data: &mut [u8], frame: &Frame, rect: (u32, u32, u32, u32), color: [u8; 3]) {
    let (left, top, right, bottom) = rect;
    let right = right.saturating_sub(1).max(left);
    let bottom = bottom.saturating_sub(1).max(top);
    let width = frame.width() as usize;
    let channels = frame.channels() as usize;
    let mut put = |x: u32, y: u32| {
        let o = (y as usize * width + x as usize) * channels;
        data[o..o + 3].copy_from_slice(&color);
    };

    for t in 0..OUTLINE_THICKNESS {
        let (top_t, bottom_t) = (top + t, bottom.saturating_sub(t));
        let (left_t, right_t) = (left + t, right.saturating_sub(t));
        if top_t > bottom_t || left_t > right_t {
            break;
        }
        for x in left..=right {
            put(x, top_t);
            put(x, bottom_t);
        }
        for y in top..=bottom {
            put(left_t, y);
            put(right_t, y);
        }
    }
}
