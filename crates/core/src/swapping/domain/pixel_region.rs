/// Swapped pixels for one face, positioned in frame coordinates.
///
/// `rgb` holds `width * height` RGB triplets and `alpha` one coverage value
/// per pixel in `[0, 1]`. Pixels with zero alpha leave the frame untouched.
#[derive(Clone, Debug, PartialEq)]
pub struct PixelRegion {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
    pub rgb: Vec<u8>,
    pub alpha: Vec<f32>,
}

impl PixelRegion {
    /// Fully opaque region of one colour. Mostly useful for stubs.
    pub fn solid(x: u32, y: u32, width: u32, height: u32, color: [u8; 3]) -> Self {
        let n = (width as usize) * (height as usize);
        Self {
            x,
            y,
            width,
            height,
            rgb: color.repeat(n),
            alpha: vec![1.0; n],
        }
    }

    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    pub fn pixel_count(&self) -> usize {
        (self.width as usize) * (self.height as usize)
    }

    /// True when the buffers match the declared dimensions.
    pub fn is_well_formed(&self) -> bool {
        self.rgb.len() == self.pixel_count() * 3 && self.alpha.len() == self.pixel_count()
    }
}
