use ndarray::ArrayView3;

/// Channel layout of a frame's pixel bytes.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PixelFormat {
    Rgb24,
    Bgr24,
}

impl PixelFormat {
    pub fn channels(self) -> u8 {
        match self {
            PixelFormat::Rgb24 | PixelFormat::Bgr24 => 3,
        }
    }
}

/// A single captured frame: contiguous pixel bytes in row-major order.
///
/// Frames are immutable once built. Stages that change pixels (compositing,
/// annotation) produce a new frame via [`Frame::with_data`] that keeps the
/// sequence number of its source.
#[derive(Clone, Debug)]
pub struct Frame {
    data: Vec<u8>,
    width: u32,
    height: u32,
    format: PixelFormat,
    sequence: u64,
}

impl Frame {
    pub fn new(data: Vec<u8>, width: u32, height: u32, format: PixelFormat, sequence: u64) -> Self {
        debug_assert_eq!(
            data.len(),
            (width as usize) * (height as usize) * (format.channels() as usize),
            "data length must equal width * height * channels"
        );
        Self {
            data,
            width,
            height,
            format,
            sequence,
        }
    }

    /// Builds a frame with the same geometry and sequence number but new pixels.
    pub fn with_data(&self, data: Vec<u8>) -> Self {
        Self::new(data, self.width, self.height, self.format, self.sequence)
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn into_data(self) -> Vec<u8> {
        self.data
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn format(&self) -> PixelFormat {
        self.format
    }

    pub fn channels(&self) -> u8 {
        self.format.channels()
    }

    pub fn sequence(&self) -> u64 {
        self.sequence
    }

    /// RGB value at `(x, y)` regardless of the stored channel order.
    pub fn rgb_at(&self, x: usize, y: usize) -> [u8; 3] {
        let offset = (y * self.width as usize + x) * self.channels() as usize;
        let px = &self.data[offset..offset + 3];
        match self.format {
            PixelFormat::Rgb24 => [px[0], px[1], px[2]],
            PixelFormat::Bgr24 => [px[2], px[1], px[0]],
        }
    }

    /// Tightly packed RGB copy of the pixel data.
    pub fn to_rgb(&self) -> Vec<u8> {
        match self.format {
            PixelFormat::Rgb24 => self.data.clone(),
            PixelFormat::Bgr24 => self
                .data
                .chunks_exact(3)
                .flat_map(|px| [px[2], px[1], px[0]])
                .collect(),
        }
    }

    pub fn as_ndarray(&self) -> ArrayView3<'_, u8> {
        ArrayView3::from_shape(self.shape(), &self.data)
            .expect("Frame data length must match dimensions")
    }

    fn shape(&self) -> (usize, usize, usize) {
        (
            self.height as usize,
            self.width as usize,
            self.channels() as usize,
        )
    }
}
