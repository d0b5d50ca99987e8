use crate::settings::domain::settings::Resolution;
use crate::shared::frame::Frame;

/// A video source the capture loop pulls frames from.
///
/// `close` must be safe to call on a device that is not open, and more than
/// once.
pub trait CaptureDevice: Send {
    fn open(&mut self, resolution: Resolution) -> Result<(), Box<dyn std::error::Error>>;

    /// Next frame, or `None` once the source has no more frames.
    fn read_frame(&mut self) -> Result<Option<Frame>, Box<dyn std::error::Error>>;

    fn close(&mut self);
}
