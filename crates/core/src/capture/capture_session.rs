use crate::capture::domain::capture_device::CaptureDevice;
use crate::settings::domain::settings::Resolution;
use crate::shared::error::FaceSwapError;
use crate::shared::frame::Frame;

/// An open capture device. The device is closed when the session is
/// dropped, on every exit path, including a failed open.
pub struct CaptureSession<'a> {
    device: &'a mut dyn CaptureDevice,
    resolution: Resolution,
}

impl<'a> CaptureSession<'a> {
    pub fn open(
        device: &'a mut dyn CaptureDevice,
        resolution: Resolution,
    ) -> Result<Self, FaceSwapError> {
        if let Err(e) = device.open(resolution) {
            device.close();
            log::error!("Could not open capture device at {resolution}: {e}");
            return Err(FaceSwapError::DeviceUnavailable(e.to_string()));
        }
        log::info!("Capture started at {resolution}");
        Ok(Self { device, resolution })
    }

    pub fn resolution(&self) -> Resolution {
        self.resolution
    }

    pub fn read_frame(&mut self) -> Result<Option<Frame>, FaceSwapError> {
        self.device.read_frame().map_err(|e| {
            log::error!("Capture read failed: {e}");
            FaceSwapError::DeviceUnavailable(e.to_string())
        })
    }
}

impl Drop for CaptureSession<'_> {
    fn drop(&mut self) {
        self.device.close();
        log::debug!("Capture device closed");
    }
}
