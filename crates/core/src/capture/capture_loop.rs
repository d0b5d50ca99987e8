use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::capture::capture_session::CaptureSession;
use crate::capture::domain::capture_device::CaptureDevice;
use crate::pipeline::frame_buffer::FrameBuffer;
use crate::settings::settings_state::SettingsState;
use crate::shared::error::FaceSwapError;
use crate::shared::frame::Frame;

/// Why the capture loop stopped without an error.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CaptureEnd {
    Cancelled,
    EndOfStream,
}

/// Producer side of the live pipeline: reads frames from the device and
/// publishes them to the frame buffer.
///
/// Frames are stamped with a sequence number that keeps increasing across
/// device restarts. A resolution change closes the device and reopens it at
/// the new size. Open and read failures end the loop; they are not retried.
pub struct CaptureLoop {
    device: Box<dyn CaptureDevice>,
    buffer: Arc<FrameBuffer>,
    settings: Arc<SettingsState>,
    next_sequence: u64,
}

impl CaptureLoop {
    pub fn new(
        device: Box<dyn CaptureDevice>,
        buffer: Arc<FrameBuffer>,
        settings: Arc<SettingsState>,
    ) -> Self {
        Self {
            device,
            buffer,
            settings,
            next_sequence: 0,
        }
    }

    /// Runs until cancelled, end of stream, or a device failure. The frame
    /// buffer is closed on return so the consumer can drain and stop.
    pub fn run(&mut self, cancelled: &AtomicBool) -> Result<CaptureEnd, FaceSwapError> {
        let result = self.capture(cancelled);
        self.buffer.close();
        match &result {
            Ok(end) => log::info!("Capture stopped ({end:?}) after {} frames", self.next_sequence),
            Err(e) => log::error!("Capture halted: {e}"),
        }
        result
    }

    fn capture(&mut self, cancelled: &AtomicBool) -> Result<CaptureEnd, FaceSwapError> {
        let mut watch = self.settings.watch_resolution();
        let mut resolution = self.settings.snapshot().resolution;

        loop {
            let mut session = CaptureSession::open(self.device.as_mut(), resolution)?;
            loop {
                if cancelled.load(Ordering::Relaxed) {
                    return Ok(CaptureEnd::Cancelled);
                }
                if let Some(changed) = self.settings.resolution_changed(&mut watch) {
                    log::info!("Restarting capture: {} -> {changed}", session.resolution());
                    resolution = changed;
                    break;
                }
                let Some(frame) = session.read_frame()? else {
                    return Ok(CaptureEnd::EndOfStream);
                };
                let (width, height, format) = (frame.width(), frame.height(), frame.format());
                let stamped = Frame::new(frame.into_data(), width, height, format, self.next_sequence);
                self.next_sequence += 1;
                self.buffer.publish(stamped);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::frame_buffer::Take;
    use crate::settings::domain::settings::{Resolution, Settings};
    use crate::shared::frame::PixelFormat;
    use std::sync::Mutex;
    use std::time::Duration;

    #[derive(Debug, Clone, PartialEq)]
    enum Event {
        Open(Resolution),
        Read,
        Close,
    }

    /// Device driven by a script: yields `frames` frames (or forever when
    /// `None`), can fail on open or on a given read, and can run a hook on
    /// each read to simulate the control surface acting mid-capture.
    struct ScriptedDevice {
        events: Arc<Mutex<Vec<Event>>>,
        frames: Option<usize>,
        fail_open: bool,
        fail_on_read: Option<usize>,
        reads: usize,
        on_read: Option<Box<dyn FnMut(usize) + Send>>,
    }

    impl ScriptedDevice {
        fn new(frames: Option<usize>) -> (Self, Arc<Mutex<Vec<Event>>>) {
            let events = Arc::new(Mutex::new(Vec::new()));
            (
                Self {
                    events: events.clone(),
                    frames,
                    fail_open: false,
                    fail_on_read: None,
                    reads: 0,
                    on_read: None,
                },
                events,
            )
        }
    }

    impl CaptureDevice for ScriptedDevice {
        fn open(&mut self, resolution: Resolution) -> Result<(), Box<dyn std::error::Error>> {
            self.events.lock().unwrap().push(Event::Open(resolution));
            if self.fail_open {
                return Err("no such device".into());
            }
            Ok(())
        }

        fn read_frame(&mut self) -> Result<Option<Frame>, Box<dyn std::error::Error>> {
            self.events.lock().unwrap().push(Event::Read);
            self.reads += 1;
            if let Some(hook) = self.on_read.as_mut() {
                hook(self.reads);
            }
            if self.fail_on_read == Some(self.reads) {
                return Err("device unplugged".into());
            }
            if self.frames.is_some_and(|n| self.reads > n) {
                return Ok(None);
            }
            // Devices do not know about sequencing; the loop stamps frames.
            Ok(Some(Frame::new(vec![1, 2, 3], 1, 1, PixelFormat::Rgb24, 0)))
        }

        fn close(&mut self) {
            self.events.lock().unwrap().push(Event::Close);
        }
    }

    fn run_loop(device: ScriptedDevice, settings: Arc<SettingsState>) -> (Result<CaptureEnd, FaceSwapError>, Arc<FrameBuffer>) {
        let buffer = Arc::new(FrameBuffer::new());
        let mut capture = CaptureLoop::new(Box::new(device), buffer.clone(), settings);
        (capture.run(&AtomicBool::new(false)), buffer)
    }

    fn closes(events: &[Event]) -> usize {
        events.iter().filter(|e| **e == Event::Close).count()
    }

    #[test]
    fn test_end_of_stream_closes_device_and_buffer() {
        let (device, events) = ScriptedDevice::new(Some(3));

        let (result, buffer) = run_loop(device, Arc::new(SettingsState::default()));

        assert_eq!(result, Ok(CaptureEnd::EndOfStream));
        let events = events.lock().unwrap();
        assert_eq!(events.first(), Some(&Event::Open(Resolution::Vga)));
        assert_eq!(events.last(), Some(&Event::Close));
        assert_eq!(closes(&events), 1);
        assert!(buffer.is_closed());
        match buffer.take_latest(Duration::ZERO) {
            Take::Frame(f) => assert_eq!(f.sequence(), 2),
            other => panic!("expected last frame, got {other:?}"),
        }
        assert_eq!(buffer.dropped_count(), 2);
    }

    #[test]
    fn test_open_failure_reports_device_unavailable_and_releases() {
        let (mut device, events) = ScriptedDevice::new(Some(3));
        device.fail_open = true;

        let (result, buffer) = run_loop(device, Arc::new(SettingsState::default()));

        assert_eq!(
            result,
            Err(FaceSwapError::DeviceUnavailable("no such device".into()))
        );
        let events = events.lock().unwrap();
        assert!(!events.contains(&Event::Read));
        assert_eq!(closes(&events), 1);
        assert!(buffer.is_closed());
    }

    #[test]
    fn test_read_failure_halts_and_closes_device() {
        let (mut device, events) = ScriptedDevice::new(None);
        device.fail_on_read = Some(2);

        let (result, _) = run_loop(device, Arc::new(SettingsState::default()));

        assert!(matches!(result, Err(FaceSwapError::DeviceUnavailable(_))));
        assert_eq!(events.lock().unwrap().last(), Some(&Event::Close));
    }

    #[test]
    fn test_resolution_change_restarts_device() {
        let settings = Arc::new(SettingsState::new(Settings::default()));
        let (mut device, events) = ScriptedDevice::new(Some(4));
        let writer = settings.clone();
        device.on_read = Some(Box::new(move |read| {
            if read == 2 {
                writer.set_resolution(Resolution::Hd);
            }
        }));

        let (result, buffer) = run_loop(device, settings);

        assert_eq!(result, Ok(CaptureEnd::EndOfStream));
        let events = events.lock().unwrap();
        let opens: Vec<_> = events
            .iter()
            .filter_map(|e| match e {
                Event::Open(r) => Some(*r),
                _ => None,
            })
            .collect();
        assert_eq!(opens, vec![Resolution::Vga, Resolution::Hd]);
        assert_eq!(closes(&events), 2);
        // Close of the first session precedes the second open.
        let first_close = events.iter().position(|e| *e == Event::Close).unwrap();
        let second_open = events.iter().rposition(|e| matches!(e, Event::Open(_))).unwrap();
        assert!(first_close < second_open);
        // Sequence keeps increasing across the restart: 4 frames, 0..=3.
        match buffer.take_latest(Duration::ZERO) {
            Take::Frame(f) => assert_eq!(f.sequence(), 3),
            other => panic!("expected last frame, got {other:?}"),
        }
    }

    #[test]
    fn test_cancellation_stops_loop_and_releases_device() {
        let cancelled = Arc::new(AtomicBool::new(false));
        let (mut device, events) = ScriptedDevice::new(None);
        let flag = cancelled.clone();
        device.on_read = Some(Box::new(move |read| {
            if read == 5 {
                flag.store(true, Ordering::SeqCst);
            }
        }));
        let buffer = Arc::new(FrameBuffer::new());
        let mut capture = CaptureLoop::new(
            Box::new(device),
            buffer.clone(),
            Arc::new(SettingsState::default()),
        );

        let result = capture.run(&cancelled);

        assert_eq!(result, Ok(CaptureEnd::Cancelled));
        assert_eq!(events.lock().unwrap().last(), Some(&Event::Close));
        assert!(buffer.is_closed());
    }
}
