use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use crossbeam_channel::{SendTimeoutError, Sender};

use faceswap_core::pipeline::domain::frame_sink::{FrameSink, Presented, StatusTag};
use faceswap_core::shared::frame::Frame;

/// Headless presentation: logs status changes and periodically writes the
/// latest frame to an image file.
///
/// Encoding happens on a writer thread behind a one-frame queue. When the
/// writer falls behind, `present` gives up after its timeout and reports
/// the frame as dropped. A failed write is returned by the next `present`.
pub struct SnapshotSink {
    interval: Duration,
    last_written: Option<Instant>,
    last_tag: Option<StatusTag>,
    sender: Option<Sender<Frame>>,
    writer: Option<JoinHandle<()>>,
    written: Arc<AtomicU64>,
    failure: Arc<Mutex<Option<String>>>,
}

impl SnapshotSink {
    pub fn new(path: impl Into<PathBuf>, interval: Duration) -> std::io::Result<Self> {
        let path = path.into();
        Self::with_writer(interval, move |frame| {
            save_png(&path, frame)?;
            log::debug!("Snapshot of frame {} written to {}", frame.sequence(), path.display());
            Ok(())
        })
    }

    fn with_writer<W>(interval: Duration, mut write: W) -> std::io::Result<Self>
    where
        W: FnMut(&Frame) -> Result<(), Box<dyn std::error::Error>> + Send + 'static,
    {
        let (sender, receiver) = crossbeam_channel::bounded::<Frame>(1);
        let written = Arc::new(AtomicU64::new(0));
        let failure = Arc::new(Mutex::new(None));

        let writer = {
            let written = written.clone();
            let failure = failure.clone();
            thread::Builder::new()
                .name("snapshot-writer".into())
                .spawn(move || {
                    for frame in receiver {
                        match write(&frame) {
                            Ok(()) => {
                                written.fetch_add(1, Ordering::Relaxed);
                            }
                            Err(e) => {
                                log::error!("Snapshot of frame {} failed: {e}", frame.sequence());
                                *failure.lock().unwrap_or_else(PoisonError::into_inner) =
                                    Some(format!("snapshot write failed: {e}"));
                            }
                        }
                    }
                })?
        };

        Ok(Self {
            interval,
            last_written: None,
            last_tag: None,
            sender: Some(sender),
            writer: Some(writer),
            written,
            failure,
        })
    }

    /// Snapshots the writer has finished so far.
    pub fn written(&self) -> u64 {
        self.written.load(Ordering::Relaxed)
    }

    /// Lets the writer finish the queued frame and stops it.
    pub fn close(&mut self) {
        self.sender = None;
        if let Some(writer) = self.writer.take() {
            if writer.join().is_err() {
                log::error!("Snapshot writer thread panicked");
            }
        }
    }

    fn due(&self, now: Instant) -> bool {
        self.last_written
            .map_or(true, |at| now.duration_since(at) >= self.interval)
    }
}

impl FrameSink for SnapshotSink {
    fn present(
        &mut self,
        frame: Frame,
        tag: StatusTag,
        timeout: Duration,
    ) -> Result<Presented, Box<dyn std::error::Error>> {
        if self.last_tag != Some(tag) {
            log::info!("Status: {tag}");
            self.last_tag = Some(tag);
        }

        if let Some(failure) = self
            .failure
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
        {
            return Err(failure.into());
        }

        let now = Instant::now();
        if !self.due(now) {
            return Ok(Presented::Shown);
        }
        let Some(sender) = self.sender.as_ref() else {
            return Err("snapshot writer is closed".into());
        };
        match sender.send_timeout(frame, timeout) {
            Ok(()) => {
                self.last_written = Some(now);
                Ok(Presented::Shown)
            }
            Err(SendTimeoutError::Timeout(_)) => Ok(Presented::Dropped),
            Err(SendTimeoutError::Disconnected(_)) => Err("snapshot writer stopped".into()),
        }
    }
}

impl Drop for SnapshotSink {
    fn drop(&mut self) {
        self.close();
    }
}

fn save_png(path: &Path, frame: &Frame) -> Result<(), Box<dyn std::error::Error>> {
    let image = image::RgbImage::from_raw(frame.width(), frame.height(), frame.to_rgb())
        .ok_or("frame buffer does not match its dimensions")?;
    image.save(path)?;
    Ok(())
}
