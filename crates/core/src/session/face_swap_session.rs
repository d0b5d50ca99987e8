use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crate::capture::capture_loop::{CaptureEnd, CaptureLoop};
use crate::capture::domain::capture_device::CaptureDevice;
use crate::models::domain::model_status::ModelStatus;
use crate::models::model_handle::ModelHandle;
use crate::monitor::performance_monitor::PerformanceMonitor;
use crate::pipeline::domain::frame_sink::FrameSink;
use crate::pipeline::frame_buffer::FrameBuffer;
use crate::pipeline::pipeline_logger::PipelineLogger;
use crate::pipeline::processing_pipeline::{PipelineConfig, PipelineStats, ProcessingPipeline};
use crate::settings::domain::settings::{Resolution, Settings};
use crate::settings::settings_state::SettingsState;
use crate::shared::error::FaceSwapError;
use crate::source::domain::image_decoder::ImageDecoder;
use crate::source::domain::source_face::{SourceFace, SourceFaceId};
use crate::source::source_face_registry::SourceFaceRegistry;

/// Adapters a session is assembled from.
pub struct SessionParts {
    pub device: Box<dyn CaptureDevice>,
    pub models: ModelHandle,
    pub decoder: Box<dyn ImageDecoder>,
    pub sink: Box<dyn FrameSink>,
    pub logger: Box<dyn PipelineLogger>,
}

/// What a finished session did.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SessionReport {
    pub capture_end: Option<CaptureEnd>,
    pub pipeline: PipelineStats,
    pub frames_dropped: u64,
}

/// A running face swap session: one capture thread, one pipeline thread and
/// the model loader, plus the control surface that steers them.
///
/// Control calls are safe from any thread and take effect from the next
/// frame. Dropping the session stops it.
pub struct FaceSwapSession {
    cancelled: Arc<AtomicBool>,
    buffer: Arc<FrameBuffer>,
    models: ModelHandle,
    registry: Arc<SourceFaceRegistry>,
    settings: Arc<SettingsState>,
    monitor: Arc<PerformanceMonitor>,
    capture: Option<JoinHandle<Result<CaptureEnd, FaceSwapError>>>,
    pipeline: Option<JoinHandle<PipelineStats>>,
}

impl FaceSwapSession {
    /// Kicks off model loading and starts the capture and pipeline threads.
    pub fn start(
        parts: SessionParts,
        settings: Settings,
        config: PipelineConfig,
    ) -> Result<Self, Box<dyn std::error::Error>> {
        let cancelled = Arc::new(AtomicBool::new(false));
        let buffer = Arc::new(FrameBuffer::new());
        let settings = Arc::new(SettingsState::new(settings));
        let monitor = Arc::new(PerformanceMonitor::default());
        let registry = Arc::new(SourceFaceRegistry::with_decoder(
            parts.decoder,
            parts.models.clone(),
        ));

        parts.models.begin_load();

        let mut session = Self {
            cancelled: cancelled.clone(),
            buffer: buffer.clone(),
            models: parts.models.clone(),
            registry: registry.clone(),
            settings: settings.clone(),
            monitor: monitor.clone(),
            capture: None,
            pipeline: None,
        };

        let mut pipeline = ProcessingPipeline::new(
            buffer.clone(),
            parts.models,
            registry,
            settings.clone(),
            monitor,
            parts.sink,
            parts.logger,
            config,
        );
        let flag = cancelled.clone();
        session.pipeline = Some(
            thread::Builder::new()
                .name("pipeline".into())
                .spawn(move || pipeline.run(&flag))?,
        );

        // A failed spawn drops `session`, which stops the pipeline thread.
        let mut capture = CaptureLoop::new(parts.device, buffer, settings);
        session.capture = Some(
            thread::Builder::new()
                .name("capture".into())
                .spawn(move || capture.run(&cancelled))?,
        );

        log::info!("Session started");
        Ok(session)
    }

    /// Replaces all source faces. See [`SourceFaceRegistry::set_source_images`].
    pub fn set_source_images(
        &self,
        images: &[(String, Vec<u8>)],
    ) -> Vec<Result<SourceFaceId, FaceSwapError>> {
        self.registry.set_source_images(images)
    }

    pub fn add_source_image(&self, name: &str, image: &[u8]) -> Result<SourceFaceId, FaceSwapError> {
        self.registry.add_named(name, image)
    }

    pub fn select_source(&self, id: SourceFaceId) -> Result<(), FaceSwapError> {
        self.registry.select(id)
    }

    pub fn remove_source(&self, id: SourceFaceId) -> Result<(), FaceSwapError> {
        self.registry.remove(id)
    }

    pub fn sources(&self) -> Vec<SourceFace> {
        self.registry.list()
    }

    pub fn active_source(&self) -> Option<SourceFaceId> {
        self.registry.active_id()
    }

    /// Takes effect by restarting the capture device.
    pub fn set_resolution(&self, resolution: Resolution) {
        self.settings.set_resolution(resolution);
    }

    pub fn set_detection_enabled(&self, enabled: bool) {
        self.settings.set_detection_enabled(enabled);
    }

    pub fn set_quality(&self, value: u32) -> Result<(), FaceSwapError> {
        self.settings.set_quality(value)
    }

    pub fn settings(&self) -> Settings {
        self.settings.snapshot()
    }

    /// Frames processed over the last second.
    pub fn fps(&self) -> f64 {
        self.monitor.current_fps()
    }

    pub fn model_status(&self) -> ModelStatus {
        self.models.status()
    }

    pub fn model_error(&self) -> Option<FaceSwapError> {
        self.models.load_error()
    }

    /// Blocks until the models are `Ready` or `Failed`, the timeout runs
    /// out, or the session is stopped.
    pub fn wait_for_models(&self, timeout: Duration) -> ModelStatus {
        self.models.wait_until_settled(timeout, &self.cancelled)
    }

    /// Whether frames are still flowing. Turns false once the capture
    /// source ends or fails and the pipeline has drained.
    pub fn is_running(&self) -> bool {
        self.pipeline.as_ref().is_some_and(|h| !h.is_finished())
    }

    /// Number of frames superseded in the buffer before they were processed.
    pub fn frames_dropped(&self) -> u64 {
        self.buffer.dropped_count()
    }

    /// Signals every thread to stop, releases the device and joins.
    pub fn stop(mut self) -> Result<SessionReport, FaceSwapError> {
        log::info!("Stopping session");
        self.cancelled.store(true, Ordering::SeqCst);
        self.join()
    }

    /// Waits for the capture source to end on its own, then joins.
    pub fn wait(mut self) -> Result<SessionReport, FaceSwapError> {
        self.join()
    }

    fn join(&mut self) -> Result<SessionReport, FaceSwapError> {
        fn set_if_none(slot: &mut Option<FaceSwapError>, err: FaceSwapError) {
            if slot.is_none() {
                *slot = Some(err);
            }
        }

        let mut first_error = None;
        let mut capture_end = None;
        let mut pipeline = PipelineStats::default();

        if let Some(handle) = self.capture.take() {
            match handle.join() {
                Ok(Ok(end)) => capture_end = Some(end),
                Ok(Err(e)) => set_if_none(&mut first_error, e),
                Err(_) => {
                    // The buffer was never closed; release the consumer.
                    self.buffer.close();
                    set_if_none(&mut first_error, FaceSwapError::WorkerPanicked("capture".into()));
                }
            }
        }

        if let Some(handle) = self.pipeline.take() {
            match handle.join() {
                Ok(stats) => pipeline = stats,
                Err(_) => set_if_none(&mut first_error, FaceSwapError::WorkerPanicked("pipeline".into())),
            }
        }

        self.models.join_loader();

        match first_error {
            Some(e) => Err(e),
            None => Ok(SessionReport {
                capture_end,
                pipeline,
                frames_dropped: self.buffer.dropped_count(),
            }),
        }
    }
}

impl Drop for FaceSwapSession {
    fn drop(&mut self) {
        if self.capture.is_none() && self.pipeline.is_none() {
            return;
        }
        self.cancelled.store(true, Ordering::SeqCst);
        // Capture may never have started; unblock the pipeline regardless.
        self.buffer.close();
        if let Err(e) = self.join() {
            log::error!("Session ended with error: {e}");
        }
    }
}
