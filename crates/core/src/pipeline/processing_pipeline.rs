use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::detection::domain::detected_face::DetectedFace;
use crate::models::model_handle::ModelHandle;
use crate::monitor::performance_monitor::PerformanceMonitor;
use crate::pipeline::domain::frame_sink::{FrameSink, Presented, StatusTag};
use crate::pipeline::frame_buffer::{FrameBuffer, Take};
use crate::pipeline::pipeline_logger::PipelineLogger;
use crate::settings::settings_state::SettingsState;
use crate::shared::constants::{FRAME_TAKE_TIMEOUT, SINK_PRESENT_TIMEOUT};
use crate::shared::error::FaceSwapError;
use crate::shared::frame::Frame;
use crate::source::source_face_registry::SourceFaceRegistry;
use crate::swapping::domain::annotation::annotate_faces;
use crate::swapping::domain::face_selection::FaceSelection;

pub struct PipelineConfig {
    pub selection: FaceSelection,
    pub take_timeout: Duration,
    pub present_timeout: Duration,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            selection: FaceSelection::default(),
            take_timeout: FRAME_TAKE_TIMEOUT,
            present_timeout: SINK_PRESENT_TIMEOUT,
        }
    }
}

/// Outcome of one frame through [`ProcessingPipeline::process_frame`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FrameOutcome {
    pub tag: StatusTag,
    /// Swapped regions composited into the presented frame.
    pub regions: usize,
    /// Whether the frame counted towards throughput.
    pub counted: bool,
    pub presented: Presented,
}

/// Totals for one [`ProcessingPipeline::run`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct PipelineStats {
    pub processed: u64,
    pub not_ready: u64,
    pub presentations_dropped: u64,
}

/// Logs the first failure of a streak and stays quiet until a frame gets
/// through normally again.
#[derive(Default)]
struct Streak {
    active: bool,
}

impl Streak {
    fn begin(&mut self) -> bool {
        !std::mem::replace(&mut self.active, true)
    }

    fn end(&mut self) {
        self.active = false;
    }
}

#[derive(Default)]
struct Streaks {
    not_ready: Streak,
    detect: Streak,
    swap: Streak,
    sink: Streak,
}

/// Consumer side of the live pipeline: takes the freshest frame, detects,
/// swaps or annotates according to the current settings and active
/// source, and presents the result.
///
/// Each frame reads settings and the active source once, so changes take
/// effect from the next frame. No shared lock is held while a model runs.
pub struct ProcessingPipeline {
    buffer: Arc<FrameBuffer>,
    models: ModelHandle,
    registry: Arc<SourceFaceRegistry>,
    settings: Arc<SettingsState>,
    monitor: Arc<PerformanceMonitor>,
    sink: Box<dyn FrameSink>,
    logger: Box<dyn PipelineLogger>,
    config: PipelineConfig,
    streaks: Streaks,
    stats: PipelineStats,
    last_sequence: Option<u64>,
}

impl ProcessingPipeline {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        buffer: Arc<FrameBuffer>,
        models: ModelHandle,
        registry: Arc<SourceFaceRegistry>,
        settings: Arc<SettingsState>,
        monitor: Arc<PerformanceMonitor>,
        sink: Box<dyn FrameSink>,
        logger: Box<dyn PipelineLogger>,
        config: PipelineConfig,
    ) -> Self {
        Self {
            buffer,
            models,
            registry,
            settings,
            monitor,
            sink,
            logger,
            config,
            streaks: Streaks::default(),
            stats: PipelineStats::default(),
            last_sequence: None,
        }
    }

    /// Processes frames until `cancelled` is set or the buffer is closed
    /// and drained.
    pub fn run(&mut self, cancelled: &AtomicBool) -> PipelineStats {
        log::info!("Pipeline started ({} faces policy)", self.config.selection);
        let mut dropped_seen = self.buffer.dropped_count();
        while !cancelled.load(Ordering::Relaxed) {
            match self.buffer.take_latest(self.config.take_timeout) {
                Take::Frame(frame) => {
                    let dropped = self.buffer.dropped_count();
                    if dropped != dropped_seen {
                        self.logger
                            .metric("dropped_frames", (dropped - dropped_seen) as f64);
                        dropped_seen = dropped;
                    }
                    self.process_frame(frame);
                }
                Take::Timeout => continue,
                Take::Closed => {
                    log::info!("Frame source closed, pipeline stopping");
                    break;
                }
            }
        }
        self.logger.summary();
        log::info!(
            "Pipeline stopped: {} processed, {} dropped by buffer",
            self.stats.processed,
            self.buffer.dropped_count()
        );
        self.stats
    }

    pub fn stats(&self) -> PipelineStats {
        self.stats
    }

    /// Runs one frame through the pipeline and presents the result. A frame
    /// not newer than the previous one is skipped and yields `None`.
    pub fn process_frame(&mut self, frame: Frame) -> Option<FrameOutcome> {
        if let Some(last) = self.last_sequence.filter(|&last| frame.sequence() <= last) {
            log::warn!(
                "Skipping frame {} that arrived after frame {last}",
                frame.sequence()
            );
            return None;
        }
        self.last_sequence = Some(frame.sequence());
        Some(self.process(frame))
    }

    fn process(&mut self, frame: Frame) -> FrameOutcome {
        let settings = self.settings.snapshot();
        if !settings.detection_enabled {
            return self.finish(frame, StatusTag::Raw, 0);
        }

        let started = Instant::now();
        let faces = match self.models.detect(&frame) {
            Ok(faces) => {
                self.streaks.not_ready.end();
                self.streaks.detect.end();
                faces
            }
            Err(FaceSwapError::ModelNotReady) => return self.not_ready(frame),
            Err(e) => {
                if self.streaks.detect.begin() {
                    log::warn!("Face detection failed, showing raw frames: {e}");
                }
                return self.finish(frame, StatusTag::Raw, 0);
            }
        };
        self.logger.timing("detect", elapsed_ms(started));
        self.logger.metric("faces", faces.len() as f64);

        if faces.is_empty() {
            return self.finish(frame, StatusTag::NoFaceDetected, 0);
        }

        let Some(source) = self.registry.active_embedding() else {
            return self.detected_only(frame, &faces);
        };

        let started = Instant::now();
        match self.models.infer(
            &frame,
            &faces,
            &source,
            settings.quality,
            self.config.selection,
        ) {
            Ok(swapped) => {
                self.streaks.swap.end();
                self.logger.timing("swap", elapsed_ms(started));
                self.finish(swapped.frame, StatusTag::Swapped, swapped.regions)
            }
            Err(FaceSwapError::ModelNotReady) => self.not_ready(frame),
            Err(e) => {
                if self.streaks.swap.begin() {
                    log::warn!("Face swap failed, showing detections only: {e}");
                }
                self.detected_only(frame, &faces)
            }
        }
    }

    fn detected_only(&mut self, frame: Frame, faces: &[DetectedFace]) -> FrameOutcome {
        let started = Instant::now();
        let annotated = annotate_faces(&frame, faces);
        self.logger.timing("annotate", elapsed_ms(started));
        self.finish(annotated, StatusTag::DetectedOnly, 0)
    }

    /// Presents the raw frame without counting it towards throughput.
    fn not_ready(&mut self, frame: Frame) -> FrameOutcome {
        if self.streaks.not_ready.begin() {
            log::warn!("Models not ready ({}), showing raw frames", self.models.status());
        }
        self.stats.not_ready += 1;
        self.logger.frame(StatusTag::ModelNotReady);
        let presented = self.present(frame, StatusTag::ModelNotReady);
        FrameOutcome {
            tag: StatusTag::ModelNotReady,
            regions: 0,
            counted: false,
            presented,
        }
    }

    /// Counts the frame and presents it.
    fn finish(&mut self, frame: Frame, tag: StatusTag, regions: usize) -> FrameOutcome {
        self.monitor.record();
        self.stats.processed += 1;
        self.logger.frame(tag);
        let presented = self.present(frame, tag);
        FrameOutcome {
            tag,
            regions,
            counted: true,
            presented,
        }
    }

    fn present(&mut self, frame: Frame, tag: StatusTag) -> Presented {
        let started = Instant::now();
        let result = self.sink.present(frame, tag, self.config.present_timeout);
        self.logger.timing("present", elapsed_ms(started));
        match result {
            Ok(presented) => {
                self.streaks.sink.end();
                if presented == Presented::Dropped {
                    self.stats.presentations_dropped += 1;
                    log::debug!("Presentation dropped, sink busy");
                }
                presented
            }
            Err(e) => {
                if self.streaks.sink.begin() {
                    log::warn!("Presentation failed: {e}");
                }
                self.stats.presentations_dropped += 1;
                Presented::Dropped
            }
        }
    }
}

fn elapsed_ms(since: Instant) -> f64 {
    since.elapsed().as_secs_f64() * 1000.0
}
