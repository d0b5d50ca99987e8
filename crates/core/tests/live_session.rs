use std::io::Cursor;
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};

use crossbeam_channel::{Receiver, Sender};

use faceswap_core::capture::capture_loop::CaptureEnd;
use faceswap_core::capture::domain::capture_device::CaptureDevice;
use faceswap_core::detection::domain::detected_face::{BoundingBox, DetectedFace};
use faceswap_core::detection::domain::embedding::Embedding;
use faceswap_core::detection::domain::face_detector::FaceDetector;
use faceswap_core::detection::domain::face_embedder::FaceEmbedder;
use faceswap_core::models::domain::model_loader::{LoadedModels, ModelLoader};
use faceswap_core::models::domain::model_status::ModelStatus;
use faceswap_core::models::model_handle::ModelHandle;
use faceswap_core::pipeline::domain::frame_sink::StatusTag;
use faceswap_core::pipeline::infrastructure::channel_frame_sink::{ChannelFrameSink, PresentedFrame};
use faceswap_core::pipeline::pipeline_logger::NullPipelineLogger;
use faceswap_core::pipeline::processing_pipeline::PipelineConfig;
use faceswap_core::session::face_swap_session::{FaceSwapSession, SessionParts};
use faceswap_core::settings::domain::settings::{Quality, Resolution, Settings};
use faceswap_core::shared::error::FaceSwapError;
use faceswap_core::shared::frame::{Frame, PixelFormat};
use faceswap_core::source::infrastructure::image_crate_decoder::ImageCrateDecoder;
use faceswap_core::swapping::domain::face_swapper::FaceSwapper;
use faceswap_core::swapping::domain::pixel_region::PixelRegion;

const SWAP_COLOR: [u8; 3] = [255, 0, 0];
const WAIT: Duration = Duration::from_secs(5);

fn face() -> DetectedFace {
    DetectedFace {
        bbox: BoundingBox::new(16.0, 8.0, 40.0, 32.0),
        landmarks: None,
        confidence: 0.9,
    }
}

struct FixedDetector;

impl FaceDetector for FixedDetector {
    fn detect(&self, _frame: &Frame) -> Result<Vec<DetectedFace>, Box<dyn std::error::Error>> {
        Ok(vec![face()])
    }
}

struct ConstantEmbedder;

impl FaceEmbedder for ConstantEmbedder {
    fn embed(&self, _frame: &Frame, _face: &DetectedFace) -> Result<Embedding, Box<dyn std::error::Error>> {
        Ok(Embedding::new(vec![1.0, 0.0, 0.0]))
    }
}

struct FillSwapper;

impl FaceSwapper for FillSwapper {
    fn swap(
        &self,
        frame: &Frame,
        face: &DetectedFace,
        _source: &Embedding,
        _quality: Quality,
    ) -> Result<PixelRegion, Box<dyn std::error::Error>> {
        let (x, y, w, h) = face
            .bbox
            .clamped(frame.width(), frame.height())
            .ok_or("face outside frame")?;
        Ok(PixelRegion::solid(x, y, w, h, SWAP_COLOR))
    }
}

/// Finishes loading only when the test says so, or fails on request.
struct GatedLoader {
    gate: Receiver<Result<(), String>>,
}

impl ModelLoader for GatedLoader {
    fn load(&self) -> Result<LoadedModels, Box<dyn std::error::Error>> {
        self.gate.recv()??;
        Ok(LoadedModels {
            detector: Box::new(FixedDetector),
            embedder: Box::new(ConstantEmbedder),
            swapper: Box::new(FillSwapper),
        })
    }
}

/// Grey 64x48 frames, either forever or for a fixed count. Records every
/// resolution it was opened at.
struct ScriptedCamera {
    remaining: Option<usize>,
    opens: Arc<Mutex<Vec<Resolution>>>,
}

impl CaptureDevice for ScriptedCamera {
    fn open(&mut self, resolution: Resolution) -> Result<(), Box<dyn std::error::Error>> {
        self.opens.lock().unwrap().push(resolution);
        Ok(())
    }

    fn read_frame(&mut self) -> Result<Option<Frame>, Box<dyn std::error::Error>> {
        if let Some(remaining) = self.remaining.as_mut() {
            if *remaining == 0 {
                return Ok(None);
            }
            *remaining -= 1;
        }
        thread::sleep(Duration::from_millis(2));
        Ok(Some(Frame::new(vec![128; 64 * 48 * 3], 64, 48, PixelFormat::Rgb24, 0)))
    }

    fn close(&mut self) {}
}

struct Harness {
    session: FaceSwapSession,
    frames: Receiver<PresentedFrame>,
    gate: Sender<Result<(), String>>,
    opens: Arc<Mutex<Vec<Resolution>>>,
}

fn start(frame_count: Option<usize>) -> Harness {
    let (gate_tx, gate_rx) = crossbeam_channel::bounded(1);
    let (sink, frames) = ChannelFrameSink::bounded(4);
    let opens = Arc::new(Mutex::new(Vec::new()));
    let parts = SessionParts {
        device: Box::new(ScriptedCamera {
            remaining: frame_count,
            opens: opens.clone(),
        }),
        models: ModelHandle::new(GatedLoader { gate: gate_rx }),
        decoder: Box::new(ImageCrateDecoder::new()),
        sink: Box::new(sink),
        logger: Box::new(NullPipelineLogger),
    };
    let session = FaceSwapSession::start(parts, Settings::default(), PipelineConfig::default()).unwrap();
    Harness {
        session,
        frames,
        gate: gate_tx,
        opens,
    }
}

fn next_with_tag(frames: &Receiver<PresentedFrame>, tag: StatusTag) -> PresentedFrame {
    let deadline = Instant::now() + WAIT;
    loop {
        let remaining = deadline.saturating_duration_since(Instant::now());
        let presented = frames
            .recv_timeout(remaining)
            .unwrap_or_else(|_| panic!("no {tag} frame within {WAIT:?}"));
        if presented.tag == tag {
            return presented;
        }
    }
}

fn source_png() -> Vec<u8> {
    let image = image::RgbImage::from_pixel(64, 64, image::Rgb([90, 60, 40]));
    let mut bytes = Vec::new();
    image
        .write_to(&mut Cursor::new(&mut bytes), image::ImageFormat::Png)
        .unwrap();
    bytes
}

#[test]
fn test_live_session_from_loading_to_swapped() {
    let harness = start(None);
    let session = &harness.session;

    // Frames keep flowing while the models load, without being counted.
    next_with_tag(&harness.frames, StatusTag::ModelNotReady);
    assert_eq!(session.model_status(), ModelStatus::Loading);
    assert_eq!(
        session.add_source_image("alice.png", &source_png()),
        Err(FaceSwapError::ModelNotReady)
    );

    harness.gate.send(Ok(())).unwrap();
    assert_eq!(session.wait_for_models(WAIT), ModelStatus::Ready);

    // Faces are found but there is nobody to swap in yet.
    next_with_tag(&harness.frames, StatusTag::DetectedOnly);

    let id = session.add_source_image("alice.png", &source_png()).unwrap();
    assert_eq!(session.active_source(), Some(id));
    assert_eq!(session.sources()[0].name, "alice.png");

    let swapped = next_with_tag(&harness.frames, StatusTag::Swapped);
    assert_eq!(swapped.frame.rgb_at(28, 20), SWAP_COLOR);
    assert_eq!(swapped.frame.rgb_at(2, 2), [128, 128, 128]);

    session.set_detection_enabled(false);
    let raw = next_with_tag(&harness.frames, StatusTag::Raw);
    assert_eq!(raw.frame.rgb_at(28, 20), [128, 128, 128]);

    let Harness { session, frames, .. } = harness;
    let report = session.stop().unwrap();
    drop(frames);

    assert_eq!(report.capture_end, Some(CaptureEnd::Cancelled));
    assert!(report.pipeline.not_ready >= 1);
    assert!(report.pipeline.processed >= 3);
}

#[test]
fn test_resolution_change_reopens_camera() {
    let harness = start(None);
    harness.gate.send(Ok(())).unwrap();

    harness.session.set_resolution(Resolution::FullHd);

    let deadline = Instant::now() + WAIT;
    while harness.opens.lock().unwrap().len() < 2 {
        assert!(Instant::now() < deadline, "camera was not reopened");
        // Keep the sink drained so the pipeline never stalls.
        let _ = harness.frames.recv_timeout(Duration::from_millis(10));
    }
    assert_eq!(
        *harness.opens.lock().unwrap(),
        vec![Resolution::Vga, Resolution::FullHd]
    );
    assert_eq!(harness.session.settings().resolution, Resolution::FullHd);
    harness.session.stop().unwrap();
}

#[test]
fn test_failed_load_keeps_showing_raw_frames() {
    let harness = start(None);
    harness.gate.send(Err("weights corrupt".into())).unwrap();

    assert_eq!(harness.session.wait_for_models(WAIT), ModelStatus::Failed);
    assert!(matches!(
        harness.session.model_error(),
        Some(FaceSwapError::ModelLoadFailed(msg)) if msg.contains("weights corrupt")
    ));
    next_with_tag(&harness.frames, StatusTag::ModelNotReady);

    let report = harness.session.stop().unwrap();
    assert_eq!(report.pipeline.processed, 0);
}

#[test]
fn test_end_of_stream_finishes_session() {
    let harness = start(Some(20));
    harness.gate.send(Ok(())).unwrap();

    let Harness { session, frames, .. } = harness;
    let drain = thread::spawn(move || frames.iter().count());
    let report = session.wait().unwrap();

    assert_eq!(report.capture_end, Some(CaptureEnd::EndOfStream));
    let presented = drain.join().unwrap();
    assert!(presented >= 1);
    assert_eq!(
        report.pipeline.processed + report.pipeline.not_ready,
        presented as u64 + report.pipeline.presentations_dropped
    );
}
