mod snapshot_sink;

use std::path::{Path, PathBuf};
use std::process;
use std::thread;
use std::time::{Duration, Instant};

use clap::Parser;

use faceswap_core::capture::infrastructure::ffmpeg_camera::{default_device, CaptureSource, FfmpegCamera};
use faceswap_core::models::domain::model_status::ModelStatus;
use faceswap_core::models::infrastructure::onnx_model_loader::OnnxModelLoader;
use faceswap_core::models::model_handle::ModelHandle;
use faceswap_core::pipeline::pipeline_logger::SummaryPipelineLogger;
use faceswap_core::pipeline::processing_pipeline::PipelineConfig;
use faceswap_core::session::face_swap_session::{FaceSwapSession, SessionParts};
use faceswap_core::settings::domain::settings::{Quality, Resolution, Settings};
use faceswap_core::settings::infrastructure::settings_store::SettingsStore;
use faceswap_core::shared::constants::IMAGE_EXTENSIONS;
use faceswap_core::source::infrastructure::image_crate_decoder::ImageCrateDecoder;
use faceswap_core::swapping::domain::face_selection::FaceSelection;

use crate::snapshot_sink::SnapshotSink;

/// Live face swap from a camera or video file.
#[derive(Parser)]
#[command(name = "faceswap-live")]
struct Cli {
    /// Source face image(s). The first one with a usable face is swapped in.
    #[arg(short, long = "source")]
    sources: Vec<PathBuf>,

    /// Capture device (e.g. /dev/video0, 0, "video=Integrated Camera").
    #[arg(long, conflicts_with = "input")]
    device: Option<String>,

    /// Play a video file instead of a camera.
    #[arg(long)]
    input: Option<PathBuf>,

    /// Capture resolution: 640x480, 1280x720 or 1920x1080.
    #[arg(long)]
    resolution: Option<Resolution>,

    /// Swap quality (1-100).
    #[arg(long)]
    quality: Option<u32>,

    /// Show the camera feed without detecting or swapping faces.
    #[arg(long)]
    no_detection: bool,

    /// Which faces to swap: best or all.
    #[arg(long, default_value = "best")]
    faces: FaceSelection,

    /// Where the latest presented frame is written.
    #[arg(long, default_value = "faceswap-live.png")]
    snapshot: PathBuf,

    /// Seconds between snapshot writes.
    #[arg(long, default_value = "1.0")]
    snapshot_interval: f64,

    /// Stop after this many seconds (default: until the input ends).
    #[arg(long)]
    duration: Option<f64>,

    /// Face detection confidence threshold (0.0-1.0).
    #[arg(long, default_value = "0.5")]
    confidence: f64,

    /// Extra directory to search for model files.
    #[arg(long)]
    model_dir: Option<PathBuf>,

    /// Requested capture frame rate for camera devices.
    #[arg(long, default_value = "30")]
    framerate: u32,

    /// Persist the effective resolution, quality and detection settings.
    #[arg(long)]
    save_settings: bool,
}

fn main() {
    env_logger::init();

    if let Err(e) = run() {
        eprintln!("Error: {e}");
        process::exit(1);
    }
}

fn run() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    validate(&cli)?;

    let store = SettingsStore::new();
    let settings = apply_overrides(store.load(), &cli)?;
    if cli.save_settings {
        store.save(&settings)?;
        if let Some(path) = store.path() {
            log::info!("Settings saved to {}", path.display());
        }
    }

    let mut loader = OnnxModelLoader::new().with_confidence(cli.confidence);
    if let Some(dir) = &cli.model_dir {
        loader = loader.with_model_dir(dir);
    }

    let source = match (&cli.input, &cli.device) {
        (Some(path), _) => CaptureSource::File(path.clone()),
        (None, Some(name)) => CaptureSource::Device(name.clone()),
        (None, None) => default_device(),
    };
    log::info!("Capturing from {source:?} at {}", settings.resolution);

    let parts = SessionParts {
        device: Box::new(FfmpegCamera::new(source).with_framerate(cli.framerate)),
        models: ModelHandle::new(loader),
        decoder: Box::new(ImageCrateDecoder::new()),
        sink: Box::new(SnapshotSink::new(
            &cli.snapshot,
            Duration::from_secs_f64(cli.snapshot_interval),
        )?),
        logger: Box::new(SummaryPipelineLogger::new()),
    };
    let config = PipelineConfig {
        selection: cli.faces,
        ..PipelineConfig::default()
    };
    let session = FaceSwapSession::start(parts, settings, config)?;

    if !cli.sources.is_empty() {
        load_sources(&session, &cli.sources)?;
    }

    let deadline = cli
        .duration
        .map(|secs| Instant::now() + Duration::from_secs_f64(secs));
    let mut last_report = Instant::now();
    while session.is_running() && deadline.map_or(true, |d| Instant::now() < d) {
        thread::sleep(Duration::from_millis(100));
        if last_report.elapsed() >= Duration::from_secs(1) {
            last_report = Instant::now();
            log::info!(
                "{:.1} fps, models {}, {} frames dropped",
                session.fps(),
                session.model_status(),
                session.frames_dropped()
            );
        }
    }

    let report = session.stop()?;
    log::info!(
        "Processed {} frames ({} before models were ready), {} superseded in capture, {} presentations dropped",
        report.pipeline.processed,
        report.pipeline.not_ready,
        report.frames_dropped,
        report.pipeline.presentations_dropped
    );
    Ok(())
}

/// Waits for the models, then registers the source images. Without models
/// the session keeps running and shows the raw feed.
fn load_sources(session: &FaceSwapSession, paths: &[PathBuf]) -> Result<(), Box<dyn std::error::Error>> {
    log::info!("Waiting for models before adding source faces");
    let status = loop {
        let status = session.wait_for_models(Duration::from_secs(5));
        if status.is_settled() || !session.is_running() {
            break status;
        }
        log::info!("Models still {status}");
    };
    if status != ModelStatus::Ready {
        if let Some(e) = session.model_error() {
            log::error!("{e}; continuing without face swap");
        }
        return Ok(());
    }

    let mut images = Vec::with_capacity(paths.len());
    for path in paths {
        images.push((display_name(path), std::fs::read(path)?));
    }
    for ((name, _), result) in images.iter().zip(session.set_source_images(&images)) {
        match result {
            Ok(id) => log::info!("Source {name} registered as {id}"),
            Err(e) => log::warn!("Skipping source {name}: {e}"),
        }
    }
    if session.active_source().is_none() {
        log::warn!("No usable source face; faces will only be outlined");
    }
    Ok(())
}

fn apply_overrides(mut settings: Settings, cli: &Cli) -> Result<Settings, Box<dyn std::error::Error>> {
    if let Some(resolution) = cli.resolution {
        settings.resolution = resolution;
    }
    if let Some(quality) = cli.quality {
        settings.quality = Quality::new(quality)?;
    }
    if cli.no_detection {
        settings.detection_enabled = false;
    }
    Ok(settings)
}

fn validate(cli: &Cli) -> Result<(), Box<dyn std::error::Error>> {
    for path in &cli.sources {
        if !path.exists() {
            return Err(format!("Source image not found: {}", path.display()).into());
        }
        if !is_image(path) {
            return Err(format!("Not a supported image: {}", path.display()).into());
        }
    }
    if let Some(input) = &cli.input {
        if !input.exists() {
            return Err(format!("Input file not found: {}", input.display()).into());
        }
    }
    if !(0.0..=1.0).contains(&cli.confidence) {
        return Err(format!(
            "Confidence must be between 0.0 and 1.0, got {}",
            cli.confidence
        )
        .into());
    }
    if !cli.snapshot_interval.is_finite() || cli.snapshot_interval < 0.0 {
        return Err(format!(
            "Snapshot interval must be a non-negative number of seconds, got {}",
            cli.snapshot_interval
        )
        .into());
    }
    if let Some(secs) = cli.duration {
        if !secs.is_finite() || secs <= 0.0 {
            return Err(format!("Duration must be positive, got {secs}").into());
        }
    }
    Ok(())
}

fn is_image(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| IMAGE_EXTENSIONS.contains(&ext.to_lowercase().as_str()))
        .unwrap_or(false)
}

fn display_name(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Cli {
        Cli::try_parse_from(std::iter::once("faceswap-live").chain(args.iter().copied())).unwrap()
    }

    #[test]
    fn test_overrides_replace_stored_settings() {
        let cli = parse(&["--resolution", "1280x720", "--quality", "40", "--no-detection"]);

        let settings = apply_overrides(Settings::default(), &cli).unwrap();

        assert_eq!(settings.resolution, Resolution::Hd);
        assert_eq!(settings.quality.value(), 40);
        assert!(!settings.detection_enabled);
    }

    #[test]
    fn test_no_overrides_keeps_stored_settings() {
        let cli = parse(&[]);
        let settings = apply_overrides(Settings::default(), &cli).unwrap();
        assert_eq!(settings, Settings::default());
    }

    #[test]
    fn test_out_of_range_quality_rejected() {
        let cli = parse(&["--quality", "0"]);
        assert!(apply_overrides(Settings::default(), &cli).is_err());
    }

    #[test]
    fn test_unknown_resolution_rejected_by_parser() {
        let args = ["faceswap-live", "--resolution", "800x600"];
        assert!(Cli::try_parse_from(args).is_err());
    }

    #[test]
    fn test_device_and_input_conflict() {
        let args = ["faceswap-live", "--device", "0", "--input", "clip.mp4"];
        assert!(Cli::try_parse_from(args).is_err());
    }

    #[test]
    fn test_faces_policy_parsed() {
        assert_eq!(parse(&["--faces", "all"]).faces, FaceSelection::All);
        assert_eq!(parse(&[]).faces, FaceSelection::HighestConfidence);
    }

    #[test]
    fn test_validate_rejects_missing_source() {
        let cli = parse(&["--source", "/nonexistent/face.png"]);
        assert!(validate(&cli).is_err());
    }

    #[test]
    fn test_validate_rejects_bad_confidence() {
        let cli = parse(&["--confidence", "1.5"]);
        assert!(validate(&cli).is_err());
    }

    #[test]
    fn test_display_name_uses_file_name() {
        assert_eq!(display_name(Path::new("/photos/alice.jpg")), "alice.jpg");
    }

    #[test]
    fn test_is_image_case_insensitive() {
        assert!(is_image(Path::new("face.PNG")));
        assert!(!is_image(Path::new("clip.mp4")));
    }
}
