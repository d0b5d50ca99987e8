use std::time::Duration;

pub const YOLO_MODEL_NAME: &str = "yolo11n-pose_widerface.onnx";
pub const YOLO_MODEL_URL: &str =
    "https://github.com/neutrinographics/faceguard/releases/download/v0.1.0/yolo11n-pose_widerface.onnx";

pub const EMBEDDING_MODEL_NAME: &str = "w600k_r50.onnx";
pub const EMBEDDING_MODEL_URL: &str =
    "https://github.com/neutrinographics/faceguard/releases/download/v0.1.0/w600k_r50.onnx";

/// The swap model is not redistributed; it is looked up locally only.
pub const SWAP_MODEL_NAME: &str = "inswapper_128.onnx";

/// Directory (relative to home) where insightface keeps its model zoo.
pub const INSIGHTFACE_MODEL_DIR: &str = ".insightface/models";

/// Raw little-endian f32 512x512 matrix projecting an ArcFace embedding into
/// the swap model's identity latent space. Optional: identity when absent.
pub const SWAP_EMAP_NAME: &str = "inswapper_128.emap";

/// Length of an ArcFace identity embedding.
pub const EMBEDDING_DIM: usize = 512;

/// Default detection confidence threshold.
pub const DEFAULT_CONFIDENCE: f64 = 0.5;

/// How long the pipeline waits for a fresh frame before re-checking cancellation.
pub const FRAME_TAKE_TIMEOUT: Duration = Duration::from_millis(100);

/// Longest the pipeline blocks on a presentation sink before dropping the frame.
pub const SINK_PRESENT_TIMEOUT: Duration = Duration::from_millis(50);

/// Rolling window used for the frames-per-second estimate.
pub const FPS_WINDOW: Duration = Duration::from_secs(1);

/// Polling granularity while waiting on the model loader.
pub const LOADER_WAIT_SLICE: Duration = Duration::from_millis(100);

/// Longest edge of a source face thumbnail, in pixels.
pub const THUMBNAIL_SIZE: u32 = 96;

pub const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "bmp", "webp"];
