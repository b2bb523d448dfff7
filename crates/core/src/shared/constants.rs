use std::time::Duration;

/// Frames sampled per second of source video.
pub const DEFAULT_SAMPLING_RATE: f64 = 2.0;

/// Maximum number of frames submitted to the matcher in one call.
pub const DEFAULT_BATCH_SIZE: usize = 25;

/// Pause between consecutive matcher calls.
pub const DEFAULT_BATCH_PAUSE: Duration = Duration::from_millis(300);

/// Upper bound on the wall-clock time of one run.
pub const DEFAULT_RUN_TIMEOUT: Duration = Duration::from_secs(15 * 60);

pub const FRAME_FILE_PREFIX: &str = "frame-";
pub const FRAME_FILE_EXTENSION: &str = "jpg";

/// Minimum zero-padding width of frame sequence numbers; larger numbers grow wider.
pub const FRAME_NUMBER_WIDTH: usize = 5;

pub const WORK_AREA_PREFIX: &str = "facefinder-run-";

pub const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "bmp", "tiff", "tif", "webp"];

pub const DETECTOR_MODEL_NAME: &str = "yolo11n-pose_widerface.onnx";
pub const DETECTOR_MODEL_URL: &str =
    "https://github.com/neutrinographics/faceguard/releases/download/v0.1.0/yolo11n-pose_widerface.onnx";

pub const EMBEDDING_MODEL_NAME: &str = "w600k_r50.onnx";
pub const EMBEDDING_MODEL_URL: &str =
    "https://github.com/neutrinographics/faceguard/releases/download/v0.1.0/w600k_r50.onnx";
