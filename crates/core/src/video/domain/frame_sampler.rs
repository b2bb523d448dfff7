use std::path::Path;

use crate::shared::cancellation::RunControl;

/// Transcoding capability: turns a video into uniformly time-sampled image files.
///
/// Implementations own decoding details; the pipeline only sees the files
/// they leave behind in `output_dir`.
pub trait FrameSampler: Send {
    /// Total duration of the video in seconds.
    fn probe_duration(&mut self, video: &Path) -> Result<f64, Box<dyn std::error::Error>>;

    /// Writes sequentially numbered frames (see `frame_file_name`) into `output_dir`.
    ///
    /// Returns only once sampling has finished or failed. Implementations
    /// should poll `control` and stop early when it reports an interrupt.
    fn sample(
        &mut self,
        video: &Path,
        sampling_rate: f64,
        output_dir: &Path,
        control: &RunControl,
    ) -> Result<(), Box<dyn std::error::Error>>;
}
