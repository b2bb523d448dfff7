use std::fs;
use std::path::Path;
use std::time::Instant;

use crate::pipeline::locate_error::LocateError;
use crate::shared::cancellation::RunControl;
use crate::shared::frame_set::FrameSet;
use crate::shared::video_asset::VideoAsset;
use crate::video::domain::frame_sampler::FrameSampler;

/// Turns a video into an ordered, contiguously numbered `FrameSet`.
///
/// Writes into an output area it is given; removing the files afterwards
/// is the caller's job.
pub struct FrameExtractor {
    sampler: Box<dyn FrameSampler>,
}

impl FrameExtractor {
    pub fn new(sampler: Box<dyn FrameSampler>) -> Self {
        Self { sampler }
    }

    pub fn probe(&mut self, video: &Path) -> Result<VideoAsset, LocateError> {
        let duration = self.sampler.probe_duration(video).map_err(|e| {
            LocateError::ExtractionFailed(format!("cannot read {}: {e}", video.display()))
        })?;
        Ok(VideoAsset::new(video, duration))
    }

    pub fn extract(
        &mut self,
        video: &VideoAsset,
        sampling_rate: f64,
        output_area: &Path,
        control: &RunControl,
    ) -> Result<FrameSet, LocateError> {
        control.checkpoint()?;
        clear_area(output_area)?;

        let started = Instant::now();
        if let Err(e) = self
            .sampler
            .sample(video.path(), sampling_rate, output_area, control)
        {
            // A sampler stopped by the run's control reports a generic error.
            control.checkpoint()?;
            return Err(LocateError::ExtractionFailed(e.to_string()));
        }

        let frames = FrameSet::from_dir(output_area)
            .map_err(|e| LocateError::ExtractionFailed(e.to_string()))?;

        let expected = video.expected_frame_count(sampling_rate) as usize;
        if frames.len() != expected {
            log::debug!(
                "Sampler produced {} frames, {expected} expected from duration",
                frames.len()
            );
        }
        log::info!(
            "Extracted {} frames in {:.1}s",
            frames.len(),
            started.elapsed().as_secs_f64()
        );
        Ok(frames)
    }
}

/// Ensures `area` exists and is empty.
fn clear_area(area: &Path) -> Result<(), LocateError> {
    let not_writable =
        |e: std::io::Error| LocateError::ExtractionFailed(format!("{}: {e}", area.display()));

    if !area.exists() {
        return fs::create_dir_all(area).map_err(not_writable);
    }
    for entry in fs::read_dir(area).map_err(not_writable)? {
        let path = entry.map_err(not_writable)?.path();
        if path.is_dir() {
            fs::remove_dir_all(&path).map_err(not_writable)?;
        } else {
            fs::remove_file(&path).map_err(not_writable)?;
        }
    }
    Ok(())
}
