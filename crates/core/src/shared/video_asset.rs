use std::path::{Path, PathBuf};

/// The input video of a run together with its total duration.
///
/// Built once from the sampler's metadata query and never changed afterwards.
#[derive(Clone, Debug, PartialEq)]
pub struct VideoAsset {
    path: PathBuf,
    duration_secs: f64,
}

impl VideoAsset {
    pub fn new(path: impl Into<PathBuf>, duration_secs: f64) -> Self {
        Self {
            path: path.into(),
            duration_secs,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn duration_secs(&self) -> f64 {
        self.duration_secs
    }

    /// Number of frames a gap-free sampling at `sampling_rate` yields.
    pub fn expected_frame_count(&self, sampling_rate: f64) -> u32 {
        if !(self.duration_secs > 0.0) || !(sampling_rate > 0.0) {
            return 0;
        }
        (self.duration_secs * sampling_rate).floor() as u32
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_construction() {
        let asset = VideoAsset::new("/tmp/clip.mp4", 10.0);
        assert_eq!(asset.path(), Path::new("/tmp/clip.mp4"));
        assert_eq!(asset.duration_secs(), 10.0);
    }

    #[test]
    fn test_expected_frame_count_ten_seconds_at_two_fps() {
        let asset = VideoAsset::new("clip.mp4", 10.0);
        assert_eq!(asset.expected_frame_count(2.0), 20);
    }

    #[test]
    fn test_expected_frame_count_floors_partial_interval() {
        let asset = VideoAsset::new("clip.mp4", 3.9);
        assert_eq!(asset.expected_frame_count(2.0), 7);
    }

    #[test]
    fn test_expected_frame_count_degenerate_inputs() {
        assert_eq!(VideoAsset::new("a", 0.0).expected_frame_count(2.0), 0);
        assert_eq!(VideoAsset::new("a", 5.0).expected_frame_count(0.0), 0);
        assert_eq!(VideoAsset::new("a", f64::NAN).expected_frame_count(2.0), 0);
    }
}
