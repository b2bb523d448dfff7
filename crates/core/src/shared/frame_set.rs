use std::fs;
use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::shared::constants::{
    FRAME_FILE_EXTENSION, FRAME_FILE_PREFIX, FRAME_NUMBER_WIDTH, IMAGE_EXTENSIONS,
};

#[derive(Error, Debug)]
pub enum FrameSetError {
    #[error("failed to list frame directory {path}: {source}")]
    List {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("frame file {0} carries no sequence number")]
    Unnumbered(String),
    #[error("frame numbering is not contiguous: expected {expected}, found {found}")]
    Gap { expected: u32, found: u32 },
}

/// One sampled picture on disk, numbered from 1 in sampling order.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SampledFrame {
    sequence: u32,
    path: PathBuf,
}

impl SampledFrame {
    pub fn new(sequence: u32, path: impl Into<PathBuf>) -> Self {
        Self {
            sequence,
            path: path.into(),
        }
    }

    pub fn sequence(&self) -> u32 {
        self.sequence
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// File name of the frame with the given sequence number, e.g. `frame-00012.jpg`.
pub fn frame_file_name(sequence: u32) -> String {
    format!(
        "{FRAME_FILE_PREFIX}{sequence:0width$}.{FRAME_FILE_EXTENSION}",
        width = FRAME_NUMBER_WIDTH
    )
}

/// Parses the sequence number out of a frame file name.
pub fn parse_sequence(file_name: &str) -> Option<u32> {
    let stem = file_name.rsplit_once('.').map_or(file_name, |(stem, _)| stem);
    let digits = stem.strip_prefix(FRAME_FILE_PREFIX)?;
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    digits.parse().ok()
}

fn is_image_file(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| IMAGE_EXTENSIONS.contains(&ext.to_lowercase().as_str()))
        .unwrap_or(false)
}

/// All frames of one run, ordered by sequence number.
///
/// Invariant: sequence numbers are exactly `1..=len()`. Timestamps are derived
/// from the sequence number alone, so a set with gaps is never constructed.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct FrameSet {
    frames: Vec<SampledFrame>,
}

impl FrameSet {
    /// Builds a set from frames already in sampling order.
    pub fn new(frames: Vec<SampledFrame>) -> Result<Self, FrameSetError> {
        for (pos, frame) in frames.iter().enumerate() {
            let expected = pos as u32 + 1;
            if frame.sequence != expected {
                return Err(FrameSetError::Gap {
                    expected,
                    found: frame.sequence,
                });
            }
        }
        Ok(Self { frames })
    }

    /// Lists image files in `dir` and orders them by the number in their file name.
    ///
    /// Ordering is numeric, so it holds past the zero-padding width.
    pub fn from_dir(dir: &Path) -> Result<Self, FrameSetError> {
        let entries = fs::read_dir(dir).map_err(|source| FrameSetError::List {
            path: dir.to_path_buf(),
            source,
        })?;

        let mut paths = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|source| FrameSetError::List {
                path: dir.to_path_buf(),
                source,
            })?;
            let path = entry.path();
            if path.is_file() && is_image_file(&path) {
                paths.push(path);
            }
        }
        paths.sort();

        let mut frames = paths
            .into_iter()
            .map(|path| {
                let name = path
                    .file_name()
                    .map(|n| n.to_string_lossy().into_owned())
                    .unwrap_or_default();
                let sequence =
                    parse_sequence(&name).ok_or_else(|| FrameSetError::Unnumbered(name))?;
                Ok(SampledFrame::new(sequence, path))
            })
            .collect::<Result<Vec<_>, FrameSetError>>()?;
        frames.sort_by_key(SampledFrame::sequence);

        Self::new(frames)
    }

    pub fn frames(&self) -> &[SampledFrame] {
        &self.frames
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn touch(dir: &Path, name: &str) {
        fs::write(dir.join(name), b"").unwrap();
    }

    #[test]
    fn test_frame_file_name_is_zero_padded() {
        assert_eq!(frame_file_name(1), "frame-00001.jpg");
        assert_eq!(frame_file_name(123), "frame-00123.jpg");
    }

    #[rstest]
    #[case("frame-00001.jpg", Some(1))]
    #[case("frame-00420.jpg", Some(420))]
    #[case("frame-7.png", Some(7))]
    #[case("frame-.jpg", None)]
    #[case("frame-12a.jpg", None)]
    #[case("thumb-00001.jpg", None)]
    fn test_parse_sequence(#[case] name: &str, #[case] expected: Option<u32>) {
        assert_eq!(parse_sequence(name), expected);
    }

    #[test]
    fn test_frame_file_name_widens_past_padding() {
        assert_eq!(frame_file_name(100_000), "frame-100000.jpg");
        assert_eq!(parse_sequence("frame-100000.jpg"), Some(100_000));
    }

    #[test]
    fn test_padded_names_sort_numerically() {
        let mut names: Vec<String> = [10, 2, 100, 1].into_iter().map(frame_file_name).collect();
        names.sort();
        let parsed: Vec<u32> = names.iter().filter_map(|n| parse_sequence(n)).collect();
        assert_eq!(parsed, vec![1, 2, 10, 100]);
    }

    #[test]
    fn test_from_dir_orders_and_filters() {
        let dir = tempfile::tempdir().unwrap();
        for seq in [3, 1, 2] {
            touch(dir.path(), &frame_file_name(seq));
        }
        touch(dir.path(), "notes.txt");
        fs::create_dir(dir.path().join("nested.jpg")).unwrap();

        let set = FrameSet::from_dir(dir.path()).unwrap();

        let seqs: Vec<u32> = set.frames().iter().map(|f| f.sequence()).collect();
        assert_eq!(seqs, vec![1, 2, 3]);
        assert_eq!(set.frames()[0].path(), dir.path().join("frame-00001.jpg"));
    }

    #[test]
    fn test_from_dir_orders_numerically_past_padding_width() {
        let dir = tempfile::tempdir().unwrap();
        for seq in 1..=12 {
            touch(dir.path(), &format!("frame-{seq}.jpg"));
        }

        let set = FrameSet::from_dir(dir.path()).unwrap();

        let seqs: Vec<u32> = set.frames().iter().map(|f| f.sequence()).collect();
        assert_eq!(seqs, (1..=12).collect::<Vec<_>>());
    }

    #[test]
    fn test_from_dir_empty_is_valid() {
        let dir = tempfile::tempdir().unwrap();
        let set = FrameSet::from_dir(dir.path()).unwrap();
        assert!(set.is_empty());
        assert_eq!(set.len(), 0);
    }

    #[test]
    fn test_from_dir_rejects_gap() {
        let dir = tempfile::tempdir().unwrap();
        for seq in [1, 2, 4] {
            touch(dir.path(), &frame_file_name(seq));
        }

        let err = FrameSet::from_dir(dir.path()).unwrap_err();

        assert!(matches!(
            err,
            FrameSetError::Gap {
                expected: 3,
                found: 4
            }
        ));
    }

    #[test]
    fn test_from_dir_rejects_numbering_not_starting_at_one() {
        let dir = tempfile::tempdir().unwrap();
        touch(dir.path(), &frame_file_name(2));
        assert!(matches!(
            FrameSet::from_dir(dir.path()),
            Err(FrameSetError::Gap {
                expected: 1,
                found: 2
            })
        ));
    }

    #[test]
    fn test_from_dir_rejects_unnumbered_image() {
        let dir = tempfile::tempdir().unwrap();
        touch(dir.path(), &frame_file_name(1));
        touch(dir.path(), "poster.jpg");
        assert!(matches!(
            FrameSet::from_dir(dir.path()),
            Err(FrameSetError::Unnumbered(name)) if name == "poster.jpg"
        ));
    }

    #[test]
    fn test_from_dir_missing_directory() {
        let result = FrameSet::from_dir(Path::new("/nonexistent/frames"));
        assert!(matches!(result, Err(FrameSetError::List { .. })));
    }
}
