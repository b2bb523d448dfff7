use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::publishing::domain::frame_publisher::{FrameHandle, FramePublisher, PublishError};
use crate::shared::frame_set::SampledFrame;

/// Publishes files in place as `file://` URLs.
///
/// Nothing is copied: the matcher reads the files where extraction left
/// them. Every handle shares this publisher's liveness flag, so all of them
/// stop resolving at once on teardown.
pub struct LocalFilePublisher {
    live: Arc<AtomicBool>,
    published: usize,
}

impl LocalFilePublisher {
    pub fn new() -> Self {
        Self {
            live: Arc::new(AtomicBool::new(true)),
            published: 0,
        }
    }

    fn handle(&mut self, path: &Path, sequence: Option<u32>) -> Result<FrameHandle, PublishError> {
        if !self.live.load(Ordering::SeqCst) {
            return Err(PublishError::Expired(file_url(path)));
        }
        let path = path
            .canonicalize()
            .map_err(|_| PublishError::Missing(path.to_path_buf()))?;
        self.published += 1;
        Ok(FrameHandle::new(
            file_url(&path),
            path,
            sequence,
            self.live.clone(),
        ))
    }
}

impl Default for LocalFilePublisher {
    fn default() -> Self {
        Self::new()
    }
}

impl FramePublisher for LocalFilePublisher {
    fn publish_reference(&mut self, path: &Path) -> Result<FrameHandle, PublishError> {
        if !path.is_file() {
            return Err(PublishError::Missing(path.to_path_buf()));
        }
        // Header-only read: cheap, but catches missing or corrupt images before extraction.
        image::image_dimensions(path).map_err(|e| PublishError::Unreadable {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;
        self.handle(path, None)
    }

    fn publish_frame(&mut self, frame: &SampledFrame) -> Result<Option<FrameHandle>, PublishError> {
        if !frame.path().is_file() {
            log::debug!("Frame {} vanished before publishing", frame.path().display());
            return Ok(None);
        }
        self.handle(frame.path(), Some(frame.sequence())).map(Some)
    }

    fn teardown(&mut self) {
        if self.live.swap(false, Ordering::SeqCst) {
            log::debug!("Unpublished {} handles", self.published);
        }
    }
}

fn file_url(path: &Path) -> String {
    let display = path.to_string_lossy().replace('\\', "/");
    if display.starts_with('/') {
        format!("file://{display}")
    } else {
        format!("file:///{display}")
    }
}
