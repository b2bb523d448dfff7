use std::path::{Path, PathBuf};

use tempfile::TempDir;

use crate::matching::domain::face_matcher::FaceMatcher;
use crate::pipeline::locate_error::LocateError;
use crate::publishing::domain::frame_publisher::FramePublisher;
use crate::shared::constants::WORK_AREA_PREFIX;

/// Everything one run owns and must release: its private work area, its
/// publisher and its matcher session.
///
/// The work area is created on first use, so a run rejected up front leaves
/// nothing on disk. `teardown` releases everything exactly once; dropping
/// the context tears down if that has not happened yet.
pub struct RunContext {
    work_root: Option<PathBuf>,
    work_area: Option<TempDir>,
    publisher: Box<dyn FramePublisher>,
    matcher: Box<dyn FaceMatcher>,
    matcher_open: bool,
    torn_down: bool,
}

impl RunContext {
    /// `work_root` is where the work area will live (system temp dir if `None`).
    pub fn new(
        work_root: Option<&Path>,
        publisher: Box<dyn FramePublisher>,
        matcher: Box<dyn FaceMatcher>,
    ) -> Self {
        Self {
            work_root: work_root.map(Path::to_path_buf),
            work_area: None,
            publisher,
            matcher,
            matcher_open: false,
            torn_down: false,
        }
    }

    /// The run's private work area, created on the first call.
    pub fn work_area(&mut self) -> Result<&Path, LocateError> {
        if self.torn_down {
            return Err(LocateError::ExtractionFailed(
                "work area requested after teardown".into(),
            ));
        }
        if self.work_area.is_none() {
            let mut builder = tempfile::Builder::new();
            builder.prefix(WORK_AREA_PREFIX);
            let area = match &self.work_root {
                Some(root) => builder.tempdir_in(root),
                None => builder.tempdir(),
            }
            .map_err(|e| LocateError::ExtractionFailed(format!("cannot create work area: {e}")))?;
            log::debug!("Work area {}", area.path().display());
            self.work_area = Some(area);
        }
        match &self.work_area {
            Some(area) => Ok(area.path()),
            None => Err(LocateError::ExtractionFailed("work area unavailable".into())),
        }
    }

    /// Directory the sampled frames are written to.
    pub fn frames_dir(&mut self) -> Result<PathBuf, LocateError> {
        Ok(self.work_area()?.join("frames"))
    }

    pub fn publisher(&mut self) -> &mut dyn FramePublisher {
        self.publisher.as_mut()
    }

    /// Opens the matcher session; closed again at teardown.
    pub fn open_matcher(&mut self) -> Result<&mut dyn FaceMatcher, LocateError> {
        if !self.matcher_open {
            self.matcher
                .open()
                .map_err(|e| LocateError::MatchingFailed(format!("cannot open matcher: {e}")))?;
            self.matcher_open = true;
        }
        Ok(self.matcher.as_mut())
    }

    pub fn is_torn_down(&self) -> bool {
        self.torn_down
    }

    /// Closes the matcher, unpublishes every handle and removes the work
    /// area. Failures are logged and never replace the run's own result.
    pub fn teardown(&mut self) {
        if self.torn_down {
            return;
        }
        self.torn_down = true;

        if self.matcher_open {
            self.matcher.close();
            self.matcher_open = false;
        }
        self.publisher.teardown();

        if let Some(area) = self.work_area.take() {
            let path = area.path().to_path_buf();
            if let Err(e) = area.close() {
                log::warn!("Failed to remove work area {}: {e}", path.display());
            }
        }
        log::debug!("Run torn down");
    }
}

impl Drop for RunContext {
    fn drop(&mut self) {
        self.teardown();
    }
}
