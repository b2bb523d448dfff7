use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use thiserror::Error;

use crate::shared::frame_set::SampledFrame;

#[derive(Error, Debug)]
pub enum PublishError {
    #[error("file not found: {0}")]
    Missing(PathBuf),
    #[error("not a readable image: {path}: {reason}")]
    Unreadable { path: PathBuf, reason: String },
    #[error("handle {0} is no longer published")]
    Expired(String),
}

/// Address of a published file, valid until its publisher is torn down.
///
/// Handles are passed to the matcher by reference; the matcher resolves them
/// to a local path rather than receiving pixel data.
#[derive(Clone, Debug)]
pub struct FrameHandle {
    url: String,
    path: PathBuf,
    sequence: Option<u32>,
    live: Arc<AtomicBool>,
}

impl FrameHandle {
    pub fn new(url: String, path: PathBuf, sequence: Option<u32>, live: Arc<AtomicBool>) -> Self {
        Self {
            url,
            path,
            sequence,
            live,
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// Frame sequence number, or `None` for the reference image.
    pub fn sequence(&self) -> Option<u32> {
        self.sequence
    }

    pub fn is_live(&self) -> bool {
        self.live.load(Ordering::SeqCst)
    }

    /// Local path behind the handle, or `Expired` once the publisher is torn down.
    pub fn resolve(&self) -> Result<&Path, PublishError> {
        if self.is_live() {
            Ok(&self.path)
        } else {
            Err(PublishError::Expired(self.url.clone()))
        }
    }
}

impl PartialEq for FrameHandle {
    fn eq(&self, other: &Self) -> bool {
        self.url == other.url && self.sequence == other.sequence
    }
}

/// Makes the reference image and sampled frames addressable by the matcher.
///
/// One publisher serves exactly one run; handles never outlive `teardown`.
pub trait FramePublisher: Send {
    /// Publishes the reference image. Fails if it is missing or not an image.
    fn publish_reference(&mut self, path: &Path) -> Result<FrameHandle, PublishError>;

    /// Publishes one sampled frame. Returns `None` if its file no longer exists.
    fn publish_frame(&mut self, frame: &SampledFrame) -> Result<Option<FrameHandle>, PublishError>;

    /// Invalidates every handle issued by this publisher. Idempotent.
    fn teardown(&mut self);
}
