use crate::publishing::domain::frame_publisher::FrameHandle;
use crate::shared::cancellation::RunControl;

/// Distance between the reference face and the closest face in one frame.
#[derive(Clone, Debug, PartialEq)]
pub struct FrameDistance {
    pub frame: FrameHandle,
    pub distance: f64,
}

/// Domain interface for the face matching capability.
///
/// Implementations are stateful (loaded models, cached reference
/// descriptor) and must not be called concurrently, hence `&mut self`.
/// `open`/`close` bracket one matching session.
///
/// Long-running calls poll `control` and give up with an error once the run
/// is cancelled or past its deadline.
pub trait FaceMatcher: Send {
    fn open(&mut self) -> Result<(), Box<dyn std::error::Error>>;

    /// Pays one-time setup cost for `reference` before any batch is timed.
    fn warm_up(
        &mut self,
        reference: &FrameHandle,
        control: &RunControl,
    ) -> Result<(), Box<dyn std::error::Error>>;

    /// Scores every frame in `frames` against `reference`.
    ///
    /// Frames without a detectable face are left out of the result.
    fn match_batch(
        &mut self,
        reference: &FrameHandle,
        frames: &[FrameHandle],
        control: &RunControl,
    ) -> Result<Vec<FrameDistance>, Box<dyn std::error::Error>>;

    /// Releases the session. Must be safe to call more than once.
    fn close(&mut self);
}
