use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use crossbeam_channel::{Receiver, RecvTimeoutError, Sender};

/// Cloneable handle that lets any holder cancel a run.
///
/// Waiters block on a channel whose only sender is dropped on cancel, so a
/// pending wait wakes immediately instead of running out its timeout.
#[derive(Clone)]
pub struct CancellationToken {
    cancelled: Arc<AtomicBool>,
    trigger: Arc<Mutex<Option<Sender<()>>>>,
    signal: Receiver<()>,
}

impl CancellationToken {
    pub fn new() -> Self {
        let (tx, rx) = crossbeam_channel::bounded(0);
        Self {
            cancelled: Arc::new(AtomicBool::new(false)),
            trigger: Arc::new(Mutex::new(Some(tx))),
            signal: rx,
        }
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
        if let Ok(mut trigger) = self.trigger.lock() {
            trigger.take();
        }
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    /// Blocks for up to `timeout`. Returns `true` if cancelled before or during the wait.
    pub fn wait(&self, timeout: Duration) -> bool {
        if self.is_cancelled() {
            return true;
        }
        match self.signal.recv_timeout(timeout) {
            Err(RecvTimeoutError::Timeout) => self.is_cancelled(),
            Err(RecvTimeoutError::Disconnected) | Ok(()) => true,
        }
    }
}

impl Default for CancellationToken {
    fn default() -> Self {
        Self::new()
    }
}

/// Why a run stopped before completing.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Interrupt {
    Cancelled,
    TimedOut(Duration),
}

/// Cancellation plus the run-level deadline, consulted at every suspension point.
#[derive(Clone)]
pub struct RunControl {
    token: CancellationToken,
    budget: Option<Duration>,
    deadline: Option<Instant>,
}

impl RunControl {
    pub fn new(token: CancellationToken, budget: Option<Duration>) -> Self {
        Self {
            deadline: budget.map(|b| Instant::now() + b),
            token,
            budget,
        }
    }

    /// A control that is never cancelled and has no deadline.
    pub fn unbounded() -> Self {
        Self::new(CancellationToken::new(), None)
    }

    pub fn token(&self) -> &CancellationToken {
        &self.token
    }

    /// Fails if the run was cancelled or its deadline has passed.
    pub fn checkpoint(&self) -> Result<(), Interrupt> {
        if self.token.is_cancelled() {
            return Err(Interrupt::Cancelled);
        }
        if let (Some(deadline), Some(budget)) = (self.deadline, self.budget) {
            if Instant::now() >= deadline {
                return Err(Interrupt::TimedOut(budget));
            }
        }
        Ok(())
    }

    /// Waits for `duration`, waking early on cancellation or at the deadline.
    pub fn pause(&self, duration: Duration) -> Result<(), Interrupt> {
        self.checkpoint()?;
        let wait = match self.deadline {
            Some(deadline) => duration.min(deadline.saturating_duration_since(Instant::now())),
            None => duration,
        };
        if self.token.wait(wait) {
            return Err(Interrupt::Cancelled);
        }
        self.checkpoint()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_token_is_not_cancelled() {
        let token = CancellationToken::new();
        assert!(!token.is_cancelled());
    }

    #[test]
    fn test_cancel_is_visible_through_clones() {
        let token = CancellationToken::new();
        let clone = token.clone();
        clone.cancel();
        assert!(token.is_cancelled());
    }

    #[test]
    fn test_cancel_twice_is_harmless() {
        let token = CancellationToken::new();
        token.cancel();
        token.cancel();
        assert!(token.is_cancelled());
    }

    #[test]
    fn test_wait_times_out_without_cancel() {
        let token = CancellationToken::new();
        assert!(!token.wait(Duration::from_millis(5)));
    }

    #[test]
    fn test_wait_wakes_early_on_cancel() {
        let token = CancellationToken::new();
        let remote = token.clone();
        let handle = std::thread::spawn(move || {
            std::thread::sleep(Duration::from_millis(20));
            remote.cancel();
        });

        let start = Instant::now();
        assert!(token.wait(Duration::from_secs(10)));
        assert!(start.elapsed() < Duration::from_secs(5));
        handle.join().unwrap();
    }

    #[test]
    fn test_checkpoint_reports_cancel() {
        let control = RunControl::new(CancellationToken::new(), None);
        assert_eq!(control.checkpoint(), Ok(()));
        control.token().cancel();
        assert_eq!(control.checkpoint(), Err(Interrupt::Cancelled));
    }

    #[test]
    fn test_checkpoint_reports_expired_deadline() {
        let control = RunControl::new(CancellationToken::new(), Some(Duration::ZERO));
        assert_eq!(
            control.checkpoint(),
            Err(Interrupt::TimedOut(Duration::ZERO))
        );
    }

    #[test]
    fn test_pause_is_bounded_by_deadline() {
        let budget = Duration::from_millis(30);
        let control = RunControl::new(CancellationToken::new(), Some(budget));

        let start = Instant::now();
        let result = control.pause(Duration::from_secs(10));

        assert_eq!(result, Err(Interrupt::TimedOut(budget)));
        assert!(start.elapsed() < Duration::from_secs(5));
    }

    #[test]
    fn test_unbounded_pause_completes() {
        let control = RunControl::unbounded();
        assert_eq!(control.pause(Duration::from_millis(1)), Ok(()));
    }
}
