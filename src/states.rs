//! Lifecycle states and the cancellation signal shared with the generation activity.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Whether a generation activity exists and accepts new runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RunState {
    /// Never started.
    #[default]
    Idle,
    /// A streaming run is active.
    Running,
    /// Cancellation requested, waiting for the activity to release the sink.
    Stopping,
    /// The last run has ended; a new one may start.
    Stopped,
}

impl RunState {
    /// True when a new run may begin.
    pub fn accepts_start(self) -> bool {
        matches!(self, RunState::Idle | RunState::Stopped)
    }
}

/// One-shot cancellation signal, observed at block boundaries.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    cancelled: Arc<AtomicBool>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation. Further calls have no effect.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Release);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Acquire)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clones_share_the_signal() {
        let token = CancelToken::new();
        let observer = token.clone();
        assert!(!observer.is_cancelled());
        token.cancel();
        token.cancel();
        assert!(observer.is_cancelled());
    }

    #[test]
    fn only_idle_and_stopped_accept_start() {
        assert!(RunState::Idle.accepts_start());
        assert!(RunState::Stopped.accepts_start());
        assert!(!RunState::Running.accepts_start());
        assert!(!RunState::Stopping.accepts_start());
    }
}
