//! Progress events and cooperative cancellation.
//!
//! Every long-running operation reports one [`Progress`] event per unit of
//! work (chunk, message, group or file) to a [`ProgressSink`], and polls a
//! [`CancelToken`] at the same granularity.

use std::cell::RefCell;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::error::{MboxError, Result};

/// A single progress event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Progress {
    /// Units of work completed so far.
    pub completed: usize,
    /// Total units of work in this operation.
    pub total: usize,
    /// Human-readable status line.
    pub status: String,
}

impl Progress {
    pub fn new(completed: usize, total: usize, status: impl Into<String>) -> Self {
        Self {
            completed,
            total,
            status: status.into(),
        }
    }

    /// Completion as a fraction in `[0, 1]`. An empty operation counts as done.
    pub fn fraction(&self) -> f64 {
        if self.total == 0 {
            return 1.0;
        }
        (self.completed as f64 / self.total as f64).clamp(0.0, 1.0)
    }
}

/// Receiver of progress events.
///
/// Called synchronously on the thread running the operation; marshalling to
/// a UI thread is the implementor's job.
pub trait ProgressSink {
    fn report(&self, progress: &Progress);
}

impl<F> ProgressSink for F
where
    F: Fn(&Progress),
{
    fn report(&self, progress: &Progress) {
        self(progress)
    }
}

/// Sink that discards every event.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoProgress;

impl ProgressSink for NoProgress {
    fn report(&self, _progress: &Progress) {}
}

/// Sink that records every event so it can be replayed afterwards.
#[derive(Debug, Default)]
pub struct ProgressLog {
    events: RefCell<Vec<Progress>>,
}

impl ProgressLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of the events recorded so far, in order.
    pub fn events(&self) -> Vec<Progress> {
        self.events.borrow().clone()
    }

    /// The most recent event.
    pub fn last(&self) -> Option<Progress> {
        self.events.borrow().last().cloned()
    }

    pub fn len(&self) -> usize {
        self.events.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.borrow().is_empty()
    }

    /// Forward every recorded event to another sink.
    pub fn replay(&self, sink: &dyn ProgressSink) {
        for event in self.events.borrow().iter() {
            sink.report(event);
        }
    }
}

impl ProgressSink for ProgressLog {
    fn report(&self, progress: &Progress) {
        self.events.borrow_mut().push(progress.clone());
    }
}

/// Shared cancellation flag.
///
/// Clones observe the same flag, so a token handed to another thread (or to a
/// progress callback) can stop the operation that owns the original.
#[derive(Debug, Default, Clone)]
pub struct CancelToken {
    flag: Arc<AtomicBool>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation. Idempotent.
    pub fn cancel(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }

    /// Return [`MboxError::Cancelled`] once cancellation has been requested.
    pub fn check(&self) -> Result<()> {
        if self.is_cancelled() {
            Err(MboxError::Cancelled)
        } else {
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fraction_bounds() {
        assert_eq!(Progress::new(0, 4, "").fraction(), 0.0);
        assert_eq!(Progress::new(2, 4, "").fraction(), 0.5);
        assert_eq!(Progress::new(4, 4, "").fraction(), 1.0);
        assert_eq!(Progress::new(0, 0, "").fraction(), 1.0);
    }

    #[test]
    fn test_progress_log_records_and_replays() {
        let log = ProgressLog::new();
        log.report(&Progress::new(1, 2, "one"));
        log.report(&Progress::new(2, 2, "two"));
        assert_eq!(log.len(), 2);
        assert_eq!(log.last().map(|p| p.status), Some("two".to_string()));

        let replayed = ProgressLog::new();
        log.replay(&replayed);
        assert_eq!(replayed.events(), log.events());
    }

    #[test]
    fn test_closure_sink() {
        let seen = RefCell::new(0usize);
        let sink = |p: &Progress| *seen.borrow_mut() += p.completed;
        sink.report(&Progress::new(3, 3, ""));
        assert_eq!(*seen.borrow(), 3);
    }

    #[test]
    fn test_cancel_token_shared_between_clones() {
        let token = CancelToken::new();
        let other = token.clone();
        assert!(token.check().is_ok());
        other.cancel();
        assert!(token.is_cancelled());
        assert!(matches!(token.check(), Err(MboxError::Cancelled)));
    }
}
