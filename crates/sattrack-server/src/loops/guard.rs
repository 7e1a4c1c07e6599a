//! Skip-if-running guard for periodic tasks.

use std::sync::atomic::{AtomicBool, Ordering};

/// Result of asking a guarded task to run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunOutcome {
    Completed,
    /// A previous run was still in flight
    Skipped,
}

#[derive(Debug, Default)]
pub struct TaskGuard {
    running: AtomicBool,
}

impl TaskGuard {
    pub fn new() -> Self {
        Self::default()
    }

    /// Claim the task. Returns `None` when a run is already in flight.
    pub fn try_start(&self) -> Option<TaskRun<'_>> {
        self.running
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| TaskRun { guard: self })
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }
}

/// Releases the guard on drop, including when the run panics or is cancelled.
#[must_use]
pub struct TaskRun<'a> {
    guard: &'a TaskGuard,
}

impl Drop for TaskRun<'_> {
    fn drop(&mut self) {
        self.guard.running.store(false, Ordering::Release);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn second_start_is_refused_until_first_finishes() {
        let guard = TaskGuard::new();
        let run = guard.try_start();
        assert!(run.is_some());
        assert!(guard.is_running());
        assert!(guard.try_start().is_none());

        drop(run);
        assert!(!guard.is_running());
        assert!(guard.try_start().is_some());
    }
}
