//! Background loops: fleet refresh, proximity evaluation and alert log
//! persistence.

use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::Instant;

pub mod alert_persist_loop;
pub mod guard;
pub mod proximity_loop;
pub mod refresh_loop;

pub use guard::{RunOutcome, TaskGuard};

/// Wait for loops to finish after shutdown was signalled, in order, all
/// within one `limit`. Loops still running at the deadline are aborted.
/// Returns how many finished on their own.
pub async fn join_loops(handles: Vec<(&'static str, JoinHandle<()>)>, limit: Duration) -> usize {
    let deadline = Instant::now() + limit;
    let mut finished = 0;
    for (name, mut handle) in handles {
        match tokio::time::timeout_at(deadline, &mut handle).await {
            Ok(Ok(())) => finished += 1,
            Ok(Err(err)) => tracing::error!("{} loop failed: {}", name, err),
            Err(_) => {
                tracing::warn!("{} loop did not stop within {:?}; aborting", name, limit);
                handle.abort();
            }
        }
    }
    finished
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;

    #[tokio::test(start_paused = true)]
    async fn waits_for_loops_that_finish_in_time() {
        let done = Arc::new(AtomicBool::new(false));
        let flag = done.clone();
        let handle = tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(500)).await;
            flag.store(true, Ordering::SeqCst);
        });

        let finished = join_loops(vec![("slow", handle)], Duration::from_secs(5)).await;
        assert_eq!(finished, 1);
        assert!(done.load(Ordering::SeqCst));
    }

    #[tokio::test(start_paused = true)]
    async fn stuck_loops_are_abandoned_at_the_deadline() {
        let stuck = tokio::spawn(std::future::pending::<()>());
        let quick = tokio::spawn(async {});

        let started = Instant::now();
        let finished = join_loops(
            vec![("stuck", stuck), ("quick", quick)],
            Duration::from_secs(2),
        )
        .await;
        assert_eq!(finished, 1);
        assert!(started.elapsed() <= Duration::from_secs(3));
    }
}
