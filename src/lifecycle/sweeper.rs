//! Cancellable periodic background tasks.
//!
//! Each limiter gets its own sweep task. The task holds only a `Weak`
//! reference, so it ends when the limiter is dropped, when shutdown is
//! triggered, or when its `SweepHandle` is dropped.

use std::future::Future;
use std::ops::ControlFlow;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio::time::{self, MissedTickBehavior};

/// State that must be pruned periodically to bound memory.
pub trait Sweep: Send + Sync + 'static {
    /// Label used in logs.
    fn name(&self) -> &'static str;

    /// Drop expired state. Returns the number of entries removed.
    fn sweep(&self) -> usize;
}

/// Owns a running periodic task. Dropping the handle stops the task.
#[derive(Debug)]
pub struct SweepHandle {
    name: &'static str,
    task: JoinHandle<()>,
}

impl SweepHandle {
    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }
}

impl Drop for SweepHandle {
    fn drop(&mut self) {
        self.task.abort();
    }
}

/// Run `tick` every `interval` until it breaks or shutdown is signalled.
/// The first run happens one interval after spawning.
pub fn spawn_periodic<F, Fut>(
    name: &'static str,
    interval: Duration,
    mut shutdown: broadcast::Receiver<()>,
    mut tick: F,
) -> SweepHandle
where
    F: FnMut() -> Fut + Send + 'static,
    Fut: Future<Output = ControlFlow<()>> + Send,
{
    let start = time::Instant::now() + interval;
    let task = tokio::spawn(async move {
        let mut ticker = time::interval_at(start, interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    if tick().await.is_break() {
                        tracing::debug!(task = name, "Periodic task owner dropped, exiting");
                        break;
                    }
                }
                _ = shutdown.recv() => {
                    tracing::debug!(task = name, "Periodic task received shutdown signal, exiting");
                    break;
                }
            }
        }
    });

    SweepHandle { name, task }
}

/// Sweep `target` every `interval`.
pub fn spawn_sweeper<S>(
    target: &Arc<S>,
    interval: Duration,
    shutdown: broadcast::Receiver<()>,
) -> SweepHandle
where
    S: Sweep + ?Sized,
{
    let weak = Arc::downgrade(target);
    let name = target.name();
    spawn_periodic(name, interval, shutdown, move || {
        let target = weak.upgrade();
        async move {
            let Some(target) = target else {
                return ControlFlow::Break(());
            };
            let removed = target.sweep();
            if removed > 0 {
                tracing::debug!(sweeper = name, removed, "Sweep pass");
            }
            ControlFlow::Continue(())
        }
    })
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;
    use crate::lifecycle::Shutdown;

    #[derive(Default)]
    struct Counter {
        passes: AtomicUsize,
    }

    impl Sweep for Counter {
        fn name(&self) -> &'static str {
            "counter"
        }

        fn sweep(&self) -> usize {
            self.passes.fetch_add(1, Ordering::SeqCst);
            0
        }
    }

    async fn settle() {
        for _ in 0..5 {
            tokio::task::yield_now().await;
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_sweeps_on_interval() {
        let shutdown = Shutdown::new();
        let counter = Arc::new(Counter::default());
        let _handle = spawn_sweeper(&counter, Duration::from_secs(60), shutdown.subscribe());

        settle().await;
        assert_eq!(counter.passes.load(Ordering::SeqCst), 0);

        tokio::time::advance(Duration::from_secs(60)).await;
        settle().await;
        assert_eq!(counter.passes.load(Ordering::SeqCst), 1);

        tokio::time::advance(Duration::from_secs(120)).await;
        settle().await;
        assert!(counter.passes.load(Ordering::SeqCst) >= 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_first_pass_anchored_at_spawn() {
        let shutdown = Shutdown::new();
        let counter = Arc::new(Counter::default());
        let _handle = spawn_sweeper(&counter, Duration::from_secs(60), shutdown.subscribe());

        // No poll before the clock moves.
        tokio::time::advance(Duration::from_secs(60)).await;
        settle().await;
        assert_eq!(counter.passes.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stops_on_shutdown() {
        let shutdown = Shutdown::new();
        let counter = Arc::new(Counter::default());
        let handle = spawn_sweeper(&counter, Duration::from_secs(1), shutdown.subscribe());

        shutdown.trigger();
        settle().await;
        assert!(handle.is_finished());
    }

    #[tokio::test(start_paused = true)]
    async fn test_stops_when_owner_dropped() {
        let shutdown = Shutdown::new();
        let counter = Arc::new(Counter::default());
        let handle = spawn_sweeper(&counter, Duration::from_secs(1), shutdown.subscribe());
        drop(counter);

        tokio::time::advance(Duration::from_secs(1)).await;
        settle().await;
        assert!(handle.is_finished());
        assert_eq!(handle.name(), "counter");
    }

    #[tokio::test(start_paused = true)]
    async fn test_dropping_handle_stops_task() {
        let shutdown = Shutdown::new();
        let counter = Arc::new(Counter::default());
        drop(spawn_sweeper(&counter, Duration::from_secs(1), shutdown.subscribe()));
        settle().await;

        tokio::time::advance(Duration::from_secs(5)).await;
        settle().await;
        assert_eq!(counter.passes.load(Ordering::SeqCst), 0);
        // The aborted task released its receiver.
        assert_eq!(shutdown.receiver_count(), 0);
    }
}
