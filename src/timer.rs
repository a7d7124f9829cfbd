//! Cancellable scheduled tasks.
//!
//! A [`Scheduler`] spawns delayed and periodic callbacks as tokio tasks. It
//! uses the runtime it was given (or the one current when the sink was
//! built); without one it starts a single-worker runtime of its own the first
//! time a task is scheduled.
//!
//! Cancelling a [`ScheduledTask`] aborts it and returns immediately. A
//! callback already running is not interrupted.

use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use tokio::runtime::{Builder, Handle, Runtime};
use tokio::task::JoinHandle;
use tokio::time::{self, Instant, MissedTickBehavior};

/// Handle to a pending one-shot or repeating task.
#[derive(Debug)]
pub struct ScheduledTask {
    handle: JoinHandle<()>,
}

impl ScheduledTask {
    /// Stop the task. Safe to call repeatedly, and from inside the task.
    pub fn cancel(&self) {
        self.handle.abort();
    }

    pub fn is_active(&self) -> bool {
        !self.handle.is_finished()
    }
}

impl Drop for ScheduledTask {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

/// Spawns [`ScheduledTask`]s on a tokio runtime.
#[derive(Debug)]
pub struct Scheduler {
    handle: Mutex<Option<Handle>>,
    owned: Mutex<Option<Runtime>>,
}

impl Scheduler {
    /// Schedule on `handle`, or on a private runtime when `None`.
    pub fn new(handle: Option<Handle>) -> Self {
        Self {
            handle: Mutex::new(handle),
            owned: Mutex::new(None),
        }
    }

    /// Run `task` once after `delay`. `None` when no runtime could be started.
    pub fn once<F>(&self, delay: Duration, task: F) -> Option<ScheduledTask>
    where
        F: FnOnce() + Send + 'static,
    {
        let handle = self.handle()?.spawn(async move {
            time::sleep(delay).await;
            task();
        });
        Some(ScheduledTask { handle })
    }

    /// Run `task` every `period` until it returns `false` or the task is
    /// cancelled. The first run happens one period from now.
    pub fn repeating<F>(&self, period: Duration, mut task: F) -> Option<ScheduledTask>
    where
        F: FnMut() -> bool + Send + 'static,
    {
        let handle = self.handle()?.spawn(async move {
            let mut ticker = time::interval_at(Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                if !task() {
                    break;
                }
            }
        });
        Some(ScheduledTask { handle })
    }

    fn handle(&self) -> Option<Handle> {
        let mut slot = lock(&self.handle);
        if let Some(handle) = slot.as_ref() {
            return Some(handle.clone());
        }
        match Builder::new_multi_thread()
            .worker_threads(1)
            .thread_name("logpane-timer")
            .enable_time()
            .build()
        {
            Ok(runtime) => {
                let handle = runtime.handle().clone();
                *lock(&self.owned) = Some(runtime);
                *slot = Some(handle.clone());
                tracing::debug!("started private timer runtime");
                Some(handle)
            }
            Err(err) => {
                tracing::warn!(%err, "timer runtime unavailable, task not scheduled");
                None
            }
        }
    }
}

impl Drop for Scheduler {
    fn drop(&mut self) {
        // May run on the runtime's own worker, where a blocking drop panics.
        if let Some(runtime) = lock(&self.owned).take() {
            runtime.shutdown_background();
        }
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|e| e.into_inner())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn counter() -> (Arc<AtomicUsize>, Arc<AtomicUsize>) {
        let hits = Arc::new(AtomicUsize::new(0));
        (Arc::clone(&hits), hits)
    }

    #[tokio::test(start_paused = true)]
    async fn test_once_runs_after_delay() {
        let scheduler = Scheduler::new(Some(Handle::current()));
        let (hits, counter) = counter();
        let task = scheduler
            .once(Duration::from_millis(100), move || {
                counter.fetch_add(1, Ordering::SeqCst);
            })
            .unwrap();

        time::sleep(Duration::from_millis(99)).await;
        assert_eq!(hits.load(Ordering::SeqCst), 0);
        time::sleep(Duration::from_millis(2)).await;
        assert_eq!(hits.load(Ordering::SeqCst), 1);
        assert!(!task.is_active());
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_before_delay_prevents_run() {
        let scheduler = Scheduler::new(Some(Handle::current()));
        let (hits, counter) = counter();
        let task = scheduler
            .once(Duration::from_secs(5), move || {
                counter.fetch_add(1, Ordering::SeqCst);
            })
            .unwrap();
        task.cancel();
        task.cancel();
        time::sleep(Duration::from_secs(10)).await;
        assert_eq!(hits.load(Ordering::SeqCst), 0);
        assert!(!task.is_active());
    }

    #[tokio::test(start_paused = true)]
    async fn test_repeating_stops_when_callback_returns_false() {
        let scheduler = Scheduler::new(Some(Handle::current()));
        let (hits, counter) = counter();
        let _task = scheduler
            .repeating(Duration::from_millis(5), move || {
                counter.fetch_add(1, Ordering::SeqCst) + 1 < 3
            })
            .unwrap();
        time::sleep(Duration::from_millis(100)).await;
        assert_eq!(hits.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_dropping_task_cancels_it() {
        let scheduler = Scheduler::new(Some(Handle::current()));
        let (hits, counter) = counter();
        drop(scheduler.repeating(Duration::from_millis(5), move || {
            counter.fetch_add(1, Ordering::SeqCst);
            true
        }));
        time::sleep(Duration::from_millis(50)).await;
        assert_eq!(hits.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_private_runtime_without_ambient_one() {
        let scheduler = Scheduler::new(None);
        let (hits, counter) = counter();
        let (done_tx, done_rx) = std::sync::mpsc::channel();
        let _task = scheduler
            .once(Duration::from_millis(1), move || {
                counter.fetch_add(1, Ordering::SeqCst);
                let _ = done_tx.send(());
            })
            .unwrap();
        done_rx.recv_timeout(Duration::from_secs(10)).unwrap();
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }
}
