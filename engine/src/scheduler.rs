//! Periodic task runner.
//!
//! Each task is a tokio task looping over an interval. The first run happens
//! one full period after spawning. A run is never interrupted: cancellation
//! is observed between runs, so a sync pass in flight finishes before its
//! task stops. Runs of the same task never overlap; when a run takes longer
//! than the period, the next one starts as soon as it returns.
//!
//! Tests drive these tasks with tokio's paused clock instead of real time.

use std::future::Future;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};

/// Handle to a running periodic task.
#[derive(Debug)]
pub struct PeriodicTask {
    name: &'static str,
    stop: watch::Sender<bool>,
    handle: JoinHandle<()>,
}

impl PeriodicTask {
    /// Start running `job` every `period`.
    ///
    /// Must be called from within a tokio runtime.
    pub fn spawn<F, Fut>(name: &'static str, period: Duration, mut job: F) -> Self
    where
        F: FnMut() -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let period = period.max(Duration::from_millis(1));
        let (stop, mut stopped) = watch::channel(false);

        let handle = tokio::spawn(async move {
            let mut ticker = interval_at(Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    _ = stopped.changed() => break,
                    _ = ticker.tick() => {
                        tracing::trace!(task = name, "Periodic task tick");
                        job().await;
                    }
                }
            }
            tracing::debug!(task = name, "Periodic task stopped");
        });

        tracing::debug!(task = name, period_ms = period.as_millis() as u64, "Periodic task started");
        Self { name, stop, handle }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }

    /// Stop the task, waiting for a run in progress to finish.
    pub async fn cancel(self) {
        let _ = self.stop.send(true);
        if let Err(e) = self.handle.await {
            tracing::warn!(task = self.name, error = %e, "Periodic task ended abnormally");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    fn counting_task(period: Duration) -> (Arc<AtomicUsize>, PeriodicTask) {
        let count = Arc::new(AtomicUsize::new(0));
        let counter = count.clone();
        let task = PeriodicTask::spawn("count", period, move || {
            let counter = counter.clone();
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
            }
        });
        (count, task)
    }

    #[tokio::test(start_paused = true)]
    async fn first_run_after_one_period() {
        let (count, task) = counting_task(Duration::from_secs(60));

        tokio::time::sleep(Duration::from_secs(59)).await;
        assert_eq!(count.load(Ordering::SeqCst), 0);

        tokio::time::sleep(Duration::from_secs(2)).await;
        assert_eq!(count.load(Ordering::SeqCst), 1);

        task.cancel().await;
    }

    #[tokio::test(start_paused = true)]
    async fn runs_every_period() {
        let (count, task) = counting_task(Duration::from_secs(300));

        tokio::time::sleep(Duration::from_secs(300 * 3 + 150)).await;
        assert_eq!(count.load(Ordering::SeqCst), 3);

        task.cancel().await;
    }

    #[tokio::test(start_paused = true)]
    async fn cancel_stops_runs() {
        let (count, task) = counting_task(Duration::from_secs(10));
        tokio::time::sleep(Duration::from_secs(15)).await;
        assert_eq!(count.load(Ordering::SeqCst), 1);

        task.cancel().await;
        tokio::time::sleep(Duration::from_secs(100)).await;
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn slow_runs_do_not_overlap() {
        let running = Arc::new(AtomicUsize::new(0));
        let max_seen = Arc::new(AtomicUsize::new(0));
        let (r, m) = (running.clone(), max_seen.clone());

        let task = PeriodicTask::spawn("slow", Duration::from_secs(1), move || {
            let (r, m) = (r.clone(), m.clone());
            async move {
                let now_running = r.fetch_add(1, Ordering::SeqCst) + 1;
                m.fetch_max(now_running, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_secs(3)).await;
                r.fetch_sub(1, Ordering::SeqCst);
            }
        });

        tokio::time::sleep(Duration::from_secs(20)).await;
        assert_eq!(max_seen.load(Ordering::SeqCst), 1);
        task.cancel().await;
    }

    #[tokio::test(start_paused = true)]
    async fn zero_period_does_not_panic() {
        let (count, task) = counting_task(Duration::ZERO);
        tokio::time::sleep(Duration::from_millis(5)).await;
        assert!(count.load(Ordering::SeqCst) >= 1);
        assert_eq!(task.name(), "count");
        assert!(!task.is_finished());
        task.cancel().await;
    }
}
