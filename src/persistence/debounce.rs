// SPDX-FileCopyrightText: 2025 Semiotic AI, Inc.
//
// SPDX-License-Identifier: Apache-2.0

//! Trailing-edge debouncer with a maximum wait

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tokio::time::{sleep_until, Instant};
use tokio_util::sync::CancellationToken;

/// Handle used to request a debounced run
///
/// Every [`request`](Self::request) restarts the quiet period. The action runs
/// once no request arrived for `debounce`, or once `max_wait` has elapsed
/// since the first pending request, whichever comes first. Requests made
/// while the action is running schedule another run.
///
/// Cancellation never interrupts a running action; awaiting the returned
/// handle waits for it to complete.
#[derive(Debug, Clone)]
pub struct Debouncer {
    notify: Arc<Notify>,
}

impl Debouncer {
    /// Spawns the debouncing task; it exits when `cancel` fires
    pub fn spawn<F, Fut>(
        debounce: Duration,
        max_wait: Duration,
        cancel: CancellationToken,
        action: F,
    ) -> (Self, JoinHandle<()>)
    where
        F: Fn() -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let notify = Arc::new(Notify::new());
        let signal = Arc::clone(&notify);

        let task = tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = cancel.cancelled() => return,
                    _ = signal.notified() => {}
                }

                let hard_deadline = Instant::now() + max_wait;
                loop {
                    let quiet_deadline = (Instant::now() + debounce).min(hard_deadline);
                    tokio::select! {
                        _ = cancel.cancelled() => return,
                        _ = signal.notified() => continue,
                        _ = sleep_until(quiet_deadline) => break,
                    }
                }

                action().await;
            }
        });

        (Self { notify }, task)
    }

    /// Restarts the quiet period
    pub fn request(&self) {
        // notify_one keeps a permit when the task is busy, so no request is lost
        self.notify.notify_one();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn counting(
        debounce: Duration,
        max_wait: Duration,
    ) -> (Debouncer, Arc<AtomicUsize>, CancellationToken) {
        let runs = Arc::new(AtomicUsize::new(0));
        let cancel = CancellationToken::new();
        let counter = Arc::clone(&runs);
        let (debouncer, _task) = Debouncer::spawn(debounce, max_wait, cancel.clone(), move || {
            let counter = Arc::clone(&counter);
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
            }
        });
        (debouncer, runs, cancel)
    }

    #[tokio::test(start_paused = true)]
    async fn test_coalesces_bursts() {
        let (debouncer, runs, _cancel) =
            counting(Duration::from_secs(5), Duration::from_secs(30));

        for _ in 0..3 {
            debouncer.request();
            tokio::time::sleep(Duration::from_secs(1)).await;
        }
        assert_eq!(runs.load(Ordering::SeqCst), 0);

        tokio::time::sleep(Duration::from_secs(5)).await;
        assert_eq!(runs.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_max_wait_bounds_delay() {
        let (debouncer, runs, _cancel) =
            counting(Duration::from_secs(5), Duration::from_secs(30));

        // a request every 2s would starve a pure trailing-edge debounce
        for _ in 0..16 {
            debouncer.request();
            tokio::time::sleep(Duration::from_secs(2)).await;
        }
        assert!(runs.load(Ordering::SeqCst) >= 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_stops_pending_run() {
        let (debouncer, runs, cancel) =
            counting(Duration::from_secs(5), Duration::from_secs(30));

        debouncer.request();
        tokio::time::sleep(Duration::from_secs(1)).await;
        cancel.cancel();
        tokio::time::sleep(Duration::from_secs(10)).await;

        assert_eq!(runs.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_waits_for_running_action() {
        let finished = Arc::new(AtomicUsize::new(0));
        let cancel = CancellationToken::new();
        let counter = Arc::clone(&finished);
        let (debouncer, task) = Debouncer::spawn(
            Duration::from_secs(1),
            Duration::from_secs(30),
            cancel.clone(),
            move || {
                let counter = Arc::clone(&counter);
                async move {
                    tokio::time::sleep(Duration::from_secs(10)).await;
                    counter.fetch_add(1, Ordering::SeqCst);
                }
            },
        );

        debouncer.request();
        // the action is now halfway through
        tokio::time::sleep(Duration::from_secs(6)).await;
        cancel.cancel();
        task.await.unwrap();

        assert_eq!(finished.load(Ordering::SeqCst), 1);
    }
}
