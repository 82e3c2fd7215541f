//! Best-effort notification facade.
//!
//! Callers enqueue and move on. A single worker drains the queue and fans out
//! to the sink with bounded concurrency. Nothing here is ever reported back to
//! the caller: a full queue, a failing sink, or a slow sink all end in a
//! dropped message, a `warn` log line, and a counter increment.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::{Semaphore, mpsc};
use tokio::task::{JoinHandle, JoinSet};

use crate::services::notifier::{Notification, Notifier};

/// Tuning for the notification queue.
#[derive(Debug, Clone, Copy)]
pub struct NotifyConfig {
    pub queue_capacity: usize,
    pub max_in_flight: usize,
    pub send_timeout: Duration,
}

impl Default for NotifyConfig {
    fn default() -> Self {
        Self {
            queue_capacity: 256,
            max_in_flight: 8,
            send_timeout: Duration::from_secs(3),
        }
    }
}

#[derive(Debug, Default)]
struct Stats {
    sent: AtomicU64,
    dropped: AtomicU64,
}

/// Delivery counters since startup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NotifyStats {
    pub sent: u64,
    pub dropped: u64,
}

/// Handle for enqueueing notifications. Cheap to clone.
#[derive(Clone)]
pub struct NotificationFacade {
    sender: Arc<Mutex<Option<mpsc::Sender<Notification>>>>,
    worker: Arc<tokio::sync::Mutex<Option<JoinHandle<()>>>>,
    stats: Arc<Stats>,
}

impl NotificationFacade {
    /// Starts the background worker. Must be called inside a tokio runtime.
    pub fn spawn(notifier: Arc<dyn Notifier>, config: NotifyConfig) -> Self {
        let (tx, rx) = mpsc::channel(config.queue_capacity.max(1));
        let stats = Arc::new(Stats::default());
        let worker = tokio::spawn(run_worker(rx, notifier, config, stats.clone()));

        Self {
            sender: Arc::new(Mutex::new(Some(tx))),
            worker: Arc::new(tokio::sync::Mutex::new(Some(worker))),
            stats,
        }
    }

    /// Enqueues a notification without waiting. Never fails.
    pub fn notify(&self, notification: Notification) {
        let sender = match self.sender.lock() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        };

        let Some(sender) = sender else {
            self.record_drop(&notification, "closed");
            return;
        };

        if let Err(err) = sender.try_send(notification) {
            let (notification, reason) = match err {
                mpsc::error::TrySendError::Full(n) => (n, "queue_full"),
                mpsc::error::TrySendError::Closed(n) => (n, "closed"),
            };
            self.record_drop(&notification, reason);
        }
    }

    /// Stops accepting messages and waits for queued ones to finish.
    pub async fn close(&self) {
        match self.sender.lock() {
            Ok(mut guard) => guard.take(),
            Err(poisoned) => poisoned.into_inner().take(),
        };

        let worker = self.worker.lock().await.take();
        if let Some(worker) = worker {
            if let Err(e) = worker.await {
                tracing::warn!(error = %e, "notification worker ended abnormally");
            }
        }
    }

    pub fn stats(&self) -> NotifyStats {
        NotifyStats {
            sent: self.stats.sent.load(Ordering::Relaxed),
            dropped: self.stats.dropped.load(Ordering::Relaxed),
        }
    }

    fn record_drop(&self, notification: &Notification, reason: &'static str) {
        record_drop(&self.stats, notification, reason);
    }
}

fn record_drop(stats: &Stats, notification: &Notification, reason: &'static str) {
    stats.dropped.fetch_add(1, Ordering::Relaxed);
    metrics::counter!("notifications_dropped_total", "reason" => reason).increment(1);
    tracing::warn!(
        kind = notification.kind.as_str(),
        reason,
        "notification dropped"
    );
}

async fn run_worker(
    mut rx: mpsc::Receiver<Notification>,
    notifier: Arc<dyn Notifier>,
    config: NotifyConfig,
    stats: Arc<Stats>,
) {
    let limit = Arc::new(Semaphore::new(config.max_in_flight.max(1)));
    let mut in_flight = JoinSet::new();

    while let Some(notification) = rx.recv().await {
        let Ok(permit) = limit.clone().acquire_owned().await else {
            break;
        };

        let notifier = notifier.clone();
        let stats = stats.clone();
        in_flight.spawn(async move {
            let _permit = permit;
            match tokio::time::timeout(config.send_timeout, notifier.send(&notification)).await {
                Ok(Ok(())) => {
                    stats.sent.fetch_add(1, Ordering::Relaxed);
                    metrics::counter!("notifications_sent_total").increment(1);
                }
                Ok(Err(e)) => {
                    tracing::warn!(error = %e, "notification sink failed");
                    record_drop(&stats, &notification, "send_failed");
                }
                Err(_) => record_drop(&stats, &notification, "timeout"),
            }
        });

        while in_flight.try_join_next().is_some() {}
    }

    while in_flight.join_next().await.is_some() {}
}
