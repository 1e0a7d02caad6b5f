//! Notification Router (C9, §4.9): a two-tier priority queue draining to the
//! chat platform, with a global rate limiter and bounded per-dispatch retry.

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::{mpsc, oneshot, Mutex};
use tokio::time::Instant;

use crate::constants::NOTIFICATION_MAX_ATTEMPTS;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Priority {
    /// Responses to user-initiated commands/interactions.
    High,
    /// Match notifications, admin broadcasts, reminders.
    Low,
}

/// A single outbound message. Opaque payload — the chat-platform client is
/// external (out of scope, §1); this only carries what it needs to dispatch.
#[derive(Clone, Debug)]
pub struct Notification {
    pub recipient_uid: i64,
    pub text: String,
}

/// The chat-platform send operation this router drives. A real
/// implementation wraps the Discord (or other) client; tests use a fake.
#[async_trait]
pub trait Dispatcher: Send + Sync {
    async fn send(&self, notification: &Notification) -> anyhow::Result<()>;
}

struct Job {
    notification: Notification,
    attempts: u32,
    reply: Option<oneshot::Sender<anyhow::Result<()>>>,
}

enum Enqueued {
    Job { priority: Priority, job: Job },
    Requeue { priority: Priority, job: Job },
}

/// Cheaply cloneable handle to the router; the actual queues and worker
/// loop live behind the channel.
#[derive(Clone)]
pub struct NotificationRouter {
    tx: mpsc::UnboundedSender<Enqueued>,
}

impl NotificationRouter {
    /// Spawn the single worker loop (§4.9: "a single worker loop") and
    /// return a handle. `rate_limit_per_sec` is `R` from config.
    pub fn spawn(dispatcher: Arc<dyn Dispatcher>, rate_limit_per_sec: u32) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        tokio::spawn(worker_loop(rx, dispatcher, rate_limit_per_sec));
        NotificationRouter { tx }
    }

    /// Enqueue high-priority (responds to a command) and await the result.
    pub async fn send_high(&self, notification: Notification) -> anyhow::Result<()> {
        self.enqueue(Priority::High, notification).await
    }

    /// Enqueue low-priority (match/admin/reminder) and await the result.
    pub async fn send_low(&self, notification: Notification) -> anyhow::Result<()> {
        self.enqueue(Priority::Low, notification).await
    }

    async fn enqueue(&self, priority: Priority, notification: Notification) -> anyhow::Result<()> {
        let (reply_tx, reply_rx) = oneshot::channel();
        let job = Job { notification, attempts: 0, reply: Some(reply_tx) };
        self.tx
            .send(Enqueued::Job { priority, job })
            .map_err(|_| anyhow::anyhow!("notification router worker has shut down"))?;
        reply_rx.await.map_err(|_| anyhow::anyhow!("notification router dropped the reply"))?
    }
}

async fn worker_loop(
    mut rx: mpsc::UnboundedReceiver<Enqueued>,
    dispatcher: Arc<dyn Dispatcher>,
    rate_limit_per_sec: u32,
) {
    let mut high: VecDeque<Job> = VecDeque::new();
    let mut low: VecDeque<Job> = VecDeque::new();
    let min_gap = Duration::from_secs_f64(1.0 / rate_limit_per_sec.max(1) as f64);
    let mut last_sent: Option<Instant> = None;

    loop {
        // Drain whatever's arrived without blocking, then block for more
        // work only once both queues are empty.
        while let Ok(item) = rx.try_recv() {
            push(&mut high, &mut low, item);
        }
        if high.is_empty() && low.is_empty() {
            match rx.recv().await {
                Some(item) => push(&mut high, &mut low, item),
                None => return,
            }
            continue;
        }

        // High queue fully drains before the low queue is ever touched;
        // after each low-queue dispatch, the high queue is re-checked.
        let (priority, job) = if let Some(job) = high.pop_front() {
            (Priority::High, job)
        } else if let Some(job) = low.pop_front() {
            (Priority::Low, job)
        } else {
            continue;
        };

        if let Some(last) = last_sent {
            let elapsed = last.elapsed();
            if elapsed < min_gap {
                tokio::time::sleep(min_gap - elapsed).await;
            }
        }

        dispatch_one(&mut high, &mut low, priority, job, &dispatcher).await;
        last_sent = Some(Instant::now());
    }
}

fn push(high: &mut VecDeque<Job>, low: &mut VecDeque<Job>, item: Enqueued) {
    match item {
        Enqueued::Job { priority: Priority::High, job } => high.push_back(job),
        Enqueued::Job { priority: Priority::Low, job } => low.push_back(job),
        // Retries go to the back of their own queue (§4.9 "Retry").
        Enqueued::Requeue { priority: Priority::High, job } => high.push_back(job),
        Enqueued::Requeue { priority: Priority::Low, job } => low.push_back(job),
    }
}

async fn dispatch_one(
    high: &mut VecDeque<Job>,
    low: &mut VecDeque<Job>,
    priority: Priority,
    mut job: Job,
    dispatcher: &Arc<dyn Dispatcher>,
) {
    match dispatcher.send(&job.notification).await {
        Ok(()) => {
            if let Some(reply) = job.reply.take() {
                let _ = reply.send(Ok(()));
            }
        }
        Err(e) => {
            job.attempts += 1;
            if job.attempts >= NOTIFICATION_MAX_ATTEMPTS {
                log::error!(
                    "notification to {} failed after {} attempts: {}",
                    job.notification.recipient_uid,
                    job.attempts,
                    e
                );
                if let Some(reply) = job.reply.take() {
                    let _ = reply.send(Err(e));
                }
            } else {
                // Re-enqueued to the back of its own queue, same reply
                // handle, so the original caller still observes the
                // eventual result (§4.9 "Retry").
                log::warn!(
                    "notification to {} failed (attempt {}): {}",
                    job.notification.recipient_uid,
                    job.attempts,
                    e
                );
                match priority {
                    Priority::High => high.push_back(job),
                    Priority::Low => low.push_back(job),
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio::sync::Mutex as TokioMutex;

    struct RecordingDispatcher {
        sent: TokioMutex<Vec<Notification>>,
        fail_first_n: AtomicUsize,
    }

    #[async_trait]
    impl Dispatcher for RecordingDispatcher {
        async fn send(&self, notification: &Notification) -> anyhow::Result<()> {
            if self.fail_first_n.load(Ordering::SeqCst) > 0 {
                self.fail_first_n.fetch_sub(1, Ordering::SeqCst);
                anyhow::bail!("simulated failure");
            }
            self.sent.lock().await.push(notification.clone());
            Ok(())
        }
    }

    #[tokio::test]
    async fn dispatches_high_and_low_priority_messages() {
        let dispatcher =
            Arc::new(RecordingDispatcher { sent: TokioMutex::new(Vec::new()), fail_first_n: AtomicUsize::new(0) });
        let router = NotificationRouter::spawn(dispatcher.clone(), 1000);

        router
            .send_low(Notification { recipient_uid: 1, text: "match found".to_string() })
            .await
            .unwrap();
        router
            .send_high(Notification { recipient_uid: 2, text: "command reply".to_string() })
            .await
            .unwrap();

        let sent = dispatcher.sent.lock().await;
        assert_eq!(sent.len(), 2);
    }

    #[tokio::test]
    async fn retries_on_failure_and_eventually_succeeds() {
        let dispatcher =
            Arc::new(RecordingDispatcher { sent: TokioMutex::new(Vec::new()), fail_first_n: AtomicUsize::new(1) });
        let router = NotificationRouter::spawn(dispatcher.clone(), 1000);

        router
            .send_high(Notification { recipient_uid: 1, text: "retry me".to_string() })
            .await
            .unwrap();

        let sent = dispatcher.sent.lock().await;
        assert_eq!(sent.len(), 1);
    }

    #[tokio::test]
    async fn surfaces_the_exception_after_max_attempts() {
        let dispatcher = Arc::new(RecordingDispatcher {
            sent: TokioMutex::new(Vec::new()),
            fail_first_n: AtomicUsize::new(NOTIFICATION_MAX_ATTEMPTS as usize),
        });
        let router = NotificationRouter::spawn(dispatcher.clone(), 1000);

        let result = router
            .send_high(Notification { recipient_uid: 1, text: "doomed".to_string() })
            .await;
        assert!(result.is_err());
    }
}
