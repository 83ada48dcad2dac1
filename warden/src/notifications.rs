//! Background notification delivery.
//!
//! Request handlers hand notifications to a [`NotificationDispatcher`] and return immediately. A
//! single worker task drains the bounded queue and delivers through a [`NotificationSender`],
//! retrying failed deliveries. Delivery failures never reach the request that caused them; they
//! are only logged.

use std::sync::Arc;

use async_trait::async_trait;
use tokio::{
    sync::mpsc::{self, error::TrySendError},
    task::JoinHandle,
};
use tokio_util::sync::CancellationToken;

use crate::{config::NotificationsConfig, errors::Error};

/// A rendered email ready to send.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmailRequest {
    pub to: String,
    pub to_name: Option<String>,
    pub subject: String,
    pub html_body: String,
    pub text_body: String,
}

/// Delivery channel for outbound notifications.
#[async_trait]
pub trait NotificationSender: Send + Sync {
    async fn send(&self, email: &EmailRequest) -> Result<(), Error>;
}

/// Cheap, cloneable handle for enqueueing notifications.
#[derive(Debug, Clone)]
pub struct NotificationDispatcher {
    tx: mpsc::Sender<EmailRequest>,
}

impl NotificationDispatcher {
    /// A dispatcher whose queue is read directly instead of by a worker
    #[cfg(test)]
    pub(crate) fn channel(capacity: usize) -> (Self, mpsc::Receiver<EmailRequest>) {
        let (tx, rx) = mpsc::channel(capacity);
        (Self { tx }, rx)
    }

    /// Enqueue without waiting. A full or closed queue drops the notification.
    pub fn dispatch(&self, email: EmailRequest) {
        match self.tx.try_send(email) {
            Ok(()) => {}
            Err(TrySendError::Full(email)) => {
                tracing::warn!(subject = %email.subject, "Notification queue full, dropping notification");
            }
            Err(TrySendError::Closed(email)) => {
                tracing::warn!(subject = %email.subject, "Notification worker stopped, dropping notification");
            }
        }
    }
}

/// Start the delivery worker. It stops once `shutdown` fires and the queue is drained.
pub fn start(
    config: &NotificationsConfig,
    sender: Arc<dyn NotificationSender>,
    shutdown: CancellationToken,
) -> (NotificationDispatcher, JoinHandle<()>) {
    let (tx, rx) = mpsc::channel(config.queue_capacity);
    let handle = tokio::spawn(run_worker(config.clone(), sender, rx, shutdown));

    (NotificationDispatcher { tx }, handle)
}

async fn run_worker(
    config: NotificationsConfig,
    sender: Arc<dyn NotificationSender>,
    mut rx: mpsc::Receiver<EmailRequest>,
    shutdown: CancellationToken,
) {
    tracing::info!(
        queue_capacity = config.queue_capacity,
        max_attempts = config.max_attempts,
        "Starting notification worker"
    );

    loop {
        tokio::select! {
            biased;
            _ = shutdown.cancelled() => break,
            next = rx.recv() => match next {
                Some(email) => deliver(&config, sender.as_ref(), &email).await,
                None => {
                    tracing::info!("Notification queue closed, worker exiting");
                    return;
                }
            },
        }
    }

    // Refuse new work, then flush what is already queued
    rx.close();
    let mut drained = 0usize;
    while let Some(email) = rx.recv().await {
        deliver(&config, sender.as_ref(), &email).await;
        drained += 1;
    }
    tracing::info!(drained, "Notification worker shut down");
}

async fn deliver(config: &NotificationsConfig, sender: &dyn NotificationSender, email: &EmailRequest) {
    let max_attempts = config.max_attempts.max(1);

    for attempt in 1..=max_attempts {
        match sender.send(email).await {
            Ok(()) => {
                tracing::info!(subject = %email.subject, attempt, "Notification delivered");
                return;
            }
            Err(e) if attempt < max_attempts => {
                tracing::warn!(subject = %email.subject, attempt, error = %e, "Notification delivery failed, retrying");
                tokio::time::sleep(config.retry_backoff).await;
            }
            Err(e) => {
                tracing::error!(subject = %email.subject, attempts = attempt, error = %e, "Giving up on notification delivery");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::time::Duration;
    use tokio::sync::Mutex;

    /// Fails the first `failures` sends, then records every delivered email
    #[derive(Default)]
    struct FlakySender {
        failures: u32,
        calls: AtomicU32,
        delivered: Mutex<Vec<EmailRequest>>,
    }

    #[async_trait]
    impl NotificationSender for FlakySender {
        async fn send(&self, email: &EmailRequest) -> Result<(), Error> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
            if call <= self.failures {
                return Err(Error::Internal {
                    operation: "send email: relay unavailable".to_string(),
                });
            }
            self.delivered.lock().await.push(email.clone());
            Ok(())
        }
    }

    fn config(max_attempts: u32) -> NotificationsConfig {
        NotificationsConfig {
            queue_capacity: 8,
            max_attempts,
            retry_backoff: Duration::from_millis(1),
        }
    }

    fn email(subject: &str) -> EmailRequest {
        EmailRequest {
            to: "ada@example.com".to_string(),
            to_name: Some("Ada".to_string()),
            subject: subject.to_string(),
            html_body: "<p>hi</p>".to_string(),
            text_body: "hi".to_string(),
        }
    }

    #[test_log::test(tokio::test)]
    async fn test_retries_until_delivered() {
        let sender = Arc::new(FlakySender {
            failures: 2,
            ..Default::default()
        });
        let shutdown = CancellationToken::new();
        let (dispatcher, handle) = start(&config(3), sender.clone(), shutdown.clone());

        dispatcher.dispatch(email("hello"));
        drop(dispatcher);
        handle.await.unwrap();

        assert_eq!(sender.calls.load(Ordering::SeqCst), 3);
        assert_eq!(sender.delivered.lock().await.len(), 1);
    }

    #[test_log::test(tokio::test)]
    async fn test_gives_up_after_max_attempts() {
        let sender = Arc::new(FlakySender {
            failures: u32::MAX,
            ..Default::default()
        });
        let (dispatcher, handle) = start(&config(2), sender.clone(), CancellationToken::new());

        dispatcher.dispatch(email("doomed"));
        drop(dispatcher);
        handle.await.unwrap();

        assert_eq!(sender.calls.load(Ordering::SeqCst), 2);
        assert!(sender.delivered.lock().await.is_empty());
    }

    #[tokio::test]
    async fn test_shutdown_drains_queued_notifications() {
        let sender = Arc::new(FlakySender::default());
        let shutdown = CancellationToken::new();
        let (dispatcher, handle) = start(&config(1), sender.clone(), shutdown.clone());

        for i in 0..3 {
            dispatcher.dispatch(email(&format!("queued {i}")));
        }
        shutdown.cancel();
        handle.await.unwrap();

        assert_eq!(sender.delivered.lock().await.len(), 3);

        // The worker is gone; dispatching now is a logged no-op
        dispatcher.dispatch(email("late"));
        assert_eq!(sender.delivered.lock().await.len(), 3);
    }

    #[tokio::test]
    async fn test_full_queue_drops_without_blocking() {
        let (dispatcher, mut rx) = NotificationDispatcher::channel(1);

        dispatcher.dispatch(email("first"));
        dispatcher.dispatch(email("second"));

        assert_eq!(rx.recv().await.unwrap().subject, "first");
        assert!(rx.try_recv().is_err());
    }
}
