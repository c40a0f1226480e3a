//! In-process message broker with named queues.
//!
//! Queues are created on first use. Each queue has at most one subscriber,
//! which receives messages in arrival order. A message stays owned by its
//! [`Delivery`] until it is acknowledged, requeued to the head of its queue
//! or moved to the queue's dead-letter companion.
//!
//! Queues live in memory only. Messages relayed from the outbox carry their
//! outbox id so the consumer can settle the durable row.

use std::{
    collections::{HashMap, VecDeque},
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
};

use tokio::sync::{Mutex, Notify};
use tracing::{debug, info, warn};

use crate::BrokerError;

/// Name of the queue receiving messages given up on `queue`.
#[must_use]
pub fn dead_letter_queue(queue: &str) -> String {
    format!("{queue}.dead_letter")
}

#[derive(Clone, Debug)]
struct Envelope {
    payload: Vec<u8>,
    message_id: Option<i64>,
    attempt: u32,
    reason: Option<String>,
}

#[derive(Debug, Default)]
struct Queue {
    messages: Mutex<VecDeque<Envelope>>,
    notify: Notify,
    subscribed: AtomicBool,
}

impl Queue {
    async fn push_back(&self, envelope: Envelope) {
        self.messages.lock().await.push_back(envelope);
        self.notify.notify_one();
    }

    async fn push_front(&self, envelope: Envelope) {
        self.messages.lock().await.push_front(envelope);
        self.notify.notify_one();
    }
}

#[derive(Debug, Default)]
struct Inner {
    queues: Mutex<HashMap<String, Arc<Queue>>>,
    closed: AtomicBool,
    on_close: Notify,
}

/// Handle to the broker. Clones share the same queues.
#[derive(Clone, Debug, Default)]
pub struct Broker {
    inner: Arc<Inner>,
}

impl Broker {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    async fn queue(&self, name: &str) -> Arc<Queue> {
        let mut queues = self.inner.queues.lock().await;
        queues
            .entry(name.to_string())
            .or_insert_with(|| Arc::new(Queue::default()))
            .clone()
    }

    pub fn is_closed(&self) -> bool {
        self.inner.closed.load(Ordering::Acquire)
    }

    /// Resolves once [`Broker::close`] has been called.
    pub async fn closed(&self) {
        let notified = self.inner.on_close.notified();
        tokio::pin!(notified);
        notified.as_mut().enable();
        if self.is_closed() {
            return;
        }
        notified.await;
    }

    /// Append `payload` to the tail of `queue`.
    pub async fn publish(&self, queue: &str, payload: Vec<u8>) -> Result<(), BrokerError> {
        self.push(queue, payload, None).await
    }

    /// Like [`Broker::publish`], tagging the message with the id of the
    /// durable row it came from.
    pub async fn publish_with_id(
        &self,
        queue: &str,
        payload: Vec<u8>,
        message_id: i64,
    ) -> Result<(), BrokerError> {
        self.push(queue, payload, Some(message_id)).await
    }

    async fn push(
        &self,
        queue: &str,
        payload: Vec<u8>,
        message_id: Option<i64>,
    ) -> Result<(), BrokerError> {
        if self.is_closed() {
            return Err(BrokerError::Closed);
        }
        self.queue(queue)
            .await
            .push_back(Envelope {
                payload,
                message_id,
                attempt: 0,
                reason: None,
            })
            .await;
        debug!(queue, ?message_id, "message published");
        Ok(())
    }

    /// Attach the single consumer of `queue`.
    pub async fn subscribe(&self, queue: &str) -> Result<Subscription, BrokerError> {
        if self.is_closed() {
            return Err(BrokerError::Closed);
        }
        let handle = self.queue(queue).await;
        if handle.subscribed.swap(true, Ordering::AcqRel) {
            return Err(BrokerError::AlreadySubscribed(queue.to_string()));
        }
        debug!(queue, "subscribed");
        Ok(Subscription {
            broker: self.clone(),
            name: queue.to_string(),
            queue: handle,
        })
    }

    /// Move a delivery to `<queue>.dead_letter`, keeping its attempt count.
    pub async fn dead_letter(&self, delivery: Delivery, reason: &str) {
        let target = dead_letter_queue(&delivery.queue_name);
        let Delivery { envelope, .. } = delivery;
        // Dead-lettering still works while shutting down.
        self.queue(&target)
            .await
            .push_back(Envelope {
                reason: Some(reason.to_string()),
                ..envelope
            })
            .await;
        warn!(queue = %target, reason, "message dead-lettered");
    }

    /// Number of messages waiting in `queue`.
    pub async fn depth(&self, queue: &str) -> usize {
        self.queue(queue).await.messages.lock().await.len()
    }

    /// Pop the oldest message of `queue` without a subscription.
    ///
    /// Used to inspect dead-letter queues.
    pub async fn take(&self, queue: &str) -> Option<(Vec<u8>, Option<String>)> {
        self.queue(queue)
            .await
            .messages
            .lock()
            .await
            .pop_front()
            .map(|e| (e.payload, e.reason))
    }

    /// Stop accepting messages and wake every subscriber.
    pub async fn close(&self) {
        if self.inner.closed.swap(true, Ordering::AcqRel) {
            return;
        }
        self.inner.on_close.notify_waiters();
        let queues = self.inner.queues.lock().await;
        for queue in queues.values() {
            queue.notify.notify_waiters();
        }
        info!(queues = queues.len(), "broker closed");
    }
}

/// Consumer side of one queue.
#[derive(Debug)]
pub struct Subscription {
    broker: Broker,
    name: String,
    queue: Arc<Queue>,
}

impl Subscription {
    pub fn queue(&self) -> &str {
        &self.name
    }

    /// Wait for the next message. Returns `None` once the broker is closed.
    pub async fn next(&mut self) -> Option<Delivery> {
        loop {
            let notified = self.queue.notify.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            if self.broker.is_closed() {
                return None;
            }
            if let Some(envelope) = self.queue.messages.lock().await.pop_front() {
                return Some(Delivery {
                    queue: self.queue.clone(),
                    queue_name: self.name.clone(),
                    envelope,
                });
            }
            notified.await;
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.queue.subscribed.store(false, Ordering::Release);
    }
}

/// A message handed to a subscriber and not yet settled.
#[derive(Debug)]
pub struct Delivery {
    queue: Arc<Queue>,
    queue_name: String,
    envelope: Envelope,
}

impl Delivery {
    pub fn payload(&self) -> &[u8] {
        &self.envelope.payload
    }

    /// Outbox id of the message, if it was relayed from the outbox.
    pub fn message_id(&self) -> Option<i64> {
        self.envelope.message_id
    }

    /// Zero on first delivery, incremented on every requeue.
    pub fn attempt(&self) -> u32 {
        self.envelope.attempt
    }

    pub fn queue(&self) -> &str {
        &self.queue_name
    }

    /// Settle the message as handled.
    pub fn ack(self) {
        debug!(queue = %self.queue_name, attempt = self.envelope.attempt, "ack");
    }

    /// Reject the message. With `requeue` it goes back to the head of its
    /// queue with its attempt count raised; otherwise it is discarded.
    pub async fn nack(self, requeue: bool) {
        if !requeue {
            debug!(queue = %self.queue_name, "nack, dropped");
            return;
        }
        let Self {
            queue, envelope, ..
        } = self;
        queue
            .push_front(Envelope {
                attempt: envelope.attempt.saturating_add(1),
                ..envelope
            })
            .await;
    }
}
