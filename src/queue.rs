//! In-process message broker.
//!
//! Each queue is a bounded channel with a single consumer. Deliveries carry a
//! tag and must be acknowledged; the broker counts publishes and acks so the
//! backlog of a queue can be inspected at any time.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;
use thiserror::Error;
use tokio::sync::mpsc;

/// Queue carrying acceleration samples.
pub const ACCELEROMETER_QUEUE: &str = "accelerometer";

/// Queue carrying device-clock ticks.
pub const DATETIME_QUEUE: &str = "datetime";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum QueueError {
    #[error("unknown queue `{0}`")]
    Unknown(String),

    #[error("queue `{0}` is closed")]
    Closed(String),

    #[error("queue `{0}` is already declared")]
    AlreadyDeclared(String),
}

#[derive(Debug, Default)]
struct Counters {
    published: AtomicU64,
    acked: AtomicU64,
}

/// Snapshot of one queue's counters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct QueueStats {
    pub name: String,
    pub published: u64,
    pub acked: u64,
    pub pending: u64,
}

#[derive(Clone)]
struct QueueHandle {
    sender: mpsc::Sender<Delivery>,
    counters: Arc<Counters>,
}

/// Registry of declared queues. Cloning shares the same queues.
#[derive(Clone, Default)]
pub struct Broker {
    queues: BTreeMap<String, QueueHandle>,
}

impl Broker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare a queue and take its single consumer.
    ///
    /// Declare every queue before cloning the broker into publishers; clones
    /// taken earlier do not see later declarations.
    pub fn declare(&mut self, name: &str, capacity: usize) -> Result<Consumer, QueueError> {
        if self.queues.contains_key(name) {
            return Err(QueueError::AlreadyDeclared(name.to_string()));
        }

        let (sender, receiver) = mpsc::channel(capacity.max(1));
        let counters = Arc::new(Counters::default());
        self.queues.insert(
            name.to_string(),
            QueueHandle {
                sender,
                counters: counters.clone(),
            },
        );

        Ok(Consumer {
            name: name.to_string(),
            receiver,
            counters,
        })
    }

    /// Publish a payload, waiting for room if the queue is full.
    ///
    /// Returns the delivery tag.
    pub async fn publish(&self, name: &str, body: Vec<u8>) -> Result<u64, QueueError> {
        let handle = self
            .queues
            .get(name)
            .ok_or_else(|| QueueError::Unknown(name.to_string()))?;

        let tag = handle.counters.published.fetch_add(1, Ordering::SeqCst) + 1;
        let delivery = Delivery {
            tag,
            body,
            counters: handle.counters.clone(),
        };

        if handle.sender.send(delivery).await.is_err() {
            handle.counters.published.fetch_sub(1, Ordering::SeqCst);
            return Err(QueueError::Closed(name.to_string()));
        }

        Ok(tag)
    }

    pub fn stats(&self) -> Vec<QueueStats> {
        self.queues
            .iter()
            .map(|(name, handle)| {
                let published = handle.counters.published.load(Ordering::SeqCst);
                let acked = handle.counters.acked.load(Ordering::SeqCst);
                QueueStats {
                    name: name.clone(),
                    published,
                    acked,
                    pending: published.saturating_sub(acked),
                }
            })
            .collect()
    }
}

/// One message taken from a queue.
#[derive(Debug)]
pub struct Delivery {
    tag: u64,
    body: Vec<u8>,
    counters: Arc<Counters>,
}

impl Delivery {
    pub fn tag(&self) -> u64 {
        self.tag
    }

    pub fn body(&self) -> &[u8] {
        &self.body
    }

    /// Acknowledge the delivery, removing it from the queue's backlog.
    pub fn ack(self) {
        self.counters.acked.fetch_add(1, Ordering::SeqCst);
    }
}

/// The receiving end of a queue; prefetch is one delivery at a time.
#[derive(Debug)]
pub struct Consumer {
    name: String,
    receiver: mpsc::Receiver<Delivery>,
    counters: Arc<Counters>,
}

impl Consumer {
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Wait for the next delivery; `None` once every publisher is gone.
    pub async fn next(&mut self) -> Option<Delivery> {
        self.receiver.recv().await
    }

    pub fn acked(&self) -> u64 {
        self.counters.acked.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_publish_consume_ack() {
        let mut broker = Broker::new();
        let mut consumer = broker.declare(DATETIME_QUEUE, 8).unwrap();

        let tag = broker.publish(DATETIME_QUEUE, b"{}".to_vec()).await.unwrap();
        assert_eq!(tag, 1);

        let delivery = consumer.next().await.unwrap();
        assert_eq!(delivery.tag(), 1);
        assert_eq!(delivery.body(), b"{}");

        let stats = broker.stats();
        assert_eq!(stats[0].pending, 1);

        delivery.ack();
        let stats = broker.stats();
        assert_eq!(stats[0].published, 1);
        assert_eq!(stats[0].acked, 1);
        assert_eq!(stats[0].pending, 0);
        assert_eq!(consumer.acked(), 1);
    }

    #[tokio::test]
    async fn test_deliveries_keep_publish_order() {
        let mut broker = Broker::new();
        let mut consumer = broker.declare(ACCELEROMETER_QUEUE, 8).unwrap();

        for i in 0..5u8 {
            broker.publish(ACCELEROMETER_QUEUE, vec![i]).await.unwrap();
        }

        for i in 0..5u8 {
            let delivery = consumer.next().await.unwrap();
            assert_eq!(delivery.body(), &[i]);
            assert_eq!(delivery.tag(), u64::from(i) + 1);
            delivery.ack();
        }
    }

    #[tokio::test]
    async fn test_unknown_queue() {
        let broker = Broker::new();
        let err = broker.publish("heartbeat", Vec::new()).await.unwrap_err();
        assert_eq!(err, QueueError::Unknown("heartbeat".to_string()));
    }

    #[tokio::test]
    async fn test_closed_queue() {
        let mut broker = Broker::new();
        let consumer = broker.declare(DATETIME_QUEUE, 8).unwrap();
        drop(consumer);

        let err = broker.publish(DATETIME_QUEUE, Vec::new()).await.unwrap_err();
        assert_eq!(err, QueueError::Closed(DATETIME_QUEUE.to_string()));
        assert_eq!(broker.stats()[0].published, 0);
    }

    #[test]
    fn test_declare_twice() {
        let mut broker = Broker::new();
        broker.declare(DATETIME_QUEUE, 8).unwrap();
        assert!(matches!(
            broker.declare(DATETIME_QUEUE, 8),
            Err(QueueError::AlreadyDeclared(_))
        ));
    }
}
