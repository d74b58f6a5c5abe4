//! Bounded bet queue between the file reader and the batch builder
//!
//! A bounded channel carries the bets; a semaphore holds one permit per free
//! slot. The reader spends a permit before every push and the builder hands
//! it back on every pop, so the reader can never be more than one batch
//! ahead of the sender.

use shared::Bet;
use std::sync::Arc;
use tokio::sync::{mpsc, Semaphore};
use tokio_util::sync::CancellationToken;

#[derive(Debug, PartialEq, Eq, thiserror::Error)]
pub enum PushError {
    #[error("Bet queue stopped by shutdown signal")]
    Stopped,

    #[error("Bet queue closed by consumer")]
    Closed,
}

/// Create a queue holding at most `capacity` bets
pub fn bet_queue(capacity: usize) -> (BetProducer, BetConsumer) {
    let capacity = capacity.max(1);
    let (sender, receiver) = mpsc::channel(capacity);
    let free_slots = Arc::new(Semaphore::new(capacity));

    (
        BetProducer {
            sender,
            free_slots: free_slots.clone(),
        },
        BetConsumer {
            receiver,
            free_slots,
        },
    )
}

/// Writing end. Dropping it closes the queue.
pub struct BetProducer {
    sender: mpsc::Sender<Bet>,
    free_slots: Arc<Semaphore>,
}

impl BetProducer {
    /// Wait for a free slot and enqueue `bet`, unless `shutdown` fires first
    pub async fn push(&self, bet: Bet, shutdown: &CancellationToken) -> Result<(), PushError> {
        tokio::select! {
            biased;

            _ = shutdown.cancelled() => Err(PushError::Stopped),
            permit = self.free_slots.acquire() => {
                let permit = permit.map_err(|_| PushError::Closed)?;
                // Returned by the consumer through add_permits
                permit.forget();
                self.sender.send(bet).await.map_err(|_| PushError::Closed)
            }
        }
    }
}

/// Reading end. Dropping it wakes a producer blocked on a free slot.
pub struct BetConsumer {
    receiver: mpsc::Receiver<Bet>,
    free_slots: Arc<Semaphore>,
}

impl BetConsumer {
    /// Next bet in FIFO order, `None` once the producer is gone and the queue is drained
    pub async fn pop(&mut self) -> Option<Bet> {
        let bet = self.receiver.recv().await?;
        self.free_slots.add_permits(1);
        Some(bet)
    }

    /// Bets waiting to be popped
    pub fn len(&self) -> usize {
        self.receiver.len()
    }

    pub fn is_empty(&self) -> bool {
        self.receiver.is_empty()
    }

    /// Stop accepting bets. Bets already queued can still be popped.
    pub fn close(&mut self) {
        self.free_slots.close();
        self.receiver.close();
    }
}

impl Drop for BetConsumer {
    fn drop(&mut self) {
        self.free_slots.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared::AgencyId;
    use tokio_test::{assert_pending, assert_ready, assert_ready_eq, task};

    fn bet(number: u64) -> Bet {
        Bet {
            agency: AgencyId::new(1),
            name: "Ana".to_string(),
            surname: "Gomez".to_string(),
            document: 1000 + number,
            birthdate: "2000-01-01".to_string(),
            number,
        }
    }

    #[tokio::test]
    async fn test_fifo_order() {
        let (producer, mut consumer) = bet_queue(3);
        let shutdown = CancellationToken::new();

        for n in 1..=3 {
            producer.push(bet(n), &shutdown).await.unwrap();
        }
        drop(producer);

        assert_eq!(consumer.pop().await, Some(bet(1)));
        assert_eq!(consumer.pop().await, Some(bet(2)));
        assert_eq!(consumer.pop().await, Some(bet(3)));
        assert_eq!(consumer.pop().await, None);
    }

    #[tokio::test]
    async fn test_push_waits_for_free_slot() {
        let (producer, mut consumer) = bet_queue(2);
        let shutdown = CancellationToken::new();

        producer.push(bet(1), &shutdown).await.unwrap();
        producer.push(bet(2), &shutdown).await.unwrap();

        let mut blocked = task::spawn(producer.push(bet(3), &shutdown));
        assert_pending!(blocked.poll());

        assert_eq!(consumer.pop().await, Some(bet(1)));
        assert!(blocked.is_woken());
        assert_ready_eq!(blocked.poll(), Ok(()));

        assert_eq!(consumer.pop().await, Some(bet(2)));
        assert_eq!(consumer.pop().await, Some(bet(3)));
    }

    #[tokio::test]
    async fn test_shutdown_releases_blocked_producer() {
        let (producer, mut consumer) = bet_queue(1);
        let shutdown = CancellationToken::new();

        producer.push(bet(1), &shutdown).await.unwrap();

        let mut blocked = task::spawn(producer.push(bet(2), &shutdown));
        assert_pending!(blocked.poll());

        shutdown.cancel();
        assert!(blocked.is_woken());
        assert_ready_eq!(blocked.poll(), Err(PushError::Stopped));
        drop(blocked);
        drop(producer);

        // Bet 2 was never enqueued
        assert_eq!(consumer.pop().await, Some(bet(1)));
        assert_eq!(consumer.pop().await, None);
    }

    #[tokio::test]
    async fn test_dropped_consumer_releases_blocked_producer() {
        let (producer, consumer) = bet_queue(1);
        let shutdown = CancellationToken::new();

        producer.push(bet(1), &shutdown).await.unwrap();

        let mut blocked = task::spawn(producer.push(bet(2), &shutdown));
        assert_pending!(blocked.poll());

        drop(consumer);
        let result = assert_ready!(blocked.poll());
        assert_eq!(result, Err(PushError::Closed));
    }
}
