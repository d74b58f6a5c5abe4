//! Batch assembly under a record count and byte budget
//!
//! A bet that does not fit the current batch is carried over, whole, to the
//! next one. Bets larger than the budget on their own can never be sent and
//! are dropped with a warning.

use shared::protocol::Message;
use shared::MAX_BATCH_BYTES;
use tracing::{debug, warn};

use crate::queue::BetConsumer;

/// Encoded bets ready to go out as one `bet_batch` message
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Batch {
    bets: Vec<String>,
    encoded_len: usize,
}

impl Batch {
    pub fn bets(&self) -> &[String] {
        &self.bets
    }

    pub fn len(&self) -> usize {
        self.bets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bets.is_empty()
    }

    /// Size of the batch body in bytes, separators included
    pub fn encoded_len(&self) -> usize {
        self.encoded_len
    }

    pub fn to_message(&self) -> Message {
        Message::bet_batch(&self.bets)
    }

    /// Bytes the batch would take after appending `encoded`
    fn len_with(&self, encoded: &str) -> usize {
        if self.bets.is_empty() {
            encoded.len()
        } else {
            self.encoded_len + 1 + encoded.len()
        }
    }

    fn push(&mut self, encoded: String) {
        self.encoded_len = self.len_with(&encoded);
        self.bets.push(encoded);
    }
}

pub struct BatchBuilder {
    bets: BetConsumer,
    max_bets: usize,
    max_bytes: usize,
    carried_over: Option<String>,
}

impl BatchBuilder {
    pub fn new(bets: BetConsumer, max_bets: usize) -> Self {
        Self::with_byte_budget(bets, max_bets, MAX_BATCH_BYTES)
    }

    pub fn with_byte_budget(bets: BetConsumer, max_bets: usize, max_bytes: usize) -> Self {
        Self {
            bets,
            max_bets: max_bets.max(1),
            max_bytes,
            carried_over: None,
        }
    }

    /// Build the next batch. An empty batch means there are no bets left.
    pub async fn next_batch(&mut self) -> Batch {
        let mut batch = Batch::default();

        if let Some(encoded) = self.carried_over.take() {
            batch.push(encoded);
        }

        while batch.len() < self.max_bets {
            // Popping hands the slot back to the reader right away
            let Some(bet) = self.bets.pop().await else {
                break;
            };

            let encoded = bet.encode();

            if encoded.len() > self.max_bytes {
                warn!(
                    document = bet.document,
                    encoded_len = encoded.len(),
                    max_bytes = self.max_bytes,
                    "Dropping bet larger than the batch byte budget"
                );
                metrics::counter!("bets_rejected_total", "reason" => "oversized").increment(1);
                continue;
            }

            if batch.len_with(&encoded) > self.max_bytes {
                self.carried_over = Some(encoded);
                break;
            }

            batch.push(encoded);
        }

        debug!(
            bet_count = batch.len(),
            encoded_len = batch.encoded_len(),
            carried_over = self.carried_over.is_some(),
            "Batch built"
        );

        batch
    }

    /// Stop the reader from queueing more bets
    pub fn close(&mut self) {
        self.bets.close();
    }
}
