use crate::error::{ConversionFailure, SkipReason};
use crate::message::AckHandle;

/// One storage-ready event sequence, keyed by queue and job set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorageRow {
    pub queue: String,
    pub job_set: String,
    /// Compressed, normalized sequence. Never contains the key above.
    pub payload: Vec<u8>,
}

#[derive(Debug)]
pub enum Outcome {
    Converted(StorageRow),
    Skipped(SkipReason),
    Failed(ConversionFailure),
}

/// What happened to a single message. Every consumed message gets exactly one,
/// and the ack handle is set before the message is looked at.
#[derive(Debug)]
pub struct MessageOutcome {
    pub ack: AckHandle,
    pub outcome: Outcome,
}

impl MessageOutcome {
    pub fn row(&self) -> Option<&StorageRow> {
        match &self.outcome {
            Outcome::Converted(row) => Some(row),
            _ => None,
        }
    }
}

/// The result of converting one batch of raw messages.
#[derive(Debug, Default)]
pub struct BatchUpdate {
    outcomes: Vec<MessageOutcome>,
}

impl BatchUpdate {
    pub(crate) fn with_capacity(capacity: usize) -> Self {
        Self {
            outcomes: Vec::with_capacity(capacity),
        }
    }

    pub(crate) fn push(&mut self, ack: AckHandle, outcome: Outcome) {
        self.outcomes.push(MessageOutcome { ack, outcome });
    }

    /// One outcome per input message, in input order.
    pub fn outcomes(&self) -> &[MessageOutcome] {
        &self.outcomes
    }

    /// Every message of the batch, in input order, usable or not.
    pub fn ack_handles(&self) -> impl Iterator<Item = &AckHandle> {
        self.outcomes.iter().map(|o| &o.ack)
    }

    pub fn rows(&self) -> impl Iterator<Item = &StorageRow> {
        self.outcomes.iter().filter_map(MessageOutcome::row)
    }

    pub fn len(&self) -> usize {
        self.outcomes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.outcomes.is_empty()
    }

    /// Split into what the writer persists and what it acks afterwards.
    pub fn into_parts(self) -> (Vec<AckHandle>, Vec<StorageRow>) {
        let mut acks = Vec::with_capacity(self.outcomes.len());
        let mut rows = Vec::new();
        for MessageOutcome { ack, outcome } in self.outcomes {
            acks.push(ack);
            if let Outcome::Converted(row) = outcome {
                rows.push(row);
            }
        }
        (acks, rows)
    }
}
