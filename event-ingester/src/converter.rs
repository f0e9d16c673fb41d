use std::sync::Arc;

use metrics::{counter, gauge, histogram};
use time::UtcOffset;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, warn};

use crate::codec::{decode_event_sequence, encode_normalized};
use crate::compress::Compressor;
use crate::error::{ConversionFailure, ConverterError, SkipReason};
use crate::events::EventSequence;
use crate::message::RawMessage;
use crate::model::{BatchUpdate, Outcome, StorageRow};

/// Converts batches of raw log messages into rows we can insert into the database.
pub struct MessageRowConverter {
    compressor: Arc<dyn Compressor>,
    /// Abort a batch once this many messages in a row failed to encode or
    /// compress. Zero disables the check.
    max_consecutive_failures: usize,
    consecutive_failures: usize,
}

impl MessageRowConverter {
    pub fn new(compressor: Arc<dyn Compressor>) -> Self {
        Self {
            compressor,
            max_consecutive_failures: 0,
            consecutive_failures: 0,
        }
    }

    pub fn with_max_consecutive_failures(mut self, max: usize) -> Self {
        self.max_consecutive_failures = max;
        self
    }

    pub fn consecutive_failures(&self) -> usize {
        self.consecutive_failures
    }

    fn is_tripped(&self) -> bool {
        self.max_consecutive_failures > 0
            && self.consecutive_failures >= self.max_consecutive_failures
    }

    /// Convert one batch. Every message gets an ack handle, whether it produced
    /// a row or not. The only error is a run of conversion failures long enough
    /// to look like a broken compressor rather than bad input; the partial
    /// batch is dropped in that case so that none of it gets acked.
    pub fn convert_batch(
        &mut self,
        cancel: &CancellationToken,
        batch: Vec<RawMessage>,
    ) -> Result<BatchUpdate, ConverterError> {
        histogram!("event_ingester_batch_size").record(batch.len() as f64);

        let mut update = BatchUpdate::with_capacity(batch.len());

        for message in batch {
            let ack = message.ack_handle();

            let outcome = match self.convert_message(cancel, &message) {
                Outcome::Failed(failure) => {
                    // Stays tripped until a message converts again
                    self.consecutive_failures += 1;
                    if self.is_tripped() {
                        gauge!("event_ingester_consecutive_failures")
                            .set(self.consecutive_failures as f64);
                        counter!("event_ingester_systemic_failures_total").increment(1);
                        return Err(ConverterError::SystemicFailure {
                            consecutive: self.consecutive_failures,
                            last: failure,
                        });
                    }
                    Outcome::Failed(failure)
                }
                Outcome::Converted(row) => {
                    self.consecutive_failures = 0;
                    Outcome::Converted(row)
                }
                skipped => skipped,
            };

            counter!("event_ingester_messages_total", "outcome" => outcome_label(&outcome))
                .increment(1);
            update.push(ack, outcome);
        }

        gauge!("event_ingester_consecutive_failures").set(self.consecutive_failures as f64);
        counter!("event_ingester_rows_total").increment(update.rows().count() as u64);

        Ok(update)
    }

    fn convert_message(&self, cancel: &CancellationToken, message: &RawMessage) -> Outcome {
        if !message.is_control_message() {
            debug!(message_id = %message.id, "not a control message, ignoring");
            return Outcome::Skipped(SkipReason::NotControlMessage);
        }

        if message.index.is_none() {
            warn!(message_id = %message.id, "index not found on message, ignoring");
            return Outcome::Skipped(SkipReason::MissingIndex);
        }

        let mut sequence = match decode_event_sequence(cancel, &message.payload) {
            Ok(sequence) => sequence,
            Err(e) => {
                warn!(message_id = %message.id, error = %e, "could not decode event sequence");
                return Outcome::Skipped(SkipReason::Undecodable(e));
            }
        };

        let Some(published) = message.publish_time.checked_to_offset(UtcOffset::UTC) else {
            error!(
                message_id = %message.id,
                publish_time = %message.publish_time,
                "publish time out of range"
            );
            return Outcome::Failed(ConversionFailure::PublishTimeOutOfRange);
        };
        sequence.backfill_created(published);

        // The queue and job set are stored as the row key, not in the payload
        let (queue, job_set) = sequence.take_keys();

        match self.compress(&sequence) {
            Ok(payload) => Outcome::Converted(StorageRow {
                queue,
                job_set,
                payload,
            }),
            Err(e) => {
                error!(message_id = %message.id, error = %e, "could not store event sequence");
                Outcome::Failed(e)
            }
        }
    }

    fn compress(&self, sequence: &EventSequence) -> Result<Vec<u8>, ConversionFailure> {
        let bytes = encode_normalized(sequence)?;
        Ok(self.compressor.compress(&bytes)?)
    }
}

fn outcome_label(outcome: &Outcome) -> &'static str {
    match outcome {
        Outcome::Converted(_) => "converted",
        Outcome::Skipped(SkipReason::NotControlMessage) => "not_control",
        Outcome::Skipped(SkipReason::MissingIndex) => "missing_index",
        Outcome::Skipped(SkipReason::Undecodable(_)) => "undecodable",
        Outcome::Failed(_) => "failed",
    }
}
