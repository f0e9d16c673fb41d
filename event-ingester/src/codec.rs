use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;

use crate::error::{DecodeError, EncodeError};
use crate::events::EventSequence;

/// Storage envelope around a normalized sequence.
#[derive(Debug, Serialize, Deserialize)]
struct DatabaseSequence<S> {
    event_sequence: S,
}

/// Decode a raw message payload. Fails fast if `cancel` has been triggered.
pub fn decode_event_sequence(
    cancel: &CancellationToken,
    payload: &[u8],
) -> Result<EventSequence, DecodeError> {
    if cancel.is_cancelled() {
        return Err(DecodeError::Cancelled);
    }
    if payload.is_empty() {
        return Err(DecodeError::Empty);
    }
    Ok(serde_json::from_slice(payload)?)
}

/// Encode a sequence as it is published on the log.
pub fn encode_event_sequence(sequence: &EventSequence) -> Result<Vec<u8>, EncodeError> {
    Ok(serde_json::to_vec(sequence)?)
}

/// Encode a sequence for storage. The routing keys must already be cleared,
/// they are stored as the row key instead.
pub fn encode_normalized(sequence: &EventSequence) -> Result<Vec<u8>, EncodeError> {
    if sequence.has_keys() {
        return Err(EncodeError::KeysNotCleared);
    }
    Ok(serde_json::to_vec(&DatabaseSequence {
        event_sequence: sequence,
    })?)
}

/// Read back a stored (already decompressed) payload.
pub fn decode_normalized(payload: &[u8]) -> Result<EventSequence, DecodeError> {
    if payload.is_empty() {
        return Err(DecodeError::Empty);
    }
    let stored: DatabaseSequence<EventSequence> = serde_json::from_slice(payload)?;
    Ok(stored.event_sequence)
}
