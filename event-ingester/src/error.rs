use thiserror::Error;

/// Errors decoding a raw message payload into an `EventSequence`.
#[derive(Error, Debug)]
pub enum DecodeError {
    #[error("decode cancelled before completion")]
    Cancelled,
    #[error("payload is empty")]
    Empty,
    #[error("payload is not a valid event sequence: {0}")]
    Malformed(#[from] serde_json::Error),
}

/// Errors encoding a normalized sequence for storage.
#[derive(Error, Debug)]
pub enum EncodeError {
    #[error("queue and job set must be cleared before encoding for storage")]
    KeysNotCleared,
    #[error("failed to serialize event sequence: {0}")]
    Serialize(#[from] serde_json::Error),
}

#[derive(Error, Debug)]
pub enum CompressionError {
    #[error("compression failed: {0}")]
    Io(#[from] std::io::Error),
}

/// Why a message was acknowledged without producing a storage row.
#[derive(Error, Debug)]
pub enum SkipReason {
    #[error("message is not a control message")]
    NotControlMessage,
    #[error("message has no sequence index")]
    MissingIndex,
    #[error("payload could not be decoded: {0}")]
    Undecodable(#[from] DecodeError),
}

/// A decoded message that could not be turned into a storage row.
#[derive(Error, Debug)]
pub enum ConversionFailure {
    #[error("could not encode event sequence: {0}")]
    Encode(#[from] EncodeError),
    #[error("could not compress event sequence: {0}")]
    Compress(#[from] CompressionError),
    #[error("publish time cannot be expressed in UTC")]
    PublishTimeOutOfRange,
}

/// Errors that abort a whole batch.
#[derive(Error, Debug)]
pub enum ConverterError {
    #[error("{consecutive} consecutive messages failed conversion, last error: {last}")]
    SystemicFailure {
        consecutive: usize,
        last: ConversionFailure,
    },
}

/// Configuration values that parse but cannot be used together.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum ConfigError {
    #[error("compression level must be between 0 and 9, got {0}")]
    InvalidCompressionLevel(u32),
    #[error("heartbeat interval must be shorter than the liveness deadline")]
    HeartbeatTooSlow,
    #[error("liveness deadline is too large")]
    LivenessDeadlineOutOfRange,
}
