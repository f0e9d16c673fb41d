//! Conversion stage between the event log and the event store.
//!
//! Batches of raw log messages go in, `BatchUpdate`s come out: one ack handle
//! per consumed message, plus one compressed storage row per usable event
//! sequence. Persisting rows and acking messages is left to the caller.

pub mod codec;
pub mod compress;
pub mod config;
pub mod converter;
pub mod error;
pub mod events;
pub mod message;
pub mod model;
pub mod stage;

pub use converter::MessageRowConverter;
pub use model::{BatchUpdate, MessageOutcome, Outcome, StorageRow};
pub use stage::{convert, ConversionStage};
