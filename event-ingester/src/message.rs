use std::collections::HashMap;
use std::fmt;

use bytes::Bytes;
use time::OffsetDateTime;

/// Message property carrying the message category.
pub const MESSAGE_TYPE_PROPERTY: &str = "messageType";
/// Value of `MESSAGE_TYPE_PROPERTY` for messages holding event sequences.
pub const CONTROL_MESSAGE_TYPE: &str = "control";

/// Log-assigned message identifier. Opaque to this crate.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MessageId(String);

impl MessageId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Identifies the consumer that received a message, acks must go back through it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConsumerId(pub usize);

impl fmt::Display for ConsumerId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// One message as delivered by the log.
#[derive(Debug, Clone)]
pub struct RawMessage {
    pub id: MessageId,
    pub consumer: ConsumerId,
    pub payload: Bytes,
    pub publish_time: OffsetDateTime,
    /// Present when the message takes part in ordered event sequencing.
    pub index: Option<u64>,
    pub properties: HashMap<String, String>,
}

impl RawMessage {
    pub fn new(
        id: MessageId,
        consumer: ConsumerId,
        payload: impl Into<Bytes>,
        publish_time: OffsetDateTime,
    ) -> Self {
        Self {
            id,
            consumer,
            payload: payload.into(),
            publish_time,
            index: None,
            properties: HashMap::new(),
        }
    }

    pub fn with_index(mut self, index: u64) -> Self {
        self.index = Some(index);
        self
    }

    pub fn with_property(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.properties.insert(key.into(), value.into());
        self
    }

    /// Tag the message as a control message.
    pub fn control(self) -> Self {
        self.with_property(MESSAGE_TYPE_PROPERTY, CONTROL_MESSAGE_TYPE)
    }

    pub fn is_control_message(&self) -> bool {
        self.properties
            .get(MESSAGE_TYPE_PROPERTY)
            .is_some_and(|t| t == CONTROL_MESSAGE_TYPE)
    }

    pub fn ack_handle(&self) -> AckHandle {
        AckHandle {
            id: self.id.clone(),
            consumer: self.consumer,
        }
    }
}

/// Commit instruction for the log. Carries no payload.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct AckHandle {
    pub id: MessageId,
    pub consumer: ConsumerId,
}
