use std::fmt::{Display, Formatter};

use serde::{Deserialize, Serialize};

use super::UtcDateTime;

/// Stable identity of a message within one channel's observation window.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MessageId(String);

impl MessageId {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// Identity for stores that expose no native id: the raw timestamp and
    /// body joined by `|`. Distinct messages with identical timestamp and body
    /// collapse into one.
    pub fn from_timestamp_and_body(timestamp: &str, body: &str) -> Self {
        Self(format!("{timestamp}|{body}"))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for MessageId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// An inbound text message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub id: MessageId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sender: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<UtcDateTime>,
    pub body: String,
}

impl Message {
    pub fn new(id: MessageId, body: impl Into<String>) -> Self {
        Self {
            id,
            sender: None,
            timestamp: None,
            body: body.into(),
        }
    }

    pub fn with_sender(mut self, sender: impl Into<String>) -> Self {
        let sender = sender.into();
        self.sender = if sender.trim().is_empty() {
            None
        } else {
            Some(sender)
        };
        self
    }

    pub fn with_timestamp(mut self, timestamp: UtcDateTime) -> Self {
        self.timestamp = Some(timestamp);
        self
    }
}
