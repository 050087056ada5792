use std::fmt;
use uuid::Uuid;

/// Identifiers threaded through every call made on behalf of one inbound notification.
///
/// `process_id` is minted per HTTP call; `message_id` comes from the decoded notification
/// and stays empty until the payload has been decoded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CorrelationContext {
    pub process_id: Uuid,
    pub message_id: String,
}

impl CorrelationContext {
    pub fn new() -> Self {
        Self {
            process_id: Uuid::new_v4(),
            message_id: String::new(),
        }
    }

    pub fn with_message_id(mut self, message_id: impl Into<String>) -> Self {
        self.message_id = message_id.into();
        self
    }
}

impl Default for CorrelationContext {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for CorrelationContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.message_id.is_empty() {
            write!(f, "process {}", self.process_id)
        } else {
            write!(f, "process {} message {}", self.process_id, self.message_id)
        }
    }
}
