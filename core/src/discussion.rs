//! Append-only discussion log messages.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::ids::{generate_id, now_utc};

/// A single message in a namespace's discussion log.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DiscussionMessage {
    /// Unique identifier (`discussion-<random>`)
    pub id: String,

    /// Author
    pub hunter_id: String,

    /// Message body
    pub content: String,

    /// Append timestamp; messages are ordered by this field
    pub created_at: DateTime<Utc>,
}

impl DiscussionMessage {
    /// Create a new message stamped with the current time.
    pub fn new(hunter_id: impl Into<String>, content: impl Into<String>) -> Self {
        DiscussionMessage {
            id: generate_id("discussion"),
            hunter_id: hunter_id.into(),
            content: content.into(),
            created_at: now_utc(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_message() {
        let message = DiscussionMessage::new("hunter-1", "claiming the parser task");
        assert!(message.id.starts_with("discussion-"));
        assert_eq!(message.hunter_id, "hunter-1");
        assert_eq!(message.content, "claiming the parser task");
    }
}
