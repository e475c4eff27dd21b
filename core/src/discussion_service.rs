//! Discussion log: append-only messages with per-hunter read watermarks.

use chrono::{DateTime, Utc};
use tracing::debug;

use crate::discussion::DiscussionMessage;
use crate::errors::{HubError, HubResult};
use crate::ids::now_utc;
use crate::store::SqliteStore;

/// Default cap on messages returned by feed queries.
const DEFAULT_MESSAGE_LIMIT: i64 = 100;

/// Append a message to the namespace's discussion log.
pub async fn post_message(
    store: &SqliteStore,
    hunter_id: &str,
    content: &str,
) -> HubResult<DiscussionMessage> {
    if content.trim().is_empty() {
        return Err(HubError::Validation(
            "message content must not be empty".to_string(),
        ));
    }
    let message = DiscussionMessage::new(hunter_id, content);
    store.save_message(&message).await?;
    debug!(hunter_id, message_id = %message.id, "discussion message posted");
    Ok(message)
}

/// Messages strictly after `after`, ascending, up to `limit`.
pub async fn messages_after(
    store: &SqliteStore,
    after: &DateTime<Utc>,
    limit: Option<i64>,
) -> HubResult<Vec<DiscussionMessage>> {
    Ok(store
        .messages_after(after, limit.unwrap_or(DEFAULT_MESSAGE_LIMIT))
        .await?)
}

/// Messages a hunter has not read yet, based on its watermark.
///
/// Hunters that never marked the log as read see everything.
pub async fn unread_messages(
    store: &SqliteStore,
    hunter_id: &str,
) -> HubResult<Vec<DiscussionMessage>> {
    let hunter = store.get_hunter(hunter_id).await?;
    let watermark = hunter
        .and_then(|h| h.last_read_discussion_timestamp)
        .unwrap_or(DateTime::<Utc>::UNIX_EPOCH);
    messages_after(store, &watermark, None).await
}

/// Newest `limit` messages, returned in ascending order.
pub async fn latest_messages(
    store: &SqliteStore,
    limit: Option<i64>,
) -> HubResult<Vec<DiscussionMessage>> {
    Ok(store
        .latest_messages(limit.unwrap_or(DEFAULT_MESSAGE_LIMIT))
        .await?)
}

/// Move a hunter's read watermark to now.
pub async fn mark_as_read(store: &SqliteStore, hunter_id: &str) -> HubResult<()> {
    let mut tx = store.begin().await?;
    let mut hunter = tx
        .get_hunter(hunter_id)
        .await?
        .ok_or_else(|| HubError::NotFound(format!("hunter {}", hunter_id)))?;
    hunter.last_read_discussion_timestamp = Some(now_utc());
    hunter.touch();
    tx.save_hunter(&hunter).await?;
    tx.commit().await?;
    debug!(hunter_id, "discussion marked as read");
    Ok(())
}
