//! Message — the universal payload type for `PairChat`.
//!
//! DESIGN
//! ======
//! A message carries a client-generated id and creation timestamp, assigned
//! once at send time. The same values travel through all three views of the
//! message — the sender's optimistic copy, the broadcast payload, and the
//! persisted row — so the views reconcile by id without any server-side
//! rewriting.
//!
//! Events on the realtime channel are a tagged envelope; only the `message`
//! event type is recognized. Anything else fails to deserialize at the
//! channel boundary and is dropped there.

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

// =============================================================================
// TYPES
// =============================================================================

/// The participant a message came from, as embedded in the wire payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Sender {
    pub id: Uuid,
    pub name: String,
}

/// A chat message as it appears in the session-local list and on the wire.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub id: Uuid,
    pub content: String,
    pub user: Sender,
    /// RFC 3339, client-generated at send time and reused verbatim across
    /// the optimistic, broadcast, and persisted views.
    #[serde(rename = "createdAt", with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

/// Envelope for realtime channel traffic, tagged by event type.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "event", content = "payload", rename_all = "lowercase")]
pub enum ChatEvent {
    Message(ChatMessage),
}

// =============================================================================
// CONSTRUCTORS
// =============================================================================

impl ChatMessage {
    /// Create a new message with a fresh id and the current time.
    /// Entry point for every send.
    pub fn new(content: impl Into<String>, sender_id: Uuid, sender_name: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            content: content.into(),
            user: Sender { id: sender_id, name: sender_name.into() },
            created_at: OffsetDateTime::now_utc(),
        }
    }
}

/// Empty or whitespace-only content is rejected before any side effect.
#[must_use]
pub fn is_blank(content: &str) -> bool {
    content.trim().is_empty()
}

// =============================================================================
// TESTS
// =============================================================================
