//! Storage boundary — typed access to conversations, messages, profiles.
//!
//! ARCHITECTURE
//! ============
//! The hosted relational store is an external collaborator, so the rest of
//! the service talks to it only through the `ChatStore` trait. Rows are
//! mapped into explicit typed records at this boundary; nothing loosely
//! typed leaks upward.
//!
//! ERROR HANDLING
//! ==============
//! "Not found" is data, not failure: a missing conversation is `Ok(None)`
//! and an empty history is `Ok(vec![])`. Only genuine storage faults become
//! `StoreError`, so callers can tell a quiet conversation from a broken
//! database.

pub mod postgres;

#[cfg(test)]
pub mod memory;

use async_trait::async_trait;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::message::ChatMessage;

// =============================================================================
// TYPES
// =============================================================================

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("storage unavailable: {0}")]
    Unavailable(String),
}

/// A message row as persisted. Names are not stored with the row; sessions
/// resolve them separately when replaying history.
#[derive(Debug, Clone)]
pub struct StoredMessage {
    pub id: Uuid,
    pub conversation_id: Uuid,
    pub sender_id: Uuid,
    pub content: String,
    pub created_at: OffsetDateTime,
}

impl StoredMessage {
    /// Build the durable row for a message, reusing the client-assigned id
    /// and timestamp so the persisted view matches the broadcast view.
    #[must_use]
    pub fn from_message(msg: &ChatMessage, conversation_id: Uuid) -> Self {
        Self {
            id: msg.id,
            conversation_id,
            sender_id: msg.user.id,
            content: msg.content.clone(),
            created_at: msg.created_at,
        }
    }
}

// =============================================================================
// TRAIT
// =============================================================================

/// Durable read/write operations the chat core needs from the hosted store.
#[async_trait]
pub trait ChatStore: Send + Sync {
    /// Point lookup with the given slot assignment. The caller is
    /// responsible for trying both assignments of an unordered pair.
    async fn find_conversation(&self, participant1: Uuid, participant2: Uuid) -> Result<Option<Uuid>, StoreError>;

    /// Insert a conversation with a fixed slot assignment and return its id.
    async fn create_conversation(&self, participant1: Uuid, participant2: Uuid) -> Result<Uuid, StoreError>;

    /// All messages for a conversation, ordered by creation time ascending.
    /// An unknown or empty conversation yields an empty vec.
    async fn load_history(&self, conversation_id: Uuid) -> Result<Vec<StoredMessage>, StoreError>;

    /// Persist a single message keyed by its pre-assigned id.
    async fn append_message(&self, message: &StoredMessage) -> Result<(), StoreError>;

    /// Resolve a participant id to a display name. `Ok(None)` if the user
    /// has no profile row.
    async fn display_name(&self, user_id: Uuid) -> Result<Option<String>, StoreError>;
}
