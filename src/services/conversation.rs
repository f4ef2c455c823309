//! Conversation resolver — find-or-create for a participant pair.
//!
//! DESIGN
//! ======
//! The pair is unordered but the storage slots are not, so the lookup tries
//! both slot assignments and accepts the first hit. Creation uses a fixed
//! assignment (caller's id in slot one). The store's normalized-pair
//! constraint makes a concurrent first-contact race converge on the
//! earlier-created row, so sequential resolves are idempotent and symmetric
//! without any cross-session locking.

use uuid::Uuid;

use crate::store::{ChatStore, StoreError};

/// Resolve the canonical conversation id for an unordered participant pair,
/// creating the conversation on first contact.
///
/// # Errors
///
/// Propagates a storage error from lookup or creation. A missing row is a
/// valid negative result, not an error.
pub async fn resolve(store: &dyn ChatStore, user_a: Uuid, user_b: Uuid) -> Result<Uuid, StoreError> {
    if let Some(id) = store.find_conversation(user_a, user_b).await? {
        return Ok(id);
    }
    if let Some(id) = store.find_conversation(user_b, user_a).await? {
        return Ok(id);
    }
    store.create_conversation(user_a, user_b).await
}

#[cfg(test)]
#[path = "conversation_test.rs"]
mod tests;
