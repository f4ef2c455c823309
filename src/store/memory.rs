//! In-memory `ChatStore` double for tests.
//!
//! Mirrors the hosted store's observable behavior: slot-ordered lookups,
//! history sorted by creation time with insertion order preserved on ties,
//! and missing rows reported as `None`/empty rather than errors. Failure
//! toggles let tests exercise the degraded paths.

use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use async_trait::async_trait;
use uuid::Uuid;

use super::{ChatStore, StoreError, StoredMessage};

#[derive(Default)]
pub struct MemoryStore {
    inner: Mutex<Inner>,
    pub fail_create: AtomicBool,
    pub fail_history: AtomicBool,
    pub fail_append: AtomicBool,
    pub fail_names: AtomicBool,
    /// Number of `display_name` calls, for memoization assertions.
    pub name_lookups: AtomicUsize,
}

#[derive(Default)]
struct Inner {
    /// (id, participant1, participant2) in creation order.
    conversations: Vec<(Uuid, Uuid, Uuid)>,
    messages: Vec<StoredMessage>,
    names: HashMap<Uuid, String>,
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_name(&self, user_id: Uuid, name: &str) {
        let mut inner = self.inner.lock().expect("store mutex should lock");
        inner.names.insert(user_id, name.to_string());
    }

    pub fn conversation_count(&self) -> usize {
        self.inner.lock().expect("store mutex should lock").conversations.len()
    }

    pub fn message_count(&self) -> usize {
        self.inner.lock().expect("store mutex should lock").messages.len()
    }

    fn failing(flag: &AtomicBool) -> Result<(), StoreError> {
        if flag.load(Ordering::Relaxed) {
            return Err(StoreError::Unavailable("simulated storage fault".into()));
        }
        Ok(())
    }
}

#[async_trait]
impl ChatStore for MemoryStore {
    async fn find_conversation(&self, participant1: Uuid, participant2: Uuid) -> Result<Option<Uuid>, StoreError> {
        let inner = self.inner.lock().expect("store mutex should lock");
        Ok(inner
            .conversations
            .iter()
            .find(|(_, p1, p2)| *p1 == participant1 && *p2 == participant2)
            .map(|(id, _, _)| *id))
    }

    async fn create_conversation(&self, participant1: Uuid, participant2: Uuid) -> Result<Uuid, StoreError> {
        Self::failing(&self.fail_create)?;
        let mut inner = self.inner.lock().expect("store mutex should lock");

        // Normalized-pair uniqueness, matching the Postgres index: a racing
        // duplicate insert lands on the earlier-created row.
        if let Some((id, _, _)) = inner
            .conversations
            .iter()
            .find(|(_, p1, p2)| (*p1 == participant1 && *p2 == participant2) || (*p1 == participant2 && *p2 == participant1))
        {
            return Ok(*id);
        }

        let id = Uuid::new_v4();
        inner.conversations.push((id, participant1, participant2));
        Ok(id)
    }

    async fn load_history(&self, conversation_id: Uuid) -> Result<Vec<StoredMessage>, StoreError> {
        Self::failing(&self.fail_history)?;
        let inner = self.inner.lock().expect("store mutex should lock");
        let mut rows: Vec<StoredMessage> = inner
            .messages
            .iter()
            .filter(|m| m.conversation_id == conversation_id)
            .cloned()
            .collect();
        // Stable sort: equal timestamps keep insertion order.
        rows.sort_by_key(|m| m.created_at);
        Ok(rows)
    }

    async fn append_message(&self, message: &StoredMessage) -> Result<(), StoreError> {
        Self::failing(&self.fail_append)?;
        let mut inner = self.inner.lock().expect("store mutex should lock");
        inner.messages.push(message.clone());
        Ok(())
    }

    async fn display_name(&self, user_id: Uuid) -> Result<Option<String>, StoreError> {
        self.name_lookups.fetch_add(1, Ordering::Relaxed);
        Self::failing(&self.fail_names)?;
        let inner = self.inner.lock().expect("store mutex should lock");
        Ok(inner.names.get(&user_id).cloned())
    }
}
