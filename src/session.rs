//! Chat session controller — orchestration for one active chat.
//!
//! LIFECYCLE
//! =========
//! 1. `new` → `Initializing`; the session knows its participants only.
//! 2. `open` → resolve conversation → `LoadingHistory` → hydrate (sorted,
//!    display names memoized) → `Subscribing` → channel ack → `Ready`.
//! 3. `Ready` → `send` and `apply_event` interleave on the owning task's
//!    event loop, which is the single serialized update path for the
//!    session-local message list.
//! 4. `close` → liveness cleared, channel released. There is no terminal
//!    phase; the session ends when its owning connection tears it down.
//!
//! ERROR HANDLING
//! ==============
//! Resolution failure is the only fatal error: without a conversation id
//! the session cannot function. Everything on the hot path degrades:
//! history faults hydrate empty, missing profiles render as "Unknown", and
//! persistence failures are logged without rolling back the optimistic
//! append — the realtime path is the primary delivery guarantee.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::hub::{ChannelBinding, ChannelHub};
use crate::message::{self, ChatEvent, ChatMessage, Sender};
use crate::services::conversation;
use crate::store::{ChatStore, StoreError, StoredMessage};

const UNKNOWN_SENDER: &str = "Unknown";

// =============================================================================
// TYPES
// =============================================================================

/// Orchestration phase. `Ready` is the steady state in which sends and
/// receives both occur.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionPhase {
    Initializing,
    LoadingHistory,
    Subscribing,
    Ready,
}

#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("could not open conversation: {0}")]
    Resolve(#[source] StoreError),
}

/// One active chat screen's state: the conversation identity, the session-
/// local message list, and the channel binding. Owned by exactly one
/// connection task; all mutation goes through that task's event loop.
pub struct ChatSession {
    store: Arc<dyn ChatStore>,
    binding: ChannelBinding,
    user_id: Uuid,
    user_name: String,
    peer_id: Uuid,
    conversation_id: Option<Uuid>,
    messages: Vec<ChatMessage>,
    /// Display names memoized per sender id. The working set is the two
    /// participants, so there is no eviction.
    names: HashMap<Uuid, String>,
    phase: SessionPhase,
    /// Cleared on teardown so late-arriving async results are discarded.
    live: bool,
}

// =============================================================================
// LIFECYCLE
// =============================================================================

impl ChatSession {
    #[must_use]
    pub fn new(
        store: Arc<dyn ChatStore>,
        hub: Arc<ChannelHub>,
        user_id: Uuid,
        user_name: impl Into<String>,
        peer_id: Uuid,
    ) -> Self {
        let user_name = user_name.into();
        let mut names = HashMap::new();
        names.insert(user_id, user_name.clone());

        Self {
            store,
            binding: ChannelBinding::new(hub, user_id, peer_id),
            user_id,
            user_name,
            peer_id,
            conversation_id: None,
            messages: Vec::new(),
            names,
            phase: SessionPhase::Initializing,
            live: true,
        }
    }

    /// Resolve the conversation, hydrate history, and open the channel.
    /// Returns the inbound event receiver for the owning event loop.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::Resolve` if the conversation cannot be found
    /// or created; the session is unusable in that case.
    pub async fn open(&mut self) -> Result<mpsc::Receiver<ChatEvent>, SessionError> {
        let conversation_id = conversation::resolve(self.store.as_ref(), self.user_id, self.peer_id)
            .await
            .map_err(SessionError::Resolve)?;
        self.conversation_id = Some(conversation_id);
        info!(%conversation_id, user_id = %self.user_id, peer_id = %self.peer_id, "session: conversation resolved");

        self.phase = SessionPhase::LoadingHistory;
        self.messages = self.hydrate(conversation_id).await;

        self.phase = SessionPhase::Subscribing;
        let rx = self.binding.connect();
        self.phase = SessionPhase::Ready;
        info!(channel = %self.binding.channel(), history = self.messages.len(), "session: ready");

        Ok(rx)
    }

    /// End the session: stop accepting async results and release the
    /// channel subscription.
    pub fn close(&mut self) {
        self.live = false;
        self.binding.close();
        info!(user_id = %self.user_id, "session: closed");
    }

    async fn hydrate(&mut self, conversation_id: Uuid) -> Vec<ChatMessage> {
        let rows = match self.store.load_history(conversation_id).await {
            Ok(rows) => rows,
            Err(e) => {
                // A storage fault degrades to an empty chat rather than an
                // error screen; the log line keeps it distinguishable from
                // a genuinely empty conversation.
                error!(error = %e, %conversation_id, "session: history load failed; starting empty");
                return Vec::new();
            }
        };

        let mut messages = Vec::with_capacity(rows.len());
        for row in rows {
            let name = self.sender_name(row.sender_id).await;
            messages.push(ChatMessage {
                id: row.id,
                content: row.content,
                user: Sender { id: row.sender_id, name },
                created_at: row.created_at,
            });
        }
        messages
    }

    async fn sender_name(&mut self, sender_id: Uuid) -> String {
        if let Some(name) = self.names.get(&sender_id) {
            return name.clone();
        }
        let name = match self.store.display_name(sender_id).await {
            Ok(Some(name)) => name,
            Ok(None) => UNKNOWN_SENDER.to_string(),
            Err(e) => {
                warn!(error = %e, %sender_id, "session: display name lookup failed");
                UNKNOWN_SENDER.to_string()
            }
        };
        self.names.insert(sender_id, name.clone());
        name
    }
}

// =============================================================================
// SEND / RECEIVE
// =============================================================================

impl ChatSession {
    /// Send a message: optimistic local append, realtime publish, then
    /// best-effort persistence — none of the three waits on the others'
    /// durable completion.
    ///
    /// Returns the appended message, or `None` when the send was rejected
    /// before any side effect: blank content, unresolved conversation, or
    /// a channel that has not reached connected.
    pub fn send(&mut self, content: &str) -> Option<ChatMessage> {
        if message::is_blank(content) {
            return None;
        }
        let Some(conversation_id) = self.conversation_id else {
            return None;
        };
        if !self.binding.is_connected() {
            return None;
        }

        let msg = ChatMessage::new(content, self.user_id, self.user_name.clone());

        // Optimistic append: the sender sees the message in the same
        // synchronous turn, before any network acknowledgement.
        self.messages.push(msg.clone());

        self.binding.send(&ChatEvent::Message(msg.clone()));
        self.persist_fire_and_forget(StoredMessage::from_message(&msg, conversation_id));

        Some(msg)
    }

    /// Relay an inbound channel event into the local list, verbatim and in
    /// arrival order. Dropped once the session has been torn down.
    pub fn apply_event(&mut self, event: ChatEvent) {
        if !self.live {
            return;
        }
        let ChatEvent::Message(msg) = event;
        self.messages.push(msg);
    }

    fn persist_fire_and_forget(&self, row: StoredMessage) {
        let store = Arc::clone(&self.store);
        tokio::spawn(async move {
            if let Err(e) = store.append_message(&row).await {
                // Non-fatal: the message already went out on the realtime
                // path and stays visible locally. It will be absent from
                // history loaded by sessions that join later.
                warn!(error = %e, id = %row.id, "session: message persist failed");
            }
        });
    }
}

// =============================================================================
// ACCESSORS
// =============================================================================

impl ChatSession {
    #[must_use]
    pub fn messages(&self) -> &[ChatMessage] {
        &self.messages
    }

    #[must_use]
    pub fn conversation_id(&self) -> Option<Uuid> {
        self.conversation_id
    }

    #[must_use]
    pub fn phase(&self) -> SessionPhase {
        self.phase
    }

    #[must_use]
    pub fn is_ready(&self) -> bool {
        self.phase == SessionPhase::Ready && self.binding.is_connected()
    }

    #[cfg(test)]
    pub(crate) fn drop_connection(&mut self) {
        self.binding.close();
    }
}

#[cfg(test)]
#[path = "session_test.rs"]
mod tests;
