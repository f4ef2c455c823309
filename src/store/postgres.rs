//! Postgres-backed `ChatStore`.
//!
//! DESIGN
//! ======
//! Straight sqlx queries over the shared pool. Conversation creation races
//! between two first-contact sessions are closed at the schema: a unique
//! index over the normalized participant pair plus `ON CONFLICT DO NOTHING`
//! and a re-lookup, so the earlier-created row always wins.

use sqlx::PgPool;
use time::OffsetDateTime;
use uuid::Uuid;

use super::{ChatStore, StoreError, StoredMessage};

#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Lookup ignoring slot order, preferring the earlier-created row.
    async fn find_either_order(&self, a: Uuid, b: Uuid) -> Result<Option<Uuid>, sqlx::Error> {
        sqlx::query_scalar(
            "SELECT id FROM conversations
             WHERE (participant1_id = $1 AND participant2_id = $2)
                OR (participant1_id = $2 AND participant2_id = $1)
             ORDER BY created_at ASC
             LIMIT 1",
        )
        .bind(a)
        .bind(b)
        .fetch_optional(&self.pool)
        .await
    }
}

#[async_trait::async_trait]
impl ChatStore for PgStore {
    async fn find_conversation(&self, participant1: Uuid, participant2: Uuid) -> Result<Option<Uuid>, StoreError> {
        let id = sqlx::query_scalar(
            "SELECT id FROM conversations WHERE participant1_id = $1 AND participant2_id = $2",
        )
        .bind(participant1)
        .bind(participant2)
        .fetch_optional(&self.pool)
        .await?;
        Ok(id)
    }

    async fn create_conversation(&self, participant1: Uuid, participant2: Uuid) -> Result<Uuid, StoreError> {
        let id = Uuid::new_v4();
        let result = sqlx::query(
            "INSERT INTO conversations (id, participant1_id, participant2_id)
             VALUES ($1, $2, $3)
             ON CONFLICT (LEAST(participant1_id, participant2_id), GREATEST(participant1_id, participant2_id))
             DO NOTHING",
        )
        .bind(id)
        .bind(participant1)
        .bind(participant2)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 1 {
            return Ok(id);
        }

        // Lost a concurrent first-contact race; the surviving row wins.
        match self.find_either_order(participant1, participant2).await? {
            Some(existing) => Ok(existing),
            None => Err(StoreError::Database(sqlx::Error::RowNotFound)),
        }
    }

    async fn load_history(&self, conversation_id: Uuid) -> Result<Vec<StoredMessage>, StoreError> {
        let rows = sqlx::query_as::<_, (Uuid, Uuid, Uuid, String, OffsetDateTime)>(
            "SELECT id, conversation_id, sender_id, content, created_at
             FROM messages
             WHERE conversation_id = $1
             ORDER BY created_at ASC, id ASC",
        )
        .bind(conversation_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|(id, conversation_id, sender_id, content, created_at)| StoredMessage {
                id,
                conversation_id,
                sender_id,
                content,
                created_at,
            })
            .collect())
    }

    async fn append_message(&self, message: &StoredMessage) -> Result<(), StoreError> {
        sqlx::query(
            "INSERT INTO messages (id, conversation_id, sender_id, content, created_at)
             VALUES ($1, $2, $3, $4, $5)",
        )
        .bind(message.id)
        .bind(message.conversation_id)
        .bind(message.sender_id)
        .bind(&message.content)
        .bind(message.created_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn display_name(&self, user_id: Uuid) -> Result<Option<String>, StoreError> {
        let name = sqlx::query_scalar("SELECT username FROM profiles WHERE id = $1")
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(name)
    }
}

#[cfg(test)]
#[path = "postgres_test.rs"]
mod tests;
