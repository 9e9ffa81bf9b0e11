//! PostgreSQL implementation of MessageRepository

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::types::Json;
use sqlx::PgPool;
use tracing::instrument;

use convo_core::entities::{Message, MessageStamp};
use convo_core::error::DomainError;
use convo_core::traits::{MessageRepository, RepoResult};
use convo_core::value_objects::Snowflake;

use crate::mappers::id_array;
use crate::models::{MessageModel, MessageStampModel};

use super::error::{map_db_error, map_foreign_key_violation};

const COLUMNS: &str = "id, conversation_id, sender_id, content, message_type, is_edited, \
                       edited_at, is_deleted, deleted_at, reply_to_id, metadata, \
                       created_at, updated_at";

/// PostgreSQL implementation of MessageRepository
#[derive(Clone)]
pub struct PgMessageRepository {
    pool: PgPool,
}

impl PgMessageRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl MessageRepository for PgMessageRepository {
    #[instrument(skip(self))]
    async fn find_by_id(&self, id: Snowflake) -> RepoResult<Option<Message>> {
        let result = sqlx::query_as::<_, MessageModel>(&format!(
            "SELECT {COLUMNS} FROM messages WHERE id = $1"
        ))
        .bind(id.into_inner())
        .fetch_optional(&self.pool)
        .await
        .map_err(map_db_error)?;

        Ok(result.map(Message::from))
    }

    #[instrument(skip(self))]
    async fn find_latest(&self, conversation_id: Snowflake, limit: i64) -> RepoResult<Vec<Message>> {
        let results = sqlx::query_as::<_, MessageModel>(&format!(
            "SELECT {COLUMNS} FROM messages \
             WHERE conversation_id = $1 \
             ORDER BY created_at DESC, id DESC \
             LIMIT $2"
        ))
        .bind(conversation_id.into_inner())
        .bind(limit.max(1))
        .fetch_all(&self.pool)
        .await
        .map_err(map_db_error)?;

        Ok(results.into_iter().map(Message::from).collect())
    }

    #[instrument(skip(self, conversation_ids), fields(count = conversation_ids.len()))]
    async fn find_latest_per_conversation(
        &self,
        conversation_ids: &[Snowflake],
    ) -> RepoResult<Vec<Message>> {
        if conversation_ids.is_empty() {
            return Ok(Vec::new());
        }

        // DISTINCT ON keeps the first row per conversation in the ORDER BY,
        // i.e. the newest one.
        let results = sqlx::query_as::<_, MessageModel>(&format!(
            "SELECT DISTINCT ON (conversation_id) {COLUMNS} FROM messages \
             WHERE conversation_id = ANY($1) AND is_deleted = FALSE \
             ORDER BY conversation_id, created_at DESC, id DESC"
        ))
        .bind(id_array(conversation_ids))
        .fetch_all(&self.pool)
        .await
        .map_err(map_db_error)?;

        let mut messages: Vec<Message> = results.into_iter().map(Message::from).collect();
        messages.sort_by(|a, b| b.order_key().cmp(&a.order_key()));
        Ok(messages)
    }

    #[instrument(skip(self, conversation_ids), fields(count = conversation_ids.len()))]
    async fn find_unread_candidates(
        &self,
        conversation_ids: &[Snowflake],
        excluding_sender: Snowflake,
        since: Option<DateTime<Utc>>,
    ) -> RepoResult<Vec<MessageStamp>> {
        if conversation_ids.is_empty() {
            return Ok(Vec::new());
        }

        let results = sqlx::query_as::<_, MessageStampModel>(
            r#"
            SELECT id, conversation_id, sender_id, created_at
            FROM messages
            WHERE conversation_id = ANY($1)
              AND is_deleted = FALSE
              AND sender_id <> $2
              AND ($3::timestamptz IS NULL OR created_at > $3)
            "#,
        )
        .bind(id_array(conversation_ids))
        .bind(excluding_sender.into_inner())
        .bind(since)
        .fetch_all(&self.pool)
        .await
        .map_err(map_db_error)?;

        Ok(results.into_iter().map(MessageStamp::from).collect())
    }

    #[instrument(skip(self, message), fields(message_id = %message.id))]
    async fn create(&self, message: &Message) -> RepoResult<Message> {
        let stored = sqlx::query_as::<_, MessageModel>(&format!(
            "INSERT INTO messages \
                 (id, conversation_id, sender_id, content, message_type, is_edited, edited_at, \
                  is_deleted, deleted_at, reply_to_id, metadata) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11) \
             RETURNING {COLUMNS}"
        ))
        .bind(message.id.into_inner())
        .bind(message.conversation_id.into_inner())
        .bind(message.sender_id.into_inner())
        .bind(&message.content)
        .bind(message.message_type.as_str())
        .bind(message.is_edited)
        .bind(message.edited_at)
        .bind(message.is_deleted)
        .bind(message.deleted_at)
        .bind(message.reply_to_id.map(Snowflake::into_inner))
        .bind(message.metadata.clone().map(Json))
        .fetch_one(&self.pool)
        .await
        .map_err(|e| {
            map_foreign_key_violation(e, || {
                DomainError::ConversationNotFound(message.conversation_id)
            })
        })?;

        Ok(Message::from(stored))
    }

    #[instrument(skip(self, content))]
    async fn update_content(
        &self,
        id: Snowflake,
        content: &str,
        edited_at: DateTime<Utc>,
    ) -> RepoResult<bool> {
        let result = sqlx::query(
            r#"
            UPDATE messages
            SET content = $2, is_edited = TRUE, edited_at = $3, updated_at = $3
            WHERE id = $1 AND is_deleted = FALSE
            "#,
        )
        .bind(id.into_inner())
        .bind(content)
        .bind(edited_at)
        .execute(&self.pool)
        .await
        .map_err(map_db_error)?;

        Ok(result.rows_affected() > 0)
    }

    #[instrument(skip(self))]
    async fn soft_delete(&self, id: Snowflake, at: DateTime<Utc>) -> RepoResult<bool> {
        let result = sqlx::query(
            r#"
            UPDATE messages
            SET is_deleted = TRUE, deleted_at = $2, content = NULL, updated_at = $2
            WHERE id = $1 AND is_deleted = FALSE
            "#,
        )
        .bind(id.into_inner())
        .bind(at)
        .execute(&self.pool)
        .await
        .map_err(map_db_error)?;

        Ok(result.rows_affected() > 0)
    }

    #[instrument(skip(self))]
    async fn soft_delete_conversation(
        &self,
        conversation_id: Snowflake,
        at: DateTime<Utc>,
    ) -> RepoResult<u64> {
        let result = sqlx::query(
            r#"
            UPDATE messages
            SET is_deleted = TRUE, deleted_at = COALESCE(deleted_at, $2),
                content = NULL, updated_at = $2
            WHERE conversation_id = $1
              AND (is_deleted = FALSE OR content IS NOT NULL)
            "#,
        )
        .bind(conversation_id.into_inner())
        .bind(at)
        .execute(&self.pool)
        .await
        .map_err(map_db_error)?;

        Ok(result.rows_affected())
    }

    #[instrument(skip(self))]
    async fn ids_for_conversation(&self, conversation_id: Snowflake) -> RepoResult<Vec<Snowflake>> {
        let results = sqlx::query_scalar::<_, i64>(
            "SELECT id FROM messages WHERE conversation_id = $1 ORDER BY created_at, id",
        )
        .bind(conversation_id.into_inner())
        .fetch_all(&self.pool)
        .await
        .map_err(map_db_error)?;

        Ok(results.into_iter().map(Snowflake::new).collect())
    }

    #[instrument(skip(self))]
    async fn latest_created_at(
        &self,
        conversation_id: Snowflake,
    ) -> RepoResult<Option<DateTime<Utc>>> {
        sqlx::query_scalar::<_, Option<DateTime<Utc>>>(
            "SELECT MAX(created_at) FROM messages WHERE conversation_id = $1",
        )
        .bind(conversation_id.into_inner())
        .fetch_one(&self.pool)
        .await
        .map_err(map_db_error)
    }
}
