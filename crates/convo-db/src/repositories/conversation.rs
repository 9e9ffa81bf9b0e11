//! PostgreSQL implementation of ConversationRepository

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use tracing::instrument;

use convo_core::entities::{Conversation, DirectPair};
use convo_core::error::DomainError;
use convo_core::traits::{ConversationRepository, RepoResult};
use convo_core::value_objects::Snowflake;

use crate::mappers::id_array;
use crate::models::ConversationModel;

use super::error::map_db_error;

const COLUMNS: &str = "id, kind, name, description, avatar_url, created_by, created_at, \
                       updated_at, last_message_at, is_archived";

/// PostgreSQL implementation of ConversationRepository
#[derive(Clone)]
pub struct PgConversationRepository {
    pool: PgPool,
}

impl PgConversationRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ConversationRepository for PgConversationRepository {
    #[instrument(skip(self))]
    async fn find_by_id(&self, id: Snowflake) -> RepoResult<Option<Conversation>> {
        let result = sqlx::query_as::<_, ConversationModel>(&format!(
            "SELECT {COLUMNS} FROM conversations WHERE id = $1"
        ))
        .bind(id.into_inner())
        .fetch_optional(&self.pool)
        .await
        .map_err(map_db_error)?;

        Ok(result.map(Conversation::from))
    }

    #[instrument(skip(self, ids), fields(count = ids.len()))]
    async fn find_by_ids(&self, ids: &[Snowflake]) -> RepoResult<Vec<Conversation>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let results = sqlx::query_as::<_, ConversationModel>(&format!(
            "SELECT {COLUMNS} FROM conversations \
             WHERE id = ANY($1) \
             ORDER BY last_message_at DESC NULLS LAST, id DESC"
        ))
        .bind(id_array(ids))
        .fetch_all(&self.pool)
        .await
        .map_err(map_db_error)?;

        Ok(results.into_iter().map(Conversation::from).collect())
    }

    #[instrument(skip(self, conversation), fields(conversation_id = %conversation.id))]
    async fn create(&self, conversation: &Conversation) -> RepoResult<()> {
        sqlx::query(
            r#"
            INSERT INTO conversations
                (id, kind, name, description, avatar_url, created_by,
                 created_at, updated_at, last_message_at, is_archived)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            "#,
        )
        .bind(conversation.id.into_inner())
        .bind(conversation.kind.as_str())
        .bind(&conversation.name)
        .bind(&conversation.description)
        .bind(&conversation.avatar_url)
        .bind(conversation.created_by.into_inner())
        .bind(conversation.created_at)
        .bind(conversation.updated_at)
        .bind(conversation.last_message_at)
        .bind(conversation.is_archived)
        .execute(&self.pool)
        .await
        .map_err(map_db_error)?;

        Ok(())
    }

    #[instrument(skip(self))]
    async fn find_direct(&self, pair: DirectPair) -> RepoResult<Option<Snowflake>> {
        let id: Option<i64> = sqlx::query_scalar("SELECT id FROM conversations WHERE direct_key = $1")
            .bind(pair.key())
            .fetch_optional(&self.pool)
            .await
            .map_err(map_db_error)?;

        Ok(id.map(Snowflake::new))
    }

    #[instrument(skip(self, conversation), fields(conversation_id = %conversation.id))]
    async fn create_direct(&self, conversation: &Conversation, pair: DirectPair) -> RepoResult<Snowflake> {
        // Losing the race to a concurrent insert returns no row
        let inserted: Option<i64> = sqlx::query_scalar(
            r#"
            INSERT INTO conversations
                (id, kind, name, description, avatar_url, created_by,
                 created_at, updated_at, last_message_at, is_archived, direct_key)
            VALUES ($1, 'direct', NULL, NULL, NULL, $2, $3, $4, NULL, FALSE, $5)
            ON CONFLICT (direct_key) DO NOTHING
            RETURNING id
            "#,
        )
        .bind(conversation.id.into_inner())
        .bind(conversation.created_by.into_inner())
        .bind(conversation.created_at)
        .bind(conversation.updated_at)
        .bind(pair.key())
        .fetch_optional(&self.pool)
        .await
        .map_err(map_db_error)?;

        if let Some(id) = inserted {
            return Ok(Snowflake::new(id));
        }
        self.find_direct(pair)
            .await?
            .ok_or_else(|| DomainError::DatabaseError(format!("direct pair {} vanished", pair.key())))
    }

    #[instrument(skip(self, conversation), fields(conversation_id = %conversation.id))]
    async fn update(&self, conversation: &Conversation) -> RepoResult<()> {
        let result = sqlx::query(
            r#"
            UPDATE conversations
            SET name = $2, description = $3, avatar_url = $4, is_archived = $5,
                updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(conversation.id.into_inner())
        .bind(&conversation.name)
        .bind(&conversation.description)
        .bind(&conversation.avatar_url)
        .bind(conversation.is_archived)
        .execute(&self.pool)
        .await
        .map_err(map_db_error)?;

        if result.rows_affected() == 0 {
            return Err(DomainError::ConversationNotFound(conversation.id));
        }

        Ok(())
    }

    #[instrument(skip(self))]
    async fn touch_last_message(&self, id: Snowflake, at: DateTime<Utc>) -> RepoResult<()> {
        sqlx::query(
            r#"
            UPDATE conversations
            SET last_message_at = $2
            WHERE id = $1
              AND (last_message_at IS NULL OR last_message_at < $2)
            "#,
        )
        .bind(id.into_inner())
        .bind(at)
        .execute(&self.pool)
        .await
        .map_err(map_db_error)?;

        Ok(())
    }
}
