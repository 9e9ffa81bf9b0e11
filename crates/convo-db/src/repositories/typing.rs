//! PostgreSQL implementation of TypingRepository

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use tracing::instrument;

use convo_core::entities::TypingIndicator;
use convo_core::error::DomainError;
use convo_core::traits::{RepoResult, TypingRepository};
use convo_core::value_objects::Snowflake;

use crate::models::TypingIndicatorModel;

use super::error::{map_db_error, map_foreign_key_violation};

/// PostgreSQL implementation of TypingRepository
#[derive(Clone)]
pub struct PgTypingRepository {
    pool: PgPool,
}

impl PgTypingRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl TypingRepository for PgTypingRepository {
    #[instrument(skip(self, indicator), fields(conversation_id = %indicator.conversation_id))]
    async fn upsert(&self, indicator: &TypingIndicator) -> RepoResult<()> {
        sqlx::query(
            r#"
            INSERT INTO typing_indicators (conversation_id, user_id, started_at)
            VALUES ($1, $2, $3)
            ON CONFLICT (conversation_id, user_id)
            DO UPDATE SET started_at = EXCLUDED.started_at
            "#,
        )
        .bind(indicator.conversation_id.into_inner())
        .bind(indicator.user_id.into_inner())
        .bind(indicator.started_at)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            map_foreign_key_violation(e, || {
                DomainError::ConversationNotFound(indicator.conversation_id)
            })
        })?;

        Ok(())
    }

    #[instrument(skip(self))]
    async fn delete(&self, conversation_id: Snowflake, user_id: Snowflake) -> RepoResult<bool> {
        let result = sqlx::query(
            "DELETE FROM typing_indicators WHERE conversation_id = $1 AND user_id = $2",
        )
        .bind(conversation_id.into_inner())
        .bind(user_id.into_inner())
        .execute(&self.pool)
        .await
        .map_err(map_db_error)?;

        Ok(result.rows_affected() > 0)
    }

    #[instrument(skip(self))]
    async fn list(&self, conversation_id: Snowflake) -> RepoResult<Vec<TypingIndicator>> {
        let results = sqlx::query_as::<_, TypingIndicatorModel>(
            r#"
            SELECT conversation_id, user_id, started_at
            FROM typing_indicators
            WHERE conversation_id = $1
            ORDER BY started_at
            "#,
        )
        .bind(conversation_id.into_inner())
        .fetch_all(&self.pool)
        .await
        .map_err(map_db_error)?;

        Ok(results.into_iter().map(TypingIndicator::from).collect())
    }

    #[instrument(skip(self))]
    async fn delete_stale(
        &self,
        conversation_id: Snowflake,
        before: DateTime<Utc>,
    ) -> RepoResult<u64> {
        let result = sqlx::query(
            "DELETE FROM typing_indicators WHERE conversation_id = $1 AND started_at < $2",
        )
        .bind(conversation_id.into_inner())
        .bind(before)
        .execute(&self.pool)
        .await
        .map_err(map_db_error)?;

        Ok(result.rows_affected())
    }
}
