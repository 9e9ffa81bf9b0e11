//! PostgreSQL implementation of ReadReceiptRepository

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use tracing::instrument;

use convo_core::entities::ReadReceipt;
use convo_core::error::DomainError;
use convo_core::traits::{ReadReceiptRepository, RepoResult};
use convo_core::value_objects::Snowflake;

use crate::mappers::id_array;
use crate::models::ReadReceiptModel;

use super::error::{map_db_error, map_foreign_key_violation};

/// PostgreSQL implementation of ReadReceiptRepository
#[derive(Clone)]
pub struct PgReadReceiptRepository {
    pool: PgPool,
}

impl PgReadReceiptRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ReadReceiptRepository for PgReadReceiptRepository {
    #[instrument(skip(self, message_ids), fields(count = message_ids.len()))]
    async fn find_by_messages(&self, message_ids: &[Snowflake]) -> RepoResult<Vec<ReadReceipt>> {
        if message_ids.is_empty() {
            return Ok(Vec::new());
        }

        let results = sqlx::query_as::<_, ReadReceiptModel>(
            r#"
            SELECT message_id, user_id, delivered_at, read_at
            FROM message_read_receipts
            WHERE message_id = ANY($1)
            "#,
        )
        .bind(id_array(message_ids))
        .fetch_all(&self.pool)
        .await
        .map_err(map_db_error)?;

        Ok(results.into_iter().map(ReadReceipt::from).collect())
    }

    #[instrument(skip(self))]
    async fn record_delivered(
        &self,
        message_id: Snowflake,
        user_id: Snowflake,
        at: DateTime<Utc>,
    ) -> RepoResult<()> {
        sqlx::query(
            r#"
            INSERT INTO message_read_receipts (message_id, user_id, delivered_at, read_at)
            VALUES ($1, $2, $3, NULL)
            ON CONFLICT (message_id, user_id) DO NOTHING
            "#,
        )
        .bind(message_id.into_inner())
        .bind(user_id.into_inner())
        .bind(at)
        .execute(&self.pool)
        .await
        .map_err(|e| map_foreign_key_violation(e, || DomainError::MessageNotFound(message_id)))?;

        Ok(())
    }

    #[instrument(skip(self))]
    async fn record_read(
        &self,
        message_id: Snowflake,
        user_id: Snowflake,
        at: DateTime<Utc>,
    ) -> RepoResult<()> {
        sqlx::query(
            r#"
            INSERT INTO message_read_receipts (message_id, user_id, delivered_at, read_at)
            VALUES ($1, $2, $3, $3)
            ON CONFLICT (message_id, user_id)
            DO UPDATE SET read_at = COALESCE(message_read_receipts.read_at, EXCLUDED.read_at)
            "#,
        )
        .bind(message_id.into_inner())
        .bind(user_id.into_inner())
        .bind(at)
        .execute(&self.pool)
        .await
        .map_err(|e| map_foreign_key_violation(e, || DomainError::MessageNotFound(message_id)))?;

        Ok(())
    }
}
