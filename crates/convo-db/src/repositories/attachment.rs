//! PostgreSQL implementation of AttachmentRepository

use async_trait::async_trait;
use sqlx::PgPool;
use tracing::instrument;

use convo_core::entities::Attachment;
use convo_core::error::DomainError;
use convo_core::traits::{AttachmentRepository, RepoResult};
use convo_core::value_objects::Snowflake;

use crate::mappers::id_array;
use crate::models::AttachmentModel;

use super::error::{map_db_error, map_foreign_key_violation};

/// PostgreSQL implementation of AttachmentRepository
#[derive(Clone)]
pub struct PgAttachmentRepository {
    pool: PgPool,
}

impl PgAttachmentRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl AttachmentRepository for PgAttachmentRepository {
    #[instrument(skip(self, message_ids), fields(count = message_ids.len()))]
    async fn find_by_messages(&self, message_ids: &[Snowflake]) -> RepoResult<Vec<Attachment>> {
        if message_ids.is_empty() {
            return Ok(Vec::new());
        }

        let results = sqlx::query_as::<_, AttachmentModel>(
            r#"
            SELECT id, message_id, file_url, file_name, file_type, file_size,
                   thumbnail_url, duration, width, height, created_at
            FROM message_attachments
            WHERE message_id = ANY($1)
            ORDER BY created_at, id
            "#,
        )
        .bind(id_array(message_ids))
        .fetch_all(&self.pool)
        .await
        .map_err(map_db_error)?;

        Ok(results.into_iter().map(Attachment::from).collect())
    }

    #[instrument(skip(self, attachment), fields(attachment_id = %attachment.id))]
    async fn create(&self, attachment: &Attachment) -> RepoResult<()> {
        sqlx::query(
            r#"
            INSERT INTO message_attachments
                (id, message_id, file_url, file_name, file_type, file_size,
                 thumbnail_url, duration, width, height, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            "#,
        )
        .bind(attachment.id.into_inner())
        .bind(attachment.message_id.into_inner())
        .bind(&attachment.file_url)
        .bind(&attachment.file_name)
        .bind(&attachment.file_type)
        .bind(attachment.file_size)
        .bind(&attachment.thumbnail_url)
        .bind(attachment.duration)
        .bind(attachment.width)
        .bind(attachment.height)
        .bind(attachment.created_at)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            map_foreign_key_violation(e, || DomainError::MessageNotFound(attachment.message_id))
        })?;

        Ok(())
    }

    #[instrument(skip(self, message_ids), fields(count = message_ids.len()))]
    async fn delete_by_messages(&self, message_ids: &[Snowflake]) -> RepoResult<u64> {
        if message_ids.is_empty() {
            return Ok(0);
        }

        let result = sqlx::query("DELETE FROM message_attachments WHERE message_id = ANY($1)")
            .bind(id_array(message_ids))
            .execute(&self.pool)
            .await
            .map_err(map_db_error)?;

        Ok(result.rows_affected())
    }
}
