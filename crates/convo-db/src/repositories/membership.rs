//! PostgreSQL implementation of MembershipRepository

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use tracing::instrument;

use convo_core::entities::Membership;
use convo_core::error::DomainError;
use convo_core::traits::{MembershipRepository, RepoResult};
use convo_core::value_objects::Snowflake;

use crate::mappers::id_array;
use crate::models::MembershipModel;

use super::error::{map_db_error, map_foreign_key_violation};

const COLUMNS: &str =
    "conversation_id, user_id, role, joined_at, last_read_at, is_muted, is_pinned";

/// PostgreSQL implementation of MembershipRepository
#[derive(Clone)]
pub struct PgMembershipRepository {
    pool: PgPool,
}

impl PgMembershipRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn set_flag(
        &self,
        column: &'static str,
        conversation_id: Snowflake,
        user_id: Snowflake,
        value: bool,
    ) -> RepoResult<bool> {
        let result = sqlx::query(&format!(
            "UPDATE conversation_members SET {column} = $3 \
             WHERE conversation_id = $1 AND user_id = $2"
        ))
        .bind(conversation_id.into_inner())
        .bind(user_id.into_inner())
        .bind(value)
        .execute(&self.pool)
        .await
        .map_err(map_db_error)?;

        Ok(result.rows_affected() > 0)
    }
}

#[async_trait]
impl MembershipRepository for PgMembershipRepository {
    #[instrument(skip(self))]
    async fn list_for_user(&self, user_id: Snowflake) -> RepoResult<Vec<Membership>> {
        let results = sqlx::query_as::<_, MembershipModel>(&format!(
            "SELECT {COLUMNS} FROM conversation_members WHERE user_id = $1"
        ))
        .bind(user_id.into_inner())
        .fetch_all(&self.pool)
        .await
        .map_err(map_db_error)?;

        Ok(results.into_iter().map(Membership::from).collect())
    }

    #[instrument(skip(self, conversation_ids), fields(count = conversation_ids.len()))]
    async fn list_for_conversations(
        &self,
        conversation_ids: &[Snowflake],
    ) -> RepoResult<Vec<Membership>> {
        if conversation_ids.is_empty() {
            return Ok(Vec::new());
        }

        let results = sqlx::query_as::<_, MembershipModel>(&format!(
            "SELECT {COLUMNS} FROM conversation_members \
             WHERE conversation_id = ANY($1) \
             ORDER BY conversation_id, joined_at, user_id"
        ))
        .bind(id_array(conversation_ids))
        .fetch_all(&self.pool)
        .await
        .map_err(map_db_error)?;

        Ok(results.into_iter().map(Membership::from).collect())
    }

    #[instrument(skip(self))]
    async fn find(
        &self,
        conversation_id: Snowflake,
        user_id: Snowflake,
    ) -> RepoResult<Option<Membership>> {
        let result = sqlx::query_as::<_, MembershipModel>(&format!(
            "SELECT {COLUMNS} FROM conversation_members \
             WHERE conversation_id = $1 AND user_id = $2"
        ))
        .bind(conversation_id.into_inner())
        .bind(user_id.into_inner())
        .fetch_optional(&self.pool)
        .await
        .map_err(map_db_error)?;

        Ok(result.map(Membership::from))
    }

    #[instrument(skip(self, memberships), fields(count = memberships.len()))]
    async fn upsert_many(&self, memberships: &[Membership]) -> RepoResult<()> {
        let mut tx = self.pool.begin().await.map_err(map_db_error)?;

        for membership in memberships {
            sqlx::query(
                r#"
                INSERT INTO conversation_members
                    (conversation_id, user_id, role, joined_at, last_read_at, is_muted, is_pinned)
                VALUES ($1, $2, $3, $4, $5, $6, $7)
                ON CONFLICT (conversation_id, user_id) DO NOTHING
                "#,
            )
            .bind(membership.conversation_id.into_inner())
            .bind(membership.user_id.into_inner())
            .bind(membership.role.as_str())
            .bind(membership.joined_at)
            .bind(membership.last_read_at)
            .bind(membership.is_muted)
            .bind(membership.is_pinned)
            .execute(&mut *tx)
            .await
            .map_err(|e| {
                map_foreign_key_violation(e, || {
                    DomainError::ConversationNotFound(membership.conversation_id)
                })
            })?;
        }

        tx.commit().await.map_err(map_db_error)?;
        Ok(())
    }

    #[instrument(skip(self))]
    async fn delete(&self, conversation_id: Snowflake, user_id: Snowflake) -> RepoResult<bool> {
        let result = sqlx::query(
            "DELETE FROM conversation_members WHERE conversation_id = $1 AND user_id = $2",
        )
        .bind(conversation_id.into_inner())
        .bind(user_id.into_inner())
        .execute(&self.pool)
        .await
        .map_err(map_db_error)?;

        Ok(result.rows_affected() > 0)
    }

    #[instrument(skip(self))]
    async fn set_last_read(
        &self,
        conversation_id: Snowflake,
        user_id: Snowflake,
    ) -> RepoResult<Option<DateTime<Utc>>> {
        let stamped: Option<(DateTime<Utc>,)> = sqlx::query_as(
            r#"
            UPDATE conversation_members
            SET last_read_at = now()
            WHERE conversation_id = $1 AND user_id = $2
            RETURNING last_read_at
            "#,
        )
        .bind(conversation_id.into_inner())
        .bind(user_id.into_inner())
        .fetch_optional(&self.pool)
        .await
        .map_err(map_db_error)?;

        Ok(stamped.map(|(at,)| at))
    }

    async fn set_muted(
        &self,
        conversation_id: Snowflake,
        user_id: Snowflake,
        muted: bool,
    ) -> RepoResult<bool> {
        self.set_flag("is_muted", conversation_id, user_id, muted).await
    }

    async fn set_pinned(
        &self,
        conversation_id: Snowflake,
        user_id: Snowflake,
        pinned: bool,
    ) -> RepoResult<bool> {
        self.set_flag("is_pinned", conversation_id, user_id, pinned).await
    }
}
