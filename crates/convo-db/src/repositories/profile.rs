//! PostgreSQL implementation of ProfileRepository

use async_trait::async_trait;
use sqlx::PgPool;
use tracing::instrument;

use convo_core::entities::Profile;
use convo_core::traits::{ProfileRepository, RepoResult};
use convo_core::value_objects::Snowflake;

use crate::mappers::id_array;
use crate::models::ProfileModel;

use super::error::map_db_error;

/// PostgreSQL implementation of ProfileRepository
#[derive(Clone)]
pub struct PgProfileRepository {
    pool: PgPool,
}

impl PgProfileRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Insert or refresh a profile row
    #[instrument(skip(self, profile), fields(profile_id = %profile.id))]
    pub async fn upsert(&self, profile: &Profile) -> RepoResult<()> {
        sqlx::query(
            r#"
            INSERT INTO profiles (id, display_name, username, avatar_url)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (id) DO UPDATE
            SET display_name = EXCLUDED.display_name,
                username = EXCLUDED.username,
                avatar_url = EXCLUDED.avatar_url
            "#,
        )
        .bind(profile.id.into_inner())
        .bind(&profile.display_name)
        .bind(&profile.username)
        .bind(&profile.avatar_url)
        .execute(&self.pool)
        .await
        .map_err(map_db_error)?;

        Ok(())
    }
}

#[async_trait]
impl ProfileRepository for PgProfileRepository {
    #[instrument(skip(self, ids), fields(count = ids.len()))]
    async fn find_by_ids(&self, ids: &[Snowflake]) -> RepoResult<Vec<Profile>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let results = sqlx::query_as::<_, ProfileModel>(
            "SELECT id, display_name, username, avatar_url FROM profiles WHERE id = ANY($1)",
        )
        .bind(id_array(ids))
        .fetch_all(&self.pool)
        .await
        .map_err(map_db_error)?;

        Ok(results.into_iter().map(Profile::from).collect())
    }
}
