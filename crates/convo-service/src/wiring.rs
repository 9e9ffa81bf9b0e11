//! Production wiring
//!
//! Builds a [`ServiceContext`] over Postgres (repositories and the
//! `LISTEN/NOTIFY` change feed), the filesystem blob store, and, when typing
//! is configured to live in Redis, the Redis typing store and feed.

use std::sync::Arc;

use convo_cache::{ChangePublisher, RedisChangeFeed, RedisFeedConfig, RedisPool, RedisPoolConfig, RedisTypingStore};
use convo_common::{EngineConfig, TypingBackend};
use convo_core::traits::{ChangeFeed, TypingRepository};
use convo_core::{DomainError, Table};
use convo_db::{
    create_pool, map_db_error, run_migrations, DatabaseConfig, LocalBlobStore, PgAttachmentRepository,
    PgChangeFeed, PgConversationRepository, PgFeedConfig, PgMembershipRepository, PgMessageRepository,
    PgProfileRepository, PgReactionRepository, PgReadReceiptRepository, PgTypingRepository,
};
use tracing::info;

use crate::notify::Notifier;
use crate::realtime::RoutedChangeFeed;
use crate::services::{ServiceContext, ServiceContextBuilder, ServiceError, ServiceResult};

/// Connect every adapter and build the engine context
///
/// Must run inside a Tokio runtime; the change feeds start background
/// listeners.
pub async fn connect(config: EngineConfig) -> ServiceResult<ServiceContext> {
    connect_with_notifier(config, None).await
}

pub async fn connect_with_notifier(
    config: EngineConfig,
    notifier: Option<Arc<dyn Notifier>>,
) -> ServiceResult<ServiceContext> {
    config
        .validate()
        .map_err(|e| ServiceError::validation(e.to_string()))?;

    // Postgres
    info!("Connecting to PostgreSQL...");
    let pool = create_pool(&DatabaseConfig::from_env())
        .await
        .map_err(map_db_error)?;
    run_migrations(&pool)
        .await
        .map_err(|e| DomainError::DatabaseError(e.to_string()))?;
    info!("PostgreSQL connection established");

    let pg_feed: Arc<dyn ChangeFeed> = Arc::new(PgChangeFeed::start(pool.clone(), PgFeedConfig::default()));

    // Typing rows: Postgres table or Redis keys with a TTL
    let (typing_repo, change_feed): (Arc<dyn TypingRepository>, Arc<dyn ChangeFeed>) = match config.typing.backend {
        TypingBackend::Postgres => (Arc::new(PgTypingRepository::new(pool.clone())), pg_feed),
        TypingBackend::Redis => {
            info!("Connecting to Redis for typing indicators...");
            let redis_config = RedisPoolConfig::from_env();
            let redis_pool = RedisPool::new(&redis_config).map_err(DomainError::from)?;
            let ttl_secs = config.typing.stale_after.as_secs().max(1);
            let store = RedisTypingStore::new(redis_pool.clone(), ChangePublisher::new(redis_pool))
                .with_ttl_secs(ttl_secs);
            let redis_feed: Arc<dyn ChangeFeed> = Arc::new(RedisChangeFeed::start(RedisFeedConfig {
                redis_url: redis_config.url.clone(),
                ..Default::default()
            }));
            let routed = RoutedChangeFeed::new(pg_feed).route(Table::TypingIndicators, redis_feed);
            info!(ttl_secs, "Redis typing store ready");
            (Arc::new(store), Arc::new(routed))
        }
    };

    let blob_store = Arc::new(LocalBlobStore::new(
        config.storage.upload_dir.clone(),
        config.storage.public_base_url.clone(),
    ));

    let mut builder = ServiceContextBuilder::new()
        .conversation_repo(Arc::new(PgConversationRepository::new(pool.clone())))
        .membership_repo(Arc::new(PgMembershipRepository::new(pool.clone())))
        .message_repo(Arc::new(PgMessageRepository::new(pool.clone())))
        .attachment_repo(Arc::new(PgAttachmentRepository::new(pool.clone())))
        .reaction_repo(Arc::new(PgReactionRepository::new(pool.clone())))
        .receipt_repo(Arc::new(PgReadReceiptRepository::new(pool.clone())))
        .profile_repo(Arc::new(PgProfileRepository::new(pool)))
        .typing_repo(typing_repo)
        .change_feed(change_feed)
        .blob_store(blob_store)
        .config(config);
    if let Some(notifier) = notifier {
        builder = builder.notifier(notifier);
    }

    let ctx = builder.build()?;
    info!(context = ?ctx, "Engine ready");
    Ok(ctx)
}
