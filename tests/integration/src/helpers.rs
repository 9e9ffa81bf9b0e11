//! Test helpers for integration tests
//!
//! Provides an engine over the in-memory store, shortcuts for the common
//! steps of a scenario, and access to a live PostgreSQL database when the
//! environment names one.

use std::sync::Arc;

use anyhow::Result;
use convo_common::EngineConfig;
use convo_core::{Message, Snowflake};
use convo_db::{
    create_pool, run_migrations, DatabaseConfig, MemoryBlobStore, MemoryStore, PgAttachmentRepository,
    PgChangeFeed, PgConversationRepository, PgFeedConfig, PgMembershipRepository, PgMessageRepository,
    PgPool, PgProfileRepository, PgReactionRepository, PgReadReceiptRepository, PgTypingRepository,
};
use convo_service::dto::SendMessageRequest;
use convo_service::{CollectingNotifier, ConversationService, MessageService, ServiceContext};

use crate::fixtures::{alice, bob, carol, TestUser};

/// Engine instance over the in-memory store
pub struct TestEngine {
    pub ctx: ServiceContext,
    pub store: Arc<MemoryStore>,
    pub blobs: Arc<MemoryBlobStore>,
    pub notifier: Arc<CollectingNotifier>,
}

impl TestEngine {
    /// Start an engine with default configuration and the three stock users
    pub fn start() -> Result<Self> {
        Self::start_with_config(EngineConfig::default())
    }

    pub fn start_with_config(config: EngineConfig) -> Result<Self> {
        let store = Arc::new(MemoryStore::new());
        for user in [alice(), bob(), carol()] {
            store.insert_profile(user.profile());
        }
        let blobs = Arc::new(MemoryBlobStore::new());
        let notifier = Arc::new(CollectingNotifier::new());

        let ctx = ServiceContext::builder()
            .memory_store(store.clone())
            .blob_store(blobs.clone())
            .notifier(notifier.clone())
            .config(config)
            .build()?;

        Ok(Self {
            ctx,
            store,
            blobs,
            notifier,
        })
    }

    pub fn add_user(&self, user: &TestUser) {
        self.store.insert_profile(user.profile());
    }

    /// Open (or reuse) the direct conversation between two users
    pub async fn direct(&self, from: &TestUser, to: &TestUser) -> Result<Snowflake> {
        Ok(ConversationService::new(&self.ctx)
            .open_or_create_direct(from.id, to.id)
            .await?)
    }

    pub async fn send(&self, conversation_id: Snowflake, from: &TestUser, text: &str) -> Result<Message> {
        Ok(MessageService::new(&self.ctx)
            .send_message(SendMessageRequest::text(conversation_id, from.id, text))
            .await?)
    }

    /// Unread count of one conversation as `user` would see it in the list
    pub async fn unread(&self, conversation_id: Snowflake, user: &TestUser) -> Result<usize> {
        let conversations = ConversationService::new(&self.ctx)
            .load_conversations(user.id)
            .await?;
        conversations
            .iter()
            .find(|c| c.id() == conversation_id)
            .map(|c| c.unread_count)
            .ok_or_else(|| anyhow::anyhow!("conversation {conversation_id} not listed for {}", user.username))
    }
}

/// Helper to check if test environment is available
pub fn check_test_env() -> bool {
    dotenvy::dotenv().ok();

    if std::env::var("DATABASE_URL").is_err() {
        eprintln!("Skipping test: DATABASE_URL not set");
        return false;
    }

    true
}

/// Connect to the test database and apply migrations
pub async fn test_pool() -> Result<PgPool> {
    let pool = create_pool(&DatabaseConfig::from_env()).await?;
    run_migrations(&pool).await?;
    Ok(pool)
}

/// Engine over PostgreSQL, with blobs kept in memory
pub fn pg_engine(pool: &PgPool) -> Result<ServiceContext> {
    let ctx = ServiceContext::builder()
        .conversation_repo(Arc::new(PgConversationRepository::new(pool.clone())))
        .membership_repo(Arc::new(PgMembershipRepository::new(pool.clone())))
        .message_repo(Arc::new(PgMessageRepository::new(pool.clone())))
        .attachment_repo(Arc::new(PgAttachmentRepository::new(pool.clone())))
        .reaction_repo(Arc::new(PgReactionRepository::new(pool.clone())))
        .receipt_repo(Arc::new(PgReadReceiptRepository::new(pool.clone())))
        .typing_repo(Arc::new(PgTypingRepository::new(pool.clone())))
        .profile_repo(Arc::new(PgProfileRepository::new(pool.clone())))
        .change_feed(Arc::new(PgChangeFeed::start(pool.clone(), PgFeedConfig::default())))
        .blob_store(Arc::new(MemoryBlobStore::new()))
        .build()?;
    Ok(ctx)
}

/// Store a user's profile in PostgreSQL
pub async fn pg_add_user(pool: &PgPool, user: &TestUser) -> Result<()> {
    PgProfileRepository::new(pool.clone()).upsert(&user.profile()).await?;
    Ok(())
}
