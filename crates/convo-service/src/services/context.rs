//! Service context - dependency container for services
//!
//! Holds the store ports, collaborators, configuration, and the small amount
//! of shared engine state (read-mark coalescer, typing timers, repair log).

use std::sync::Arc;

use convo_common::EngineConfig;
use convo_core::traits::{
    AttachmentRepository, BlobStore, ChangeFeed, ConversationRepository, MembershipRepository,
    MessageRepository, ProfileRepository, ReactionRepository, ReadReceiptRepository,
    TypingRepository,
};
use convo_core::{DomainError, Membership, Snowflake, SnowflakeGenerator};
use convo_db::MemoryStore;

use crate::coalescer::Coalescer;
use crate::notify::{Notifier, TracingNotifier};

use super::error::{ServiceError, ServiceResult};
use super::reconcile::RepairLog;
use super::typing::TypingTimers;

/// Key of a read mark: (conversation, user)
pub type ReadKey = (Snowflake, Snowflake);

/// Service context containing all dependencies
///
/// Cloning is cheap; every clone shares the same repositories and engine state.
#[derive(Clone)]
pub struct ServiceContext {
    // Repositories
    conversation_repo: Arc<dyn ConversationRepository>,
    membership_repo: Arc<dyn MembershipRepository>,
    message_repo: Arc<dyn MessageRepository>,
    attachment_repo: Arc<dyn AttachmentRepository>,
    reaction_repo: Arc<dyn ReactionRepository>,
    receipt_repo: Arc<dyn ReadReceiptRepository>,
    typing_repo: Arc<dyn TypingRepository>,
    profile_repo: Arc<dyn ProfileRepository>,

    // Collaborators
    change_feed: Arc<dyn ChangeFeed>,
    blob_store: Arc<dyn BlobStore>,
    notifier: Arc<dyn Notifier>,

    // Engine state
    config: Arc<EngineConfig>,
    snowflake_generator: Arc<SnowflakeGenerator>,
    read_coalescer: Arc<Coalescer<ReadKey>>,
    typing_timers: Arc<TypingTimers>,
    repairs: Arc<RepairLog>,
}

impl ServiceContext {
    pub fn builder() -> ServiceContextBuilder {
        ServiceContextBuilder::new()
    }

    // === Repositories ===

    pub fn conversation_repo(&self) -> &dyn ConversationRepository {
        self.conversation_repo.as_ref()
    }

    pub fn membership_repo(&self) -> &dyn MembershipRepository {
        self.membership_repo.as_ref()
    }

    pub fn message_repo(&self) -> &dyn MessageRepository {
        self.message_repo.as_ref()
    }

    pub fn attachment_repo(&self) -> &dyn AttachmentRepository {
        self.attachment_repo.as_ref()
    }

    pub fn reaction_repo(&self) -> &dyn ReactionRepository {
        self.reaction_repo.as_ref()
    }

    pub fn receipt_repo(&self) -> &dyn ReadReceiptRepository {
        self.receipt_repo.as_ref()
    }

    pub fn typing_repo(&self) -> &dyn TypingRepository {
        self.typing_repo.as_ref()
    }

    pub fn profile_repo(&self) -> &dyn ProfileRepository {
        self.profile_repo.as_ref()
    }

    // === Collaborators ===

    pub fn change_feed(&self) -> &dyn ChangeFeed {
        self.change_feed.as_ref()
    }

    /// Shared handle for bindings that outlive a borrow of the context
    pub fn change_feed_arc(&self) -> Arc<dyn ChangeFeed> {
        self.change_feed.clone()
    }

    pub fn blob_store(&self) -> &dyn BlobStore {
        self.blob_store.as_ref()
    }

    pub fn notifier(&self) -> &dyn Notifier {
        self.notifier.as_ref()
    }

    // === Engine state ===

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn read_coalescer(&self) -> &Coalescer<ReadKey> {
        &self.read_coalescer
    }

    pub fn typing_timers(&self) -> &TypingTimers {
        &self.typing_timers
    }

    pub fn repairs(&self) -> &RepairLog {
        &self.repairs
    }

    /// Get the snowflake ID generator
    pub fn snowflake_generator(&self) -> &SnowflakeGenerator {
        self.snowflake_generator.as_ref()
    }

    /// Generate a new Snowflake ID
    pub fn generate_id(&self) -> Snowflake {
        self.snowflake_generator.generate()
    }

    /// Membership of `user_id`, or `NotConversationMember`
    pub async fn require_member(
        &self,
        conversation_id: Snowflake,
        user_id: Snowflake,
    ) -> ServiceResult<Membership> {
        self.membership_repo
            .find(conversation_id, user_id)
            .await?
            .ok_or(ServiceError::Domain(DomainError::NotConversationMember))
    }
}

impl std::fmt::Debug for ServiceContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServiceContext")
            .field("repositories", &"...")
            .field("config", &self.config)
            .field("pending_read_marks", &self.read_coalescer.pending_count())
            .field("typing_timers", &self.typing_timers.len())
            .field("pending_repairs", &self.repairs.len())
            .finish()
    }
}

/// Builder for creating ServiceContext with custom configuration
#[derive(Default)]
pub struct ServiceContextBuilder {
    conversation_repo: Option<Arc<dyn ConversationRepository>>,
    membership_repo: Option<Arc<dyn MembershipRepository>>,
    message_repo: Option<Arc<dyn MessageRepository>>,
    attachment_repo: Option<Arc<dyn AttachmentRepository>>,
    reaction_repo: Option<Arc<dyn ReactionRepository>>,
    receipt_repo: Option<Arc<dyn ReadReceiptRepository>>,
    typing_repo: Option<Arc<dyn TypingRepository>>,
    profile_repo: Option<Arc<dyn ProfileRepository>>,
    change_feed: Option<Arc<dyn ChangeFeed>>,
    blob_store: Option<Arc<dyn BlobStore>>,
    notifier: Option<Arc<dyn Notifier>>,
    config: Option<EngineConfig>,
    snowflake_generator: Option<Arc<SnowflakeGenerator>>,
}

impl ServiceContextBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Use one in-memory store for every repository and its feed
    pub fn memory_store(self, store: Arc<MemoryStore>) -> Self {
        let feed: Arc<dyn ChangeFeed> = store.feed();
        self.conversation_repo(store.clone())
            .membership_repo(store.clone())
            .message_repo(store.clone())
            .attachment_repo(store.clone())
            .reaction_repo(store.clone())
            .receipt_repo(store.clone())
            .typing_repo(store.clone())
            .profile_repo(store)
            .change_feed(feed)
    }

    pub fn conversation_repo(mut self, repo: Arc<dyn ConversationRepository>) -> Self {
        self.conversation_repo = Some(repo);
        self
    }

    pub fn membership_repo(mut self, repo: Arc<dyn MembershipRepository>) -> Self {
        self.membership_repo = Some(repo);
        self
    }

    pub fn message_repo(mut self, repo: Arc<dyn MessageRepository>) -> Self {
        self.message_repo = Some(repo);
        self
    }

    pub fn attachment_repo(mut self, repo: Arc<dyn AttachmentRepository>) -> Self {
        self.attachment_repo = Some(repo);
        self
    }

    pub fn reaction_repo(mut self, repo: Arc<dyn ReactionRepository>) -> Self {
        self.reaction_repo = Some(repo);
        self
    }

    pub fn receipt_repo(mut self, repo: Arc<dyn ReadReceiptRepository>) -> Self {
        self.receipt_repo = Some(repo);
        self
    }

    pub fn typing_repo(mut self, repo: Arc<dyn TypingRepository>) -> Self {
        self.typing_repo = Some(repo);
        self
    }

    pub fn profile_repo(mut self, repo: Arc<dyn ProfileRepository>) -> Self {
        self.profile_repo = Some(repo);
        self
    }

    pub fn change_feed(mut self, feed: Arc<dyn ChangeFeed>) -> Self {
        self.change_feed = Some(feed);
        self
    }

    pub fn blob_store(mut self, store: Arc<dyn BlobStore>) -> Self {
        self.blob_store = Some(store);
        self
    }

    pub fn notifier(mut self, notifier: Arc<dyn Notifier>) -> Self {
        self.notifier = Some(notifier);
        self
    }

    pub fn config(mut self, config: EngineConfig) -> Self {
        self.config = Some(config);
        self
    }

    pub fn snowflake_generator(mut self, generator: Arc<SnowflakeGenerator>) -> Self {
        self.snowflake_generator = Some(generator);
        self
    }

    /// Build the ServiceContext
    ///
    /// # Errors
    /// Returns `ServiceError::Validation` if a repository, the change feed, or
    /// the blob store is missing
    pub fn build(self) -> ServiceResult<ServiceContext> {
        fn required<T>(value: Option<T>, name: &str) -> ServiceResult<T> {
            value.ok_or_else(|| ServiceError::validation(format!("{name} is required")))
        }

        let config = self.config.unwrap_or_default();
        let snowflake_generator = self
            .snowflake_generator
            .unwrap_or_else(|| Arc::new(SnowflakeGenerator::new(config.worker_id)));
        let read_coalescer = Arc::new(Coalescer::new(config.sync.read_debounce));

        Ok(ServiceContext {
            conversation_repo: required(self.conversation_repo, "conversation_repo")?,
            membership_repo: required(self.membership_repo, "membership_repo")?,
            message_repo: required(self.message_repo, "message_repo")?,
            attachment_repo: required(self.attachment_repo, "attachment_repo")?,
            reaction_repo: required(self.reaction_repo, "reaction_repo")?,
            receipt_repo: required(self.receipt_repo, "receipt_repo")?,
            typing_repo: required(self.typing_repo, "typing_repo")?,
            profile_repo: required(self.profile_repo, "profile_repo")?,
            change_feed: required(self.change_feed, "change_feed")?,
            blob_store: required(self.blob_store, "blob_store")?,
            notifier: self.notifier.unwrap_or_else(|| Arc::new(TracingNotifier)),
            config: Arc::new(config),
            snowflake_generator,
            read_coalescer,
            typing_timers: Arc::new(TypingTimers::new()),
            repairs: Arc::new(RepairLog::new()),
        })
    }
}
