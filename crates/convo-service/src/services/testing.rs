//! Shared fixtures for the unit tests of this crate

use std::ops::Deref;
use std::sync::Arc;

use convo_common::EngineConfig;
use convo_core::traits::{ConversationRepository, MembershipRepository};
use convo_core::{Conversation, DirectPair, MemberRole, Membership, Profile, Snowflake, SnowflakeGenerator};
use convo_db::{MemoryBlobStore, MemoryStore};

use crate::notify::CollectingNotifier;

use super::context::ServiceContext;

pub const ALICE: Snowflake = Snowflake::new(1001);
pub const BOB: Snowflake = Snowflake::new(1002);
pub const CAROL: Snowflake = Snowflake::new(1003);

/// In-memory backing of a test engine
pub struct Fixture {
    pub store: Arc<MemoryStore>,
    pub blobs: Arc<MemoryBlobStore>,
    pub notifier: Arc<CollectingNotifier>,
    ids: SnowflakeGenerator,
}

impl Deref for Fixture {
    type Target = MemoryStore;

    fn deref(&self) -> &MemoryStore {
        &self.store
    }
}

impl Fixture {
    pub async fn seed_direct(&self, a: Snowflake, b: Snowflake) -> Snowflake {
        let conversation = Conversation::new_direct(self.ids.generate(), a);
        let pair = DirectPair::new(a, b).unwrap();
        let id = self.store.create_direct(&conversation, pair).await.unwrap();
        self.add_members(id, a, &[b]).await
    }

    pub async fn seed_group(&self, creator: Snowflake, others: &[Snowflake]) -> Snowflake {
        let conversation = Conversation::new_group(self.ids.generate(), creator, Some("Group".into()));
        self.seed(conversation, creator, others).await
    }

    async fn seed(&self, conversation: Conversation, creator: Snowflake, others: &[Snowflake]) -> Snowflake {
        let id = conversation.id;
        ConversationRepository::create(self.store.as_ref(), &conversation)
            .await
            .unwrap();
        self.add_members(id, creator, others).await
    }

    async fn add_members(&self, id: Snowflake, creator: Snowflake, others: &[Snowflake]) -> Snowflake {
        let mut members = vec![Membership::new(id, creator, MemberRole::Admin)];
        members.extend(others.iter().map(|u| Membership::new(id, *u, MemberRole::Member)));
        self.store.upsert_many(&members).await.unwrap();
        id
    }
}

pub async fn engine() -> (ServiceContext, Fixture) {
    engine_with(EngineConfig::default()).await
}

pub async fn engine_with(config: EngineConfig) -> (ServiceContext, Fixture) {
    let store = Arc::new(MemoryStore::new());
    for (id, username, display) in [(ALICE, "alice", "Alice"), (BOB, "bob", "Bob"), (CAROL, "carol", "Carol")] {
        store.insert_profile(Profile::new(id, username).with_display_name(display));
    }
    let blobs = Arc::new(MemoryBlobStore::new());
    let notifier = Arc::new(CollectingNotifier::new());

    let ctx = ServiceContext::builder()
        .memory_store(store.clone())
        .blob_store(blobs.clone())
        .notifier(notifier.clone())
        .config(config)
        .build()
        .unwrap();

    let fixture = Fixture {
        store,
        blobs,
        notifier,
        ids: SnowflakeGenerator::new(7),
    };
    (ctx, fixture)
}
