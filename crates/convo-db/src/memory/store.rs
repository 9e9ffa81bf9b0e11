//! In-memory implementation of the store ports

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;

use convo_core::entities::{
    Attachment, Conversation, DirectPair, Membership, Message, MessageStamp, Profile, Reaction,
    ReadReceipt, TypingIndicator,
};
use convo_core::error::DomainError;
use convo_core::events::{ChangeEvent, ChangeKind, Table};
use convo_core::traits::{
    AttachmentRepository, ConversationRepository, MembershipRepository, MessageRepository,
    ProfileRepository, ReactionRepository, ReadReceiptRepository, RepoResult, TypingRepository,
};
use convo_core::value_objects::Snowflake;

use super::feed::MemoryChangeFeed;

/// Where an injected failure applies
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FailPoint {
    Read(Table),
    Write(Table),
    /// Profile collaborator lookups
    Profiles,
}

#[derive(Default)]
struct Tables {
    conversations: HashMap<Snowflake, Conversation>,
    // Unique key over direct conversations
    direct_pairs: HashMap<DirectPair, Snowflake>,
    memberships: BTreeMap<(Snowflake, Snowflake), Membership>,
    messages: HashMap<Snowflake, Message>,
    attachments: Vec<Attachment>,
    reactions: Vec<Reaction>,
    receipts: BTreeMap<(Snowflake, Snowflake), ReadReceipt>,
    typing: BTreeMap<(Snowflake, Snowflake), TypingIndicator>,
    profiles: HashMap<Snowflake, Profile>,
}

#[derive(Default)]
struct Counters {
    reads: HashMap<Table, u64>,
    writes: HashMap<Table, u64>,
    profile_reads: u64,
}

/// Whole-database stand-in implementing every repository trait
pub struct MemoryStore {
    tables: Mutex<Tables>,
    feed: Arc<MemoryChangeFeed>,
    failures: Mutex<HashSet<FailPoint>>,
    counters: Mutex<Counters>,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::with_feed(Arc::new(MemoryChangeFeed::new()))
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store publishing its writes on an existing feed
    pub fn with_feed(feed: Arc<MemoryChangeFeed>) -> Self {
        Self {
            tables: Mutex::new(Tables::default()),
            feed,
            failures: Mutex::new(HashSet::new()),
            counters: Mutex::new(Counters::default()),
        }
    }

    /// The feed every write is published on
    pub fn feed(&self) -> Arc<MemoryChangeFeed> {
        self.feed.clone()
    }

    // ========================================================================
    // Failure injection and counters
    // ========================================================================

    pub fn fail(&self, point: FailPoint) {
        self.failures.lock().insert(point);
    }

    pub fn heal(&self, point: FailPoint) {
        self.failures.lock().remove(&point);
    }

    pub fn heal_all(&self) {
        self.failures.lock().clear();
    }

    /// Queries issued against `table` since the last reset
    pub fn read_count(&self, table: Table) -> u64 {
        self.counters.lock().reads.get(&table).copied().unwrap_or(0)
    }

    /// Write statements issued against `table` since the last reset
    pub fn write_count(&self, table: Table) -> u64 {
        self.counters.lock().writes.get(&table).copied().unwrap_or(0)
    }

    pub fn profile_reads(&self) -> u64 {
        self.counters.lock().profile_reads
    }

    pub fn reset_counters(&self) {
        *self.counters.lock() = Counters::default();
    }

    fn check(&self, point: FailPoint) -> RepoResult<()> {
        if self.failures.lock().contains(&point) {
            return Err(DomainError::DatabaseError(format!("injected failure: {point:?}")));
        }
        Ok(())
    }

    fn read(&self, table: Table) -> RepoResult<()> {
        *self.counters.lock().reads.entry(table).or_default() += 1;
        self.check(FailPoint::Read(table))
    }

    fn write(&self, table: Table) -> RepoResult<()> {
        *self.counters.lock().writes.entry(table).or_default() += 1;
        self.check(FailPoint::Write(table))
    }

    /// Publish after the table lock has been released
    fn publish(&self, events: Vec<ChangeEvent>) {
        for event in &events {
            self.feed.publish(event);
        }
    }

    // ========================================================================
    // Seeding and inspection
    // ========================================================================

    /// Seed the profile collaborator
    pub fn insert_profile(&self, profile: Profile) {
        self.tables.lock().profiles.insert(profile.id, profile);
    }

    /// Seed a message with its own timestamps, bypassing the store clock
    pub fn insert_message(&self, message: Message) {
        self.tables.lock().messages.insert(message.id, message);
    }

    pub fn conversation(&self, id: Snowflake) -> Option<Conversation> {
        self.tables.lock().conversations.get(&id).cloned()
    }

    pub fn membership(&self, conversation_id: Snowflake, user_id: Snowflake) -> Option<Membership> {
        self.tables
            .lock()
            .memberships
            .get(&(conversation_id, user_id))
            .cloned()
    }

    pub fn message(&self, id: Snowflake) -> Option<Message> {
        self.tables.lock().messages.get(&id).cloned()
    }

    /// Every message of a conversation, oldest first
    pub fn messages_in(&self, conversation_id: Snowflake) -> Vec<Message> {
        let mut messages: Vec<Message> = self
            .tables
            .lock()
            .messages
            .values()
            .filter(|m| m.conversation_id == conversation_id)
            .cloned()
            .collect();
        messages.sort_by_key(Message::order_key);
        messages
    }

    pub fn attachments_of(&self, message_id: Snowflake) -> Vec<Attachment> {
        self.tables
            .lock()
            .attachments
            .iter()
            .filter(|a| a.message_id == message_id)
            .cloned()
            .collect()
    }

    pub fn typing_rows(&self, conversation_id: Snowflake) -> Vec<TypingIndicator> {
        self.tables
            .lock()
            .typing
            .values()
            .filter(|t| t.conversation_id == conversation_id)
            .cloned()
            .collect()
    }

    pub fn receipt(&self, message_id: Snowflake, user_id: Snowflake) -> Option<ReadReceipt> {
        self.tables.lock().receipts.get(&(message_id, user_id)).cloned()
    }
}

// ============================================================================
// Conversations
// ============================================================================

#[async_trait]
impl ConversationRepository for MemoryStore {
    async fn find_by_id(&self, id: Snowflake) -> RepoResult<Option<Conversation>> {
        self.read(Table::Conversations)?;
        Ok(self.tables.lock().conversations.get(&id).cloned())
    }

    async fn find_by_ids(&self, ids: &[Snowflake]) -> RepoResult<Vec<Conversation>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        self.read(Table::Conversations)?;

        let wanted: HashSet<&Snowflake> = ids.iter().collect();
        let mut found: Vec<Conversation> = self
            .tables
            .lock()
            .conversations
            .values()
            .filter(|c| wanted.contains(&c.id))
            .cloned()
            .collect();

        // last_message_at DESC NULLS LAST, id DESC
        found.sort_by(|a, b| match (a.last_message_at, b.last_message_at) {
            (Some(x), Some(y)) => y.cmp(&x).then(b.id.cmp(&a.id)),
            (Some(_), None) => std::cmp::Ordering::Less,
            (None, Some(_)) => std::cmp::Ordering::Greater,
            (None, None) => b.id.cmp(&a.id),
        });
        Ok(found)
    }

    async fn create(&self, conversation: &Conversation) -> RepoResult<()> {
        self.write(Table::Conversations)?;
        {
            let mut tables = self.tables.lock();
            if tables.conversations.contains_key(&conversation.id) {
                return Err(DomainError::DatabaseError(format!(
                    "duplicate conversation id {}",
                    conversation.id
                )));
            }
            tables
                .conversations
                .insert(conversation.id, conversation.clone());
        }
        self.publish(vec![ChangeEvent::from_row(
            Table::Conversations,
            ChangeKind::Insert,
            conversation,
        )]);
        Ok(())
    }

    async fn find_direct(&self, pair: DirectPair) -> RepoResult<Option<Snowflake>> {
        self.read(Table::Conversations)?;
        Ok(self.tables.lock().direct_pairs.get(&pair).copied())
    }

    async fn create_direct(&self, conversation: &Conversation, pair: DirectPair) -> RepoResult<Snowflake> {
        self.write(Table::Conversations)?;
        {
            let mut tables = self.tables.lock();
            if let Some(existing) = tables.direct_pairs.get(&pair) {
                return Ok(*existing);
            }
            if tables.conversations.contains_key(&conversation.id) {
                return Err(DomainError::DatabaseError(format!(
                    "duplicate conversation id {}",
                    conversation.id
                )));
            }
            tables.direct_pairs.insert(pair, conversation.id);
            tables
                .conversations
                .insert(conversation.id, conversation.clone());
        }
        self.publish(vec![ChangeEvent::from_row(
            Table::Conversations,
            ChangeKind::Insert,
            conversation,
        )]);
        Ok(conversation.id)
    }

    async fn update(&self, conversation: &Conversation) -> RepoResult<()> {
        self.write(Table::Conversations)?;
        let updated = {
            let mut tables = self.tables.lock();
            let row = tables
                .conversations
                .get_mut(&conversation.id)
                .ok_or(DomainError::ConversationNotFound(conversation.id))?;
            row.name.clone_from(&conversation.name);
            row.description.clone_from(&conversation.description);
            row.avatar_url.clone_from(&conversation.avatar_url);
            row.is_archived = conversation.is_archived;
            row.updated_at = Utc::now();
            row.clone()
        };
        self.publish(vec![ChangeEvent::from_row(
            Table::Conversations,
            ChangeKind::Update,
            &updated,
        )]);
        Ok(())
    }

    async fn touch_last_message(&self, id: Snowflake, at: DateTime<Utc>) -> RepoResult<()> {
        self.write(Table::Conversations)?;
        let touched = {
            let mut tables = self.tables.lock();
            tables.conversations.get_mut(&id).and_then(|row| {
                let before = row.last_message_at;
                row.touch(at);
                (row.last_message_at != before).then(|| row.clone())
            })
        };
        if let Some(row) = touched {
            self.publish(vec![ChangeEvent::from_row(
                Table::Conversations,
                ChangeKind::Update,
                &row,
            )]);
        }
        Ok(())
    }
}

// ============================================================================
// Memberships
// ============================================================================

impl MemoryStore {
    fn update_membership<F>(
        &self,
        conversation_id: Snowflake,
        user_id: Snowflake,
        apply: F,
    ) -> RepoResult<bool>
    where
        F: FnOnce(&mut Membership),
    {
        self.write(Table::ConversationMembers)?;
        let updated = {
            let mut tables = self.tables.lock();
            tables
                .memberships
                .get_mut(&(conversation_id, user_id))
                .map(|row| {
                    apply(row);
                    row.clone()
                })
        };
        match updated {
            Some(row) => {
                self.publish(vec![ChangeEvent::from_row(
                    Table::ConversationMembers,
                    ChangeKind::Update,
                    &row,
                )]);
                Ok(true)
            }
            None => Ok(false),
        }
    }
}

#[async_trait]
impl MembershipRepository for MemoryStore {
    async fn list_for_user(&self, user_id: Snowflake) -> RepoResult<Vec<Membership>> {
        self.read(Table::ConversationMembers)?;
        Ok(self
            .tables
            .lock()
            .memberships
            .values()
            .filter(|m| m.user_id == user_id)
            .cloned()
            .collect())
    }

    async fn list_for_conversations(
        &self,
        conversation_ids: &[Snowflake],
    ) -> RepoResult<Vec<Membership>> {
        if conversation_ids.is_empty() {
            return Ok(Vec::new());
        }
        self.read(Table::ConversationMembers)?;

        let wanted: HashSet<&Snowflake> = conversation_ids.iter().collect();
        let mut rows: Vec<Membership> = self
            .tables
            .lock()
            .memberships
            .values()
            .filter(|m| wanted.contains(&m.conversation_id))
            .cloned()
            .collect();
        rows.sort_by_key(|m| (m.conversation_id, m.joined_at, m.user_id));
        Ok(rows)
    }

    async fn find(
        &self,
        conversation_id: Snowflake,
        user_id: Snowflake,
    ) -> RepoResult<Option<Membership>> {
        self.read(Table::ConversationMembers)?;
        Ok(self.membership(conversation_id, user_id))
    }

    async fn upsert_many(&self, memberships: &[Membership]) -> RepoResult<()> {
        if memberships.is_empty() {
            return Ok(());
        }
        self.write(Table::ConversationMembers)?;

        let inserted: Vec<ChangeEvent> = {
            let mut tables = self.tables.lock();
            memberships
                .iter()
                .filter(|m| {
                    let key = (m.conversation_id, m.user_id);
                    if tables.memberships.contains_key(&key) {
                        false
                    } else {
                        tables.memberships.insert(key, (*m).clone());
                        true
                    }
                })
                .map(|m| ChangeEvent::from_row(Table::ConversationMembers, ChangeKind::Insert, m))
                .collect()
        };
        self.publish(inserted);
        Ok(())
    }

    async fn delete(&self, conversation_id: Snowflake, user_id: Snowflake) -> RepoResult<bool> {
        self.write(Table::ConversationMembers)?;
        let removed = self
            .tables
            .lock()
            .memberships
            .remove(&(conversation_id, user_id));
        match removed {
            Some(row) => {
                self.publish(vec![ChangeEvent::from_row(
                    Table::ConversationMembers,
                    ChangeKind::Delete,
                    &row,
                )]);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn set_last_read(
        &self,
        conversation_id: Snowflake,
        user_id: Snowflake,
    ) -> RepoResult<Option<DateTime<Utc>>> {
        let mut stamped = None;
        self.update_membership(conversation_id, user_id, |m| {
            let at = Utc::now();
            m.last_read_at = Some(at);
            stamped = Some(at);
        })?;
        Ok(stamped)
    }

    async fn set_muted(
        &self,
        conversation_id: Snowflake,
        user_id: Snowflake,
        muted: bool,
    ) -> RepoResult<bool> {
        self.update_membership(conversation_id, user_id, |m| m.is_muted = muted)
    }

    async fn set_pinned(
        &self,
        conversation_id: Snowflake,
        user_id: Snowflake,
        pinned: bool,
    ) -> RepoResult<bool> {
        self.update_membership(conversation_id, user_id, |m| m.is_pinned = pinned)
    }
}

// ============================================================================
// Messages
// ============================================================================

#[async_trait]
impl MessageRepository for MemoryStore {
    async fn find_by_id(&self, id: Snowflake) -> RepoResult<Option<Message>> {
        self.read(Table::Messages)?;
        Ok(self.message(id))
    }

    async fn find_latest(&self, conversation_id: Snowflake, limit: i64) -> RepoResult<Vec<Message>> {
        self.read(Table::Messages)?;
        let mut messages = self.messages_in(conversation_id);
        messages.reverse();
        messages.truncate(usize::try_from(limit.max(0)).unwrap_or(usize::MAX));
        Ok(messages)
    }

    async fn find_latest_per_conversation(
        &self,
        conversation_ids: &[Snowflake],
    ) -> RepoResult<Vec<Message>> {
        if conversation_ids.is_empty() {
            return Ok(Vec::new());
        }
        self.read(Table::Messages)?;

        let wanted: HashSet<&Snowflake> = conversation_ids.iter().collect();
        let mut latest: HashMap<Snowflake, Message> = HashMap::new();
        for message in self.tables.lock().messages.values() {
            if message.is_deleted || !wanted.contains(&message.conversation_id) {
                continue;
            }
            let newer = latest
                .get(&message.conversation_id)
                .map_or(true, |current| message.order_key() > current.order_key());
            if newer {
                latest.insert(message.conversation_id, message.clone());
            }
        }

        let mut rows: Vec<Message> = latest.into_values().collect();
        rows.sort_by(|a, b| b.order_key().cmp(&a.order_key()));
        Ok(rows)
    }

    async fn find_unread_candidates(
        &self,
        conversation_ids: &[Snowflake],
        excluding_sender: Snowflake,
        since: Option<DateTime<Utc>>,
    ) -> RepoResult<Vec<MessageStamp>> {
        if conversation_ids.is_empty() {
            return Ok(Vec::new());
        }
        self.read(Table::Messages)?;

        let wanted: HashSet<&Snowflake> = conversation_ids.iter().collect();
        Ok(self
            .tables
            .lock()
            .messages
            .values()
            .filter(|m| {
                wanted.contains(&m.conversation_id)
                    && !m.is_deleted
                    && m.sender_id != excluding_sender
                    && since.map_or(true, |s| m.created_at > s)
            })
            .map(MessageStamp::from)
            .collect())
    }

    async fn create(&self, message: &Message) -> RepoResult<Message> {
        self.write(Table::Messages)?;
        let stored = {
            let mut tables = self.tables.lock();
            if !tables.conversations.contains_key(&message.conversation_id) {
                return Err(DomainError::ConversationNotFound(message.conversation_id));
            }
            if tables.messages.contains_key(&message.id) {
                return Err(DomainError::DatabaseError(format!(
                    "duplicate message id {}",
                    message.id
                )));
            }
            let now = Utc::now();
            let stored = Message {
                created_at: now,
                updated_at: now,
                ..message.clone()
            };
            tables.messages.insert(stored.id, stored.clone());
            stored
        };
        self.publish(vec![ChangeEvent::from_row(
            Table::Messages,
            ChangeKind::Insert,
            &stored,
        )]);
        Ok(stored)
    }

    async fn update_content(
        &self,
        id: Snowflake,
        content: &str,
        edited_at: DateTime<Utc>,
    ) -> RepoResult<bool> {
        self.write(Table::Messages)?;
        let updated = {
            let mut tables = self.tables.lock();
            tables
                .messages
                .get_mut(&id)
                .filter(|m| !m.is_deleted)
                .map(|m| {
                    m.edit(content.to_string(), edited_at);
                    m.clone()
                })
        };
        Ok(self.publish_message_update(updated))
    }

    async fn soft_delete(&self, id: Snowflake, at: DateTime<Utc>) -> RepoResult<bool> {
        self.write(Table::Messages)?;
        let updated = {
            let mut tables = self.tables.lock();
            tables
                .messages
                .get_mut(&id)
                .filter(|m| !m.is_deleted)
                .map(|m| {
                    m.soft_delete(at);
                    m.clone()
                })
        };
        Ok(self.publish_message_update(updated))
    }

    async fn soft_delete_conversation(
        &self,
        conversation_id: Snowflake,
        at: DateTime<Utc>,
    ) -> RepoResult<u64> {
        self.write(Table::Messages)?;
        let events: Vec<ChangeEvent> = {
            let mut tables = self.tables.lock();
            tables
                .messages
                .values_mut()
                .filter(|m| {
                    m.conversation_id == conversation_id && (!m.is_deleted || m.content.is_some())
                })
                .map(|m| {
                    let first_deleted = m.deleted_at.unwrap_or(at);
                    m.soft_delete(at);
                    m.deleted_at = Some(first_deleted);
                    ChangeEvent::from_row(Table::Messages, ChangeKind::Update, &*m)
                })
                .collect()
        };
        let touched = events.len() as u64;
        self.publish(events);
        Ok(touched)
    }

    async fn ids_for_conversation(&self, conversation_id: Snowflake) -> RepoResult<Vec<Snowflake>> {
        self.read(Table::Messages)?;
        Ok(self
            .messages_in(conversation_id)
            .into_iter()
            .map(|m| m.id)
            .collect())
    }

    async fn latest_created_at(
        &self,
        conversation_id: Snowflake,
    ) -> RepoResult<Option<DateTime<Utc>>> {
        self.read(Table::Messages)?;
        Ok(self
            .tables
            .lock()
            .messages
            .values()
            .filter(|m| m.conversation_id == conversation_id)
            .map(|m| m.created_at)
            .max())
    }
}

impl MemoryStore {
    fn publish_message_update(&self, updated: Option<Message>) -> bool {
        match updated {
            Some(row) => {
                self.publish(vec![ChangeEvent::from_row(
                    Table::Messages,
                    ChangeKind::Update,
                    &row,
                )]);
                true
            }
            None => false,
        }
    }
}

// ============================================================================
// Attachments
// ============================================================================

#[async_trait]
impl AttachmentRepository for MemoryStore {
    async fn find_by_messages(&self, message_ids: &[Snowflake]) -> RepoResult<Vec<Attachment>> {
        if message_ids.is_empty() {
            return Ok(Vec::new());
        }
        self.read(Table::MessageAttachments)?;

        let wanted: HashSet<&Snowflake> = message_ids.iter().collect();
        let mut rows: Vec<Attachment> = self
            .tables
            .lock()
            .attachments
            .iter()
            .filter(|a| wanted.contains(&a.message_id))
            .cloned()
            .collect();
        rows.sort_by_key(|a| (a.created_at, a.id));
        Ok(rows)
    }

    async fn create(&self, attachment: &Attachment) -> RepoResult<()> {
        self.write(Table::MessageAttachments)?;
        {
            let mut tables = self.tables.lock();
            if !tables.messages.contains_key(&attachment.message_id) {
                return Err(DomainError::MessageNotFound(attachment.message_id));
            }
            tables.attachments.push(attachment.clone());
        }
        self.publish(vec![ChangeEvent::from_row(
            Table::MessageAttachments,
            ChangeKind::Insert,
            attachment,
        )]);
        Ok(())
    }

    async fn delete_by_messages(&self, message_ids: &[Snowflake]) -> RepoResult<u64> {
        if message_ids.is_empty() {
            return Ok(0);
        }
        self.write(Table::MessageAttachments)?;

        let wanted: HashSet<&Snowflake> = message_ids.iter().collect();
        let removed: Vec<Attachment> = {
            let mut tables = self.tables.lock();
            let (gone, kept): (Vec<Attachment>, Vec<Attachment>) =
                std::mem::take(&mut tables.attachments)
                .into_iter()
                .partition(|a| wanted.contains(&a.message_id));
            tables.attachments = kept;
            gone
        };
        let count = removed.len() as u64;
        self.publish(
            removed
                .iter()
                .map(|a| ChangeEvent::from_row(Table::MessageAttachments, ChangeKind::Delete, a))
                .collect(),
        );
        Ok(count)
    }
}

// ============================================================================
// Reactions
// ============================================================================

#[async_trait]
impl ReactionRepository for MemoryStore {
    async fn find_by_messages(&self, message_ids: &[Snowflake]) -> RepoResult<Vec<Reaction>> {
        if message_ids.is_empty() {
            return Ok(Vec::new());
        }
        self.read(Table::MessageReactions)?;

        let wanted: HashSet<&Snowflake> = message_ids.iter().collect();
        let mut rows: Vec<Reaction> = self
            .tables
            .lock()
            .reactions
            .iter()
            .filter(|r| wanted.contains(&r.message_id))
            .cloned()
            .collect();
        rows.sort_by_key(|r| r.created_at);
        Ok(rows)
    }

    async fn add(&self, reaction: &Reaction) -> RepoResult<bool> {
        self.write(Table::MessageReactions)?;
        let inserted = {
            let mut tables = self.tables.lock();
            if tables.reactions.iter().any(|r| r.key() == reaction.key()) {
                false
            } else {
                tables.reactions.push(reaction.clone());
                true
            }
        };
        if inserted {
            self.publish(vec![ChangeEvent::from_row(
                Table::MessageReactions,
                ChangeKind::Insert,
                reaction,
            )]);
        }
        Ok(inserted)
    }

    async fn remove(
        &self,
        message_id: Snowflake,
        user_id: Snowflake,
        emoji: &str,
    ) -> RepoResult<bool> {
        self.write(Table::MessageReactions)?;
        let removed = {
            let mut tables = self.tables.lock();
            tables
                .reactions
                .iter()
                .position(|r| r.key() == (message_id, user_id, emoji))
                .map(|index| tables.reactions.remove(index))
        };
        match removed {
            Some(row) => {
                self.publish(vec![ChangeEvent::from_row(
                    Table::MessageReactions,
                    ChangeKind::Delete,
                    &row,
                )]);
                Ok(true)
            }
            None => Ok(false),
        }
    }
}

// ============================================================================
// Read receipts
// ============================================================================

#[async_trait]
impl ReadReceiptRepository for MemoryStore {
    async fn find_by_messages(&self, message_ids: &[Snowflake]) -> RepoResult<Vec<ReadReceipt>> {
        if message_ids.is_empty() {
            return Ok(Vec::new());
        }
        self.read(Table::MessageReadReceipts)?;

        let wanted: HashSet<&Snowflake> = message_ids.iter().collect();
        Ok(self
            .tables
            .lock()
            .receipts
            .values()
            .filter(|r| wanted.contains(&r.message_id))
            .cloned()
            .collect())
    }

    async fn record_delivered(
        &self,
        message_id: Snowflake,
        user_id: Snowflake,
        at: DateTime<Utc>,
    ) -> RepoResult<()> {
        self.write(Table::MessageReadReceipts)?;
        let inserted = {
            let mut tables = self.tables.lock();
            match tables.receipts.entry((message_id, user_id)) {
                std::collections::btree_map::Entry::Occupied(_) => None,
                std::collections::btree_map::Entry::Vacant(slot) => {
                    Some(slot.insert(ReadReceipt::delivered(message_id, user_id, at)).clone())
                }
            }
        };
        if let Some(row) = inserted {
            self.publish(vec![ChangeEvent::from_row(
                Table::MessageReadReceipts,
                ChangeKind::Insert,
                &row,
            )]);
        }
        Ok(())
    }

    async fn record_read(
        &self,
        message_id: Snowflake,
        user_id: Snowflake,
        at: DateTime<Utc>,
    ) -> RepoResult<()> {
        self.write(Table::MessageReadReceipts)?;
        let event = {
            let mut tables = self.tables.lock();
            match tables.receipts.get_mut(&(message_id, user_id)) {
                Some(existing) if existing.is_read() => None,
                Some(existing) => {
                    existing.mark_read(at);
                    Some(ChangeEvent::from_row(
                        Table::MessageReadReceipts,
                        ChangeKind::Update,
                        &*existing,
                    ))
                }
                None => {
                    let row = ReadReceipt::read(message_id, user_id, at);
                    let event =
                        ChangeEvent::from_row(Table::MessageReadReceipts, ChangeKind::Insert, &row);
                    tables.receipts.insert((message_id, user_id), row);
                    Some(event)
                }
            }
        };
        self.publish(event.into_iter().collect());
        Ok(())
    }
}

// ============================================================================
// Typing indicators
// ============================================================================

#[async_trait]
impl TypingRepository for MemoryStore {
    async fn upsert(&self, indicator: &TypingIndicator) -> RepoResult<()> {
        self.write(Table::TypingIndicators)?;
        let kind = {
            let mut tables = self.tables.lock();
            match tables
                .typing
                .insert((indicator.conversation_id, indicator.user_id), indicator.clone())
            {
                Some(_) => ChangeKind::Update,
                None => ChangeKind::Insert,
            }
        };
        self.publish(vec![ChangeEvent::from_row(
            Table::TypingIndicators,
            kind,
            indicator,
        )]);
        Ok(())
    }

    async fn delete(&self, conversation_id: Snowflake, user_id: Snowflake) -> RepoResult<bool> {
        self.write(Table::TypingIndicators)?;
        let removed = self.tables.lock().typing.remove(&(conversation_id, user_id));
        match removed {
            Some(row) => {
                self.publish(vec![ChangeEvent::from_row(
                    Table::TypingIndicators,
                    ChangeKind::Delete,
                    &row,
                )]);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn list(&self, conversation_id: Snowflake) -> RepoResult<Vec<TypingIndicator>> {
        self.read(Table::TypingIndicators)?;
        let mut rows = self.typing_rows(conversation_id);
        rows.sort_by_key(|t| t.started_at);
        Ok(rows)
    }

    async fn delete_stale(
        &self,
        conversation_id: Snowflake,
        before: DateTime<Utc>,
    ) -> RepoResult<u64> {
        self.write(Table::TypingIndicators)?;
        let removed: Vec<TypingIndicator> = {
            let mut tables = self.tables.lock();
            let stale: Vec<(Snowflake, Snowflake)> = tables
                .typing
                .iter()
                .filter(|(_, t)| t.conversation_id == conversation_id && t.started_at < before)
                .map(|(key, _)| *key)
                .collect();
            stale
                .iter()
                .filter_map(|key| tables.typing.remove(key))
                .collect()
        };
        let count = removed.len() as u64;
        self.publish(
            removed
                .iter()
                .map(|t| ChangeEvent::from_row(Table::TypingIndicators, ChangeKind::Delete, t))
                .collect(),
        );
        Ok(count)
    }
}

// ============================================================================
// Profiles
// ============================================================================

#[async_trait]
impl ProfileRepository for MemoryStore {
    async fn find_by_ids(&self, ids: &[Snowflake]) -> RepoResult<Vec<Profile>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        self.counters.lock().profile_reads += 1;
        self.check(FailPoint::Profiles)?;

        let tables = self.tables.lock();
        let mut seen = HashSet::new();
        Ok(ids
            .iter()
            .filter(|id| seen.insert(**id))
            .filter_map(|id| tables.profiles.get(id).cloned())
            .collect())
    }
}
