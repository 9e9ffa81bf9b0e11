//! Conversation service
//!
//! Builds the enriched conversation list and handles conversation lifecycle:
//! opening direct chats, creating groups, renaming, archiving, leaving, and
//! per-member pin/mute flags.

use std::collections::{HashMap, HashSet};

use convo_core::entities::{Conversation, DirectPair, MemberRole, Membership, Message, MessageStamp, Profile};
use convo_core::{DomainError, Snowflake};
use tracing::{debug, info, instrument};
use validator::Validate;

use crate::batch::{self, Grouped};
use crate::dto::{
    ConversationView, CreateGroupRequest, MemberView, MessageSummary, ProfileView,
    UpdateConversationRequest,
};

use super::context::ServiceContext;
use super::error::{ServiceError, ServiceResult};

/// Conversation service
pub struct ConversationService<'a> {
    ctx: &'a ServiceContext,
}

impl<'a> ConversationService<'a> {
    /// Create a new ConversationService
    pub fn new(ctx: &'a ServiceContext) -> Self {
        Self { ctx }
    }

    /// Conversation list of `user_id`, most recently active first
    ///
    /// Issues a fixed number of batch queries regardless of list length. Any
    /// failure aborts the whole load; no partial list is returned.
    #[instrument(skip(self))]
    pub async fn load_conversations(&self, user_id: Snowflake) -> ServiceResult<Vec<ConversationView>> {
        // 1. Own memberships
        let own = self.ctx.membership_repo().list_for_user(user_id).await?;
        if own.is_empty() {
            return Ok(Vec::new());
        }
        let conversation_ids: Vec<Snowflake> = own.iter().map(|m| m.conversation_id).collect();

        // 2. Conversation rows, ordered by last activity
        let conversations = self
            .ctx
            .conversation_repo()
            .find_by_ids(&conversation_ids)
            .await?;

        // 3. Every member of those conversations
        let all_members = Grouped::from_rows(
            self.ctx
                .membership_repo()
                .list_for_conversations(&conversation_ids)
                .await?,
            |m: &Membership| m.conversation_id,
        );

        // 4. Profiles of all members
        let member_ids: Vec<Snowflake> = conversation_ids
            .iter()
            .flat_map(|id| all_members.get(id).iter().map(|m| m.user_id))
            .collect();
        let profiles = batch::attach(
            member_ids,
            |ids| async move { self.ctx.profile_repo().find_by_ids(&ids).await },
            |p: &Profile| p.id,
        )
        .await?;

        // 5. Newest message per conversation
        let latest = Grouped::from_rows(
            self.ctx
                .message_repo()
                .find_latest_per_conversation(&conversation_ids)
                .await?,
            |m: &Message| m.conversation_id,
        );

        // 6. Unread counts
        let unread = self.count_unread(user_id, &own, &conversation_ids).await?;

        // 7. Merge
        let own_by_conversation: HashMap<Snowflake, &Membership> =
            own.iter().map(|m| (m.conversation_id, m)).collect();

        let views = conversations
            .into_iter()
            .map(|conversation| {
                let id = conversation.id;
                let membership = own_by_conversation.get(&id);
                let members: Vec<MemberView> = all_members
                    .get(&id)
                    .iter()
                    .map(|m| MemberView::new(m, profiles.first(&m.user_id)))
                    .collect();
                let other_user = if conversation.is_direct() {
                    all_members
                        .get(&id)
                        .iter()
                        .find(|m| m.user_id != user_id)
                        .and_then(|m| profiles.first(&m.user_id))
                        .map(ProfileView::from)
                } else {
                    None
                };

                ConversationView {
                    members,
                    last_message: latest.first(&id).map(MessageSummary::from),
                    unread_count: unread.get(&id).copied().unwrap_or(0),
                    other_user,
                    is_pinned: membership.is_some_and(|m| m.is_pinned),
                    is_muted: membership.is_some_and(|m| m.is_muted),
                    conversation,
                }
            })
            .collect::<Vec<_>>();

        info!(user_id = %user_id, conversations = views.len(), "Conversation list loaded");
        Ok(views)
    }

    /// Unread messages per conversation
    ///
    /// One query fetches candidates newer than the oldest read mark; each is
    /// then checked against its own conversation's mark. The member's own and
    /// deleted messages never count.
    async fn count_unread(
        &self,
        user_id: Snowflake,
        own: &[Membership],
        conversation_ids: &[Snowflake],
    ) -> ServiceResult<HashMap<Snowflake, usize>> {
        let since = own
            .iter()
            .map(|m| m.last_read_at)
            .collect::<Option<Vec<_>>>()
            .and_then(|marks| marks.into_iter().min());

        let candidates = self
            .ctx
            .message_repo()
            .find_unread_candidates(conversation_ids, user_id, since)
            .await?;

        let marks: HashMap<Snowflake, &Membership> =
            own.iter().map(|m| (m.conversation_id, m)).collect();
        let mut counts: HashMap<Snowflake, usize> = HashMap::new();
        for MessageStamp {
            conversation_id,
            created_at,
            ..
        } in candidates
        {
            if marks
                .get(&conversation_id)
                .is_some_and(|m| m.is_unread_at(created_at))
            {
                *counts.entry(conversation_id).or_default() += 1;
            }
        }
        Ok(counts)
    }

    /// Direct conversation between `user_id` and `other_user_id`, created if needed
    ///
    /// The store keys direct conversations by their user pair, so concurrent
    /// calls for the same pair end up with one conversation.
    #[instrument(skip(self))]
    pub async fn open_or_create_direct(
        &self,
        user_id: Snowflake,
        other_user_id: Snowflake,
    ) -> ServiceResult<Snowflake> {
        let pair = DirectPair::new(user_id, other_user_id)
            .filter(|_| !other_user_id.is_zero())
            .ok_or(DomainError::InvalidDirectParticipants)?;

        let id = match self.ctx.conversation_repo().find_direct(pair).await? {
            Some(existing) => existing,
            None => {
                let conversation = Conversation::new_direct(self.ctx.generate_id(), user_id);
                let id = self
                    .ctx
                    .conversation_repo()
                    .create_direct(&conversation, pair)
                    .await?;
                if id == conversation.id {
                    self.add_direct_members(id, user_id, pair).await?;
                    info!(conversation_id = %id, "Direct conversation created");
                    return Ok(id);
                }
                debug!(conversation_id = %id, "Direct conversation created concurrently");
                id
            }
        };

        // Members of a direct conversation never leave, so a missing row means
        // its creator has not written them yet. Write the same rows it will.
        if self.ctx.membership_repo().find(id, user_id).await?.is_none() {
            let creator = self
                .ctx
                .conversation_repo()
                .find_by_id(id)
                .await?
                .map_or(user_id, |c| c.created_by);
            self.add_direct_members(id, creator, pair).await?;
        }
        Ok(id)
    }

    /// Creator as admin, the other side as member; existing rows are kept
    async fn add_direct_members(&self, id: Snowflake, creator: Snowflake, pair: DirectPair) -> ServiceResult<()> {
        let (low, high) = pair.users();
        let other = if creator == low { high } else { low };
        self.ctx
            .membership_repo()
            .upsert_many(&[
                Membership::new(id, creator, MemberRole::Admin),
                Membership::new(id, other, MemberRole::Member),
            ])
            .await?;
        Ok(())
    }

    /// Create a group with the creator as admin
    #[instrument(skip(self, request))]
    pub async fn create_group(&self, creator_id: Snowflake, request: CreateGroupRequest) -> ServiceResult<Conversation> {
        request.validate()?;

        let others: Vec<Snowflake> = batch::distinct(&request.member_ids, |id| *id)
            .into_iter()
            .filter(|id| *id != creator_id && !id.is_zero())
            .collect();
        if others.is_empty() {
            return Err(ServiceError::validation("A group needs at least one other member"));
        }

        let mut conversation = Conversation::new_group(
            self.ctx.generate_id(),
            creator_id,
            request.name.map(|n| n.trim().to_string()),
        );
        conversation.description = request.description;
        self.ctx.conversation_repo().create(&conversation).await?;

        let mut members = vec![Membership::new(conversation.id, creator_id, MemberRole::Admin)];
        members.extend(
            others
                .iter()
                .map(|id| Membership::new(conversation.id, *id, MemberRole::Member)),
        );
        self.ctx.membership_repo().upsert_many(&members).await?;

        info!(conversation_id = %conversation.id, members = members.len(), "Group created");
        Ok(conversation)
    }

    /// Add members to a group; only admins may do this
    #[instrument(skip(self, user_ids))]
    pub async fn add_members(
        &self,
        conversation_id: Snowflake,
        actor_id: Snowflake,
        user_ids: &[Snowflake],
    ) -> ServiceResult<usize> {
        let conversation = self.get(conversation_id).await?;
        if conversation.is_direct() {
            return Err(DomainError::InvalidDirectParticipants.into());
        }
        let actor = self.ctx.require_member(conversation_id, actor_id).await?;
        if !actor.is_admin() {
            return Err(ServiceError::permission_denied("add members"));
        }

        let existing: HashSet<Snowflake> = self
            .ctx
            .membership_repo()
            .list_for_conversations(&[conversation_id])
            .await?
            .into_iter()
            .map(|m| m.user_id)
            .collect();
        let joining: Vec<Membership> = batch::distinct(user_ids, |id| *id)
            .into_iter()
            .filter(|id| !existing.contains(id) && !id.is_zero())
            .map(|id| Membership::new(conversation_id, id, MemberRole::Member))
            .collect();
        if joining.is_empty() {
            return Err(DomainError::AlreadyMember.into());
        }

        self.ctx.membership_repo().upsert_many(&joining).await?;
        info!(conversation_id = %conversation_id, added = joining.len(), "Members added");
        Ok(joining.len())
    }

    /// Rename or restyle a conversation
    #[instrument(skip(self, request))]
    pub async fn update_conversation(
        &self,
        conversation_id: Snowflake,
        actor_id: Snowflake,
        request: UpdateConversationRequest,
    ) -> ServiceResult<Conversation> {
        request.validate()?;
        let mut conversation = self.get(conversation_id).await?;
        self.ctx.require_member(conversation_id, actor_id).await?;

        if let Some(name) = request.name {
            conversation.name = Some(name.trim().to_string());
        }
        if let Some(description) = request.description {
            conversation.description = Some(description).filter(|d| !d.is_empty());
        }
        if let Some(avatar_url) = request.avatar_url {
            conversation.avatar_url = Some(avatar_url);
        }
        conversation.updated_at = chrono::Utc::now();

        self.ctx.conversation_repo().update(&conversation).await?;
        info!(conversation_id = %conversation_id, "Conversation updated");
        Ok(conversation)
    }

    /// Archive or unarchive; conversations are never deleted
    #[instrument(skip(self))]
    pub async fn set_archived(
        &self,
        conversation_id: Snowflake,
        actor_id: Snowflake,
        archived: bool,
    ) -> ServiceResult<Conversation> {
        let mut conversation = self.get(conversation_id).await?;
        self.ctx.require_member(conversation_id, actor_id).await?;
        if conversation.is_archived == archived {
            return Ok(conversation);
        }

        conversation.is_archived = archived;
        conversation.updated_at = chrono::Utc::now();
        self.ctx.conversation_repo().update(&conversation).await?;
        info!(conversation_id = %conversation_id, archived, "Conversation archive flag changed");
        Ok(conversation)
    }

    /// Leave a group
    ///
    /// Direct conversations always keep both members, and the last member of a
    /// group cannot leave.
    #[instrument(skip(self))]
    pub async fn leave_conversation(&self, conversation_id: Snowflake, user_id: Snowflake) -> ServiceResult<()> {
        let conversation = self.get(conversation_id).await?;
        if conversation.is_direct() {
            return Err(DomainError::InvalidDirectParticipants.into());
        }

        let members = self
            .ctx
            .membership_repo()
            .list_for_conversations(&[conversation_id])
            .await?;
        if !members.iter().any(|m| m.user_id == user_id) {
            return Err(DomainError::NotConversationMember.into());
        }
        if members.len() == 1 {
            return Err(ServiceError::conflict("The last member cannot leave; archive the group instead"));
        }

        self.ctx.membership_repo().delete(conversation_id, user_id).await?;
        info!(conversation_id = %conversation_id, user_id = %user_id, "Member left");
        Ok(())
    }

    #[instrument(skip(self))]
    pub async fn set_pinned(&self, conversation_id: Snowflake, user_id: Snowflake, pinned: bool) -> ServiceResult<()> {
        let updated = self
            .ctx
            .membership_repo()
            .set_pinned(conversation_id, user_id, pinned)
            .await?;
        if !updated {
            return Err(DomainError::NotConversationMember.into());
        }
        Ok(())
    }

    #[instrument(skip(self))]
    pub async fn set_muted(&self, conversation_id: Snowflake, user_id: Snowflake, muted: bool) -> ServiceResult<()> {
        let updated = self
            .ctx
            .membership_repo()
            .set_muted(conversation_id, user_id, muted)
            .await?;
        if !updated {
            return Err(DomainError::NotConversationMember.into());
        }
        Ok(())
    }

    async fn get(&self, conversation_id: Snowflake) -> ServiceResult<Conversation> {
        self.ctx
            .conversation_repo()
            .find_by_id(conversation_id)
            .await?
            .ok_or_else(|| ServiceError::not_found("Conversation", conversation_id.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dto::SendMessageRequest;
    use crate::services::message::MessageService;
    use crate::services::read_state::ReadStateService;
    use crate::services::testing::{engine, ALICE, BOB, CAROL};
    use convo_core::traits::ConversationRepository;
    use convo_core::Table;
    use convo_db::FailPoint;

    async fn send(ctx: &ServiceContext, conv: Snowflake, from: Snowflake, text: &str) -> Message {
        MessageService::new(ctx)
            .send_message(SendMessageRequest::text(conv, from, text))
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_no_memberships_short_circuits() {
        let (ctx, store) = engine().await;
        store.reset_counters();

        let list = ConversationService::new(&ctx).load_conversations(ALICE).await.unwrap();
        assert!(list.is_empty());
        assert_eq!(store.read_count(Table::ConversationMembers), 1);
        assert_eq!(store.read_count(Table::Conversations), 0);
        assert_eq!(store.read_count(Table::Messages), 0);
        assert_eq!(store.profile_reads(), 0);
    }

    #[tokio::test]
    async fn test_direct_conversation_view() {
        let (ctx, store) = engine().await;
        let service = ConversationService::new(&ctx);
        let conv = service.open_or_create_direct(ALICE, BOB).await.unwrap();
        send(&ctx, conv, ALICE, "Hello").await;

        let list = service.load_conversations(BOB).await.unwrap();
        assert_eq!(list.len(), 1);
        let view = &list[0];
        assert_eq!(view.unread_count, 1);
        assert_eq!(view.last_message.as_ref().unwrap().content.as_deref(), Some("Hello"));
        assert_eq!(view.other_user.as_ref().unwrap().id, ALICE);
        assert_eq!(view.members.len(), 2);
        assert_eq!(view.title(), "Alice");

        // The sender's own message is not unread for them
        let mine = service.load_conversations(ALICE).await.unwrap();
        assert_eq!(mine[0].unread_count, 0);
        assert_eq!(mine[0].other_user.as_ref().unwrap().id, BOB);
        assert!(store.conversation(conv).unwrap().last_message_at.is_some());
    }

    #[tokio::test]
    async fn test_empty_conversation_shows_no_messages() {
        let (ctx, store) = engine().await;
        store.seed_group(ALICE, &[BOB]).await;

        let list = ConversationService::new(&ctx).load_conversations(BOB).await.unwrap();
        assert_eq!(list[0].unread_count, 0);
        assert!(list[0].last_message.is_none());
        assert_eq!(list[0].preview(), "No messages yet");
        assert!(list[0].other_user.is_none());
    }

    #[tokio::test]
    async fn test_unread_respects_each_read_mark() {
        let (ctx, store) = engine().await;
        let service = ConversationService::new(&ctx);
        let first = store.seed_direct(ALICE, BOB).await;
        let second = store.seed_direct(CAROL, BOB).await;

        send(&ctx, first, ALICE, "one").await;
        send(&ctx, second, CAROL, "two").await;
        ReadStateService::new(&ctx).mark_read(first, BOB).await.unwrap();
        send(&ctx, second, CAROL, "three").await;

        let list = service.load_conversations(BOB).await.unwrap();
        let unread: HashMap<Snowflake, usize> = list.iter().map(|v| (v.id(), v.unread_count)).collect();
        assert_eq!(unread[&first], 0);
        assert_eq!(unread[&second], 2);
        // Most recently active first
        assert_eq!(list[0].id(), second);
    }

    #[tokio::test]
    async fn test_query_count_is_independent_of_list_size() {
        let (ctx, store) = engine().await;
        for _ in 0..5 {
            let conv = store.seed_group(ALICE, &[BOB, CAROL]).await;
            send(&ctx, conv, BOB, "hi").await;
        }
        store.reset_counters();

        ConversationService::new(&ctx).load_conversations(ALICE).await.unwrap();
        assert_eq!(store.read_count(Table::ConversationMembers), 2);
        assert_eq!(store.read_count(Table::Conversations), 1);
        assert_eq!(store.read_count(Table::Messages), 2);
        assert_eq!(store.profile_reads(), 1);
    }

    #[tokio::test]
    async fn test_any_failure_aborts_the_load() {
        let (ctx, store) = engine().await;
        store.seed_direct(ALICE, BOB).await;
        store.fail(FailPoint::Profiles);

        let err = ConversationService::new(&ctx).load_conversations(ALICE).await.unwrap_err();
        assert_eq!(err.error_code(), "DATABASE_ERROR");
    }

    #[tokio::test]
    async fn test_open_direct_returns_existing() {
        let (ctx, _store) = engine().await;
        let service = ConversationService::new(&ctx);
        let first = service.open_or_create_direct(ALICE, BOB).await.unwrap();
        let again = service.open_or_create_direct(BOB, ALICE).await.unwrap();
        assert_eq!(first, again);

        let other = service.open_or_create_direct(ALICE, CAROL).await.unwrap();
        assert_ne!(first, other);
        assert!(service.open_or_create_direct(ALICE, ALICE).await.is_err());
    }

    #[tokio::test]
    async fn test_concurrent_opens_share_one_conversation() {
        let (ctx, store) = engine().await;
        let service = ConversationService::new(&ctx);

        let (first, second) = tokio::join!(
            service.open_or_create_direct(ALICE, BOB),
            service.open_or_create_direct(BOB, ALICE),
        );
        let id = first.unwrap();
        assert_eq!(second.unwrap(), id);

        let listed = service.load_conversations(ALICE).await.unwrap();
        assert_eq!(listed.len(), 1);
        assert!(store.membership(id, ALICE).is_some());
        assert!(store.membership(id, BOB).is_some());
    }

    #[tokio::test]
    async fn test_lost_create_race_returns_the_winner() {
        let (ctx, store) = engine().await;
        let pair = DirectPair::new(ALICE, BOB).unwrap();
        // The winner's row is in but its members are not yet
        let winner = Conversation::new_direct(Snowflake::new(77), BOB);
        store.create_direct(&winner, pair).await.unwrap();

        let id = ConversationService::new(&ctx)
            .open_or_create_direct(ALICE, BOB)
            .await
            .unwrap();
        assert_eq!(id, winner.id);
        assert!(store.membership(id, BOB).unwrap().is_admin());
        assert!(!store.membership(id, ALICE).unwrap().is_admin());
    }

    #[tokio::test]
    async fn test_group_is_not_mistaken_for_direct() {
        let (ctx, store) = engine().await;
        let group = store.seed_group(ALICE, &[BOB]).await;
        let direct = ConversationService::new(&ctx)
            .open_or_create_direct(ALICE, BOB)
            .await
            .unwrap();
        assert_ne!(group, direct);
    }

    #[tokio::test]
    async fn test_create_group_and_leave() {
        let (ctx, store) = engine().await;
        let service = ConversationService::new(&ctx);
        let group = service
            .create_group(
                ALICE,
                CreateGroupRequest {
                    name: Some(" Band ".into()),
                    description: None,
                    member_ids: vec![BOB, BOB, ALICE],
                },
            )
            .await
            .unwrap();
        assert_eq!(group.name.as_deref(), Some("Band"));
        assert!(store.membership(group.id, ALICE).unwrap().is_admin());
        assert!(store.membership(group.id, BOB).is_some());

        service.leave_conversation(group.id, BOB).await.unwrap();
        assert!(store.membership(group.id, BOB).is_none());
        let err = service.leave_conversation(group.id, ALICE).await.unwrap_err();
        assert_eq!(err.error_code(), "CONFLICT");
    }

    #[tokio::test]
    async fn test_cannot_leave_direct() {
        let (ctx, store) = engine().await;
        let conv = store.seed_direct(ALICE, BOB).await;
        let err = ConversationService::new(&ctx)
            .leave_conversation(conv, BOB)
            .await
            .unwrap_err();
        assert_eq!(err.error_code(), "INVALID_DIRECT_PARTICIPANTS");
    }

    #[tokio::test]
    async fn test_add_members_requires_admin() {
        let (ctx, store) = engine().await;
        let service = ConversationService::new(&ctx);
        let conv = store.seed_group(ALICE, &[BOB]).await;

        let err = service.add_members(conv, BOB, &[CAROL]).await.unwrap_err();
        assert_eq!(err.error_code(), "PERMISSION_DENIED");
        assert_eq!(service.add_members(conv, ALICE, &[CAROL, BOB]).await.unwrap(), 1);
        let err = service.add_members(conv, ALICE, &[CAROL]).await.unwrap_err();
        assert_eq!(err.error_code(), "ALREADY_MEMBER");
    }

    #[tokio::test]
    async fn test_update_archive_pin_mute() {
        let (ctx, store) = engine().await;
        let service = ConversationService::new(&ctx);
        let conv = store.seed_group(ALICE, &[BOB]).await;

        let updated = service
            .update_conversation(
                conv,
                BOB,
                UpdateConversationRequest {
                    name: Some("Renamed".into()),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(updated.name.as_deref(), Some("Renamed"));
        assert!(service
            .update_conversation(conv, CAROL, UpdateConversationRequest::default())
            .await
            .is_err());

        service.set_archived(conv, ALICE, true).await.unwrap();
        assert!(store.conversation(conv).unwrap().is_archived);

        service.set_pinned(conv, BOB, true).await.unwrap();
        service.set_muted(conv, BOB, true).await.unwrap();
        let list = service.load_conversations(BOB).await.unwrap();
        assert!(list[0].is_pinned && list[0].is_muted);
        assert!(service.set_pinned(conv, CAROL, true).await.is_err());
    }
}
