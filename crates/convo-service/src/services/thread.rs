//! Thread service
//!
//! Loads the newest window of a conversation's messages and enriches them with
//! senders, reactions, attachments, and read receipts, one batch query each.

use convo_core::entities::{Attachment, Message, Profile, Reaction, ReactionCount, ReadReceipt};
use convo_core::Snowflake;
use tracing::{debug, instrument};

use crate::batch::{self, Grouped};
use crate::dto::{MessageView, ProfileView};

use super::context::ServiceContext;
use super::error::ServiceResult;

/// Thread service
pub struct ThreadService<'a> {
    ctx: &'a ServiceContext,
}

impl<'a> ThreadService<'a> {
    /// Create a new ThreadService
    pub fn new(ctx: &'a ServiceContext) -> Self {
        Self { ctx }
    }

    /// Latest page of the thread, oldest first
    pub async fn load_messages(&self, conversation_id: Snowflake, viewer_id: Snowflake) -> ServiceResult<Vec<MessageView>> {
        let limit = self.ctx.config().thread.page_size;
        self.load_window(conversation_id, viewer_id, limit).await
    }

    /// Latest `limit` messages, oldest first, ties broken by id
    ///
    /// Deleted messages stay in the window as tombstones.
    #[instrument(skip(self))]
    pub async fn load_window(
        &self,
        conversation_id: Snowflake,
        viewer_id: Snowflake,
        limit: u32,
    ) -> ServiceResult<Vec<MessageView>> {
        self.ctx.require_member(conversation_id, viewer_id).await?;

        let mut messages = self
            .ctx
            .message_repo()
            .find_latest(conversation_id, i64::from(limit.max(1)))
            .await?;
        messages.sort_by_key(Message::order_key);

        let views = self.enrich(messages, viewer_id).await?;
        debug!(conversation_id = %conversation_id, count = views.len(), "Thread loaded");
        Ok(views)
    }

    /// One enriched message, for appending a live insert to an open thread
    #[instrument(skip(self))]
    pub async fn load_message(&self, message_id: Snowflake, viewer_id: Snowflake) -> ServiceResult<Option<MessageView>> {
        let Some(message) = self.ctx.message_repo().find_by_id(message_id).await? else {
            return Ok(None);
        };
        Ok(self.enrich(vec![message], viewer_id).await?.pop())
    }

    async fn enrich(&self, messages: Vec<Message>, viewer_id: Snowflake) -> ServiceResult<Vec<MessageView>> {
        if messages.is_empty() {
            return Ok(Vec::new());
        }
        let message_ids: Vec<Snowflake> = messages.iter().map(|m| m.id).collect();
        let sender_ids: Vec<Snowflake> = messages.iter().map(|m| m.sender_id).collect();

        let profiles = batch::attach(
            sender_ids,
            |ids| async move { self.ctx.profile_repo().find_by_ids(&ids).await },
            |p: &Profile| p.id,
        )
        .await?;
        let mut reactions = batch::attach(
            message_ids.clone(),
            |ids| async move { self.ctx.reaction_repo().find_by_messages(&ids).await },
            |r: &Reaction| r.message_id,
        )
        .await?;
        let mut attachments = batch::attach(
            message_ids.clone(),
            |ids| async move { self.ctx.attachment_repo().find_by_messages(&ids).await },
            |a: &Attachment| a.message_id,
        )
        .await?;
        let mut receipts: Grouped<Snowflake, ReadReceipt> = batch::attach(
            message_ids,
            |ids| async move { self.ctx.receipt_repo().find_by_messages(&ids).await },
            |r: &ReadReceipt| r.message_id,
        )
        .await?;

        Ok(messages
            .into_iter()
            .map(|message| {
                let reactions = reactions.take(&message.id);
                MessageView {
                    sender: profiles.first(&message.sender_id).map(ProfileView::from),
                    reaction_summary: ReactionCount::tally(&reactions, viewer_id),
                    reactions,
                    attachments: attachments.take(&message.id),
                    receipts: receipts.take(&message.id),
                    message,
                }
            })
            .collect())
    }
}
