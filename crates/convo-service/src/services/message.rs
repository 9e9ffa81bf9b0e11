//! Message service
//!
//! The send/edit/delete pipeline, attachment uploads, reactions, and per-message
//! receipts.
//!
//! Sending is four sequential writes. Only the insert decides success; the
//! trailing three (last activity, the sender's own receipt, clearing their
//! typing row) are logged on failure and queued for reconciliation.

use chrono::Utc;
use convo_core::entities::{Attachment, Message, MessageType, Reaction};
use convo_core::{DomainError, Snowflake};
use serde_json::json;
use tracing::{info, instrument, warn};
use validator::Validate;

use crate::dto::{ReactionRequest, SendMessageRequest, UploadRequest, UploadResult};
use crate::notify::Notification;

use super::context::ServiceContext;
use super::error::{ServiceError, ServiceResult};
use super::reconcile::PendingRepair;

/// Message service
pub struct MessageService<'a> {
    ctx: &'a ServiceContext,
}

impl<'a> MessageService<'a> {
    /// Create a new MessageService
    pub fn new(ctx: &'a ServiceContext) -> Self {
        Self { ctx }
    }

    // ========================================================================
    // Send / edit / delete
    // ========================================================================

    /// Send a text message
    ///
    /// Request checks run before any store call. A failed insert is returned
    /// to the caller (and notified) so the draft can be restored.
    #[instrument(skip(self, request), fields(conversation_id = %request.conversation_id))]
    pub async fn send_message(&self, request: SendMessageRequest) -> ServiceResult<Message> {
        if request.conversation_id.is_zero() {
            return Err(DomainError::MissingConversationId.into());
        }
        let content = request.trimmed_content().ok_or(DomainError::EmptyContent)?;
        self.check_length(content)?;

        self.ctx
            .require_member(request.conversation_id, request.sender_id)
            .await?;

        if let Some(reply_to_id) = request.reply_to_id {
            let parent = self
                .ctx
                .message_repo()
                .find_by_id(reply_to_id)
                .await?
                .ok_or_else(|| ServiceError::not_found("Message", reply_to_id.to_string()))?;
            if parent.conversation_id != request.conversation_id {
                return Err(ServiceError::validation(
                    "Replied-to message must be in the same conversation",
                ));
            }
        }

        let message = Message::new(
            self.ctx.generate_id(),
            request.conversation_id,
            request.sender_id,
            Some(content.to_string()),
            request.message_type,
        )
        .with_reply_to(request.reply_to_id);

        let message = self.insert(&message).await?;
        self.finish_send(&message).await;

        info!(message_id = %message.id, "Message sent");
        Ok(message)
    }

    /// Edit the content of one's own message
    #[instrument(skip(self, content))]
    pub async fn edit_message(&self, message_id: Snowflake, editor_id: Snowflake, content: &str) -> ServiceResult<Message> {
        let content = content.trim();
        if content.is_empty() {
            return Err(DomainError::EmptyContent.into());
        }
        self.check_length(content)?;

        let mut message = self.get(message_id).await?;
        if message.sender_id != editor_id {
            return Err(DomainError::NotMessageAuthor.into());
        }
        if message.is_deleted {
            return Err(DomainError::MessageDeleted.into());
        }

        let at = Utc::now();
        let updated = self
            .ctx
            .message_repo()
            .update_content(message_id, content, at)
            .await?;
        if !updated {
            // Deleted between the read and the write
            return Err(DomainError::MessageDeleted.into());
        }

        message.edit(content.to_string(), at);
        info!(message_id = %message_id, "Message edited");
        Ok(message)
    }

    /// Soft-delete one's own message
    ///
    /// The row stays with content cleared; reactions and attachments stay too.
    /// Deleting an already deleted message is a no-op.
    #[instrument(skip(self))]
    pub async fn delete_message(&self, message_id: Snowflake, actor_id: Snowflake) -> ServiceResult<()> {
        let message = self.get(message_id).await?;
        if message.sender_id != actor_id {
            return Err(DomainError::NotMessageAuthor.into());
        }
        if message.is_deleted {
            return Ok(());
        }

        self.ctx.message_repo().soft_delete(message_id, Utc::now()).await?;
        info!(message_id = %message_id, "Message deleted");
        Ok(())
    }

    /// Clear a conversation's history
    ///
    /// Attachments of every message are removed first, then every message is
    /// marked deleted with content cleared. Returns the number of messages
    /// touched.
    #[instrument(skip(self))]
    pub async fn clear_history(&self, conversation_id: Snowflake, actor_id: Snowflake) -> ServiceResult<u64> {
        self.ctx.require_member(conversation_id, actor_id).await?;

        let ids = self.ctx.message_repo().ids_for_conversation(conversation_id).await?;
        if ids.is_empty() {
            return Ok(0);
        }
        let removed = self.ctx.attachment_repo().delete_by_messages(&ids).await?;
        let cleared = self
            .ctx
            .message_repo()
            .soft_delete_conversation(conversation_id, Utc::now())
            .await?;

        info!(
            conversation_id = %conversation_id,
            messages = cleared,
            attachments = removed,
            "History cleared"
        );
        Ok(cleared)
    }

    // ========================================================================
    // Uploads
    // ========================================================================

    /// Upload a file and post it as a message
    ///
    /// The blob goes first; if it fails no message is created. The message
    /// type follows the MIME prefix.
    #[instrument(skip(self, request), fields(conversation_id = %request.conversation_id, size = request.bytes.len()))]
    pub async fn upload_attachment(&self, request: UploadRequest) -> ServiceResult<UploadResult> {
        if request.conversation_id.is_zero() {
            return Err(DomainError::MissingConversationId.into());
        }
        request.validate()?;

        let storage = &self.ctx.config().storage;
        let size = request.bytes.len() as u64;
        if size == 0 {
            return Err(ServiceError::validation("File is empty"));
        }
        if size > storage.max_upload_bytes {
            return Err(DomainError::FileTooLarge {
                max: storage.max_upload_bytes,
            }
            .into());
        }
        let caption = request
            .caption
            .as_deref()
            .map(str::trim)
            .filter(|c| !c.is_empty())
            .map(str::to_string);

        self.ctx
            .require_member(request.conversation_id, request.sender_id)
            .await?;

        let message_id = self.ctx.generate_id();
        let path = format!(
            "{}/{}/{}.{}",
            request.conversation_id,
            message_id,
            Utc::now().timestamp_millis(),
            request.extension()
        );

        let stored = self.store_blob(&request, &path).await?;
        let url = self.ctx.blob_store().public_url(&storage.bucket, &stored).await?;

        let attachment = Attachment::new(
            self.ctx.generate_id(),
            message_id,
            url.clone(),
            request.file_name.clone(),
            request.content_type.clone(),
            i64::try_from(size).ok(),
        );
        let message = Message::new(
            message_id,
            request.conversation_id,
            request.sender_id,
            caption,
            MessageType::from_mime(&request.content_type),
        )
        .with_metadata(json!({
            "attachments": [{
                "url": url,
                "name": attachment.file_name,
                "type": attachment.file_type,
                "size": size,
                "path": stored,
            }]
        }));

        let message = self.insert(&message).await?;
        if let Err(e) = self.ctx.attachment_repo().create(&attachment).await {
            // The metadata already carries the file, so the message stands
            warn!(error = %e, message_id = %message_id, step = "attachment_row", "Attachment row not written");
            self.ctx.repairs().record(PendingRepair::AttachmentRow {
                attachment: attachment.clone(),
            });
        }
        self.finish_send(&message).await;

        info!(message_id = %message_id, message_type = message.message_type.as_str(), "Attachment sent");
        Ok(UploadResult {
            message_id,
            attachment,
            url,
        })
    }

    async fn store_blob(&self, request: &UploadRequest, path: &str) -> ServiceResult<String> {
        let bucket = &self.ctx.config().storage.bucket;
        match self
            .ctx
            .blob_store()
            .upload(bucket, path, request.bytes.clone(), &request.content_type)
            .await
        {
            Ok(stored) => Ok(stored),
            Err(e) => {
                let error = ServiceError::from(e);
                self.ctx.notifier().notify(Notification::SendFailed {
                    conversation_id: request.conversation_id,
                    message: error.user_message(),
                });
                Err(error)
            }
        }
    }

    // ========================================================================
    // Reactions and receipts
    // ========================================================================

    /// Add a reaction; adding the same one twice is a no-op
    #[instrument(skip(self, request))]
    pub async fn add_reaction(&self, request: ReactionRequest) -> ServiceResult<bool> {
        request.validate()?;
        self.reactable(request.message_id, request.user_id).await?;

        let added = self
            .ctx
            .reaction_repo()
            .add(&Reaction::new(request.message_id, request.user_id, request.emoji))
            .await?;
        Ok(added)
    }

    #[instrument(skip(self, request))]
    pub async fn remove_reaction(&self, request: ReactionRequest) -> ServiceResult<bool> {
        request.validate()?;
        Ok(self
            .ctx
            .reaction_repo()
            .remove(request.message_id, request.user_id, &request.emoji)
            .await?)
    }

    /// Add the reaction if absent, otherwise remove it; returns whether it is now present
    #[instrument(skip(self, request))]
    pub async fn toggle_reaction(&self, request: ReactionRequest) -> ServiceResult<bool> {
        request.validate()?;
        self.reactable(request.message_id, request.user_id).await?;

        let removed = self
            .ctx
            .reaction_repo()
            .remove(request.message_id, request.user_id, &request.emoji)
            .await?;
        if removed {
            return Ok(false);
        }
        self.ctx
            .reaction_repo()
            .add(&Reaction::new(request.message_id, request.user_id, request.emoji))
            .await?;
        Ok(true)
    }

    #[instrument(skip(self))]
    pub async fn mark_message_delivered(&self, message_id: Snowflake, user_id: Snowflake) -> ServiceResult<()> {
        let message = self.get(message_id).await?;
        self.ctx.require_member(message.conversation_id, user_id).await?;
        self.ctx
            .receipt_repo()
            .record_delivered(message_id, user_id, Utc::now())
            .await?;
        Ok(())
    }

    #[instrument(skip(self))]
    pub async fn mark_message_read(&self, message_id: Snowflake, user_id: Snowflake) -> ServiceResult<()> {
        let message = self.get(message_id).await?;
        self.ctx.require_member(message.conversation_id, user_id).await?;
        self.ctx
            .receipt_repo()
            .record_read(message_id, user_id, Utc::now())
            .await?;
        Ok(())
    }

    // ========================================================================
    // Helpers
    // ========================================================================

    async fn get(&self, message_id: Snowflake) -> ServiceResult<Message> {
        self.ctx
            .message_repo()
            .find_by_id(message_id)
            .await?
            .ok_or_else(|| ServiceError::not_found("Message", message_id.to_string()))
    }

    async fn reactable(&self, message_id: Snowflake, user_id: Snowflake) -> ServiceResult<Message> {
        let message = self.get(message_id).await?;
        if message.is_deleted {
            return Err(DomainError::MessageDeleted.into());
        }
        self.ctx.require_member(message.conversation_id, user_id).await?;
        Ok(message)
    }

    fn check_length(&self, content: &str) -> ServiceResult<()> {
        let max = self.ctx.config().thread.max_content_chars;
        if content.chars().count() > max {
            return Err(DomainError::ContentTooLong { max }.into());
        }
        Ok(())
    }

    /// The primary write; failure is notified and returned. The stored row
    /// carries the store's timestamps, which every later step uses.
    async fn insert(&self, message: &Message) -> ServiceResult<Message> {
        match self.ctx.message_repo().create(message).await {
            Ok(stored) => Ok(stored),
            Err(e) => {
                let error = ServiceError::from(e);
                warn!(error = %error, conversation_id = %message.conversation_id, "Message insert failed");
                self.ctx.notifier().notify(Notification::SendFailed {
                    conversation_id: message.conversation_id,
                    message: error.user_message(),
                });
                Err(error)
            }
        }
    }

    /// Trailing best-effort writes after a successful insert
    async fn finish_send(&self, message: &Message) {
        let conversation_id = message.conversation_id;
        let sender_id = message.sender_id;

        if let Err(e) = self
            .ctx
            .conversation_repo()
            .touch_last_message(conversation_id, message.created_at)
            .await
        {
            warn!(error = %e, step = "touch_conversation", message_id = %message.id, "Trailing send step failed");
            self.ctx
                .repairs()
                .record(PendingRepair::TouchConversation { conversation_id });
        }

        if let Err(e) = self
            .ctx
            .receipt_repo()
            .record_read(message.id, sender_id, message.created_at)
            .await
        {
            warn!(error = %e, step = "self_receipt", message_id = %message.id, "Trailing send step failed");
            self.ctx.repairs().record(PendingRepair::SelfReceipt {
                message_id: message.id,
                user_id: sender_id,
                at: message.created_at,
            });
        }

        self.ctx.typing_timers().disarm(conversation_id, sender_id);
        if let Err(e) = self.ctx.typing_repo().delete(conversation_id, sender_id).await {
            warn!(error = %e, step = "clear_typing", message_id = %message.id, "Trailing send step failed");
            self.ctx.repairs().record(PendingRepair::ClearTyping {
                conversation_id,
                user_id: sender_id,
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::reconcile::ReconciliationService;
    use crate::services::testing::{engine, ALICE, BOB, CAROL};
    use crate::services::typing::TypingService;
    use convo_core::Table;
    use convo_db::FailPoint;

    #[tokio::test]
    async fn test_send_runs_all_four_steps() {
        let (ctx, store) = engine().await;
        let conv = store.seed_direct(ALICE, BOB).await;
        TypingService::new(&ctx).start_typing(conv, ALICE).await.unwrap();

        let message = MessageService::new(&ctx)
            .send_message(SendMessageRequest::text(conv, ALICE, "  Hello  "))
            .await
            .unwrap();

        assert_eq!(store.message(message.id).unwrap().content.as_deref(), Some("Hello"));
        assert_eq!(store.conversation(conv).unwrap().last_message_at, Some(message.created_at));
        assert!(store.receipt(message.id, ALICE).unwrap().is_read());
        assert!(store.typing_rows(conv).is_empty());
        assert!(!ctx.typing_timers().is_armed(conv, ALICE));
        assert!(ctx.repairs().is_empty());
    }

    #[tokio::test]
    async fn test_sent_message_carries_store_timestamps() {
        let (ctx, store) = engine().await;
        let conv = store.seed_direct(ALICE, BOB).await;

        let message = MessageService::new(&ctx)
            .send_message(SendMessageRequest::text(conv, ALICE, "stamped"))
            .await
            .unwrap();

        let row = store.message(message.id).unwrap();
        assert_eq!(row, message);
        assert_eq!(store.conversation(conv).unwrap().last_message_at, Some(row.created_at));
        assert_eq!(store.receipt(message.id, ALICE).unwrap().read_at, Some(row.created_at));

        let read_at = crate::services::ReadStateService::new(&ctx)
            .mark_read(conv, BOB)
            .await
            .unwrap();
        assert!(read_at >= row.created_at);
    }

    #[tokio::test]
    async fn test_validation_happens_before_any_store_call() {
        let (ctx, store) = engine().await;
        let conv = store.seed_direct(ALICE, BOB).await;
        store.reset_counters();
        let service = MessageService::new(&ctx);

        let err = service
            .send_message(SendMessageRequest::text(conv, ALICE, "   "))
            .await
            .unwrap_err();
        assert_eq!(err.error_code(), "EMPTY_CONTENT");

        let err = service
            .send_message(SendMessageRequest::text(Snowflake::default(), ALICE, "hi"))
            .await
            .unwrap_err();
        assert_eq!(err.error_code(), "MISSING_CONVERSATION_ID");

        let err = service
            .send_message(SendMessageRequest::text(conv, ALICE, "x".repeat(4001)))
            .await
            .unwrap_err();
        assert_eq!(err.error_code(), "CONTENT_TOO_LONG");

        assert_eq!(store.read_count(Table::ConversationMembers), 0);
        assert_eq!(store.write_count(Table::Messages), 0);
    }

    #[tokio::test]
    async fn test_non_member_cannot_send() {
        let (ctx, store) = engine().await;
        let conv = store.seed_direct(ALICE, BOB).await;
        let err = MessageService::new(&ctx)
            .send_message(SendMessageRequest::text(conv, CAROL, "hi"))
            .await
            .unwrap_err();
        assert_eq!(err.error_code(), "NOT_CONVERSATION_MEMBER");
        assert!(store.messages_in(conv).is_empty());
    }

    #[tokio::test]
    async fn test_failed_insert_is_surfaced_and_notified() {
        let (ctx, store) = engine().await;
        let conv = store.seed_direct(ALICE, BOB).await;
        store.fail(FailPoint::Write(Table::Messages));

        let err = MessageService::new(&ctx)
            .send_message(SendMessageRequest::text(conv, ALICE, "hi"))
            .await
            .unwrap_err();
        assert_eq!(err.error_code(), "DATABASE_ERROR");
        assert!(matches!(
            store.notifier.snapshot().as_slice(),
            [Notification::SendFailed { conversation_id, .. }] if *conversation_id == conv
        ));
        assert!(store.conversation(conv).unwrap().last_message_at.is_none());
    }

    #[tokio::test]
    async fn test_trailing_failures_keep_the_message_and_queue_repairs() {
        let (ctx, store) = engine().await;
        let conv = store.seed_direct(ALICE, BOB).await;
        store.fail(FailPoint::Write(Table::Conversations));
        store.fail(FailPoint::Write(Table::MessageReadReceipts));

        let message = MessageService::new(&ctx)
            .send_message(SendMessageRequest::text(conv, ALICE, "hi"))
            .await
            .unwrap();
        assert!(store.message(message.id).is_some());
        assert!(store.receipt(message.id, ALICE).is_none());
        assert_eq!(ctx.repairs().len(), 2);

        store.heal_all();
        let report = ReconciliationService::new(&ctx).sweep().await;
        assert_eq!(report.repaired, 2);
        assert_eq!(store.conversation(conv).unwrap().last_message_at, Some(message.created_at));
        assert!(store.receipt(message.id, ALICE).unwrap().is_read());
        assert!(ctx.repairs().is_empty());
    }

    #[tokio::test]
    async fn test_reply_must_stay_in_conversation() {
        let (ctx, store) = engine().await;
        let service = MessageService::new(&ctx);
        let first = store.seed_direct(ALICE, BOB).await;
        let second = store.seed_direct(ALICE, CAROL).await;
        let parent = service
            .send_message(SendMessageRequest::text(first, BOB, "question"))
            .await
            .unwrap();

        let reply = service
            .send_message(SendMessageRequest::text(first, ALICE, "answer").replying_to(parent.id))
            .await
            .unwrap();
        assert_eq!(reply.reply_to_id, Some(parent.id));

        let err = service
            .send_message(SendMessageRequest::text(second, ALICE, "wrong").replying_to(parent.id))
            .await
            .unwrap_err();
        assert_eq!(err.error_code(), "VALIDATION_ERROR");
    }

    #[tokio::test]
    async fn test_edit_rules() {
        let (ctx, store) = engine().await;
        let conv = store.seed_direct(ALICE, BOB).await;
        let service = MessageService::new(&ctx);
        let message = service
            .send_message(SendMessageRequest::text(conv, ALICE, "Hello"))
            .await
            .unwrap();

        let edited = service.edit_message(message.id, ALICE, "Hello!").await.unwrap();
        assert!(edited.is_edited);
        let stored = store.message(message.id).unwrap();
        assert_eq!(stored.content.as_deref(), Some("Hello!"));
        assert!(stored.edited_at.is_some());

        let err = service.edit_message(message.id, BOB, "hijack").await.unwrap_err();
        assert_eq!(err.error_code(), "NOT_MESSAGE_AUTHOR");

        service.delete_message(message.id, ALICE).await.unwrap();
        let err = service.edit_message(message.id, ALICE, "again").await.unwrap_err();
        assert_eq!(err.error_code(), "MESSAGE_DELETED");
    }

    #[tokio::test]
    async fn test_soft_delete_keeps_row_reactions_and_attachments() {
        let (ctx, store) = engine().await;
        let conv = store.seed_direct(ALICE, BOB).await;
        let service = MessageService::new(&ctx);
        let upload = service
            .upload_attachment(UploadRequest::new(conv, ALICE, "cat.png", "image/png", vec![1, 2, 3]))
            .await
            .unwrap();
        service
            .add_reaction(ReactionRequest::new(upload.message_id, BOB, "❤️"))
            .await
            .unwrap();

        let err = service.delete_message(upload.message_id, BOB).await.unwrap_err();
        assert_eq!(err.error_code(), "NOT_MESSAGE_AUTHOR");
        service.delete_message(upload.message_id, ALICE).await.unwrap();
        service.delete_message(upload.message_id, ALICE).await.unwrap();

        let row = store.message(upload.message_id).unwrap();
        assert!(row.is_deleted);
        assert!(row.content.is_none());
        assert!(row.deleted_at.is_some());
        assert_eq!(store.attachments_of(upload.message_id).len(), 1);

        let reactions = convo_core::ReactionRepository::find_by_messages(store.store.as_ref(), &[upload.message_id])
            .await
            .unwrap();
        assert_eq!(reactions.len(), 1);
    }

    #[tokio::test]
    async fn test_clear_history_cascades_attachments() {
        let (ctx, store) = engine().await;
        let conv = store.seed_direct(ALICE, BOB).await;
        let service = MessageService::new(&ctx);
        service
            .send_message(SendMessageRequest::text(conv, BOB, "text"))
            .await
            .unwrap();
        let upload = service
            .upload_attachment(UploadRequest::new(conv, ALICE, "notes.pdf", "application/pdf", vec![7; 16]))
            .await
            .unwrap();

        assert!(service.clear_history(conv, CAROL).await.is_err());
        assert_eq!(service.clear_history(conv, ALICE).await.unwrap(), 2);
        assert!(store
            .messages_in(conv)
            .iter()
            .all(|m| m.is_deleted && m.content.is_none()));
        assert!(store.attachments_of(upload.message_id).is_empty());
    }

    #[tokio::test]
    async fn test_upload_derives_type_and_metadata() {
        let (ctx, store) = engine().await;
        let conv = store.seed_direct(ALICE, BOB).await;
        let bytes = vec![0u8; 2 * 1024 * 1024];

        let result = MessageService::new(&ctx)
            .upload_attachment(UploadRequest::new(conv, ALICE, "photo.png", "image/png", bytes))
            .await
            .unwrap();

        let message = store.message(result.message_id).unwrap();
        assert_eq!(message.message_type, MessageType::Image);
        assert!(message.content.is_none());
        let attachments = store.attachments_of(result.message_id);
        assert_eq!(attachments.len(), 1);
        assert_eq!(attachments[0].file_url, result.url);
        let metadata = message.metadata.unwrap();
        assert_eq!(metadata["attachments"][0]["url"], result.url.as_str());
        assert_eq!(metadata["attachments"][0]["size"], 2 * 1024 * 1024);
        assert!(store.blobs.len() == 1);
        assert!(store.conversation(conv).unwrap().last_message_at.is_some());
    }

    #[tokio::test]
    async fn test_upload_failure_creates_no_message() {
        let (ctx, store) = engine().await;
        let conv = store.seed_direct(ALICE, BOB).await;
        store.blobs.set_fail_uploads(true);

        let err = MessageService::new(&ctx)
            .upload_attachment(UploadRequest::new(conv, ALICE, "a.mp3", "audio/mpeg", vec![1]))
            .await
            .unwrap_err();
        assert_eq!(err.error_code(), "STORAGE_ERROR");
        assert!(store.messages_in(conv).is_empty());
        assert_eq!(store.notifier.len(), 1);
    }

    #[tokio::test]
    async fn test_upload_size_cap() {
        let (ctx, store) = engine().await;
        let conv = store.seed_direct(ALICE, BOB).await;
        let too_big = vec![0u8; 5 * 1024 * 1024 + 1];

        let err = MessageService::new(&ctx)
            .upload_attachment(UploadRequest::new(conv, ALICE, "big.mov", "video/quicktime", too_big))
            .await
            .unwrap_err();
        assert_eq!(err.error_code(), "FILE_TOO_LARGE");
        assert!(store.blobs.is_empty());
    }

    #[tokio::test]
    async fn test_reactions_toggle_and_idempotence() {
        let (ctx, store) = engine().await;
        let conv = store.seed_direct(ALICE, BOB).await;
        let service = MessageService::new(&ctx);
        let message = service
            .send_message(SendMessageRequest::text(conv, ALICE, "hi"))
            .await
            .unwrap();

        assert!(service.add_reaction(ReactionRequest::new(message.id, BOB, "👍")).await.unwrap());
        assert!(!service.add_reaction(ReactionRequest::new(message.id, BOB, "👍")).await.unwrap());
        assert!(!service.toggle_reaction(ReactionRequest::new(message.id, BOB, "👍")).await.unwrap());
        assert!(service.toggle_reaction(ReactionRequest::new(message.id, BOB, "👍")).await.unwrap());
        assert!(service.remove_reaction(ReactionRequest::new(message.id, BOB, "👍")).await.unwrap());

        let err = service
            .add_reaction(ReactionRequest::new(message.id, CAROL, "👍"))
            .await
            .unwrap_err();
        assert_eq!(err.error_code(), "NOT_CONVERSATION_MEMBER");
        assert!(service.add_reaction(ReactionRequest::new(message.id, BOB, "")).await.is_err());
    }

    #[tokio::test]
    async fn test_receipts_progress_from_delivered_to_read() {
        let (ctx, store) = engine().await;
        let conv = store.seed_direct(ALICE, BOB).await;
        let service = MessageService::new(&ctx);
        let message = service
            .send_message(SendMessageRequest::text(conv, ALICE, "hi"))
            .await
            .unwrap();

        service.mark_message_delivered(message.id, BOB).await.unwrap();
        assert!(!store.receipt(message.id, BOB).unwrap().is_read());
        service.mark_message_read(message.id, BOB).await.unwrap();
        assert!(store.receipt(message.id, BOB).unwrap().is_read());
        assert!(service.mark_message_read(message.id, CAROL).await.is_err());
    }
}
