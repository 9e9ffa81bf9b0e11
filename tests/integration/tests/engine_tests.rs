//! Engine scenario tests
//!
//! These run against the in-memory store with Tokio's paused clock, so
//! debounce windows, dwell times and typing timeouts elapse instantly.
//!
//! Run with: cargo test -p integration-tests --test engine_tests

use std::time::Duration;

use convo_core::{MessageType, Table};
use convo_service::dto::{ReactionRequest, UploadRequest};
use convo_service::realtime::RealtimeBridge;
use convo_service::{
    ConversationListSession, ConversationService, MessageService, ReadStateService, ReloadTrigger, ThreadService,
    ThreadSession, TypingService, TypingSession, VisibilityTracker,
};
use integration_tests::{alice, bob, carol, png_bytes, TestEngine, TWO_MIB};

// ============================================================================
// Scenarios
// ============================================================================

#[tokio::test(start_paused = true)]
async fn test_hello_reaches_recipient_as_unread() {
    let engine = TestEngine::start().unwrap();
    let (a, b) = (alice(), bob());

    let conversation_id = engine.direct(&a, &b).await.unwrap();
    engine.send(conversation_id, &a, "Hello").await.unwrap();

    let conversations = ConversationService::new(&engine.ctx)
        .load_conversations(b.id)
        .await
        .unwrap();
    assert_eq!(conversations.len(), 1);

    let view = &conversations[0];
    assert_eq!(view.id(), conversation_id);
    assert_eq!(view.unread_count, 1);
    assert_eq!(
        view.last_message.as_ref().and_then(|m| m.content.as_deref()),
        Some("Hello")
    );
    assert_eq!(view.other_user.as_ref().map(|p| p.id), Some(a.id));
}

#[tokio::test(start_paused = true)]
async fn test_visible_last_message_marks_read_once() {
    let engine = TestEngine::start().unwrap();
    let (a, b) = (alice(), bob());
    let conversation_id = engine.direct(&a, &b).await.unwrap();
    engine.send(conversation_id, &a, "Hello").await.unwrap();

    let thread = ThreadSession::new(engine.ctx.clone(), conversation_id, b.id);
    thread.reload().await;
    assert_eq!(thread.messages().len(), 1);

    engine.store.reset_counters();
    let visibility = VisibilityTracker::from_config(&engine.ctx.config().sync).session();
    visibility.attach(conversation_id, thread.read_marker());

    // Scrolling jitters around the threshold before settling
    visibility.observe(0.6);
    tokio::time::sleep(Duration::from_millis(200)).await;
    visibility.observe(0.2);
    visibility.observe(1.0);
    tokio::time::sleep(Duration::from_millis(499)).await;
    assert_eq!(engine.store.write_count(Table::ConversationMembers), 0);

    tokio::time::sleep(Duration::from_secs(1)).await;
    assert!(visibility.has_fired());
    assert_eq!(engine.store.write_count(Table::ConversationMembers), 1);

    // Staying in view does not mark again
    visibility.observe(1.0);
    tokio::time::sleep(Duration::from_secs(2)).await;
    assert_eq!(engine.store.write_count(Table::ConversationMembers), 1);

    assert_eq!(engine.unread(conversation_id, &b).await.unwrap(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_edit_shows_in_thread() {
    let engine = TestEngine::start().unwrap();
    let (a, b) = (alice(), bob());
    let conversation_id = engine.direct(&a, &b).await.unwrap();
    let hello = engine.send(conversation_id, &a, "Hello").await.unwrap();

    MessageService::new(&engine.ctx)
        .edit_message(hello.id, a.id, "Hello!")
        .await
        .unwrap();

    let messages = ThreadService::new(&engine.ctx)
        .load_messages(conversation_id, b.id)
        .await
        .unwrap();
    assert_eq!(messages.len(), 1);
    assert!(messages[0].message.is_edited);
    assert_eq!(messages[0].message.content.as_deref(), Some("Hello!"));
}

#[tokio::test(start_paused = true)]
async fn test_png_upload_becomes_image_message() {
    let engine = TestEngine::start().unwrap();
    let (a, b) = (alice(), bob());
    let conversation_id = engine.direct(&a, &b).await.unwrap();

    let result = MessageService::new(&engine.ctx)
        .upload_attachment(UploadRequest::new(
            conversation_id,
            a.id,
            "photo.png",
            "image/png",
            png_bytes(TWO_MIB),
        ))
        .await
        .unwrap();

    let message = engine.store.message(result.message_id).unwrap();
    assert_eq!(message.message_type, MessageType::Image);
    assert_eq!(serde_json::to_value(message.message_type).unwrap(), "image");

    let attachments = engine.store.attachments_of(result.message_id);
    assert_eq!(attachments.len(), 1);
    assert_eq!(attachments[0].file_url, result.url);
    assert_eq!(engine.blobs.len(), 1);

    let thread = ThreadService::new(&engine.ctx)
        .load_messages(conversation_id, b.id)
        .await
        .unwrap();
    assert_eq!(thread[0].attachments.len(), 1);
}

// ============================================================================
// Properties
// ============================================================================

#[tokio::test(start_paused = true)]
async fn test_unread_is_monotonic() {
    let engine = TestEngine::start().unwrap();
    let (a, b, c) = (alice(), bob(), carol());
    let group = ConversationService::new(&engine.ctx)
        .create_group(
            a.id,
            convo_service::dto::CreateGroupRequest {
                name: Some("Trio".into()),
                description: None,
                member_ids: vec![b.id, c.id],
            },
        )
        .await
        .unwrap();

    let mut last = engine.unread(group.id, &b).await.unwrap();
    for (i, sender) in [&a, &c, &b, &a, &b, &c].into_iter().enumerate() {
        engine.send(group.id, sender, &format!("message {i}")).await.unwrap();
        let now = engine.unread(group.id, &b).await.unwrap();
        if sender.id == b.id {
            assert_eq!(now, last, "own message changed unread");
        } else {
            assert!(now >= last, "unread dropped after an insert");
        }
        last = now;

        if i == 2 {
            ReadStateService::new(&engine.ctx).mark_read(group.id, b.id).await.unwrap();
            let after = engine.unread(group.id, &b).await.unwrap();
            assert!(after <= last);
            assert_eq!(after, 0);
            last = after;
        }
    }
    assert!(last >= 1);
}

#[tokio::test(start_paused = true)]
async fn test_rapid_read_marks_write_once() {
    let engine = TestEngine::start().unwrap();
    let (a, b) = (alice(), bob());
    let conversation_id = engine.direct(&a, &b).await.unwrap();
    engine.send(conversation_id, &a, "ping").await.unwrap();
    engine.store.reset_counters();

    let service = ReadStateService::new(&engine.ctx);
    let (first, second) = tokio::join!(
        service.mark_read_debounced(conversation_id, b.id),
        service.mark_read_debounced(conversation_id, b.id),
    );

    assert!(first.unwrap_err().is_superseded());
    assert!(second.is_ok());
    assert_eq!(engine.store.write_count(Table::ConversationMembers), 1);
}

#[tokio::test(start_paused = true)]
async fn test_soft_delete_keeps_row_and_children() {
    let engine = TestEngine::start().unwrap();
    let (a, b) = (alice(), bob());
    let conversation_id = engine.direct(&a, &b).await.unwrap();
    let messages = MessageService::new(&engine.ctx);

    let upload = messages
        .upload_attachment(UploadRequest::new(conversation_id, a.id, "a.png", "image/png", png_bytes(64)))
        .await
        .unwrap();
    messages
        .add_reaction(ReactionRequest::new(upload.message_id, b.id, "👍"))
        .await
        .unwrap();

    messages.delete_message(upload.message_id, a.id).await.unwrap();

    let row = engine.store.message(upload.message_id).unwrap();
    assert!(row.is_deleted);
    assert!(row.content.is_none());
    assert_eq!(engine.store.attachments_of(upload.message_id).len(), 1);

    let view = ThreadService::new(&engine.ctx)
        .load_message(upload.message_id, b.id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(view.reactions.len(), 1);
    assert_eq!(view.attachments.len(), 1);

    // Clearing history is what removes children
    messages.clear_history(conversation_id, a.id).await.unwrap();
    assert!(engine.store.attachments_of(upload.message_id).is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_direct_conversation_is_reused() {
    let engine = TestEngine::start().unwrap();
    let (a, b) = (alice(), bob());

    let first = engine.direct(&a, &b).await.unwrap();
    let again = engine.direct(&a, &b).await.unwrap();
    let reverse = engine.direct(&b, &a).await.unwrap();

    assert_eq!(first, again);
    assert_eq!(first, reverse);
    let listed = ConversationService::new(&engine.ctx)
        .load_conversations(a.id)
        .await
        .unwrap();
    assert_eq!(listed.len(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_simultaneous_opens_agree_on_one_conversation() {
    let engine = TestEngine::start().unwrap();
    let (a, c) = (alice(), carol());

    let (from_a, from_c) = tokio::join!(engine.direct(&a, &c), engine.direct(&c, &a));
    let id = from_a.unwrap();
    assert_eq!(from_c.unwrap(), id);

    engine.send(id, &c, "hey").await.unwrap();
    assert_eq!(engine.unread(id, &a).await.unwrap(), 1);
    let listed = ConversationService::new(&engine.ctx)
        .load_conversations(c.id)
        .await
        .unwrap();
    assert_eq!(listed.len(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_thread_is_ordered_by_creation() {
    let engine = TestEngine::start().unwrap();
    let (a, b) = (alice(), bob());
    let conversation_id = engine.direct(&a, &b).await.unwrap();
    for i in 0..20 {
        let sender = if i % 3 == 0 { &b } else { &a };
        engine.send(conversation_id, sender, &format!("#{i}")).await.unwrap();
    }

    let messages = ThreadService::new(&engine.ctx)
        .load_messages(conversation_id, a.id)
        .await
        .unwrap();
    assert_eq!(messages.len(), 20);
    assert!(messages
        .windows(2)
        .all(|pair| pair[0].message.created_at <= pair[1].message.created_at));
    assert_eq!(messages[19].message.content.as_deref(), Some("#19"));
}

#[tokio::test(start_paused = true)]
async fn test_typing_expires_without_refresh() {
    let engine = TestEngine::start().unwrap();
    let (a, b) = (alice(), bob());
    let conversation_id = engine.direct(&a, &b).await.unwrap();
    let typing = TypingService::new(&engine.ctx);

    typing.start_typing(conversation_id, a.id).await.unwrap();
    let listed = typing.list_typing(conversation_id, b.id).await.unwrap();
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].user_id, a.id);

    let timeout = engine.ctx.config().typing.timeout;
    tokio::time::sleep(timeout + Duration::from_millis(10)).await;

    assert!(typing.list_typing(conversation_id, b.id).await.unwrap().is_empty());
    assert!(engine.store.typing_rows(conversation_id).is_empty());
}

// ============================================================================
// Realtime
// ============================================================================

#[tokio::test(start_paused = true)]
async fn test_bound_sessions_follow_the_feed() {
    let engine = TestEngine::start().unwrap();
    let (a, b) = (alice(), bob());
    let conversation_id = engine.direct(&a, &b).await.unwrap();
    let window = engine.ctx.config().sync.reload_coalesce;
    let bridge = RealtimeBridge::from_context(&engine.ctx);

    let list = ConversationListSession::new(engine.ctx.clone(), b.id);
    list.load().await;
    let list_trigger = ReloadTrigger::for_conversation_list(list.clone(), window);
    let _list_binding = bridge.bind_conversation_list(b.id, &list_trigger).unwrap();

    let typing = TypingSession::new(engine.ctx.clone(), conversation_id, b.id);
    let typing_trigger = ReloadTrigger::for_typing(typing.clone(), window);
    let _typing_binding = bridge.bind_typing(conversation_id, &typing_trigger).unwrap();

    TypingService::new(&engine.ctx)
        .start_typing(conversation_id, a.id)
        .await
        .unwrap();
    tokio::time::sleep(window * 2).await;
    assert_eq!(typing.label().as_deref(), Some("Alice is typing…"));

    engine.send(conversation_id, &a, "Hi Bob").await.unwrap();
    tokio::time::sleep(window * 2).await;

    assert_eq!(list.unread_total(), 1);
    assert!(typing.typists().is_empty());
    assert!(typing.label().is_none());
}
