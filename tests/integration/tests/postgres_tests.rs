//! PostgreSQL integration tests
//!
//! These tests require:
//! - Running PostgreSQL instance
//! - Environment variable: DATABASE_URL
//!
//! Run with: cargo test -p integration-tests --test postgres_tests

use convo_service::{ConversationService, MessageService, ReadStateService, ThreadService};
use convo_service::dto::SendMessageRequest;
use integration_tests::{check_test_env, pg_add_user, pg_engine, test_pool, TestUser};

/// Users that no earlier run has seen
fn fresh_pair() -> (TestUser, TestUser) {
    let base = chrono::Utc::now().timestamp_micros();
    (TestUser::unique(base), TestUser::unique(base))
}

#[tokio::test]
async fn test_direct_conversation_round_trip() {
    if !check_test_env() {
        return;
    }

    let pool = test_pool().await.expect("Failed to connect");
    let ctx = pg_engine(&pool).expect("Failed to build engine");
    let (a, b) = fresh_pair();
    pg_add_user(&pool, &a).await.unwrap();
    pg_add_user(&pool, &b).await.unwrap();

    let conversations = ConversationService::new(&ctx);
    let conversation_id = conversations.open_or_create_direct(a.id, b.id).await.unwrap();
    assert_eq!(
        conversations.open_or_create_direct(b.id, a.id).await.unwrap(),
        conversation_id
    );

    MessageService::new(&ctx)
        .send_message(SendMessageRequest::text(conversation_id, a.id, "Hello"))
        .await
        .unwrap();

    let listed = conversations.load_conversations(b.id).await.unwrap();
    let view = listed.iter().find(|c| c.id() == conversation_id).unwrap();
    assert_eq!(view.unread_count, 1);
    assert_eq!(view.other_user.as_ref().map(|p| p.id), Some(a.id));

    ReadStateService::new(&ctx).mark_read(conversation_id, b.id).await.unwrap();
    let listed = conversations.load_conversations(b.id).await.unwrap();
    let view = listed.iter().find(|c| c.id() == conversation_id).unwrap();
    assert_eq!(view.unread_count, 0);

    let thread = ThreadService::new(&ctx)
        .load_messages(conversation_id, b.id)
        .await
        .unwrap();
    assert_eq!(thread.len(), 1);
    assert_eq!(thread[0].sender.as_ref().map(|p| p.id), Some(a.id));
}

#[tokio::test]
async fn test_edit_and_delete_persist() {
    if !check_test_env() {
        return;
    }

    let pool = test_pool().await.expect("Failed to connect");
    let ctx = pg_engine(&pool).expect("Failed to build engine");
    let (a, b) = fresh_pair();
    pg_add_user(&pool, &a).await.unwrap();
    pg_add_user(&pool, &b).await.unwrap();

    let conversation_id = ConversationService::new(&ctx)
        .open_or_create_direct(a.id, b.id)
        .await
        .unwrap();
    let messages = MessageService::new(&ctx);
    let sent = messages
        .send_message(SendMessageRequest::text(conversation_id, a.id, "Hello"))
        .await
        .unwrap();

    let edited = messages.edit_message(sent.id, a.id, "Hello!").await.unwrap();
    assert!(edited.is_edited);

    messages.delete_message(sent.id, a.id).await.unwrap();
    let view = ThreadService::new(&ctx)
        .load_message(sent.id, b.id)
        .await
        .unwrap()
        .unwrap();
    assert!(view.message.is_deleted);
    assert!(view.message.content.is_none());
}
