// carelink-core/tests/message_ledger_tests.rs

mod test_utils;

use std::sync::Arc;

use uuid::Uuid;

use carelink_common::models::conversation::Channel;
use carelink_common::models::message::{
    Attachment, AttachmentKind, MessageBody, MessageStatus, DELETED_PLACEHOLDER,
    MAX_ATTACHMENT_BYTES,
};
use carelink_common::traits::repository_traits::{ConversationRepository, MessageRepository};
use carelink_core::services::message_service::{assert_attachments_valid, MessageService};
use carelink_core::Error;

use test_utils::{InMemoryConversationRepo, InMemoryMessageRepo, StubWhatsAppClient};

struct Harness {
    conversations: Arc<InMemoryConversationRepo>,
    messages: Arc<InMemoryMessageRepo>,
    service: MessageService,
    conversation_id: Uuid,
}

async fn harness(client: StubWhatsAppClient) -> Harness {
    let conversations = Arc::new(InMemoryConversationRepo::default());
    let messages = Arc::new(InMemoryMessageRepo::default());
    let service = MessageService::new(
        messages.clone(),
        conversations.clone(),
        Arc::new(client),
    );

    let conversation = conversations
        .upsert(
            Uuid::new_v4(),
            Channel::Whatsapp,
            "+15551234567",
            Some("Pat Doe"),
            Some("+15550001111"),
        )
        .await
        .unwrap();

    Harness {
        conversations,
        messages,
        service,
        conversation_id: conversation.conversation_id,
    }
}

fn image_attachment(size_bytes: i64) -> Attachment {
    Attachment {
        kind: AttachmentKind::Image,
        url: Some("https://media.example/item".to_string()),
        content_type: Some("image/jpeg".to_string()),
        size_bytes,
        duration_seconds: None,
        width: Some(640),
        height: Some(480),
    }
}

#[tokio::test]
async fn inbound_insert_is_idempotent_on_provider_id() -> Result<(), Error> {
    let h = harness(StubWhatsAppClient::accepting()).await;

    let first = h
        .service
        .insert_inbound(
            h.conversation_id,
            Some("SM111"),
            "+15551234567",
            Some("hello".to_string()),
            vec![],
        )
        .await?;
    let second = h
        .service
        .insert_inbound(
            h.conversation_id,
            Some("SM111"),
            "+15551234567",
            Some("hello".to_string()),
            vec![],
        )
        .await?;

    assert_eq!(first, second);
    assert_eq!(h.messages.storage.lock().unwrap().len(), 1);

    // Exactly one unread increment despite the redelivery.
    let convo = h.conversations.get(h.conversation_id).await?.unwrap();
    assert_eq!(convo.unread_count, 1);
    assert_eq!(convo.last_message_preview.as_deref(), Some("hello"));
    Ok(())
}

#[tokio::test]
async fn inbound_without_provider_id_gets_generated_one() -> Result<(), Error> {
    let h = harness(StubWhatsAppClient::accepting()).await;

    let id = h
        .service
        .insert_inbound(h.conversation_id, None, "+15551234567", Some("hi".into()), vec![])
        .await?;

    let stored = h.messages.get(id).await?.unwrap();
    let pid = stored.provider_message_id.unwrap();
    assert!(pid.starts_with("carelink-"));
    Ok(())
}

#[tokio::test]
async fn shuffled_status_callbacks_end_at_read() -> Result<(), Error> {
    let h = harness(StubWhatsAppClient::accepting()).await;
    h.service
        .insert_inbound(h.conversation_id, Some("SM200"), "+15551234567", Some("x".into()), vec![])
        .await?;

    // Duplicated and out of order; the rank check sorts it out.
    for status in ["read", "queued", "delivered", "sent", "delivered", "queued", "read"] {
        h.service.apply_provider_status("SM200", status).await?;
    }

    let stored = h.messages.get_by_provider_id("SM200").await?.unwrap();
    assert_eq!(stored.status, MessageStatus::Read);
    Ok(())
}

#[tokio::test]
async fn undelivered_is_absorbing() -> Result<(), Error> {
    let h = harness(StubWhatsAppClient::accepting()).await;
    h.service
        .insert_inbound(h.conversation_id, Some("SM201"), "+15551234567", Some("x".into()), vec![])
        .await?;

    h.service.apply_provider_status("SM201", "undelivered").await?;
    // Later non-failed callbacks are ignored once failed.
    h.service.apply_provider_status("SM201", "delivered").await?;
    h.service.apply_provider_status("SM201", "read").await?;

    let stored = h.messages.get_by_provider_id("SM201").await?.unwrap();
    assert_eq!(stored.status, MessageStatus::Failed);
    Ok(())
}

#[tokio::test]
async fn unknown_provider_id_is_a_no_op() -> Result<(), Error> {
    let h = harness(StubWhatsAppClient::accepting()).await;
    // Must not error: the callback may race the provider-id backfill.
    h.service.apply_provider_status("SM-unknown", "delivered").await?;
    Ok(())
}

#[tokio::test]
async fn outbound_send_moves_queued_to_sent_and_resets_unread() -> Result<(), Error> {
    let h = harness(StubWhatsAppClient::accepting()).await;

    // Unread messages pile up first.
    h.service
        .insert_inbound(h.conversation_id, Some("SM300"), "+15551234567", Some("q?".into()), vec![])
        .await?;
    assert_eq!(
        h.conversations.get(h.conversation_id).await?.unwrap().unread_count,
        1
    );

    let message_id = h
        .service
        .send_outbound(
            h.conversation_id,
            Uuid::new_v4(),
            Some("Your appointment is tomorrow".to_string()),
            vec![],
        )
        .await?;

    let stored = h.messages.get(message_id).await?.unwrap();
    assert_eq!(stored.status, MessageStatus::Sent);
    assert!(stored.provider_message_id.is_some());

    let convo = h.conversations.get(h.conversation_id).await?.unwrap();
    assert_eq!(convo.unread_count, 0);
    Ok(())
}

#[tokio::test]
async fn rejected_outbound_send_is_failed() -> Result<(), Error> {
    let h = harness(StubWhatsAppClient::rejecting()).await;

    let res = h
        .service
        .send_outbound(
            h.conversation_id,
            Uuid::new_v4(),
            Some("hello".to_string()),
            vec![],
        )
        .await;
    assert!(matches!(res, Err(Error::Provider { .. })));

    let map = h.messages.storage.lock().unwrap();
    let stored = map.values().next().unwrap();
    assert_eq!(stored.status, MessageStatus::Failed);
    Ok(())
}

#[tokio::test]
async fn empty_outbound_message_is_rejected() {
    let h = harness(StubWhatsAppClient::accepting()).await;
    let res = h
        .service
        .send_outbound(h.conversation_id, Uuid::new_v4(), Some("   ".to_string()), vec![])
        .await;
    assert!(matches!(res, Err(Error::Validation(_))));
}

#[tokio::test]
async fn soft_delete_keeps_row_with_placeholder() -> Result<(), Error> {
    let h = harness(StubWhatsAppClient::accepting()).await;
    let id = h
        .service
        .insert_inbound(
            h.conversation_id,
            Some("SM400"),
            "+15551234567",
            Some("sensitive".to_string()),
            vec![image_attachment(1024)],
        )
        .await?;

    h.service.soft_delete(id).await?;
    // Deleting twice is a no-op.
    h.service.soft_delete(id).await?;

    let stored = h.messages.get(id).await?.unwrap();
    assert!(stored.body.is_deleted());
    assert_eq!(stored.body.display_text(), DELETED_PLACEHOLDER);
    assert!(matches!(stored.body, MessageBody::Deleted { .. }));

    // The row still shows up in history.
    let listed = h.service.list_messages(h.conversation_id, 50).await?;
    assert_eq!(listed.len(), 1);
    Ok(())
}

#[test]
fn attachment_count_over_limit_is_rejected() {
    let attachments: Vec<Attachment> = (0..6).map(|_| image_attachment(1024)).collect();
    assert!(matches!(
        assert_attachments_valid(&attachments),
        Err(Error::Validation(_))
    ));
}

#[test]
fn attachment_over_per_item_cap_is_rejected() {
    let attachments = vec![image_attachment(MAX_ATTACHMENT_BYTES + 1)];
    assert!(matches!(
        assert_attachments_valid(&attachments),
        Err(Error::Validation(_))
    ));
}

#[test]
fn attachments_over_total_cap_are_rejected() {
    // Three items under the per-item cap that together blow the total.
    let attachments = vec![
        image_attachment(MAX_ATTACHMENT_BYTES),
        image_attachment(MAX_ATTACHMENT_BYTES),
        image_attachment(MAX_ATTACHMENT_BYTES),
    ];
    assert!(matches!(
        assert_attachments_valid(&attachments),
        Err(Error::Validation(_))
    ));
}

#[test]
fn disallowed_content_type_is_rejected() {
    let mut attachment = image_attachment(1024);
    attachment.content_type = Some("application/x-msdownload".to_string());
    assert!(matches!(
        assert_attachments_valid(&[attachment]),
        Err(Error::Validation(_))
    ));
}

#[test]
fn unknown_content_type_is_allowed() {
    let mut attachment = image_attachment(1024);
    attachment.content_type = None;
    attachment.kind = AttachmentKind::File;
    assert!(assert_attachments_valid(&[attachment]).is_ok());
}
