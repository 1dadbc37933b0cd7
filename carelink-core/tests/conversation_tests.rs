// carelink-core/tests/conversation_tests.rs

mod test_utils;

use std::sync::Arc;

use uuid::Uuid;

use carelink_common::models::conversation::Channel;
use carelink_core::services::ConversationService;
use carelink_core::utils::phone::normalize_e164;
use carelink_core::Error;

use test_utils::InMemoryConversationRepo;

#[tokio::test]
async fn repeated_upsert_yields_one_conversation() -> Result<(), Error> {
    let repo = Arc::new(InMemoryConversationRepo::default());
    let service = ConversationService::new(repo.clone());
    let owner = Uuid::new_v4();

    let first = service
        .upsert_conversation(owner, Channel::Whatsapp, "whatsapp:+1 (555) 123-4567", None, None)
        .await?;
    // Same contact, different raw formatting: still the same row.
    let second = service
        .upsert_conversation(owner, Channel::Whatsapp, "+15551234567", Some("Pat"), None)
        .await?;

    assert_eq!(first.conversation_id, second.conversation_id);
    assert_eq!(second.contact_phone, "+15551234567");
    assert_eq!(second.contact_display_name.as_deref(), Some("Pat"));
    assert_eq!(repo.storage.lock().unwrap().len(), 1);
    Ok(())
}

#[tokio::test]
async fn same_contact_on_another_channel_is_a_new_conversation() -> Result<(), Error> {
    let repo = Arc::new(InMemoryConversationRepo::default());
    let service = ConversationService::new(repo.clone());
    let owner = Uuid::new_v4();

    service
        .upsert_conversation(owner, Channel::Whatsapp, "+15551234567", None, None)
        .await?;
    service
        .upsert_conversation(owner, Channel::Sms, "+15551234567", None, None)
        .await?;

    assert_eq!(repo.storage.lock().unwrap().len(), 2);
    Ok(())
}

#[tokio::test]
async fn malformed_phone_is_rejected_before_any_write() {
    let repo = Arc::new(InMemoryConversationRepo::default());
    let service = ConversationService::new(repo.clone());

    let res = service
        .upsert_conversation(Uuid::new_v4(), Channel::Whatsapp, "not a phone", None, None)
        .await;
    assert!(matches!(res, Err(Error::InvalidPhoneFormat(_))));
    assert!(repo.storage.lock().unwrap().is_empty());
}

#[tokio::test]
async fn mark_read_resets_unread_and_stamps_timestamp() -> Result<(), Error> {
    let repo = Arc::new(InMemoryConversationRepo::default());
    let service = ConversationService::new(repo.clone());
    let owner = Uuid::new_v4();

    let convo = service
        .upsert_conversation(owner, Channel::Whatsapp, "+15551234567", None, None)
        .await?;
    {
        let mut map = repo.storage.lock().unwrap();
        map.get_mut(&convo.conversation_id).unwrap().unread_count = 7;
    }

    service.mark_read(convo.conversation_id).await?;

    let stored = service.get(convo.conversation_id).await?.unwrap();
    assert_eq!(stored.unread_count, 0);
    assert!(stored.last_read_at.is_some());
    Ok(())
}

#[test]
fn normalization_round_trip_matches_contract() {
    assert_eq!(
        normalize_e164("whatsapp:+1 (555) 123-4567").unwrap(),
        "+15551234567"
    );
    assert!(matches!(
        normalize_e164("whatsapp:++"),
        Err(Error::InvalidPhoneFormat(_))
    ));
}
