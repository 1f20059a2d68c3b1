use super::*;
use chrono::Duration;

fn store() -> SqliteStore {
    SqliteStore::open_in_memory().unwrap()
}

fn conversation_at(hours_ago: i64) -> Conversation {
    let mut conversation = Conversation::new("gpt-4o");
    conversation.created_at = Utc::now() - Duration::hours(hours_ago);
    conversation.updated_at = conversation.created_at;
    conversation
}

#[test]
fn test_create_and_get_conversation() {
    let store = store();
    let mut conversation = Conversation::new("gpt-4o");
    conversation.title = "Rust questions".into();

    let id = store.create_conversation(&conversation).unwrap();
    assert_eq!(id, conversation.id);

    let loaded = store.get_conversation(&id).unwrap().unwrap();
    assert_eq!(loaded.title, "Rust questions");
    assert_eq!(loaded.model_id, "gpt-4o");
    assert!(!loaded.is_pinned);
    assert_eq!(
        format_timestamp(&loaded.created_at),
        format_timestamp(&conversation.created_at)
    );
}

#[test]
fn test_create_is_idempotent() {
    let store = store();
    let conversation = Conversation::new("gpt-4o");
    store.create_conversation(&conversation).unwrap();
    store.create_conversation(&conversation).unwrap();
    assert_eq!(store.list_recent(10).unwrap().len(), 1);
}

#[test]
fn test_missing_conversation_is_none() {
    assert!(store()
        .get_conversation(&ConversationId::new())
        .unwrap()
        .is_none());
}

#[test]
fn test_messages_in_creation_order() {
    let store = store();
    let conversation = Conversation::new("gpt-4o");
    store.create_conversation(&conversation).unwrap();

    let first = Message::user(conversation.id, "Hello", "gpt-4o");
    let mut second = Message::new(conversation.id, MessageRole::Assistant, "Hi there", "gpt-4o");
    second.created_at = first.created_at + Duration::milliseconds(5);

    store.add_message(&second).unwrap();
    store.add_message(&first).unwrap();

    let messages = store.get_messages(&conversation.id).unwrap();
    let contents: Vec<_> = messages.iter().map(|m| m.content.as_str()).collect();
    assert_eq!(contents, vec!["Hello", "Hi there"]);
    assert_eq!(messages[1].role, MessageRole::Assistant);
    assert!(messages.iter().all(|m| !m.is_streaming && m.error.is_none()));
}

#[test]
fn test_add_message_upserts_by_id() {
    let store = store();
    let conversation = Conversation::new("gpt-4o");
    store.create_conversation(&conversation).unwrap();

    let message = Message::new(conversation.id, MessageRole::Assistant, "partial", "gpt-4o");
    store.add_message(&message).unwrap();
    store.add_message(&message.with_appended(" and final")).unwrap();

    let messages = store.get_messages(&conversation.id).unwrap();
    assert_eq!(messages.len(), 1);
    assert_eq!(messages[0].content, "partial and final");
}

#[test]
fn test_add_message_bumps_updated_at() {
    let store = store();
    let conversation = conversation_at(5);
    store.create_conversation(&conversation).unwrap();

    store
        .add_message(&Message::user(conversation.id, "ping", "gpt-4o"))
        .unwrap();

    let loaded = store.get_conversation(&conversation.id).unwrap().unwrap();
    assert!(loaded.updated_at > conversation.updated_at);
    assert_eq!(
        format_timestamp(&loaded.created_at),
        format_timestamp(&conversation.created_at)
    );
}

#[test]
fn test_message_for_unknown_conversation_fails() {
    let store = store();
    let orphan = Message::user(ConversationId::new(), "hello?", "gpt-4o");
    let err = store.add_message(&orphan).unwrap_err();
    assert!(format!("{:#}", err).contains("Failed to save message"));
}

#[test]
fn test_list_recent_pinned_first_then_updated_desc() {
    let store = store();
    let a = conversation_at(3);
    let b = conversation_at(2);
    let c = conversation_at(1);
    for conversation in [&a, &b, &c] {
        store.create_conversation(conversation).unwrap();
    }

    // A becomes the most recently active, C is pinned
    store.add_message(&Message::user(a.id, "bump", "gpt-4o")).unwrap();
    store.update_pin(&c.id, true).unwrap();

    let ids: Vec<_> = store.list_recent(10).unwrap().iter().map(|c| c.id).collect();
    assert_eq!(ids, vec![c.id, a.id, b.id]);

    let limited = store.list_recent(2).unwrap();
    assert_eq!(limited.len(), 2);
    assert!(limited[0].is_pinned);
}

#[test]
fn test_delete_cascades_to_messages() {
    let store = store();
    let conversation = Conversation::new("gpt-4o");
    store.create_conversation(&conversation).unwrap();
    store
        .add_message(&Message::user(conversation.id, "bye", "gpt-4o"))
        .unwrap();

    assert!(store.delete_conversation(&conversation.id).unwrap());
    assert!(store.get_conversation(&conversation.id).unwrap().is_none());
    assert!(store.get_messages(&conversation.id).unwrap().is_empty());
    assert!(!store.delete_conversation(&conversation.id).unwrap());
}

#[test]
fn test_update_title() {
    let store = store();
    let conversation = Conversation::new("gpt-4o");
    store.create_conversation(&conversation).unwrap();
    store.update_title(&conversation.id, "Renamed").unwrap();
    assert_eq!(
        store.get_conversation(&conversation.id).unwrap().unwrap().title,
        "Renamed"
    );
}

#[test]
fn test_search_title_and_content_case_insensitive() {
    let store = store();
    let mut titled = conversation_at(2);
    titled.title = "Borrow Checker woes".into();
    let by_content = conversation_at(1);
    let unrelated = conversation_at(0);
    for conversation in [&titled, &by_content, &unrelated] {
        store.create_conversation(conversation).unwrap();
    }
    store
        .add_message(&Message::user(by_content.id, "why does the borrow checker hate me", "m"))
        .unwrap();

    let ids: Vec<_> = store
        .search_conversations("BORROW", 10)
        .unwrap()
        .iter()
        .map(|c| c.id)
        .collect();
    assert_eq!(ids, vec![by_content.id, titled.id]);
}

#[test]
fn test_search_treats_wildcards_literally() {
    let store = store();
    let conversation = Conversation::new("m");
    store.create_conversation(&conversation).unwrap();
    store
        .add_message(&Message::user(conversation.id, "plain text", "m"))
        .unwrap();

    assert!(store.search_conversations("%", 10).unwrap().is_empty());
    assert!(store.search_conversations("_", 10).unwrap().is_empty());
    assert!(store
        .search_conversations("\"quoted\" (parens)", 10)
        .unwrap()
        .is_empty());
    assert_eq!(store.search_conversations("  ", 10).unwrap().len(), 1);
}

#[test]
fn test_on_disk_database_persists() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("db").join("conversations.sqlite");
    let conversation = Conversation::new("gpt-4o");

    {
        let store = SqliteStore::open(&path).unwrap();
        store.create_conversation(&conversation).unwrap();
        store
            .add_message(&Message::user(conversation.id, "remember me", "gpt-4o"))
            .unwrap();
    }

    let reopened = SqliteStore::open(&path).unwrap();
    let messages = reopened.get_messages(&conversation.id).unwrap();
    assert_eq!(messages.len(), 1);
    assert_eq!(messages[0].content, "remember me");
}

#[test]
fn test_timestamps_are_fixed_width() {
    let a = format_timestamp(&Utc::now());
    let b = format_timestamp(&(Utc::now() + Duration::days(400)));
    assert_eq!(a.len(), b.len());
    assert!(a.ends_with('Z'));
}
