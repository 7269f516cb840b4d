// End-to-end guest flow driven through the session gateway.

use crate::common::{paired, test_state, TestClient};
use anonchat_relay::models::{
    events::{ChatKind, ChatMessageIn, ClientEvent, ServerEvent},
    room::RoomId,
};
use serde_json::json;

fn text(content: &str) -> ClientEvent {
    ClientEvent::ChatMessage(ChatMessageIn {
        kind: ChatKind::Text,
        content: json!(content),
        timestamp: None,
    })
}

#[tokio::test]
async fn test_two_guests_meet_chat_and_part() {
    let state = test_state();
    let mut alice = TestClient::connect(&state, "Alice").await;
    let mut bob = TestClient::connect(&state, "Bob").await;

    let established = alice.drain();
    assert!(matches!(
        &established[0],
        ServerEvent::ConnectionEstablished { user_id, .. } if *user_id == alice.guest.id
    ));
    bob.drain();

    alice.send(&state, ClientEvent::Match).await;
    assert_eq!(
        alice.drain(),
        vec![
            ServerEvent::MatchSearching,
            ServerEvent::NoUsers {
                message: "No users available for matching right now".to_string()
            },
        ]
    );

    bob.send(&state, ClientEvent::Match).await;
    let room = RoomId::between(&alice.guest.id, &bob.guest.id);

    let bob_saw = bob.drain();
    assert!(bob_saw.iter().any(|e| matches!(
        e,
        ServerEvent::Matched { matched_user, room_id }
            if matched_user.id == alice.guest.id && *room_id == room
    )));
    let alice_saw = alice.drain();
    assert!(alice_saw.iter().any(|e| matches!(
        e,
        ServerEvent::Matched { matched_user, room_id }
            if matched_user.id == bob.guest.id && *room_id == room
    )));

    alice.send(&state, text("hi")).await;
    let alice_acks = alice.drain();
    let message_id = match &alice_acks[0] {
        ServerEvent::ChatMessageSent { message_id, .. } => *message_id,
        other => panic!("expected sent ack, got {:?}", other),
    };
    assert_eq!(alice_acks[1], ServerEvent::ChatMessageDelivered { message_id });

    let bob_inbox = bob.drain();
    match &bob_inbox[0] {
        ServerEvent::ChatMessage(out) => {
            assert_eq!(out.id, message_id);
            assert_eq!(out.sender_id, alice.guest.id);
            assert_eq!(out.sender_username, "Alice");
            assert_eq!(out.content, json!("hi"));
        }
        other => panic!("expected chat message, got {:?}", other),
    }

    bob.disconnect(&state).await;
    let alice_saw = alice.drain();
    assert!(alice_saw.iter().any(|e| matches!(
        e,
        ServerEvent::RoomClosed { user_id, .. } if *user_id == bob.guest.id
    )));

    let alice_now = state.presence.get(&alice.guest.id).await.unwrap().unwrap();
    assert!(alice_now.connected_user.is_none());
    assert!(alice_now.is_online);

    // back to the pool: with Bob gone nobody is left
    alice.send(&state, ClientEvent::Match).await;
    assert!(matches!(alice.drain()[1], ServerEvent::NoUsers { .. }));
}

#[tokio::test]
async fn test_clear_chat_notifies_both_sides() {
    let state = test_state();
    let mut alice = TestClient::connect(&state, "Alice").await;
    let mut bob = TestClient::connect(&state, "Bob").await;
    paired(&state, &mut alice, &mut bob).await;

    alice.send(&state, ClientEvent::ChatClear).await;

    let bob_saw = bob.drain();
    assert!(matches!(bob_saw[0], ServerEvent::ChatCleared { .. }));
    assert!(bob_saw
        .iter()
        .any(|e| matches!(e, ServerEvent::RoomClosed { .. })));
    assert!(matches!(alice.drain()[0], ServerEvent::ChatCleared { .. }));

    // a second clear finds no room
    alice.send(&state, ClientEvent::ChatClear).await;
    assert!(matches!(alice.drain()[0], ServerEvent::ChatError { .. }));

    let stats = state.presence.stats().await.unwrap();
    assert_eq!(stats.connected_pairs, 0);
}

#[tokio::test]
async fn test_messages_never_leak_to_third_guest() {
    let state = test_state();
    let mut alice = TestClient::connect(&state, "Alice").await;
    let mut bob = TestClient::connect(&state, "Bob").await;
    paired(&state, &mut alice, &mut bob).await;
    let mut carol = TestClient::connect(&state, "Carol").await;
    alice.drain();
    bob.drain();
    carol.drain();

    alice.send(&state, text("just for bob")).await;
    carol.send(&state, text("anyone?")).await;

    assert!(matches!(bob.drain()[0], ServerEvent::ChatMessage(_)));
    assert!(matches!(carol.drain()[0], ServerEvent::ChatError { .. }));
    assert!(alice
        .drain()
        .iter()
        .all(|e| !matches!(e, ServerEvent::ChatMessage(_))));
}

#[tokio::test]
async fn test_oversized_text_is_rejected() {
    let state = test_state();
    let mut alice = TestClient::connect(&state, "Alice").await;
    let mut bob = TestClient::connect(&state, "Bob").await;
    paired(&state, &mut alice, &mut bob).await;

    let too_long = "x".repeat(state.config.chat.max_text_chars + 1);
    alice.send(&state, text(&too_long)).await;

    assert!(matches!(alice.drain()[0], ServerEvent::ChatError { .. }));
    assert!(bob.drain().is_empty());
}
