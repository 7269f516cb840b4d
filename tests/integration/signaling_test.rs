// WebRTC signaling relayed between matched guests.

use crate::common::{paired, test_state, TestClient};
use anonchat_relay::models::{
    call::{CallPhase, Direction},
    events::{CallType, ClientEvent, ServerEvent, SignalFrame},
};
use serde_json::json;

#[tokio::test]
async fn test_offer_answer_and_candidates_reach_partner() {
    let state = test_state();
    let mut alice = TestClient::connect(&state, "Alice").await;
    let mut bob = TestClient::connect(&state, "Bob").await;
    paired(&state, &mut alice, &mut bob).await;

    let offer = json!({"type": "offer", "sdp": "v=0 alice"});
    alice
        .send(
            &state,
            ClientEvent::Offer {
                offer: offer.clone(),
                call_type: CallType::Audio,
            },
        )
        .await;
    assert_eq!(
        bob.drain(),
        vec![ServerEvent::Offer {
            offer,
            call_type: CallType::Audio,
            from: alice.guest.id,
            from_username: "Alice".to_string(),
        }]
    );

    let answer = json!({"type": "answer", "sdp": "v=0 bob"});
    bob.send(&state, ClientEvent::Answer { answer: answer.clone() }).await;
    let candidate = json!({"candidate": "candidate:1 1 udp 1 10.0.0.1 5000 typ host"});
    bob.send(&state, ClientEvent::IceCandidate { candidate: candidate.clone() }).await;

    assert_eq!(
        alice.drain(),
        vec![
            ServerEvent::Answer {
                answer,
                from: bob.guest.id,
                from_username: "Bob".to_string(),
            },
            ServerEvent::IceCandidate {
                candidate,
                from: bob.guest.id,
                from_username: "Bob".to_string(),
            },
        ]
    );
    assert!(bob.drain().is_empty());
}

#[tokio::test]
async fn test_call_phases_follow_relayed_frames() {
    let state = test_state();
    let mut alice = TestClient::connect(&state, "Alice").await;
    let mut bob = TestClient::connect(&state, "Bob").await;
    paired(&state, &mut alice, &mut bob).await;

    let mut caller = CallPhase::Idle;
    let mut callee = CallPhase::Idle;

    let offer = SignalFrame::Offer {
        offer: json!({"sdp": "x"}),
        call_type: CallType::Video,
    };
    alice
        .send(
            &state,
            ClientEvent::Offer {
                offer: json!({"sdp": "x"}),
                call_type: CallType::Video,
            },
        )
        .await;
    caller = caller.next(&offer, Direction::Sent);
    assert!(matches!(bob.drain()[0], ServerEvent::Offer { .. }));
    callee = callee.next(&offer, Direction::Received);
    assert_eq!(caller, CallPhase::Calling);
    assert_eq!(callee, CallPhase::Ringing);
    assert!(caller.awaiting_answer());

    bob.send(&state, ClientEvent::CallReject).await;
    assert!(matches!(alice.drain()[0], ServerEvent::CallReject { .. }));
    caller = caller.next(&SignalFrame::CallReject, Direction::Received);
    callee = callee.next(&SignalFrame::CallReject, Direction::Sent);
    assert_eq!(caller, CallPhase::Idle);
    assert_eq!(callee, CallPhase::Idle);
}

#[tokio::test]
async fn test_signaling_requires_a_partner() {
    let state = test_state();
    let mut alice = TestClient::connect(&state, "Alice").await;
    alice.drain();

    alice.send(&state, ClientEvent::CallEnd).await;
    assert!(matches!(alice.drain()[0], ServerEvent::WebrtcError { .. }));
}

#[tokio::test]
async fn test_signaling_stops_after_partner_leaves() {
    let state = test_state();
    let mut alice = TestClient::connect(&state, "Alice").await;
    let mut bob = TestClient::connect(&state, "Bob").await;
    paired(&state, &mut alice, &mut bob).await;

    bob.send(&state, ClientEvent::LeaveRoom).await;
    alice.drain();
    bob.drain();

    alice.send(&state, ClientEvent::CallTimeout).await;
    assert!(matches!(alice.drain()[0], ServerEvent::WebrtcError { .. }));
    assert!(bob.drain().is_empty());
}
