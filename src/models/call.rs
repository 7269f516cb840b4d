use std::time::Duration;

use crate::models::events::SignalFrame;

/// How long a caller waits for an answer before sending `webrtc:call-timeout`.
pub const DEFAULT_CALL_TIMEOUT: Duration = Duration::from_secs(30);

/// Per-peer call state. Each side tracks its own; the server keeps none.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum CallPhase {
    #[default]
    Idle,
    Calling,
    Ringing,
    Connecting,
    Connected,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Sent,
    Received,
}

impl CallPhase {
    pub fn next(self, frame: &SignalFrame, direction: Direction) -> CallPhase {
        use CallPhase::*;

        match (self, frame, direction) {
            (_, SignalFrame::CallEnd | SignalFrame::CallReject | SignalFrame::CallTimeout, _) => {
                Idle
            }
            (Idle, SignalFrame::Offer { .. }, Direction::Sent) => Calling,
            (Idle, SignalFrame::Offer { .. }, Direction::Received) => Ringing,
            (Ringing, SignalFrame::Answer { .. }, Direction::Sent) => Connecting,
            (Calling, SignalFrame::Answer { .. }, Direction::Received) => Connecting,
            // renegotiation offers and ICE trickle leave the phase alone
            (phase, _, _) => phase,
        }
    }

    /// The media path came up.
    pub fn media_connected(self) -> CallPhase {
        match self {
            CallPhase::Connecting => CallPhase::Connected,
            other => other,
        }
    }

    /// Whether a caller in this phase should still be counting down to a timeout.
    pub fn awaiting_answer(self) -> bool {
        self == CallPhase::Calling
    }
}
