//! Wire messages exchanged with participants, and the feed payloads behind
//! them.

use serde::{Deserialize, Serialize};

/// Inbound command from a participant's socket.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum ClientMessage {
    SubmitValue {
        value: String,
        #[serde(default)]
        group: String,
    },
    RequestShuffle,
}

/// One member as seen in a state broadcast.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ParticipantState {
    pub name: String,
    pub group: String,
    pub ready: bool,
}

/// Aggregate room view pushed to every member after each applied command.
///
/// `all_ready` is true iff the room is non-empty and every member has
/// submitted a value.
#[derive(Debug, Clone, Serialize)]
pub struct RoomSnapshot {
    pub participants: Vec<ParticipantState>,
    pub all_ready: bool,
}

/// Per-participant outcome of a shuffle round, delivered on the result feed.
#[derive(Debug, Clone)]
pub enum ShuffleOutcome {
    /// The value drawn for this participant. Nobody else sees it.
    Assigned(String),
    /// The round found no valid draw; nothing was delivered to anyone.
    Failed,
}

/// Outbound message serialized onto the socket by the connection's writer.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum ServerMessage {
    RoomState {
        participants: Vec<ParticipantState>,
        all_ready: bool,
    },
    ShuffleResult {
        value: String,
    },
    ShuffleFailed,
}

impl From<RoomSnapshot> for ServerMessage {
    fn from(snapshot: RoomSnapshot) -> Self {
        ServerMessage::RoomState {
            participants: snapshot.participants,
            all_ready: snapshot.all_ready,
        }
    }
}

impl From<ShuffleOutcome> for ServerMessage {
    fn from(outcome: ShuffleOutcome) -> Self {
        match outcome {
            ShuffleOutcome::Assigned(value) => ServerMessage::ShuffleResult { value },
            ShuffleOutcome::Failed => ServerMessage::ShuffleFailed,
        }
    }
}
