//! Per-connection participant state and its delivery feeds.

use std::fmt;

use tokio::sync::mpsc;
use ulid::Ulid;

use super::protocol::{ParticipantState, RoomSnapshot, ShuffleOutcome};

/// Buffered deliveries per participant. A consumer lagging past this limit
/// starts losing messages instead of stalling the room's command loop.
const DELIVERY_BUFFER: usize = 32;

/// Identity of one connection for the lifetime of that connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SessionId(Ulid);

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// A connected participant, owned by its room once joined.
///
/// The mutable fields (`value`, `group`, `ready`) are written only from the
/// owning room's command loop.
#[derive(Debug)]
pub struct Session {
    id: SessionId,
    name: String,
    value: String,
    group: String,
    ready: bool,
    state_tx: mpsc::Sender<RoomSnapshot>,
    result_tx: mpsc::Sender<ShuffleOutcome>,
}

/// Receiving halves of a session's feeds, held by the connection's writer.
pub struct SessionFeeds {
    pub state_rx: mpsc::Receiver<RoomSnapshot>,
    pub result_rx: mpsc::Receiver<ShuffleOutcome>,
}

impl Session {
    pub fn connect(name: &str) -> (Self, SessionFeeds) {
        let (state_tx, state_rx) = mpsc::channel(DELIVERY_BUFFER);
        let (result_tx, result_rx) = mpsc::channel(DELIVERY_BUFFER);
        let session = Session {
            id: SessionId(Ulid::new()),
            name: name.to_owned(),
            value: String::new(),
            group: String::new(),
            ready: false,
            state_tx,
            result_tx,
        };
        (session, SessionFeeds { state_rx, result_rx })
    }

    pub fn id(&self) -> SessionId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn value(&self) -> &str {
        &self.value
    }

    pub fn group(&self) -> &str {
        &self.group
    }

    pub fn ready(&self) -> bool {
        self.ready
    }

    /// Record a submission. Re-submitting overwrites the previous value.
    pub(crate) fn set_submission(&mut self, value: String, group: String) {
        self.value = value;
        self.group = group;
        self.ready = true;
    }

    pub(crate) fn participant_state(&self) -> ParticipantState {
        ParticipantState {
            name: self.name.clone(),
            group: self.group.clone(),
            ready: self.ready,
        }
    }

    pub(crate) fn push_state(&self, snapshot: RoomSnapshot) {
        match self.state_tx.try_send(snapshot) {
            Ok(()) => {}
            Err(mpsc::error::TrySendError::Full(_)) => {
                tracing::warn!(session = %self.id, name = %self.name, "state feed full, dropping update");
            }
            // Disconnect in flight; the leave command is on its way.
            Err(mpsc::error::TrySendError::Closed(_)) => {}
        }
    }

    pub(crate) fn push_outcome(&self, outcome: ShuffleOutcome) {
        match self.result_tx.try_send(outcome) {
            Ok(()) => {}
            Err(mpsc::error::TrySendError::Full(_)) => {
                tracing::warn!(session = %self.id, name = %self.name, "result feed full, dropping outcome");
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_session_is_not_ready() {
        let (session, _feeds) = Session::connect("alice");
        assert_eq!(session.name(), "alice");
        assert_eq!(session.value(), "");
        assert_eq!(session.group(), "");
        assert!(!session.ready());
    }

    #[test]
    fn submission_marks_ready_and_overwrites() {
        let (mut session, _feeds) = Session::connect("alice");
        session.set_submission("socks".into(), "red".into());
        assert!(session.ready());
        assert_eq!(session.value(), "socks");
        assert_eq!(session.group(), "red");

        session.set_submission("hat".into(), String::new());
        assert!(session.ready());
        assert_eq!(session.value(), "hat");
        assert_eq!(session.group(), "");
    }

    #[test]
    fn session_ids_are_distinct() {
        let (a, _fa) = Session::connect("alice");
        let (b, _fb) = Session::connect("bob");
        assert_ne!(a.id(), b.id());
    }

    #[tokio::test]
    async fn push_state_never_blocks_on_a_full_feed() {
        let (session, mut feeds) = Session::connect("alice");
        let snapshot = RoomSnapshot {
            participants: vec![],
            all_ready: false,
        };
        // Twice the buffer; the excess is dropped, not awaited.
        for _ in 0..(DELIVERY_BUFFER * 2) {
            session.push_state(snapshot.clone());
        }
        let mut received = 0;
        while feeds.state_rx.try_recv().is_ok() {
            received += 1;
        }
        assert_eq!(received, DELIVERY_BUFFER);
    }

    #[tokio::test]
    async fn push_to_closed_feed_is_ignored() {
        let (session, feeds) = Session::connect("alice");
        drop(feeds);
        session.push_state(RoomSnapshot {
            participants: vec![],
            all_ready: false,
        });
        session.push_outcome(ShuffleOutcome::Failed);
    }
}
