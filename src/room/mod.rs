//! Room coordination: one serialized command loop per room.
//!
//! A room task is the single owner of its member set. Commands arrive on an
//! unbounded queue and are applied strictly in order, so a join can never
//! interleave with a shuffle and every broadcast reflects a fully-applied
//! mutation. Rooms never share anything with each other.

pub mod hub;
pub mod protocol;
pub mod session;
pub mod shuffle;

use std::collections::HashMap;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::time::timeout;

use self::hub::HubEvent;
use self::protocol::{RoomSnapshot, ShuffleOutcome};
use self::session::{Session, SessionId};
use self::shuffle::Entry;

/// How long a room with no members waits for a first arrival before closing
/// itself. Covers the gap between the room page creating the room and the
/// creator's socket showing up, without leaking abandoned rooms.
const EMPTY_ROOM_GRACE: Duration = Duration::from_secs(300);

#[derive(Debug)]
pub enum RoomCommand {
    Join(Session),
    Leave(SessionId),
    SetValue {
        session: SessionId,
        value: String,
        group: String,
    },
    RequestShuffle,
}

/// Cheap handle for enqueueing commands onto a room's loop.
#[derive(Debug, Clone)]
pub struct RoomHandle {
    tx: mpsc::UnboundedSender<RoomCommand>,
}

impl RoomHandle {
    /// Fire-and-forget: the result of a submission arrives as a state
    /// broadcast, not a return value.
    pub fn set_value(&self, session: SessionId, value: String, group: String) {
        let _ = self.tx.send(RoomCommand::SetValue {
            session,
            value,
            group,
        });
    }

    pub fn request_shuffle(&self) {
        let _ = self.tx.send(RoomCommand::RequestShuffle);
    }

    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }

    pub(crate) fn send(
        &self,
        command: RoomCommand,
    ) -> Result<(), mpsc::error::SendError<RoomCommand>> {
        self.tx.send(command)
    }
}

/// Spawn a room task. The room reports back on `hub` when it closes.
pub(crate) fn spawn(token: String, hub: mpsc::UnboundedSender<HubEvent>) -> RoomHandle {
    let (tx, rx) = mpsc::unbounded_channel();
    let room = Room {
        token,
        members: HashMap::new(),
        hub,
    };
    tokio::spawn(room.run(rx));
    RoomHandle { tx }
}

struct Room {
    token: String,
    members: HashMap<SessionId, Session>,
    hub: mpsc::UnboundedSender<HubEvent>,
}

impl Room {
    async fn run(mut self, mut rx: mpsc::UnboundedReceiver<RoomCommand>) {
        loop {
            let command = if self.members.is_empty() {
                match timeout(EMPTY_ROOM_GRACE, rx.recv()).await {
                    Ok(Some(command)) => command,
                    Ok(None) => break,
                    Err(_) => {
                        tracing::debug!(token = %self.token, "empty room expired");
                        break;
                    }
                }
            } else {
                match rx.recv().await {
                    Some(command) => command,
                    None => break,
                }
            };

            match command {
                RoomCommand::Join(session) => {
                    tracing::info!(token = %self.token, name = %session.name(), "participant joined");
                    self.members.insert(session.id(), session);
                    self.broadcast_state();
                }
                RoomCommand::Leave(id) => match self.members.remove(&id) {
                    Some(session) => {
                        tracing::info!(token = %self.token, name = %session.name(), "participant left");
                        if self.members.is_empty() {
                            break;
                        }
                        self.broadcast_state();
                    }
                    None => {
                        tracing::debug!(token = %self.token, session = %id, "leave for unknown session");
                    }
                },
                RoomCommand::SetValue {
                    session,
                    value,
                    group,
                } => match self.members.get_mut(&session) {
                    Some(member) => {
                        member.set_submission(value, group);
                        self.broadcast_state();
                    }
                    None => {
                        tracing::warn!(token = %self.token, session = %session, "submission from non-member dropped");
                    }
                },
                RoomCommand::RequestShuffle => self.run_shuffle(),
            }
        }

        // Anything that raced in behind the teardown is refused. Dropping a
        // queued Join closes that participant's feeds, which ends its
        // connection; the registry rejects registrations against a closed
        // handle from here on.
        rx.close();
        while let Ok(command) = rx.try_recv() {
            tracing::debug!(token = %self.token, ?command, "dropping command queued behind teardown");
        }
        let _ = self.hub.send(HubEvent::RoomClosed {
            token: self.token.clone(),
        });
        tracing::info!(token = %self.token, "room closed");
    }

    fn snapshot(&self) -> RoomSnapshot {
        let participants: Vec<_> = self
            .members
            .values()
            .map(Session::participant_state)
            .collect();
        let all_ready = !self.members.is_empty() && self.members.values().all(Session::ready);
        RoomSnapshot {
            participants,
            all_ready,
        }
    }

    fn broadcast_state(&self) {
        let snapshot = self.snapshot();
        for member in self.members.values() {
            member.push_state(snapshot.clone());
        }
    }

    fn broadcast_outcome(&self, outcome: ShuffleOutcome) {
        for member in self.members.values() {
            member.push_outcome(outcome.clone());
        }
    }

    /// Run one shuffle round over the current member set. Each member's draw
    /// goes only to that member; a failed round delivers an explicit failure
    /// to everyone and changes nothing.
    fn run_shuffle(&self) {
        if !self.snapshot().all_ready {
            tracing::info!(token = %self.token, "shuffle refused, not every participant is ready");
            self.broadcast_outcome(ShuffleOutcome::Failed);
            return;
        }

        let entries: Vec<Entry> = self
            .members
            .values()
            .map(|member| Entry {
                id: member.id(),
                value: member.value().to_owned(),
                group: member.group().to_owned(),
            })
            .collect();

        match shuffle::assign(&entries, &mut rand::thread_rng()) {
            Some(assignments) => {
                tracing::info!(token = %self.token, members = entries.len(), "shuffle complete");
                for (id, value) in assignments {
                    if let Some(member) = self.members.get(&id) {
                        member.push_outcome(ShuffleOutcome::Assigned(value));
                    }
                }
            }
            None => {
                tracing::info!(token = %self.token, "shuffle found no valid draw");
                self.broadcast_outcome(ShuffleOutcome::Failed);
            }
        }
    }
}
