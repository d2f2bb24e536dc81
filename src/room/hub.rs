//! Registry of rooms: token lookup, creation, and teardown bookkeeping.
//!
//! The token map is shared for lock-free existence checks, but every
//! mutation runs on a single intake task, so creating and dropping rooms
//! never races with itself, even though each room drains its own command
//! queue independently.

use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::{mpsc, oneshot};

use super::session::{Session, SessionId};
use super::{RoomCommand, RoomHandle};

#[derive(thiserror::Error, Debug)]
pub enum HubError {
    #[error("room not found")]
    RoomNotFound,
    #[error("room registry unavailable")]
    Unavailable,
}

#[derive(Debug)]
pub enum HubEvent {
    CreateOrGet {
        token: String,
        reply: oneshot::Sender<RoomHandle>,
    },
    Register {
        token: String,
        session: Session,
        reply: oneshot::Sender<Result<RoomHandle, HubError>>,
    },
    Unregister {
        token: String,
        session: SessionId,
    },
    RoomClosed {
        token: String,
    },
}

/// Cloneable handle onto the registry.
#[derive(Clone)]
pub struct HubHandle {
    rooms: Arc<DashMap<String, RoomHandle>>,
    events: mpsc::UnboundedSender<HubEvent>,
}

/// Start the registry task and hand back its handle.
pub fn spawn() -> HubHandle {
    let rooms: Arc<DashMap<String, RoomHandle>> = Arc::new(DashMap::new());
    let (events, rx) = mpsc::unbounded_channel();
    tokio::spawn(run(rooms.clone(), events.clone(), rx));
    HubHandle { rooms, events }
}

impl HubHandle {
    /// Whether a live room exists under `token`.
    pub fn room_exists(&self, token: &str) -> bool {
        self.rooms
            .get(token)
            .map(|room| !room.is_closed())
            .unwrap_or(false)
    }

    /// Return the room under `token`, creating it if absent.
    pub async fn create_or_get(&self, token: &str) -> Result<RoomHandle, HubError> {
        let (reply, rx) = oneshot::channel();
        self.events
            .send(HubEvent::CreateOrGet {
                token: token.to_owned(),
                reply,
            })
            .map_err(|_| HubError::Unavailable)?;
        rx.await.map_err(|_| HubError::Unavailable)
    }

    /// Hand a session to the room under `token`. The room broadcasts the new
    /// membership to everyone; the returned handle is for forwarding this
    /// participant's commands. Rooms are never created here: a socket
    /// aimed at an unknown or already-closed token is rejected.
    pub async fn register(&self, token: &str, session: Session) -> Result<RoomHandle, HubError> {
        let (reply, rx) = oneshot::channel();
        self.events
            .send(HubEvent::Register {
                token: token.to_owned(),
                session,
                reply,
            })
            .map_err(|_| HubError::Unavailable)?;
        rx.await.map_err(|_| HubError::Unavailable)?
    }

    /// Forward a disconnect to the owning room. Idempotent: a second
    /// unregister for the same session finds nothing to remove.
    pub fn unregister(&self, token: &str, session: SessionId) {
        let _ = self.events.send(HubEvent::Unregister {
            token: token.to_owned(),
            session,
        });
    }
}

async fn run(
    rooms: Arc<DashMap<String, RoomHandle>>,
    hub_tx: mpsc::UnboundedSender<HubEvent>,
    mut rx: mpsc::UnboundedReceiver<HubEvent>,
) {
    while let Some(event) = rx.recv().await {
        match event {
            HubEvent::CreateOrGet { token, reply } => {
                let _ = reply.send(ensure_room(&rooms, &hub_tx, &token));
            }
            HubEvent::Register {
                token,
                session,
                reply,
            } => {
                let existing = rooms.get(&token).map(|room| room.value().clone());
                let result = match existing {
                    Some(room) if !room.is_closed() => {
                        match room.send(RoomCommand::Join(session)) {
                            Ok(()) => Ok(room),
                            Err(_) => {
                                rooms.remove(&token);
                                Err(HubError::RoomNotFound)
                            }
                        }
                    }
                    Some(_) => {
                        rooms.remove(&token);
                        Err(HubError::RoomNotFound)
                    }
                    None => Err(HubError::RoomNotFound),
                };
                let _ = reply.send(result);
            }
            HubEvent::Unregister { token, session } => {
                if let Some(room) = rooms.get(&token).map(|room| room.value().clone()) {
                    let _ = room.send(RoomCommand::Leave(session));
                }
            }
            HubEvent::RoomClosed { token } => {
                // Only drop the entry if it still points at the closed room;
                // a replacement under the same token stays untouched.
                let stale = rooms
                    .get(&token)
                    .map(|room| room.is_closed())
                    .unwrap_or(false);
                if stale {
                    rooms.remove(&token);
                    tracing::debug!(%token, "room dropped from registry");
                }
            }
        }
    }
}

fn ensure_room(
    rooms: &DashMap<String, RoomHandle>,
    hub_tx: &mpsc::UnboundedSender<HubEvent>,
    token: &str,
) -> RoomHandle {
    if let Some(room) = rooms.get(token) {
        if !room.is_closed() {
            return room.value().clone();
        }
    }
    let handle = super::spawn(token.to_owned(), hub_tx.clone());
    rooms.insert(token.to_owned(), handle.clone());
    tracing::info!(%token, "room opened");
    handle
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use tokio::time::{sleep, timeout};

    use super::*;

    const TICK: Duration = Duration::from_secs(1);

    #[tokio::test]
    async fn create_or_get_is_idempotent() {
        let hub = spawn();
        assert!(!hub.room_exists("ABCD"));

        let first = hub.create_or_get("ABCD").await.unwrap();
        assert!(hub.room_exists("ABCD"));
        let second = hub.create_or_get("ABCD").await.unwrap();

        // Same underlying room: a session joined through one handle is seen
        // by a session joined through the other.
        let (alice, mut alice_feeds) = Session::connect("alice");
        first.send(RoomCommand::Join(alice)).unwrap();
        let (bob, mut bob_feeds) = Session::connect("bob");
        second.send(RoomCommand::Join(bob)).unwrap();

        let snapshot = timeout(TICK, bob_feeds.state_rx.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(snapshot.participants.len(), 2);
        let _ = alice_feeds.state_rx.recv().await;
    }

    #[tokio::test]
    async fn register_against_unknown_token_is_rejected() {
        let hub = spawn();
        let (session, _feeds) = Session::connect("alice");
        match hub.register("NOPE", session).await {
            Err(HubError::RoomNotFound) => {}
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[tokio::test]
    async fn last_unregister_drops_the_room_from_the_registry() {
        let hub = spawn();
        hub.create_or_get("ABCD").await.unwrap();

        let (session, mut feeds) = Session::connect("alice");
        let session_id = session.id();
        hub.register("ABCD", session).await.unwrap();
        let snapshot = timeout(TICK, feeds.state_rx.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(snapshot.participants.len(), 1);

        hub.unregister("ABCD", session_id);

        let mut dropped = false;
        for _ in 0..100 {
            if !hub.room_exists("ABCD") {
                dropped = true;
                break;
            }
            sleep(Duration::from_millis(10)).await;
        }
        assert!(dropped, "registry kept an empty room");
    }

    #[tokio::test]
    async fn register_after_close_is_rejected() {
        let hub = spawn();
        hub.create_or_get("ABCD").await.unwrap();

        let (alice, _alice_feeds) = Session::connect("alice");
        let alice_id = alice.id();
        hub.register("ABCD", alice).await.unwrap();
        hub.unregister("ABCD", alice_id);

        for _ in 0..100 {
            if !hub.room_exists("ABCD") {
                break;
            }
            sleep(Duration::from_millis(10)).await;
        }

        let (bob, _bob_feeds) = Session::connect("bob");
        match hub.register("ABCD", bob).await {
            Err(HubError::RoomNotFound) => {}
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[tokio::test]
    async fn unregister_for_unknown_room_is_ignored() {
        let hub = spawn();
        let (session, _feeds) = Session::connect("alice");
        hub.unregister("NOPE", session.id());
        // Registry still answers.
        assert!(!hub.room_exists("NOPE"));
    }
}
