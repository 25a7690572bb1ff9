// ============================
// crates/backend-lib/src/relay.rs
// ============================
//! Room Relay: in-memory room membership and message fan-out.
//!
//! Each connection owns an unbounded FIFO outbox. Membership lives in a
//! concurrent map keyed by room ID, so `join`, `relay` and `disconnect` on the
//! same room are serialized by that room's shard lock. A reverse index
//! (connection → rooms) lets `disconnect` visit only the rooms it joined.
//!
//! Lock order: a connection entry may be held while a room entry is taken,
//! never the other way round.
use campus_common::{ClientEvent, RoomId, RoomMessage, ServerEvent};
use dashmap::{mapref::entry::Entry, DashMap};
use metrics::{counter, gauge};
use serde_json::Value;
use std::collections::{HashMap, HashSet};
use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};
use thiserror::Error;
use tokio::sync::mpsc;
use uuid::Uuid;

use crate::config::RelaySettings;
use crate::metrics::{RELAY_DELIVERED, RELAY_DROPPED_FRAMES, RELAY_ROOMS};
use crate::validation::validate_room_id;

pub type ConnectionId = Uuid;
pub type Outbox = mpsc::UnboundedSender<ServerEvent>;
pub type Inbox = mpsc::UnboundedReceiver<ServerEvent>;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RelayError {
    #[error("Malformed frame: {0}")]
    Malformed(String),

    #[error("Unknown connection: {0}")]
    UnknownConnection(ConnectionId),

    #[error("Relay is stopped")]
    Stopped,
}

/// What an inbound frame did
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FrameOutcome {
    Joined { room_id: RoomId, newly_joined: bool },
    Relayed { room_id: RoomId, delivered: usize },
}

struct Connection {
    label: String,
    outbox: Outbox,
    rooms: HashSet<RoomId>,
}

struct RelayInner {
    rooms: DashMap<RoomId, HashMap<ConnectionId, Outbox>>,
    connections: DashMap<ConnectionId, Connection>,
    settings: RelaySettings,
    running: AtomicBool,
}

/// Handle to the relay service. Cheap to clone.
#[derive(Clone)]
pub struct RoomRelay {
    inner: Arc<RelayInner>,
}

impl RoomRelay {
    /// Start a relay with no rooms and no connections
    pub fn start(settings: RelaySettings) -> Self {
        tracing::info!(
            echo_to_sender = settings.echo_to_sender,
            evict_empty_rooms = settings.evict_empty_rooms,
            "room relay started"
        );
        Self {
            inner: Arc::new(RelayInner {
                rooms: DashMap::new(),
                connections: DashMap::new(),
                settings,
                running: AtomicBool::new(true),
            }),
        }
    }

    pub fn settings(&self) -> &RelaySettings {
        &self.inner.settings
    }

    pub fn is_running(&self) -> bool {
        self.inner.running.load(Ordering::SeqCst)
    }

    fn ensure_running(&self) -> Result<(), RelayError> {
        if self.is_running() {
            Ok(())
        } else {
            Err(RelayError::Stopped)
        }
    }

    /// Register a new connection in the `Connected` state
    pub fn connect(&self, label: impl Into<String>) -> Result<(ConnectionId, Inbox), RelayError> {
        self.ensure_running()?;

        let id = Uuid::new_v4();
        let (outbox, inbox) = mpsc::unbounded_channel();
        let label = label.into();
        tracing::debug!(connection_id = %id, %label, "relay connection opened");

        self.inner.connections.insert(
            id,
            Connection {
                label,
                outbox,
                rooms: HashSet::new(),
            },
        );

        // A shutdown may have raced the insert
        if !self.is_running() {
            self.inner.connections.remove(&id);
            return Err(RelayError::Stopped);
        }

        Ok((id, inbox))
    }

    /// Add `connection` to `room_id`, creating the room if absent.
    ///
    /// Returns `false` when the connection was already a member.
    pub fn join(&self, connection: ConnectionId, room_id: &str) -> Result<bool, RelayError> {
        self.ensure_running()?;
        let room_id = validate_room_id(room_id).map_err(|e| RelayError::Malformed(e.to_string()))?;

        let mut entry = self
            .inner
            .connections
            .get_mut(&connection)
            .ok_or(RelayError::UnknownConnection(connection))?;

        if !entry.rooms.insert(room_id.to_string()) {
            return Ok(false);
        }

        self.inner
            .rooms
            .entry(room_id.to_string())
            .or_default()
            .insert(connection, entry.outbox.clone());

        tracing::debug!(connection_id = %connection, label = %entry.label, %room_id, "joined room");
        drop(entry);

        gauge!(RELAY_ROOMS).set(self.inner.rooms.len() as f64);
        Ok(true)
    }

    /// Deliver `payload` to every current member of `room_id`.
    ///
    /// The sender need not be a member. A room without members is a no-op.
    /// Returns the number of members the payload was queued for.
    pub fn relay(
        &self,
        sender: ConnectionId,
        room_id: &str,
        payload: Value,
    ) -> Result<usize, RelayError> {
        self.ensure_running()?;
        let room_id = validate_room_id(room_id).map_err(|e| RelayError::Malformed(e.to_string()))?;

        let Some(members) = self.inner.rooms.get(room_id) else {
            tracing::debug!(%room_id, "relay to room without members");
            return Ok(0);
        };

        let event = ServerEvent::Message(RoomMessage {
            room_id: room_id.to_string(),
            payload,
        });
        let echo = self.inner.settings.echo_to_sender;

        let mut delivered = 0;
        for (member, outbox) in members.iter() {
            if !echo && *member == sender {
                continue;
            }
            if outbox.send(event.clone()).is_ok() {
                delivered += 1;
            } else {
                tracing::debug!(connection_id = %member, %room_id, "member outbox closed");
            }
        }
        drop(members);

        counter!(RELAY_DELIVERED).increment(delivered as u64);
        Ok(delivered)
    }

    /// Remove `connection` from every room it joined (`Disconnected`).
    ///
    /// Never fails; returns how many rooms were left.
    pub fn disconnect(&self, connection: ConnectionId) -> usize {
        let Some((_, state)) = self.inner.connections.remove(&connection) else {
            return 0;
        };

        let evict = self.inner.settings.evict_empty_rooms;
        for room_id in &state.rooms {
            if let Entry::Occupied(mut room) = self.inner.rooms.entry(room_id.clone()) {
                room.get_mut().remove(&connection);
                if evict && room.get().is_empty() {
                    room.remove();
                    tracing::debug!(%room_id, "evicted empty room");
                }
            }
        }

        tracing::debug!(connection_id = %connection, label = %state.label, rooms = state.rooms.len(), "relay connection closed");
        gauge!(RELAY_ROOMS).set(self.inner.rooms.len() as f64);
        state.rooms.len()
    }

    /// Parse and apply one inbound text frame.
    ///
    /// Malformed frames are logged and dropped; nothing reaches other members.
    pub fn handle_frame(
        &self,
        connection: ConnectionId,
        text: &str,
    ) -> Result<FrameOutcome, RelayError> {
        let result = match serde_json::from_str::<ClientEvent>(text) {
            Ok(ClientEvent::JoinRoom(room_id)) => {
                self.join(connection, &room_id)
                    .map(|newly_joined| FrameOutcome::Joined {
                        room_id,
                        newly_joined,
                    })
            },
            Ok(ClientEvent::Message(RoomMessage { room_id, payload })) => self
                .relay(connection, &room_id, payload)
                .map(|delivered| FrameOutcome::Relayed { room_id, delivered }),
            Err(e) => Err(RelayError::Malformed(e.to_string())),
        };

        if let Err(RelayError::Malformed(reason)) = &result {
            counter!(RELAY_DROPPED_FRAMES).increment(1);
            tracing::warn!(connection_id = %connection, %reason, "dropping malformed relay frame");
        }

        result
    }

    /// Current members of a room
    pub fn members(&self, room_id: &str) -> Vec<ConnectionId> {
        self.inner
            .rooms
            .get(room_id)
            .map(|members| members.keys().copied().collect())
            .unwrap_or_default()
    }

    /// Rooms a connection has joined
    pub fn rooms_of(&self, connection: ConnectionId) -> Vec<RoomId> {
        self.inner
            .connections
            .get(&connection)
            .map(|state| state.rooms.iter().cloned().collect())
            .unwrap_or_default()
    }

    pub fn has_room(&self, room_id: &str) -> bool {
        self.inner.rooms.contains_key(room_id)
    }

    pub fn room_count(&self) -> usize {
        self.inner.rooms.len()
    }

    pub fn connection_count(&self) -> usize {
        self.inner.connections.len()
    }

    /// Stop the relay: drop every membership and outbox.
    ///
    /// Open connections observe end-of-stream on their inbox.
    pub fn shutdown(&self) {
        if self.inner.running.swap(false, Ordering::SeqCst) {
            // Connections first: an in-flight join holds its connection entry
            // while inserting into `rooms`.
            self.inner.connections.clear();
            self.inner.rooms.clear();
            gauge!(RELAY_ROOMS).set(0.0);
            tracing::info!("room relay stopped");
        }
    }
}
