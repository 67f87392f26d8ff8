//! Room Transport
//!
//! The coordinator only needs fire-and-forget sends plus a stream of
//! join/leave/message events. [`LocalMesh`] provides both in-process for
//! tests and the demo binary; a real deployment plugs a WebRTC or relay
//! transport in behind [`Transport`].

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use parking_lot::Mutex;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Serialize, Deserialize};
use tokio::sync::mpsc;
use tracing::{debug, info, trace};
use uuid::Uuid;

// =============================================================================
// PEER ID
// =============================================================================

/// Opaque peer identifier assigned by the room.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PeerId(String);

impl PeerId {
    /// Fresh random identifier.
    pub fn generate() -> Self {
        Self(Uuid::new_v4().simple().to_string())
    }

    /// Borrow as a string slice.
    #[inline]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for PeerId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for PeerId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl fmt::Display for PeerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// =============================================================================
// TRANSPORT
// =============================================================================

/// Events delivered to a room member.
#[derive(Clone, Debug, PartialEq)]
pub enum RoomEvent {
    /// A peer became reachable.
    PeerJoined(PeerId),
    /// A peer went away.
    PeerLeft(PeerId),
    /// A payload from a peer.
    Message {
        /// Sender
        from: PeerId,
        /// Raw JSON payload
        payload: String,
    },
}

/// Transport errors. Callers log these and move on.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// The local endpoint has left the room.
    #[error("Room closed")]
    Closed,

    /// Unicast target is not in the room.
    #[error("Unknown peer: {0}")]
    UnknownPeer(PeerId),
}

/// Outbound half of a room membership.
pub trait Transport: Send {
    /// Identifier the room assigned to us.
    fn local_id(&self) -> &PeerId;

    /// Send a payload to one peer, or to everyone else when `to` is `None`.
    ///
    /// Delivery is best-effort: success means handed off, not received.
    fn send(&self, payload: &str, to: Option<&PeerId>) -> Result<(), TransportError>;
}

// =============================================================================
// LOCAL MESH
// =============================================================================

struct MeshState {
    members: BTreeMap<PeerId, mpsc::UnboundedSender<RoomEvent>>,
    drop_rate: f64,
    rng: StdRng,
}

impl MeshState {
    fn deliver(&mut self, to: &PeerId, event: RoomEvent) {
        let lost = matches!(event, RoomEvent::Message { .. })
            && self.drop_rate > 0.0
            && self.rng.gen::<f64>() < self.drop_rate;
        if lost {
            trace!(to = %to, "Dropped message");
            return;
        }
        if let Some(tx) = self.members.get(to) {
            // Receiver gone means the member is leaving; nothing to do
            let _ = tx.send(event);
        }
    }
}

/// In-process room: every member sees every other member.
///
/// Membership events are always delivered; payloads may be dropped at a
/// configured rate to exercise the protocol's loss tolerance.
#[derive(Clone)]
pub struct LocalMesh {
    state: Arc<Mutex<MeshState>>,
}

impl Default for LocalMesh {
    fn default() -> Self {
        Self::new()
    }
}

impl LocalMesh {
    /// Lossless room.
    pub fn new() -> Self {
        Self::with_loss(0.0, 0)
    }

    /// Room dropping each payload delivery with probability `drop_rate`.
    pub fn with_loss(drop_rate: f64, seed: u64) -> Self {
        Self {
            state: Arc::new(Mutex::new(MeshState {
                members: BTreeMap::new(),
                drop_rate: drop_rate.clamp(0.0, 1.0),
                rng: StdRng::seed_from_u64(seed),
            })),
        }
    }

    /// Join under `peer_id`. Existing members and the newcomer are told about each other.
    pub fn join(&self, peer_id: PeerId) -> (MeshEndpoint, mpsc::UnboundedReceiver<RoomEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let mut state = self.state.lock();

        let existing: Vec<PeerId> = state.members.keys().cloned().collect();
        state.members.insert(peer_id.clone(), tx);
        for other in existing {
            state.deliver(&other, RoomEvent::PeerJoined(peer_id.clone()));
            state.deliver(&peer_id, RoomEvent::PeerJoined(other));
        }
        info!(peer = %peer_id, members = state.members.len(), "Peer joined room");

        (
            MeshEndpoint {
                peer_id,
                state: self.state.clone(),
            },
            rx,
        )
    }

    /// Current member count.
    pub fn member_count(&self) -> usize {
        self.state.lock().members.len()
    }

    /// Change the loss rate of a live room.
    pub fn set_drop_rate(&self, drop_rate: f64) {
        self.state.lock().drop_rate = drop_rate.clamp(0.0, 1.0);
    }
}

/// One member's handle on a [`LocalMesh`]. Dropping it leaves the room.
pub struct MeshEndpoint {
    peer_id: PeerId,
    state: Arc<Mutex<MeshState>>,
}

impl MeshEndpoint {
    /// Leave the room, notifying the remaining members.
    pub fn leave(&self) {
        let mut state = self.state.lock();
        if state.members.remove(&self.peer_id).is_none() {
            return;
        }
        let remaining: Vec<PeerId> = state.members.keys().cloned().collect();
        for other in remaining {
            state.deliver(&other, RoomEvent::PeerLeft(self.peer_id.clone()));
        }
        info!(peer = %self.peer_id, "Peer left room");
    }
}

impl Transport for MeshEndpoint {
    fn local_id(&self) -> &PeerId {
        &self.peer_id
    }

    fn send(&self, payload: &str, to: Option<&PeerId>) -> Result<(), TransportError> {
        let mut state = self.state.lock();
        if !state.members.contains_key(&self.peer_id) {
            return Err(TransportError::Closed);
        }

        let event = RoomEvent::Message {
            from: self.peer_id.clone(),
            payload: payload.to_string(),
        };

        match to {
            Some(target) => {
                if !state.members.contains_key(target) {
                    return Err(TransportError::UnknownPeer(target.clone()));
                }
                state.deliver(target, event);
            }
            None => {
                let targets: Vec<PeerId> = state
                    .members
                    .keys()
                    .filter(|id| **id != self.peer_id)
                    .cloned()
                    .collect();
                debug!(from = %self.peer_id, targets = targets.len(), "Broadcast");
                for target in targets {
                    state.deliver(&target, event.clone());
                }
            }
        }
        Ok(())
    }
}

impl Drop for MeshEndpoint {
    fn drop(&mut self) {
        self.leave();
    }
}
