//! Network Layer
//!
//! Peer-to-peer synchronization. The [`Coordinator`] is a pure state
//! machine over messages and ticks; the [`PeerDriver`] runs it against a
//! room transport.

pub mod protocol;
pub mod room;
pub mod timers;
pub mod coordinator;
pub mod driver;

pub use protocol::{PeerMessage, MazePayload, WallRef, ProtocolError};
pub use room::{PeerId, RoomEvent, Transport, TransportError, LocalMesh, MeshEndpoint};
pub use timers::{Timer, TimerQueue};
pub use coordinator::{Coordinator, Outbound};
pub use driver::{PeerDriver, Clock, SystemClock};
