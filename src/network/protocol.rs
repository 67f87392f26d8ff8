//! Protocol Messages
//!
//! Wire format for peer-to-peer actions. Every message is a JSON object
//! tagged by `type`; there is no request/response pairing and no
//! acknowledgement. Delivery is best-effort in any order.

use serde::{Serialize, Deserialize};

use crate::game::maze::{GameSize, Maze, Wall};
use crate::network::room::PeerId;

/// Reference to a wall by its generation index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct WallRef {
    /// Index into the maze's wall list
    #[serde(rename = "wallIndex")]
    pub wall_index: usize,
}

/// Maze announcement body.
///
/// Walls are informational; receivers regenerate them from seed and size.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MazePayload {
    /// Generation seed
    pub seed: f64,
    /// Generated walls
    #[serde(default)]
    pub walls: Vec<Wall>,
    /// Logical creation time (ms); absent counts as oldest
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time: Option<u64>,
    /// World size the maze was generated for
    pub size: GameSize,
}

impl MazePayload {
    /// Snapshot of a held maze.
    pub fn from_maze(maze: &Maze) -> Self {
        Self {
            seed: maze.seed,
            walls: maze.walls.clone(),
            time: Some(maze.time),
            size: maze.size,
        }
    }
}

/// Peer actions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum PeerMessage {
    /// Sender's tank pose, broadcast every tick.
    #[serde(rename = "move")]
    Move {
        /// Centre x
        x: f64,
        /// Centre y
        y: f64,
        /// Facing angle
        angle: f64,
    },

    /// Sender's tank fired.
    #[serde(rename = "shoot")]
    Shoot,

    /// Sender's tank traversed these walls.
    #[serde(rename = "wallColorChange")]
    WallColorChange {
        /// Traversed walls
        #[serde(rename = "wallsUpdated")]
        walls_updated: Vec<WallRef>,
    },

    /// A new maze for the room.
    #[serde(rename = "newGame", alias = "newMaze")]
    NewMaze {
        /// Maze body
        maze: MazePayload,
    },

    /// Handshake: the sender's tank.
    #[serde(rename = "newUser")]
    NewUser {
        /// Centre x
        x: f64,
        /// Centre y
        y: f64,
        /// Facing angle
        angle: f64,
        /// Normalized screen size
        screen: GameSize,
        /// Sender's tank creation time (ms)
        #[serde(rename = "originalCreationTime")]
        original_creation_time: u64,
        /// Seed of the maze the sender holds
        #[serde(default, skip_serializing_if = "Option::is_none")]
        seed: Option<f64>,
    },

    /// Round winner announcement.
    #[serde(rename = "gameOver")]
    GameOver {
        /// Winning peer
        winner: PeerId,
    },

    /// The sender's tank was hit.
    #[serde(rename = "eliminated")]
    Eliminated {
        /// Shot sequence number of the hitting bullet
        bullet_id: u64,
        /// Owner of the hitting bullet
        #[serde(default, skip_serializing_if = "Option::is_none")]
        shooter: Option<PeerId>,
    },

    /// Liveness beacon carrying the sender's maze identity.
    #[serde(rename = "ping")]
    Ping {
        /// Seed of the sender's maze
        #[serde(default, skip_serializing_if = "Option::is_none")]
        seed: Option<f64>,
        /// Time of the sender's maze
        #[serde(rename = "mazeTime", default, skip_serializing_if = "Option::is_none")]
        maze_time: Option<u64>,
    },
}

impl PeerMessage {
    /// Serialize to JSON string.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Deserialize from JSON string.
    pub fn from_json(s: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(s)
    }

    /// Decode and validate in one step.
    pub fn decode(s: &str) -> Result<Self, ProtocolError> {
        let message = Self::from_json(s)?;
        message.validate()?;
        Ok(message)
    }

    /// Wire tag, for logging.
    pub fn kind(&self) -> &'static str {
        match self {
            PeerMessage::Move { .. } => "move",
            PeerMessage::Shoot => "shoot",
            PeerMessage::WallColorChange { .. } => "wallColorChange",
            PeerMessage::NewMaze { .. } => "newGame",
            PeerMessage::NewUser { .. } => "newUser",
            PeerMessage::GameOver { .. } => "gameOver",
            PeerMessage::Eliminated { .. } => "eliminated",
            PeerMessage::Ping { .. } => "ping",
        }
    }

    /// Field checks that serde cannot express.
    pub fn validate(&self) -> Result<(), ProtocolError> {
        match self {
            PeerMessage::Move { x, y, angle } => {
                finite("x", *x)?;
                finite("y", *y)?;
                finite("angle", *angle)
            }
            PeerMessage::NewMaze { maze } => {
                finite("maze.seed", maze.seed)?;
                positive_size("maze.size", maze.size)
            }
            PeerMessage::NewUser { x, y, angle, screen, seed, .. } => {
                finite("x", *x)?;
                finite("y", *y)?;
                finite("angle", *angle)?;
                positive_size("screen", *screen)?;
                match seed {
                    Some(seed) => finite("seed", *seed),
                    None => Ok(()),
                }
            }
            PeerMessage::Ping { seed: Some(seed), .. } => finite("seed", *seed),
            PeerMessage::GameOver { winner } if winner.as_str().is_empty() => {
                Err(ProtocolError::InvalidField { field: "winner" })
            }
            _ => Ok(()),
        }
    }
}

fn finite(field: &'static str, value: f64) -> Result<(), ProtocolError> {
    if value.is_finite() {
        Ok(())
    } else {
        Err(ProtocolError::InvalidField { field })
    }
}

fn positive_size(field: &'static str, size: GameSize) -> Result<(), ProtocolError> {
    if size.width.is_finite() && size.height.is_finite() && size.width > 0.0 && size.height > 0.0 {
        Ok(())
    } else {
        Err(ProtocolError::InvalidField { field })
    }
}

/// Inbound message errors. None of these are fatal.
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    /// Not JSON, unknown `type`, or missing fields.
    #[error("Malformed message: {0}")]
    Malformed(#[from] serde_json::Error),

    /// A field holds an unusable value.
    #[error("Invalid field: {field}")]
    InvalidField {
        /// Offending field
        field: &'static str,
    },

    /// A wall index past the held maze.
    #[error("Unknown wall index {index} (maze has {walls} walls)")]
    UnknownWall {
        /// Referenced index
        index: usize,
        /// Walls held
        walls: usize,
    },
}
