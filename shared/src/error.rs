//! Fault taxonomy shared by both hosts.
//!
//! Three kinds of trouble exist: the transport dying under us, a peer
//! speaking the protocol wrong, and the operator configuring the game
//! wrong. Everything else is `Aborted`, which is what any blocked wait
//! returns once the shutdown signal trips.

use std::io;

/// Result type for game operations
pub type GameResult<T> = Result<T, Fault>;

/// A peer sent something the protocol does not allow.
///
/// During the join handshake these are recoverable: the acceptor rejects
/// the connection and keeps listening. Once a session is live, any
/// violation is fatal to the whole game.
#[derive(Debug, thiserror::Error)]
pub enum ProtocolViolation {
    #[error("bad protocol magic 0x{0:08x}")]
    BadMagic(i32),

    #[error("peer speaks protocol version {peer}, this build speaks {expected}")]
    VersionMismatch { peer: i32, expected: i32 },

    #[error("negative frame length {0}")]
    NegativeLength(i32),

    #[error("frame length {len} exceeds the {limit}-byte cap")]
    FrameTooLarge { len: i32, limit: usize },

    #[error("byte 0x{0:02x} is not a boolean")]
    InvalidBool(u8),

    #[error("string frame is not valid UTF-8")]
    InvalidUtf8,

    #[error("username {0:?} is already taken")]
    DuplicateUsername(String),

    #[error("server rejected the join request")]
    JoinRejected,

    #[error("index {value} out of range (limit {limit})")]
    IndexOutOfRange { value: i32, limit: usize },

    #[error("player {player} replayed hand slot {slot}")]
    SlotAlreadyPlayed { player: usize, slot: usize },

    #[error("round state read out of phase: {0}")]
    PhaseDesync(&'static str),
}

/// The operator handed the server something it cannot start a game with.
/// Always raised before any socket is opened.
#[derive(Debug, thiserror::Error)]
pub enum ConfigFault {
    #[error("cannot read deck {path}: {source}")]
    DeckUnreadable { path: String, source: io::Error },

    #[error("deck {path} is empty")]
    EmptyDeck { path: String },

    #[error("{path}:{line}: {detail}")]
    MalformedDeck {
        path: String,
        line: usize,
        detail: String,
    },

    #[error("deck {path} holds {have} entries but the game may need {need}")]
    DeckTooSmall {
        path: String,
        have: usize,
        need: usize,
    },

    #[error("invalid setting: {0}")]
    InvalidSetting(String),

    /// Startup validation sizes the decks for the worst case, so this
    /// firing mid-game means that validation is wrong.
    #[error("the {0} deck ran dry mid-game")]
    DeckExhausted(&'static str),
}

/// Anything that can knock a session, or the whole game, over.
#[derive(Debug, thiserror::Error)]
pub enum Fault {
    #[error("connection i/o failed: {0}")]
    Io(#[from] io::Error),

    #[error("peer closed the stream mid-frame")]
    Closed,

    #[error("protocol violation: {0}")]
    Protocol(#[from] ProtocolViolation),

    #[error("configuration fault: {0}")]
    Config(#[from] ConfigFault),

    #[error("aborted by shutdown signal")]
    Aborted,
}

impl Fault {
    /// True for the shutdown-cancellation fault, which every task reports
    /// once one of its siblings has already failed with the root cause.
    pub fn is_abort(&self) -> bool {
        matches!(self, Fault::Aborted)
    }
}
