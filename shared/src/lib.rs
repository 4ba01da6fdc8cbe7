//! Code common to the card-tsar server and client: wire framing, typed
//! protocol messages, the round-phase synchronization primitives, and the
//! fault taxonomy.

pub mod error;
pub mod frame;
pub mod protocol;
pub mod session;
pub mod sync;

pub use error::{ConfigFault, Fault, GameResult, ProtocolViolation};
pub use frame::{FrameReceiver, FrameSender, MAX_STRING_LEN};
pub use protocol::{
    DealtCard, Prompt, RoundData, Verdict, Welcome, MAX_HAND, MAX_PLAYERS, MAX_ROUNDS,
    PROTOCOL_MAGIC, PROTOCOL_VERSION,
};
pub use session::{spawn_session_task, RoundRole, RoundSync};
pub use sync::{Barrier, Gate, Shutdown};
