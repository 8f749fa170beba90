pub use address::AddressSpace;
pub use async_session::{ConsoleSession, SharedState};
pub use config::{ConfigError, ConfigManager, ConfigSchema};
pub use cue::CueManager;
pub use messages::{ConnectionState, SessionCommand, SessionEvent, SessionSettings, Settings};
pub use session::{FilterChanges, Heartbeat, PendingRequests, Session, SessionError};
pub use target::{
    manager_for, CueListSnapshot, IncompleteRecord, Outbox, Progress, Reassembler,
    TargetManager, TargetSnapshot, TargetSync,
};
// Transports
pub use transport::{
    ChannelPeer, ChannelTransport, Packet, Transport, TransportError, TransportEvent,
    UdpTransport,
};

pub mod address;
mod async_session;
mod config;
pub mod cue;
pub mod messages;
pub mod session;
pub mod target;
pub mod transport;
