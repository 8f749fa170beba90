use thiserror::Error;

use crate::transport::TransportError;

pub mod filter_changes;
pub mod heartbeat;
pub mod pending;
#[allow(clippy::module_inception)]
pub mod session;

pub use filter_changes::{FilterChanges, SYSTEM_FILTERS};
pub use heartbeat::Heartbeat;
pub use pending::PendingRequests;
pub use session::Session;

#[derive(Error, Debug)]
pub enum SessionError {
    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),
    #[error("Session is not connected")]
    NotConnected,
    #[error("Session worker has stopped")]
    Closed,
    #[error("Request was superseded or dropped before a reply arrived")]
    Cancelled,
}
