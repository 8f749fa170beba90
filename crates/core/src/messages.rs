use std::collections::BTreeSet;
use std::fmt;
use std::time::Duration;

use eoslink_records::{EosMessage, RecordTarget};
use serde::{Deserialize, Serialize};
use tokio::sync::oneshot;
use uuid::Uuid;

use crate::session::SessionError;

/// Connection state of a console session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ConnectionState {
    Unknown,
    Disconnected,
    Connected,
    Unresponsive,
    Responsive,
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ConnectionState::Unknown => "unknown",
            ConnectionState::Disconnected => "disconnected",
            ConnectionState::Connected => "connected",
            ConnectionState::Unresponsive => "unresponsive",
            ConnectionState::Responsive => "responsive",
        };
        write!(f, "{}", name)
    }
}

/// Commands sent from a session handle to its worker
#[derive(Debug)]
pub enum SessionCommand {
    Connect {
        reply: oneshot::Sender<Result<(), SessionError>>,
    },
    Disconnect,
    Subscribe {
        targets: BTreeSet<RecordTarget>,
    },
    Unsubscribe {
        targets: BTreeSet<RecordTarget>,
    },
    SetTargets {
        targets: BTreeSet<RecordTarget>,
    },
    /// Send `/eos<address>` and answer with the reply at `/eos/out<address>`.
    Query {
        address: String,
        reply: oneshot::Sender<EosMessage>,
    },
    Shutdown,
}

/// Events sent from a session to its consumer
#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    StateChanged {
        state: ConnectionState,
    },
    Version {
        version: String,
    },
    Progress {
        target: RecordTarget,
        fraction: f64,
        stage: String,
    },
    Synchronized {
        target: RecordTarget,
    },
    /// A category was dropped before its fetch finished.
    SyncAbandoned {
        target: RecordTarget,
    },
    /// A partial record was discarded after waiting too long for its
    /// remaining messages.
    IncompleteRecord {
        target: RecordTarget,
        uuid: Uuid,
        path: String,
        received: usize,
        expected: usize,
    },
    /// A message outside the reply prefix reached the session.
    UndefinedMessage {
        message: EosMessage,
    },
    Error {
        message: String,
    },
    ShutdownComplete,
}

/// Settings configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Settings {
    // Console
    pub console_host: String,
    pub console_port: u16,
    pub local_port: u16,
    pub client_name: String,

    // Timing
    pub heartbeat_interval_ms: u64,
    pub heartbeat_failure_ms: u64,
    pub partial_expiry_ms: u64,

    // Subscriptions
    pub targets: Vec<RecordTarget>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            console_host: "127.0.0.1".to_string(),
            console_port: 8000,
            local_port: 8001,
            client_name: "eoslink".to_string(),

            heartbeat_interval_ms: 5000,
            heartbeat_failure_ms: 1000,
            partial_expiry_ms: 10_000,

            targets: Vec::new(),
        }
    }
}

/// Timing used by the session state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionSettings {
    pub heartbeat_interval: Duration,
    pub heartbeat_failure: Duration,
    pub partial_expiry: Duration,
}

impl Default for SessionSettings {
    fn default() -> Self {
        SessionSettings::from(&Settings::default())
    }
}

impl From<&Settings> for SessionSettings {
    fn from(settings: &Settings) -> Self {
        Self {
            heartbeat_interval: Duration::from_millis(settings.heartbeat_interval_ms),
            heartbeat_failure: Duration::from_millis(settings.heartbeat_failure_ms),
            partial_expiry: Duration::from_millis(settings.partial_expiry_ms),
        }
    }
}
