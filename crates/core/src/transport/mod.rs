use std::collections::HashMap;
use std::net::SocketAddr;

use async_trait::async_trait;
use eoslink_records::EosMessage;
use thiserror::Error;
use tokio::sync::mpsc;

pub mod channel;
pub mod udp;

pub use channel::{ChannelPeer, ChannelTransport};
pub use udp::UdpTransport;

/// One outbound datagram: a single message or several delivered together.
#[derive(Debug, Clone, PartialEq)]
pub enum Packet {
    Message(EosMessage),
    Bundle(Vec<EosMessage>),
}

impl Packet {
    /// Wraps `messages`, using a bundle only when there is more than one.
    pub fn from_messages(mut messages: Vec<EosMessage>) -> Option<Packet> {
        match messages.len() {
            0 => None,
            1 => messages.pop().map(Packet::Message),
            _ => Some(Packet::Bundle(messages)),
        }
    }

    pub fn messages(&self) -> &[EosMessage] {
        match self {
            Packet::Message(message) => std::slice::from_ref(message),
            Packet::Bundle(messages) => messages,
        }
    }
}

impl From<EosMessage> for Packet {
    fn from(message: EosMessage) -> Self {
        Packet::Message(message)
    }
}

/// What a transport reports back to its session.
#[derive(Debug, Clone, PartialEq)]
pub enum TransportEvent {
    Message {
        message: EosMessage,
        origin: Option<SocketAddr>,
    },
    /// The link failed or was closed by the remote end.
    Disconnected,
}

#[derive(Error, Debug)]
pub enum TransportError {
    #[error("Transport is not connected")]
    NotConnected,
    #[error("Failed to resolve {0}")]
    Resolve(String),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Failed to encode packet: {0}")]
    Encode(String),
}

/// A datagram link to one console.
#[async_trait]
pub trait Transport: Send + Sync {
    fn name(&self) -> &str;

    /// Opens the link. Incoming messages and link failures are delivered
    /// to `inbound` until [`Transport::disconnect`] is called.
    async fn connect(&mut self, inbound: mpsc::Sender<TransportEvent>) -> Result<(), TransportError>;

    async fn send(&mut self, packet: &Packet) -> Result<(), TransportError>;

    async fn disconnect(&mut self) -> Result<(), TransportError>;

    fn is_connected(&self) -> bool;

    fn status(&self) -> HashMap<String, String>;
}
