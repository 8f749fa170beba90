use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use eoslink_records::EosMessage;
use parking_lot::Mutex;
use tokio::sync::mpsc;

use super::{Packet, Transport, TransportError, TransportEvent};

type Inbound = Arc<Mutex<Option<mpsc::Sender<TransportEvent>>>>;

/// In-process transport. Everything sent is handed to the paired
/// [`ChannelPeer`], which plays the console.
pub struct ChannelTransport {
    outbound: mpsc::UnboundedSender<Packet>,
    inbound: Inbound,
    packets_sent: u64,
}

/// The console side of a [`ChannelTransport`].
pub struct ChannelPeer {
    outbound: mpsc::UnboundedReceiver<Packet>,
    inbound: Inbound,
}

impl ChannelTransport {
    pub fn pair() -> (ChannelTransport, ChannelPeer) {
        let (tx, rx) = mpsc::unbounded_channel();
        let inbound: Inbound = Arc::new(Mutex::new(None));
        (
            ChannelTransport {
                outbound: tx,
                inbound: inbound.clone(),
                packets_sent: 0,
            },
            ChannelPeer {
                outbound: rx,
                inbound,
            },
        )
    }
}

#[async_trait]
impl Transport for ChannelTransport {
    fn name(&self) -> &str {
        "channel"
    }

    async fn connect(&mut self, inbound: mpsc::Sender<TransportEvent>) -> Result<(), TransportError> {
        *self.inbound.lock() = Some(inbound);
        Ok(())
    }

    async fn send(&mut self, packet: &Packet) -> Result<(), TransportError> {
        if self.inbound.lock().is_none() {
            return Err(TransportError::NotConnected);
        }
        self.outbound
            .send(packet.clone())
            .map_err(|_| TransportError::NotConnected)?;
        self.packets_sent += 1;
        Ok(())
    }

    async fn disconnect(&mut self) -> Result<(), TransportError> {
        self.inbound.lock().take();
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.inbound.lock().is_some()
    }

    fn status(&self) -> HashMap<String, String> {
        let mut status = HashMap::new();
        status.insert("packets_sent".to_string(), self.packets_sent.to_string());
        status.insert(
            "status".to_string(),
            if self.is_connected() { "connected" } else { "disconnected" }.to_string(),
        );
        status
    }
}

impl ChannelPeer {
    /// Next packet sent by the session, waiting for one if necessary.
    pub async fn recv(&mut self) -> Option<Packet> {
        self.outbound.recv().await
    }

    pub fn try_recv(&mut self) -> Option<Packet> {
        self.outbound.try_recv().ok()
    }

    /// Every message sent so far that has not been received yet.
    pub fn drain(&mut self) -> Vec<EosMessage> {
        let mut messages = Vec::new();
        while let Some(packet) = self.try_recv() {
            messages.extend(packet.messages().iter().cloned());
        }
        messages
    }

    /// Delivers `message` to the session as if the console had sent it.
    /// Returns false when the session is not listening.
    pub async fn reply(&self, message: EosMessage) -> bool {
        let sender = self.inbound.lock().clone();
        match sender {
            Some(sender) => sender
                .send(TransportEvent::Message {
                    message,
                    origin: None,
                })
                .await
                .is_ok(),
            None => false,
        }
    }

    /// Reports a link failure to the session.
    pub async fn disconnect_remote(&self) {
        let sender = self.inbound.lock().take();
        if let Some(sender) = sender {
            let _ = sender.send(TransportEvent::Disconnected).await;
        }
    }

    pub fn is_connected(&self) -> bool {
        self.inbound.lock().is_some()
    }
}
