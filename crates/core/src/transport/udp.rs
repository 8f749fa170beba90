use std::collections::HashMap;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr};
use std::sync::Arc;

use async_trait::async_trait;
use eoslink_records::{Argument, EosMessage};
use rosc::{OscBundle, OscMessage, OscPacket, OscTime, OscType};
use tokio::net::UdpSocket;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use super::{Packet, Transport, TransportError, TransportEvent};

/// OSC over UDP. Replies are accepted from any source port of the console's
/// address, since consoles answer from a port of their own choosing.
/// Datagrams from other hosts are dropped.
pub struct UdpTransport {
    remote: String,
    local_port: u16,
    socket: Option<Arc<UdpSocket>>,
    destination: Option<SocketAddr>,
    reader: Option<JoinHandle<()>>,
    packets_sent: u64,
    status: HashMap<String, String>,
}

impl UdpTransport {
    pub fn new(host: &str, port: u16, local_port: u16) -> Self {
        Self {
            remote: format!("{}:{}", host, port),
            local_port,
            socket: None,
            destination: None,
            reader: None,
            packets_sent: 0,
            status: HashMap::new(),
        }
    }

    /// The resolved console address once connected.
    pub fn destination(&self) -> Option<SocketAddr> {
        self.destination
    }
}

#[async_trait]
impl Transport for UdpTransport {
    fn name(&self) -> &str {
        "udp"
    }

    async fn connect(&mut self, inbound: mpsc::Sender<TransportEvent>) -> Result<(), TransportError> {
        if self.socket.is_some() {
            self.disconnect().await?;
        }

        let destination = tokio::net::lookup_host(&self.remote)
            .await?
            .next()
            .ok_or_else(|| TransportError::Resolve(self.remote.clone()))?;
        let bind: SocketAddr = if destination.is_ipv4() {
            (Ipv4Addr::UNSPECIFIED, self.local_port).into()
        } else {
            (Ipv6Addr::UNSPECIFIED, self.local_port).into()
        };

        let socket = Arc::new(UdpSocket::bind(bind).await?);
        log::info!(
            "OSC transport listening on {}, sending to {}",
            socket.local_addr()?,
            destination
        );

        self.reader = Some(tokio::spawn(read_loop(socket.clone(), destination.ip(), inbound)));
        self.socket = Some(socket);
        self.destination = Some(destination);
        self.status.insert("remote".to_string(), destination.to_string());
        self.status
            .insert("local_port".to_string(), self.local_port.to_string());
        self.status
            .insert("status".to_string(), "connected".to_string());
        Ok(())
    }

    async fn send(&mut self, packet: &Packet) -> Result<(), TransportError> {
        let (Some(socket), Some(destination)) = (&self.socket, self.destination) else {
            return Err(TransportError::NotConnected);
        };
        let bytes = rosc::encoder::encode(&encode_packet(packet))
            .map_err(|e| TransportError::Encode(format!("{:?}", e)))?;
        socket.send_to(&bytes, destination).await?;

        self.packets_sent += 1;
        if log::log_enabled!(log::Level::Trace) {
            for message in packet.messages() {
                log::trace!("-> {}", message);
            }
        }
        Ok(())
    }

    async fn disconnect(&mut self) -> Result<(), TransportError> {
        if let Some(reader) = self.reader.take() {
            reader.abort();
        }
        if self.socket.take().is_some() {
            log::info!(
                "OSC transport to {} closed after {} packets",
                self.remote,
                self.packets_sent
            );
        }
        self.destination = None;
        self.status
            .insert("status".to_string(), "disconnected".to_string());
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.socket.is_some()
    }

    fn status(&self) -> HashMap<String, String> {
        let mut status = self.status.clone();
        status.insert("packets_sent".to_string(), self.packets_sent.to_string());
        status
    }
}

/// Whether a datagram from `origin` may have come from the console at `console`.
pub fn from_console(console: IpAddr, origin: SocketAddr) -> bool {
    origin.ip().to_canonical() == console.to_canonical()
}

async fn read_loop(
    socket: Arc<UdpSocket>,
    console: IpAddr,
    inbound: mpsc::Sender<TransportEvent>,
) {
    let mut buffer = vec![0u8; rosc::decoder::MTU];
    loop {
        let (size, origin) = match socket.recv_from(&mut buffer).await {
            Ok(received) => received,
            Err(e) => {
                log::error!("OSC receive failed: {}", e);
                let _ = inbound.send(TransportEvent::Disconnected).await;
                return;
            }
        };
        if !from_console(console, origin) {
            log::debug!("Dropping datagram from foreign host {}", origin);
            continue;
        }
        let packet = match rosc::decoder::decode_udp(&buffer[..size]) {
            Ok((_, packet)) => packet,
            Err(e) => {
                log::warn!("Discarding undecodable datagram from {}: {:?}", origin, e);
                continue;
            }
        };

        let mut messages = Vec::new();
        flatten(packet, &mut messages);
        for message in messages {
            log::trace!("<- {}", message);
            let event = TransportEvent::Message {
                message,
                origin: Some(origin),
            };
            if inbound.send(event).await.is_err() {
                return;
            }
        }
    }
}

fn flatten(packet: OscPacket, messages: &mut Vec<EosMessage>) {
    match packet {
        OscPacket::Message(message) => messages.extend(decode_message(message)),
        OscPacket::Bundle(bundle) => {
            for packet in bundle.content {
                flatten(packet, messages);
            }
        }
    }
}

/// Converts an OSC message. Record builders read arguments by position, so a
/// message carrying any argument type consoles never send is dropped whole.
pub fn decode_message(message: OscMessage) -> Option<EosMessage> {
    let mut arguments = Vec::with_capacity(message.args.len());
    for argument in message.args {
        let converted = match argument {
            OscType::Int(value) => Some(Argument::Int(value)),
            OscType::Long(value) => i32::try_from(value).ok().map(Argument::Int),
            OscType::Float(value) => Some(Argument::Float(value)),
            OscType::Double(value) => Some(Argument::Float(value as f32)),
            OscType::String(value) => Some(Argument::String(value)),
            OscType::Bool(value) => Some(Argument::Bool(value)),
            _ => None,
        };
        match converted {
            Some(converted) => arguments.push(converted),
            None => {
                log::debug!(
                    "Dropping {}: argument {} has an unsupported type",
                    message.addr,
                    arguments.len()
                );
                return None;
            }
        }
    }
    Some(EosMessage::new(message.addr, arguments))
}

pub fn encode_message(message: &EosMessage) -> OscMessage {
    OscMessage {
        addr: message.address.clone(),
        args: message
            .arguments
            .iter()
            .map(|argument| match argument {
                Argument::Bool(value) => OscType::Bool(*value),
                Argument::Int(value) => OscType::Int(*value),
                Argument::Float(value) => OscType::Float(*value),
                Argument::String(value) => OscType::String(value.clone()),
            })
            .collect(),
    }
}

fn encode_packet(packet: &Packet) -> OscPacket {
    match packet {
        Packet::Message(message) => OscPacket::Message(encode_message(message)),
        Packet::Bundle(messages) => OscPacket::Bundle(OscBundle {
            // Immediately.
            timetag: OscTime {
                seconds: 0,
                fractional: 1,
            },
            content: messages
                .iter()
                .map(|message| OscPacket::Message(encode_message(message)))
                .collect(),
        }),
    }
}
