use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use eoslink_records::{Console, EosMessage, RecordTarget};
use parking_lot::RwLock;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::Instant;

use crate::messages::{ConnectionState, SessionCommand, SessionEvent, SessionSettings};
use crate::session::{Session, SessionError};
use crate::target::TargetSnapshot;
use crate::transport::{Transport, TransportEvent};

/// What consumers can read without talking to the worker.
#[derive(Debug, Clone)]
pub struct SharedState {
    pub state: ConnectionState,
    pub version: Option<String>,
    pub snapshots: BTreeMap<RecordTarget, Arc<TargetSnapshot>>,
    pub synchronized: BTreeSet<RecordTarget>,
}

impl Default for SharedState {
    fn default() -> Self {
        Self {
            state: ConnectionState::Unknown,
            version: None,
            snapshots: BTreeMap::new(),
            synchronized: BTreeSet::new(),
        }
    }
}

/// Handle to a console session running on its own task.
///
/// All session state lives in the worker task; the handle sends commands and
/// reads the published [`SharedState`].
pub struct ConsoleSession {
    console: Console,
    commands: mpsc::Sender<SessionCommand>,
    shared: Arc<RwLock<SharedState>>,
    worker: Option<JoinHandle<()>>,
}

impl ConsoleSession {
    /// Spawns the worker. Events are delivered on the returned receiver.
    pub fn start(
        console: Console,
        client_name: &str,
        transport: Box<dyn Transport>,
        settings: SessionSettings,
    ) -> (Self, mpsc::UnboundedReceiver<SessionEvent>) {
        let (command_tx, command_rx) = mpsc::channel(64);
        let (event_tx, event_rx) = mpsc::unbounded_channel();
        let (inbound_tx, inbound_rx) = mpsc::channel(1024);
        let shared = Arc::new(RwLock::new(SharedState::default()));

        log::info!(
            "Starting session with {} over {} transport",
            console,
            transport.name()
        );
        let worker = Worker {
            session: Session::new(console.clone(), client_name, settings),
            transport,
            inbound_tx,
            inbound_rx,
            events: event_tx,
            shared: Arc::clone(&shared),
        };
        let handle = tokio::spawn(worker.run(command_rx));

        (
            Self {
                console,
                commands: command_tx,
                shared,
                worker: Some(handle),
            },
            event_rx,
        )
    }

    pub fn console(&self) -> &Console {
        &self.console
    }

    /// Opens the transport and starts the heartbeat.
    pub async fn connect(&self) -> Result<(), SessionError> {
        let (reply, rx) = oneshot::channel();
        self.send(SessionCommand::Connect { reply }).await?;
        rx.await.map_err(|_| SessionError::Closed)?
    }

    pub async fn disconnect(&self) -> Result<(), SessionError> {
        self.send(SessionCommand::Disconnect).await
    }

    pub async fn subscribe<I>(&self, targets: I) -> Result<(), SessionError>
    where
        I: IntoIterator<Item = RecordTarget>,
    {
        self.send(SessionCommand::Subscribe {
            targets: targets.into_iter().collect(),
        })
        .await
    }

    pub async fn unsubscribe<I>(&self, targets: I) -> Result<(), SessionError>
    where
        I: IntoIterator<Item = RecordTarget>,
    {
        self.send(SessionCommand::Unsubscribe {
            targets: targets.into_iter().collect(),
        })
        .await
    }

    /// Replaces the subscription with exactly `targets`.
    pub async fn set_targets<I>(&self, targets: I) -> Result<(), SessionError>
    where
        I: IntoIterator<Item = RecordTarget>,
    {
        self.send(SessionCommand::SetTargets {
            targets: targets.into_iter().collect(),
        })
        .await
    }

    /// Sends `/eos<address>` and waits for the reply at `/eos/out<address>`.
    /// A later query to the same address, or a disconnect, cancels this one.
    pub async fn query(&self, address: &str) -> Result<EosMessage, SessionError> {
        let (reply, rx) = oneshot::channel();
        self.send(SessionCommand::Query {
            address: address.to_string(),
            reply,
        })
        .await?;
        rx.await.map_err(|_| SessionError::Cancelled)
    }

    /// Disconnects and stops the worker.
    pub async fn shutdown(&mut self) -> Result<(), SessionError> {
        let result = self.send(SessionCommand::Shutdown).await;
        if let Some(worker) = self.worker.take() {
            let _ = worker.await;
        }
        result
    }

    pub fn state(&self) -> ConnectionState {
        self.shared.read().state
    }

    pub fn version(&self) -> Option<String> {
        self.shared.read().version.clone()
    }

    pub fn snapshot(&self, target: RecordTarget) -> Option<Arc<TargetSnapshot>> {
        self.shared.read().snapshots.get(&target).cloned()
    }

    pub fn snapshots(&self) -> BTreeMap<RecordTarget, Arc<TargetSnapshot>> {
        self.shared.read().snapshots.clone()
    }

    pub fn is_synchronized(&self, target: RecordTarget) -> bool {
        self.shared.read().synchronized.contains(&target)
    }

    async fn send(&self, command: SessionCommand) -> Result<(), SessionError> {
        self.commands
            .send(command)
            .await
            .map_err(|_| SessionError::Closed)
    }
}

impl Drop for ConsoleSession {
    fn drop(&mut self) {
        if let Some(worker) = self.worker.take() {
            worker.abort();
        }
    }
}

struct Worker {
    session: Session,
    transport: Box<dyn Transport>,
    inbound_tx: mpsc::Sender<TransportEvent>,
    inbound_rx: mpsc::Receiver<TransportEvent>,
    events: mpsc::UnboundedSender<SessionEvent>,
    shared: Arc<RwLock<SharedState>>,
}

impl Worker {
    async fn run(mut self, mut commands: mpsc::Receiver<SessionCommand>) {
        loop {
            let deadline = self.session.next_deadline();
            tokio::select! {
                command = commands.recv() => {
                    match command {
                        Some(SessionCommand::Shutdown) | None => {
                            log::info!("Session worker received shutdown signal");
                            break;
                        }
                        Some(command) => self.handle_command(command).await,
                    }
                }

                Some(event) = self.inbound_rx.recv() => {
                    self.handle_transport(event).await;
                }

                _ = sleep_until(deadline) => {
                    self.session.poll(Instant::now());
                }
            }
            self.flush().await;
        }

        if self.transport.is_connected() {
            self.close().await;
            self.flush().await;
        }
        let _ = self.events.send(SessionEvent::ShutdownComplete);
        log::info!("Session with {} shut down", self.session.console());
    }

    async fn handle_command(&mut self, command: SessionCommand) {
        let now = Instant::now();
        match command {
            SessionCommand::Connect { reply } => {
                if self.transport.is_connected() {
                    let _ = reply.send(Ok(()));
                    return;
                }
                match self.transport.connect(self.inbound_tx.clone()).await {
                    Ok(()) => {
                        self.session.connected(now);
                        let _ = reply.send(Ok(()));
                    }
                    Err(e) => {
                        log::error!("Failed to connect to {}: {}", self.session.console(), e);
                        let _ = self.events.send(SessionEvent::Error {
                            message: e.to_string(),
                        });
                        let _ = reply.send(Err(e.into()));
                    }
                }
            }
            SessionCommand::Disconnect => self.close().await,
            SessionCommand::Subscribe { targets } => self.session.subscribe(targets, now),
            SessionCommand::Unsubscribe { targets } => self.session.unsubscribe(targets, now),
            SessionCommand::SetTargets { targets } => self.session.set_targets(targets, now),
            SessionCommand::Query { address, reply } => self.session.query(&address, reply),
            // Handled by the run loop.
            SessionCommand::Shutdown => {}
        }
    }

    async fn handle_transport(&mut self, event: TransportEvent) {
        match event {
            TransportEvent::Message { message, .. } => {
                self.session.receive(message, Instant::now());
            }
            TransportEvent::Disconnected => {
                log::warn!("Lost transport to {}", self.session.console());
                self.close().await;
            }
        }
    }

    async fn close(&mut self) {
        if let Err(e) = self.transport.disconnect().await {
            log::warn!("Error closing transport: {}", e);
        }
        self.session.disconnected();
    }

    /// Sends queued packets, publishes state, then forwards events.
    async fn flush(&mut self) {
        for packet in self.session.take_outbox() {
            if let Err(e) = self.transport.send(&packet).await {
                log::warn!("Failed to send {:?}: {}", packet.messages().first().map(|m| &m.address), e);
            }
        }

        let changed = self.session.changed_snapshots();
        {
            let mut shared = self.shared.write();
            shared.state = self.session.state();
            shared.version = self.session.version().map(str::to_string);
            for (target, snapshot) in changed {
                shared.snapshots.insert(target, Arc::new(snapshot));
            }
            let active: BTreeSet<RecordTarget> = self.session.active_targets().collect();
            shared.snapshots.retain(|target, _| active.contains(target));
            shared.synchronized = active
                .into_iter()
                .filter(|target| self.session.is_synchronized(*target))
                .collect();
        }

        for event in self.session.take_events() {
            let _ = self.events.send(event);
        }
    }
}

async fn sleep_until(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}
