use std::collections::{BTreeMap, BTreeSet};
use std::time::Duration;

use eoslink_records::{Console, EosMessage, RecordTarget, REPLY_PREFIX, REQUEST_PREFIX};
use tokio::sync::oneshot;
use tokio::time::Instant;

use super::filter_changes::{FilterChanges, SYSTEM_FILTERS};
use super::heartbeat::{Heartbeat, PING_REPLY};
use super::pending::PendingRequests;
use crate::messages::{ConnectionState, SessionEvent, SessionSettings};
use crate::target::{manager_for, Outbox, TargetSnapshot, TargetSync};
use crate::transport::Packet;

pub const VERSION_REQUEST: &str = "/eos/get/version";
pub const VERSION_REPLY: &str = "/get/version";

/// Smallest change in a category's completion worth reporting.
const PROGRESS_STEP: f64 = 0.01;

#[derive(Debug, Default, Clone, Copy)]
struct Reported {
    fraction: Option<f64>,
    synchronized: bool,
}

/// The console session state machine.
///
/// Performs no I/O and reads no clock: every input carries the current time,
/// packets to send accumulate in an outbox and consumer notifications in an
/// event queue, both drained by the owner after each call.
pub struct Session {
    console: Console,
    settings: SessionSettings,
    state: ConnectionState,
    heartbeat: Heartbeat,
    subscribed: BTreeSet<RecordTarget>,
    /// Categories whose filters are installed and managers exist.
    applied: BTreeSet<RecordTarget>,
    active_filters: BTreeSet<String>,
    system_filters: bool,
    managers: BTreeMap<RecordTarget, Box<dyn TargetSync>>,
    reported: BTreeMap<RecordTarget, Reported>,
    pending: PendingRequests,
    version: Option<String>,
    next_sweep: Option<Instant>,
    outbox: Vec<Packet>,
    events: Vec<SessionEvent>,
}

impl Session {
    pub fn new(console: Console, client_name: &str, settings: SessionSettings) -> Self {
        Self {
            console,
            settings,
            state: ConnectionState::Unknown,
            heartbeat: Heartbeat::new(
                format!("{} heartbeat", client_name),
                settings.heartbeat_interval,
                settings.heartbeat_failure,
            ),
            subscribed: BTreeSet::new(),
            applied: BTreeSet::new(),
            active_filters: BTreeSet::new(),
            system_filters: false,
            managers: BTreeMap::new(),
            reported: BTreeMap::new(),
            pending: PendingRequests::new(),
            version: None,
            next_sweep: None,
            outbox: Vec::new(),
            events: Vec::new(),
        }
    }

    pub fn console(&self) -> &Console {
        &self.console
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    pub fn version(&self) -> Option<&str> {
        self.version.as_deref()
    }

    pub fn subscribed(&self) -> &BTreeSet<RecordTarget> {
        &self.subscribed
    }

    pub fn active_filters(&self) -> &BTreeSet<String> {
        &self.active_filters
    }

    pub fn heartbeat_counter(&self) -> i32 {
        self.heartbeat.counter()
    }

    pub fn pending_queries(&self) -> usize {
        self.pending.len()
    }

    /// Categories that currently have a manager.
    pub fn active_targets(&self) -> impl Iterator<Item = RecordTarget> + '_ {
        self.managers.keys().copied()
    }

    pub fn is_synchronized(&self, target: RecordTarget) -> bool {
        self.managers
            .get(&target)
            .is_some_and(|manager| manager.is_synchronized())
    }

    pub fn snapshot(&self, target: RecordTarget) -> Option<TargetSnapshot> {
        self.managers.get(&target).map(|manager| manager.snapshot())
    }

    /// Snapshots of every category whose collection changed since the last call.
    pub fn changed_snapshots(&mut self) -> Vec<(RecordTarget, TargetSnapshot)> {
        self.managers
            .iter_mut()
            .filter_map(|(target, manager)| {
                manager
                    .take_changed()
                    .then(|| (*target, manager.snapshot()))
            })
            .collect()
    }

    pub fn take_outbox(&mut self) -> Vec<Packet> {
        std::mem::take(&mut self.outbox)
    }

    pub fn take_events(&mut self) -> Vec<SessionEvent> {
        std::mem::take(&mut self.events)
    }

    /// When [`Session::poll`] next has work to do.
    pub fn next_deadline(&self) -> Option<Instant> {
        match (self.heartbeat.next_deadline(), self.next_sweep) {
            (Some(a), Some(b)) => Some(a.min(b)),
            (a, b) => a.or(b),
        }
    }

    /// The transport is open.
    pub fn connected(&mut self, now: Instant) {
        log::info!("Connected to {}", self.console);
        self.set_state(ConnectionState::Connected);
        self.heartbeat.start(now);
        self.next_sweep = Some(now + self.sweep_interval());
        self.poll(now);
    }

    /// The transport closed, by request or on failure.
    pub fn disconnected(&mut self) {
        for (target, manager) in std::mem::take(&mut self.managers) {
            if !manager.is_synchronized() {
                log::info!("{}: synchronization abandoned", target);
                self.events.push(SessionEvent::SyncAbandoned { target });
            }
        }
        self.heartbeat.stop();
        self.applied.clear();
        self.active_filters.clear();
        self.system_filters = false;
        self.reported.clear();
        self.pending.clear();
        self.next_sweep = None;
        self.outbox.clear();
        self.set_state(ConnectionState::Disconnected);
    }

    pub fn subscribe<I>(&mut self, targets: I, now: Instant)
    where
        I: IntoIterator<Item = RecordTarget>,
    {
        self.subscribed.extend(targets);
        self.reconcile(now);
    }

    pub fn unsubscribe<I>(&mut self, targets: I, now: Instant)
    where
        I: IntoIterator<Item = RecordTarget>,
    {
        for target in targets {
            self.subscribed.remove(&target);
        }
        self.reconcile(now);
    }

    pub fn set_targets<I>(&mut self, targets: I, now: Instant)
    where
        I: IntoIterator<Item = RecordTarget>,
    {
        self.subscribed = targets.into_iter().collect();
        self.reconcile(now);
    }

    /// Sends `/eos<address>` and completes `reply` with the reply at
    /// `/eos/out<address>`. Dropped at once when not connected.
    pub fn query(&mut self, address: &str, reply: oneshot::Sender<EosMessage>) {
        if matches!(
            self.state,
            ConnectionState::Unknown | ConnectionState::Disconnected
        ) {
            log::debug!("Not connected, dropping query {}", address);
            return;
        }
        let filter = format!("{}{}", REPLY_PREFIX, address);
        if !self.active_filters.contains(&filter) {
            let changes = FilterChanges::install([filter]);
            changes.apply(&mut self.active_filters);
            self.outbox.extend(changes.packet());
        }
        if self.pending.insert(address, reply) {
            log::debug!("Query {} replaced an earlier one", address);
        }
        self.send(EosMessage::request(format!("{}{}", REQUEST_PREFIX, address)));
    }

    /// Feeds one message received from the console.
    pub fn receive(&mut self, message: EosMessage, now: Instant) {
        if !message.is_reply() {
            log::debug!("Undefined message {}", message);
            self.events.push(SessionEvent::UndefinedMessage { message });
            return;
        }
        if let Some(reply) = message.into_reply() {
            self.dispatch(reply, now);
        }
    }

    fn dispatch(&mut self, reply: EosMessage, now: Instant) {
        if self.heartbeat.acknowledge(&reply, now) {
            self.responsive(now);
            return;
        }

        let queried = match self.pending.complete(&reply.address) {
            Some(sender) => {
                let _ = sender.send(reply.clone());
                true
            }
            None => false,
        };

        match reply.address.as_str() {
            VERSION_REPLY => {
                if let Some(version) = reply.string(0) {
                    log::info!("{} runs software version {}", self.console, version);
                    self.version = Some(version.to_string());
                    self.events.push(SessionEvent::Version {
                        version: version.to_string(),
                    });
                }
                return;
            }
            "/filter/add" | "/filter/remove" => {
                log::debug!("Console acknowledged {}", reply);
                return;
            }
            PING_REPLY => {
                log::debug!("Ignoring stale heartbeat reply");
                return;
            }
            _ => {}
        }

        let mut outbox = Outbox::new(now);
        let mut handled = false;
        for manager in self.managers.values_mut() {
            handled |= manager.handle(&reply, &mut outbox);
        }
        self.flush(outbox);
        if !handled && !queried {
            log::debug!("No category handled {}", reply.address);
        }
        self.report_progress();
    }

    /// Runs timers that are due.
    pub fn poll(&mut self, now: Instant) {
        if self.heartbeat.missed(now) {
            log::warn!(
                "{} missed {} heartbeat(s)",
                self.console,
                self.heartbeat.counter()
            );
            self.set_state(ConnectionState::Unresponsive);
        }
        if self.heartbeat.is_due(now) {
            self.send(self.heartbeat.message());
            self.heartbeat.sent(now);
        }
        if self.next_sweep.is_some_and(|at| now >= at) {
            self.sweep(now);
            self.next_sweep = Some(now + self.sweep_interval());
        }
    }

    fn sweep_interval(&self) -> Duration {
        (self.settings.partial_expiry / 2).max(Duration::from_millis(100))
    }

    fn sweep(&mut self, now: Instant) {
        for (target, manager) in self.managers.iter_mut() {
            for record in manager.expire(now, self.settings.partial_expiry) {
                self.events.push(SessionEvent::IncompleteRecord {
                    target: *target,
                    uuid: record.uuid,
                    path: record.path,
                    received: record.received,
                    expected: record.expected,
                });
            }
        }
        self.report_progress();
    }

    fn responsive(&mut self, now: Instant) {
        if self.state == ConnectionState::Responsive {
            return;
        }
        self.set_state(ConnectionState::Responsive);
        if !self.system_filters {
            self.system_filters = true;
            let changes = FilterChanges::install(SYSTEM_FILTERS);
            changes.apply(&mut self.active_filters);
            self.outbox.extend(changes.packet());
            self.send(EosMessage::request(VERSION_REQUEST));
        }
        self.reconcile(now);
    }

    /// Brings installed filters and managers in line with the subscription.
    fn reconcile(&mut self, now: Instant) {
        if self.state != ConnectionState::Responsive || self.applied == self.subscribed {
            return;
        }

        let changes = FilterChanges::between(&self.applied, &self.subscribed);
        changes.apply(&mut self.active_filters);
        self.outbox.extend(changes.packet());

        let removed: Vec<RecordTarget> = self.applied.difference(&self.subscribed).copied().collect();
        for target in removed {
            self.reported.remove(&target);
            if let Some(manager) = self.managers.remove(&target) {
                if !manager.is_synchronized() {
                    log::info!("{}: synchronization abandoned", target);
                    self.events.push(SessionEvent::SyncAbandoned { target });
                }
            }
        }

        let added: Vec<RecordTarget> = self.subscribed.difference(&self.applied).copied().collect();
        for target in added {
            log::info!("{}: synchronizing", target);
            let mut manager = manager_for(target);
            let mut outbox = Outbox::new(now);
            manager.synchronize(&mut outbox);
            self.flush(outbox);
            self.managers.insert(target, manager);
        }

        self.applied = self.subscribed.clone();
        self.report_progress();
    }

    fn report_progress(&mut self) {
        for (target, manager) in &self.managers {
            let reported = self.reported.entry(*target).or_default();
            let fraction = manager.progress().fraction();
            let finished = manager.is_synchronized();

            let moved = match reported.fraction {
                None => manager.progress().total().is_some(),
                Some(last) => (fraction - last).abs() >= PROGRESS_STEP || (finished && last < 1.0),
            };
            if moved {
                reported.fraction = Some(fraction);
                self.events.push(SessionEvent::Progress {
                    target: *target,
                    fraction,
                    stage: manager.stage(),
                });
            }
            if finished && !reported.synchronized {
                reported.synchronized = true;
                log::info!("{}: synchronized", target);
                self.events.push(SessionEvent::Synchronized { target: *target });
            }
        }
    }

    fn set_state(&mut self, state: ConnectionState) {
        if self.state == state {
            return;
        }
        log::info!("{}: {} -> {}", self.console.name, self.state, state);
        self.state = state;
        self.events.push(SessionEvent::StateChanged { state });
    }

    fn send(&mut self, message: EosMessage) {
        self.outbox.push(Packet::Message(message));
    }

    fn flush(&mut self, mut outbox: Outbox) {
        self.outbox
            .extend(outbox.take().into_iter().map(Packet::Message));
    }
}
