use std::time::Duration;

use eoslink_records::{Cue, CueList, EosMessage, Record, RecordTarget, REQUEST_PREFIX};
use serde::Serialize;
use tokio::time::Instant;
use uuid::Uuid;

pub mod progress;
pub mod reassembler;
pub mod target_manager;

pub use progress::Progress;
pub use reassembler::{Expired, Reassembler};
pub use target_manager::TargetManager;

/// Requests produced while handling one message, stamped with the time the
/// message arrived.
#[derive(Debug)]
pub struct Outbox {
    now: Instant,
    messages: Vec<EosMessage>,
}

impl Outbox {
    pub fn new(now: Instant) -> Self {
        Self {
            now,
            messages: Vec::new(),
        }
    }

    pub fn now(&self) -> Instant {
        self.now
    }

    /// Queue a `get` style request; `address` is given without the request
    /// prefix, e.g. `/get/group/count`.
    pub fn request(&mut self, address: impl AsRef<str>) {
        self.messages.push(EosMessage::request(format!(
            "{}{}",
            REQUEST_PREFIX,
            address.as_ref()
        )));
    }

    pub fn messages(&self) -> &[EosMessage] {
        &self.messages
    }

    pub fn take(&mut self) -> Vec<EosMessage> {
        std::mem::take(&mut self.messages)
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }
}

/// A cue list together with its cues in ascending number order.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CueListSnapshot {
    pub list: CueList,
    pub cues: Vec<Cue>,
}

/// Read-only copy of one category's collection.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum TargetSnapshot {
    /// Records ordered by display number.
    Records(Vec<Record>),
    /// Cue lists ordered by number.
    CueLists(Vec<CueListSnapshot>),
}

impl TargetSnapshot {
    pub fn len(&self) -> usize {
        match self {
            TargetSnapshot::Records(records) => records.len(),
            TargetSnapshot::CueLists(lists) => lists.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn records(&self) -> &[Record] {
        match self {
            TargetSnapshot::Records(records) => records,
            TargetSnapshot::CueLists(_) => &[],
        }
    }

    pub fn cue_lists(&self) -> &[CueListSnapshot] {
        match self {
            TargetSnapshot::CueLists(lists) => lists,
            TargetSnapshot::Records(_) => &[],
        }
    }
}

/// A record that never received all of its messages.
#[derive(Debug, Clone, PartialEq)]
pub struct IncompleteRecord {
    pub uuid: Uuid,
    pub path: String,
    pub received: usize,
    pub expected: usize,
}

impl IncompleteRecord {
    pub fn from_expired(expired: Expired, expected: usize) -> Self {
        Self {
            uuid: expired.uuid,
            path: expired.path.join("/"),
            received: expired.received,
            expected,
        }
    }
}

/// One synchronized record category.
///
/// Implementations own their collection; the session only feeds them replies
/// (stripped of the reply prefix) and reads progress and snapshots back.
pub trait TargetSync: Send {
    fn target(&self) -> RecordTarget;

    /// Drop everything held and start a fresh bulk fetch.
    fn synchronize(&mut self, outbox: &mut Outbox);

    /// Handle a reply. Returns false when no registered pattern matched.
    fn handle(&mut self, message: &EosMessage, outbox: &mut Outbox) -> bool;

    fn progress(&self) -> &Progress;

    /// Human readable description of the current fetch.
    fn stage(&self) -> String;

    fn is_synchronized(&self) -> bool {
        self.progress().is_finished()
    }

    /// Whether the collection changed since the last call.
    fn take_changed(&mut self) -> bool;

    fn snapshot(&self) -> TargetSnapshot;

    /// Drop partial records older than `max_age`.
    fn expire(&mut self, now: Instant, max_age: Duration) -> Vec<IncompleteRecord>;
}

/// Creates the manager responsible for `target`.
pub fn manager_for(target: RecordTarget) -> Box<dyn TargetSync> {
    match TargetManager::new(target) {
        Some(manager) => Box::new(manager),
        None => Box::new(crate::cue::CueManager::new()),
    }
}
