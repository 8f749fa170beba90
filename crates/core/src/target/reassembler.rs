use std::collections::HashMap;
use std::time::Duration;

use eoslink_records::{EosMessage, Located, PartialRecord, Step};
use tokio::time::Instant;
use uuid::Uuid;

struct Pending {
    partial: PartialRecord,
    started: Instant,
}

/// A partial record dropped by [`Reassembler::expire`].
#[derive(Debug, Clone, PartialEq)]
pub struct Expired {
    pub uuid: Uuid,
    pub path: Vec<String>,
    pub received: usize,
}

/// Collects the messages of multi-message records, keyed by identifier.
pub struct Reassembler {
    step_count: usize,
    satellites: &'static [&'static str],
    pending: HashMap<Uuid, Pending>,
}

impl Reassembler {
    pub fn new(satellites: &'static [&'static str]) -> Self {
        Self {
            step_count: satellites.len() + 1,
            satellites,
            pending: HashMap::new(),
        }
    }

    pub fn step_count(&self) -> usize {
        self.step_count
    }

    /// Adds one message. Returns the partial set once every step is present;
    /// the buffer is dropped at that point whatever the caller does with it.
    ///
    /// A message reporting a different path than the buffered ones for the
    /// same identifier restarts the buffer.
    pub fn push(&mut self, located: Located, message: EosMessage, now: Instant) -> Option<PartialRecord> {
        let Some(uuid) = message.uuid() else {
            log::debug!("Dropping {}: no record identifier", message.address);
            return None;
        };
        if let Step::Satellite(name) = &located.step {
            if !self.satellites.contains(&name.as_str()) {
                log::debug!("Dropping {}: unexpected step '{}'", message.address, name);
                return None;
            }
        }

        let pending = self.pending.entry(uuid).or_insert_with(|| Pending {
            partial: PartialRecord::new(located.path.clone()),
            started: now,
        });
        if pending.partial.path != located.path {
            log::debug!(
                "Record {} moved from {:?} to {:?}, restarting",
                uuid,
                pending.partial.path,
                located.path
            );
            pending.partial = PartialRecord::new(located.path.clone());
            pending.started = now;
        }
        pending.partial.insert(located.step, message);

        if pending.partial.len() >= self.step_count {
            return self.pending.remove(&uuid).map(|pending| pending.partial);
        }
        None
    }

    /// Drops buffers started more than `max_age` before `now`.
    pub fn expire(&mut self, now: Instant, max_age: Duration) -> Vec<Expired> {
        let mut expired = Vec::new();
        self.pending.retain(|uuid, pending| {
            if now.saturating_duration_since(pending.started) < max_age {
                return true;
            }
            expired.push(Expired {
                uuid: *uuid,
                path: pending.partial.path.clone(),
                received: pending.partial.len(),
            });
            false
        });
        expired
    }

    pub fn clear(&mut self) {
        self.pending.clear();
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }
}
