use std::collections::HashMap;

use eoslink_records::EosMessage;
use tokio::sync::oneshot;

/// Outstanding queries keyed by reply address, one caller per address.
#[derive(Debug, Default)]
pub struct PendingRequests {
    requests: HashMap<String, oneshot::Sender<EosMessage>>,
}

impl PendingRequests {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `reply` for `address`. An earlier caller waiting on the same
    /// address is dropped and observes a closed channel. Returns true when
    /// that happened.
    pub fn insert(&mut self, address: impl Into<String>, reply: oneshot::Sender<EosMessage>) -> bool {
        self.requests.insert(address.into(), reply).is_some()
    }

    pub fn complete(&mut self, address: &str) -> Option<oneshot::Sender<EosMessage>> {
        self.requests.remove(address)
    }

    pub fn clear(&mut self) {
        self.requests.clear();
    }

    pub fn len(&self) -> usize {
        self.requests.len()
    }

    pub fn is_empty(&self) -> bool {
        self.requests.is_empty()
    }
}
