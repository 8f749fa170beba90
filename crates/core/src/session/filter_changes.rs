use std::collections::BTreeSet;

use eoslink_records::{filters, Argument, EosMessage, RecordTarget};

use crate::transport::Packet;

/// Replies the session itself depends on, installed once the console first
/// answers a heartbeat.
pub const SYSTEM_FILTERS: [&str; 4] = [
    "/eos/out/get/version",
    "/eos/out/ping",
    "/eos/out/filter/add",
    "/eos/out/filter/remove",
];

pub const FILTER_ADD: &str = "/eos/filter/add";
pub const FILTER_REMOVE: &str = "/eos/filter/remove";

/// Filter patterns to install and remove when the subscribed categories
/// change.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FilterChanges {
    pub add: BTreeSet<String>,
    pub remove: BTreeSet<String>,
}

impl FilterChanges {
    /// Patterns still wanted by a category in `new` are never removed, and
    /// patterns already wanted by a category in `old` are never re-added.
    pub fn between(old: &BTreeSet<RecordTarget>, new: &BTreeSet<RecordTarget>) -> Self {
        let old_filters = filters(old);
        let new_filters = filters(new);
        let added = filters(new.difference(old));
        let removed = filters(old.difference(new));

        Self {
            add: added.difference(&old_filters).cloned().collect(),
            remove: removed.difference(&new_filters).cloned().collect(),
        }
    }

    /// Changes installing `patterns` from scratch.
    pub fn install<I, S>(patterns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            add: patterns.into_iter().map(Into::into).collect(),
            remove: BTreeSet::new(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.add.is_empty() && self.remove.is_empty()
    }

    /// Applies the changes to a set of installed patterns.
    pub fn apply(&self, installed: &mut BTreeSet<String>) {
        installed.retain(|pattern| !self.remove.contains(pattern));
        installed.extend(self.add.iter().cloned());
    }

    pub fn messages(&self) -> Vec<EosMessage> {
        let mut messages = Vec::new();
        if !self.add.is_empty() {
            messages.push(filter_message(FILTER_ADD, &self.add));
        }
        if !self.remove.is_empty() {
            messages.push(filter_message(FILTER_REMOVE, &self.remove));
        }
        messages
    }

    /// One packet carrying every change; a bundle when both sets are non-empty.
    pub fn packet(&self) -> Option<Packet> {
        Packet::from_messages(self.messages())
    }
}

fn filter_message(address: &str, patterns: &BTreeSet<String>) -> EosMessage {
    EosMessage::new(
        address,
        patterns
            .iter()
            .map(|pattern| Argument::String(pattern.clone()))
            .collect(),
    )
}
