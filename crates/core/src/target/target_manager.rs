use std::collections::{HashMap, HashSet};
use std::time::Duration;

use eoslink_records::number::{expand_all, format_number};
use eoslink_records::{locate, EosMessage, Record, RecordSpec, RecordTarget, REPLY_PREFIX};
use tokio::time::Instant;
use uuid::Uuid;

use super::{IncompleteRecord, Outbox, Progress, Reassembler, TargetSnapshot, TargetSync};
use crate::address::AddressSpace;

type Handler = fn(&mut TargetManager, &EosMessage, &mut Outbox);

/// Synchronizes one record category that needs no hierarchy: count, fetch
/// each index, reassemble, then follow notifies.
pub struct TargetManager {
    spec: RecordSpec,
    records: HashMap<Uuid, Record>,
    reassembler: Reassembler,
    progress: Progress,
    /// Display numbers already counted towards the bulk fetch.
    counted: HashSet<u64>,
    syncing: bool,
    changed: bool,
    methods: AddressSpace<Handler>,
}

impl TargetManager {
    /// Returns `None` for categories that need a specialised manager.
    pub fn new(target: RecordTarget) -> Option<Self> {
        let spec = RecordSpec::for_target(target)?;
        let part = target.part();

        let mut methods: AddressSpace<Handler> = AddressSpace::new();
        for filter in target.filters() {
            let pattern = filter.trim_start_matches(REPLY_PREFIX);
            let handler: Handler = if pattern.starts_with("/notify/") {
                Self::on_notify
            } else if pattern.ends_with("/count") {
                Self::on_count
            } else {
                Self::on_record
            };
            methods.register(pattern, handler);
        }
        // Bare replies to a fetch by number for a record that no longer exists.
        methods.register(&format!("/get/{}/*", part), Self::on_record);

        Some(Self {
            spec,
            records: HashMap::new(),
            reassembler: Reassembler::new(target.satellites()),
            progress: Progress::new(),
            counted: HashSet::new(),
            syncing: false,
            changed: false,
            methods,
        })
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn get(&self, uuid: &Uuid) -> Option<&Record> {
        self.records.get(uuid)
    }

    /// Records currently holding `number`.
    pub fn with_number(&self, number: f64) -> impl Iterator<Item = &Record> {
        self.records
            .values()
            .filter(move |record| record.number() == number)
    }

    fn on_count(&mut self, message: &EosMessage, outbox: &mut Outbox) {
        let Some(count) = message.uint(0) else {
            log::debug!("Ignoring malformed count {}", message);
            return;
        };
        log::info!("{}: fetching {} records", self.spec.target, count);
        self.progress.set_total(u64::from(count));
        self.counted.clear();
        let part = self.spec.target.part();
        for index in 0..count {
            outbox.request(format!("/get/{}/index/{}", part, index));
        }
        self.finish_if_done();
    }

    fn on_record(&mut self, message: &EosMessage, outbox: &mut Outbox) {
        let Some(located) = locate(self.spec.target.part(), message) else {
            log::debug!("Ignoring unexpected reply {}", message.address);
            return;
        };

        if message.arguments.is_empty() {
            let number = located.number();
            let sub_number = located.number_at(1);
            let before = self.records.len();
            self.records.retain(|_, record| match (number, sub_number) {
                (None, _) => false,
                (Some(n), None) => record.number() != n,
                (Some(n), Some(sub)) => {
                    record.number() != n || f64::from(record.sub_number()) != sub
                }
            });
            if self.records.len() != before {
                log::info!(
                    "{}: removed {} at {}",
                    self.spec.target,
                    before - self.records.len(),
                    located.path.join("/")
                );
                self.changed = true;
            }
            return;
        }

        let Some(partial) = self.reassembler.push(located, message.clone(), outbox.now()) else {
            return;
        };
        let number = partial.number().unwrap_or(0.0);
        match (self.spec.build)(&partial) {
            Some(record) => {
                log::debug!("{}: stored {} ({})", self.spec.target, format_number(number), record.uuid());
                self.records.insert(record.uuid(), record);
                self.changed = true;
            }
            None => log::debug!(
                "{}: discarding malformed record at {}",
                self.spec.target,
                partial.path.join("/")
            ),
        }
        self.count(number);
    }

    fn on_notify(&mut self, message: &EosMessage, outbox: &mut Outbox) {
        let part = self.spec.target.part();
        if !self.spec.target.is_counted() {
            outbox.request(format!("/get/{}", part));
            return;
        }
        for number in expand_all(message.arguments.iter().skip(1)) {
            let known: Vec<Uuid> = self.with_number(number).map(Record::uuid).collect();
            if known.is_empty() {
                outbox.request(format!("/get/{}/{}", part, format_number(number)));
            } else {
                for uuid in known {
                    outbox.request(format!("/get/{}/uid/{}", part, uuid));
                }
            }
        }
    }

    /// Counts `number` once towards the running bulk fetch.
    fn count(&mut self, number: f64) {
        if self.syncing && self.counted.insert(number.to_bits()) {
            self.progress.advance();
            self.finish_if_done();
        }
    }

    fn finish_if_done(&mut self) {
        if self.syncing && self.progress.is_finished() {
            self.syncing = false;
            log::info!(
                "{}: synchronized {} records",
                self.spec.target,
                self.records.len()
            );
        }
    }
}

impl TargetSync for TargetManager {
    fn target(&self) -> RecordTarget {
        self.spec.target
    }

    fn synchronize(&mut self, outbox: &mut Outbox) {
        self.records.clear();
        self.reassembler.clear();
        self.progress.reset();
        self.counted.clear();
        self.syncing = true;
        self.changed = true;

        let part = self.spec.target.part();
        if self.spec.target.is_counted() {
            outbox.request(format!("/get/{}/count", part));
        } else {
            self.progress.set_total(1);
            outbox.request(format!("/get/{}", part));
        }
    }

    fn handle(&mut self, message: &EosMessage, outbox: &mut Outbox) -> bool {
        match self.methods.lookup(&message.address).copied() {
            Some(handler) => {
                handler(self, message, outbox);
                true
            }
            None => false,
        }
    }

    fn progress(&self) -> &Progress {
        &self.progress
    }

    fn stage(&self) -> String {
        match self.progress.total() {
            None => format!("{}: counting", self.spec.target),
            Some(total) => format!(
                "{}: {} of {}",
                self.spec.target,
                self.progress.completed(),
                total
            ),
        }
    }

    fn take_changed(&mut self) -> bool {
        std::mem::take(&mut self.changed)
    }

    fn snapshot(&self) -> TargetSnapshot {
        let mut records: Vec<Record> = self.records.values().cloned().collect();
        records.sort_by(|a, b| {
            a.number()
                .total_cmp(&b.number())
                .then(a.sub_number().cmp(&b.sub_number()))
        });
        TargetSnapshot::Records(records)
    }

    fn expire(&mut self, now: Instant, max_age: Duration) -> Vec<IncompleteRecord> {
        let expired = self.reassembler.expire(now, max_age);
        let mut incomplete = Vec::with_capacity(expired.len());
        for record in expired {
            log::warn!(
                "{}: record {} at {} incomplete after {:?} ({} of {} messages)",
                self.spec.target,
                record.uuid,
                record.path.join("/"),
                max_age,
                record.received,
                self.spec.step_count
            );
            let number = record
                .path
                .first()
                .and_then(|n| n.parse::<f64>().ok())
                .unwrap_or(0.0);
            self.count(number);
            incomplete.push(IncompleteRecord::from_expired(record, self.spec.step_count));
        }
        incomplete
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use eoslink_records::Argument;

    fn reply(address: &str, id: Uuid, rest: Vec<Argument>) -> EosMessage {
        let mut arguments = vec![Argument::Int(0), Argument::String(id.to_string())];
        arguments.extend(rest);
        EosMessage::new(address, arguments)
    }

    fn group_messages(number: u32, id: Uuid, label: &str) -> Vec<EosMessage> {
        vec![
            reply(
                &format!("/get/group/{}/list/0/1", number),
                id,
                vec![Argument::from(label)],
            ),
            reply(
                &format!("/get/group/{}/channels/list/0/1", number),
                id,
                vec![Argument::from("1-4")],
            ),
        ]
    }

    fn groups(manager: &TargetManager) -> Vec<(f64, String)> {
        manager
            .snapshot()
            .records()
            .iter()
            .map(|record| match record {
                Record::Group(group) => (group.number, group.label.clone()),
                other => panic!("unexpected record {:?}", other),
            })
            .collect()
    }

    fn synchronized_manager(count: u32) -> (TargetManager, Outbox) {
        let mut manager = TargetManager::new(RecordTarget::Group).unwrap();
        let mut outbox = Outbox::new(Instant::now());
        manager.synchronize(&mut outbox);
        manager.handle(
            &EosMessage::new("/get/group/count", vec![Argument::Int(count as i32)]),
            &mut outbox,
        );
        (manager, outbox)
    }

    #[test]
    fn test_synchronize_requests_count() {
        let mut manager = TargetManager::new(RecordTarget::Group).unwrap();
        let mut outbox = Outbox::new(Instant::now());
        manager.synchronize(&mut outbox);
        assert_eq!(outbox.messages()[0].address, "/eos/get/group/count");
        assert!(!manager.is_synchronized());
    }

    #[test]
    fn test_count_requests_each_index() {
        let (manager, outbox) = synchronized_manager(3);
        let addresses: Vec<&str> = outbox.messages().iter().map(|m| m.address.as_str()).collect();
        assert_eq!(
            addresses,
            vec![
                "/eos/get/group/count",
                "/eos/get/group/index/0",
                "/eos/get/group/index/1",
                "/eos/get/group/index/2",
            ]
        );
        assert_eq!(manager.progress().fraction(), 0.0);
    }

    #[test]
    fn test_zero_count_completes_immediately() {
        let (manager, _) = synchronized_manager(0);
        assert!(manager.is_synchronized());
    }

    #[test]
    fn test_record_needs_every_step() {
        let (mut manager, mut outbox) = synchronized_manager(1);
        let id = Uuid::new_v4();
        let messages = group_messages(1, id, "Front");

        manager.handle(&messages[1], &mut outbox);
        assert!(manager.is_empty());
        assert!(!manager.is_synchronized());

        manager.handle(&messages[0], &mut outbox);
        assert_eq!(groups(&manager), vec![(1.0, "Front".to_string())]);
        assert!(manager.is_synchronized());
        assert!(manager.take_changed());
        assert!(!manager.take_changed());
    }

    #[test]
    fn test_number_change_updates_in_place() {
        let (mut manager, mut outbox) = synchronized_manager(1);
        let id = Uuid::new_v4();
        for message in group_messages(1, id, "Front") {
            manager.handle(&message, &mut outbox);
        }
        for message in group_messages(7, id, "Front") {
            manager.handle(&message, &mut outbox);
        }
        assert_eq!(groups(&manager), vec![(7.0, "Front".to_string())]);
        assert!(manager.get(&id).is_some());
    }

    #[test]
    fn test_notify_refetches_by_uid_or_number() {
        let (mut manager, mut outbox) = synchronized_manager(1);
        let id = Uuid::new_v4();
        for message in group_messages(2, id, "Side") {
            manager.handle(&message, &mut outbox);
        }
        outbox.take();

        manager.handle(
            &EosMessage::new(
                "/notify/group/list/0/1",
                vec![Argument::Int(12), Argument::from("1-3")],
            ),
            &mut outbox,
        );
        let addresses: Vec<String> = outbox.take().into_iter().map(|m| m.address).collect();
        assert_eq!(
            addresses,
            vec![
                "/eos/get/group/1".to_string(),
                format!("/eos/get/group/uid/{}", id),
                "/eos/get/group/3".to_string(),
            ]
        );
    }

    #[test]
    fn test_empty_reply_removes_record() {
        let (mut manager, mut outbox) = synchronized_manager(2);
        let first = Uuid::new_v4();
        let second = Uuid::new_v4();
        for message in group_messages(4, first, "Back")
            .into_iter()
            .chain(group_messages(5, second, "Top"))
        {
            manager.handle(&message, &mut outbox);
        }
        manager.take_changed();

        manager.handle(&EosMessage::request("/get/group/4/list/0/0"), &mut outbox);
        assert_eq!(groups(&manager), vec![(5.0, "Top".to_string())]);
        assert!(manager.take_changed());

        manager.handle(&EosMessage::request("/get/group/4"), &mut outbox);
        assert_eq!(manager.len(), 1);
        assert!(!manager.take_changed());
    }

    #[test]
    fn test_malformed_record_is_dropped_but_counted() {
        let (mut manager, mut outbox) = synchronized_manager(1);
        let id = Uuid::new_v4();
        manager.handle(
            &reply("/get/group/1/list/0/1", id, vec![Argument::Int(3)]),
            &mut outbox,
        );
        manager.handle(
            &reply("/get/group/1/channels/list/0/1", id, vec![]),
            &mut outbox,
        );
        assert!(manager.is_empty());
        assert!(manager.is_synchronized());
    }

    #[test]
    fn test_expired_partial_is_reported() {
        let (mut manager, mut outbox) = synchronized_manager(1);
        let id = Uuid::new_v4();
        manager.handle(&group_messages(1, id, "Stuck")[0], &mut outbox);

        let later = outbox.now() + Duration::from_secs(30);
        let incomplete = manager.expire(later, Duration::from_secs(10));
        assert_eq!(incomplete.len(), 1);
        assert_eq!(incomplete[0].uuid, id);
        assert_eq!((incomplete[0].received, incomplete[0].expected), (1, 2));
        assert!(manager.is_synchronized());
        assert!(manager.is_empty());
    }

    #[test]
    fn test_setup_is_fetched_directly() {
        let mut manager = TargetManager::new(RecordTarget::Setup).unwrap();
        let mut outbox = Outbox::new(Instant::now());
        manager.synchronize(&mut outbox);
        assert_eq!(outbox.take()[0].address, "/eos/get/setup");

        let id = Uuid::new_v4();
        manager.handle(
            &reply(
                "/get/setup/list/0/1",
                id,
                (1..=5).map(|n| Argument::Int(n * 1000)).collect(),
            ),
            &mut outbox,
        );
        assert!(manager.is_synchronized());
        assert_eq!(manager.len(), 1);
    }

    #[test]
    fn test_cue_has_no_generic_manager() {
        assert!(TargetManager::new(RecordTarget::Cue).is_none());
    }
}
