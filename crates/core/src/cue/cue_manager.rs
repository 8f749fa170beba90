use std::collections::{BTreeMap, HashMap, HashSet};
use std::time::Duration;

use eoslink_records::number::{expand_all, format_number};
use eoslink_records::{
    locate, Cue, CueList, CuePart, EosMessage, PartialRecord, RecordTarget, REPLY_PREFIX,
};
use tokio::time::Instant;
use uuid::Uuid;

use crate::address::AddressSpace;
use crate::target::{
    CueListSnapshot, IncompleteRecord, Outbox, Progress, Reassembler, TargetSnapshot, TargetSync,
};

type Handler = fn(&mut CueManager, &EosMessage, &mut Outbox);

struct CueListEntry {
    list: CueList,
    /// Ascending by cue number.
    cues: Vec<Cue>,
}

/// A cue whose own messages are complete but whose parts are still arriving.
struct PendingCue {
    cue: Cue,
    parts: BTreeMap<u32, CuePart>,
    started: Instant,
}

/// Synchronizes cue lists and the cues inside them.
///
/// Lists are counted and fetched first. Each list that arrives triggers a
/// count of its cues, and each cue declaring parts triggers a count of its
/// parts; a cue only becomes visible once every part has arrived.
pub struct CueManager {
    lists: HashMap<Uuid, CueListEntry>,
    list_messages: Reassembler,
    cue_messages: Reassembler,
    pending: HashMap<Uuid, PendingCue>,
    /// One child per list, keyed by list number.
    progress: Progress,
    counted_lists: HashSet<u32>,
    counted_cues: HashSet<(u32, u64)>,
    syncing: bool,
    changed: bool,
    methods: AddressSpace<Handler>,
}

impl Default for CueManager {
    fn default() -> Self {
        Self::new()
    }
}

impl CueManager {
    pub fn new() -> Self {
        let mut methods: AddressSpace<Handler> = AddressSpace::new();
        for filter in RecordTarget::Cue.filters() {
            let pattern = filter.trim_start_matches(REPLY_PREFIX);
            let handler: Handler = if pattern.starts_with("/notify/cuelist/") {
                Self::on_list_notify
            } else if pattern.starts_with("/notify/cue/") {
                Self::on_cue_notify
            } else if pattern == "/get/cuelist/count" {
                Self::on_list_count
            } else if pattern.starts_with("/get/cuelist/") {
                Self::on_list
            } else if pattern.ends_with("/noparts/count") {
                Self::on_cue_count
            } else if pattern.ends_with("/count") {
                Self::on_part_count
            } else {
                Self::on_cue
            };
            methods.register(pattern, handler);
        }
        // Bare replies to fetches by number for records that no longer exist.
        methods.register("/get/cuelist/*", Self::on_list);
        methods.register("/get/cue/*/*", Self::on_cue);

        Self {
            lists: HashMap::new(),
            list_messages: Reassembler::new(RecordTarget::CueList.satellites()),
            cue_messages: Reassembler::new(RecordTarget::Cue.satellites()),
            pending: HashMap::new(),
            progress: Progress::new(),
            counted_lists: HashSet::new(),
            counted_cues: HashSet::new(),
            syncing: false,
            changed: false,
            methods,
        }
    }

    pub fn list(&self, number: u32) -> Option<&CueList> {
        self.entry(number).map(|entry| &entry.list)
    }

    /// Cues of list `number` in ascending order.
    pub fn cues(&self, number: u32) -> &[Cue] {
        self.entry(number)
            .map(|entry| entry.cues.as_slice())
            .unwrap_or_default()
    }

    pub fn cue(&self, list: u32, number: f64) -> Option<&Cue> {
        self.cues(list).iter().find(|cue| cue.number == number)
    }

    /// Number of cues waiting for their parts.
    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    fn entry(&self, number: u32) -> Option<&CueListEntry> {
        self.lists.values().find(|entry| entry.list.number == number)
    }

    fn entry_mut(&mut self, number: u32) -> Option<&mut CueListEntry> {
        self.lists.values_mut().find(|entry| entry.list.number == number)
    }

    fn on_list_count(&mut self, message: &EosMessage, outbox: &mut Outbox) {
        let Some(count) = message.uint(0) else {
            log::debug!("Ignoring malformed count {}", message);
            return;
        };
        log::info!("{}: fetching {} lists", RecordTarget::CueList, count);
        self.progress.set_total(u64::from(count));
        self.counted_lists.clear();
        self.counted_cues.clear();
        for index in 0..count {
            outbox.request(format!("/get/cuelist/index/{}", index));
        }
    }

    fn on_list(&mut self, message: &EosMessage, outbox: &mut Outbox) {
        let Some(located) = locate("cuelist", message) else {
            return;
        };
        let Some(number) = located.number().and_then(list_number) else {
            log::debug!("Ignoring cue list reply {}", message.address);
            return;
        };

        if message.arguments.is_empty() {
            self.remove_list(number);
            return;
        }

        let Some(partial) = self.list_messages.push(located, message.clone(), outbox.now()) else {
            return;
        };
        match CueList::from_partial(&partial) {
            Some(list) => self.store_list(list, outbox),
            None => {
                log::debug!("Discarding malformed cue list {}", number);
                self.count_list(number, false);
            }
        }
    }

    fn store_list(&mut self, list: CueList, outbox: &mut Outbox) {
        let number = list.number;
        match self.lists.get_mut(&list.uuid) {
            Some(entry) => {
                let previous = entry.list.number;
                entry.list = list;
                if previous != number {
                    log::info!("Cue list {} renumbered to {}", previous, number);
                    entry.cues.clear();
                    self.pending.retain(|_, pending| pending.cue.list != previous);
                    outbox.request(format!("/get/cue/{}/noparts/count", number));
                }
            }
            None => {
                self.lists.retain(|_, entry| entry.list.number != number);
                self.pending.retain(|_, pending| pending.cue.list != number);
                self.lists.insert(
                    list.uuid,
                    CueListEntry {
                        list,
                        cues: Vec::new(),
                    },
                );
                outbox.request(format!("/get/cue/{}/noparts/count", number));
            }
        }
        self.changed = true;
        self.count_list(number, true);
    }

    fn remove_list(&mut self, number: u32) {
        let before = self.lists.len();
        self.lists.retain(|_, entry| entry.list.number != number);
        self.pending.retain(|_, pending| pending.cue.list != number);
        if self.lists.len() != before {
            log::info!("Cue list {} removed", number);
            self.changed = true;
        }
    }

    fn on_list_notify(&mut self, message: &EosMessage, outbox: &mut Outbox) {
        for number in expand_all(message.arguments.iter().skip(1)) {
            let known = list_number(number).and_then(|n| self.entry(n));
            match known {
                Some(entry) => outbox.request(format!("/get/cuelist/uid/{}", entry.list.uuid)),
                None => outbox.request(format!("/get/cuelist/{}", format_number(number))),
            }
        }
    }

    fn on_cue_count(&mut self, message: &EosMessage, outbox: &mut Outbox) {
        let (Some(list), Some(count)) = (
            message.address_number(2).and_then(list_number),
            message.uint(0),
        ) else {
            log::debug!("Ignoring malformed count {}", message);
            return;
        };
        if self.entry(list).is_none() {
            log::debug!("Ignoring cue count for unknown list {}", list);
            return;
        }
        if let Some(progress) = self.list_progress(list) {
            progress.set_total(u64::from(count));
        }
        self.counted_cues.retain(|(counted, _)| *counted != list);
        for index in 0..count {
            outbox.request(format!("/get/cue/{}/noparts/index/{}", list, index));
        }
    }

    fn on_cue(&mut self, message: &EosMessage, outbox: &mut Outbox) {
        let Some(mut located) = locate("cue", message) else {
            return;
        };
        // Part zero stands for the cue itself.
        if located.path.len() == 3 && located.number_at(2) == Some(0.0) {
            located.path.truncate(2);
        }
        let (Some(list), Some(number)) = (
            located.number().and_then(list_number),
            located.number_at(1),
        ) else {
            log::debug!("Ignoring cue reply {}", message.address);
            return;
        };
        let part = match located.path.len() {
            2 => None,
            3 => located.number_at(2),
            _ => {
                log::debug!("Ignoring cue reply {}", message.address);
                return;
            }
        };

        if message.arguments.is_empty() {
            self.remove_cue(list, number, part);
            return;
        }

        let Some(partial) = self.cue_messages.push(located, message.clone(), outbox.now()) else {
            return;
        };
        if part.is_some() {
            self.store_part(&partial);
        } else {
            self.store_cue(&partial, outbox);
        }
    }

    fn store_cue(&mut self, partial: &PartialRecord, outbox: &mut Outbox) {
        let Some(cue) = Cue::from_partial(partial) else {
            log::debug!("Discarding malformed cue {}", partial.path.join("/"));
            if let (Some(list), Some(number)) =
                (partial.number().and_then(list_number), partial.number_at(1))
            {
                self.count_cue(list, number);
            }
            return;
        };
        if self.entry(cue.list).is_none() {
            log::warn!(
                "Dropping cue {}/{}: list {} is unknown",
                cue.list,
                format_number(cue.number),
                cue.list
            );
            return;
        }
        if cue.part_count == 0 {
            self.insert_cue(cue);
            return;
        }
        if let Some(pending) = self.pending.get_mut(&cue.uuid) {
            pending.cue = cue;
            let uuid = pending.cue.uuid;
            self.finish_pending(uuid);
            return;
        }
        outbox.request(format!(
            "/get/cue/{}/{}/count",
            cue.list,
            format_number(cue.number)
        ));
        self.pending.insert(
            cue.uuid,
            PendingCue {
                cue,
                parts: BTreeMap::new(),
                started: outbox.now(),
            },
        );
    }

    fn on_part_count(&mut self, message: &EosMessage, outbox: &mut Outbox) {
        let (Some(list), Some(number), Some(count)) = (
            message.address_number(2).and_then(list_number),
            message.address_number(3),
            message.uint(0),
        ) else {
            log::debug!("Ignoring malformed count {}", message);
            return;
        };
        let Some(uuid) = self.pending_for(list, number) else {
            log::debug!(
                "Ignoring part count for cue {}/{}",
                list,
                format_number(number)
            );
            return;
        };
        if let Some(pending) = self.pending.get_mut(&uuid) {
            pending.cue.part_count = count;
        }
        for index in 0..count {
            outbox.request(format!(
                "/get/cue/{}/{}/index/{}",
                list,
                format_number(number),
                index
            ));
        }
        self.finish_pending(uuid);
    }

    fn store_part(&mut self, partial: &PartialRecord) {
        let Some(part) = CuePart::from_partial(partial) else {
            log::debug!("Discarding malformed cue part {}", partial.path.join("/"));
            return;
        };

        if let Some(uuid) = self.pending_for(part.list, part.cue) {
            if let Some(pending) = self.pending.get_mut(&uuid) {
                pending.parts.insert(part.number, part);
            }
            self.finish_pending(uuid);
            return;
        }

        let (list, cue_number) = (part.list, part.cue);
        let cue = self
            .entry_mut(list)
            .and_then(|entry| entry.cues.iter_mut().find(|cue| cue.number == cue_number));
        match cue {
            Some(cue) => {
                cue.parts.retain(|existing| existing.number != part.number);
                let index = cue.parts.partition_point(|existing| existing.number < part.number);
                cue.parts.insert(index, part);
                self.changed = true;
            }
            None => log::warn!(
                "Dropping part {} of cue {}/{}: cue is unknown",
                part.number,
                list,
                format_number(cue_number)
            ),
        }
    }

    fn pending_for(&self, list: u32, number: f64) -> Option<Uuid> {
        self.pending
            .iter()
            .find(|(_, pending)| pending.cue.list == list && pending.cue.number == number)
            .map(|(uuid, _)| *uuid)
    }

    /// Publishes a pending cue once it holds every declared part.
    fn finish_pending(&mut self, uuid: Uuid) {
        let complete = self
            .pending
            .get(&uuid)
            .is_some_and(|pending| pending.parts.len() as u64 >= u64::from(pending.cue.part_count));
        if !complete {
            return;
        }
        if let Some(pending) = self.pending.remove(&uuid) {
            let mut cue = pending.cue;
            cue.parts = pending.parts.into_values().collect();
            self.insert_cue(cue);
        }
    }

    fn insert_cue(&mut self, cue: Cue) {
        let (list, number) = (cue.list, cue.number);
        let Some(entry) = self.entry_mut(list) else {
            log::warn!(
                "Dropping cue {}/{}: list {} is unknown",
                list,
                format_number(number),
                list
            );
            return;
        };
        entry.cues.retain(|existing| existing.uuid != cue.uuid);
        let index = entry.cues.partition_point(|existing| existing.number < number);
        entry.cues.insert(index, cue);
        self.changed = true;
        self.count_cue(list, number);
    }

    fn remove_cue(&mut self, list: u32, number: f64, part: Option<f64>) {
        if part.is_none() {
            self.pending
                .retain(|_, pending| !(pending.cue.list == list && pending.cue.number == number));
        }
        let Some(entry) = self.entry_mut(list) else {
            return;
        };
        let removed = match part {
            None => {
                let before = entry.cues.len();
                entry.cues.retain(|cue| cue.number != number);
                entry.cues.len() != before
            }
            Some(part) => entry
                .cues
                .iter_mut()
                .find(|cue| cue.number == number)
                .map(|cue| {
                    let before = cue.parts.len();
                    cue.parts.retain(|existing| f64::from(existing.number) != part);
                    cue.parts.len() != before
                })
                .unwrap_or(false),
        };
        if removed {
            log::info!("Cue {}/{} removed", list, format_number(number));
            self.changed = true;
        }
    }

    fn on_cue_notify(&mut self, message: &EosMessage, outbox: &mut Outbox) {
        let Some(list) = message.address_number(2).and_then(list_number) else {
            return;
        };
        if self.entry(list).is_none() {
            log::debug!("Ignoring cue notify for unknown list {}", list);
            return;
        }
        for number in expand_all(message.arguments.iter().skip(1)) {
            match self.cue(list, number) {
                Some(cue) => outbox.request(format!("/get/cue/{}/uid/{}", list, cue.uuid)),
                None => outbox.request(format!("/get/cue/{}/{}", list, format_number(number))),
            }
        }
    }

    /// The progress child for `list`, only while a bulk fetch is running.
    fn list_progress(&mut self, list: u32) -> Option<&mut Progress> {
        let key = list.to_string();
        if !self.syncing || self.progress.get_child(&key).is_none() {
            return None;
        }
        Some(self.progress.child(key))
    }

    fn count_list(&mut self, number: u32, stored: bool) {
        if !self.syncing || !self.counted_lists.insert(number) {
            return;
        }
        if stored {
            self.progress.child(number.to_string());
        } else {
            self.progress.advance();
        }
    }

    fn count_cue(&mut self, list: u32, number: f64) {
        if self.syncing && self.counted_cues.insert((list, number.to_bits())) {
            if let Some(progress) = self.list_progress(list) {
                progress.advance();
            }
        }
    }
}

fn list_number(number: f64) -> Option<u32> {
    (number >= 0.0 && number.fract() == 0.0 && number <= f64::from(u32::MAX)).then_some(number as u32)
}

impl TargetSync for CueManager {
    fn target(&self) -> RecordTarget {
        RecordTarget::Cue
    }

    fn synchronize(&mut self, outbox: &mut Outbox) {
        self.lists.clear();
        self.list_messages.clear();
        self.cue_messages.clear();
        self.pending.clear();
        self.progress.reset();
        self.counted_lists.clear();
        self.counted_cues.clear();
        self.syncing = true;
        self.changed = true;
        outbox.request("/get/cuelist/count");
    }

    fn handle(&mut self, message: &EosMessage, outbox: &mut Outbox) -> bool {
        let Some(handler) = self.methods.lookup(&message.address).copied() else {
            return false;
        };
        handler(self, message, outbox);
        if self.syncing && self.progress.is_finished() {
            self.syncing = false;
            log::info!(
                "{}: synchronized {} lists, {} cues",
                RecordTarget::Cue,
                self.lists.len(),
                self.lists.values().map(|entry| entry.cues.len()).sum::<usize>()
            );
        }
        true
    }

    fn progress(&self) -> &Progress {
        &self.progress
    }

    fn stage(&self) -> String {
        match self.progress.total() {
            None => format!("{}: counting lists", RecordTarget::Cue),
            Some(total) => {
                let (done, cues) = self.progress.leaf_counts();
                format!(
                    "{}: {} of {} lists, {} of {} cues",
                    RecordTarget::Cue,
                    self.progress.children().filter(|(_, child)| child.is_finished()).count(),
                    total,
                    done,
                    cues
                )
            }
        }
    }

    fn take_changed(&mut self) -> bool {
        std::mem::take(&mut self.changed)
    }

    fn snapshot(&self) -> TargetSnapshot {
        let mut lists: Vec<CueListSnapshot> = self
            .lists
            .values()
            .map(|entry| CueListSnapshot {
                list: entry.list.clone(),
                cues: entry.cues.clone(),
            })
            .collect();
        lists.sort_by_key(|snapshot| snapshot.list.number);
        TargetSnapshot::CueLists(lists)
    }

    fn expire(&mut self, now: Instant, max_age: Duration) -> Vec<IncompleteRecord> {
        let mut incomplete = Vec::new();

        for expired in self.list_messages.expire(now, max_age) {
            log::warn!("Cue list {} incomplete after {:?}", expired.path.join("/"), max_age);
            if let Some(number) = expired
                .path
                .first()
                .and_then(|n| n.parse::<f64>().ok())
                .and_then(list_number)
            {
                self.count_list(number, false);
            }
            incomplete.push(IncompleteRecord::from_expired(
                expired,
                RecordTarget::CueList.step_count(),
            ));
        }

        for expired in self.cue_messages.expire(now, max_age) {
            log::warn!("Cue {} incomplete after {:?}", expired.path.join("/"), max_age);
            let list = expired
                .path
                .first()
                .and_then(|n| n.parse::<f64>().ok())
                .and_then(list_number);
            let number = expired.path.get(1).and_then(|n| n.parse::<f64>().ok());
            if let (Some(list), Some(number), 2) = (list, number, expired.path.len()) {
                self.count_cue(list, number);
            }
            incomplete.push(IncompleteRecord::from_expired(
                expired,
                RecordTarget::Cue.step_count(),
            ));
        }

        let stale: Vec<Uuid> = self
            .pending
            .iter()
            .filter(|(_, pending)| now.saturating_duration_since(pending.started) >= max_age)
            .map(|(uuid, _)| *uuid)
            .collect();
        for uuid in stale {
            let Some(pending) = self.pending.remove(&uuid) else {
                continue;
            };
            let cue = pending.cue;
            log::warn!(
                "Cue {}/{} received {} of {} parts after {:?}",
                cue.list,
                format_number(cue.number),
                pending.parts.len(),
                cue.part_count,
                max_age
            );
            self.count_cue(cue.list, cue.number);
            incomplete.push(IncompleteRecord {
                uuid,
                path: format!("{}/{}", cue.list, format_number(cue.number)),
                received: pending.parts.len(),
                expected: cue.part_count as usize,
            });
        }

        if self.syncing && self.progress.is_finished() {
            self.syncing = false;
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

    fn list_messages(number: u32, id: Uuid) -> Vec<EosMessage> {
        let mut head = vec![
            Argument::from("Main"),
            Argument::from("Normal"),
            Argument::from("Proportional"),
        ];
        head.extend((0..6).map(|_| Argument::Bool(false)));
        head.push(Argument::Int(0));
        head.push(Argument::Bool(false));
        vec![
            reply(&format!("/get/cuelist/{}/list/0/1", number), id, head),
            reply(&format!("/get/cuelist/{}/links/list/0/1", number), id, vec![]),
        ]
    }

    fn head_arguments(part_count: i32) -> Vec<Argument> {
        let mut arguments: Vec<Argument> = vec![Argument::from("Cue")];
        arguments.extend((0..10).map(|_| Argument::Int(0)));
        arguments.extend([
            Argument::Bool(false),
            Argument::Int(0),
            Argument::Int(100),
            Argument::from(""),
            Argument::from(""),
            Argument::from(""),
            Argument::Int(0),
            Argument::Int(-1),
            Argument::Int(-1),
            Argument::Bool(false),
            Argument::Int(0),
            Argument::Bool(false),
            Argument::from(""),
            Argument::Int(part_count),
            Argument::from(""),
            Argument::from(""),
            Argument::Bool(false),
        ]);
        arguments
    }

    /// Head plus satellites of a cue (`part` is None) or of one of its parts.
    fn cue_messages(
        list: u32,
        cue: &str,
        part: Option<u32>,
        id: Uuid,
        part_count: i32,
    ) -> Vec<EosMessage> {
        let base = match part {
            None => format!("/get/cue/{}/{}/noparts", list, cue),
            Some(part) => format!("/get/cue/{}/{}/{}", list, cue, part),
        };
        let mut messages = vec![reply(
            &format!("{}/list/0/1", base),
            id,
            head_arguments(part_count),
        )];
        for satellite in ["fx", "links", "actions"] {
            messages.push(reply(&format!("{}/{}/list/0/1", base, satellite), id, vec![]));
        }
        messages
    }

    fn feed(manager: &mut CueManager, outbox: &mut Outbox, messages: Vec<EosMessage>) {
        for message in messages {
            assert!(manager.handle(&message, outbox), "unhandled {}", message.address);
        }
    }

    fn addresses(outbox: &mut Outbox) -> Vec<String> {
        outbox.take().into_iter().map(|message| message.address).collect()
    }

    fn manager_with_list(cue_count: i32) -> (CueManager, Outbox) {
        let mut manager = CueManager::new();
        let mut outbox = Outbox::new(Instant::now());
        manager.synchronize(&mut outbox);
        feed(
            &mut manager,
            &mut outbox,
            vec![EosMessage::new("/get/cuelist/count", vec![Argument::Int(1)])],
        );
        feed(&mut manager, &mut outbox, list_messages(1, Uuid::new_v4()));
        feed(
            &mut manager,
            &mut outbox,
            vec![EosMessage::new(
                "/get/cue/1/noparts/count",
                vec![Argument::Int(cue_count)],
            )],
        );
        (manager, outbox)
    }

    fn numbers(manager: &CueManager) -> Vec<f64> {
        manager.cues(1).iter().map(|cue| cue.number).collect()
    }

    #[test]
    fn test_list_fetch_requests_cue_count() {
        let mut manager = CueManager::new();
        let mut outbox = Outbox::new(Instant::now());
        manager.synchronize(&mut outbox);
        feed(
            &mut manager,
            &mut outbox,
            vec![EosMessage::new("/get/cuelist/count", vec![Argument::Int(1)])],
        );
        feed(&mut manager, &mut outbox, list_messages(1, Uuid::new_v4()));
        assert_eq!(
            addresses(&mut outbox),
            vec![
                "/eos/get/cuelist/count",
                "/eos/get/cuelist/index/0",
                "/eos/get/cue/1/noparts/count",
            ]
        );
        assert!(manager.list(1).is_some());
        assert!(!manager.is_synchronized());

        feed(
            &mut manager,
            &mut outbox,
            vec![EosMessage::new("/get/cue/1/noparts/count", vec![Argument::Int(2)])],
        );
        assert_eq!(
            addresses(&mut outbox),
            vec!["/eos/get/cue/1/noparts/index/0", "/eos/get/cue/1/noparts/index/1"]
        );
    }

    #[test]
    fn test_cues_are_kept_in_number_order() {
        let (mut manager, mut outbox) = manager_with_list(3);
        for number in ["3", "1", "2"] {
            feed(
                &mut manager,
                &mut outbox,
                cue_messages(1, number, None, Uuid::new_v4(), 0),
            );
        }
        assert_eq!(numbers(&manager), vec![1.0, 2.0, 3.0]);
        assert!(manager.is_synchronized());
    }

    #[test]
    fn test_cue_waits_for_parts() {
        let (mut manager, mut outbox) = manager_with_list(1);
        outbox.take();
        let id = Uuid::new_v4();
        feed(&mut manager, &mut outbox, cue_messages(1, "5", None, id, 2));
        assert_eq!(addresses(&mut outbox), vec!["/eos/get/cue/1/5/count"]);
        assert_eq!(manager.pending_len(), 1);
        assert!(manager.cues(1).is_empty());

        feed(
            &mut manager,
            &mut outbox,
            vec![EosMessage::new("/get/cue/1/5/count", vec![Argument::Int(2)])],
        );
        assert_eq!(
            addresses(&mut outbox),
            vec!["/eos/get/cue/1/5/index/0", "/eos/get/cue/1/5/index/1"]
        );

        feed(
            &mut manager,
            &mut outbox,
            cue_messages(1, "5", Some(2), Uuid::new_v4(), 0),
        );
        assert!(manager.cues(1).is_empty());
        feed(
            &mut manager,
            &mut outbox,
            cue_messages(1, "5", Some(1), Uuid::new_v4(), 0),
        );

        let cue = manager.cue(1, 5.0).unwrap();
        assert_eq!(cue.uuid, id);
        let parts: Vec<u32> = cue.parts.iter().map(|part| part.number).collect();
        assert_eq!(parts, vec![1, 2]);
        assert_eq!(manager.pending_len(), 0);
        assert!(manager.is_synchronized());
    }

    #[test]
    fn test_part_zero_is_the_cue() {
        let (mut manager, mut outbox) = manager_with_list(1);
        let id = Uuid::new_v4();
        feed(&mut manager, &mut outbox, cue_messages(1, "4", Some(0), id, 0));
        assert_eq!(manager.cue(1, 4.0).map(|cue| cue.uuid), Some(id));
    }

    #[test]
    fn test_renumbered_cue_keeps_identity() {
        let (mut manager, mut outbox) = manager_with_list(2);
        let id = Uuid::new_v4();
        feed(&mut manager, &mut outbox, cue_messages(1, "1", None, id, 0));
        feed(
            &mut manager,
            &mut outbox,
            cue_messages(1, "2", None, Uuid::new_v4(), 0),
        );
        feed(&mut manager, &mut outbox, cue_messages(1, "3.5", None, id, 0));
        assert_eq!(numbers(&manager), vec![2.0, 3.5]);
        assert_eq!(manager.cue(1, 3.5).map(|cue| cue.uuid), Some(id));
    }

    #[test]
    fn test_missing_satellite_leaves_cues_unchanged() {
        let (mut manager, mut outbox) = manager_with_list(1);
        manager.take_changed();
        let mut messages = cue_messages(1, "1", None, Uuid::new_v4(), 0);
        messages.pop();
        feed(&mut manager, &mut outbox, messages);
        assert!(manager.cues(1).is_empty());
        assert!(!manager.take_changed());
    }

    #[test]
    fn test_cue_without_list_is_dropped() {
        let (mut manager, mut outbox) = manager_with_list(0);
        feed(
            &mut manager,
            &mut outbox,
            cue_messages(9, "1", None, Uuid::new_v4(), 0),
        );
        assert!(manager.cues(9).is_empty());
    }

    #[test]
    fn test_notify_and_removal() {
        let (mut manager, mut outbox) = manager_with_list(2);
        feed(
            &mut manager,
            &mut outbox,
            cue_messages(1, "1", None, Uuid::new_v4(), 0),
        );
        let second = Uuid::new_v4();
        feed(&mut manager, &mut outbox, cue_messages(1, "2", None, second, 0));
        outbox.take();

        feed(
            &mut manager,
            &mut outbox,
            vec![EosMessage::new(
                "/notify/cue/1/list/0/1",
                vec![Argument::Int(40), Argument::from("2-3")],
            )],
        );
        assert_eq!(
            addresses(&mut outbox),
            vec![
                format!("/eos/get/cue/1/uid/{}", second),
                "/eos/get/cue/1/3".to_string(),
            ]
        );

        feed(
            &mut manager,
            &mut outbox,
            vec![EosMessage::request("/get/cue/1/2")],
        );
        assert_eq!(numbers(&manager), vec![1.0]);
    }

    #[test]
    fn test_list_removal_drops_cues() {
        let (mut manager, mut outbox) = manager_with_list(1);
        feed(
            &mut manager,
            &mut outbox,
            cue_messages(1, "1", None, Uuid::new_v4(), 0),
        );
        feed(
            &mut manager,
            &mut outbox,
            vec![EosMessage::request("/get/cuelist/1")],
        );
        assert!(manager.list(1).is_none());
        assert!(manager.snapshot().is_empty());
    }

    #[test]
    fn test_stale_pending_cue_expires() {
        let (mut manager, mut outbox) = manager_with_list(1);
        let id = Uuid::new_v4();
        feed(&mut manager, &mut outbox, cue_messages(1, "1", None, id, 3));

        let later = outbox.now() + Duration::from_secs(20);
        let incomplete = manager.expire(later, Duration::from_secs(10));
        assert_eq!(incomplete.len(), 1);
        assert_eq!(incomplete[0].uuid, id);
        assert_eq!((incomplete[0].received, incomplete[0].expected), (0, 3));
        assert!(manager.cues(1).is_empty());
        assert!(manager.is_synchronized());
    }
}
