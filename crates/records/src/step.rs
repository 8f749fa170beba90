use std::collections::BTreeMap;
use uuid::Uuid;

use crate::message::EosMessage;

/// Which message of a multi-message record a reply carries.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Step {
    /// The message with the record's own fields.
    Head,
    /// A named satellite such as `links`, `fx` or `channels`.
    Satellite(String),
}

/// A reply located within its category: which step it is and the numeric
/// path identifying the record (`[list, cue, part]`, `[channel, part]`, `[number]`).
#[derive(Clone, Debug, PartialEq)]
pub struct Located {
    pub step: Step,
    pub path: Vec<String>,
}

impl Located {
    /// The leading display number of the path.
    pub fn number(&self) -> Option<f64> {
        self.path.first()?.parse().ok()
    }

    pub fn number_at(&self, index: usize) -> Option<f64> {
        self.path.get(index)?.parse().ok()
    }
}

/// Classifies a reply (already stripped of the reply prefix) addressed
/// `/get/<part>/...`. Returns `None` for count replies and foreign addresses.
pub fn locate(part: &str, message: &EosMessage) -> Option<Located> {
    let segments = message.address_parts();
    if segments.len() < 2 || segments[0] != "get" || segments[1] != part {
        return None;
    }
    let mut rest: Vec<&str> = segments[2..].to_vec();
    if rest.len() >= 3 && rest[rest.len() - 3] == "list" {
        rest.truncate(rest.len() - 3);
    }

    let step = match rest.last() {
        None => Step::Head,
        Some(&"noparts") => {
            rest.pop();
            Step::Head
        }
        Some(&"count") => return None,
        Some(last) if last.parse::<f64>().is_ok() => Step::Head,
        Some(last) => {
            let name = last.to_string();
            rest.pop();
            if rest.last() == Some(&"noparts") {
                rest.pop();
            }
            Step::Satellite(name)
        }
    };

    if rest.iter().any(|segment| segment.parse::<f64>().is_err()) {
        return None;
    }

    Some(Located {
        step,
        path: rest.into_iter().map(str::to_string).collect(),
    })
}

/// Messages collected so far for one record, at most one per step.
#[derive(Clone, Debug, Default)]
pub struct PartialRecord {
    pub path: Vec<String>,
    steps: BTreeMap<Step, EosMessage>,
}

impl PartialRecord {
    pub fn new(path: Vec<String>) -> Self {
        Self {
            path,
            steps: BTreeMap::new(),
        }
    }

    /// Stores a message; a repeated step replaces the earlier message.
    pub fn insert(&mut self, step: Step, message: EosMessage) {
        self.steps.insert(step, message);
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    pub fn head(&self) -> Option<&EosMessage> {
        self.steps.get(&Step::Head)
    }

    pub fn satellite(&self, name: &str) -> Option<&EosMessage> {
        self.steps.get(&Step::Satellite(name.to_string()))
    }

    pub fn uuid(&self) -> Option<Uuid> {
        self.steps.values().find_map(EosMessage::uuid)
    }

    pub fn number(&self) -> Option<f64> {
        self.path.first()?.parse().ok()
    }

    pub fn number_at(&self, index: usize) -> Option<f64> {
        self.path.get(index)?.parse().ok()
    }

    /// Whether all `satellites` plus the head are present.
    pub fn is_complete(&self, satellites: &[&str]) -> bool {
        self.head().is_some() && satellites.iter().all(|name| self.satellite(name).is_some())
    }
}
