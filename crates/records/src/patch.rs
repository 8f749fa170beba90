use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use crate::step::PartialRecord;

/// Arguments in a patch head message.
pub const PATCH_HEAD_ARGUMENTS: usize = 21;

/// A gel reference as the console encodes it, a manufacturer prefix followed
/// by the catalogue number (`R02`, `L201`, `AP4750`).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "maker", content = "number")]
pub enum Gel {
    Apollo(u32),
    Gam(u32),
    Lee(u32),
    Rosco(u32),
    RoscoSuperGel(u32),
    RoscoEColor(u32),
    TokyoBsPolyColor(u32),
}

impl Gel {
    // Longer prefixes first so `SG` is not read as something else.
    const PREFIXES: [(&'static str, fn(u32) -> Gel); 7] = [
        ("AP", Gel::Apollo),
        ("SG", Gel::RoscoSuperGel),
        ("G", Gel::Gam),
        ("L", Gel::Lee),
        ("R", Gel::Rosco),
        ("E", Gel::RoscoEColor),
        ("T", Gel::TokyoBsPolyColor),
    ];

    pub fn parse(value: &str) -> Option<Gel> {
        Self::PREFIXES.iter().find_map(|(prefix, make)| {
            value
                .strip_prefix(prefix)
                .and_then(|number| number.parse::<u32>().ok())
                .map(make)
        })
    }

    pub fn prefix(&self) -> &'static str {
        match self {
            Gel::Apollo(_) => "AP",
            Gel::Gam(_) => "G",
            Gel::Lee(_) => "L",
            Gel::Rosco(_) => "R",
            Gel::RoscoSuperGel(_) => "SG",
            Gel::RoscoEColor(_) => "E",
            Gel::TokyoBsPolyColor(_) => "T",
        }
    }

    pub fn number(&self) -> u32 {
        match *self {
            Gel::Apollo(n)
            | Gel::Gam(n)
            | Gel::Lee(n)
            | Gel::Rosco(n)
            | Gel::RoscoSuperGel(n)
            | Gel::RoscoEColor(n)
            | Gel::TokyoBsPolyColor(n) => n,
        }
    }
}

impl fmt::Display for Gel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.prefix(), self.number())
    }
}

/// One part of a patched channel.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ChannelPart {
    pub channel: u32,
    pub part: u32,
    pub uuid: Uuid,
    pub label: String,
    pub manufacturer: String,
    pub model: String,
    pub address: u32,
    pub intensity_address: u32,
    pub level: i32,
    pub gel: Option<Gel>,
    pub text: [String; 10],
    pub part_count: u32,
    pub end_address: u32,
    pub notes: String,
}

impl ChannelPart {
    pub fn from_partial(partial: &PartialRecord) -> Option<ChannelPart> {
        let head = partial.head()?;
        let notes = partial.satellite("notes")?;
        if head.arguments.len() < PATCH_HEAD_ARGUMENTS {
            return None;
        }
        let channel = partial.number()?;
        let part = partial.number_at(1)?;
        if channel.fract() != 0.0 || part.fract() != 0.0 || channel < 0.0 || part < 0.0 {
            return None;
        }
        let mut text: [String; 10] = Default::default();
        for (offset, slot) in text.iter_mut().enumerate() {
            *slot = head.string(9 + offset)?.to_string();
        }
        Some(ChannelPart {
            channel: channel as u32,
            part: part as u32,
            uuid: head.uuid()?,
            label: head.string(2)?.to_string(),
            manufacturer: head.string(3)?.to_string(),
            model: head.string(4)?.to_string(),
            address: head.uint(5)?,
            intensity_address: head.uint(6)?,
            level: head.int(7)?,
            gel: head.string(8).and_then(Gel::parse),
            text,
            part_count: head.uint(19)?,
            end_address: head.uint(20)?,
            notes: notes.string(2).unwrap_or_default().to_string(),
        })
    }
}
