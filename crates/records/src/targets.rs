//! Records that are fully described by a head message and a fixed set of
//! satellites.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::message::EosMessage;
use crate::number;
use crate::step::PartialRecord;
use crate::target::RecordTarget;

fn numbers(message: &EosMessage) -> Vec<f64> {
    let mut numbers = number::expand_all(message.arguments.iter().skip(2));
    numbers.sort_by(|a, b| a.total_cmp(b));
    numbers.dedup();
    numbers
}

fn label(partial: &PartialRecord) -> Option<(f64, Uuid, String)> {
    let head = partial.head()?;
    Some((partial.number()?, head.uuid()?, head.string(2)?.to_string()))
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Group {
    pub number: f64,
    pub uuid: Uuid,
    pub label: String,
    pub channels: Vec<f64>,
}

impl Group {
    pub fn from_partial(partial: &PartialRecord) -> Option<Group> {
        let (number, uuid, label) = label(partial)?;
        Some(Group {
            number,
            uuid,
            label,
            channels: numbers(partial.satellite("channels")?),
        })
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Macro {
    pub number: f64,
    pub uuid: Uuid,
    pub label: String,
    pub mode: String,
    pub command_text: String,
}

impl Macro {
    pub fn from_partial(partial: &PartialRecord) -> Option<Macro> {
        let (number, uuid, label) = label(partial)?;
        let head = partial.head()?;
        let text = partial.satellite("text")?;
        Some(Macro {
            number,
            uuid,
            label,
            mode: head.string(3)?.to_string(),
            command_text: text
                .arguments
                .iter()
                .skip(2)
                .filter_map(|argument| match argument {
                    crate::message::Argument::String(value) => Some(value.as_str()),
                    _ => None,
                })
                .collect::<Vec<_>>()
                .join(""),
        })
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Sub {
    pub number: f64,
    pub uuid: Uuid,
    pub label: String,
    pub mode: String,
    pub fader_mode: String,
    pub htp: bool,
    pub exclusive: bool,
    pub background: bool,
    pub restore: bool,
    pub effects: Vec<f64>,
}

impl Sub {
    pub fn from_partial(partial: &PartialRecord) -> Option<Sub> {
        let (number, uuid, label) = label(partial)?;
        let head = partial.head()?;
        Some(Sub {
            number,
            uuid,
            label,
            mode: head.string(3)?.to_string(),
            fader_mode: head.string(4)?.to_string(),
            htp: head.bool(5)?,
            exclusive: head.bool(6)?,
            background: head.bool(7)?,
            restore: head.bool(8)?,
            effects: numbers(partial.satellite("fx")?),
        })
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Preset {
    pub number: f64,
    pub uuid: Uuid,
    pub label: String,
    pub absolute: bool,
    pub locked: bool,
    pub channels: Vec<f64>,
    pub by_type_channels: Vec<f64>,
    pub effects: Vec<f64>,
}

impl Preset {
    pub fn from_partial(partial: &PartialRecord) -> Option<Preset> {
        let (number, uuid, label) = label(partial)?;
        let head = partial.head()?;
        Some(Preset {
            number,
            uuid,
            label,
            absolute: head.bool(3).unwrap_or(false),
            locked: head.bool(4).unwrap_or(false),
            channels: numbers(partial.satellite("channels")?),
            by_type_channels: numbers(partial.satellite("byType")?),
            effects: numbers(partial.satellite("fx")?),
        })
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaletteKind {
    Intensity,
    Focus,
    Color,
    Beam,
}

impl PaletteKind {
    pub fn target(&self) -> RecordTarget {
        match self {
            PaletteKind::Intensity => RecordTarget::IntensityPalette,
            PaletteKind::Focus => RecordTarget::FocusPalette,
            PaletteKind::Color => RecordTarget::ColorPalette,
            PaletteKind::Beam => RecordTarget::BeamPalette,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Palette {
    pub kind: PaletteKind,
    pub number: f64,
    pub uuid: Uuid,
    pub label: String,
    pub absolute: bool,
    pub locked: bool,
    pub channels: Vec<f64>,
    pub by_type_channels: Vec<f64>,
}

impl Palette {
    pub fn from_partial(kind: PaletteKind, partial: &PartialRecord) -> Option<Palette> {
        let (number, uuid, label) = label(partial)?;
        let head = partial.head()?;
        Some(Palette {
            kind,
            number,
            uuid,
            label,
            absolute: head.bool(3)?,
            locked: head.bool(4)?,
            channels: numbers(partial.satellite("channels")?),
            by_type_channels: numbers(partial.satellite("byType")?),
        })
    }
}

/// A record carrying only a number and a label: curves, snapshots and
/// magic sheets.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Labelled {
    pub number: f64,
    pub uuid: Uuid,
    pub label: String,
}

impl Labelled {
    pub fn from_partial(partial: &PartialRecord) -> Option<Labelled> {
        let (number, uuid, label) = label(partial)?;
        Some(Labelled { number, uuid, label })
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Effect {
    pub number: f64,
    pub uuid: Uuid,
    pub label: String,
    pub effect_type: String,
    pub entry: String,
    pub exit: String,
    pub duration: String,
    pub scale: u32,
}

impl Effect {
    pub fn from_partial(partial: &PartialRecord) -> Option<Effect> {
        let (number, uuid, label) = label(partial)?;
        let head = partial.head()?;
        Some(Effect {
            number,
            uuid,
            label,
            effect_type: head.string(3)?.to_string(),
            entry: head.string(4)?.to_string(),
            exit: head.string(5)?.to_string(),
            duration: head.string(6)?.to_string(),
            scale: head.uint(7)?,
        })
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PixelMap {
    pub number: f64,
    pub uuid: Uuid,
    pub label: String,
    pub server_channel: u32,
    pub interface: String,
    pub width: u32,
    pub height: u32,
    pub pixel_count: u32,
    pub fixture_count: u32,
    pub layer_channels: Vec<f64>,
}

impl PixelMap {
    pub fn from_partial(partial: &PartialRecord) -> Option<PixelMap> {
        let (number, uuid, label) = label(partial)?;
        let head = partial.head()?;
        Some(PixelMap {
            number,
            uuid,
            label,
            server_channel: head.uint(3)?,
            interface: head.string(4)?.to_string(),
            width: head.uint(5)?,
            height: head.uint(6)?,
            pixel_count: head.uint(7)?,
            fixture_count: head.uint(8)?,
            layer_channels: numbers(partial.satellite("channels")?),
        })
    }
}

/// Show wide default cue timings, in milliseconds.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Setup {
    pub uuid: Uuid,
    pub up_time: i32,
    pub down_time: i32,
    pub focus_time: i32,
    pub color_time: i32,
    pub beam_time: i32,
}

impl Setup {
    pub fn from_partial(partial: &PartialRecord) -> Option<Setup> {
        let head = partial.head()?;
        Some(Setup {
            uuid: head.uuid()?,
            up_time: head.int(2)?,
            down_time: head.int(3)?,
            focus_time: head.int(4)?,
            color_time: head.int(5)?,
            beam_time: head.int(6)?,
        })
    }
}
