use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::cue::CueList;
use crate::patch::ChannelPart;
use crate::step::PartialRecord;
use crate::target::RecordTarget;
use crate::targets::{
    Effect, Group, Labelled, Macro, Palette, PaletteKind, PixelMap, Preset, Setup, Sub,
};

/// A finished record of any category handled by the generic manager.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Record {
    Patch(ChannelPart),
    CueList(CueList),
    Group(Group),
    Macro(Macro),
    Sub(Sub),
    Preset(Preset),
    Palette(Palette),
    Curve(Labelled),
    Effect(Effect),
    Snapshot(Labelled),
    PixelMap(PixelMap),
    MagicSheet(Labelled),
    Setup(Setup),
}

impl Record {
    pub fn uuid(&self) -> Uuid {
        match self {
            Record::Patch(r) => r.uuid,
            Record::CueList(r) => r.uuid,
            Record::Group(r) => r.uuid,
            Record::Macro(r) => r.uuid,
            Record::Sub(r) => r.uuid,
            Record::Preset(r) => r.uuid,
            Record::Palette(r) => r.uuid,
            Record::Curve(r) | Record::Snapshot(r) | Record::MagicSheet(r) => r.uuid,
            Record::Effect(r) => r.uuid,
            Record::PixelMap(r) => r.uuid,
            Record::Setup(r) => r.uuid,
        }
    }

    /// The display number used for notify lookups. Patch records answer with
    /// their channel, setup with zero.
    pub fn number(&self) -> f64 {
        match self {
            Record::Patch(r) => f64::from(r.channel),
            Record::CueList(r) => f64::from(r.number),
            Record::Group(r) => r.number,
            Record::Macro(r) => r.number,
            Record::Sub(r) => r.number,
            Record::Preset(r) => r.number,
            Record::Palette(r) => r.number,
            Record::Curve(r) | Record::Snapshot(r) | Record::MagicSheet(r) => r.number,
            Record::Effect(r) => r.number,
            Record::PixelMap(r) => r.number,
            Record::Setup(_) => 0.0,
        }
    }

    /// Secondary ordering key within one display number (patch parts).
    pub fn sub_number(&self) -> u32 {
        match self {
            Record::Patch(r) => r.part,
            _ => 0,
        }
    }
}

pub type Builder = fn(&PartialRecord) -> Option<Record>;

/// How one category is reassembled: its step count and builder.
#[derive(Clone, Copy)]
pub struct RecordSpec {
    pub target: RecordTarget,
    pub step_count: usize,
    pub build: Builder,
}

impl std::fmt::Debug for RecordSpec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RecordSpec")
            .field("target", &self.target)
            .field("step_count", &self.step_count)
            .finish()
    }
}

impl RecordSpec {
    /// The table entry for `target`. Cues are assembled hierarchically and
    /// have no entry.
    pub fn for_target(target: RecordTarget) -> Option<RecordSpec> {
        let build: Builder = match target {
            RecordTarget::Cue => return None,
            RecordTarget::Patch => |p: &PartialRecord| ChannelPart::from_partial(p).map(Record::Patch),
            RecordTarget::CueList => |p: &PartialRecord| CueList::from_partial(p).map(Record::CueList),
            RecordTarget::Group => |p: &PartialRecord| Group::from_partial(p).map(Record::Group),
            RecordTarget::Macro => |p: &PartialRecord| Macro::from_partial(p).map(Record::Macro),
            RecordTarget::Sub => |p: &PartialRecord| Sub::from_partial(p).map(Record::Sub),
            RecordTarget::Preset => |p: &PartialRecord| Preset::from_partial(p).map(Record::Preset),
            RecordTarget::IntensityPalette => {
                |p: &PartialRecord| Palette::from_partial(PaletteKind::Intensity, p).map(Record::Palette)
            }
            RecordTarget::FocusPalette => {
                |p: &PartialRecord| Palette::from_partial(PaletteKind::Focus, p).map(Record::Palette)
            }
            RecordTarget::ColorPalette => {
                |p: &PartialRecord| Palette::from_partial(PaletteKind::Color, p).map(Record::Palette)
            }
            RecordTarget::BeamPalette => {
                |p: &PartialRecord| Palette::from_partial(PaletteKind::Beam, p).map(Record::Palette)
            }
            RecordTarget::Curve => |p: &PartialRecord| Labelled::from_partial(p).map(Record::Curve),
            RecordTarget::Effect => |p: &PartialRecord| Effect::from_partial(p).map(Record::Effect),
            RecordTarget::Snapshot => |p: &PartialRecord| Labelled::from_partial(p).map(Record::Snapshot),
            RecordTarget::PixelMap => |p: &PartialRecord| PixelMap::from_partial(p).map(Record::PixelMap),
            RecordTarget::MagicSheet => |p: &PartialRecord| Labelled::from_partial(p).map(Record::MagicSheet),
            RecordTarget::Setup => |p: &PartialRecord| Setup::from_partial(p).map(Record::Setup),
        };
        Some(RecordSpec {
            target,
            step_count: target.step_count(),
            build,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_every_generic_target_has_a_record_spec() {
        for target in RecordTarget::ALL {
            let spec = RecordSpec::for_target(target);
            if target == RecordTarget::Cue {
                assert!(spec.is_none());
            } else {
                let spec = spec.unwrap();
                assert_eq!(spec.step_count, target.step_count());
            }
        }
    }

    #[test]
    fn test_record_serializes_with_type_tag() {
        let record = Record::Curve(Labelled {
            number: 901.0,
            uuid: Uuid::nil(),
            label: "Preheat".to_string(),
        });
        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["type"], "curve");
        assert_eq!(json["label"], "Preheat");
    }
}
