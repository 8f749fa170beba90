use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use crate::message::REPLY_PREFIX;

/// A category of console data that is subscribed to as a unit.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordTarget {
    Patch,
    CueList,
    Cue,
    Group,
    Macro,
    Sub,
    Preset,
    IntensityPalette,
    FocusPalette,
    ColorPalette,
    BeamPalette,
    Curve,
    Effect,
    Snapshot,
    PixelMap,
    MagicSheet,
    Setup,
}

impl RecordTarget {
    pub const ALL: [RecordTarget; 17] = [
        RecordTarget::Patch,
        RecordTarget::CueList,
        RecordTarget::Cue,
        RecordTarget::Group,
        RecordTarget::Macro,
        RecordTarget::Sub,
        RecordTarget::Preset,
        RecordTarget::IntensityPalette,
        RecordTarget::FocusPalette,
        RecordTarget::ColorPalette,
        RecordTarget::BeamPalette,
        RecordTarget::Curve,
        RecordTarget::Effect,
        RecordTarget::Snapshot,
        RecordTarget::PixelMap,
        RecordTarget::MagicSheet,
        RecordTarget::Setup,
    ];

    /// The address segment naming this category on the wire.
    pub fn part(&self) -> &'static str {
        match self {
            RecordTarget::Patch => "patch",
            RecordTarget::CueList => "cuelist",
            RecordTarget::Cue => "cue",
            RecordTarget::Group => "group",
            RecordTarget::Macro => "macro",
            RecordTarget::Sub => "sub",
            RecordTarget::Preset => "preset",
            RecordTarget::IntensityPalette => "ip",
            RecordTarget::FocusPalette => "fp",
            RecordTarget::ColorPalette => "cp",
            RecordTarget::BeamPalette => "bp",
            RecordTarget::Curve => "curve",
            RecordTarget::Effect => "fx",
            RecordTarget::Snapshot => "snap",
            RecordTarget::PixelMap => "pixmap",
            RecordTarget::MagicSheet => "ms",
            RecordTarget::Setup => "setup",
        }
    }

    /// Snake case identifier, matching the serde representation.
    pub fn key(&self) -> &'static str {
        match self {
            RecordTarget::Patch => "patch",
            RecordTarget::CueList => "cue_list",
            RecordTarget::Cue => "cue",
            RecordTarget::Group => "group",
            RecordTarget::Macro => "macro",
            RecordTarget::Sub => "sub",
            RecordTarget::Preset => "preset",
            RecordTarget::IntensityPalette => "intensity_palette",
            RecordTarget::FocusPalette => "focus_palette",
            RecordTarget::ColorPalette => "color_palette",
            RecordTarget::BeamPalette => "beam_palette",
            RecordTarget::Curve => "curve",
            RecordTarget::Effect => "effect",
            RecordTarget::Snapshot => "snapshot",
            RecordTarget::PixelMap => "pixel_map",
            RecordTarget::MagicSheet => "magic_sheet",
            RecordTarget::Setup => "setup",
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            RecordTarget::Patch => "Patch",
            RecordTarget::CueList => "Cue Lists",
            RecordTarget::Cue => "Cues",
            RecordTarget::Group => "Groups",
            RecordTarget::Macro => "Macros",
            RecordTarget::Sub => "Subs",
            RecordTarget::Preset => "Presets",
            RecordTarget::IntensityPalette => "Intensity Palettes",
            RecordTarget::FocusPalette => "Focus Palettes",
            RecordTarget::ColorPalette => "Color Palettes",
            RecordTarget::BeamPalette => "Beam Palettes",
            RecordTarget::Curve => "Curves",
            RecordTarget::Effect => "Effects",
            RecordTarget::Snapshot => "Snapshots",
            RecordTarget::PixelMap => "Pixel Maps",
            RecordTarget::MagicSheet => "Magic Sheets",
            RecordTarget::Setup => "Setup",
        }
    }

    /// Named satellite messages that complete a record alongside its head.
    pub fn satellites(&self) -> &'static [&'static str] {
        match self {
            RecordTarget::Patch => &["notes"],
            RecordTarget::CueList => &["links"],
            RecordTarget::Cue => &["fx", "links", "actions"],
            RecordTarget::Group => &["channels"],
            RecordTarget::Macro => &["text"],
            RecordTarget::Sub => &["fx"],
            RecordTarget::Preset => &["channels", "byType", "fx"],
            RecordTarget::IntensityPalette
            | RecordTarget::FocusPalette
            | RecordTarget::ColorPalette
            | RecordTarget::BeamPalette => &["channels", "byType"],
            RecordTarget::PixelMap => &["channels"],
            RecordTarget::Curve
            | RecordTarget::Effect
            | RecordTarget::Snapshot
            | RecordTarget::MagicSheet
            | RecordTarget::Setup => &[],
        }
    }

    /// Number of distinct messages that make up one record.
    pub fn step_count(&self) -> usize {
        1 + self.satellites().len()
    }

    /// Setup is a single record fetched directly, without a count.
    pub fn is_counted(&self) -> bool {
        !matches!(self, RecordTarget::Setup)
    }

    /// The wire patterns the console must emit for this category.
    pub fn filters(&self) -> BTreeSet<String> {
        let part = self.part();
        let mut filters = BTreeSet::new();
        match self {
            RecordTarget::Setup => {
                filters.insert(format!("{}/get/setup/list/*/*", REPLY_PREFIX));
            }
            RecordTarget::Patch => {
                filters.insert(format!("{}/get/patch/count", REPLY_PREFIX));
                filters.insert(format!("{}/get/patch/*/*/list/*/*", REPLY_PREFIX));
                filters.insert(format!("{}/get/patch/*/*/notes", REPLY_PREFIX));
            }
            RecordTarget::Cue => {
                filters.extend(RecordTarget::CueList.filters());
                filters.insert(format!("{}/get/cue/*/noparts/count", REPLY_PREFIX));
                filters.insert(format!("{}/get/cue/*/*/noparts/list/*/*", REPLY_PREFIX));
                filters.insert(format!("{}/get/cue/*/*/count", REPLY_PREFIX));
                filters.insert(format!("{}/get/cue/*/*/*/list/*/*", REPLY_PREFIX));
                for satellite in self.satellites() {
                    filters.insert(format!(
                        "{}/get/cue/*/*/noparts/{}/list/*/*",
                        REPLY_PREFIX, satellite
                    ));
                    filters.insert(format!(
                        "{}/get/cue/*/*/*/{}/list/*/*",
                        REPLY_PREFIX, satellite
                    ));
                }
                filters.insert(format!("{}/notify/cue/*/list/*/*", REPLY_PREFIX));
                return filters;
            }
            _ => {
                filters.insert(format!("{}/get/{}/count", REPLY_PREFIX, part));
                filters.insert(format!("{}/get/{}/*/list/*/*", REPLY_PREFIX, part));
                for satellite in self.satellites() {
                    filters.insert(format!(
                        "{}/get/{}/*/{}/list/*/*",
                        REPLY_PREFIX, part, satellite
                    ));
                }
            }
        }
        filters.insert(format!("{}/notify/{}/list/*/*", REPLY_PREFIX, part));
        filters
    }
}

/// Union of the wire patterns of every category in `targets`.
pub fn filters<'a>(targets: impl IntoIterator<Item = &'a RecordTarget>) -> BTreeSet<String> {
    targets
        .into_iter()
        .flat_map(|target| target.filters())
        .collect()
}

impl fmt::Display for RecordTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownTarget(pub String);

impl fmt::Display for UnknownTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown record target '{}'", self.0)
    }
}

impl std::error::Error for UnknownTarget {}

impl FromStr for RecordTarget {
    type Err = UnknownTarget;

    /// Accepts the wire part (`ip`, `snap`) or the snake case name
    /// (`intensity_palette`, `snapshot`).
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lowered = s.trim().to_ascii_lowercase().replace('-', "_");
        RecordTarget::ALL
            .iter()
            .copied()
            .find(|target| {
                target.part().eq_ignore_ascii_case(&lowered) || target.key() == lowered
            })
            .ok_or_else(|| UnknownTarget(s.to_string()))
    }
}
