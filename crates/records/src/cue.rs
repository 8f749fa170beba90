use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::message::{Argument, EosMessage};
use crate::number;
use crate::step::PartialRecord;

/// Arguments in a cue or cue part head message.
pub const CUE_HEAD_ARGUMENTS: usize = 30;
/// Arguments in a cue list head message.
pub const CUE_LIST_HEAD_ARGUMENTS: usize = 13;
/// Position of the part count in a cue head message.
pub const PART_COUNT_ARGUMENT: usize = 26;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CueList {
    pub number: u32,
    pub uuid: Uuid,
    pub label: String,
    pub playback_mode: String,
    pub fader_mode: String,
    pub independent: bool,
    pub htp: bool,
    pub assert: bool,
    pub block: bool,
    pub background: bool,
    pub solo_mode: bool,
    pub timecode_list: Option<u32>,
    pub oos_sync: bool,
    /// Linked cue list numbers, ascending.
    pub links: Vec<f64>,
}

impl CueList {
    pub fn from_partial(partial: &PartialRecord) -> Option<CueList> {
        let head = partial.head()?;
        let links = partial.satellite("links")?;
        if head.arguments.len() < CUE_LIST_HEAD_ARGUMENTS {
            return None;
        }
        let number = partial.number()?;
        if number.fract() != 0.0 || number < 0.0 {
            return None;
        }
        Some(CueList {
            number: number as u32,
            uuid: head.uuid()?,
            label: head.string(2)?.to_string(),
            playback_mode: head.string(3)?.to_string(),
            fader_mode: head.string(4)?.to_string(),
            independent: head.bool(5)?,
            htp: head.bool(6)?,
            assert: head.bool(7)?,
            block: head.bool(8)?,
            background: head.bool(9)?,
            solo_mode: head.bool(10)?,
            timecode_list: head.uint(11),
            oos_sync: head.bool(12)?,
            links: sorted_numbers(links),
        })
    }
}

/// Duration and delay of one timing category, in milliseconds.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Timing {
    pub duration: i32,
    pub delay: i32,
}

/// Fields shared by cues and cue parts.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CueAttributes {
    pub index: u32,
    pub label: String,
    pub up: Timing,
    pub down: Timing,
    pub focus: Timing,
    pub color: Timing,
    pub beam: Timing,
    pub preheat: bool,
    pub curve: Option<f64>,
    pub rate: u32,
    /// `"m"`, `"M"` or empty.
    pub mark: String,
    /// `"b"`, `"B"` or empty.
    pub block: String,
    /// `"a"`, `"A"` or empty.
    pub assert: String,
    /// A cue number, or a `list/cue` reference when linking across lists.
    pub link: String,
    pub follow_time: i32,
    pub hang_time: i32,
    pub all_fade: bool,
    pub loop_count: i32,
    pub solo: bool,
    pub timecode: String,
    pub notes: String,
    pub scene_text: String,
    pub scene_end: bool,
    pub effects: Vec<f64>,
    pub links: Vec<f64>,
    pub actions: String,
}

impl CueAttributes {
    fn from_partial(partial: &PartialRecord) -> Option<CueAttributes> {
        let head = partial.head()?;
        if head.arguments.len() < CUE_HEAD_ARGUMENTS {
            return None;
        }
        let fx = partial.satellite("fx")?;
        let links = partial.satellite("links")?;
        let actions = partial.satellite("actions")?;
        let timing = |at: usize| -> Option<Timing> {
            Some(Timing {
                duration: head.int(at)?,
                delay: head.int(at + 1)?,
            })
        };
        Some(CueAttributes {
            index: head.uint(0)?,
            label: head.string(2)?.to_string(),
            up: timing(3)?,
            down: timing(5)?,
            focus: timing(7)?,
            color: timing(9)?,
            beam: timing(11)?,
            preheat: head.bool(13)?,
            curve: head.argument(14).and_then(|a| number::expand(a).first().copied()),
            rate: head.uint(15)?,
            mark: head.string(16)?.to_string(),
            block: head.string(17)?.to_string(),
            assert: head.string(18)?.to_string(),
            link: link(head.argument(19)?)?,
            follow_time: head.int(20)?,
            hang_time: head.int(21)?,
            all_fade: head.bool(22)?,
            loop_count: head.int(23)?,
            solo: head.bool(24)?,
            timecode: head.string(25)?.to_string(),
            notes: head.string(27)?.to_string(),
            scene_text: head.string(28)?.to_string(),
            scene_end: head.bool(29)?,
            effects: sorted_numbers(fx),
            links: sorted_numbers(links),
            actions: actions.string(2).unwrap_or_default().to_string(),
        })
    }
}

fn link(argument: &Argument) -> Option<String> {
    match argument {
        Argument::Int(0) => Some(String::new()),
        Argument::Int(value) => Some(value.to_string()),
        Argument::String(value) => Some(value.clone()),
        _ => None,
    }
}

fn sorted_numbers(message: &EosMessage) -> Vec<f64> {
    let mut numbers = number::expand_all(message.arguments.iter().skip(2));
    numbers.sort_by(|a, b| a.total_cmp(b));
    numbers.dedup();
    numbers
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Cue {
    pub list: u32,
    pub number: f64,
    pub uuid: Uuid,
    pub part_count: u32,
    #[serde(flatten)]
    pub attributes: CueAttributes,
    pub parts: Vec<CuePart>,
}

impl Cue {
    /// Builds a cue from its complete head and satellites. Parts are attached
    /// separately once each has completed.
    pub fn from_partial(partial: &PartialRecord) -> Option<Cue> {
        let head = partial.head()?;
        let list = partial.number()?;
        if list.fract() != 0.0 || list < 0.0 {
            return None;
        }
        Some(Cue {
            list: list as u32,
            number: partial.number_at(1)?,
            uuid: head.uuid()?,
            part_count: part_count(head)?,
            attributes: CueAttributes::from_partial(partial)?,
            parts: Vec::new(),
        })
    }
}

/// The declared number of parts in a cue head message.
pub fn part_count(head: &EosMessage) -> Option<u32> {
    head.uint(PART_COUNT_ARGUMENT)
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CuePart {
    pub list: u32,
    pub cue: f64,
    pub number: u32,
    pub uuid: Uuid,
    #[serde(flatten)]
    pub attributes: CueAttributes,
}

impl CuePart {
    pub fn from_partial(partial: &PartialRecord) -> Option<CuePart> {
        let head = partial.head()?;
        let list = partial.number()?;
        let number = partial.number_at(2)?;
        if list.fract() != 0.0 || number.fract() != 0.0 || list < 0.0 || number < 1.0 {
            return None;
        }
        Some(CuePart {
            list: list as u32,
            cue: partial.number_at(1)?,
            number: number as u32,
            uuid: head.uuid()?,
            attributes: CueAttributes::from_partial(partial)?,
        })
    }
}


#[cfg(test)]
mod tests {
    use super::fixtures::*;
    use super::*;
    use crate::step::{locate, PartialRecord};

    fn partial_from(messages: Vec<EosMessage>) -> PartialRecord {
        let mut partial: Option<PartialRecord> = None;
        for message in messages {
            let located = locate("cue", &message).unwrap();
            partial
                .get_or_insert_with(|| PartialRecord::new(located.path.clone()))
                .insert(located.step, message);
        }
        partial.unwrap()
    }

    #[test]
    fn test_build_cue() {
        let id = Uuid::new_v4();
        let partial = partial_from(vec![
            cue_head("/get/cue/1/2.5/noparts/list/0/1", id, 0),
            satellite("/get/cue/1/2.5/noparts/fx/list/0/1", id, vec![Argument::from("3-4")]),
            satellite("/get/cue/1/2.5/noparts/links/list/0/1", id, vec![]),
            satellite(
                "/get/cue/1/2.5/noparts/actions/list/0/1",
                id,
                vec![Argument::from("Macro 5")],
            ),
        ]);
        let cue = Cue::from_partial(&partial).unwrap();
        assert_eq!(cue.list, 1);
        assert_eq!(cue.number, 2.5);
        assert_eq!(cue.uuid, id);
        assert_eq!(cue.part_count, 0);
        assert_eq!(cue.attributes.up, Timing { duration: 0, delay: 1000 });
        assert_eq!(cue.attributes.block, "B");
        assert_eq!(cue.attributes.link, "");
        assert_eq!(cue.attributes.effects, vec![3.0, 4.0]);
        assert_eq!(cue.attributes.actions, "Macro 5");
    }

    #[test]
    fn test_short_head_is_rejected() {
        let id = Uuid::new_v4();
        let mut head = cue_head("/get/cue/1/1/noparts/list/0/1", id, 0);
        head.arguments.truncate(20);
        let partial = partial_from(vec![
            head,
            satellite("/get/cue/1/1/noparts/fx/list/0/1", id, vec![]),
            satellite("/get/cue/1/1/noparts/links/list/0/1", id, vec![]),
            satellite("/get/cue/1/1/noparts/actions/list/0/1", id, vec![]),
        ]);
        assert!(Cue::from_partial(&partial).is_none());
    }

    #[test]
    fn test_build_cue_part() {
        let id = Uuid::new_v4();
        let partial = partial_from(vec![
            cue_head("/get/cue/2/7/3/list/2/3", id, 0),
            satellite("/get/cue/2/7/3/fx/list/2/3", id, vec![]),
            satellite("/get/cue/2/7/3/links/list/2/3", id, vec![Argument::Int(9)]),
            satellite("/get/cue/2/7/3/actions/list/2/3", id, vec![]),
        ]);
        let part = CuePart::from_partial(&partial).unwrap();
        assert_eq!((part.list, part.cue, part.number), (2, 7.0, 3));
        assert_eq!(part.attributes.links, vec![9.0]);
        assert_eq!(part.attributes.actions, "");
    }
}
