//! Record model for mirroring an Eos family console over OSC.
//!
//! The types here are plain data: addressed messages, the number codec the
//! console uses, the record categories with their wire filters, and builders
//! turning a complete set of partial messages into a typed record.

pub mod console;
pub mod cue;
pub mod message;
pub mod number;
pub mod patch;
pub mod record;
pub mod step;
pub mod target;
pub mod targets;

pub use console::{Console, ConsoleType};
pub use cue::{Cue, CueAttributes, CueList, CuePart, Timing};
pub use message::{Argument, EosMessage, REPLY_PREFIX, REQUEST_PREFIX};
pub use patch::{ChannelPart, Gel};
pub use record::{Record, RecordSpec};
pub use step::{locate, Located, PartialRecord, Step};
pub use target::{filters, RecordTarget, UnknownTarget};
pub use targets::{
    Effect, Group, Labelled, Macro, Palette, PaletteKind, PixelMap, Preset, Setup, Sub,
};
