pub mod cue_manager;

pub use cue_manager::CueManager;
