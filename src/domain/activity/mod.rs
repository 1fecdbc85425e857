//! Activity module - the catalogue of mini-games and the lifecycle every
//! one of them shares.
//!
//! - `ActivityType` names each game and its localization namespace
//! - `ActivityPolicy` holds the named thresholds gating each transition
//! - `ActivityPhaseController` moves chatting → reflection → feedback

mod activity_type;
mod persona;
mod phase;
mod phase_controller;
mod policy;

pub use activity_type::ActivityType;
pub use persona::{cast_display_name, Persona};
pub use phase::ActivityPhase;
pub use phase_controller::{check_reflection_text, ActivityPhaseController, GuardFailure};
pub use policy::{
    ActivityPolicy, EndChatPolicy, MessageCount, DEFAULT_MIN_MESSAGES,
    DEFAULT_MIN_REFLECTION_CHARS,
};
