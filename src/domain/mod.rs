//! Domain layer containing the activity lifecycle and its types.
//!
//! # Module Organization
//!
//! - `foundation` - Shared primitives (IDs, timestamps, errors, state machine)
//! - `conversation` - Messages and the ordered conversation store
//! - `activity` - Activity catalogue, policies, phases and the phase controller
//! - `reflection` - Reflection prompts and answer capture
//! - `session` - The `ReflectionSession` aggregate and evaluation state

pub mod activity;
pub mod conversation;
pub mod foundation;
pub mod reflection;
pub mod session;
