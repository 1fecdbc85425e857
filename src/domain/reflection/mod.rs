//! Reflection module - prompts and the answer buffer.

mod collector;

pub use collector::{ReflectionCollector, ReflectionQuestion};
