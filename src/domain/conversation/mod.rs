//! Conversation module - messages and the ordered store that holds them.

mod message;
mod store;

pub use message::{Message, Role};
pub use store::ConversationStore;
