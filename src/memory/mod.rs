pub mod conversation;

pub use conversation::{ConversationWindow, Message, Role};
