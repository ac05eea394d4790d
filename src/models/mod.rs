pub mod message;

pub use message::{ConversationSummary, Message, MessageKind, NewMessage};
