pub mod message_service;

// Re-export key types for convenience
pub use message_service::{MessageStore, PgMessageStore};
