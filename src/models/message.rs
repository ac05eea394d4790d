use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Kind of a direct message. Image messages carry a URL into the external
/// image store plus the original file name for display.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageKind {
    #[default]
    Text,
    Image,
}

impl MessageKind {
    pub fn as_db(&self) -> &'static str {
        match self {
            MessageKind::Text => "text",
            MessageKind::Image => "image",
        }
    }

    pub fn from_db(value: &str) -> Option<Self> {
        match value {
            "text" => Some(MessageKind::Text),
            "image" => Some(MessageKind::Image),
            _ => None,
        }
    }
}

/// Message struct matching the `messages` table
///
/// `sent_at` is assigned by the database at insert time; `read_at` is set
/// exactly once, by the receiver's mark-read. Serialized camelCase because
/// the struct doubles as the wire payload of `ReceiveMessage`/`MessageSent`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    pub id: Uuid,
    pub sender_id: Uuid,
    pub receiver_id: Uuid,
    pub content: String,
    pub message_type: MessageKind,
    pub image_url: Option<String>,
    pub image_file_name: Option<String>,
    pub sent_at: DateTime<Utc>,
    pub is_read: bool,
    pub read_at: Option<DateTime<Utc>>,
}

/// Input for persisting a new message; everything the store does not
/// assign itself.
#[derive(Debug, Clone)]
pub struct NewMessage {
    pub sender_id: Uuid,
    pub receiver_id: Uuid,
    pub content: String,
    pub kind: MessageKind,
    pub image_url: Option<String>,
    pub image_file_name: Option<String>,
}

/// One entry of a user's conversation list: the chat partner, the latest
/// message exchanged with them and how many of their messages are unread.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversationSummary {
    pub other_user_id: Uuid,
    pub last_message: Message,
    pub unread_count: i64,
}
