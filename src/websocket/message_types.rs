use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::message::{Message, MessageKind};

/// Inbound WebSocket events from client to server
#[derive(Debug, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum WsInboundEvent {
    /// Bind this connection to a user identity and enter the chat.
    #[serde(rename = "JoinChat", rename_all = "camelCase")]
    JoinChat { user_id: Uuid },

    /// Send a direct message to another user.
    #[serde(rename = "SendMessage", rename_all = "camelCase")]
    SendMessage {
        receiver_id: Uuid,
        #[serde(default)]
        content: String,
        #[serde(default)]
        message_type: MessageKind,
        #[serde(default)]
        image_url: Option<String>,
        #[serde(default)]
        image_file_name: Option<String>,
    },

    /// Mark one received message as read; `sender_id` is the message's
    /// original sender, who gets notified.
    #[serde(rename = "MarkMessageAsRead", rename_all = "camelCase")]
    MarkMessageAsRead { message_id: Uuid, sender_id: Uuid },

    #[serde(rename = "Typing", rename_all = "camelCase")]
    Typing { receiver_id: Uuid },

    #[serde(rename = "StopTyping", rename_all = "camelCase")]
    StopTyping { receiver_id: Uuid },
}

/// Outbound WebSocket events from server to client
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum WsOutboundEvent {
    #[serde(rename = "UserOnline", rename_all = "camelCase")]
    UserOnline { user_id: Uuid },

    #[serde(rename = "UserOffline", rename_all = "camelCase")]
    UserOffline { user_id: Uuid },

    /// A message addressed to this connection's user arrived.
    #[serde(rename = "ReceiveMessage", rename_all = "camelCase")]
    ReceiveMessage { message: Message },

    /// Echo to the sender confirming the message was persisted.
    #[serde(rename = "MessageSent", rename_all = "camelCase")]
    MessageSent { message: Message },

    #[serde(rename = "MessageRead", rename_all = "camelCase")]
    MessageRead {
        message_id: Uuid,
        reader_user_id: Uuid,
    },

    #[serde(rename = "UserTyping", rename_all = "camelCase")]
    UserTyping { user_id: Uuid },

    #[serde(rename = "UserStoppedTyping", rename_all = "camelCase")]
    UserStoppedTyping { user_id: Uuid },

    /// Failure report to the connection that triggered it. Never broadcast.
    #[serde(rename = "Error", rename_all = "camelCase")]
    Error { message: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_send_message_from_client_payload() {
        let raw = r#"{
            "type": "SendMessage",
            "receiverId": "6f2c63f0-54d7-4b3a-9f52-6c29f3a4f0d1",
            "content": "hi",
            "messageType": "text"
        }"#;

        let evt: WsInboundEvent = serde_json::from_str(raw).unwrap();
        match evt {
            WsInboundEvent::SendMessage {
                content,
                message_type,
                image_url,
                ..
            } => {
                assert_eq!(content, "hi");
                assert_eq!(message_type, MessageKind::Text);
                assert!(image_url.is_none());
            }
            other => panic!("unexpected event: {:?}", other),
        }
    }

    #[test]
    fn send_message_defaults_to_text_kind() {
        let raw = r#"{
            "type": "SendMessage",
            "receiverId": "6f2c63f0-54d7-4b3a-9f52-6c29f3a4f0d1"
        }"#;

        let evt: WsInboundEvent = serde_json::from_str(raw).unwrap();
        match evt {
            WsInboundEvent::SendMessage {
                content,
                message_type,
                ..
            } => {
                assert_eq!(content, "");
                assert_eq!(message_type, MessageKind::Text);
            }
            other => panic!("unexpected event: {:?}", other),
        }
    }

    #[test]
    fn outbound_events_carry_expected_names() {
        let user_id = Uuid::new_v4();

        let online = serde_json::to_value(WsOutboundEvent::UserOnline { user_id }).unwrap();
        assert_eq!(online["type"], "UserOnline");
        assert_eq!(online["userId"], user_id.to_string());

        let read = serde_json::to_value(WsOutboundEvent::MessageRead {
            message_id: user_id,
            reader_user_id: user_id,
        })
        .unwrap();
        assert_eq!(read["type"], "MessageRead");
        assert_eq!(read["messageId"], user_id.to_string());
        assert_eq!(read["readerUserId"], user_id.to_string());
    }

    #[test]
    fn typing_events_parse_and_serialize_symmetrically() {
        let receiver = Uuid::new_v4();
        let raw = format!(r#"{{"type": "StopTyping", "receiverId": "{receiver}"}}"#);

        let evt: WsInboundEvent = serde_json::from_str(&raw).unwrap();
        match evt {
            WsInboundEvent::StopTyping { receiver_id } => assert_eq!(receiver_id, receiver),
            other => panic!("unexpected event: {:?}", other),
        }

        let out =
            serde_json::to_value(WsOutboundEvent::UserStoppedTyping { user_id: receiver }).unwrap();
        assert_eq!(out["type"], "UserStoppedTyping");
    }
}
