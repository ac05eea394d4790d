use std::sync::Arc;
use uuid::Uuid;

use crate::models::message::{MessageKind, NewMessage};
use crate::services::message_service::MessageStore;

use super::{
    message_types::{WsInboundEvent, WsOutboundEvent},
    ConnectionId, DeliveryRouter, PresenceRegistry,
};

/// Orchestrator for realtime chat events.
///
/// Each connection moves through `Connecting -> Joined -> Closed`. A
/// registered but unbound connection is `Connecting`; a successful
/// `JoinChat` binds it to a user (`Joined`); `handle_disconnect` removes it
/// for good. Events that require an identity are dropped silently while the
/// connection is still `Connecting`.
///
/// The transport layer must invoke the hub sequentially per connection;
/// calls for different connections may interleave freely.
pub struct ChatHub {
    registry: PresenceRegistry,
    router: DeliveryRouter,
    store: Arc<dyn MessageStore>,
}

impl ChatHub {
    pub fn new(registry: PresenceRegistry, store: Arc<dyn MessageStore>) -> Self {
        let router = DeliveryRouter::new(registry.clone());
        Self {
            registry,
            router,
            store,
        }
    }

    /// Dispatch one inbound event from `conn`.
    ///
    /// `authenticated` is the user identity the auth layer verified when the
    /// connection was established; the hub never re-derives it.
    pub async fn handle_event(
        &self,
        conn: ConnectionId,
        authenticated: Uuid,
        event: WsInboundEvent,
    ) {
        match event {
            WsInboundEvent::JoinChat { user_id } => {
                self.handle_join(conn, authenticated, user_id).await
            }
            WsInboundEvent::SendMessage {
                receiver_id,
                content,
                message_type,
                image_url,
                image_file_name,
            } => {
                self.handle_send_message(
                    conn,
                    receiver_id,
                    content,
                    message_type,
                    image_url,
                    image_file_name,
                )
                .await
            }
            WsInboundEvent::MarkMessageAsRead {
                message_id,
                sender_id,
            } => self.handle_mark_read(conn, message_id, sender_id).await,
            WsInboundEvent::Typing { receiver_id } => {
                self.handle_typing(conn, receiver_id, true).await
            }
            WsInboundEvent::StopTyping { receiver_id } => {
                self.handle_typing(conn, receiver_id, false).await
            }
        }
    }

    /// Bind `conn` to `user_id` and announce the user online.
    ///
    /// A connection binds to exactly one identity for its lifetime: a join
    /// for a user other than the authenticated one is rejected, and a
    /// repeated join is a no-op (no second online broadcast).
    pub async fn handle_join(&self, conn: ConnectionId, authenticated: Uuid, user_id: Uuid) {
        if user_id != authenticated {
            tracing::warn!(
                "Connection {} attempted to join as user {} but authenticated as {}",
                conn,
                user_id,
                authenticated
            );
            self.reply_error(conn, "join does not match the authenticated user")
                .await;
            return;
        }

        if self.registry.user_for(conn).await.is_some() {
            tracing::debug!("Connection {} re-joined, ignoring", conn);
            return;
        }

        self.registry.associate(conn, user_id).await;
        self.router
            .send_to_all_except(conn, &WsOutboundEvent::UserOnline { user_id })
            .await;

        tracing::info!(user_id = %user_id, connection_id = %conn, "user joined chat");
    }

    /// Persist a message, then fan it out.
    ///
    /// The receiver push happens only after the store accepted the message,
    /// so a receiver never sees a message the sender believes failed. The
    /// `MessageSent` echo is a best-effort confirmation on top of that.
    pub async fn handle_send_message(
        &self,
        conn: ConnectionId,
        receiver_id: Uuid,
        content: String,
        kind: MessageKind,
        image_url: Option<String>,
        image_file_name: Option<String>,
    ) {
        let Some(sender_id) = self.registry.user_for(conn).await else {
            tracing::debug!("Dropping SendMessage from connection {} (not joined)", conn);
            return;
        };

        if kind == MessageKind::Image && image_url.is_none() {
            self.reply_error(conn, "image messages require an imageUrl")
                .await;
            return;
        }

        let message = match self
            .store
            .save(NewMessage {
                sender_id,
                receiver_id,
                content,
                kind,
                image_url,
                image_file_name,
            })
            .await
        {
            Ok(message) => message,
            Err(e) => {
                tracing::warn!(
                    error = %e,
                    sender_id = %sender_id,
                    receiver_id = %receiver_id,
                    "failed to persist message"
                );
                self.reply_error(conn, "message could not be saved").await;
                return;
            }
        };

        self.router
            .send_to_user(
                receiver_id,
                &WsOutboundEvent::ReceiveMessage {
                    message: message.clone(),
                },
            )
            .await;
        self.router
            .send_to_caller(conn, &WsOutboundEvent::MessageSent { message })
            .await;
    }

    /// Flip a message to read and notify its original sender.
    ///
    /// The store update is scoped to the caller as the message's receiver;
    /// an unknown, foreign or already-read message reports not-found and
    /// nothing is broadcast.
    pub async fn handle_mark_read(&self, conn: ConnectionId, message_id: Uuid, sender_id: Uuid) {
        let Some(reader_id) = self.registry.user_for(conn).await else {
            tracing::debug!(
                "Dropping MarkMessageAsRead from connection {} (not joined)",
                conn
            );
            return;
        };

        match self.store.mark_read(message_id, reader_id).await {
            Ok(true) => {
                self.router
                    .send_to_user(
                        sender_id,
                        &WsOutboundEvent::MessageRead {
                            message_id,
                            reader_user_id: reader_id,
                        },
                    )
                    .await;
            }
            Ok(false) => {
                self.reply_error(conn, "message not found").await;
            }
            Err(e) => {
                tracing::warn!(error = %e, message_id = %message_id, "failed to mark message read");
                self.reply_error(conn, "could not update read state").await;
            }
        }
    }

    /// Relay a typing signal; nothing is persisted.
    pub async fn handle_typing(&self, conn: ConnectionId, receiver_id: Uuid, started: bool) {
        let Some(user_id) = self.registry.user_for(conn).await else {
            tracing::debug!("Dropping typing signal from connection {} (not joined)", conn);
            return;
        };

        let event = if started {
            WsOutboundEvent::UserTyping { user_id }
        } else {
            WsOutboundEvent::UserStoppedTyping { user_id }
        };
        self.router.send_to_user(receiver_id, &event).await;
    }

    /// Transport close: remove the connection and announce the user offline
    /// if it had joined. Closing a connection that never joined, or one
    /// already cleaned up, is a no-op.
    pub async fn handle_disconnect(&self, conn: ConnectionId) {
        match self.registry.unregister(conn).await {
            Some(user_id) => {
                self.router
                    .send_to_all_except(conn, &WsOutboundEvent::UserOffline { user_id })
                    .await;
                tracing::info!(user_id = %user_id, connection_id = %conn, "user disconnected");
            }
            None => {
                tracing::debug!("Connection {} closed without joining", conn);
            }
        }
    }

    async fn reply_error(&self, conn: ConnectionId, message: &str) {
        self.router
            .send_to_caller(
                conn,
                &WsOutboundEvent::Error {
                    message: message.to_string(),
                },
            )
            .await;
    }
}
