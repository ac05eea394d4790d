use uuid::Uuid;

use super::{message_types::WsOutboundEvent, ConnectionId, PresenceRegistry};

/// Stateless fan-out of outbound events to live connections.
///
/// Delivery is best-effort: events to offline users or closed connections
/// are dropped without error, and durable history in the message store is
/// the recovery path. Frames pushed to one connection are delivered in the
/// order they are issued here; the per-connection channel is FIFO.
#[derive(Clone)]
pub struct DeliveryRouter {
    registry: PresenceRegistry,
}

impl DeliveryRouter {
    pub fn new(registry: PresenceRegistry) -> Self {
        Self { registry }
    }

    /// Push `event` to every live connection of `user_id`.
    ///
    /// A user with no connections is a silent no-op, not an error.
    pub async fn send_to_user(&self, user_id: Uuid, event: &WsOutboundEvent) {
        let Some(frame) = serialize(event) else {
            return;
        };

        let senders = self.registry.senders_for_user(user_id).await;
        if senders.is_empty() {
            tracing::debug!("No live connections for user {}, dropping event", user_id);
            return;
        }

        for sender in senders {
            if sender.send(frame.clone()).is_err() {
                tracing::debug!("Dropping frame for closed connection of user {}", user_id);
            }
        }
    }

    /// Push `event` to every live connection except `excluded`.
    ///
    /// Used for the global online/offline presence broadcast; best-effort.
    pub async fn send_to_all_except(&self, excluded: ConnectionId, event: &WsOutboundEvent) {
        let Some(frame) = serialize(event) else {
            return;
        };

        for sender in self.registry.senders_except(excluded).await {
            // Closed connections drop out of the registry on disconnect;
            // a failed send here just means that cleanup is still in flight.
            let _ = sender.send(frame.clone());
        }
    }

    /// Push `event` back to the connection that triggered it.
    pub async fn send_to_caller(&self, conn: ConnectionId, event: &WsOutboundEvent) {
        let Some(frame) = serialize(event) else {
            return;
        };

        match self.registry.sender_for(conn).await {
            Some(sender) => {
                if sender.send(frame).is_err() {
                    tracing::debug!("Dropping reply for closed connection {}", conn);
                }
            }
            None => tracing::debug!("Dropping reply for unknown connection {}", conn),
        }
    }
}

fn serialize(event: &WsOutboundEvent) -> Option<String> {
    match serde_json::to_string(event) {
        Ok(frame) => Some(frame),
        Err(e) => {
            tracing::error!(error = %e, "Failed to serialize outbound event");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::mpsc::UnboundedReceiver;

    fn event_type(frame: &str) -> String {
        let value: serde_json::Value = serde_json::from_str(frame).unwrap();
        value["type"].as_str().unwrap().to_string()
    }

    fn drain(rx: &mut UnboundedReceiver<String>) -> Vec<String> {
        let mut frames = Vec::new();
        while let Ok(frame) = rx.try_recv() {
            frames.push(frame);
        }
        frames
    }

    #[tokio::test]
    async fn send_to_user_reaches_all_of_their_connections() {
        let registry = PresenceRegistry::new();
        let router = DeliveryRouter::new(registry.clone());
        let user = Uuid::new_v4();

        let (c1, mut rx1) = registry.register().await;
        let (c2, mut rx2) = registry.register().await;
        registry.associate(c1, user).await;
        registry.associate(c2, user).await;

        router
            .send_to_user(user, &WsOutboundEvent::UserTyping { user_id: user })
            .await;

        assert_eq!(drain(&mut rx1).len(), 1);
        assert_eq!(drain(&mut rx2).len(), 1);
    }

    #[tokio::test]
    async fn send_to_offline_user_is_a_noop() {
        let registry = PresenceRegistry::new();
        let router = DeliveryRouter::new(registry.clone());

        // Nothing to assert beyond "does not panic / does not error".
        router
            .send_to_user(
                Uuid::new_v4(),
                &WsOutboundEvent::UserTyping {
                    user_id: Uuid::new_v4(),
                },
            )
            .await;
    }

    #[tokio::test]
    async fn send_to_all_except_skips_the_excluded_connection() {
        let registry = PresenceRegistry::new();
        let router = DeliveryRouter::new(registry.clone());
        let user = Uuid::new_v4();

        let (joined, mut joined_rx) = registry.register().await;
        let (connecting, mut connecting_rx) = registry.register().await;
        registry.associate(joined, user).await;

        router
            .send_to_all_except(joined, &WsOutboundEvent::UserOnline { user_id: user })
            .await;

        // The broadcast reaches even not-yet-joined connections, but never
        // the excluded one.
        assert!(drain(&mut joined_rx).is_empty());
        assert_eq!(drain(&mut connecting_rx).len(), 1);
        let _ = connecting;
    }

    #[tokio::test]
    async fn frames_to_one_connection_preserve_issue_order() {
        let registry = PresenceRegistry::new();
        let router = DeliveryRouter::new(registry.clone());
        let user = Uuid::new_v4();

        let (conn, mut rx) = registry.register().await;
        registry.associate(conn, user).await;

        router
            .send_to_user(user, &WsOutboundEvent::UserTyping { user_id: user })
            .await;
        router
            .send_to_user(user, &WsOutboundEvent::UserStoppedTyping { user_id: user })
            .await;

        let frames = drain(&mut rx);
        let types: Vec<String> = frames.iter().map(|f| event_type(f)).collect();
        assert_eq!(types, vec!["UserTyping", "UserStoppedTyping"]);
    }

    #[tokio::test]
    async fn send_to_caller_targets_only_that_connection() {
        let registry = PresenceRegistry::new();
        let router = DeliveryRouter::new(registry.clone());

        let (caller, mut caller_rx) = registry.register().await;
        let (other, mut other_rx) = registry.register().await;

        router
            .send_to_caller(
                caller,
                &WsOutboundEvent::Error {
                    message: "nope".into(),
                },
            )
            .await;

        assert_eq!(drain(&mut caller_rx).len(), 1);
        assert!(drain(&mut other_rx).is_empty());
        let _ = other;
    }
}
