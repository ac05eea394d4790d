use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{
    mpsc::{unbounded_channel, UnboundedReceiver, UnboundedSender},
    RwLock,
};
use uuid::Uuid;

pub mod hub;
pub mod message_types;
pub mod router;

pub use hub::ChatHub;
pub use router::DeliveryRouter;

/// Unique identifier for a live WebSocket connection
///
/// Assigned when the transport session registers, before the client has
/// declared any identity. This allows for precise cleanup when connections
/// close.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnectionId(Uuid);

impl ConnectionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ConnectionId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

/// One live connection: its outbound frame channel plus the user it joined
/// as, if any.
struct Connection {
    sender: UnboundedSender<String>,
    user_id: Option<Uuid>,
}

#[derive(Default)]
struct Inner {
    connections: HashMap<ConnectionId, Connection>,
    // user id -> connections joined as that user; entries are never empty
    by_user: HashMap<Uuid, Vec<ConnectionId>>,
}

/// Presence registry: the authoritative user <-> connection mapping
///
/// This is the single shared mutable structure in the service. All reads and
/// mutations go through one `RwLock`, so concurrent join/disconnect/lookup
/// never observe a partially updated mapping. An association must never
/// outlive its connection: `unregister` removes the channel and the user
/// binding in one critical section.
#[derive(Default, Clone)]
pub struct PresenceRegistry {
    inner: Arc<RwLock<Inner>>,
}

impl PresenceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a new transport connection.
    ///
    /// Returns the connection id and the receiver half of its outbound frame
    /// channel. The connection starts unbound (no user) until `associate`.
    pub async fn register(&self) -> (ConnectionId, UnboundedReceiver<String>) {
        let (tx, rx) = unbounded_channel();
        let conn_id = ConnectionId::new();

        let mut guard = self.inner.write().await;
        guard.connections.insert(
            conn_id,
            Connection {
                sender: tx,
                user_id: None,
            },
        );

        tracing::debug!(
            "Registered connection {}, total connections: {}",
            conn_id,
            guard.connections.len()
        );

        (conn_id, rx)
    }

    /// Record that `conn` belongs to `user_id`.
    ///
    /// Always succeeds for a live connection. Re-associating an already
    /// bound connection is tolerated but flagged as anomalous; if the new
    /// user differs, the old binding is replaced so the mapping stays
    /// consistent.
    pub async fn associate(&self, conn: ConnectionId, user_id: Uuid) {
        let mut guard = self.inner.write().await;

        let Some(connection) = guard.connections.get_mut(&conn) else {
            // Disconnect raced an incomplete join; nothing to bind to.
            tracing::warn!("Ignoring associate for unknown connection {}", conn);
            return;
        };

        match connection.user_id.replace(user_id) {
            Some(previous) if previous == user_id => {
                tracing::warn!(
                    "Connection {} re-associated with user {} (already bound)",
                    conn,
                    user_id
                );
                return;
            }
            Some(previous) => {
                tracing::warn!(
                    "Connection {} re-associated from user {} to user {}",
                    conn,
                    previous,
                    user_id
                );
                remove_user_connection(&mut guard.by_user, previous, conn);
            }
            None => {}
        }

        guard.by_user.entry(user_id).or_default().push(conn);

        tracing::debug!(
            "Associated connection {} with user {}, user connections: {}",
            conn,
            user_id,
            guard.by_user.get(&user_id).map(|v| v.len()).unwrap_or(0)
        );
    }

    /// Remove the user binding for `conn`, keeping the connection open.
    ///
    /// Returns the user that was bound, or `None` if the connection never
    /// joined (disconnects may race an incomplete join).
    pub async fn disassociate(&self, conn: ConnectionId) -> Option<Uuid> {
        let mut guard = self.inner.write().await;

        let user_id = guard.connections.get_mut(&conn)?.user_id.take()?;
        remove_user_connection(&mut guard.by_user, user_id, conn);

        tracing::debug!("Disassociated connection {} from user {}", conn, user_id);

        Some(user_id)
    }

    /// Remove the connection and any user binding it holds.
    ///
    /// This is the cleanup path for transport close. Returns the user the
    /// connection was bound to, if any.
    pub async fn unregister(&self, conn: ConnectionId) -> Option<Uuid> {
        let mut guard = self.inner.write().await;

        let connection = guard.connections.remove(&conn)?;
        let user_id = connection.user_id;

        if let Some(user_id) = user_id {
            remove_user_connection(&mut guard.by_user, user_id, conn);
        }

        tracing::debug!(
            "Unregistered connection {}, remaining connections: {}",
            conn,
            guard.connections.len()
        );

        user_id
    }

    /// The user `conn` is joined as, if it has joined.
    pub async fn user_for(&self, conn: ConnectionId) -> Option<Uuid> {
        let guard = self.inner.read().await;
        guard.connections.get(&conn).and_then(|c| c.user_id)
    }

    /// All live connections joined as `user_id`. Empty means offline.
    pub async fn connections_for(&self, user_id: Uuid) -> Vec<ConnectionId> {
        let guard = self.inner.read().await;
        guard.by_user.get(&user_id).cloned().unwrap_or_default()
    }

    /// True iff at least one live connection is joined as `user_id`.
    pub async fn is_online(&self, user_id: Uuid) -> bool {
        let guard = self.inner.read().await;
        guard.by_user.contains_key(&user_id)
    }

    /// Snapshot of the outbound channels for all of a user's connections.
    pub(crate) async fn senders_for_user(&self, user_id: Uuid) -> Vec<UnboundedSender<String>> {
        let guard = self.inner.read().await;
        let Some(conns) = guard.by_user.get(&user_id) else {
            return Vec::new();
        };
        conns
            .iter()
            .filter_map(|c| guard.connections.get(c))
            .map(|c| c.sender.clone())
            .collect()
    }

    /// Outbound channel for one connection, if it is still live.
    pub(crate) async fn sender_for(&self, conn: ConnectionId) -> Option<UnboundedSender<String>> {
        let guard = self.inner.read().await;
        guard.connections.get(&conn).map(|c| c.sender.clone())
    }

    /// Snapshot of the outbound channels for every connection except one.
    pub(crate) async fn senders_except(
        &self,
        excluded: ConnectionId,
    ) -> Vec<UnboundedSender<String>> {
        let guard = self.inner.read().await;
        guard
            .connections
            .iter()
            .filter(|(id, _)| **id != excluded)
            .map(|(_, c)| c.sender.clone())
            .collect()
    }
}

fn remove_user_connection(
    by_user: &mut HashMap<Uuid, Vec<ConnectionId>>,
    user_id: Uuid,
    conn: ConnectionId,
) {
    if let Some(conns) = by_user.get_mut(&user_id) {
        conns.retain(|c| *c != conn);
        if conns.is_empty() {
            by_user.remove(&user_id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn associate_makes_user_online() {
        let registry = PresenceRegistry::new();
        let user = Uuid::new_v4();

        let (conn, _rx) = registry.register().await;
        assert!(!registry.is_online(user).await);

        registry.associate(conn, user).await;
        assert!(registry.is_online(user).await);
        assert_eq!(registry.connections_for(user).await, vec![conn]);
        assert_eq!(registry.user_for(conn).await, Some(user));
    }

    #[tokio::test]
    async fn disassociate_returns_bound_user() {
        let registry = PresenceRegistry::new();
        let user = Uuid::new_v4();

        let (conn, _rx) = registry.register().await;
        registry.associate(conn, user).await;

        assert_eq!(registry.disassociate(conn).await, Some(user));
        assert!(!registry.is_online(user).await);
        // Channel stays open; only the binding is gone.
        assert!(registry.sender_for(conn).await.is_some());
    }

    #[tokio::test]
    async fn disassociate_unknown_connection_is_noop() {
        let registry = PresenceRegistry::new();
        assert_eq!(registry.disassociate(ConnectionId::new()).await, None);

        // Registered but never joined: also nothing to remove.
        let (conn, _rx) = registry.register().await;
        assert_eq!(registry.disassociate(conn).await, None);
    }

    #[tokio::test]
    async fn user_stays_online_while_another_connection_remains() {
        let registry = PresenceRegistry::new();
        let user = Uuid::new_v4();

        let (c1, _rx1) = registry.register().await;
        let (c2, _rx2) = registry.register().await;
        registry.associate(c1, user).await;
        registry.associate(c2, user).await;

        assert_eq!(registry.unregister(c1).await, Some(user));
        assert!(registry.is_online(user).await);
        assert_eq!(registry.connections_for(user).await, vec![c2]);

        assert_eq!(registry.unregister(c2).await, Some(user));
        assert!(!registry.is_online(user).await);
    }

    #[tokio::test]
    async fn unregister_removes_connection_from_lookup() {
        let registry = PresenceRegistry::new();
        let user = Uuid::new_v4();

        let (conn, _rx) = registry.register().await;
        registry.associate(conn, user).await;
        registry.unregister(conn).await;

        assert!(registry.connections_for(user).await.is_empty());
        assert!(registry.sender_for(conn).await.is_none());
        assert_eq!(registry.user_for(conn).await, None);
    }

    #[tokio::test]
    async fn concurrent_churn_leaves_mapping_consistent() {
        let registry = PresenceRegistry::new();
        let user = Uuid::new_v4();

        let mut handles = Vec::new();
        for _ in 0..32 {
            let registry = registry.clone();
            handles.push(tokio::spawn(async move {
                let (conn, _rx) = registry.register().await;
                registry.associate(conn, user).await;
                tokio::task::yield_now().await;
                registry.unregister(conn).await;
            }));
        }

        // One connection joins and stays for the duration of the churn.
        let (survivor, _rx) = registry.register().await;
        registry.associate(survivor, user).await;

        for handle in handles {
            handle.await.unwrap();
        }

        // Every disconnected connection is gone from the user's set.
        assert_eq!(registry.connections_for(user).await, vec![survivor]);
        assert!(registry.is_online(user).await);

        registry.unregister(survivor).await;
        assert!(!registry.is_online(user).await);
    }
}
