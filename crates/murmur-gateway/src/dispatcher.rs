use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::sync::{RwLock, mpsc};
use tracing::debug;
use uuid::Uuid;

use murmur_types::events::{GatewayEvent, OnlineUser};

/// One live connection handle. A user may hold several at once
/// (multi-device); registrations are additive, never replacing.
struct ConnectionHandle {
    conn_id: Uuid,
    established_at: DateTime<Utc>,
    tx: mpsc::UnboundedSender<GatewayEvent>,
}

struct UserEntry {
    username: String,
    profile_pic_url: String,
    handles: Vec<ConnectionHandle>,
}

/// Presence Registry + Delivery Engine: maps user ids to live connection
/// handles and pushes events to them. The only truly shared in-memory
/// structure in the system.
#[derive(Clone)]
pub struct Dispatcher {
    inner: Arc<DispatcherInner>,
}

struct DispatcherInner {
    connections: RwLock<HashMap<Uuid, UserEntry>>,
}

impl Default for Dispatcher {
    fn default() -> Self {
        Self::new()
    }
}

impl Dispatcher {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(DispatcherInner {
                connections: RwLock::new(HashMap::new()),
            }),
        }
    }

    /// Register a live connection for a user. Returns the conn id used for
    /// cleanup. Pushes the updated peer set to everyone.
    pub async fn register(
        &self,
        user_id: Uuid,
        username: String,
        profile_pic_url: String,
        tx: mpsc::UnboundedSender<GatewayEvent>,
    ) -> Uuid {
        let conn_id = Uuid::new_v4();
        {
            let mut connections = self.inner.connections.write().await;
            let entry = connections.entry(user_id).or_insert_with(|| UserEntry {
                username,
                profile_pic_url,
                handles: Vec::new(),
            });
            entry.handles.push(ConnectionHandle {
                conn_id,
                established_at: Utc::now(),
                tx,
            });
            debug!(
                "Registered connection {} for user {} (total={})",
                conn_id,
                user_id,
                entry.handles.len()
            );
        }

        self.push_presence().await;
        conn_id
    }

    /// Remove one connection. Safe to call for a handle that was never
    /// registered — an idempotent no-op. Pushes the updated peer set when
    /// something actually changed.
    pub async fn unregister(&self, user_id: Uuid, conn_id: Uuid) {
        let removed = {
            let mut connections = self.inner.connections.write().await;
            let Some(entry) = connections.get_mut(&user_id) else {
                return;
            };
            let before = entry.handles.len();
            entry.handles.retain(|h| h.conn_id != conn_id);
            let removed = entry.handles.len() != before;
            if entry.handles.is_empty() {
                connections.remove(&user_id);
            }
            removed
        };

        if removed {
            debug!("Unregistered connection {} for user {}", conn_id, user_id);
            self.push_presence().await;
        }
    }

    pub async fn is_online(&self, user_id: Uuid) -> bool {
        self.inner.connections.read().await.contains_key(&user_id)
    }

    /// Number of live connections a user holds.
    pub async fn connection_count(&self, user_id: Uuid) -> usize {
        self.inner
            .connections
            .read()
            .await
            .get(&user_id)
            .map_or(0, |e| e.handles.len())
    }

    /// How long the user's oldest surviving connection has been up.
    pub async fn connected_since(&self, user_id: Uuid) -> Option<DateTime<Utc>> {
        self.inner
            .connections
            .read()
            .await
            .get(&user_id)
            .and_then(|e| e.handles.iter().map(|h| h.established_at).min())
    }

    pub async fn online_users(&self) -> Vec<OnlineUser> {
        self.inner
            .connections
            .read()
            .await
            .iter()
            .map(|(&user_id, entry)| OnlineUser {
                user_id,
                username: entry.username.clone(),
                profile_pic_url: entry.profile_pic_url.clone(),
            })
            .collect()
    }

    /// The live-user set as seen by one peer (everyone but itself).
    pub async fn peers_of(&self, user_id: Uuid) -> Vec<OnlineUser> {
        let mut users = self.online_users().await;
        users.retain(|u| u.user_id != user_id);
        users
    }

    /// Push an event to every live connection of a user, fire-and-forget.
    /// Returns false when no connection accepted it — the caller then falls
    /// back to persisted-unread state. A dead handle is pruned from the
    /// registry, never surfaced as an error to the sender.
    pub async fn deliver(&self, user_id: Uuid, event: GatewayEvent) -> bool {
        let mut dead: Vec<Uuid> = Vec::new();
        let mut delivered = false;
        {
            let connections = self.inner.connections.read().await;
            let Some(entry) = connections.get(&user_id) else {
                return false;
            };
            for handle in &entry.handles {
                if handle.tx.send(event.clone()).is_ok() {
                    delivered = true;
                } else {
                    dead.push(handle.conn_id);
                }
            }
        }

        for conn_id in dead {
            debug!("Pruning dead connection {} for user {}", conn_id, user_id);
            self.unregister(user_id, conn_id).await;
        }

        delivered
    }

    /// Event-driven presence fan-out: every connected peer gets the live-user
    /// set with itself filtered out. The periodic emit in the connection loop
    /// re-sends the same thing as a reconciliation safety net.
    async fn push_presence(&self) {
        let connections = self.inner.connections.read().await;
        let all: Vec<OnlineUser> = connections
            .iter()
            .map(|(&user_id, entry)| OnlineUser {
                user_id,
                username: entry.username.clone(),
                profile_pic_url: entry.profile_pic_url.clone(),
            })
            .collect();

        for (&user_id, entry) in connections.iter() {
            let users: Vec<OnlineUser> = all
                .iter()
                .filter(|u| u.user_id != user_id)
                .cloned()
                .collect();
            let event = GatewayEvent::ConnectedUsers { users };
            for handle in &entry.handles {
                let _ = handle.tx.send(event.clone());
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn channel() -> (
        mpsc::UnboundedSender<GatewayEvent>,
        mpsc::UnboundedReceiver<GatewayEvent>,
    ) {
        mpsc::unbounded_channel()
    }

    #[tokio::test]
    async fn registrations_are_additive_per_user() {
        let dispatcher = Dispatcher::new();
        let user = Uuid::new_v4();
        let (tx1, _rx1) = channel();
        let (tx2, _rx2) = channel();

        dispatcher.register(user, "jane".into(), "".into(), tx1).await;
        dispatcher.register(user, "jane".into(), "".into(), tx2).await;

        assert_eq!(dispatcher.connection_count(user).await, 2);
        assert_eq!(dispatcher.online_users().await.len(), 1);
    }

    #[tokio::test]
    async fn deliver_reaches_every_device() {
        let dispatcher = Dispatcher::new();
        let user = Uuid::new_v4();
        let (tx1, mut rx1) = channel();
        let (tx2, mut rx2) = channel();
        dispatcher.register(user, "jane".into(), "".into(), tx1).await;
        dispatcher.register(user, "jane".into(), "".into(), tx2).await;

        assert!(dispatcher.deliver(user, GatewayEvent::PostLiked).await);
        // both devices got presence pushes first; drain until the ack
        let got1 = std::iter::from_fn(|| rx1.try_recv().ok())
            .any(|e| matches!(e, GatewayEvent::PostLiked));
        let got2 = std::iter::from_fn(|| rx2.try_recv().ok())
            .any(|e| matches!(e, GatewayEvent::PostLiked));
        assert!(got1 && got2);
    }

    #[tokio::test]
    async fn deliver_to_offline_user_reports_false() {
        let dispatcher = Dispatcher::new();
        assert!(!dispatcher.deliver(Uuid::new_v4(), GatewayEvent::PostLiked).await);
    }

    #[tokio::test]
    async fn unregister_is_idempotent() {
        let dispatcher = Dispatcher::new();
        let user = Uuid::new_v4();
        let (tx, _rx) = channel();
        let conn_id = dispatcher.register(user, "jane".into(), "".into(), tx).await;

        dispatcher.unregister(user, conn_id).await;
        assert!(!dispatcher.is_online(user).await);

        // never-registered handle and double unregister are both no-ops
        dispatcher.unregister(user, conn_id).await;
        dispatcher.unregister(Uuid::new_v4(), Uuid::new_v4()).await;
    }

    #[tokio::test]
    async fn presence_push_excludes_the_receiving_peer() {
        let dispatcher = Dispatcher::new();
        let jane = Uuid::new_v4();
        let amit = Uuid::new_v4();
        let (jane_tx, mut jane_rx) = channel();
        let (amit_tx, _amit_rx) = channel();

        dispatcher.register(jane, "jane".into(), "".into(), jane_tx).await;
        dispatcher.register(amit, "amit".into(), "".into(), amit_tx).await;

        let mut last_set = None;
        while let Ok(event) = jane_rx.try_recv() {
            if let GatewayEvent::ConnectedUsers { users } = event {
                last_set = Some(users);
            }
        }
        let users = last_set.expect("jane saw a presence push");
        assert_eq!(users.len(), 1);
        assert_eq!(users[0].user_id, amit);
    }

    #[tokio::test]
    async fn dead_handles_are_pruned_on_delivery() {
        let dispatcher = Dispatcher::new();
        let user = Uuid::new_v4();
        let (tx, rx) = channel();
        dispatcher.register(user, "jane".into(), "".into(), tx).await;
        drop(rx);

        assert!(!dispatcher.deliver(user, GatewayEvent::PostLiked).await);
        assert!(!dispatcher.is_online(user).await);
    }
}
