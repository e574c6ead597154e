//! Connection registry
//!
//! Maps each user to at most one live connection and back, so frames can be
//! delivered by user id and a closing connection can find its user.

use std::collections::HashMap;
use std::sync::Arc;

use thiserror::Error;
use tokio::sync::RwLock;
use uuid::Uuid;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConnError {
    #[error("connection closed")]
    Closed,
}

#[derive(Debug, Error)]
pub enum HubError {
    #[error("delivery to user {user} on connection {conn} failed: {source}")]
    Delivery {
        user: String,
        conn: Uuid,
        #[source]
        source: ConnError,
    },
}

/// A live, writable client connection
pub trait Connection: Send + Sync {
    fn id(&self) -> Uuid;
    fn send_text(&self, text: &str) -> Result<(), ConnError>;
    fn close(&self);
}

#[derive(Default)]
struct Bindings {
    by_user: HashMap<String, Arc<dyn Connection>>,
    by_conn: HashMap<Uuid, String>,
}

#[derive(Default)]
pub struct ConnectionRegistry {
    inner: RwLock<Bindings>,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind `conn` to `user`, closing the connection it replaces
    pub async fn bind(&self, user: &str, conn: Arc<dyn Connection>) {
        let mut inner = self.inner.write().await;
        if let Some(old) = inner.by_user.get(user).cloned() {
            if old.id() != conn.id() {
                inner.by_conn.remove(&old.id());
                old.close();
                tracing::debug!("Replaced connection {} of user {}", old.id(), user);
            }
        }
        inner.by_conn.insert(conn.id(), user.to_string());
        inner.by_user.insert(user.to_string(), conn);
    }

    /// Forget `conn` and close it
    pub async fn unbind(&self, conn: &dyn Connection) {
        let id = conn.id();
        {
            let mut inner = self.inner.write().await;
            if let Some(user) = inner.by_conn.remove(&id) {
                let still_current = inner
                    .by_user
                    .get(&user)
                    .map(|c| c.id() == id)
                    .unwrap_or(false);
                if still_current {
                    inner.by_user.remove(&user);
                }
                tracing::debug!("Unbound connection {} of user {}", id, user);
            }
        }
        conn.close();
    }

    /// Deliver `text` to `users`, or to everyone when `users` is empty.
    ///
    /// Users without a connection are skipped. The first failed send stops
    /// delivery; messages already sent are not recalled.
    pub async fn send_to(&self, text: &str, users: &[String]) -> Result<(), HubError> {
        let inner = self.inner.read().await;

        let targets: Vec<(&String, &Arc<dyn Connection>)> = if users.is_empty() {
            inner.by_user.iter().collect()
        } else {
            users
                .iter()
                .filter_map(|u| inner.by_user.get_key_value(u))
                .collect()
        };

        for (user, conn) in targets {
            conn.send_text(text).map_err(|source| HubError::Delivery {
                user: user.clone(),
                conn: conn.id(),
                source,
            })?;
        }
        Ok(())
    }

    /// Best-effort push; failures are logged
    pub async fn notify(&self, text: &str, users: &[String]) {
        if let Err(e) = self.send_to(text, users).await {
            tracing::warn!("Notification not fully delivered: {}", e);
        }
    }

    pub async fn is_bound(&self, user: &str) -> bool {
        self.inner.read().await.by_user.contains_key(user)
    }

    pub async fn len(&self) -> usize {
        self.inner.read().await.by_user.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Mutex;

    struct FakeConn {
        id: Uuid,
        sent: Mutex<Vec<String>>,
        closed: AtomicBool,
        broken: bool,
    }

    impl FakeConn {
        fn new() -> Arc<Self> {
            Arc::new(Self {
                id: Uuid::new_v4(),
                sent: Mutex::new(Vec::new()),
                closed: AtomicBool::new(false),
                broken: false,
            })
        }

        fn broken() -> Arc<Self> {
            Arc::new(Self {
                id: Uuid::new_v4(),
                sent: Mutex::new(Vec::new()),
                closed: AtomicBool::new(false),
                broken: true,
            })
        }

        fn sent(&self) -> Vec<String> {
            self.sent.lock().unwrap().clone()
        }

        fn is_closed(&self) -> bool {
            self.closed.load(Ordering::SeqCst)
        }
    }

    impl Connection for FakeConn {
        fn id(&self) -> Uuid {
            self.id
        }

        fn send_text(&self, text: &str) -> Result<(), ConnError> {
            if self.broken || self.is_closed() {
                return Err(ConnError::Closed);
            }
            self.sent.lock().unwrap().push(text.to_string());
            Ok(())
        }

        fn close(&self) {
            self.closed.store(true, Ordering::SeqCst);
        }
    }

    #[tokio::test]
    async fn test_rebind_closes_previous_connection() {
        let hub = ConnectionRegistry::new();
        let first = FakeConn::new();
        let second = FakeConn::new();

        hub.bind("u1", first.clone()).await;
        hub.bind("u1", second.clone()).await;
        assert!(first.is_closed());
        assert!(!second.is_closed());
        assert_eq!(hub.len().await, 1);

        hub.send_to("hello", &["u1".to_string()]).await.unwrap();
        assert!(first.sent().is_empty());
        assert_eq!(second.sent(), vec!["hello"]);

        // The replaced connection's teardown must not evict the new one
        hub.unbind(first.as_ref()).await;
        assert!(hub.is_bound("u1").await);

        hub.unbind(second.as_ref()).await;
        assert!(!hub.is_bound("u1").await);
        assert!(second.is_closed());
    }

    #[tokio::test]
    async fn test_broadcast_and_targeted_delivery() {
        let hub = ConnectionRegistry::new();
        let a = FakeConn::new();
        let b = FakeConn::new();
        hub.bind("a", a.clone()).await;
        hub.bind("b", b.clone()).await;

        hub.send_to("all", &[]).await.unwrap();
        hub.send_to("just b", &["b".to_string(), "ghost".to_string()])
            .await
            .unwrap();

        assert_eq!(a.sent(), vec!["all"]);
        assert_eq!(b.sent(), vec!["all", "just b"]);
    }

    #[tokio::test]
    async fn test_failed_send_aborts_and_names_target() {
        let hub = ConnectionRegistry::new();
        let a = FakeConn::new();
        let bad = FakeConn::broken();
        let c = FakeConn::new();
        hub.bind("a", a.clone()).await;
        hub.bind("bad", bad.clone()).await;
        hub.bind("c", c.clone()).await;

        let err = hub
            .send_to(
                "m",
                &["a".to_string(), "bad".to_string(), "c".to_string()],
            )
            .await
            .unwrap_err();

        let HubError::Delivery { user, conn, .. } = err;
        assert_eq!(user, "bad");
        assert_eq!(conn, bad.id());
        assert_eq!(a.sent(), vec!["m"]);
        assert!(c.sent().is_empty());
    }

    #[tokio::test]
    async fn test_broadcast_stops_at_broken_connection() {
        let hub = ConnectionRegistry::new();
        let a = FakeConn::new();
        let bad = FakeConn::broken();
        let c = FakeConn::new();
        hub.bind("a", a.clone()).await;
        hub.bind("bad", bad.clone()).await;
        hub.bind("c", c.clone()).await;

        let order: Vec<String> = hub.inner.read().await.by_user.keys().cloned().collect();
        let before_bad: Vec<&String> = order.iter().take_while(|u| *u != "bad").collect();

        let err = hub.send_to("m", &[]).await.unwrap_err();
        let HubError::Delivery { user, conn, .. } = err;
        assert_eq!(user, "bad");
        assert_eq!(conn, bad.id());

        for (name, fake) in [("a", &a), ("c", &c)] {
            let expected: Vec<String> = if before_bad.iter().any(|u| *u == name) {
                vec!["m".to_string()]
            } else {
                Vec::new()
            };
            assert_eq!(fake.sent(), expected, "delivery to {}", name);
        }
        assert!(bad.sent().is_empty());
        assert_eq!(hub.len().await, 3);
    }

    #[tokio::test]
    async fn test_unbind_unknown_connection_only_closes() {
        let hub = ConnectionRegistry::new();
        let stray = FakeConn::new();
        hub.unbind(stray.as_ref()).await;
        assert!(stray.is_closed());
        assert_eq!(hub.len().await, 0);
    }
}
