//! The global set of authenticated connections, indexed by user id and by
//! player name (spec.md §3 "Session registry", §4.3).
//!
//! Mirrors `valence_network`'s `SharedServer` synchronization style: short
//! critical sections guarded by plain locks, never held across an `.await`.
//! The registry holds non-owning references; `master-net`'s accept loop
//! remains the owner of each `Conn`'s lifetime.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use master_net::Conn;
use tracing::debug;
use uuid::Uuid;

#[derive(Default)]
pub struct SessionRegistry {
    by_user_id: RwLock<HashMap<u64, Arc<Conn>>>,
    by_player_name: RwLock<HashMap<String, Arc<Conn>>>,
    /// Indexed separately from `by_user_id` so channel lobby broadcasts
    /// (keyed by connection id, not every lobby member having a resolved
    /// user id yet) can resolve a send target without waiting on login.
    by_conn_id: RwLock<HashMap<Uuid, Arc<Conn>>>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Idempotent on the same connection: re-adding a connection already
    /// registered under its session's user id/player name is a no-op in
    /// effect (the same key maps to the same value either way).
    pub fn add(&self, conn: Arc<Conn>) {
        let Some(session) = conn.session() else {
            debug!(conn_id = %conn.id(), "refusing to register a connection with no session");
            return;
        };

        self.by_conn_id
            .write()
            .unwrap()
            .insert(conn.id(), Arc::clone(&conn));
        self.by_user_id
            .write()
            .unwrap()
            .insert(session.user.id, Arc::clone(&conn));
        self.by_player_name
            .write()
            .unwrap()
            .insert(session.user.playername.clone(), conn);
    }

    pub fn remove(&self, conn: &Conn) {
        self.by_conn_id.write().unwrap().remove(&conn.id());

        let Some(session) = conn.session() else {
            return;
        };

        self.by_user_id.write().unwrap().remove(&session.user.id);
        self.by_player_name
            .write()
            .unwrap()
            .remove(&session.user.playername);
    }

    pub fn find_by_conn_id(&self, conn_id: Uuid) -> Option<Arc<Conn>> {
        self.by_conn_id.read().unwrap().get(&conn_id).cloned()
    }

    pub fn find_by_owner_id(&self, user_id: u64) -> Option<Arc<Conn>> {
        self.by_user_id.read().unwrap().get(&user_id).cloned()
    }

    /// Lookup is case-sensitive; names are compared byte-exact, matching
    /// the legacy client's own comparison (spec.md is silent here, but
    /// `Room`'s byte-exact password comparison sets the precedent for how
    /// this codebase treats string equality).
    pub fn find_by_player_name(&self, name: &str) -> Option<Arc<Conn>> {
        self.by_player_name.read().unwrap().get(name).cloned()
    }

    pub fn len(&self) -> usize {
        self.by_user_id.read().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use async_trait::async_trait;
    use bytes::Bytes;
    use master_model::UserSession;
    use master_net::spawn_connection;
    use master_userservice::User;
    use tokio::net::{TcpListener, TcpStream};

    struct NoopHandler;

    #[async_trait]
    impl master_net::FrameHandler for NoopHandler {
        async fn handle_frame(&self, _conn: &Arc<Conn>, _packet_id: u8, _body: Bytes) {}
    }

    async fn connect() -> Arc<Conn> {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let connect_task = tokio::spawn(TcpStream::connect(addr));
        let (server_stream, peer_addr) = listener.accept().await.unwrap();
        connect_task.await.unwrap().unwrap();

        spawn_connection(
            server_stream,
            peer_addr,
            Duration::from_secs(30),
            None,
            Arc::new(NoopHandler),
        )
    }

    fn logged_in_user(id: u64, name: &str) -> User {
        User {
            id,
            username: name.to_string(),
            playername: name.to_string(),
        }
    }

    #[tokio::test]
    async fn add_then_remove_clears_every_index() {
        let conn = connect().await;
        conn.attach_session(Arc::new(UserSession::new(
            logged_in_user(1, "alice"),
            conn.peer_addr(),
        )));

        let registry = SessionRegistry::new();
        registry.add(Arc::clone(&conn));

        assert_eq!(registry.len(), 1);
        assert!(!registry.is_empty());
        assert!(registry.find_by_conn_id(conn.id()).is_some());
        assert!(registry.find_by_owner_id(1).is_some());
        assert!(registry.find_by_player_name("alice").is_some());
        assert!(registry.find_by_player_name("Alice").is_none(), "lookup is case-sensitive");

        registry.remove(&conn);

        assert_eq!(registry.len(), 0);
        assert!(registry.is_empty());
        assert!(registry.find_by_conn_id(conn.id()).is_none());
        assert!(registry.find_by_owner_id(1).is_none());
        assert!(registry.find_by_player_name("alice").is_none());
    }

    #[tokio::test]
    async fn add_without_a_session_is_a_no_op() {
        let conn = connect().await;
        let registry = SessionRegistry::new();

        registry.add(Arc::clone(&conn));

        assert!(registry.is_empty());
        assert!(registry.find_by_conn_id(conn.id()).is_none());
    }

    #[tokio::test]
    async fn remove_on_an_unregistered_connection_does_not_panic() {
        let conn = connect().await;
        let registry = SessionRegistry::new();

        registry.remove(&conn);

        assert!(registry.is_empty());
    }

    #[tokio::test]
    async fn re_adding_the_same_connection_is_idempotent() {
        let conn = connect().await;
        conn.attach_session(Arc::new(UserSession::new(
            logged_in_user(7, "bob"),
            conn.peer_addr(),
        )));

        let registry = SessionRegistry::new();
        registry.add(Arc::clone(&conn));
        registry.add(Arc::clone(&conn));

        assert_eq!(registry.len(), 1);
    }
}
