//! Session registry
//!
//! Maps a broker client id to the user that authenticated on it. Written on
//! every accepted CONNECT, read on every SUBSCRIBE and PUBLISH.

use crate::auth::User;
use dashmap::DashMap;
use std::sync::Arc;

/// Storage for client id to user bindings
///
/// Implementations must be safe for concurrent binds and lookups. A lookup
/// racing a bind for the same client id sees either the old or the new user,
/// never a partial entry.
pub trait SessionStore: Send + Sync {
    /// Bind a client id to a user, replacing any earlier binding
    fn bind(&self, client_id: &str, user: Arc<User>);

    /// The user bound to a client id, if any
    fn lookup(&self, client_id: &str) -> Option<Arc<User>>;

    /// Remove a binding. Returns true if one existed.
    fn evict(&self, client_id: &str) -> bool;

    /// Number of live bindings
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// In-memory session registry backed by a sharded concurrent map
#[derive(Debug, Default)]
pub struct SessionRegistry {
    sessions: DashMap<String, Arc<User>>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }
}

impl SessionStore for SessionRegistry {
    fn bind(&self, client_id: &str, user: Arc<User>) {
        self.sessions.insert(client_id.to_string(), user);
    }

    fn lookup(&self, client_id: &str) -> Option<Arc<User>> {
        self.sessions
            .get(client_id)
            .map(|entry| Arc::clone(entry.value()))
    }

    fn evict(&self, client_id: &str) -> bool {
        self.sessions.remove(client_id).is_some()
    }

    fn len(&self) -> usize {
        self.sessions.len()
    }
}
