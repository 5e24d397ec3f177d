//! Session-keyed state with an explicit open/close lifecycle.

use dashmap::DashMap;
use uuid::Uuid;

/// Concurrent per-session store.
///
/// Each session's value is updated under that key's exclusive lock, so
/// sessions never interfere with each other.
#[derive(Debug)]
pub struct SessionStore<V> {
    sessions: DashMap<Uuid, V>,
}

impl<V: Default + Clone> SessionStore<V> {
    pub fn new() -> Self {
        Self {
            sessions: DashMap::new(),
        }
    }

    /// Start tracking a session with fresh state. Reopening resets it.
    pub fn open(&self, session_id: Uuid) {
        self.sessions.insert(session_id, V::default());
    }

    /// Stop tracking a session, returning its final state.
    pub fn close(&self, session_id: &Uuid) -> Option<V> {
        self.sessions.remove(session_id).map(|(_, value)| value)
    }

    pub fn get(&self, session_id: &Uuid) -> Option<V> {
        self.sessions.get(session_id).map(|entry| entry.value().clone())
    }

    /// Read a session's state in place without cloning it.
    pub fn read<R>(&self, session_id: &Uuid, f: impl FnOnce(&V) -> R) -> Option<R> {
        self.sessions.get(session_id).map(|entry| f(entry.value()))
    }

    /// Mutate a session's state in place, creating it if absent.
    pub fn update<R>(&self, session_id: Uuid, f: impl FnOnce(&mut V) -> R) -> R {
        let mut entry = self.sessions.entry(session_id).or_default();
        f(entry.value_mut())
    }

    pub fn contains(&self, session_id: &Uuid) -> bool {
        self.sessions.contains_key(session_id)
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}

impl<V: Default + Clone> Default for SessionStore<V> {
    fn default() -> Self {
        Self::new()
    }
}
