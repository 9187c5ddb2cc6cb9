use crate::error::SessionError;
use crate::table::Table;
use log::{debug, warn};
use std::collections::HashMap;
use std::sync::{PoisonError, RwLock};
use std::time::{Duration, SystemTime};
use uuid::Uuid;

/// Name of the cookie carrying the session id
pub const SESSION_COOKIE: &str = "session";

/// Default lifetime of a session without writes: 24 hours
pub const SESSION_DURATION: Duration = Duration::from_secs(24 * 60 * 60);

/// One stored table per pipeline
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Slot {
    /// Activities / tasks (grades 0-10)
    Tasks,
    /// Evaluations / sub-topics (0/1 flags)
    Evaluations,
}

impl Slot {
    pub fn key(self) -> &'static str {
        match self {
            Slot::Tasks => "datos_excel",
            Slot::Evaluations => "datos_evaluaciones",
        }
    }
}

/// Data held for one browser session
#[derive(Debug)]
struct SessionEntry {
    /// Serialized table per slot
    slots: HashMap<Slot, String>,

    /// Time after which the entry is treated as absent
    expires_at: SystemTime,
}

/// In-memory per-session storage of uploaded tables
///
/// Tables are kept in their JSON transport form, so a slot is written whole on
/// upload and decoded on every read. Concurrent writes to the same session are
/// not ordered; the last one wins.
#[derive(Debug)]
pub struct SessionStore {
    sessions: RwLock<HashMap<String, SessionEntry>>,
    ttl: Duration,
}

impl Default for SessionStore {
    fn default() -> Self {
        Self::new(SESSION_DURATION)
    }
}

impl SessionStore {
    pub fn new(ttl: Duration) -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
            ttl,
        }
    }

    /// Returns a fresh, unused session id.
    pub fn create_session(&self) -> String {
        Uuid::new_v4().to_string()
    }

    /// Serializes `table` into `slot`, replacing whatever was there.
    pub fn put(&self, session_id: &str, slot: Slot, table: &Table) -> Result<(), SessionError> {
        let blob = table
            .to_json()
            .map_err(|e| SessionError::Corrupt(e.to_string()))?;
        self.put_blob(session_id, slot, blob);
        Ok(())
    }

    /// Stores an already serialized table. The blob is not checked until read.
    pub fn put_blob(&self, session_id: &str, slot: Slot, blob: String) {
        let mut sessions = self.sessions.write().unwrap_or_else(PoisonError::into_inner);
        let expires_at = SystemTime::now() + self.ttl;
        let entry = sessions
            .entry(session_id.to_string())
            .or_insert_with(|| SessionEntry {
                slots: HashMap::new(),
                expires_at,
            });
        entry.expires_at = expires_at;
        entry.slots.insert(slot, blob);
    }

    /// Decodes the table in `slot`
    ///
    /// Returns `Ok(None)` when nothing is stored or the session expired.
    ///
    /// # Errors
    /// * [`SessionError::Corrupt`] if the blob does not decode; the slot is
    ///   dropped before returning so the next read sees an empty slot
    pub fn get(&self, session_id: &str, slot: Slot) -> Result<Option<Table>, SessionError> {
        let decoded = {
            let mut sessions = self.sessions.write().unwrap_or_else(PoisonError::into_inner);
            purge_expired(&mut sessions);
            match sessions.get(session_id).and_then(|e| e.slots.get(&slot)) {
                Some(blob) => Table::from_json(blob),
                None => return Ok(None),
            }
        };

        match decoded {
            Ok(table) => Ok(Some(table)),
            Err(e) => {
                warn!("dropping corrupt {} slot: {}", slot.key(), e);
                self.clear(session_id, slot);
                Err(SessionError::Corrupt(e.to_string()))
            }
        }
    }

    /// True if `slot` holds a blob for a live session.
    pub fn contains(&self, session_id: &str, slot: Slot) -> bool {
        let sessions = self.sessions.read().unwrap_or_else(PoisonError::into_inner);
        sessions
            .get(session_id)
            .is_some_and(|e| e.expires_at > SystemTime::now() && e.slots.contains_key(&slot))
    }

    /// Drops the table in `slot`. Clearing an empty slot is a no-op.
    pub fn clear(&self, session_id: &str, slot: Slot) {
        let mut sessions = self.sessions.write().unwrap_or_else(PoisonError::into_inner);
        if let Some(entry) = sessions.get_mut(session_id) {
            entry.slots.remove(&slot);
            if entry.slots.is_empty() {
                sessions.remove(session_id);
            }
        }
    }

    /// Number of live sessions holding at least one table
    pub fn len(&self) -> usize {
        let sessions = self.sessions.read().unwrap_or_else(PoisonError::into_inner);
        let now = SystemTime::now();
        sessions.values().filter(|e| e.expires_at > now).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn purge_expired(sessions: &mut HashMap<String, SessionEntry>) {
    let now = SystemTime::now();
    let before = sessions.len();
    sessions.retain(|_, entry| entry.expires_at > now);
    let purged = before - sessions.len();
    if purged > 0 {
        debug!("purged {} expired session(s)", purged);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::table::{Cell, Header};

    fn sample() -> Table {
        Table::new(
            vec![Header::Label("Curso".into()), Header::Label("T1".into())],
            vec![vec![Some(Cell::Text("1A".into())), Some(Cell::Number(9.0))]],
        )
    }

    #[test]
    fn put_then_get_returns_the_table() {
        let store = SessionStore::default();
        let id = store.create_session();
        store.put(&id, Slot::Tasks, &sample()).unwrap();
        assert_eq!(store.get(&id, Slot::Tasks).unwrap(), Some(sample()));
        assert_eq!(store.get(&id, Slot::Evaluations).unwrap(), None);
    }

    #[test]
    fn slots_and_sessions_are_independent() {
        let store = SessionStore::default();
        let a = store.create_session();
        let b = store.create_session();
        assert_ne!(a, b);
        store.put(&a, Slot::Tasks, &sample()).unwrap();
        store.put(&a, Slot::Evaluations, &sample()).unwrap();
        store.clear(&a, Slot::Tasks);
        assert!(!store.contains(&a, Slot::Tasks));
        assert!(store.contains(&a, Slot::Evaluations));
        assert!(!store.contains(&b, Slot::Evaluations));
    }

    #[test]
    fn corrupt_blob_is_dropped_on_read() {
        let store = SessionStore::default();
        let id = store.create_session();
        store.put_blob(&id, Slot::Tasks, "{not json".to_string());
        assert!(matches!(
            store.get(&id, Slot::Tasks),
            Err(SessionError::Corrupt(_))
        ));
        assert_eq!(store.get(&id, Slot::Tasks).unwrap(), None);
    }

    #[test]
    fn expired_sessions_read_as_empty() {
        let store = SessionStore::new(Duration::ZERO);
        let id = store.create_session();
        store.put(&id, Slot::Tasks, &sample()).unwrap();
        assert_eq!(store.get(&id, Slot::Tasks).unwrap(), None);
        assert!(store.is_empty());
    }

    #[test]
    fn clear_removes_empty_sessions() {
        let store = SessionStore::default();
        let id = store.create_session();
        store.put(&id, Slot::Tasks, &sample()).unwrap();
        assert_eq!(store.len(), 1);
        store.clear(&id, Slot::Tasks);
        store.clear(&id, Slot::Tasks);
        assert!(store.is_empty());
    }
}
