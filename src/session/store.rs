//! Session storage.
//!
//! The [`SessionStore`] trait keeps callers independent of where sessions
//! live; [`MemorySessionStore`] is the process-local implementation.

use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::RwLock;
use tracing::debug;

use super::types::{Session, SessionId};
use crate::error::{HarnessError, HarnessResult};

/// What logout does to a stored session.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum RetentionPolicy {
    /// Flip `active` off and keep the entry so it still counts in statistics.
    #[default]
    RetainOnLogout,
    /// Remove the entry.
    DeleteOnLogout,
}

/// Storage operations the SSO session manager needs.
pub trait SessionStore: Send + Sync {
    /// Get session by ID.
    fn get(&self, id: &SessionId) -> HarnessResult<Option<Session>>;

    /// Insert or replace a session.
    fn put(&self, session: Session) -> HarnessResult<()>;

    /// Delete a session by ID. Returns whether it existed.
    fn delete(&self, id: &SessionId) -> HarnessResult<bool>;

    /// All stored sessions, in no particular order.
    fn list(&self) -> HarnessResult<Vec<Session>>;

    /// Modify a stored session in place. Returns whether it existed.
    fn update(&self, id: &SessionId, apply: &dyn Fn(&mut Session)) -> HarnessResult<bool>;

    /// Number of stored sessions.
    fn len(&self) -> HarnessResult<usize> {
        self.list().map(|sessions| sessions.len())
    }

    fn is_empty(&self) -> HarnessResult<bool> {
        self.len().map(|n| n == 0)
    }
}

/// In-memory session table. Nothing survives the process.
#[derive(Debug, Default)]
pub struct MemorySessionStore {
    sessions: RwLock<HashMap<SessionId, Session>>,
}

impl MemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Remove sessions expired at `now`. Returns the number removed.
    ///
    /// Never called implicitly; expired sessions otherwise stay for statistics.
    pub fn evict_expired_at(&self, now: DateTime<Utc>) -> HarnessResult<usize> {
        let mut sessions = self.write()?;
        let before = sessions.len();
        sessions.retain(|_, session| !session.is_expired_at(now));
        let evicted = before - sessions.len();
        debug!(evicted, remaining = sessions.len(), "Evicted expired sessions");
        Ok(evicted)
    }

    pub fn evict_expired(&self) -> HarnessResult<usize> {
        self.evict_expired_at(Utc::now())
    }

    fn read(
        &self,
    ) -> HarnessResult<std::sync::RwLockReadGuard<'_, HashMap<SessionId, Session>>> {
        self.sessions
            .read()
            .map_err(|_| HarnessError::LockPoisoned("session store"))
    }

    fn write(
        &self,
    ) -> HarnessResult<std::sync::RwLockWriteGuard<'_, HashMap<SessionId, Session>>> {
        self.sessions
            .write()
            .map_err(|_| HarnessError::LockPoisoned("session store"))
    }
}

impl SessionStore for MemorySessionStore {
    fn get(&self, id: &SessionId) -> HarnessResult<Option<Session>> {
        Ok(self.read()?.get(id).cloned())
    }

    fn put(&self, session: Session) -> HarnessResult<()> {
        self.write()?.insert(session.id, session);
        Ok(())
    }

    fn delete(&self, id: &SessionId) -> HarnessResult<bool> {
        Ok(self.write()?.remove(id).is_some())
    }

    fn list(&self) -> HarnessResult<Vec<Session>> {
        Ok(self.read()?.values().cloned().collect())
    }

    fn update(&self, id: &SessionId, apply: &dyn Fn(&mut Session)) -> HarnessResult<bool> {
        let mut sessions = self.write()?;
        match sessions.get_mut(id) {
            Some(session) => {
                apply(session);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    fn len(&self) -> HarnessResult<usize> {
        Ok(self.read()?.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::types::SESSION_TTL_SECS;
    use chrono::Duration;
    use std::collections::BTreeMap;

    fn test_session() -> Session {
        let mut attributes = BTreeMap::new();
        attributes.insert("email".to_string(), "user@example.com".to_string());
        Session::new(attributes, SESSION_TTL_SECS)
    }

    #[test]
    fn test_session_put_and_get() {
        let store = MemorySessionStore::new();
        let session = test_session();
        let id = session.id;

        store.put(session).unwrap();

        let retrieved = store.get(&id).unwrap().unwrap();
        assert_eq!(retrieved.email.as_deref(), Some("user@example.com"));
        assert!(store.get(&SessionId::new()).unwrap().is_none());
    }

    #[test]
    fn test_session_update() {
        let store = MemorySessionStore::new();
        let session = test_session();
        let id = session.id;
        store.put(session).unwrap();

        assert!(store.update(&id, &|s| s.active = false).unwrap());
        assert!(!store.get(&id).unwrap().unwrap().active);
        assert!(!store.update(&SessionId::new(), &|s| s.active = false).unwrap());
    }

    #[test]
    fn test_session_delete() {
        let store = MemorySessionStore::new();
        let session = test_session();
        let id = session.id;

        store.put(session).unwrap();
        assert!(store.delete(&id).unwrap());
        assert!(!store.delete(&id).unwrap());
        assert!(store.is_empty().unwrap());
    }

    #[test]
    fn test_list_keeps_expired() {
        let store = MemorySessionStore::new();
        let mut expired = test_session();
        expired.expires_at = Utc::now() - Duration::seconds(10);
        store.put(expired).unwrap();
        store.put(test_session()).unwrap();

        assert_eq!(store.list().unwrap().len(), 2);
        assert_eq!(store.len().unwrap(), 2);
    }

    #[test]
    fn test_evict_expired() {
        let store = MemorySessionStore::new();
        let mut expired = test_session();
        expired.expires_at = Utc::now() - Duration::seconds(10);
        store.put(expired).unwrap();
        store.put(test_session()).unwrap();

        assert_eq!(store.evict_expired().unwrap(), 1);
        assert_eq!(store.len().unwrap(), 1);

        let later = Utc::now() + Duration::hours(9);
        assert_eq!(store.evict_expired_at(later).unwrap(), 1);
        assert!(store.is_empty().unwrap());
    }
}
