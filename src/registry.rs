//! Session registry: every live session keyed by id.

use log::{info, warn};
use std::collections::HashMap;

use crate::session::SessionStore;
use crate::types::StaticSession;

#[derive(Debug, Default)]
pub struct SessionRegistry {
    sessions: HashMap<String, SessionStore>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry pre-seeded with sessions from configuration.
    pub fn with_sessions(seed: &[StaticSession]) -> Self {
        let mut registry = Self::new();
        for s in seed {
            registry.create(&s.id, &s.tag);
        }
        registry
    }

    /// Returns `false` when a session with this id already exists.
    pub fn create(&mut self, id: &str, tag: &str) -> bool {
        if self.sessions.contains_key(id) {
            warn!("Session {} already exists, skipping", id);
            return false;
        }
        info!("Creating session {} ({})", id, tag);
        self.sessions
            .insert(id.to_string(), SessionStore::new(id, tag));
        true
    }

    /// Drop a session with all its clients and entities.
    pub fn destroy(&mut self, id: &str) -> Option<SessionStore> {
        let removed = self.sessions.remove(id);
        if removed.is_some() {
            info!("Destroyed session {}", id);
        }
        removed
    }

    pub fn get(&self, id: &str) -> Option<&SessionStore> {
        self.sessions.get(id)
    }

    pub fn get_mut(&mut self, id: &str) -> Option<&mut SessionStore> {
        self.sessions.get_mut(id)
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut SessionStore> {
        self.sessions.values_mut()
    }

    pub fn iter(&self) -> impl Iterator<Item = &SessionStore> {
        self.sessions.values()
    }

    /// `(id, tag)` of every session, sorted by id.
    pub fn list(&self) -> Vec<(String, String)> {
        let mut out: Vec<_> = self
            .sessions
            .values()
            .map(|s| (s.id().to_string(), s.tag().to_string()))
            .collect();
        out.sort();
        out
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn seeded_sessions_are_listed() {
        let reg = SessionRegistry::with_sessions(&[
            StaticSession {
                id: "s2".into(),
                tag: "lobby".into(),
            },
            StaticSession {
                id: "s1".into(),
                tag: "demo".into(),
            },
        ]);
        assert_eq!(
            reg.list(),
            vec![
                ("s1".to_string(), "demo".to_string()),
                ("s2".to_string(), "lobby".to_string())
            ]
        );
    }

    #[test]
    fn duplicate_create_keeps_existing_session() {
        let mut reg = SessionRegistry::new();
        assert!(reg.create("s1", "demo"));
        reg.get_mut("s1")
            .unwrap()
            .add_client("c1", "alice", std::time::Instant::now());
        assert!(!reg.create("s1", "other"));
        assert_eq!(reg.get("s1").unwrap().tag(), "demo");
        assert_eq!(reg.get("s1").unwrap().client_count(), 1);
    }

    #[test]
    fn destroy_is_idempotent() {
        let mut reg = SessionRegistry::new();
        reg.create("s1", "demo");
        assert!(reg.destroy("s1").is_some());
        assert!(reg.destroy("s1").is_none());
        assert!(reg.is_empty());
    }
}
