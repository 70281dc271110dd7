//! Per-participant liveness and cascade-ownership record.

use std::time::{Duration, Instant};

#[derive(Debug, Clone)]
pub struct ClientRecord {
    pub id: String,
    pub tag: String,
    pub last_heartbeat: Instant,
    /// Entities removed together with this client, in creation order.
    entities_to_destroy_on_exit: Vec<String>,
}

impl ClientRecord {
    pub fn new(id: impl Into<String>, tag: impl Into<String>, now: Instant) -> Self {
        Self {
            id: id.into(),
            tag: tag.into(),
            last_heartbeat: now,
            entities_to_destroy_on_exit: Vec::new(),
        }
    }

    pub fn heartbeat(&mut self, now: Instant) {
        self.last_heartbeat = now;
    }

    /// True when no heartbeat arrived within `timeout` before `now`.
    pub fn is_expired(&self, now: Instant, timeout: Duration) -> bool {
        now.saturating_duration_since(self.last_heartbeat) > timeout
    }

    pub fn own_entity(&mut self, entity_id: &str) {
        if !self.owns(entity_id) {
            self.entities_to_destroy_on_exit.push(entity_id.to_string());
        }
    }

    /// Drop `entity_id` from the cascade set. Returns whether it was there.
    pub fn disown(&mut self, entity_id: &str) -> bool {
        let before = self.entities_to_destroy_on_exit.len();
        self.entities_to_destroy_on_exit.retain(|e| e != entity_id);
        self.entities_to_destroy_on_exit.len() != before
    }

    pub fn owns(&self, entity_id: &str) -> bool {
        self.entities_to_destroy_on_exit.iter().any(|e| e == entity_id)
    }

    pub fn owned_entities(&self) -> &[String] {
        &self.entities_to_destroy_on_exit
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn expiry_is_strictly_after_timeout() {
        let t0 = Instant::now();
        let c = ClientRecord::new("c1", "alice", t0);
        let timeout = Duration::from_secs(250);
        assert!(!c.is_expired(t0 + timeout, timeout));
        assert!(c.is_expired(t0 + timeout + Duration::from_millis(1), timeout));
    }

    #[test]
    fn heartbeat_resets_expiry() {
        let t0 = Instant::now();
        let mut c = ClientRecord::new("c1", "alice", t0);
        let timeout = Duration::from_secs(10);
        c.heartbeat(t0 + Duration::from_secs(8));
        assert!(!c.is_expired(t0 + Duration::from_secs(15), timeout));
    }

    #[test]
    fn ownership_is_a_set() {
        let mut c = ClientRecord::new("c1", "alice", Instant::now());
        c.own_entity("e1");
        c.own_entity("e2");
        c.own_entity("e1");
        assert_eq!(c.owned_entities(), ["e1".to_string(), "e2".to_string()]);
    }

    #[test]
    fn disown_removes_only_the_named_entity() {
        let mut c = ClientRecord::new("c1", "alice", Instant::now());
        c.own_entity("e1");
        c.own_entity("e2");
        assert!(c.disown("e1"));
        assert!(!c.disown("e1"));
        assert_eq!(c.owned_entities(), ["e2".to_string()]);
    }
}
