//! Heartbeat monitor: expires clients that stopped sending heartbeats.
//!
//! A sweep walks every session. Each client whose last heartbeat is older
//! than the timeout is removed exactly as an explicit exit would remove it,
//! except that a `delete` status is published first for every entity the
//! client still owns, so the rest of the session learns about the removal.

use log::{debug, warn};
use std::time::{Duration, Instant};

use crate::protocol::{expiry_delete_payload, topics, EntityVerb, Outbound};
use crate::registry::SessionRegistry;
use crate::types::SyncServiceConfig;

/// Outcome of one sweep.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SweepReport {
    pub expired_clients: usize,
    pub removed_entities: usize,
}

#[derive(Debug, Clone, Copy)]
pub struct HeartbeatMonitor {
    period: Duration,
    timeout: Duration,
}

impl HeartbeatMonitor {
    pub fn new(period: Duration, timeout: Duration) -> Self {
        Self { period, timeout }
    }

    pub fn from_config(config: &SyncServiceConfig) -> Self {
        Self::new(config.heartbeat_period(), config.heartbeat_timeout())
    }

    pub fn period(&self) -> Duration {
        self.period
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Expire stale clients across all sessions.
    ///
    /// `notify` receives each deletion notice before the owning client is
    /// removed from its session.
    pub fn sweep<F>(&self, registry: &mut SessionRegistry, now: Instant, mut notify: F) -> SweepReport
    where
        F: FnMut(Outbound),
    {
        let mut report = SweepReport::default();

        for session in registry.iter_mut() {
            for client_id in session.expired_clients(now, self.timeout) {
                let doomed: Vec<String> = session
                    .client(&client_id)
                    .map(|c| c.owned_entities().to_vec())
                    .unwrap_or_default();

                warn!(
                    "[{}] client {} missed heartbeats for over {:?}, removing it and {} entities",
                    session.id(),
                    client_id,
                    self.timeout,
                    doomed.len()
                );

                for entity_id in &doomed {
                    notify(Outbound::new(
                        topics::entity_status(session.id(), entity_id, EntityVerb::Delete.as_str()),
                        expiry_delete_payload(session.id(), entity_id),
                    ));
                }

                if let Some(removed) = session.remove_client(&client_id) {
                    report.removed_entities += removed.len();
                }
                report.expired_clients += 1;
            }
        }

        debug!(
            "Heartbeat sweep: {} clients expired, {} entities removed",
            report.expired_clients, report.removed_entities
        );
        report
    }
}

/// Drive [`crate::service::SyncService::sweep_heartbeats`] on the configured
/// period until the task is cancelled. Ticks that fall behind are skipped,
/// never run back to back.
#[cfg(feature = "server")]
pub async fn run(service: std::sync::Arc<crate::service::SyncService>) {
    use tokio::time::{interval, MissedTickBehavior};

    let period = service.monitor().period().max(Duration::from_millis(1));
    let mut timer = interval(period);
    timer.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        timer.tick().await;
        service.sweep_heartbeats(tokio::time::Instant::now().into_std());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::{Entity, EntityType, Extent};
    use crate::types::{Quat, Vec3};

    fn cube(id: &str) -> Entity {
        Entity::with_world_transform(
            id,
            "cube",
            EntityType::Mesh,
            Vec3::zero(),
            Quat::identity(),
            Extent::Scale(Vec3::one()),
        )
    }

    #[test]
    fn explicitly_removed_entity_leaves_the_cascade_set() {
        let t0 = Instant::now();
        let mut reg = SessionRegistry::new();
        reg.create("s1", "demo");
        let s = reg.get_mut("s1").unwrap();
        s.add_client("c1", "alice", t0);
        s.add_entity(cube("e1"), Some("c1"));
        s.add_entity(cube("e2"), Some("c1"));
        s.remove_entity("e1");

        let monitor = HeartbeatMonitor::new(Duration::from_secs(5), Duration::from_secs(10));
        let mut notices = Vec::new();
        let report = monitor.sweep(&mut reg, t0 + Duration::from_secs(11), |o| notices.push(o));

        assert_eq!(report.expired_clients, 1);
        assert_eq!(report.removed_entities, 1);
        assert_eq!(notices.len(), 1);
        assert_eq!(notices[0].topic, "vos/status/s1/entity/e2/delete");
        assert_eq!(notices[0].payload["entity-id"], "e2");
        assert_eq!(reg.get("s1").unwrap().client_count(), 0);
    }

    #[test]
    fn fresh_clients_survive() {
        let t0 = Instant::now();
        let mut reg = SessionRegistry::new();
        reg.create("s1", "demo");
        reg.get_mut("s1").unwrap().add_client("c1", "alice", t0);

        let monitor = HeartbeatMonitor::new(Duration::from_secs(5), Duration::from_secs(10));
        let report = monitor.sweep(&mut reg, t0 + Duration::from_secs(10), |_| {});
        assert_eq!(report, SweepReport::default());
        assert_eq!(reg.get("s1").unwrap().client_count(), 1);
    }
}
