//! SyncService: the one owned object holding all session state.
//!
//! Message handling and heartbeat sweeps both take the same registry lock,
//! so the two never interleave. Status messages are published from inside
//! that lock, in the order the router produced them; the [`Publisher`] is
//! required to be non-blocking.

use log::{debug, info, warn};
use parking_lot::{Mutex, RwLock};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

use crate::auth::{AllowAll, Authorizer};
use crate::bus::Publisher;
use crate::error::SyncError;
use crate::heartbeat::{HeartbeatMonitor, SweepReport};
use crate::protocol::Outbound;
use crate::registry::SessionRegistry;
use crate::router::Router;
use crate::session::{SessionSnapshot, SessionStore};
use crate::types::{SyncServiceConfig, SyncStats};

pub struct SyncService {
    config: SyncServiceConfig,
    registry: Mutex<SessionRegistry>,
    router: Router,
    monitor: HeartbeatMonitor,
    publisher: RwLock<Option<Arc<dyn Publisher>>>,
    sweep_count: AtomicU64,
}

impl SyncService {
    /// Service with the permissive [`AllowAll`] authorizer.
    pub fn new(config: SyncServiceConfig) -> Self {
        Self::with_authorizer(config, Arc::new(AllowAll))
    }

    pub fn with_authorizer(config: SyncServiceConfig, authorizer: Arc<dyn Authorizer>) -> Self {
        let registry = SessionRegistry::with_sessions(&config.sessions);
        Self {
            monitor: HeartbeatMonitor::from_config(&config),
            config,
            registry: Mutex::new(registry),
            router: Router::new(authorizer),
            publisher: RwLock::new(None),
            sweep_count: AtomicU64::new(0),
        }
    }

    pub fn config(&self) -> &SyncServiceConfig {
        &self.config
    }

    pub fn monitor(&self) -> &HeartbeatMonitor {
        &self.monitor
    }

    // -----------------------------------------------------------------------
    // Connection
    // -----------------------------------------------------------------------

    pub fn attach_publisher(&self, publisher: Arc<dyn Publisher>) {
        *self.publisher.write() = Some(publisher);
        info!("Publisher attached");
    }

    /// Tell the service the bus connection is gone. State keeps changing;
    /// status messages are dropped until a publisher is attached again.
    pub fn detach_publisher(&self) {
        if self.publisher.write().take().is_some() {
            info!("Publisher detached");
        }
    }

    pub fn is_connected(&self) -> bool {
        self.publisher.read().is_some()
    }

    // -----------------------------------------------------------------------
    // Inbound messages
    // -----------------------------------------------------------------------

    pub fn handle_message(&self, topic: &str, payload: &[u8]) -> bool {
        self.handle_message_at(topic, payload, Instant::now())
    }

    /// Route one bus message, apply it, publish its status.
    ///
    /// Returns `false` when the message was dropped. Nothing here panics or
    /// propagates: every failure ends in a log line.
    pub fn handle_message_at(&self, topic: &str, payload: &[u8], now: Instant) -> bool {
        let mut registry = self.registry.lock();
        match self.router.dispatch(&mut registry, topic, payload, now) {
            Ok(dispatch) => {
                for out in &dispatch.outbound {
                    self.publish(out);
                }
                true
            }
            Err(e) => {
                log_dropped(topic, &e);
                false
            }
        }
    }

    fn publish(&self, out: &Outbound) {
        let Some(publisher) = self.publisher.read().clone() else {
            warn!("Dropping status on {}: {}", out.topic, SyncError::Disconnected);
            return;
        };
        let bytes = match out.to_bytes() {
            Ok(b) => b,
            Err(e) => {
                warn!("Failed to serialise status for {}: {}", out.topic, e);
                return;
            }
        };
        if let Err(e) = publisher.publish(&out.topic, bytes) {
            warn!("Publish to {} failed: {}", out.topic, e);
        }
    }

    // -----------------------------------------------------------------------
    // Heartbeat
    // -----------------------------------------------------------------------

    pub fn sweep_heartbeats(&self, now: Instant) -> SweepReport {
        let mut registry = self.registry.lock();
        let report = self
            .monitor
            .sweep(&mut registry, now, |notice| self.publish(&notice));
        self.sweep_count.fetch_add(1, Ordering::Relaxed);
        report
    }

    // -----------------------------------------------------------------------
    // Direct session management
    // -----------------------------------------------------------------------

    /// Register a session without a bus request. No status is published.
    pub fn create_session(&self, id: &str, tag: &str) -> bool {
        self.registry.lock().create(id, tag)
    }

    pub fn destroy_session(&self, id: &str) -> bool {
        self.registry.lock().destroy(id).is_some()
    }

    /// `(id, tag)` of every session, sorted by id.
    pub fn sessions(&self) -> Vec<(String, String)> {
        self.registry.lock().list()
    }

    pub fn snapshot(&self, session_id: &str) -> Option<SessionSnapshot> {
        self.registry.lock().get(session_id).map(|s| s.snapshot())
    }

    /// Run `f` against one session under the state lock.
    pub fn with_session<R>(&self, session_id: &str, f: impl FnOnce(&SessionStore) -> R) -> Option<R> {
        self.registry.lock().get(session_id).map(f)
    }

    pub fn stats(&self) -> SyncStats {
        let registry = self.registry.lock();
        SyncStats {
            sessions: registry.len(),
            clients: registry.iter().map(|s| s.client_count()).sum(),
            entities: registry.iter().map(|s| s.entity_count()).sum(),
            heartbeat_sweeps: self.sweep_count.load(Ordering::Relaxed),
        }
    }
}

fn log_dropped(topic: &str, err: &SyncError) {
    match err {
        SyncError::UnknownTopic(_) => debug!("Ignoring {}: {}", topic, err),
        SyncError::Denied { .. } => info!("Dropping {}: {}", topic, err),
        _ => warn!("Dropping {}: {}", topic, err),
    }
}
