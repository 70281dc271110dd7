//! Bus integration: the publisher seam and the NATS agent that drives a
//! [`SyncService`] from live traffic.
//!
//! ## Topic mapping
//!
//! The service speaks MQTT-style topics (`vos/session/join`). On NATS the
//! same names travel as subjects with `.` separators (`vos.session.join`),
//! which is also how a NATS server exposes MQTT clients' topics. Mapping
//! happens only here; the rest of the crate never sees a subject.
//!
//! | Topic                      | Subject                    |
//! |----------------------------|----------------------------|
//! | `vos/#`                    | `vos.>`                    |
//! | `vos/request/+/position`   | `vos.request.*.position`   |
//! | `vos/status/s1/state`      | `vos.status.s1.state`      |
//!
//! ## Event contract
//!
//! | Direction | What                                   | Handler                         |
//! |-----------|----------------------------------------|---------------------------------|
//! | inbound   | every subject under `vos.>`            | [`SyncService::handle_message`] |
//! | outbound  | status topics built by the router      | [`Publisher::publish`]          |
//! | outbound  | heartbeat deletion notices             | [`Publisher::publish`]          |

use log::debug;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use crate::error::SyncError;
#[cfg(feature = "server")]
use crate::service::SyncService;

// ---------------------------------------------------------------------------
// Publisher seam
// ---------------------------------------------------------------------------

/// Fire-and-forget outbound channel.
///
/// Implementations must not block: the service calls this while holding its
/// state lock.
pub trait Publisher: Send + Sync {
    fn publish(&self, topic: &str, payload: Vec<u8>) -> Result<(), SyncError>;
}

/// A message as handed to a [`Publisher`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublishedMessage {
    pub topic: String,
    pub payload: Vec<u8>,
}

impl PublishedMessage {
    pub fn json(&self) -> serde_json::Result<serde_json::Value> {
        serde_json::from_slice(&self.payload)
    }
}

/// Records every publish in memory. Used when embedding the service without
/// a broker, and by tests.
#[derive(Debug, Default)]
pub struct MemoryPublisher {
    sent: Mutex<Vec<PublishedMessage>>,
}

impl MemoryPublisher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Drain everything published so far.
    pub fn take(&self) -> Vec<PublishedMessage> {
        std::mem::take(&mut *self.sent.lock())
    }

    pub fn topics(&self) -> Vec<String> {
        self.sent.lock().iter().map(|m| m.topic.clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.sent.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.sent.lock().is_empty()
    }
}

impl Publisher for MemoryPublisher {
    fn publish(&self, topic: &str, payload: Vec<u8>) -> Result<(), SyncError> {
        debug!("memory publish on {} ({} bytes)", topic, payload.len());
        self.sent.lock().push(PublishedMessage {
            topic: topic.to_string(),
            payload,
        });
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Topic <-> subject mapping
// ---------------------------------------------------------------------------

/// `vos/request/+/x/#` → `vos.request.*.x.>`
pub fn topic_to_subject(topic: &str) -> String {
    topic
        .split('/')
        .map(|level| match level {
            "+" => "*",
            "#" => ">",
            other => other,
        })
        .collect::<Vec<_>>()
        .join(".")
}

/// Inverse of [`topic_to_subject`] for concrete (wildcard-free) subjects.
pub fn subject_to_topic(subject: &str) -> String {
    subject.replace('.', "/")
}

// ---------------------------------------------------------------------------
// Config for SyncBusAgent
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BusConfig {
    /// NATS endpoint.
    pub endpoint: String,
    /// Connection name reported to the server.
    pub client_name: String,
}

impl Default for BusConfig {
    fn default() -> Self {
        Self {
            endpoint: "nats://localhost:4222".into(),
            client_name: "vos-sync".into(),
        }
    }
}

// ---------------------------------------------------------------------------
// ChannelPublisher
// ---------------------------------------------------------------------------

/// Hands messages to an unbounded channel drained by the agent's forward task.
#[cfg(feature = "server")]
pub struct ChannelPublisher {
    tx: tokio::sync::mpsc::UnboundedSender<PublishedMessage>,
}

#[cfg(feature = "server")]
impl ChannelPublisher {
    pub fn new(tx: tokio::sync::mpsc::UnboundedSender<PublishedMessage>) -> Self {
        Self { tx }
    }
}

#[cfg(feature = "server")]
impl Publisher for ChannelPublisher {
    fn publish(&self, topic: &str, payload: Vec<u8>) -> Result<(), SyncError> {
        self.tx
            .send(PublishedMessage {
                topic: topic.to_string(),
                payload,
            })
            .map_err(|_| SyncError::Disconnected)
    }
}

// ---------------------------------------------------------------------------
// SyncBusAgent
// ---------------------------------------------------------------------------

/// Connects a [`SyncService`] to a NATS server.
///
/// Call [`SyncBusAgent::run`] inside a Tokio runtime; it returns on Ctrl-C
/// or when the connection's subscription ends.
#[cfg(feature = "server")]
pub struct SyncBusAgent {
    config: BusConfig,
    service: std::sync::Arc<SyncService>,
}

#[cfg(feature = "server")]
impl SyncBusAgent {
    pub fn new(config: BusConfig, service: std::sync::Arc<SyncService>) -> Self {
        Self { config, service }
    }

    pub async fn run(self) -> anyhow::Result<()> {
        use anyhow::Context;
        use bytes::Bytes;
        use futures::StreamExt;
        use log::{error, info, warn};
        use std::sync::Arc;

        use crate::heartbeat;
        use crate::protocol::topics;

        info!(
            "SyncBusAgent connecting to {} as '{}'",
            self.config.endpoint, self.config.client_name
        );

        let client = async_nats::ConnectOptions::new()
            .name(&self.config.client_name)
            .connect(self.config.endpoint.as_str())
            .await
            .with_context(|| format!("Failed to connect to {}", self.config.endpoint))?;

        let subject = topic_to_subject(topics::ALL);
        let mut subscriber = client
            .subscribe(subject.clone())
            .await
            .with_context(|| format!("Failed to subscribe to {}", subject))?;

        info!("SyncBusAgent subscribed to {}", subject);

        // -------------------------------------------------------------------
        // Outbound: drain the publisher channel onto the connection
        // -------------------------------------------------------------------

        let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel::<PublishedMessage>();
        self.service
            .attach_publisher(Arc::new(ChannelPublisher::new(tx)));

        let forward_client = client.clone();
        let forward = tokio::spawn(async move {
            while let Some(msg) = rx.recv().await {
                let subject = topic_to_subject(&msg.topic);
                tracing::trace!(subject = %subject, bytes = msg.payload.len(), "forwarding status");
                if let Err(e) = forward_client
                    .publish(subject.clone(), Bytes::from(msg.payload))
                    .await
                {
                    warn!("Failed to publish to {}: {}", subject, e);
                }
            }
        });

        // -------------------------------------------------------------------
        // Heartbeat sweep loop
        // -------------------------------------------------------------------

        let heartbeat = tokio::spawn(heartbeat::run(self.service.clone()));

        // -------------------------------------------------------------------
        // Inbound: every vos.> message goes through the router
        // -------------------------------------------------------------------

        let inbound_service = self.service.clone();
        let mut inbound = tokio::spawn(async move {
            while let Some(msg) = subscriber.next().await {
                let topic = subject_to_topic(&msg.subject);
                inbound_service.handle_message(&topic, &msg.payload);
            }
        });

        tokio::select! {
            _ = &mut inbound => {
                error!("Subscription to {} ended unexpectedly", subject);
            }
            _ = tokio::signal::ctrl_c() => {
                info!("SyncBusAgent shutting down (SIGINT)");
            }
        }

        inbound.abort();
        heartbeat.abort();
        self.service.detach_publisher();

        // Let queued status messages reach the server before closing.
        if let Err(e) = forward.await {
            warn!("Outbound forwarder stopped abnormally: {}", e);
        }
        if let Err(e) = client.flush().await {
            warn!("Flush on shutdown failed: {}", e);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wildcards_map_to_nats_tokens() {
        assert_eq!(topic_to_subject("vos/#"), "vos.>");
        assert_eq!(
            topic_to_subject("vos/request/+/entity/+/position"),
            "vos.request.*.entity.*.position"
        );
        assert_eq!(
            subject_to_topic("vos.status.s1.entity.e1.delete"),
            "vos/status/s1/entity/e1/delete"
        );
    }

    #[test]
    fn memory_publisher_records_in_order() {
        let p = MemoryPublisher::new();
        p.publish("a/b", b"{}".to_vec()).unwrap();
        p.publish("c/d", b"{\"x\":1}".to_vec()).unwrap();
        assert_eq!(p.topics(), vec!["a/b", "c/d"]);
        let sent = p.take();
        assert_eq!(sent[1].json().unwrap()["x"], 1);
        assert!(p.is_empty());
    }
}
