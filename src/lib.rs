//! VOS Synchronization Service
//!
//! Authoritative session state for a multi-client shared world. Clients
//! publish requests under `vos/`; the service validates and applies them
//! and rebroadcasts confirmed changes on `vos/status/<session>/...`.
//!
//! ## Architecture
//!
//! ```text
//! SyncBusAgent  (bus.rs)              ← NATS connection, topic mapping
//!   └── SyncService  (service.rs)     ← owns the lock, publishes statuses
//!         ├── Router  (router.rs)     ← topic → schema → auth → mutation
//!         │     ├── Schema  (schema.rs)
//!         │     └── Authorizer  (auth.rs)
//!         ├── HeartbeatMonitor  (heartbeat.rs)
//!         └── SessionRegistry  (registry.rs)
//!               └── SessionStore  (session.rs)
//!                     ├── ClientRecord  (client.rs)
//!                     └── Entity  (entity.rs, terrain.rs)
//! ```
//!
//! Everything below `SyncService` is synchronous and free of I/O. The
//! `server` feature adds the NATS agent, the heartbeat timer and the binary.

pub mod auth;
pub mod bus;
pub mod client;
pub mod entity;
pub mod error;
pub mod heartbeat;
pub mod protocol;
pub mod registry;
pub mod router;
pub mod schema;
pub mod service;
pub mod session;
pub mod settings;
pub mod terrain;
pub mod types;

pub use auth::{AllowAll, Authorizer};
pub use bus::{BusConfig, MemoryPublisher, PublishedMessage, Publisher};
#[cfg(feature = "server")]
pub use bus::{ChannelPublisher, SyncBusAgent};
pub use entity::{CanvasType, Entity, EntityType};
pub use error::SyncError;
pub use heartbeat::{HeartbeatMonitor, SweepReport};
pub use registry::SessionRegistry;
pub use router::{Dispatch, Router};
pub use service::SyncService;
pub use session::{SessionSnapshot, SessionStore};
pub use settings::Settings;
pub use types::{Quat, StaticSession, SyncServiceConfig, SyncStats, Vec3};
