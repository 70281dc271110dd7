//! Session store: the clients and entities of one synchronization session.
//!
//! Every operation is an in-memory mutation. Duplicate creation and unknown
//! ids are logged no-ops; the boolean / `Option` results tell the caller
//! whether anything changed so it can decide whether to broadcast.

use log::{debug, warn};
use std::collections::HashMap;
use std::time::{Duration, Instant};

use crate::client::ClientRecord;
use crate::entity::{
    CanvasType, Entity, EntityType, Motion, PhysicalProperties, Placement, PlacementError,
};
use crate::types::{Quat, Vec3};

// ---------------------------------------------------------------------------
// Snapshot
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub struct ClientSummary {
    pub id: String,
    pub tag: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct EntitySummary {
    pub id: String,
    pub tag: String,
    pub kind: EntityType,
    pub path: Option<String>,
    pub parent_id: Option<String>,
    pub position: Option<Vec3>,
    pub rotation: Option<Quat>,
    /// Populated only for scale-placed world entities.
    pub scale: Option<Vec3>,
    /// Populated only for size-placed world entities.
    pub size: Option<Vec3>,
    pub position_percent: Option<Vec3>,
    pub size_percent: Option<Vec3>,
}

impl EntitySummary {
    fn of(entity: &Entity) -> Self {
        let mut summary = Self {
            id: entity.id.clone(),
            tag: entity.tag.clone(),
            kind: entity.kind,
            path: entity.path.clone(),
            parent_id: entity.parent.clone(),
            position: None,
            rotation: None,
            scale: None,
            size: None,
            position_percent: None,
            size_percent: None,
        };
        match entity.placement() {
            Placement::World(t) => {
                summary.position = Some(t.position);
                summary.rotation = Some(t.rotation);
                if t.is_size {
                    summary.size = t.size;
                } else {
                    summary.scale = t.scale;
                }
            }
            Placement::Canvas(t) => {
                summary.position_percent = Some(t.position_percent);
                summary.size_percent = Some(t.size_percent);
            }
        }
        summary
    }
}

/// Point-in-time view of a session, ordered by id.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SessionSnapshot {
    pub clients: Vec<ClientSummary>,
    pub entities: Vec<EntitySummary>,
}

// ---------------------------------------------------------------------------
// Store
// ---------------------------------------------------------------------------

#[derive(Debug)]
pub struct SessionStore {
    id: String,
    tag: String,
    clients: HashMap<String, ClientRecord>,
    entities: HashMap<String, Entity>,
}

impl SessionStore {
    pub fn new(id: impl Into<String>, tag: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            tag: tag.into(),
            clients: HashMap::new(),
            entities: HashMap::new(),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn tag(&self) -> &str {
        &self.tag
    }

    pub fn client_count(&self) -> usize {
        self.clients.len()
    }

    pub fn entity_count(&self) -> usize {
        self.entities.len()
    }

    pub fn client(&self, id: &str) -> Option<&ClientRecord> {
        self.clients.get(id)
    }

    pub fn entity(&self, id: &str) -> Option<&Entity> {
        self.entities.get(id)
    }

    // -----------------------------------------------------------------------
    // Clients
    // -----------------------------------------------------------------------

    /// Returns `false` (and keeps the existing record) for a duplicate id.
    pub fn add_client(&mut self, id: &str, tag: &str, now: Instant) -> bool {
        if self.clients.contains_key(id) {
            warn!("[{}] duplicate client id {}, skipping", self.id, id);
            return false;
        }
        self.clients
            .insert(id.to_string(), ClientRecord::new(id, tag, now));
        true
    }

    /// Remove a client and cascade-delete the entities it owns.
    ///
    /// Returns the ids of the entities actually removed, or `None` when the
    /// client is unknown.
    pub fn remove_client(&mut self, id: &str) -> Option<Vec<String>> {
        let Some(client) = self.clients.remove(id) else {
            debug!("[{}] client {} does not exist", self.id, id);
            return None;
        };
        let removed = client
            .owned_entities()
            .iter()
            .filter(|entity_id| self.remove_entity(entity_id).is_some())
            .cloned()
            .collect();
        Some(removed)
    }

    pub fn update_heartbeat(&mut self, id: &str, now: Instant) -> bool {
        match self.clients.get_mut(id) {
            Some(client) => {
                client.heartbeat(now);
                true
            }
            None => {
                debug!("[{}] heartbeat from unknown client {}", self.id, id);
                false
            }
        }
    }

    /// Ids of clients whose last heartbeat is older than `timeout`, sorted.
    pub fn expired_clients(&self, now: Instant, timeout: Duration) -> Vec<String> {
        let mut ids: Vec<String> = self
            .clients
            .values()
            .filter(|c| c.is_expired(now, timeout))
            .map(|c| c.id.clone())
            .collect();
        ids.sort();
        ids
    }

    // -----------------------------------------------------------------------
    // Entities
    // -----------------------------------------------------------------------

    /// Insert `entity`. A duplicate id leaves the store unchanged.
    ///
    /// When `delete_with` names a client of this session, the entity joins
    /// that client's cascade set; an unknown client is skipped.
    pub fn add_entity(&mut self, entity: Entity, delete_with: Option<&str>) -> bool {
        if self.entities.contains_key(&entity.id) {
            warn!("[{}] duplicate entity id {}, skipping", self.id, entity.id);
            return false;
        }

        if let Some(client_id) = delete_with {
            match self.clients.get_mut(client_id) {
                Some(client) => client.own_entity(&entity.id),
                None => debug!(
                    "[{}] delete-with client {} not in session, entity {} not tied to it",
                    self.id, client_id, entity.id
                ),
            }
        }

        self.entities.insert(entity.id.clone(), entity);
        true
    }

    /// Remove an entity and release it from whichever client owned it, so a
    /// later entity reusing the id is not swept up in that client's cascade.
    pub fn remove_entity(&mut self, id: &str) -> Option<Entity> {
        let entity = self.entities.remove(id)?;
        for client in self.clients.values_mut() {
            client.disown(id);
        }
        Some(entity)
    }

    fn update<F>(&mut self, id: &str, op: &str, f: F) -> bool
    where
        F: FnOnce(&mut Entity),
    {
        match self.entities.get_mut(id) {
            Some(entity) => {
                f(entity);
                true
            }
            None => {
                debug!("[{}] {}: entity {} does not exist", self.id, op, id);
                false
            }
        }
    }

    fn update_placed<F>(&mut self, id: &str, op: &str, f: F) -> Result<bool, PlacementError>
    where
        F: FnOnce(&mut Entity) -> Result<(), PlacementError>,
    {
        match self.entities.get_mut(id) {
            Some(entity) => f(entity).map(|()| true),
            None => {
                debug!("[{}] {}: entity {} does not exist", self.id, op, id);
                Ok(false)
            }
        }
    }

    pub fn set_parent(&mut self, id: &str, parent: Option<String>) -> bool {
        self.update(id, "set_parent", |e| e.parent = parent)
    }

    pub fn set_visibility(&mut self, id: &str, visible: bool) -> bool {
        self.update(id, "set_visibility", |e| e.visible = visible)
    }

    pub fn set_highlight(&mut self, id: &str, highlighted: bool) -> bool {
        self.update(id, "set_highlight", |e| e.highlighted = highlighted)
    }

    pub fn set_canvas_type(&mut self, id: &str, canvas_type: CanvasType) -> bool {
        self.update(id, "set_canvas_type", |e| e.canvas_type = canvas_type)
    }

    pub fn set_motion(&mut self, id: &str, motion: Motion) -> bool {
        self.update(id, "set_motion", |e| e.set_motion(motion))
    }

    pub fn set_physical_properties(&mut self, id: &str, props: PhysicalProperties) -> bool {
        self.update(id, "set_physical_properties", |e| {
            e.set_physical_properties(props)
        })
    }

    pub fn set_position(&mut self, id: &str, position: Vec3) -> Result<bool, PlacementError> {
        self.update_placed(id, "set_position", |e| e.set_position(position))
    }

    pub fn set_rotation(&mut self, id: &str, rotation: Quat) -> Result<bool, PlacementError> {
        self.update_placed(id, "set_rotation", |e| e.set_rotation(rotation))
    }

    pub fn set_scale(&mut self, id: &str, scale: Vec3) -> Result<bool, PlacementError> {
        self.update_placed(id, "set_scale", |e| e.set_scale(scale))
    }

    pub fn set_size(&mut self, id: &str, size: Vec3) -> Result<bool, PlacementError> {
        self.update_placed(id, "set_size", |e| e.set_size(size))
    }

    // -----------------------------------------------------------------------
    // Snapshot
    // -----------------------------------------------------------------------

    pub fn snapshot(&self) -> SessionSnapshot {
        let mut clients: Vec<ClientSummary> = self
            .clients
            .values()
            .map(|c| ClientSummary {
                id: c.id.clone(),
                tag: c.tag.clone(),
            })
            .collect();
        clients.sort_by(|a, b| a.id.cmp(&b.id));

        let mut entities: Vec<EntitySummary> =
            self.entities.values().map(EntitySummary::of).collect();
        entities.sort_by(|a, b| a.id.cmp(&b.id));

        SessionSnapshot { clients, entities }
    }
}
