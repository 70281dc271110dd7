//! Message router: one inbound bus message in, zero or more status messages out.
//!
//! Every message goes through the same pipeline:
//!
//! 1. [`Route::parse`] the topic (session lifecycle topics first, then the
//!    parameterised `vos/request/...` grammar).
//! 2. Decode the payload as a JSON object.
//! 3. Validate it against the verb's [`Schema`].
//! 4. Decode into the verb's typed payload.
//! 5. Ask the [`Authorizer`].
//! 6. Look the session up.
//! 7. Apply the mutation and build the status message.
//!
//! Any failure short-circuits with a [`SyncError`] and leaves the registry
//! untouched. Successful no-ops (duplicates, unknown entities) return an
//! empty [`Dispatch`].

use log::{debug, warn};
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use std::sync::Arc;
use std::time::Instant;

use crate::auth::{self, Authorizer};
use crate::entity::{
    Entity, EntityContent, EntityType, Extent, Motion, PhysicalProperties, PlacementError,
    PlacementKind,
};
use crate::error::{Result, SyncError};
use crate::protocol::{
    keys, state_payload, status_payload, topics, CreateEntityMsg, CreateSessionMsg,
    EntityUpdateMsg, EntityVerb, JoinSessionMsg, Outbound, Route, SendMessageMsg,
    SessionClientMsg, SessionVerb,
};
use crate::registry::SessionRegistry;
use crate::schema::Schema;
use crate::session::SessionStore;
use crate::terrain::TerrainGrid;

/// Result of routing one message.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Dispatch {
    /// Status messages to publish, in order.
    pub outbound: Vec<Outbound>,
}

impl Dispatch {
    fn none() -> Self {
        Self::default()
    }

    fn one(topic: impl Into<String>, payload: Map<String, Value>) -> Self {
        Self {
            outbound: vec![Outbound::new(topic, payload)],
        }
    }

    pub fn is_empty(&self) -> bool {
        self.outbound.is_empty()
    }
}

pub struct Router {
    authorizer: Arc<dyn Authorizer>,
}

impl Router {
    pub fn new(authorizer: Arc<dyn Authorizer>) -> Self {
        Self { authorizer }
    }

    pub fn dispatch(
        &self,
        registry: &mut SessionRegistry,
        topic: &str,
        payload: &[u8],
        now: Instant,
    ) -> Result<Dispatch> {
        let route = Route::parse(topic).ok_or_else(|| SyncError::UnknownTopic(topic.to_string()))?;

        let request: Map<String, Value> = match serde_json::from_slice(payload) {
            Ok(Value::Object(map)) => map,
            Ok(other) => {
                return Err(SyncError::Malformed(format!(
                    "expected an object, got {}",
                    json_kind(&other)
                )))
            }
            Err(e) => return Err(SyncError::Malformed(e.to_string())),
        };

        let schema = Schema::for_route(&route);
        schema.validate(&request)?;

        match &route {
            Route::Session(verb) => self.session_request(registry, &route, *verb, &request, now),
            Route::CreateEntity { session_id, kind } => {
                let msg: CreateEntityMsg = decode(&request)?;
                self.authorize(&route, msg.client_id.as_deref(), session_id)?;
                let session = lookup(registry, session_id)?;
                create_entity(session, &schema, *kind, msg, &request, &route)
            }
            Route::SendMessage { session_id } => {
                let msg: SendMessageMsg = decode(&request)?;
                self.authorize(&route, Some(&msg.client_id), session_id)?;
                lookup(registry, session_id)?;
                debug!(
                    "[{}] relaying message from {} on {}",
                    session_id, msg.client_id, msg.topic
                );
                Ok(Dispatch::one(
                    topics::message_new(session_id),
                    status_payload(&request, false),
                ))
            }
            Route::Entity {
                session_id,
                entity_id,
                verb,
            } => {
                let msg: EntityUpdateMsg = decode(&request)?;
                self.authorize(&route, msg.client_id.as_deref(), session_id)?;
                let session = lookup(registry, session_id)?;
                if msg.entity_id != *entity_id {
                    warn!(
                        "[{}] payload entity-id {} disagrees with topic, applying to {}",
                        session_id, msg.entity_id, entity_id
                    );
                }
                let applied = update_entity(session, &schema, entity_id, *verb, msg)?;
                match (applied, route.status_topic()) {
                    (true, Some(status)) => Ok(Dispatch::one(status, status_payload(&request, false))),
                    _ => Ok(Dispatch::none()),
                }
            }
        }
    }

    fn authorize(&self, route: &Route, client_id: Option<&str>, session_id: &str) -> Result<()> {
        let client_id = client_id.unwrap_or_default();
        auth::check(self.authorizer.as_ref(), route, client_id, session_id).map_err(|action| {
            SyncError::Denied {
                action,
                client_id: client_id.to_string(),
                session_id: session_id.to_string(),
            }
        })
    }

    // -----------------------------------------------------------------------
    // Session lifecycle
    // -----------------------------------------------------------------------

    fn session_request(
        &self,
        registry: &mut SessionRegistry,
        route: &Route,
        verb: SessionVerb,
        request: &Map<String, Value>,
        now: Instant,
    ) -> Result<Dispatch> {
        match verb {
            SessionVerb::Create => {
                let msg: CreateSessionMsg = decode(request)?;
                self.authorize(route, Some(&msg.client_id), &msg.session_id)?;
                if registry.create(&msg.session_id, &msg.session_tag) {
                    Ok(Dispatch::one(
                        topics::SESSION_NEW,
                        status_payload(request, false),
                    ))
                } else {
                    Ok(Dispatch::none())
                }
            }
            SessionVerb::Destroy => {
                let msg: SessionClientMsg = decode(request)?;
                self.authorize(route, Some(&msg.client_id), &msg.session_id)?;
                registry
                    .destroy(&msg.session_id)
                    .ok_or(SyncError::UnknownSession(msg.session_id))?;
                Ok(Dispatch::one(
                    topics::SESSION_CLOSED,
                    status_payload(request, false),
                ))
            }
            SessionVerb::Join => {
                let msg: JoinSessionMsg = decode(request)?;
                self.authorize(route, Some(&msg.client_id), &msg.session_id)?;
                let session = lookup(registry, &msg.session_id)?;
                if session.add_client(&msg.client_id, &msg.client_tag, now) {
                    Ok(Dispatch::one(
                        topics::new_client(&msg.session_id),
                        status_payload(request, true),
                    ))
                } else {
                    Ok(Dispatch::none())
                }
            }
            SessionVerb::Exit => {
                let msg: SessionClientMsg = decode(request)?;
                self.authorize(route, Some(&msg.client_id), &msg.session_id)?;
                let session = lookup(registry, &msg.session_id)?;
                match session.remove_client(&msg.client_id) {
                    Some(removed) => {
                        debug!(
                            "[{}] client {} left, {} entities removed with it",
                            msg.session_id,
                            msg.client_id,
                            removed.len()
                        );
                        Ok(Dispatch::one(
                            topics::client_left(&msg.session_id),
                            status_payload(request, true),
                        ))
                    }
                    None => Ok(Dispatch::none()),
                }
            }
            SessionVerb::Heartbeat => {
                let msg: SessionClientMsg = decode(request)?;
                self.authorize(route, Some(&msg.client_id), &msg.session_id)?;
                lookup(registry, &msg.session_id)?.update_heartbeat(&msg.client_id, now);
                Ok(Dispatch::none())
            }
            SessionVerb::GetState => {
                let msg: SessionClientMsg = decode(request)?;
                self.authorize(route, Some(&msg.client_id), &msg.session_id)?;
                let snapshot = lookup(registry, &msg.session_id)?.snapshot();
                let topic = topics::state(&msg.session_id);
                let payload =
                    state_payload(request, &snapshot).map_err(|e| SyncError::Publish {
                        topic: topic.clone(),
                        reason: e.to_string(),
                    })?;
                Ok(Dispatch::one(topic, payload))
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Entity creation
// ---------------------------------------------------------------------------

fn create_entity(
    session: &mut SessionStore,
    schema: &Schema,
    kind: EntityType,
    msg: CreateEntityMsg,
    request: &Map<String, Value>,
    route: &Route,
) -> Result<Dispatch> {
    let verb = schema.verb;

    let terrain = if kind == EntityType::Terrain {
        Some(TerrainGrid::new(
            require(msg.length, verb, "length")?,
            require(msg.width, verb, "width")?,
            require(msg.height, verb, "height")?,
            require(msg.heights, verb, "heights")?,
        )?)
    } else {
        None
    };

    let entity = match kind.placement() {
        PlacementKind::World => {
            let extent = match (msg.scale, msg.size) {
                (Some(scale), None) => Extent::Scale(scale),
                (None, Some(size)) => Extent::Size(size),
                _ => {
                    return Err(SyncError::InvalidField {
                        verb,
                        field: "scale | size".into(),
                        reason: "exactly one must be given".into(),
                    })
                }
            };
            Entity::with_world_transform(
                msg.entity_id.clone(),
                msg.tag,
                kind,
                require(msg.position, verb, "position")?,
                require(msg.rotation, verb, "rotation")?,
                extent,
            )
        }
        PlacementKind::Canvas => Entity::with_canvas_transform(
            msg.entity_id.clone(),
            msg.tag,
            kind,
            require(msg.position_percent, verb, "position-percent")?,
            require(msg.size_percent, verb, "size-percent")?,
        ),
    }
    .with_parent(msg.parent_id)
    .with_path(msg.path)
    .with_content(EntityContent {
        resources: msg.resources,
        on_click: msg.on_click,
        terrain,
        text: msg.text,
        font_size: msg.font_size,
    });

    let delete_with = match (msg.delete_with_client, msg.client_id.as_deref()) {
        (true, Some(client_id)) => Some(client_id),
        (true, None) => {
            debug!(
                "[{}] {} asks for delete-with-client but names no client-id",
                session.id(),
                msg.entity_id
            );
            None
        }
        (false, _) => None,
    };

    if !session.add_entity(entity, delete_with) {
        return Ok(Dispatch::none());
    }

    let Some(topic) = route.status_topic() else {
        return Ok(Dispatch::none());
    };
    let mut payload = status_payload(request, false);
    payload.insert(keys::ENTITY_ID.into(), Value::String(msg.entity_id));
    Ok(Dispatch::one(topic, payload))
}

// ---------------------------------------------------------------------------
// Entity mutation
// ---------------------------------------------------------------------------

/// Apply one field-scoped update. `Ok(false)` means the entity is unknown.
fn update_entity(
    session: &mut SessionStore,
    schema: &Schema,
    entity_id: &str,
    verb: EntityVerb,
    msg: EntityUpdateMsg,
) -> Result<bool> {
    let name = schema.verb;
    let placed = |r: std::result::Result<bool, PlacementError>| {
        r.map_err(|e| SyncError::InvalidField {
            verb: name,
            field: e.field.to_string(),
            reason: e.to_string(),
        })
    };

    let applied = match verb {
        EntityVerb::Delete | EntityVerb::Remove => session.remove_entity(entity_id).is_some(),
        EntityVerb::Position => {
            placed(session.set_position(entity_id, require(msg.position, name, "position")?))?
        }
        EntityVerb::Rotation => {
            placed(session.set_rotation(entity_id, require(msg.rotation, name, "rotation")?))?
        }
        EntityVerb::Scale => placed(session.set_scale(entity_id, require(msg.scale, name, "scale")?))?,
        EntityVerb::Size => placed(session.set_size(entity_id, require(msg.size, name, "size")?))?,
        EntityVerb::CanvasType => session.set_canvas_type(
            entity_id,
            require(msg.canvas_type, name, "canvas-type")?,
        ),
        EntityVerb::Highlight => {
            session.set_highlight(entity_id, require(msg.highlighted, name, "highlighted")?)
        }
        EntityVerb::Motion => session.set_motion(
            entity_id,
            Motion {
                angular_velocity: require(msg.angular_velocity, name, "angular-velocity")?,
                velocity: require(msg.velocity, name, "velocity")?,
                stationary: require(msg.stationary, name, "stationary")?,
            },
        ),
        // `parent-id: null` re-roots the entity.
        EntityVerb::Parent => session.set_parent(entity_id, msg.parent_id),
        EntityVerb::PhysicalProperties => session.set_physical_properties(
            entity_id,
            PhysicalProperties {
                angular_drag: require(msg.angular_drag, name, "angular-drag")?,
                center_of_mass: require(msg.center_of_mass, name, "center-of-mass")?,
                drag: require(msg.drag, name, "drag")?,
                gravitational: require(msg.gravitational, name, "gravitational")?,
                mass: require(msg.mass, name, "mass")?,
            },
        ),
        EntityVerb::Visibility => {
            session.set_visibility(entity_id, require(msg.visible, name, "visible")?)
        }
    };
    Ok(applied)
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn decode<T: DeserializeOwned>(request: &Map<String, Value>) -> Result<T> {
    serde_json::from_value(Value::Object(request.clone()))
        .map_err(|e| SyncError::Malformed(e.to_string()))
}

fn lookup<'a>(registry: &'a mut SessionRegistry, session_id: &str) -> Result<&'a mut SessionStore> {
    registry
        .get_mut(session_id)
        .ok_or_else(|| SyncError::UnknownSession(session_id.to_string()))
}

/// A schema-required key that decoded to `null`.
fn require<T>(value: Option<T>, verb: &'static str, field: &str) -> Result<T> {
    value.ok_or_else(|| SyncError::MissingField {
        verb,
        field: field.to_string(),
    })
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::AllowAll;
    use serde_json::json;

    fn router() -> Router {
        Router::new(Arc::new(AllowAll))
    }

    fn send(router: &Router, reg: &mut SessionRegistry, topic: &str, body: Value) -> Result<Dispatch> {
        router.dispatch(reg, topic, body.to_string().as_bytes(), Instant::now())
    }

    #[test]
    fn non_object_payload_is_malformed() {
        let mut reg = SessionRegistry::new();
        let err = router()
            .dispatch(&mut reg, topics::SESSION_CREATE, b"[1,2]", Instant::now())
            .unwrap_err();
        assert!(matches!(err, SyncError::Malformed(_)));

        let err = router()
            .dispatch(&mut reg, topics::SESSION_CREATE, b"{not json", Instant::now())
            .unwrap_err();
        assert!(matches!(err, SyncError::Malformed(_)));
    }

    #[test]
    fn wrong_field_type_is_malformed() {
        let mut reg = SessionRegistry::new();
        let err = send(
            &router(),
            &mut reg,
            topics::SESSION_CREATE,
            json!({"session-id": 7, "session-tag": "demo", "client-id": "c1"}),
        )
        .unwrap_err();
        assert!(matches!(err, SyncError::Malformed(_)));
        assert!(reg.is_empty());
    }

    #[test]
    fn own_status_broadcasts_are_not_routed() {
        let mut reg = SessionRegistry::new();
        let err = send(
            &router(),
            &mut reg,
            "vos/status/s1/newclient",
            json!({"session-id": "s1"}),
        )
        .unwrap_err();
        assert!(matches!(err, SyncError::UnknownTopic(_)));
    }

    #[test]
    fn canvas_entity_rejects_position_update() {
        let r = router();
        let mut reg = SessionRegistry::new();
        reg.create("s1", "demo");
        send(
            &r,
            &mut reg,
            "vos/request/s1/createbuttonentity",
            json!({
                "delete-with-client": false,
                "entity-id": "b1",
                "tag": "ok",
                "position-percent": {"x": 50, "y": 50, "z": 0},
                "size-percent": {"x": 10, "y": 5, "z": 0},
                "on-click": "ok-pressed"
            }),
        )
        .unwrap();

        let err = send(
            &r,
            &mut reg,
            "vos/request/s1/entity/b1/position",
            json!({"entity-id": "b1", "position": {"x": 1, "y": 2, "z": 3}}),
        )
        .unwrap_err();
        assert!(matches!(err, SyncError::InvalidField { .. }));
    }
}
