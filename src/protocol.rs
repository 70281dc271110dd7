//! `vos/*` wire protocol.
//!
//! This module owns **every message that crosses the bus boundary**: the
//! topic grammar, the typed request payloads, and the status payloads the
//! service broadcasts back.
//!
//! ## Topic namespaces
//!
//! | Topic                                       | Direction        |
//! |---------------------------------------------|------------------|
//! | `vos/session/{create,destroy,join,...}`     | client → service |
//! | `vos/session/{new,closed}`                  | service → all    |
//! | `vos/request/<sid>/...`                     | client → service |
//! | `vos/status/<sid>/...`                      | service → session|
//!
//! ## Design rules
//!
//! 1. Mutation targets (session id, entity id) come from the topic, never
//!    from the payload.
//! 2. JSON keys are kebab-case.
//! 3. Every outbound message carries a fresh server-generated `message-id`.
//! 4. Status messages do not carry the requester's `client-id`, except
//!    `newclient` / `clientleft`, where it names the client that joined or
//!    left.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::entity::{CanvasType, EntityType};
use crate::session::{ClientSummary, EntitySummary, SessionSnapshot};
use crate::types::{Quat, Vec3};

// ---------------------------------------------------------------------------
// Well-known keys
// ---------------------------------------------------------------------------

pub mod keys {
    pub const MESSAGE_ID: &str = "message-id";
    pub const CLIENT_ID: &str = "client-id";
    pub const SESSION_ID: &str = "session-id";
    pub const ENTITY_ID: &str = "entity-id";
    pub const CLIENTS: &str = "clients";
    pub const ENTITIES: &str = "entities";
}

// ---------------------------------------------------------------------------
// Topics
// ---------------------------------------------------------------------------

pub mod topics {
    pub const ALL: &str = "vos/#";

    pub const SESSION_CREATE: &str = "vos/session/create";
    pub const SESSION_NEW: &str = "vos/session/new";
    pub const SESSION_DESTROY: &str = "vos/session/destroy";
    pub const SESSION_CLOSED: &str = "vos/session/closed";
    pub const SESSION_JOIN: &str = "vos/session/join";
    pub const SESSION_EXIT: &str = "vos/session/exit";
    pub const SESSION_HEARTBEAT: &str = "vos/session/heartbeat";
    pub const SESSION_GETSTATE: &str = "vos/session/getstate";

    pub const REQUEST_PREFIX: &str = "vos/request/";
    pub const STATUS_PREFIX: &str = "vos/status/";

    pub fn new_client(session_id: &str) -> String {
        format!("{STATUS_PREFIX}{session_id}/newclient")
    }

    pub fn client_left(session_id: &str) -> String {
        format!("{STATUS_PREFIX}{session_id}/clientleft")
    }

    pub fn state(session_id: &str) -> String {
        format!("{STATUS_PREFIX}{session_id}/state")
    }

    pub fn message_new(session_id: &str) -> String {
        format!("{STATUS_PREFIX}{session_id}/message/new")
    }

    pub fn entity_status(session_id: &str, entity_id: &str, verb: &str) -> String {
        format!("{STATUS_PREFIX}{session_id}/entity/{entity_id}/{verb}")
    }

    pub fn create_status(session_id: &str, kind: &str) -> String {
        format!("{STATUS_PREFIX}{session_id}/create{kind}entity")
    }
}

// ---------------------------------------------------------------------------
// Routes
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionVerb {
    Create,
    Destroy,
    Join,
    Exit,
    Heartbeat,
    GetState,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntityVerb {
    Delete,
    Remove,
    Position,
    Rotation,
    Scale,
    Size,
    CanvasType,
    Highlight,
    Motion,
    Parent,
    PhysicalProperties,
    Visibility,
}

/// Session lifecycle topics, matched exactly (case-insensitively).
const SESSION_ROUTES: &[(&str, SessionVerb)] = &[
    (topics::SESSION_CREATE, SessionVerb::Create),
    (topics::SESSION_DESTROY, SessionVerb::Destroy),
    (topics::SESSION_JOIN, SessionVerb::Join),
    (topics::SESSION_EXIT, SessionVerb::Exit),
    (topics::SESSION_HEARTBEAT, SessionVerb::Heartbeat),
    (topics::SESSION_GETSTATE, SessionVerb::GetState),
];

/// Last segment of `vos/request/<sid>/entity/<eid>/<verb>`.
const ENTITY_ROUTES: &[(&str, EntityVerb)] = &[
    ("delete", EntityVerb::Delete),
    ("remove", EntityVerb::Remove),
    ("position", EntityVerb::Position),
    ("rotation", EntityVerb::Rotation),
    ("scale", EntityVerb::Scale),
    ("size", EntityVerb::Size),
    ("canvastype", EntityVerb::CanvasType),
    ("highlight", EntityVerb::Highlight),
    ("motion", EntityVerb::Motion),
    ("parent", EntityVerb::Parent),
    ("physicalproperties", EntityVerb::PhysicalProperties),
    ("visibility", EntityVerb::Visibility),
];

impl EntityVerb {
    pub fn as_str(&self) -> &'static str {
        ENTITY_ROUTES
            .iter()
            .find(|(_, v)| v == self)
            .map(|(s, _)| *s)
            .unwrap_or("unknown")
    }
}

/// A parsed inbound topic.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Route {
    Session(SessionVerb),
    CreateEntity {
        session_id: String,
        kind: EntityType,
    },
    SendMessage {
        session_id: String,
    },
    Entity {
        session_id: String,
        entity_id: String,
        verb: EntityVerb,
    },
}

impl Route {
    /// Parse a bus topic. Returns `None` for anything outside the grammar,
    /// including the service's own `vos/status/...` broadcasts.
    pub fn parse(topic: &str) -> Option<Route> {
        if let Some((_, verb)) = SESSION_ROUTES
            .iter()
            .find(|(t, _)| t.eq_ignore_ascii_case(topic))
        {
            return Some(Route::Session(*verb));
        }

        let rest = topic.strip_prefix(topics::REQUEST_PREFIX)?;
        let parts: Vec<&str> = rest.split('/').collect();
        if parts.iter().any(|p| p.is_empty()) {
            return None;
        }

        match parts.as_slice() {
            [sid, "message", "create"] => Some(Route::SendMessage {
                session_id: sid.to_string(),
            }),
            [sid, "entity", eid, verb] => {
                let (_, verb) = ENTITY_ROUTES.iter().find(|(name, _)| name == verb)?;
                Some(Route::Entity {
                    session_id: sid.to_string(),
                    entity_id: eid.to_string(),
                    verb: *verb,
                })
            }
            [sid, verb] => {
                let kind = verb
                    .strip_prefix("create")?
                    .strip_suffix("entity")?
                    .parse::<EntityType>()
                    .ok()?;
                Some(Route::CreateEntity {
                    session_id: sid.to_string(),
                    kind,
                })
            }
            _ => None,
        }
    }

    /// Session id named by the topic, if the route is parameterised.
    pub fn session_id(&self) -> Option<&str> {
        match self {
            Route::Session(_) => None,
            Route::CreateEntity { session_id, .. }
            | Route::SendMessage { session_id }
            | Route::Entity { session_id, .. } => Some(session_id),
        }
    }

    /// The `vos/status/...` topic mirroring a parameterised request.
    pub fn status_topic(&self) -> Option<String> {
        match self {
            Route::Session(_) => None,
            Route::CreateEntity { session_id, kind } => {
                Some(topics::create_status(session_id, kind.as_str()))
            }
            Route::SendMessage { session_id } => Some(topics::message_new(session_id)),
            Route::Entity {
                session_id,
                entity_id,
                verb,
            } => Some(topics::entity_status(session_id, entity_id, verb.as_str())),
        }
    }
}

// ---------------------------------------------------------------------------
// Request payloads  (client → service)
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct CreateSessionMsg {
    pub session_id: String,
    pub session_tag: String,
    pub client_id: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct JoinSessionMsg {
    pub session_id: String,
    pub client_id: String,
    pub client_tag: String,
}

/// Payload of `destroy`, `exit`, `heartbeat` and `getstate`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct SessionClientMsg {
    pub session_id: String,
    pub client_id: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct CreateEntityMsg {
    pub delete_with_client: bool,
    pub entity_id: String,
    pub tag: String,
    #[serde(default)]
    pub client_id: Option<String>,
    #[serde(default, alias = "parent-uuid")]
    pub parent_id: Option<String>,
    #[serde(default)]
    pub path: Option<String>,
    #[serde(default)]
    pub resources: Option<Vec<String>>,

    #[serde(default)]
    pub position: Option<Vec3>,
    #[serde(default)]
    pub rotation: Option<Quat>,
    #[serde(default)]
    pub scale: Option<Vec3>,
    #[serde(default)]
    pub size: Option<Vec3>,
    #[serde(default)]
    pub position_percent: Option<Vec3>,
    #[serde(default)]
    pub size_percent: Option<Vec3>,

    #[serde(default)]
    pub length: Option<f64>,
    #[serde(default)]
    pub width: Option<f64>,
    #[serde(default)]
    pub height: Option<f64>,
    #[serde(default)]
    pub heights: Option<Vec<Vec<f64>>>,

    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub font_size: Option<f64>,
    #[serde(default)]
    pub on_click: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct SendMessageMsg {
    pub client_id: String,
    pub topic: String,
    pub message: Value,
}

/// Payload of every `vos/request/<sid>/entity/<eid>/<verb>` message.
///
/// Which fields must be present depends on the verb and is enforced by
/// [`crate::schema`] before decoding.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct EntityUpdateMsg {
    pub entity_id: String,
    #[serde(default)]
    pub client_id: Option<String>,

    #[serde(default)]
    pub position: Option<Vec3>,
    #[serde(default)]
    pub rotation: Option<Quat>,
    #[serde(default)]
    pub scale: Option<Vec3>,
    #[serde(default)]
    pub size: Option<Vec3>,
    #[serde(default)]
    pub canvas_type: Option<CanvasType>,
    #[serde(default)]
    pub highlighted: Option<bool>,
    #[serde(default)]
    pub visible: Option<bool>,
    #[serde(default)]
    pub parent_id: Option<String>,

    #[serde(default)]
    pub angular_velocity: Option<Vec3>,
    #[serde(default)]
    pub velocity: Option<Vec3>,
    #[serde(default)]
    pub stationary: Option<bool>,

    #[serde(default)]
    pub angular_drag: Option<f64>,
    #[serde(default)]
    pub center_of_mass: Option<Vec3>,
    #[serde(default)]
    pub drag: Option<f64>,
    #[serde(default)]
    pub gravitational: Option<bool>,
    #[serde(default)]
    pub mass: Option<f64>,
}

// ---------------------------------------------------------------------------
// Status payloads  (service → session)
// ---------------------------------------------------------------------------

/// A message the service hands to its publisher.
#[derive(Debug, Clone, PartialEq)]
pub struct Outbound {
    pub topic: String,
    pub payload: Map<String, Value>,
}

impl Outbound {
    pub fn new(topic: impl Into<String>, payload: Map<String, Value>) -> Self {
        Self {
            topic: topic.into(),
            payload,
        }
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>, serde_json::Error> {
        serde_json::to_vec(&self.payload)
    }
}

/// Copy a request payload for rebroadcast: fresh `message-id`, and
/// `client-id` stripped unless `keep_client` is set.
pub fn status_payload(request: &Map<String, Value>, keep_client: bool) -> Map<String, Value> {
    let mut out = request.clone();
    out.insert(keys::MESSAGE_ID.into(), Value::String(new_message_id()));
    if !keep_client {
        out.remove(keys::CLIENT_ID);
    }
    out
}

pub fn new_message_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

/// Notice sent for each cascade-deleted entity of an expired client.
pub fn expiry_delete_payload(session_id: &str, entity_id: &str) -> Map<String, Value> {
    let mut out = Map::new();
    out.insert(keys::MESSAGE_ID.into(), Value::String(new_message_id()));
    out.insert(keys::SESSION_ID.into(), Value::String(session_id.into()));
    out.insert(keys::ENTITY_ID.into(), Value::String(entity_id.into()));
    out
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StateClient {
    pub id: String,
    pub tag: String,
}

impl From<&ClientSummary> for StateClient {
    fn from(c: &ClientSummary) -> Self {
        Self {
            id: c.id.clone(),
            tag: c.tag.clone(),
        }
    }
}

/// One entry of the `entities` list in a `state` response.
///
/// `size` and `scale` are always present; exactly one is non-null for a
/// world-placed entity. Canvas-placed entities report their percentages
/// instead and leave the world fields null.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct StateEntity {
    pub id: String,
    pub tag: String,
    #[serde(rename = "type")]
    pub kind: EntityType,
    pub path: Option<String>,
    pub parent_id: Option<String>,
    pub position: Option<Vec3>,
    pub rotation: Option<Quat>,
    pub size: Option<Vec3>,
    pub scale: Option<Vec3>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub position_percent: Option<Vec3>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size_percent: Option<Vec3>,
}

impl From<&EntitySummary> for StateEntity {
    fn from(e: &EntitySummary) -> Self {
        Self {
            id: e.id.clone(),
            tag: e.tag.clone(),
            kind: e.kind,
            path: e.path.clone(),
            parent_id: e.parent_id.clone(),
            position: e.position,
            rotation: e.rotation,
            size: e.size,
            scale: e.scale,
            position_percent: e.position_percent,
            size_percent: e.size_percent,
        }
    }
}

/// Build the `state` response: the request minus `client-id`, plus the
/// client and entity lists.
pub fn state_payload(
    request: &Map<String, Value>,
    snapshot: &SessionSnapshot,
) -> Result<Map<String, Value>, serde_json::Error> {
    let clients: Vec<StateClient> = snapshot.clients.iter().map(StateClient::from).collect();
    let entities: Vec<StateEntity> = snapshot.entities.iter().map(StateEntity::from).collect();

    let mut out = status_payload(request, false);
    out.insert(keys::CLIENTS.into(), serde_json::to_value(clients)?);
    out.insert(keys::ENTITIES.into(), serde_json::to_value(entities)?);
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn session_topics_match_exactly_ignoring_case() {
        assert_eq!(
            Route::parse("vos/session/create"),
            Some(Route::Session(SessionVerb::Create))
        );
        assert_eq!(
            Route::parse("VOS/Session/GetState"),
            Some(Route::Session(SessionVerb::GetState))
        );
        assert_eq!(Route::parse("vos/session/create/extra"), None);
    }

    #[test]
    fn parses_parameterised_requests() {
        assert_eq!(
            Route::parse("vos/request/s1/createterrainentity"),
            Some(Route::CreateEntity {
                session_id: "s1".into(),
                kind: EntityType::Terrain
            })
        );
        assert_eq!(
            Route::parse("vos/request/s1/entity/e9/physicalproperties"),
            Some(Route::Entity {
                session_id: "s1".into(),
                entity_id: "e9".into(),
                verb: EntityVerb::PhysicalProperties
            })
        );
        assert_eq!(
            Route::parse("vos/request/s1/message/create"),
            Some(Route::SendMessage {
                session_id: "s1".into()
            })
        );
    }

    #[test]
    fn rejects_topics_outside_the_grammar() {
        for topic in [
            "vos/status/s1/entity/e1/position",
            "vos/request/s1/createwidgetentity",
            "vos/request/s1/entity/e1/teleport",
            "vos/request//entity/e1/position",
            "vos/request/s1/entity/e1",
            "other/topic",
        ] {
            assert_eq!(Route::parse(topic), None, "{topic}");
        }
    }

    #[test]
    fn status_topic_mirrors_request() {
        let route = Route::parse("vos/request/s1/entity/e1/canvastype").unwrap();
        assert_eq!(
            route.status_topic().unwrap(),
            "vos/status/s1/entity/e1/canvastype"
        );
        let route = Route::parse("vos/request/s1/message/create").unwrap();
        assert_eq!(route.status_topic().unwrap(), "vos/status/s1/message/new");
    }

    #[test]
    fn status_payload_replaces_message_id_and_strips_client() {
        let req = json!({"message-id": "client-chosen", "client-id": "c1", "x": 1});
        let out = status_payload(req.as_object().unwrap(), false);
        assert_ne!(out["message-id"], json!("client-chosen"));
        assert!(!out.contains_key("client-id"));
        assert_eq!(out["x"], json!(1));

        let kept = status_payload(req.as_object().unwrap(), true);
        assert_eq!(kept["client-id"], json!("c1"));
    }

    #[test]
    fn parent_uuid_is_accepted_as_parent_id() {
        let msg: CreateEntityMsg = serde_json::from_value(json!({
            "delete-with-client": false,
            "entity-id": "e1",
            "tag": "t",
            "parent-uuid": "p1"
        }))
        .unwrap();
        assert_eq!(msg.parent_id.as_deref(), Some("p1"));
    }
}
