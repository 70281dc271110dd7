//! Required-field schema per verb.
//!
//! Each route declares its required top-level keys and, for vector fields,
//! the sub-keys they must carry. Validation runs on the raw JSON object
//! before it is decoded into a typed payload, so a missing key is reported
//! by name rather than as a generic decode failure.

use serde_json::{Map, Value};

use crate::entity::{EntityType, PlacementKind};
use crate::error::SyncError;
use crate::protocol::{EntityVerb, Route, SessionVerb};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Shape {
    /// Key must be present; any value.
    Any,
    /// Object with `x`, `y`, `z`.
    Vector,
    /// Object with `x`, `y`, `z`, `w`.
    Quaternion,
}

impl Shape {
    fn sub_keys(&self) -> &'static [&'static str] {
        match self {
            Shape::Any => &[],
            Shape::Vector => &["x", "y", "z"],
            Shape::Quaternion => &["x", "y", "z", "w"],
        }
    }
}

pub type Field = (&'static str, Shape);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Schema {
    /// Human-readable verb name used in log lines.
    pub verb: &'static str,
    pub required: Vec<Field>,
    /// Exactly one of these must be present.
    pub exactly_one_of: Vec<Field>,
}

impl Schema {
    fn new(verb: &'static str, required: &[Field]) -> Self {
        Self {
            verb,
            required: required.to_vec(),
            exactly_one_of: Vec::new(),
        }
    }

    fn with(mut self, more: &[Field]) -> Self {
        self.required.extend_from_slice(more);
        self
    }

    fn one_of(mut self, alternatives: &[Field]) -> Self {
        self.exactly_one_of = alternatives.to_vec();
        self
    }

    pub fn for_route(route: &Route) -> Schema {
        match route {
            Route::Session(verb) => session_schema(*verb),
            Route::CreateEntity { kind, .. } => create_schema(*kind),
            Route::SendMessage { .. } => Schema::new(
                "send message",
                &[("client-id", Shape::Any), ("topic", Shape::Any), ("message", Shape::Any)],
            ),
            Route::Entity { verb, .. } => entity_schema(*verb),
        }
    }

    pub fn validate(&self, payload: &Map<String, Value>) -> Result<(), SyncError> {
        for (key, shape) in &self.required {
            let value = payload.get(*key).ok_or_else(|| self.missing(key.to_string()))?;
            self.check_shape(key, *shape, value)?;
        }

        if !self.exactly_one_of.is_empty() {
            let present: Vec<&Field> = self
                .exactly_one_of
                .iter()
                .filter(|(k, _)| payload.contains_key(*k))
                .collect();
            match present.as_slice() {
                [(key, shape)] => {
                    self.check_shape(key, *shape, &payload[*key])?;
                }
                [] => return Err(self.missing(self.alternatives())),
                _ => {
                    return Err(SyncError::InvalidField {
                        verb: self.verb,
                        field: self.alternatives(),
                        reason: "only one may be given".into(),
                    })
                }
            }
        }

        Ok(())
    }

    fn check_shape(&self, key: &str, shape: Shape, value: &Value) -> Result<(), SyncError> {
        let subs = shape.sub_keys();
        if subs.is_empty() {
            return Ok(());
        }
        let obj = value.as_object().ok_or_else(|| SyncError::InvalidField {
            verb: self.verb,
            field: key.to_string(),
            reason: "expected an object".into(),
        })?;
        for sub in subs {
            if !obj.contains_key(*sub) {
                return Err(self.missing(format!("{key}.{sub}")));
            }
        }
        Ok(())
    }

    fn missing(&self, field: String) -> SyncError {
        SyncError::MissingField {
            verb: self.verb,
            field,
        }
    }

    fn alternatives(&self) -> String {
        self.exactly_one_of
            .iter()
            .map(|(k, _)| *k)
            .collect::<Vec<_>>()
            .join(" | ")
    }
}

const SESSION_CLIENT: &[Field] = &[("session-id", Shape::Any), ("client-id", Shape::Any)];

fn session_schema(verb: SessionVerb) -> Schema {
    match verb {
        SessionVerb::Create => {
            Schema::new("create session", SESSION_CLIENT).with(&[("session-tag", Shape::Any)])
        }
        SessionVerb::Destroy => Schema::new("destroy session", SESSION_CLIENT),
        SessionVerb::Join => {
            Schema::new("join session", SESSION_CLIENT).with(&[("client-tag", Shape::Any)])
        }
        SessionVerb::Exit => Schema::new("exit session", SESSION_CLIENT),
        SessionVerb::Heartbeat => Schema::new("heartbeat", SESSION_CLIENT),
        SessionVerb::GetState => Schema::new("session state", SESSION_CLIENT),
    }
}

fn create_verb(kind: EntityType) -> &'static str {
    match kind {
        EntityType::Container => "create container entity",
        EntityType::Mesh => "create mesh entity",
        EntityType::Character => "create character entity",
        EntityType::Button => "create button entity",
        EntityType::Canvas => "create canvas entity",
        EntityType::Input => "create input entity",
        EntityType::Light => "create light entity",
        EntityType::Terrain => "create terrain entity",
        EntityType::Text => "create text entity",
        EntityType::Voxel => "create voxel entity",
    }
}

fn create_schema(kind: EntityType) -> Schema {
    let common = Schema::new(
        create_verb(kind),
        &[
            ("delete-with-client", Shape::Any),
            ("entity-id", Shape::Any),
            ("tag", Shape::Any),
        ],
    );

    let placed = match kind.placement() {
        PlacementKind::World => common
            .with(&[("position", Shape::Vector), ("rotation", Shape::Quaternion)])
            .one_of(&[("scale", Shape::Vector), ("size", Shape::Vector)]),
        PlacementKind::Canvas => common.with(&[
            ("position-percent", Shape::Vector),
            ("size-percent", Shape::Vector),
        ]),
    };

    match kind {
        EntityType::Terrain => placed.with(&[
            ("length", Shape::Any),
            ("width", Shape::Any),
            ("height", Shape::Any),
            ("heights", Shape::Any),
        ]),
        EntityType::Text => placed.with(&[("text", Shape::Any), ("font-size", Shape::Any)]),
        EntityType::Button | EntityType::Input => placed.with(&[("on-click", Shape::Any)]),
        _ => placed,
    }
}

fn entity_schema(verb: EntityVerb) -> Schema {
    let base = |name: &'static str, fields: &[Field]| {
        Schema::new(name, &[("entity-id", Shape::Any)]).with(fields)
    };
    match verb {
        EntityVerb::Delete => base("delete entity", &[]),
        EntityVerb::Remove => base("remove entity", &[]),
        EntityVerb::Position => base("position entity", &[("position", Shape::Vector)]),
        EntityVerb::Rotation => base("rotate entity", &[("rotation", Shape::Quaternion)]),
        EntityVerb::Scale => base("scale entity", &[("scale", Shape::Vector)]),
        EntityVerb::Size => base("size entity", &[("size", Shape::Vector)]),
        EntityVerb::CanvasType => base("canvas type entity", &[("canvas-type", Shape::Any)]),
        EntityVerb::Highlight => base("highlight state entity", &[("highlighted", Shape::Any)]),
        EntityVerb::Motion => base(
            "motion entity",
            &[
                ("angular-velocity", Shape::Vector),
                ("velocity", Shape::Vector),
                ("stationary", Shape::Any),
            ],
        ),
        EntityVerb::Parent => base("parent entity", &[("parent-id", Shape::Any)]),
        EntityVerb::PhysicalProperties => base(
            "physical properties entity",
            &[
                ("angular-drag", Shape::Any),
                ("center-of-mass", Shape::Vector),
                ("drag", Shape::Any),
                ("gravitational", Shape::Any),
                ("mass", Shape::Any),
            ],
        ),
        EntityVerb::Visibility => base("visibility entity", &[("visible", Shape::Any)]),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn obj(v: Value) -> Map<String, Value> {
        v.as_object().cloned().unwrap()
    }

    fn mesh_route() -> Route {
        Route::CreateEntity {
            session_id: "s1".into(),
            kind: EntityType::Mesh,
        }
    }

    fn mesh_payload() -> Value {
        json!({
            "delete-with-client": true,
            "entity-id": "e1",
            "tag": "cube",
            "position": {"x": 0, "y": 0, "z": 0},
            "rotation": {"x": 0, "y": 0, "z": 0, "w": 1},
            "scale": {"x": 1, "y": 1, "z": 1}
        })
    }

    #[test]
    fn accepts_complete_world_creation() {
        Schema::for_route(&mesh_route())
            .validate(&obj(mesh_payload()))
            .unwrap();
    }

    #[test]
    fn reports_missing_sub_key_by_path() {
        let mut p = mesh_payload();
        p["rotation"].as_object_mut().unwrap().remove("w");
        let err = Schema::for_route(&mesh_route())
            .validate(&obj(p))
            .unwrap_err();
        match err {
            SyncError::MissingField { field, .. } => assert_eq!(field, "rotation.w"),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn requires_exactly_one_of_scale_or_size() {
        let mut p = mesh_payload();
        p["size"] = json!({"x": 1, "y": 1, "z": 1});
        assert!(matches!(
            Schema::for_route(&mesh_route()).validate(&obj(p.clone())),
            Err(SyncError::InvalidField { .. })
        ));

        p.as_object_mut().unwrap().remove("size");
        p.as_object_mut().unwrap().remove("scale");
        assert!(matches!(
            Schema::for_route(&mesh_route()).validate(&obj(p)),
            Err(SyncError::MissingField { .. })
        ));
    }

    #[test]
    fn canvas_types_need_percentages_and_type_extras() {
        let route = Route::CreateEntity {
            session_id: "s1".into(),
            kind: EntityType::Text,
        };
        let p = json!({
            "delete-with-client": false,
            "entity-id": "t1",
            "tag": "label",
            "position-percent": {"x": 10, "y": 10, "z": 0},
            "size-percent": {"x": 20, "y": 5, "z": 0},
            "text": "hello"
        });
        let err = Schema::for_route(&route).validate(&obj(p)).unwrap_err();
        assert!(matches!(err, SyncError::MissingField { field, .. } if field == "font-size"));
    }

    #[test]
    fn vector_fields_must_be_objects() {
        let route = Route::Entity {
            session_id: "s1".into(),
            entity_id: "e1".into(),
            verb: EntityVerb::Position,
        };
        let err = Schema::for_route(&route)
            .validate(&obj(json!({"entity-id": "e1", "position": [1, 2, 3]})))
            .unwrap_err();
        assert!(matches!(err, SyncError::InvalidField { .. }));
    }
}
