//! Authorization checkpoints.
//!
//! The router consults an [`Authorizer`] once per request, after validation
//! and before touching state. A `false` answer drops the request silently:
//! the protocol has no negative acknowledgement.

use crate::entity::EntityType;
use crate::protocol::{EntityVerb, Route, SessionVerb};

/// One checkpoint per verb. Entity creation is a single checkpoint
/// parameterised by the entity type being created.
pub trait Authorizer: Send + Sync {
    fn can_create_session(&self, client_id: &str) -> bool;
    fn can_destroy_session(&self, client_id: &str, session_id: &str) -> bool;
    fn can_join_session(&self, client_id: &str, session_id: &str) -> bool;
    fn can_exit_session(&self, client_id: &str, session_id: &str) -> bool;
    fn can_give_heartbeat(&self, client_id: &str, session_id: &str) -> bool;
    fn can_get_session_state(&self, client_id: &str, session_id: &str) -> bool;

    fn can_create_entity(&self, client_id: &str, session_id: &str, kind: EntityType) -> bool;
    fn can_send_message(&self, client_id: &str, session_id: &str) -> bool;

    fn can_delete_entity(&self, client_id: &str, session_id: &str) -> bool;
    fn can_remove_entity(&self, client_id: &str, session_id: &str) -> bool;
    fn can_position_entity(&self, client_id: &str, session_id: &str) -> bool;
    fn can_rotate_entity(&self, client_id: &str, session_id: &str) -> bool;
    fn can_scale_entity(&self, client_id: &str, session_id: &str) -> bool;
    fn can_size_entity(&self, client_id: &str, session_id: &str) -> bool;
    fn can_set_canvas_type(&self, client_id: &str, session_id: &str) -> bool;
    fn can_set_highlight(&self, client_id: &str, session_id: &str) -> bool;
    fn can_set_motion(&self, client_id: &str, session_id: &str) -> bool;
    fn can_parent_entity(&self, client_id: &str, session_id: &str) -> bool;
    fn can_set_physical_properties(&self, client_id: &str, session_id: &str) -> bool;
    fn can_set_visibility(&self, client_id: &str, session_id: &str) -> bool;
}

/// Grants every request.
#[derive(Debug, Clone, Copy, Default)]
pub struct AllowAll;

impl Authorizer for AllowAll {
    fn can_create_session(&self, _: &str) -> bool {
        true
    }
    fn can_destroy_session(&self, _: &str, _: &str) -> bool {
        true
    }
    fn can_join_session(&self, _: &str, _: &str) -> bool {
        true
    }
    fn can_exit_session(&self, _: &str, _: &str) -> bool {
        true
    }
    fn can_give_heartbeat(&self, _: &str, _: &str) -> bool {
        true
    }
    fn can_get_session_state(&self, _: &str, _: &str) -> bool {
        true
    }
    fn can_create_entity(&self, _: &str, _: &str, _: EntityType) -> bool {
        true
    }
    fn can_send_message(&self, _: &str, _: &str) -> bool {
        true
    }
    fn can_delete_entity(&self, _: &str, _: &str) -> bool {
        true
    }
    fn can_remove_entity(&self, _: &str, _: &str) -> bool {
        true
    }
    fn can_position_entity(&self, _: &str, _: &str) -> bool {
        true
    }
    fn can_rotate_entity(&self, _: &str, _: &str) -> bool {
        true
    }
    fn can_scale_entity(&self, _: &str, _: &str) -> bool {
        true
    }
    fn can_size_entity(&self, _: &str, _: &str) -> bool {
        true
    }
    fn can_set_canvas_type(&self, _: &str, _: &str) -> bool {
        true
    }
    fn can_set_highlight(&self, _: &str, _: &str) -> bool {
        true
    }
    fn can_set_motion(&self, _: &str, _: &str) -> bool {
        true
    }
    fn can_parent_entity(&self, _: &str, _: &str) -> bool {
        true
    }
    fn can_set_physical_properties(&self, _: &str, _: &str) -> bool {
        true
    }
    fn can_set_visibility(&self, _: &str, _: &str) -> bool {
        true
    }
}

/// Ask `auth` about `route`. Returns the action name for log lines on denial.
pub fn check(
    auth: &dyn Authorizer,
    route: &Route,
    client_id: &str,
    session_id: &str,
) -> Result<(), &'static str> {
    let (allowed, action) = match route {
        Route::Session(verb) => match verb {
            SessionVerb::Create => (auth.can_create_session(client_id), "create a session"),
            SessionVerb::Destroy => (
                auth.can_destroy_session(client_id, session_id),
                "destroy a session",
            ),
            SessionVerb::Join => (auth.can_join_session(client_id, session_id), "join"),
            SessionVerb::Exit => (auth.can_exit_session(client_id, session_id), "exit"),
            SessionVerb::Heartbeat => (
                auth.can_give_heartbeat(client_id, session_id),
                "give a heartbeat",
            ),
            SessionVerb::GetState => (
                auth.can_get_session_state(client_id, session_id),
                "get session state",
            ),
        },
        Route::CreateEntity { kind, .. } => (
            auth.can_create_entity(client_id, session_id, *kind),
            "create an entity",
        ),
        Route::SendMessage { .. } => (auth.can_send_message(client_id, session_id), "send a message"),
        Route::Entity { verb, .. } => match verb {
            EntityVerb::Delete => (auth.can_delete_entity(client_id, session_id), "delete an entity"),
            EntityVerb::Remove => (auth.can_remove_entity(client_id, session_id), "remove an entity"),
            EntityVerb::Position => (
                auth.can_position_entity(client_id, session_id),
                "position an entity",
            ),
            EntityVerb::Rotation => (auth.can_rotate_entity(client_id, session_id), "rotate an entity"),
            EntityVerb::Scale => (auth.can_scale_entity(client_id, session_id), "scale an entity"),
            EntityVerb::Size => (auth.can_size_entity(client_id, session_id), "size an entity"),
            EntityVerb::CanvasType => (
                auth.can_set_canvas_type(client_id, session_id),
                "set entity canvas type",
            ),
            EntityVerb::Highlight => (
                auth.can_set_highlight(client_id, session_id),
                "set entity highlight state",
            ),
            EntityVerb::Motion => (auth.can_set_motion(client_id, session_id), "set entity motion"),
            EntityVerb::Parent => (auth.can_parent_entity(client_id, session_id), "parent an entity"),
            EntityVerb::PhysicalProperties => (
                auth.can_set_physical_properties(client_id, session_id),
                "set entity physical properties",
            ),
            EntityVerb::Visibility => (
                auth.can_set_visibility(client_id, session_id),
                "set entity visibility",
            ),
        },
    };
    if allowed {
        Ok(())
    } else {
        Err(action)
    }
}
