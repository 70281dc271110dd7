//! SessionStore / SessionRegistry integration tests

#[cfg(test)]
mod tests {
    use std::time::Instant;
    use vos_sync::entity::{Entity, EntityType, Extent, Motion, PhysicalProperties};
    use vos_sync::session::SessionStore;
    use vos_sync::types::{Quat, Vec3};

    fn mesh(id: &str, extent: Extent) -> Entity {
        Entity::with_world_transform(
            id,
            "mesh",
            EntityType::Mesh,
            Vec3::new(1.0, 2.0, 3.0),
            Quat::identity(),
            extent,
        )
    }

    fn session_with_client() -> SessionStore {
        let mut s = SessionStore::new("s1", "demo");
        s.add_client("c1", "alice", Instant::now());
        s
    }

    // -----------------------------------------------------------------------
    // Uniqueness
    // -----------------------------------------------------------------------

    #[test]
    fn distinct_creations_are_all_kept() {
        let mut s = SessionStore::new("s1", "demo");
        for i in 0..25 {
            assert!(s.add_entity(mesh(&format!("e{i}"), Extent::Scale(Vec3::one())), None));
        }
        assert_eq!(s.entity_count(), 25);
    }

    #[test]
    fn duplicate_entity_id_leaves_store_unchanged() {
        let mut s = SessionStore::new("s1", "demo");
        s.add_entity(mesh("e1", Extent::Scale(Vec3::one())), None);
        let before = s.snapshot();

        let imposter = Entity::with_world_transform(
            "e1",
            "other",
            EntityType::Light,
            Vec3::zero(),
            Quat::identity(),
            Extent::Size(Vec3::one()),
        );
        assert!(!s.add_entity(imposter, None));
        assert_eq!(s.snapshot(), before);
    }

    #[test]
    fn removing_unknown_entity_is_a_noop() {
        let mut s = SessionStore::new("s1", "demo");
        assert!(s.remove_entity("ghost").is_none());
        assert_eq!(s.entity_count(), 0);
    }

    // -----------------------------------------------------------------------
    // Cascade
    // -----------------------------------------------------------------------

    #[test]
    fn removing_client_cascades_to_owned_entities() {
        let mut s = session_with_client();
        s.add_entity(mesh("owned", Extent::Scale(Vec3::one())), Some("c1"));
        s.add_entity(mesh("shared", Extent::Scale(Vec3::one())), None);

        assert_eq!(s.remove_client("c1"), Some(vec!["owned".to_string()]));
        assert!(s.entity("owned").is_none());
        assert!(s.entity("shared").is_some());
    }

    #[test]
    fn cascade_after_explicit_removal_does_not_fault() {
        let mut s = session_with_client();
        s.add_entity(mesh("e1", Extent::Scale(Vec3::one())), Some("c1"));
        s.remove_entity("e1");
        assert_eq!(s.remove_client("c1"), Some(vec![]));
        assert_eq!(s.client_count(), 0);
    }

    #[test]
    fn removing_unknown_client_is_a_noop() {
        let mut s = session_with_client();
        assert_eq!(s.remove_client("nobody"), None);
        assert_eq!(s.client_count(), 1);
    }

    // -----------------------------------------------------------------------
    // Field-scoped setters
    // -----------------------------------------------------------------------

    #[test]
    fn set_position_touches_only_position() {
        let mut s = SessionStore::new("s1", "demo");
        s.add_entity(mesh("e1", Extent::Scale(Vec3::new(2.0, 2.0, 2.0))), None);
        s.set_visibility("e1", true);

        assert_eq!(s.set_position("e1", Vec3::new(9.0, 8.0, 7.0)), Ok(true));

        let e = s.entity("e1").unwrap();
        let t = e.world_transform().unwrap();
        assert_eq!(t.position, Vec3::new(9.0, 8.0, 7.0));
        assert_eq!(t.rotation, Quat::identity());
        assert_eq!(t.scale, Some(Vec3::new(2.0, 2.0, 2.0)));
        assert_eq!(t.size, None);
        assert!(e.visible);
        assert_eq!(e.tag, "mesh");
    }

    #[test]
    fn set_rotation_and_size_touch_only_their_fields() {
        let mut s = SessionStore::new("s1", "demo");
        s.add_entity(mesh("e1", Extent::Scale(Vec3::one())), None);

        let q = Quat::new(0.0, 0.7071, 0.0, 0.7071);
        assert_eq!(s.set_rotation("e1", q), Ok(true));
        assert_eq!(s.set_size("e1", Vec3::new(4.0, 4.0, 4.0)), Ok(true));

        let t = s.entity("e1").unwrap().world_transform().unwrap().clone();
        assert_eq!(t.rotation, q);
        assert_eq!(t.position, Vec3::new(1.0, 2.0, 3.0));
        assert_eq!(t.scale, Some(Vec3::one()));
        assert_eq!(t.size, Some(Vec3::new(4.0, 4.0, 4.0)));
        assert!(!t.is_size);
    }

    #[test]
    fn motion_and_physics_overwrite_their_groups() {
        let mut s = SessionStore::new("s1", "demo");
        s.add_entity(mesh("e1", Extent::Scale(Vec3::one())), None);

        assert!(s.set_motion(
            "e1",
            Motion {
                angular_velocity: Vec3::new(0.0, 1.0, 0.0),
                velocity: Vec3::new(3.0, 0.0, 0.0),
                stationary: false,
            }
        ));
        assert!(s.set_physical_properties(
            "e1",
            PhysicalProperties {
                angular_drag: 0.05,
                center_of_mass: Vec3::new(0.0, -0.5, 0.0),
                drag: 0.1,
                gravitational: true,
                mass: 12.5,
            }
        ));

        let e = s.entity("e1").unwrap();
        assert_eq!(e.velocity, Vec3::new(3.0, 0.0, 0.0));
        assert!(!e.stationary);
        assert!(e.gravitational);
        assert_eq!(e.mass, 12.5);
        assert_eq!(e.center_of_mass, Vec3::new(0.0, -0.5, 0.0));
        assert_eq!(e.world_transform().unwrap().position, Vec3::new(1.0, 2.0, 3.0));
    }

    #[test]
    fn parent_can_be_set_and_cleared() {
        let mut s = SessionStore::new("s1", "demo");
        s.add_entity(mesh("root", Extent::Scale(Vec3::one())), None);
        s.add_entity(mesh("child", Extent::Scale(Vec3::one())), None);

        assert!(s.set_parent("child", Some("root".into())));
        assert_eq!(s.snapshot().entities[0].parent_id.as_deref(), Some("root"));
        assert!(s.set_parent("child", None));
        assert_eq!(s.entity("child").unwrap().parent, None);
    }

    // -----------------------------------------------------------------------
    // Snapshot
    // -----------------------------------------------------------------------

    #[test]
    fn sized_entity_reports_size_not_scale() {
        let mut s = SessionStore::new("s1", "demo");
        s.add_entity(mesh("e1", Extent::Size(Vec3::new(3.0, 1.0, 3.0))), None);

        let e = s.entity("e1").unwrap();
        assert!(e.is_size());

        let snap = s.snapshot();
        assert_eq!(snap.entities[0].size, Some(Vec3::new(3.0, 1.0, 3.0)));
        assert_eq!(snap.entities[0].scale, None);
    }

    #[test]
    fn canvas_entity_reports_percentages() {
        let mut s = SessionStore::new("s1", "demo");
        s.add_entity(
            Entity::with_canvas_transform(
                "t1",
                "label",
                EntityType::Text,
                Vec3::new(10.0, 90.0, 0.0),
                Vec3::new(30.0, 5.0, 0.0),
            ),
            None,
        );
        let snap = s.snapshot();
        let e = &snap.entities[0];
        assert_eq!(e.position, None);
        assert_eq!(e.scale, None);
        assert_eq!(e.size, None);
        assert_eq!(e.position_percent, Some(Vec3::new(10.0, 90.0, 0.0)));
        assert_eq!(e.size_percent, Some(Vec3::new(30.0, 5.0, 0.0)));
    }

    #[test]
    fn snapshot_lists_clients_by_id() {
        let mut s = SessionStore::new("s1", "demo");
        let now = Instant::now();
        s.add_client("zed", "z", now);
        s.add_client("amy", "a", now);
        let ids: Vec<_> = s.snapshot().clients.into_iter().map(|c| c.id).collect();
        assert_eq!(ids, vec!["amy", "zed"]);
    }
}
