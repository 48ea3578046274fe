//! Integration tests for regions-core

use std::sync::Arc;

use regions_core::*;
use uuid::Uuid;

// ============================================================================
// Helpers
// ============================================================================

fn cube(min: i32, max: i32) -> RegionBox {
    RegionBox::new(min, min, min, max, max, max).unwrap()
}

fn setup(policy: ResolutionPolicy) -> (RegionManager, WorldId) {
    let mut manager = RegionManager::new(ManagerConfig { resolution: policy });
    let world = manager.link_host_world("W");
    (manager, world)
}

/// A host-side player stub.
struct TestPlayer {
    id: Uuid,
    location: Location,
    master_key: bool,
    teleports: Vec<Location>,
}

impl TestPlayer {
    fn new(id: Uuid, location: Location) -> Self {
        Self {
            id,
            location,
            master_key: false,
            teleports: Vec::new(),
        }
    }
}

impl PlayerHandle for TestPlayer {
    fn user_id(&self) -> Uuid {
        self.id
    }

    fn location(&self) -> Location {
        self.location
    }

    fn has_master_key(&self) -> bool {
        self.master_key
    }

    fn teleport(&mut self, to: Location) {
        self.location = to;
        self.teleports.push(to);
    }
}

/// World `W` grants entrance and exit publicly; `R1` (0..9 cube) does not
/// grant entrance.
fn guarded_world() -> (RegionManager, WorldId, RegionId) {
    let (mut manager, world) = setup(ResolutionPolicy::InnermostOnly);
    manager
        .area_mut(AreaId::World(world))
        .unwrap()
        .add_permissions_to_role(PUBLIC_ROLE, [Permission::Entrance, Permission::Exit])
        .unwrap();
    let r1 = manager.register_new_region("R1", world, cube(0, 9)).unwrap();
    manager
        .area_mut(AreaId::Region(r1))
        .unwrap()
        .add_permissions_to_role(PUBLIC_ROLE, [Permission::Exit])
        .unwrap();
    (manager, world, r1)
}

// ============================================================================
// Spatial Index
// ============================================================================

#[test]
fn test_region_at_matches_box_exactly() {
    let (mut manager, world) = setup(ResolutionPolicy::InnermostOnly);
    let b = RegionBox::new(-20, 0, 3, 18, 4, 40).unwrap();
    let id = manager.register_new_region("r", world, b).unwrap();

    for x in -24..=22 {
        for y in -2..=6 {
            for z in -1..=44 {
                let expected = b.contains(x, y, z).then_some(id);
                assert_eq!(manager.region_at(world, x, y, z), expected, "({x}, {y}, {z})");
            }
        }
    }
}

#[test]
fn test_area_at_falls_back_to_world() {
    let (mut manager, world) = setup(ResolutionPolicy::InnermostOnly);
    let id = manager.register_new_region("r", world, cube(0, 9)).unwrap();

    assert_eq!(manager.area_at(world, 5, 5, 5), Some(AreaId::Region(id)));
    assert_eq!(manager.area_at(world, 50, 5, 5), Some(AreaId::World(world)));
}

#[test]
fn test_overlapping_registration_fails_without_change() {
    let (mut manager, world) = setup(ResolutionPolicy::InnermostOnly);
    let r1 = manager.register_new_region("R1", world, cube(0, 9)).unwrap();

    let r2 = RegionBox::new(5, 0, 0, 14, 9, 9).unwrap();
    assert_eq!(
        manager.register_new_region("R2", world, r2),
        Err(RegionError::Overlap(vec!["R1".into()]))
    );

    let regions: Vec<_> = manager.world(world).unwrap().regions().collect();
    assert_eq!(regions, vec![r1]);
    assert_eq!(manager.region_at(world, 12, 5, 5), None);
}

#[test]
fn test_removal_clears_every_bucket() {
    let (mut manager, world) = setup(ResolutionPolicy::InnermostOnly);
    let b = RegionBox::new(-40, 0, -40, 40, 10, 40).unwrap();
    manager.register_new_region("big", world, b).unwrap();

    manager.remove_region("big").unwrap();

    let index = manager.world(world).unwrap().index();
    assert!(index.is_empty());
    assert!(index.overlapping(&b, None).is_empty());
    for (x, z) in [(-40, -40), (0, 0), (40, 40), (-1, 17)] {
        assert_eq!(manager.area_at(world, x, 5, z), Some(AreaId::World(world)));
    }
}

#[test]
fn test_removal_falls_through_to_other_region() {
    let (mut manager, world) = setup(ResolutionPolicy::InnermostOnly);
    let a = manager.register_new_region("a", world, cube(0, 9)).unwrap();
    manager.remove_region("a").unwrap();
    let b = manager.register_new_region("b", world, cube(0, 20)).unwrap();

    assert_ne!(a, b);
    assert_eq!(manager.region_at(world, 5, 5, 5), Some(b));
}

// ============================================================================
// Region Graph
// ============================================================================

#[test]
fn test_direct_cycle_fails() {
    let (mut manager, world) = setup(ResolutionPolicy::InnermostOnly);
    let a = manager.register_new_region("A", world, cube(0, 1)).unwrap();
    let b = manager.register_new_region("B", world, cube(10, 11)).unwrap();

    assert_eq!(manager.add_parent(a, b), Ok(true));
    assert_eq!(
        manager.add_parent(b, a),
        Err(RegionError::Cycle {
            child: "B".into(),
            parent: "A".into()
        })
    );
}

#[test]
fn test_transitive_cycle_fails_on_third_edge() {
    let (mut manager, world) = setup(ResolutionPolicy::InnermostOnly);
    let a = manager.register_new_region("A", world, cube(0, 1)).unwrap();
    let b = manager.register_new_region("B", world, cube(10, 11)).unwrap();
    let c = manager.register_new_region("C", world, cube(20, 21)).unwrap();

    manager.add_parent(a, b).unwrap();
    manager.add_parent(b, c).unwrap();
    assert!(matches!(
        manager.add_parent(c, a),
        Err(RegionError::Cycle { .. })
    ));

    assert_eq!(manager.all_descendants(c).unwrap(), vec![b, a]);
    assert!(manager.region(c).unwrap().parents().next().is_none());
}

#[test]
fn test_existing_edge_is_a_noop() {
    let (mut manager, world) = setup(ResolutionPolicy::InnermostOnly);
    let a = manager.register_new_region("A", world, cube(0, 1)).unwrap();
    let b = manager.register_new_region("B", world, cube(10, 11)).unwrap();

    assert_eq!(manager.add_parent(a, b), Ok(true));
    assert_eq!(manager.add_parent(a, b), Ok(false));
    assert_eq!(manager.direct_ancestors(a).unwrap(), vec![b]);
}

#[test]
fn test_removing_parent_region_detaches_children() {
    let (mut manager, world) = setup(ResolutionPolicy::InnermostOnly);
    let a = manager.register_new_region("A", world, cube(0, 1)).unwrap();
    let b = manager.register_new_region("B", world, cube(10, 11)).unwrap();
    manager.add_parent(a, b).unwrap();

    manager.remove_region("B").unwrap();
    assert!(manager.direct_ancestors(a).unwrap().is_empty());
    assert_eq!(manager.add_parent(a, b), Err(RegionError::Invalidated(b)));
}

// ============================================================================
// Access Control
// ============================================================================

#[test]
fn test_public_role_governs_every_non_member() {
    let (mut manager, world) = setup(ResolutionPolicy::InnermostOnly);
    let strangers = [Uuid::from_u128(1), Uuid::from_u128(2)];

    for user in strangers {
        assert_eq!(
            manager.test_permission_at(world, (0, 0, 0), user, Permission::Build),
            Some(false)
        );
    }

    manager
        .area_mut(AreaId::World(world))
        .unwrap()
        .add_permissions_to_role("public", [Permission::Build])
        .unwrap();

    for user in strangers {
        assert_eq!(
            manager.test_permission_at(world, (0, 0, 0), user, Permission::Build),
            Some(true)
        );
    }
}

#[test]
fn test_deleting_role_shrinks_member_permissions() {
    let (mut manager, world) = setup(ResolutionPolicy::InnermostOnly);
    let alice = manager
        .users_mut()
        .get_user(&Profile::new(Uuid::from_u128(7), "alice"));

    let area = manager.area_mut(AreaId::World(world)).unwrap();
    area.register_new_role("builder").unwrap();
    area.add_permissions_to_role("builder", [Permission::Build, Permission::Break])
        .unwrap();
    area.add_member(Arc::clone(&alice)).unwrap();
    area.add_role_to_member(alice.id(), "builder").unwrap();
    assert!(area.test_permission(alice.id(), Permission::Break));

    area.remove_role("builder").unwrap();
    assert!(area.get_member(alice.id()).is_some());
    assert!(area.effective_permissions(alice.id()).is_empty());
}

#[test]
fn test_deny_overrides_consults_ancestors_and_world() {
    let (mut manager, world) = setup(ResolutionPolicy::DenyOverrides);
    let user = Uuid::from_u128(5);
    let outer = manager.register_new_region("outer", world, cube(0, 9)).unwrap();
    let inner = manager.register_new_region("inner", world, cube(20, 29)).unwrap();
    manager.add_parent(inner, outer).unwrap();

    for id in [AreaId::World(world), AreaId::Region(outer), AreaId::Region(inner)] {
        manager
            .area_mut(id)
            .unwrap()
            .add_permissions_to_role(PUBLIC_ROLE, [Permission::Build])
            .unwrap();
    }
    assert_eq!(
        manager.test_permission_at(world, (25, 25, 25), user, Permission::Build),
        Some(true)
    );

    manager
        .area_mut(AreaId::Region(outer))
        .unwrap()
        .remove_permissions_from_role(PUBLIC_ROLE, [Permission::Build])
        .unwrap();
    assert_eq!(
        manager.test_permission_at(world, (25, 25, 25), user, Permission::Build),
        Some(false)
    );
    assert!(!manager.permits(AreaId::Region(inner), user, Permission::Build));
}

#[test]
fn test_innermost_only_ignores_ancestors() {
    let (mut manager, world) = setup(ResolutionPolicy::InnermostOnly);
    let user = Uuid::from_u128(5);
    let outer = manager.register_new_region("outer", world, cube(0, 9)).unwrap();
    let inner = manager.register_new_region("inner", world, cube(20, 29)).unwrap();
    manager.add_parent(inner, outer).unwrap();
    manager
        .area_mut(AreaId::Region(inner))
        .unwrap()
        .add_permissions_to_role(PUBLIC_ROLE, [Permission::Build])
        .unwrap();

    assert!(manager.permits(AreaId::Region(inner), user, Permission::Build));
    assert!(!manager.permits(AreaId::Region(outer), user, Permission::Build));
}

// ============================================================================
// Movement Enforcement
// ============================================================================

#[test]
fn test_entering_denied_region_reverts() {
    let (mut manager, world, _) = guarded_world();
    let profile = Profile::new(Uuid::from_u128(1), "walker");
    manager.users_mut().connect(&profile);

    let mut players = [TestPlayer::new(profile.id, Location::new(world, 20.0, 0.0, 0.0))];
    let first = tick(&mut manager, &mut players);
    assert_eq!(first, TickReport { checked: 1, denied: 0 });

    players[0].location = Location {
        yaw: 90.0,
        pitch: -10.0,
        ..Location::new(world, 5.0, 0.0, 0.0)
    };
    let second = tick(&mut manager, &mut players);
    assert_eq!(second.denied, 1);

    let reverted = players[0].location;
    assert_eq!((reverted.x, reverted.y, reverted.z), (20.0, 0.0, 0.0));
    assert_eq!((reverted.yaw, reverted.pitch), (90.0, -10.0));
    let previous = manager
        .users()
        .online_user(profile.id)
        .unwrap()
        .previous_location
        .unwrap();
    assert_eq!(previous.x, 20.0);
}

#[test]
fn test_leaving_region_needs_exit() {
    let (mut manager, world, r1) = guarded_world();
    manager
        .area_mut(AreaId::Region(r1))
        .unwrap()
        .add_permissions_to_role(PUBLIC_ROLE, [Permission::Entrance])
        .unwrap();
    manager
        .area_mut(AreaId::Region(r1))
        .unwrap()
        .remove_permissions_from_role(PUBLIC_ROLE, [Permission::Exit])
        .unwrap();
    let profile = Profile::new(Uuid::from_u128(1), "walker");
    manager.users_mut().connect(&profile);

    let mut players = [TestPlayer::new(profile.id, Location::new(world, 20.0, 0.0, 0.0))];
    tick(&mut manager, &mut players);
    players[0].location = Location::new(world, 5.0, 0.0, 0.0);
    assert_eq!(tick(&mut manager, &mut players).denied, 0);

    players[0].location = Location::new(world, 30.0, 0.0, 0.0);
    assert_eq!(tick(&mut manager, &mut players).denied, 1);
    assert_eq!(players[0].location.x, 5.0);
}

#[test]
fn test_movement_within_one_area_is_free() {
    let (mut manager, world, _) = guarded_world();
    let profile = Profile::new(Uuid::from_u128(1), "walker");
    manager.users_mut().connect(&profile);

    let mut players = [TestPlayer::new(profile.id, Location::new(world, 20.0, 0.0, 0.0))];
    tick(&mut manager, &mut players);
    players[0].location = Location::new(world, 200.0, 0.0, -40.0);
    assert_eq!(tick(&mut manager, &mut players).denied, 0);
    assert!(players[0].teleports.is_empty());
}

#[test]
fn test_master_key_and_membership_bypass() {
    let (mut manager, world, r1) = guarded_world();
    let admin = Profile::new(Uuid::from_u128(1), "admin");
    let builder = Profile::new(Uuid::from_u128(2), "builder");
    manager.users_mut().connect(&admin);
    let builder_user = manager.users_mut().connect(&builder);

    let area = manager.area_mut(AreaId::Region(r1)).unwrap();
    area.register_new_role("guest").unwrap();
    area.add_permissions_to_role("guest", [Permission::Entrance])
        .unwrap();
    area.add_member(builder_user).unwrap();
    area.add_role_to_member(builder.id, "guest").unwrap();

    let start = Location::new(world, 20.0, 0.0, 0.0);
    let mut players = [TestPlayer::new(admin.id, start), TestPlayer::new(builder.id, start)];
    players[0].master_key = true;
    tick(&mut manager, &mut players);

    for player in &mut players {
        player.location = Location::new(world, 5.0, 0.0, 0.0);
    }
    let report = tick(&mut manager, &mut players);
    assert_eq!(report, TickReport { checked: 2, denied: 0 });
}

#[test]
fn test_offline_players_are_skipped() {
    let (mut manager, world, _) = guarded_world();
    let mut players = [TestPlayer::new(Uuid::from_u128(9), Location::new(world, 5.0, 0.0, 0.0))];
    assert_eq!(tick(&mut manager, &mut players).checked, 0);
}

// ============================================================================
// Persistence
// ============================================================================

#[test]
fn test_save_reload_reconstructs_region() {
    let (mut manager, world) = setup(ResolutionPolicy::InnermostOnly);
    let alice = manager
        .users_mut()
        .get_user(&Profile::new(Uuid::from_u128(11), "alice"));
    let bounds = RegionBox::new(-5, 60, 3, 12, 80, 30).unwrap();
    let home = manager.register_new_region("Home", world, bounds).unwrap();
    let yard = manager.register_new_region("yard", world, cube(100, 120)).unwrap();
    manager.add_parent(home, yard).unwrap();

    let area = manager.area_mut(AreaId::Region(home)).unwrap();
    area.add_permissions_to_role(PUBLIC_ROLE, [Permission::Entrance])
        .unwrap();
    area.register_new_role("builder").unwrap();
    area.add_permissions_to_role("builder", [Permission::Build])
        .unwrap();
    area.add_member(Arc::clone(&alice)).unwrap();
    area.add_role_to_member(alice.id(), "builder").unwrap();
    area.add_protections([Protection::Pvp]);

    let mut store = MemoryStore::new();
    manager.save_all(&mut store).unwrap();

    let mut reloaded = RegionManager::new(ManagerConfig::default());
    let report = reloaded.load(&store, &["W"]);
    assert!(report.failures.is_empty(), "{:?}", report.failures);
    assert_eq!((report.worlds_loaded, report.regions_loaded), (1, 2));

    let world2 = reloaded.get_region_world("w").unwrap();
    assert!(reloaded.world(world2).unwrap().is_linked());
    let home2 = reloaded.get_region("home").unwrap();
    let yard2 = reloaded.get_region("YARD").unwrap();
    let region = reloaded.region(home2).unwrap();

    assert_eq!(region.bounds(), bounds);
    assert_eq!(region.world(), world2);
    assert_eq!(region.parents().collect::<Vec<_>>(), vec![yard2]);
    assert!(!region.area().is_dirty());

    let original = manager.region(home).unwrap().area();
    let area = region.area();
    assert_eq!(area.public_role(), original.public_role());
    assert_eq!(area.get_role("builder"), original.get_role("builder"));
    assert_eq!(area.protections(), original.protections());

    let member = area.get_member(alice.id()).unwrap();
    assert_eq!(member.name(), "alice");
    assert_eq!(member.roles().collect::<Vec<_>>(), vec!["builder"]);
    assert_eq!(reloaded.region_at(world2, 0, 70, 10), Some(home2));
}

#[test]
fn test_bad_documents_do_not_stop_loading() {
    let mut store = MemoryStore::new();
    let mut source = RegionManager::new(ManagerConfig::default());
    let world = source.link_host_world("W");
    source.register_new_region("good", world, cube(0, 9)).unwrap();
    source.save_all(&mut store).unwrap();

    let mut garbage = Document::new();
    garbage.set("type", "region");
    store.insert(AreaKind::Region, "broken", garbage);

    let mut orphan = store.get(AreaKind::Region, "good").unwrap().clone();
    orphan.set("name", "orphan");
    orphan.set("world", "missing");
    store.insert(AreaKind::Region, "orphan", orphan);

    // Sorts after "good", so it is the one rejected for overlapping.
    let mut clash = store.get(AreaKind::Region, "good").unwrap().clone();
    clash.set("name", "zclash");
    store.insert(AreaKind::Region, "zclash", clash);

    let mut dangling = store.get(AreaKind::Region, "good").unwrap().clone();
    dangling.set("name", "dangling");
    dangling.set("parents", vec!["nowhere"]);
    let bounds = dangling.create_section("box");
    for (corner, v) in [("min", 50), ("max", 60)] {
        let point = bounds.create_section(corner);
        point.set("x", v);
        point.set("y", v);
        point.set("z", v);
    }
    store.insert(AreaKind::Region, "dangling", dangling);

    let mut manager = RegionManager::new(ManagerConfig::default());
    let report = manager.load(&store, &[]);

    assert_eq!(report.regions_loaded, 2);
    let mut failed: Vec<_> = report.failures.iter().map(|f| f.name.as_str()).collect();
    failed.sort_unstable();
    assert_eq!(failed, vec!["broken", "dangling", "orphan", "zclash"]);
    assert!(manager.get_region("good").is_some());
    assert!(manager.get_region("dangling").is_some());
}

/// A memory store whose next `remove` calls fail.
struct FailingRemoves {
    inner: MemoryStore,
    failures_left: usize,
}

impl DocumentStore for FailingRemoves {
    type Error = MissingDocument;

    fn list(&self, kind: AreaKind) -> Result<Vec<String>, Self::Error> {
        self.inner.list(kind)
    }

    fn read(&self, kind: AreaKind, name: &str) -> Result<Document, Self::Error> {
        self.inner.read(kind, name)
    }

    fn write(&mut self, kind: AreaKind, name: &str, document: &Document) -> Result<(), Self::Error> {
        self.inner.write(kind, name, document)
    }

    fn remove(&mut self, kind: AreaKind, name: &str) -> Result<(), Self::Error> {
        if self.failures_left > 0 {
            self.failures_left -= 1;
            return Err(MissingDocument {
                kind,
                name: name.to_owned(),
            });
        }
        self.inner.remove(kind, name)
    }
}

#[test]
fn test_failed_delete_is_retried_on_next_save() {
    let (mut manager, world) = setup(ResolutionPolicy::InnermostOnly);
    manager.register_new_region("a", world, cube(0, 9)).unwrap();
    manager.register_new_region("b", world, cube(20, 29)).unwrap();

    let mut store = FailingRemoves {
        inner: MemoryStore::new(),
        failures_left: 1,
    };
    manager.save_all(&mut store).unwrap();

    manager.remove_region("a").unwrap();
    manager.remove_region("b").unwrap();
    assert!(manager.save_dirty(&mut store).is_err());
    manager.save_dirty(&mut store).unwrap();

    assert!(store.inner.get(AreaKind::Region, "a").is_none());
    assert!(store.inner.get(AreaKind::Region, "b").is_none());

    let mut reloaded = RegionManager::new(ManagerConfig::default());
    let report = reloaded.load(&store, &["W"]);
    assert_eq!(report.regions_loaded, 0);
    assert!(reloaded.get_region("a").is_none());
    assert!(reloaded.get_region("b").is_none());
}
