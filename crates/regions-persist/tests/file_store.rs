//! Integration tests for the file-backed store

use std::fs;
use std::sync::Arc;

use regions_core::{
    AreaId, AreaKind, Document, DocumentStore, ManagerConfig, Permission, Profile, RegionBox,
    RegionManager,
};
use regions_persist::{FileStore, StoreError};
use tempfile::TempDir;
use uuid::Uuid;

// ============================================================================
// Store Basics
// ============================================================================

#[test]
fn test_open_creates_directories() {
    let dir = TempDir::new().unwrap();
    let root = dir.path().join("data");
    let store = FileStore::open(&root).unwrap();

    assert!(root.join("worlds").is_dir());
    assert!(root.join("regions").is_dir());
    assert_eq!(store.path(AreaKind::Region, "spawn"), root.join("regions/spawn.json"));
}

#[test]
fn test_open_fails_when_root_is_a_file() {
    let dir = TempDir::new().unwrap();
    let root = dir.path().join("data");
    fs::write(&root, "not a directory").unwrap();

    assert!(matches!(FileStore::open(&root), Err(StoreError::Io { .. })));
}

#[test]
fn test_write_read_list_remove() {
    let dir = TempDir::new().unwrap();
    let mut store = FileStore::open(dir.path()).unwrap();

    let mut doc = Document::new();
    doc.set("type", "region");
    doc.set("name", "b.2");
    store.write(AreaKind::Region, "b.2", &doc).unwrap();
    store.write(AreaKind::Region, "a", &Document::new()).unwrap();
    fs::write(store.dir(AreaKind::Region).join("notes.txt"), "ignored").unwrap();

    assert_eq!(store.list(AreaKind::Region).unwrap(), vec!["a", "b.2"]);
    assert!(store.list(AreaKind::World).unwrap().is_empty());
    assert_eq!(store.read(AreaKind::Region, "b.2").unwrap(), doc);

    store.remove(AreaKind::Region, "a").unwrap();
    store.remove(AreaKind::Region, "a").unwrap();
    assert_eq!(store.list(AreaKind::Region).unwrap(), vec!["b.2"]);
}

#[test]
fn test_malformed_json_is_reported_with_path() {
    let dir = TempDir::new().unwrap();
    let store = FileStore::open(dir.path()).unwrap();
    let path = store.path(AreaKind::World, "world");
    fs::write(&path, "{ nope").unwrap();

    match store.read(AreaKind::World, "world") {
        Err(StoreError::Json { path: reported, .. }) => assert_eq!(reported, path),
        other => panic!("expected json error, got {other:?}"),
    }
}

// ============================================================================
// Manager Round Trip
// ============================================================================

#[test]
fn test_manager_roundtrip_through_files() {
    let dir = TempDir::new().unwrap();
    let mut store = FileStore::open(dir.path()).unwrap();

    let mut manager = RegionManager::new(ManagerConfig::default());
    let world = manager.link_host_world("world");
    let bob = manager
        .users_mut()
        .get_user(&Profile::new(Uuid::from_u128(77), "bob"));
    let id = manager
        .register_new_region("market", world, RegionBox::new(0, 0, 0, 31, 255, 31).unwrap())
        .unwrap();
    let area = manager.area_mut(AreaId::Region(id)).unwrap();
    area.register_new_role("builder").unwrap();
    area.add_permissions_to_role("builder", [Permission::Build])
        .unwrap();
    area.add_member(Arc::clone(&bob)).unwrap();
    area.add_role_to_member(bob.id(), "builder").unwrap();

    assert_eq!(manager.save_dirty(&mut store).unwrap(), 2);
    assert!(store.path(AreaKind::Region, "market").is_file());

    let mut reloaded = RegionManager::new(ManagerConfig::default());
    let report = reloaded.load(&store, &["world"]);
    assert!(report.failures.is_empty());

    let id = reloaded.get_region("market").unwrap();
    let area = reloaded.region(id).unwrap().area();
    assert!(area.test_permission(bob.id(), Permission::Build));

    reloaded.remove_region("market").unwrap();
    reloaded.save_dirty(&mut store).unwrap();
    assert!(!store.path(AreaKind::Region, "market").exists());
}

#[test]
fn test_broken_file_does_not_block_others() {
    let dir = TempDir::new().unwrap();
    let mut store = FileStore::open(dir.path()).unwrap();

    let mut manager = RegionManager::new(ManagerConfig::default());
    let world = manager.link_host_world("world");
    manager
        .register_new_region("ok", world, RegionBox::new(0, 0, 0, 5, 5, 5).unwrap())
        .unwrap();
    manager.save_all(&mut store).unwrap();
    fs::write(store.path(AreaKind::Region, "bad"), "[1, 2").unwrap();

    let mut reloaded = RegionManager::new(ManagerConfig::default());
    let report = reloaded.load(&store, &[]);
    assert_eq!(report.regions_loaded, 1);
    assert_eq!(report.failures.len(), 1);
    assert_eq!(report.failures[0].name, "bad");
}
