//! The region manager: owner of every world, region and user.
//!
//! All structural edits go through [`RegionManager`]. Edits validate first
//! and mutate second, so a failed edit leaves every index untouched.
//!
//! # Load Order
//!
//! ```text
//! world documents ──► world members ──► host worlds
//!                                           │
//!        ┌──────────────────────────────────┘
//!        ▼
//! region documents ──► region members ──► parent/child edges
//! ```
//!
//! Regions are placed only after every world exists, and edges are linked
//! only after every region exists, since documents may name parents that
//! appear later in listing order.

use std::collections::BTreeMap;
use std::fmt;

use hashbrown::HashMap;
use rustc_hash::FxBuildHasher;
use uuid::Uuid;

use crate::activation::ActivationGuard;
use crate::area::{Area, AreaKind, PendingMember};
use crate::document::{Document, DocumentStore};
use crate::error::{RegionError, RegionResult};
use crate::id::{AreaId, RegionId, WorldId};
use crate::permission::Permission;
use crate::region::{LoadedRegion, Region, RegionArena};
use crate::region_box::RegionBox;
use crate::user::UserRegistry;
use crate::world::RegionWorld;

// ==================== Configuration ====================

/// How permissions combine when regions nest.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ResolutionPolicy {
    /// Only the innermost area at the point is consulted.
    #[default]
    InnermostOnly,
    /// The innermost region, each of its ancestors and its world must all grant.
    DenyOverrides,
}

impl ResolutionPolicy {
    #[must_use]
    pub const fn key(self) -> &'static str {
        match self {
            Self::InnermostOnly => "innermost",
            Self::DenyOverrides => "deny-overrides",
        }
    }

    #[must_use]
    pub fn from_key(key: &str) -> Option<Self> {
        match key.to_ascii_lowercase().as_str() {
            "innermost" => Some(Self::InnermostOnly),
            "deny-overrides" => Some(Self::DenyOverrides),
            _ => None,
        }
    }
}

impl fmt::Display for ResolutionPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

/// Manager settings.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ManagerConfig {
    pub resolution: ResolutionPolicy,
}

// ==================== Loading ====================

/// One document that could not be loaded.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LoadFailure {
    pub kind: AreaKind,
    pub name: String,
    pub reason: String,
}

/// Outcome of [`RegionManager::load`].
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct LoadReport {
    pub worlds_loaded: usize,
    pub regions_loaded: usize,
    pub failures: Vec<LoadFailure>,
}

impl LoadReport {
    fn fail(&mut self, kind: AreaKind, name: &str, reason: impl fmt::Display) {
        tracing::warn!("Failed to load {kind} [{name}]: {reason}");
        self.failures.push(LoadFailure {
            kind,
            name: name.to_owned(),
            reason: reason.to_string(),
        });
    }
}

/// One page of the region listing.
#[derive(Debug)]
pub struct RegionPage<'a> {
    pub regions: Vec<&'a Region>,
    /// 1-based, clamped to `1..=pages`.
    pub page: usize,
    pub pages: usize,
    pub total: usize,
}

/// Most chunk columns one region may cover: 4096x4096 blocks.
pub const MAX_REGION_CHUNKS: u64 = 1 << 16;

/// Validate a region name: non-empty, `[A-Za-z0-9_.-]` only.
pub fn validate_region_name(name: &str) -> RegionResult<()> {
    let valid = !name.is_empty()
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | '-'));
    if valid {
        Ok(())
    } else {
        Err(RegionError::InvalidName(name.to_owned()))
    }
}

/// Owner of every world, region and user.
pub struct RegionManager {
    config: ManagerConfig,
    worlds: Vec<RegionWorld>,
    /// Lowercased name to world.
    world_names: HashMap<String, WorldId, FxBuildHasher>,
    regions: RegionArena,
    /// Lowercased name to region; ordered for listing.
    region_names: BTreeMap<String, RegionId>,
    users: UserRegistry,
    /// Names of removed regions whose documents are deleted on the next save.
    removed: Vec<String>,
    /// Set on the manager a host runs; released when the manager drops.
    activation: Option<ActivationGuard>,
}

impl RegionManager {
    #[must_use]
    pub fn new(config: ManagerConfig) -> Self {
        Self {
            config,
            worlds: Vec::new(),
            world_names: HashMap::default(),
            regions: RegionArena::new(),
            region_names: BTreeMap::new(),
            users: UserRegistry::new(),
            removed: Vec::new(),
            activation: None,
        }
    }

    /// A manager that holds the process-wide activation slot for its lifetime.
    ///
    /// Fails with [`RegionError::ManagerActive`] while another activated
    /// manager is alive.
    pub fn activate(config: ManagerConfig) -> RegionResult<Self> {
        let guard = ActivationGuard::acquire()?;
        tracing::debug!("region manager activated");
        Ok(Self {
            activation: Some(guard),
            ..Self::new(config)
        })
    }

    #[must_use]
    pub const fn is_activated(&self) -> bool {
        self.activation.is_some()
    }

    #[must_use]
    pub const fn config(&self) -> &ManagerConfig {
        &self.config
    }

    #[must_use]
    pub const fn users(&self) -> &UserRegistry {
        &self.users
    }

    pub const fn users_mut(&mut self) -> &mut UserRegistry {
        &mut self.users
    }

    // ==================== Worlds ====================

    /// The world with this name, creating it if unknown.
    pub fn get_or_register_world(&mut self, name: &str) -> WorldId {
        if let Some(&id) = self.world_names.get(&name.to_ascii_lowercase()) {
            return id;
        }
        self.insert_world(Area::new(name, AreaKind::World))
    }

    /// Attach a world the host has loaded, creating its area if needed.
    pub fn link_host_world(&mut self, name: &str) -> WorldId {
        let id = self.get_or_register_world(name);
        self.worlds[id.0 as usize].set_linked(true);
        tracing::debug!("linked host world {name}");
        id
    }

    fn insert_world(&mut self, area: Area) -> WorldId {
        let id = WorldId(self.worlds.len() as u32);
        self.world_names.insert(area.name().to_ascii_lowercase(), id);
        self.worlds.push(RegionWorld::new(id, area));
        id
    }

    /// Case-insensitive world lookup.
    #[must_use]
    pub fn get_region_world(&self, name: &str) -> Option<WorldId> {
        self.world_names.get(&name.to_ascii_lowercase()).copied()
    }

    #[must_use]
    pub fn world(&self, id: WorldId) -> Option<&RegionWorld> {
        self.worlds.get(id.0 as usize)
    }

    pub fn world_mut(&mut self, id: WorldId) -> Option<&mut RegionWorld> {
        self.worlds.get_mut(id.0 as usize)
    }

    pub fn worlds(&self) -> impl Iterator<Item = &RegionWorld> {
        self.worlds.iter()
    }

    // ==================== Regions ====================

    /// Case-insensitive region lookup.
    #[must_use]
    pub fn get_region(&self, name: &str) -> Option<RegionId> {
        self.region_names.get(&name.to_ascii_lowercase()).copied()
    }

    pub fn region(&self, id: RegionId) -> RegionResult<&Region> {
        self.regions.get(id)
    }

    pub fn region_mut(&mut self, id: RegionId) -> RegionResult<&mut Region> {
        self.regions.get_mut(id)
    }

    /// Every region, ordered by name.
    pub fn regions(&self) -> impl Iterator<Item = &Region> {
        self.region_names
            .values()
            .filter_map(|&id| self.regions.get(id).ok())
    }

    #[must_use]
    pub fn region_count(&self) -> usize {
        self.regions.len()
    }

    /// One page of the name-ordered region listing.
    #[must_use]
    pub fn list_regions(&self, page: usize, per_page: usize) -> RegionPage<'_> {
        let per_page = per_page.max(1);
        let total = self.region_names.len();
        let pages = total.div_ceil(per_page).max(1);
        let page = page.clamp(1, pages);

        RegionPage {
            regions: self.regions().skip((page - 1) * per_page).take(per_page).collect(),
            page,
            pages,
            total,
        }
    }

    /// Create a region and place it in `world`.
    ///
    /// Fails if the name is taken (ignoring case) or the box overlaps a
    /// region of the same world.
    pub fn register_new_region(
        &mut self,
        name: &str,
        world: WorldId,
        bounds: RegionBox,
    ) -> RegionResult<RegionId> {
        validate_region_name(name)?;
        self.insert_region(Area::new(name, AreaKind::Region), world, bounds)
    }

    fn insert_region(
        &mut self,
        area: Area,
        world: WorldId,
        bounds: RegionBox,
    ) -> RegionResult<RegionId> {
        let key = area.name().to_ascii_lowercase();
        if self.region_names.contains_key(&key) {
            return Err(RegionError::NameInUse(area.name().to_owned()));
        }
        self.check_placement(world, &bounds, None)?;

        let name = area.name().to_owned();
        let id = self.regions.insert(area, world, bounds);
        self.worlds[world.0 as usize].place(id, bounds);
        self.region_names.insert(key, id);

        tracing::info!("registered region {name} {bounds} in {}", self.worlds[world.0 as usize].name());
        Ok(id)
    }

    fn check_placement(
        &self,
        world: WorldId,
        bounds: &RegionBox,
        except: Option<RegionId>,
    ) -> RegionResult<()> {
        let target = self.world(world).ok_or(RegionError::UnknownWorld)?;
        let chunks = bounds.chunk_count();
        if chunks > MAX_REGION_CHUNKS {
            return Err(RegionError::TooLarge {
                chunks,
                limit: MAX_REGION_CHUNKS,
            });
        }

        let overlaps = target.overlapping(bounds, except);
        if overlaps.is_empty() {
            return Ok(());
        }

        let mut names: Vec<String> = overlaps
            .into_iter()
            .filter_map(|id| self.regions.get(id).ok())
            .map(|r| r.name().to_owned())
            .collect();
        names.sort();
        Err(RegionError::Overlap(names))
    }

    /// Remove a region by name, returning it. `None` if no such region exists.
    pub fn remove_region(&mut self, name: &str) -> Option<Region> {
        let id = self.get_region(name)?;
        self.remove_region_by_id(id).ok()
    }

    /// Remove a region: unplace it, detach its edges and invalidate its handle.
    pub fn remove_region_by_id(&mut self, id: RegionId) -> RegionResult<Region> {
        let region = self.regions.remove(id)?;
        self.worlds[region.world().0 as usize].unplace(id, region.bounds());
        self.region_names.remove(&region.name().to_ascii_lowercase());
        self.removed.push(region.name().to_owned());

        tracing::info!("removed region {}", region.name());
        Ok(region)
    }

    /// Move a region to a new box, possibly in another world.
    ///
    /// The new box may overlap the region's own old box but no other region.
    pub fn relocate_region(
        &mut self,
        id: RegionId,
        world: WorldId,
        bounds: RegionBox,
    ) -> RegionResult<()> {
        let region = self.regions.get(id)?;
        let (old_world, old_bounds) = (region.world(), region.bounds());
        self.check_placement(world, &bounds, Some(id))?;

        self.worlds[old_world.0 as usize].unplace(id, old_bounds);
        self.regions.get_mut(id)?.set_placement(world, bounds);
        self.worlds[world.0 as usize].place(id, bounds);

        tracing::info!("relocated region {id:?} from {old_bounds} to {bounds}");
        Ok(())
    }

    // ==================== Graph ====================

    /// See [`RegionArena::add_parent`].
    pub fn add_parent(&mut self, child: RegionId, parent: RegionId) -> RegionResult<bool> {
        self.regions.add_parent(child, parent)
    }

    pub fn remove_parent(&mut self, child: RegionId, parent: RegionId) -> RegionResult<bool> {
        self.regions.remove_parent(child, parent)
    }

    pub fn direct_ancestors(&self, id: RegionId) -> RegionResult<Vec<RegionId>> {
        self.regions.direct_ancestors(id)
    }

    pub fn all_ancestors(&self, id: RegionId) -> RegionResult<Vec<RegionId>> {
        self.regions.all_ancestors(id)
    }

    pub fn all_descendants(&self, id: RegionId) -> RegionResult<Vec<RegionId>> {
        self.regions.all_descendants(id)
    }

    // ==================== Queries ====================

    /// The innermost region containing a block.
    #[must_use]
    pub fn region_at(&self, world: WorldId, x: i32, y: i32, z: i32) -> Option<RegionId> {
        self.world(world)?.region_at(x, y, z)
    }

    /// The innermost region containing a block, or the world itself.
    /// `None` only for an unknown world.
    #[must_use]
    pub fn area_at(&self, world: WorldId, x: i32, y: i32, z: i32) -> Option<AreaId> {
        let w = self.world(world)?;
        Some(w.region_at(x, y, z).map_or(AreaId::World(world), AreaId::Region))
    }

    pub fn area(&self, id: AreaId) -> RegionResult<&Area> {
        match id {
            AreaId::World(w) => self.world(w).map(RegionWorld::area).ok_or(RegionError::UnknownWorld),
            AreaId::Region(r) => self.regions.get(r).map(Region::area),
        }
    }

    pub fn area_mut(&mut self, id: AreaId) -> RegionResult<&mut Area> {
        match id {
            AreaId::World(w) => self
                .world_mut(w)
                .map(RegionWorld::area_mut)
                .ok_or(RegionError::UnknownWorld),
            AreaId::Region(r) => self.regions.get_mut(r).map(Region::area_mut),
        }
    }

    /// Resolve an area by kind and name.
    #[must_use]
    pub fn find_area(&self, kind: AreaKind, name: &str) -> Option<AreaId> {
        match kind {
            AreaKind::World => self.get_region_world(name).map(AreaId::World),
            AreaKind::Region => self.get_region(name).map(AreaId::Region),
        }
    }

    /// Whether `user` holds `permission` in `area` under the configured policy.
    #[must_use]
    pub fn permits(&self, area: AreaId, user: Uuid, permission: Permission) -> bool {
        let grants = |id: AreaId| {
            self.area(id)
                .is_ok_and(|a| a.test_permission(user, permission))
        };

        match (self.config.resolution, area) {
            (ResolutionPolicy::InnermostOnly, _) | (ResolutionPolicy::DenyOverrides, AreaId::World(_)) => {
                grants(area)
            }
            (ResolutionPolicy::DenyOverrides, AreaId::Region(id)) => {
                let Ok(region) = self.regions.get(id) else {
                    return false;
                };
                grants(area)
                    && grants(AreaId::World(region.world()))
                    && self
                        .regions
                        .all_ancestors(id)
                        .is_ok_and(|ancestors| {
                            ancestors.into_iter().all(|a| grants(AreaId::Region(a)))
                        })
            }
        }
    }

    /// Permission test at a point. `None` for an unknown world.
    #[must_use]
    pub fn test_permission_at(
        &self,
        world: WorldId,
        (x, y, z): (i32, i32, i32),
        user: Uuid,
        permission: Permission,
    ) -> Option<bool> {
        let area = self.area_at(world, x, y, z)?;
        Some(self.permits(area, user, permission))
    }

    /// The document an area would be saved as.
    pub fn area_document(&self, id: AreaId) -> RegionResult<Document> {
        let mut doc = Document::new();
        match id {
            AreaId::World(w) => {
                self.world(w).ok_or(RegionError::UnknownWorld)?.area().save(&mut doc);
            }
            AreaId::Region(r) => {
                let region = self.regions.get(r)?;
                self.regions.save(region, self.world_name(region.world()), &mut doc);
            }
        }
        Ok(doc)
    }

    fn world_name(&self, id: WorldId) -> &str {
        self.world(id).map_or("", RegionWorld::name)
    }

    /// Display name of an area, `world:<name>` or `region:<name>`.
    #[must_use]
    pub fn area_label(&self, id: AreaId) -> String {
        match self.area(id) {
            Ok(area) => format!("{}:{}", area.kind(), area.name()),
            Err(_) => format!("{id:?}"),
        }
    }

    // ==================== Persistence ====================

    /// Save areas changed since the last save, and delete removed regions.
    /// Returns the number of documents written.
    pub fn save_dirty<S: DocumentStore>(&mut self, store: &mut S) -> Result<usize, S::Error> {
        self.save_with(store, false)
    }

    /// Save every area.
    pub fn save_all<S: DocumentStore>(&mut self, store: &mut S) -> Result<usize, S::Error> {
        self.save_with(store, true)
    }

    fn save_with<S: DocumentStore>(&mut self, store: &mut S, all: bool) -> Result<usize, S::Error> {
        // A name leaves the queue only once its delete went through.
        while let Some(name) = self.removed.last() {
            store.remove(AreaKind::Region, name)?;
            tracing::debug!("deleted region document {name}");
            self.removed.pop();
        }

        let mut written = 0;
        for world in &mut self.worlds {
            if !(all || world.area().is_dirty()) {
                continue;
            }
            let mut doc = Document::new();
            world.area().save(&mut doc);
            store.write(AreaKind::World, world.name(), &doc)?;
            world.area_mut().mark_clean();
            written += 1;
        }

        let pending: Vec<RegionId> = self
            .regions
            .iter()
            .filter(|r| all || r.area().is_dirty())
            .map(Region::id)
            .collect();
        for id in pending {
            let Ok(region) = self.regions.get(id) else {
                continue;
            };
            let mut doc = Document::new();
            self.regions.save(region, self.world_name(region.world()), &mut doc);
            store.write(AreaKind::Region, region.name(), &doc)?;
            if let Ok(region) = self.regions.get_mut(id) {
                region.area_mut().mark_clean();
            }
            written += 1;
        }

        tracing::debug!("saved {written} documents");
        Ok(written)
    }

    /// Load every stored world and region, then attach the host's worlds.
    ///
    /// Each document loads independently: a failure is logged with the
    /// document name and recorded in the report, and loading continues.
    pub fn load<S: DocumentStore>(&mut self, store: &S, host_worlds: &[&str]) -> LoadReport {
        let mut report = LoadReport::default();

        // Worlds
        let mut world_members: Vec<(WorldId, Vec<PendingMember>)> = Vec::new();
        for name in list_documents(store, AreaKind::World, &mut report) {
            let loaded = store
                .read(AreaKind::World, &name)
                .map_err(|e| e.to_string())
                .and_then(|doc| Area::load(&doc, AreaKind::World).map_err(|e| e.to_string()));
            match loaded {
                Ok((area, _)) if self.get_region_world(area.name()).is_some() => {
                    report.fail(AreaKind::World, &name, format_args!("duplicate world {}", area.name()));
                }
                Ok((area, members)) => {
                    let id = self.insert_world(area);
                    world_members.push((id, members));
                    report.worlds_loaded += 1;
                }
                Err(reason) => report.fail(AreaKind::World, &name, reason),
            }
        }
        for (id, members) in world_members {
            self.worlds[id.0 as usize].area_mut().link_members(members, &mut self.users);
        }
        for name in host_worlds {
            self.link_host_world(name);
        }

        // Regions
        let mut pending: Vec<(RegionId, Vec<PendingMember>, Vec<String>, Vec<String>)> = Vec::new();
        for name in list_documents(store, AreaKind::Region, &mut report) {
            let loaded = store
                .read(AreaKind::Region, &name)
                .map_err(|e| e.to_string())
                .and_then(|doc| LoadedRegion::parse(&doc).map_err(|e| e.to_string()));
            let loaded = match loaded {
                Ok(loaded) => loaded,
                Err(reason) => {
                    report.fail(AreaKind::Region, &name, reason);
                    continue;
                }
            };

            let Some(world) = self.get_region_world(&loaded.world) else {
                report.fail(AreaKind::Region, &name, format_args!("unknown world {}", loaded.world));
                continue;
            };
            let placed = validate_region_name(loaded.area.name())
                .and_then(|()| self.insert_region(loaded.area, world, loaded.bounds));
            match placed {
                Ok(id) => {
                    pending.push((id, loaded.members, loaded.parents, loaded.children));
                    report.regions_loaded += 1;
                }
                Err(e) => report.fail(AreaKind::Region, &name, e),
            }
        }

        // Cross-links
        for (id, members, parents, children) in pending {
            if let Ok(region) = self.regions.get_mut(id) {
                region.area_mut().link_members(members, &mut self.users);
            }

            let edges = parents
                .into_iter()
                .map(|p| (p, false))
                .chain(children.into_iter().map(|c| (c, true)));
            for (other, reversed) in edges {
                let Some(other_id) = self.get_region(&other) else {
                    let name = self.regions.get(id).map_or_else(|_| String::new(), |r| r.name().to_owned());
                    report.fail(AreaKind::Region, &name, format_args!("unknown related region {other}"));
                    continue;
                };
                let (child, parent) = if reversed { (other_id, id) } else { (id, other_id) };
                if let Err(e) = self.regions.add_parent(child, parent) {
                    let name = self.regions.get(id).map_or_else(|_| String::new(), |r| r.name().to_owned());
                    report.fail(AreaKind::Region, &name, e);
                }
            }
        }

        for region in self.regions.iter_mut() {
            region.area_mut().mark_clean();
        }
        self.removed.clear();

        tracing::info!(
            "loaded {} worlds and {} regions ({} failures)",
            report.worlds_loaded,
            report.regions_loaded,
            report.failures.len()
        );
        report
    }
}

fn list_documents<S: DocumentStore>(store: &S, kind: AreaKind, report: &mut LoadReport) -> Vec<String> {
    match store.list(kind) {
        Ok(mut names) => {
            names.sort();
            names
        }
        Err(e) => {
            report.fail(kind, "*", e);
            Vec::new()
        }
    }
}
