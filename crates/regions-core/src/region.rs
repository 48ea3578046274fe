//! Regions and the parent/child graph between them.
//!
//! Regions live in a [`RegionArena`] addressed by generational [`RegionId`]s.
//! Graph edges are stored as id sets on both endpoints, so edits never copy
//! region data and a removed region cannot be reached through a stale edge.
//!
//! ```text
//!        parent A          parent B
//!            \               /
//!             \             /
//!              ▼           ▼
//!               child region
//! ```
//!
//! The graph is kept acyclic: an edge is only accepted after checking that
//! the new parent is not already reachable from the child.

use std::collections::{BTreeSet, VecDeque};

use hashbrown::HashSet;
use rustc_hash::FxBuildHasher;

use crate::area::{Area, AreaKind, PendingMember};
use crate::document::Document;
use crate::error::{DocumentError, RegionError, RegionResult};
use crate::id::{RegionId, WorldId};
use crate::region_box::RegionBox;

/// A box-bounded area inside a world.
#[derive(Debug)]
pub struct Region {
    id: RegionId,
    area: Area,
    world: WorldId,
    bounds: RegionBox,
    parents: BTreeSet<RegionId>,
    children: BTreeSet<RegionId>,
}

impl Region {
    #[must_use]
    pub const fn id(&self) -> RegionId {
        self.id
    }

    #[must_use]
    pub fn name(&self) -> &str {
        self.area.name()
    }

    #[must_use]
    pub const fn area(&self) -> &Area {
        &self.area
    }

    pub const fn area_mut(&mut self) -> &mut Area {
        &mut self.area
    }

    /// The world containing this region's box.
    #[must_use]
    pub const fn world(&self) -> WorldId {
        self.world
    }

    #[must_use]
    pub const fn bounds(&self) -> RegionBox {
        self.bounds
    }

    /// Direct parents.
    pub fn parents(&self) -> impl Iterator<Item = RegionId> + '_ {
        self.parents.iter().copied()
    }

    /// Direct children.
    pub fn children(&self) -> impl Iterator<Item = RegionId> + '_ {
        self.children.iter().copied()
    }

    pub(crate) const fn set_placement(&mut self, world: WorldId, bounds: RegionBox) {
        self.world = world;
        self.bounds = bounds;
        self.area.mark_dirty();
    }
}

/// A region document parsed but not yet placed or linked.
#[derive(Debug)]
pub struct LoadedRegion {
    pub area: Area,
    pub members: Vec<PendingMember>,
    pub world: String,
    pub bounds: RegionBox,
    pub parents: Vec<String>,
    pub children: Vec<String>,
}

impl LoadedRegion {
    /// Parse a region document.
    pub fn parse(doc: &Document) -> Result<Self, DocumentError> {
        let (area, members) = Area::load(doc, AreaKind::Region)?;
        let bounds = doc.require_section("box")?;
        let min = load_point(bounds.require_section("min")?)?;
        let max = load_point(bounds.require_section("max")?)?;
        let bounds = RegionBox::new(min.0, min.1, min.2, max.0, max.1, max.2).ok_or_else(|| {
            DocumentError::InvalidValue {
                path: "box".into(),
                reason: format!("min {min:?} exceeds max {max:?}"),
            }
        })?;

        Ok(Self {
            area,
            members,
            world: doc.require_str("world")?.to_owned(),
            bounds,
            parents: doc.string_list("parents")?,
            children: doc.string_list("children")?,
        })
    }
}

fn load_point(section: &Document) -> Result<(i32, i32, i32), DocumentError> {
    Ok((
        section.require_i32("x")?,
        section.require_i32("y")?,
        section.require_i32("z")?,
    ))
}

fn save_point(section: &mut Document, (x, y, z): (i32, i32, i32)) {
    section.set("x", x);
    section.set("y", y);
    section.set("z", z);
}

/// One arena slot. `generation` counts how often the slot was emptied.
#[derive(Default)]
struct Slot {
    generation: u32,
    region: Option<Region>,
}

/// Storage for every live region, plus the graph operations over them.
#[derive(Default)]
pub struct RegionArena {
    slots: Vec<Slot>,
    /// Empty slots, reused before the arena grows.
    free: Vec<u32>,
    len: usize,
}

impl RegionArena {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn insert(&mut self, area: Area, world: WorldId, bounds: RegionBox) -> RegionId {
        let slot = self.free.pop().unwrap_or_else(|| {
            self.slots.push(Slot::default());
            (self.slots.len() - 1) as u32
        });
        let entry = &mut self.slots[slot as usize];
        let id = RegionId::new(slot, entry.generation);
        entry.region = Some(Region {
            id,
            area,
            world,
            bounds,
            parents: BTreeSet::new(),
            children: BTreeSet::new(),
        });
        self.len += 1;
        id
    }

    /// Take a region out of the arena, detaching it from its neighbours.
    ///
    /// Neighbours whose edge sets change are marked dirty. The handle is
    /// invalid afterwards.
    pub(crate) fn remove(&mut self, id: RegionId) -> RegionResult<Region> {
        self.get(id)?;
        let entry = &mut self.slots[id.slot()];
        let mut region = entry.region.take().ok_or(RegionError::Invalidated(id))?;
        entry.generation = entry.generation.wrapping_add(1);
        self.free.push(id.slot() as u32);
        self.len -= 1;

        for parent in std::mem::take(&mut region.parents) {
            if let Some(p) = self.slot_mut(parent) {
                p.children.remove(&id);
                p.area.mark_dirty();
            }
        }
        for child in std::mem::take(&mut region.children) {
            if let Some(c) = self.slot_mut(child) {
                c.parents.remove(&id);
                c.area.mark_dirty();
            }
        }

        Ok(region)
    }

    /// A live region, or [`RegionError::Invalidated`] for a stale handle.
    pub fn get(&self, id: RegionId) -> RegionResult<&Region> {
        self.slot(id).ok_or(RegionError::Invalidated(id))
    }

    pub fn get_mut(&mut self, id: RegionId) -> RegionResult<&mut Region> {
        self.slot_mut(id).ok_or(RegionError::Invalidated(id))
    }

    fn slot(&self, id: RegionId) -> Option<&Region> {
        self.slots
            .get(id.slot())
            .filter(|entry| entry.generation == id.generation())?
            .region
            .as_ref()
    }

    fn slot_mut(&mut self, id: RegionId) -> Option<&mut Region> {
        let entry = self.slots.get_mut(id.slot())?;
        if entry.generation != id.generation() {
            return None;
        }
        entry.region.as_mut()
    }

    #[must_use]
    pub fn contains(&self, id: RegionId) -> bool {
        self.slot(id).is_some()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Region> {
        self.slots.iter().filter_map(|entry| entry.region.as_ref())
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut Region> {
        self.slots.iter_mut().filter_map(|entry| entry.region.as_mut())
    }

    #[must_use]
    pub const fn len(&self) -> usize {
        self.len
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    // ==================== Graph ====================

    /// Make `parent` a parent of `child`.
    ///
    /// Returns `Ok(false)` if the edge already exists. Fails without change if
    /// the regions are the same or if `child` is already an ancestor of
    /// `parent`.
    pub fn add_parent(&mut self, child: RegionId, parent: RegionId) -> RegionResult<bool> {
        let child_region = self.get(child)?;
        let parent_region = self.get(parent)?;

        if child == parent {
            return Err(RegionError::SelfParent(child_region.name().to_owned()));
        }
        if child_region.parents.contains(&parent) {
            return Ok(false);
        }
        if self.is_ancestor(child, parent) {
            return Err(RegionError::Cycle {
                child: child_region.name().to_owned(),
                parent: parent_region.name().to_owned(),
            });
        }

        let c = self.get_mut(child)?;
        c.parents.insert(parent);
        c.area.mark_dirty();
        let p = self.get_mut(parent)?;
        p.children.insert(child);
        p.area.mark_dirty();

        tracing::debug!("linked {child:?} under {parent:?}");
        Ok(true)
    }

    /// Remove the edge if present. Returns whether anything changed.
    pub fn remove_parent(&mut self, child: RegionId, parent: RegionId) -> RegionResult<bool> {
        self.get(parent)?;
        let c = self.get_mut(child)?;
        if !c.parents.remove(&parent) {
            return Ok(false);
        }
        c.area.mark_dirty();

        let p = self.get_mut(parent)?;
        p.children.remove(&child);
        p.area.mark_dirty();
        Ok(true)
    }

    /// True if `ancestor` is reachable from `of` by following parent edges,
    /// or is `of` itself.
    #[must_use]
    pub fn is_ancestor(&self, ancestor: RegionId, of: RegionId) -> bool {
        ancestor == of || self.walk(of, |r| &r.parents).contains(&ancestor)
    }

    /// Immediate parents only.
    pub fn direct_ancestors(&self, id: RegionId) -> RegionResult<Vec<RegionId>> {
        Ok(self.get(id)?.parents().collect())
    }

    /// Every region reachable through parent edges, nearest first.
    pub fn all_ancestors(&self, id: RegionId) -> RegionResult<Vec<RegionId>> {
        self.get(id)?;
        Ok(self.walk(id, |r| &r.parents))
    }

    /// Every region reachable through child edges, nearest first.
    pub fn all_descendants(&self, id: RegionId) -> RegionResult<Vec<RegionId>> {
        self.get(id)?;
        Ok(self.walk(id, |r| &r.children))
    }

    /// Breadth-first walk from `start` (excluded) along one edge direction.
    /// Each region is visited at most once.
    fn walk(&self, start: RegionId, edges: impl Fn(&Region) -> &BTreeSet<RegionId>) -> Vec<RegionId> {
        let mut visited: HashSet<RegionId, FxBuildHasher> = HashSet::default();
        let mut queue = VecDeque::from([start]);
        let mut out = Vec::new();
        visited.insert(start);

        while let Some(id) = queue.pop_front() {
            let Some(region) = self.slot(id) else {
                continue;
            };
            for &next in edges(region) {
                if visited.insert(next) {
                    out.push(next);
                    queue.push_back(next);
                }
            }
        }

        out
    }

    // ==================== Persistence ====================

    /// Write a region, including its placement and edges, into `doc`.
    ///
    /// Edges are written as names, so `region` must belong to this arena.
    pub fn save(&self, region: &Region, world_name: &str, doc: &mut Document) {
        region.area.save(doc);
        doc.set("world", world_name);

        let bounds = doc.create_section("box");
        save_point(bounds.create_section("min"), region.bounds.min());
        save_point(bounds.create_section("max"), region.bounds.max());

        doc.set("parents", self.names(&region.parents));
        doc.set("children", self.names(&region.children));
    }

    fn names(&self, ids: &BTreeSet<RegionId>) -> Vec<String> {
        ids.iter()
            .filter_map(|&id| self.slot(id))
            .map(|r| r.name().to_owned())
            .collect()
    }
}
