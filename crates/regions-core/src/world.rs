//! World areas and their spatial index.

use std::collections::BTreeSet;

use crate::area::{Area, AreaKind};
use crate::chunk::ChunkIndex;
use crate::id::{RegionId, WorldId};
use crate::region_box::RegionBox;

/// The top-level area of one voxel world.
///
/// A world is the fallback area for every point no region claims, and owns
/// the chunk index of the regions placed in it.
#[derive(Debug)]
pub struct RegionWorld {
    id: WorldId,
    area: Area,
    index: ChunkIndex,
    regions: BTreeSet<RegionId>,
    /// Whether the host currently has this world loaded.
    linked: bool,
}

impl RegionWorld {
    pub(crate) fn new(id: WorldId, area: Area) -> Self {
        debug_assert_eq!(area.kind(), AreaKind::World);
        Self {
            id,
            area,
            index: ChunkIndex::new(),
            regions: BTreeSet::new(),
            linked: false,
        }
    }

    #[must_use]
    pub const fn id(&self) -> WorldId {
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

    #[must_use]
    pub const fn index(&self) -> &ChunkIndex {
        &self.index
    }

    /// Regions placed in this world.
    pub fn regions(&self) -> impl Iterator<Item = RegionId> + '_ {
        self.regions.iter().copied()
    }

    #[must_use]
    pub const fn is_linked(&self) -> bool {
        self.linked
    }

    pub(crate) const fn set_linked(&mut self, linked: bool) {
        self.linked = linked;
    }

    /// The innermost region containing a block, if any.
    #[must_use]
    pub fn region_at(&self, x: i32, y: i32, z: i32) -> Option<RegionId> {
        self.index.region_at(x, y, z)
    }

    /// Regions overlapping `bounds`, skipping `except`.
    #[must_use]
    pub fn overlapping(&self, bounds: &RegionBox, except: Option<RegionId>) -> Vec<RegionId> {
        self.index.overlapping(bounds, except)
    }

    pub(crate) fn place(&mut self, id: RegionId, bounds: RegionBox) {
        self.index.add_region(id, bounds);
        self.regions.insert(id);
    }

    pub(crate) fn unplace(&mut self, id: RegionId, bounds: RegionBox) {
        self.index.remove_region(id, bounds);
        self.regions.remove(&id);
    }
}
