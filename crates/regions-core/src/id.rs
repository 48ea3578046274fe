//! Region and world identifiers.

use std::fmt;

/// Handle to a region owned by the manager.
///
/// Names an arena slot plus the number of times that slot had been emptied
/// when the handle was issued. Once the region is removed the slot's count
/// moves on, so the handle stops resolving even after the slot is reused.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RegionId {
    slot: u32,
    generation: u32,
}

impl RegionId {
    pub(crate) const fn new(slot: u32, generation: u32) -> Self {
        Self { slot, generation }
    }

    pub(crate) const fn slot(self) -> usize {
        self.slot as usize
    }

    pub(crate) const fn generation(self) -> u32 {
        self.generation
    }
}

impl fmt::Debug for RegionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Region#{}.{}", self.slot, self.generation)
    }
}

/// Handle to a world. Worlds are never removed.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct WorldId(pub(crate) u32);

/// Either kind of area.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum AreaId {
    World(WorldId),
    Region(RegionId),
}
