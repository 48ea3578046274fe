//! Axis-aligned integer bounding boxes.

use std::fmt;

use crate::chunk::{ChunkPos, to_chunk};

/// An inclusive block-coordinate box with `min <= max` on every axis.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct RegionBox {
    min_x: i32,
    min_y: i32,
    min_z: i32,
    max_x: i32,
    max_y: i32,
    max_z: i32,
}

impl RegionBox {
    /// Create a box from its bounds. Returns `None` if any `min > max`.
    #[must_use]
    pub const fn new(
        min_x: i32,
        min_y: i32,
        min_z: i32,
        max_x: i32,
        max_y: i32,
        max_z: i32,
    ) -> Option<Self> {
        if min_x > max_x || min_y > max_y || min_z > max_z {
            return None;
        }
        Some(Self {
            min_x,
            min_y,
            min_z,
            max_x,
            max_y,
            max_z,
        })
    }

    /// Create the smallest box spanning two corners given in any order.
    #[must_use]
    pub fn from_corners(a: (i32, i32, i32), b: (i32, i32, i32)) -> Self {
        Self {
            min_x: a.0.min(b.0),
            min_y: a.1.min(b.1),
            min_z: a.2.min(b.2),
            max_x: a.0.max(b.0),
            max_y: a.1.max(b.1),
            max_z: a.2.max(b.2),
        }
    }

    #[must_use]
    pub const fn min(&self) -> (i32, i32, i32) {
        (self.min_x, self.min_y, self.min_z)
    }

    #[must_use]
    pub const fn max(&self) -> (i32, i32, i32) {
        (self.max_x, self.max_y, self.max_z)
    }

    #[must_use]
    pub const fn contains(&self, x: i32, y: i32, z: i32) -> bool {
        x >= self.min_x
            && x <= self.max_x
            && y >= self.min_y
            && y <= self.max_y
            && z >= self.min_z
            && z <= self.max_z
    }

    /// True iff the ranges intersect on all three axes.
    #[must_use]
    pub const fn overlaps(&self, other: &Self) -> bool {
        self.min_x <= other.max_x
            && self.max_x >= other.min_x
            && self.min_y <= other.max_y
            && self.max_y >= other.min_y
            && self.min_z <= other.max_z
            && self.max_z >= other.min_z
    }

    /// Number of blocks inside the box.
    #[must_use]
    pub fn volume(&self) -> u128 {
        let dx = (i64::from(self.max_x) - i64::from(self.min_x) + 1) as u128;
        let dy = (i64::from(self.max_y) - i64::from(self.min_y) + 1) as u128;
        let dz = (i64::from(self.max_z) - i64::from(self.min_z) + 1) as u128;
        dx * dy * dz
    }

    /// Inclusive chunk range covered by the x/z extent.
    #[must_use]
    pub const fn chunk_min(&self) -> ChunkPos {
        ChunkPos::new(to_chunk(self.min_x), to_chunk(self.min_z))
    }

    #[must_use]
    pub const fn chunk_max(&self) -> ChunkPos {
        ChunkPos::new(to_chunk(self.max_x), to_chunk(self.max_z))
    }

    /// Number of chunk columns the box touches.
    #[must_use]
    pub fn chunk_count(&self) -> u64 {
        let (min, max) = (self.chunk_min(), self.chunk_max());
        let dx = (i64::from(max.x) - i64::from(min.x)).unsigned_abs() + 1;
        let dz = (i64::from(max.z) - i64::from(min.z)).unsigned_abs() + 1;
        dx * dz
    }

    /// Every chunk column the box touches.
    pub fn chunks(&self) -> impl Iterator<Item = ChunkPos> + use<> {
        let min = self.chunk_min();
        let max = self.chunk_max();
        (min.x..=max.x).flat_map(move |x| (min.z..=max.z).map(move |z| ChunkPos::new(x, z)))
    }
}

impl fmt::Debug for RegionBox {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "RegionBox({}, {}, {} -> {}, {}, {})",
            self.min_x, self.min_y, self.min_z, self.max_x, self.max_y, self.max_z
        )
    }
}

impl fmt::Display for RegionBox {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "({}, {}, {}) - ({}, {}, {})",
            self.min_x, self.min_y, self.min_z, self.max_x, self.max_y, self.max_z
        )
    }
}
