//! Chunk-bucketed spatial index.
//!
//! Each world keeps a map from 16x16 chunk columns to the regions whose box
//! touches that column. Point lookups resolve the column with a shift and
//! then test only the few candidates in that bucket.
//!
//! # Key Format
//!
//! ```text
//! ┌────────────────────────────────────────────┐
//! │  chunk key (u64)                           │
//! ├────────────────────────────────────────────┤
//! │  x: i32 as u32  (high 32 bits)             │
//! │  z: i32 as u32  (low 32 bits)              │
//! └────────────────────────────────────────────┘
//! ```

use hashbrown::{HashMap, HashSet};
use rustc_hash::FxBuildHasher;
use smallvec::SmallVec;

use crate::id::RegionId;
use crate::region_box::RegionBox;

/// Bits shifted off a block coordinate to get its chunk coordinate.
pub const CHUNK_SHIFT: u32 = 4;

/// Convert a block coordinate to a chunk coordinate (floors negatives).
#[inline]
#[must_use]
pub const fn to_chunk(block: i32) -> i32 {
    block >> CHUNK_SHIFT
}

/// A chunk column coordinate.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ChunkPos {
    pub x: i32,
    pub z: i32,
}

impl ChunkPos {
    #[must_use]
    pub const fn new(x: i32, z: i32) -> Self {
        Self { x, z }
    }

    /// The chunk containing a block coordinate.
    #[must_use]
    pub const fn from_block(x: i32, z: i32) -> Self {
        Self::new(to_chunk(x), to_chunk(z))
    }

    #[must_use]
    pub const fn to_bits(self) -> u64 {
        ((self.x as u32 as u64) << 32) | (self.z as u32 as u64)
    }

    #[must_use]
    pub const fn from_bits(bits: u64) -> Self {
        Self {
            x: (bits >> 32) as u32 as i32,
            z: bits as u32 as i32,
        }
    }
}

/// A region registered in a chunk, with its box cached for point tests.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ChunkEntry {
    pub id: RegionId,
    pub bounds: RegionBox,
}

impl ChunkEntry {
    /// Lookup order: smallest volume first, then lowest handle.
    fn order_key(&self) -> (u128, RegionId) {
        (self.bounds.volume(), self.id)
    }
}

/// One bucket of the index.
#[derive(Debug)]
pub struct RegionChunk {
    pos: ChunkPos,
    /// Sorted by [`ChunkEntry::order_key`].
    entries: SmallVec<[ChunkEntry; 4]>,
}

impl RegionChunk {
    fn new(pos: ChunkPos) -> Self {
        Self {
            pos,
            entries: SmallVec::new(),
        }
    }

    #[must_use]
    pub const fn pos(&self) -> ChunkPos {
        self.pos
    }

    /// Regions in this chunk in lookup order.
    pub fn entries(&self) -> &[ChunkEntry] {
        &self.entries
    }

    fn insert(&mut self, entry: ChunkEntry) {
        if self.entries.iter().any(|e| e.id == entry.id) {
            return;
        }
        let key = entry.order_key();
        let at = self.entries.partition_point(|e| e.order_key() < key);
        self.entries.insert(at, entry);
    }

    fn remove(&mut self, id: RegionId) -> bool {
        let before = self.entries.len();
        self.entries.retain(|e| e.id != id);
        before != self.entries.len()
    }

    /// The innermost region containing the point. The point must lie in
    /// this chunk's column for the answer to be meaningful.
    #[must_use]
    pub fn region_at(&self, x: i32, y: i32, z: i32) -> Option<RegionId> {
        self.entries
            .iter()
            .find(|e| e.bounds.contains(x, y, z))
            .map(|e| e.id)
    }
}

/// Per-world map from chunk column to the regions touching it.
#[derive(Debug, Default)]
pub struct ChunkIndex {
    chunks: HashMap<u64, RegionChunk, FxBuildHasher>,
}

impl ChunkIndex {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn chunk_at(&self, chunk_x: i32, chunk_z: i32) -> Option<&RegionChunk> {
        self.chunks.get(&ChunkPos::new(chunk_x, chunk_z).to_bits())
    }

    /// Register a region in every chunk its box covers, creating buckets lazily.
    pub fn add_region(&mut self, id: RegionId, bounds: RegionBox) {
        let entry = ChunkEntry { id, bounds };
        for pos in bounds.chunks() {
            self.chunks
                .entry(pos.to_bits())
                .or_insert_with(|| RegionChunk::new(pos))
                .insert(entry);
        }
    }

    /// Remove a region from every chunk of `bounds`. Empty buckets are dropped.
    pub fn remove_region(&mut self, id: RegionId, bounds: RegionBox) {
        for pos in bounds.chunks() {
            let key = pos.to_bits();
            if let Some(chunk) = self.chunks.get_mut(&key) {
                chunk.remove(id);
                if chunk.entries.is_empty() {
                    self.chunks.remove(&key);
                }
            }
        }
    }

    /// The region containing a block, preferring the smallest box.
    #[must_use]
    pub fn region_at(&self, x: i32, y: i32, z: i32) -> Option<RegionId> {
        let pos = ChunkPos::from_block(x, z);
        self.chunk_at(pos.x, pos.z)?.region_at(x, y, z)
    }

    /// Distinct regions whose box overlaps `bounds`, skipping `except`.
    #[must_use]
    pub fn overlapping(&self, bounds: &RegionBox, except: Option<RegionId>) -> Vec<RegionId> {
        let mut seen: HashSet<RegionId, FxBuildHasher> = HashSet::default();
        let mut overlaps = Vec::new();

        for pos in bounds.chunks() {
            let Some(chunk) = self.chunk_at(pos.x, pos.z) else {
                continue;
            };
            for entry in &chunk.entries {
                if Some(entry.id) == except || !seen.insert(entry.id) {
                    continue;
                }
                if entry.bounds.overlaps(bounds) {
                    overlaps.push(entry.id);
                }
            }
        }

        overlaps
    }

    /// Number of non-empty buckets.
    #[must_use]
    pub fn len(&self) -> usize {
        self.chunks.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bounds(min: (i32, i32, i32), max: (i32, i32, i32)) -> RegionBox {
        RegionBox::new(min.0, min.1, min.2, max.0, max.1, max.2).unwrap()
    }

    #[test]
    fn test_chunk_key_roundtrip() {
        for pos in [
            ChunkPos::new(0, 0),
            ChunkPos::new(-1, 1),
            ChunkPos::new(i32::MIN, i32::MAX),
        ] {
            assert_eq!(ChunkPos::from_bits(pos.to_bits()), pos);
        }
        assert_ne!(ChunkPos::new(1, 0).to_bits(), ChunkPos::new(0, 1).to_bits());
    }

    #[test]
    fn test_from_block_floors_negative() {
        assert_eq!(ChunkPos::from_block(-1, 15), ChunkPos::new(-1, 0));
        assert_eq!(ChunkPos::from_block(-16, 16), ChunkPos::new(-1, 1));
        assert_eq!(ChunkPos::from_block(-17, 0), ChunkPos::new(-2, 0));
    }

    #[test]
    fn test_add_places_region_in_every_covered_chunk() {
        let mut index = ChunkIndex::new();
        let id = RegionId::new(0, 0);

        index.add_region(id, bounds((0, 0, 0), (31, 10, 47)));
        assert_eq!(index.len(), 2 * 3);
        for cx in 0..2 {
            for cz in 0..3 {
                let chunk = index.chunk_at(cx, cz).unwrap();
                assert_eq!(chunk.entries().len(), 1);
                assert_eq!(chunk.pos(), ChunkPos::new(cx, cz));
            }
        }
        assert!(index.chunk_at(2, 0).is_none());
    }

    #[test]
    fn test_region_at_checks_height() {
        let mut index = ChunkIndex::new();
        let id = RegionId::new(0, 0);
        index.add_region(id, bounds((0, 0, 0), (9, 9, 9)));

        assert_eq!(index.region_at(5, 5, 5), Some(id));
        assert_eq!(index.region_at(5, 10, 5), None);
        assert_eq!(index.region_at(12, 5, 5), None);
        assert_eq!(index.region_at(100, 5, 5), None);
    }

    #[test]
    fn test_region_at_prefers_smallest_volume() {
        let mut index = ChunkIndex::new();
        let outer = RegionId::new(0, 0);
        let inner = RegionId::new(1, 0);

        // Registration order must not matter: inner is registered last.
        index.add_region(outer, bounds((0, 0, 0), (63, 63, 63)));
        index.add_region(inner, bounds((10, 10, 10), (12, 12, 12)));

        assert_eq!(index.region_at(11, 11, 11), Some(inner));
        assert_eq!(index.region_at(20, 11, 11), Some(outer));

        // Same geometry, reversed registration.
        let mut index = ChunkIndex::new();
        index.add_region(inner, bounds((10, 10, 10), (12, 12, 12)));
        index.add_region(outer, bounds((0, 0, 0), (63, 63, 63)));
        assert_eq!(index.region_at(11, 11, 11), Some(inner));
    }

    #[test]
    fn test_equal_volume_ties_break_by_handle() {
        let mut index = ChunkIndex::new();
        let first = RegionId::new(0, 0);
        let second = RegionId::new(1, 0);

        index.add_region(second, bounds((0, 0, 0), (4, 4, 4)));
        index.add_region(first, bounds((2, 2, 2), (6, 6, 6)));
        assert_eq!(index.region_at(3, 3, 3), Some(first));
    }

    #[test]
    fn test_remove_clears_every_bucket() {
        let mut index = ChunkIndex::new();
        let id = RegionId::new(0, 0);
        let b = bounds((-20, 0, -20), (40, 5, 40));

        index.add_region(id, b);
        assert!(!index.is_empty());
        index.remove_region(id, b);

        assert!(index.is_empty());
        assert!(index.overlapping(&b, None).is_empty());
        assert_eq!(index.region_at(0, 0, 0), None);
    }

    #[test]
    fn test_overlapping_is_distinct_and_honours_except() {
        let mut index = ChunkIndex::new();
        let wide = RegionId::new(0, 0);
        let small = RegionId::new(1, 0);
        index.add_region(wide, bounds((0, 0, 0), (100, 10, 100)));
        index.add_region(small, bounds((200, 0, 200), (210, 10, 210)));

        let query = bounds((50, 5, 50), (205, 5, 205));
        let mut hits = index.overlapping(&query, None);
        hits.sort();
        assert_eq!(hits, vec![wide, small]);

        assert_eq!(index.overlapping(&query, Some(wide)), vec![small]);

        // Shares chunks with `wide` but not its height range.
        let above = bounds((0, 11, 0), (5, 20, 5));
        assert!(index.overlapping(&above, None).is_empty());
    }
}
