#![allow(clippy::missing_panics_doc)]
#![allow(clippy::redundant_pub_crate)]

//! Regions - spatial access control for voxel worlds
//!
//! Named, possibly nested regions inside one or more worlds, each carrying
//! its own roles, members and protection flags, and a per-tick loop that
//! stops players from crossing into or out of areas they may not.
//!
//! # Key Concepts
//!
//! - **Area**: a world or region; owns protections, roles, members and a public role
//! - **World**: top-level area and owner of a chunk index; the fallback for any point
//! - **Region**: a box-bounded area in one world, linked to other regions in a DAG
//! - **Chunk index**: 16x16 column buckets answering "which region is at P"
//! - **Role / Member**: named permission bundles, and users assigned to them
//!
//! # Lookup Path
//!
//! ```text
//! (world, x, y, z)
//!       │
//!       ▼
//! chunk (x >> 4, z >> 4) ──► candidates sorted by volume ──► first containing box
//!                                                                │
//!                                              none? ──► world area
//! ```

mod activation;
mod area;
mod chunk;
mod document;
mod enforcement;
mod error;
mod id;
mod manager;
mod permission;
mod region;
mod region_box;
mod user;
mod world;

pub use activation::ActivationGuard;
pub use area::{Area, AreaKind, Member, PUBLIC_ROLE, PendingMember, Role};
pub use chunk::{CHUNK_SHIFT, ChunkEntry, ChunkIndex, ChunkPos, RegionChunk, to_chunk};
pub use document::{Document, DocumentStore, MemoryStore, MissingDocument, Value};
pub use enforcement::{PlayerHandle, TickReport, tick};
pub use error::{DocumentError, RegionError, RegionResult};
pub use id::{AreaId, RegionId, WorldId};
pub use manager::{
    LoadFailure, LoadReport, MAX_REGION_CHUNKS, ManagerConfig, RegionManager, RegionPage, ResolutionPolicy,
    validate_region_name,
};
pub use permission::{Permission, PermissionSet, Protection, ProtectionSet};
pub use region::{LoadedRegion, Region, RegionArena};
pub use region_box::RegionBox;
pub use user::{IdentityResolver, Location, OnlineUser, Profile, User, UserRegistry};
pub use world::RegionWorld;
