//! Error types for structural edits and persistence.

use thiserror::Error;

use crate::id::RegionId;

/// Validation failure raised by a structural or membership edit.
///
/// Every operation returning this error leaves the manager unchanged.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RegionError {
    /// Another region already uses this name (names compare case-insensitively).
    #[error("name is already in use: {0}")]
    NameInUse(String),

    /// Region names must be non-empty and use only `[A-Za-z0-9_.-]`.
    #[error("invalid region name: {0:?}")]
    InvalidName(String),

    /// The box intersects one or more regions of the same world.
    #[error("box overlaps existing regions: {}", .0.join(", "))]
    Overlap(Vec<String>),

    /// The requested parent is the region itself.
    #[error("region {0} cannot be its own parent")]
    SelfParent(String),

    /// Adding the edge would create a cycle in the region graph.
    #[error("{parent} is already a descendant of {child}")]
    Cycle { child: String, parent: String },

    /// The handle refers to a region that has been removed.
    #[error("region handle is no longer valid: {0:?}")]
    Invalidated(RegionId),

    /// The box touches more chunk columns than one region may index.
    #[error("box spans {chunks} chunks, more than the limit of {limit}")]
    TooLarge { chunks: u64, limit: u64 },

    /// The world id does not belong to this manager.
    #[error("unknown world")]
    UnknownWorld,

    /// The public role cannot be deleted or assigned explicitly.
    #[error("the public role cannot be {0}")]
    PublicRole(&'static str),

    /// A role with this name already exists in the area.
    #[error("role already exists: {0}")]
    RoleExists(String),

    /// No role with this name exists in the area.
    #[error("role not found: {0}")]
    RoleNotFound(String),

    /// The user is already a member of the area.
    #[error("{0} is already a member")]
    MemberExists(String),

    /// The user is not a member of the area.
    #[error("not a member: {0}")]
    MemberNotFound(String),

    /// A manager is already active in this process.
    #[error("a region manager is already active")]
    ManagerActive,
}

/// Result type for structural edits.
pub type RegionResult<T> = Result<T, RegionError>;

/// A persisted document could not be interpreted.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DocumentError {
    /// A required field is absent.
    #[error("missing field: {0}")]
    MissingField(String),

    /// A field holds a value of the wrong type.
    #[error("field {path} is a {found}, expected {expected}")]
    WrongType {
        path: String,
        expected: &'static str,
        found: &'static str,
    },

    /// A field holds a value outside its domain.
    #[error("invalid value for {path}: {reason}")]
    InvalidValue { path: String, reason: String },
}
