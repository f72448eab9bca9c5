//! # Core Type Definitions
//!
//! This module contains the identifiers and error type shared by every
//! component of the engine:
//! - Object identifiers (`ObjectId`) and kinds (`ObjectKind`)
//! - Error types (`SpliceError`)
//!
//! ## Determinism Guarantees
//!
//! All identifier types in this module:
//! - Implement `Ord` for deterministic ordering in `BTreeMap`/`BTreeSet`
//! - Are allocated sequentially by the store, never reused

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

// =============================================================================
// OBJECT IDENTIFIERS
// =============================================================================

/// Identity of an object in the [`ObjectStore`](crate::ObjectStore).
///
/// Two references are "the same object" exactly when their ids are equal.
/// Structurally identical objects with different ids are distinct.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ObjectId(pub u64);

impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Runtime kind of a stored object.
///
/// Reference fields declare which kinds they accept; the clone engine checks
/// every reference it follows against that declaration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum ObjectKind {
    /// A full state graph: parameters plus layers.
    Controller,
    StateMachine,
    State,
    Transition,
    BlendTree,
    Clip,
    AvatarMask,
    Behaviour,
    /// Opaque leaf resource (material, texture, ...) owned by the host.
    Asset,
}

impl ObjectKind {
    /// Kinds whose names take part in name-based correspondence lookups.
    ///
    /// The clone engine never prefixes these names.
    #[must_use]
    pub const fn name_is_structural(self) -> bool {
        matches!(self, Self::StateMachine | Self::State)
    }

    /// Kinds a motion slot may point at.
    pub const MOTIONS: &'static [ObjectKind] = &[ObjectKind::Clip, ObjectKind::BlendTree];
}

impl fmt::Display for ObjectKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

// =============================================================================
// ERROR TYPES
// =============================================================================

/// Errors that can occur in the engine.
///
/// - `ObjectNotFound`, `TypeMismatch` and `UnknownComparator` signal corrupted
///   data or a programming error: the running operation is aborted.
/// - `NotAnAncestor` and `HierarchyNodeNotFound` are caller precondition
///   violations and only abort the unit of work that hit them.
/// - Absent transition targets are never errors; they are reported in the
///   merge report instead.
#[derive(Debug, Error)]
pub enum SpliceError {
    /// A reference points at an id that is not in the store.
    #[error("Object not found: {0}")]
    ObjectNotFound(ObjectId),

    /// A reference resolved to an object of an unexpected kind.
    #[error("Object {id} is a {found}, expected one of {expected:?}")]
    TypeMismatch {
        id: ObjectId,
        expected: Vec<ObjectKind>,
        found: ObjectKind,
    },

    /// A raw comparator code outside the known set.
    #[error("Unknown condition comparator code: {0}")]
    UnknownComparator(i32),

    /// A relative path was requested between objects not related by ancestry.
    #[error("{root:?} is not an ancestor of {object:?}")]
    NotAnAncestor { root: String, object: String },

    /// A hierarchy node id that the hierarchy does not know.
    #[error("Hierarchy node not found: {0}")]
    HierarchyNodeNotFound(usize),

    /// Merging one source layer failed; names the layer that caused it.
    #[error("Merging layer {layer:?} failed: {cause}")]
    LayerMerge {
        layer: String,
        cause: Box<SpliceError>,
    },

    /// A serialization error occurred.
    #[error("Serialization error: {0}")]
    SerializationError(String),

    /// A deserialization error occurred.
    #[error("Deserialization error: {0}")]
    DeserializationError(String),

    /// An I/O error occurred.
    #[error("I/O error: {0}")]
    IoError(String),
}

impl SpliceError {
    /// Build a `TypeMismatch` for a reference slot.
    #[must_use]
    pub fn mismatch(id: ObjectId, expected: &[ObjectKind], found: ObjectKind) -> Self {
        Self::TypeMismatch {
            id,
            expected: expected.to_vec(),
            found,
        }
    }

    /// True for errors that indicate corrupted input rather than a caller mistake.
    #[must_use]
    pub fn is_data_corruption(&self) -> bool {
        match self {
            Self::ObjectNotFound(_) | Self::TypeMismatch { .. } | Self::UnknownComparator(_) => {
                true
            }
            Self::LayerMerge { cause, .. } => cause.is_data_corruption(),
            _ => false,
        }
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn object_ids_order_numerically() {
        let mut ids = vec![ObjectId(3), ObjectId(1), ObjectId(2)];
        ids.sort();
        assert_eq!(ids, vec![ObjectId(1), ObjectId(2), ObjectId(3)]);
    }

    #[test]
    fn structural_names() {
        assert!(ObjectKind::State.name_is_structural());
        assert!(ObjectKind::StateMachine.name_is_structural());
        assert!(!ObjectKind::Clip.name_is_structural());
        assert!(!ObjectKind::BlendTree.name_is_structural());
    }

    #[test]
    fn layer_merge_keeps_corruption_class() {
        let err = SpliceError::LayerMerge {
            layer: "Base".into(),
            cause: Box::new(SpliceError::ObjectNotFound(ObjectId(9))),
        };
        assert!(err.is_data_corruption());
        assert!(err.to_string().contains("Base"));

        let precondition = SpliceError::NotAnAncestor {
            root: "Avatar".into(),
            object: "Prop".into(),
        };
        assert!(!precondition.is_data_corruption());
    }
}
