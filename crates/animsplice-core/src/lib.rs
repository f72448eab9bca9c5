//! # animsplice-core
//!
//! Deterministic engine for rewriting animation state graphs.
//!
//! A state graph is a set of parameters and layers; each layer owns a tree of
//! state machines whose states play motions (clips or blend trees) and whose
//! transitions are guarded by conditions on the parameters. This crate
//! provides the transformations a tooling pipeline needs to combine such
//! graphs:
//!
//! - `condition`: guard algebra over disjunctive normal form
//! - `model`: the object model, including the curve store of clips
//! - `path`: object-path arithmetic and binding rewriters
//! - `clone`: deep clone with reference rewriting over a shared object graph
//! - `merge`: splicing one graph's layers and parameters into another
//!
//! ## Architectural Constraints
//!
//! - All objects live in one [`ObjectStore`] and refer to each other by id
//! - Ordered collections only, so the same inputs give the same output
//! - Has NO async, NO I/O; hosts own persistence and registration

// =============================================================================
// MODULES
// =============================================================================

pub mod clone;
pub mod condition;
pub mod formats;
pub mod merge;
pub mod model;
pub mod path;
pub mod primitives;
pub mod store;
pub mod types;

// =============================================================================
// RE-EXPORTS: Core Types (from types module)
// =============================================================================

pub use types::{ObjectId, ObjectKind, SpliceError};

// =============================================================================
// RE-EXPORTS: Engine
// =============================================================================

pub use clone::{CloneMap, DeepClone, deep_clone};
pub use condition::{Assignment, Comparator, Condition, Dnf};
pub use merge::{
    AssetRegistry, DroppedBehaviour, DroppedTransition, FnRewriter, GraphMerger, MergeReport,
    MergeRewriter, PathClipRewrite, TransitionSource, add_guarded_transitions,
};
pub use model::{Object, Reference};
pub use path::{
    Hierarchy, NearestMatchRewriter, ObjectHierarchy, PathRewriter, PathRule, PathTarget,
    RewritePath, RewriteReport, relative_path,
};
pub use store::{ObjectStore, SerializableStore};

// =============================================================================
// RE-EXPORTS: Formats (from formats module)
// =============================================================================

pub use formats::GraphDocument;
pub use formats::persistence::{
    PersistenceHeader, canonical_checksum, document_from_bytes, document_to_bytes,
};

#[cfg(feature = "crypto-hash")]
pub use formats::persistence::canonical_crypto_hash;
