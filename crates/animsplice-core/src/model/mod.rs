//! # Object Model
//!
//! Every node of a state graph is an [`Object`] stored by id in the
//! [`ObjectStore`](crate::ObjectStore). Objects refer to each other only
//! through [`ObjectId`]s, so shared sub-objects and cycles are plain data.
//!
//! Each object reports its outgoing references as [`Reference`]s, which carry
//! the kinds the referencing slot accepts. The clone engine relies on that
//! declaration to detect corrupted references.

pub mod behaviour;
pub mod blend_tree;
pub mod clip;
pub mod controller;
pub mod machine;
pub mod mask;

pub use behaviour::{Behaviour, DriverEntry, DriverOperation, PlayableLayer};
pub use blend_tree::{BlendTree, BlendType, ChildMotion};
pub use clip::{Binding, Clip, CurveRef, FloatCurve, Keyframe, ObjectCurve, ObjectKeyframe};
pub use controller::{Layer, LayerBlending, Parameter, ParameterTable, ParameterType, StateGraph};
pub use machine::{
    ChildMachine, ChildState, Destination, InterruptionSource, MachineTransitions, Position, State,
    StateMachine, Transition, TransitionTiming,
};
pub use mask::{AvatarMask, MaskEntry};

use crate::types::{ObjectId, ObjectKind};
use serde::{Deserialize, Serialize};

// =============================================================================
// REFERENCES
// =============================================================================

/// One outgoing reference of an object, with the kinds its slot accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Reference {
    pub id: ObjectId,
    pub accepts: &'static [ObjectKind],
}

impl Reference {
    #[must_use]
    pub const fn new(id: ObjectId, accepts: &'static [ObjectKind]) -> Self {
        Self { id, accepts }
    }

    #[must_use]
    pub fn accepts_kind(&self, kind: ObjectKind) -> bool {
        self.accepts.contains(&kind)
    }
}

// =============================================================================
// ASSETS
// =============================================================================

/// Opaque leaf resource owned by the host (material, texture, mesh...).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Asset {
    pub name: String,
    #[serde(default)]
    pub asset_type: String,
}

impl Asset {
    #[must_use]
    pub fn new(name: impl Into<String>, asset_type: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            asset_type: asset_type.into(),
        }
    }
}

// =============================================================================
// OBJECT
// =============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Object {
    Controller(StateGraph),
    StateMachine(StateMachine),
    State(State),
    Transition(Transition),
    BlendTree(BlendTree),
    Clip(Clip),
    AvatarMask(AvatarMask),
    Behaviour(Behaviour),
    Asset(Asset),
}

impl Object {
    #[must_use]
    pub fn kind(&self) -> ObjectKind {
        match self {
            Self::Controller(_) => ObjectKind::Controller,
            Self::StateMachine(_) => ObjectKind::StateMachine,
            Self::State(_) => ObjectKind::State,
            Self::Transition(_) => ObjectKind::Transition,
            Self::BlendTree(_) => ObjectKind::BlendTree,
            Self::Clip(_) => ObjectKind::Clip,
            Self::AvatarMask(_) => ObjectKind::AvatarMask,
            Self::Behaviour(_) => ObjectKind::Behaviour,
            Self::Asset(_) => ObjectKind::Asset,
        }
    }

    /// Display name. Behaviours are unnamed.
    #[must_use]
    pub fn name(&self) -> &str {
        match self {
            Self::Controller(graph) => &graph.name,
            Self::StateMachine(machine) => &machine.name,
            Self::State(state) => &state.name,
            Self::Transition(transition) => &transition.name,
            Self::BlendTree(tree) => &tree.name,
            Self::Clip(clip) => &clip.name,
            Self::AvatarMask(mask) => &mask.name,
            Self::Behaviour(_) => "",
            Self::Asset(asset) => &asset.name,
        }
    }

    /// Set the name. Ignored for unnamed kinds.
    pub fn set_name(&mut self, name: String) {
        let slot = match self {
            Self::Controller(graph) => &mut graph.name,
            Self::StateMachine(machine) => &mut machine.name,
            Self::State(state) => &mut state.name,
            Self::Transition(transition) => &mut transition.name,
            Self::BlendTree(tree) => &mut tree.name,
            Self::Clip(clip) => &mut clip.name,
            Self::AvatarMask(mask) => &mut mask.name,
            Self::Behaviour(_) => return,
            Self::Asset(asset) => &mut asset.name,
        };
        *slot = name;
    }

    /// Every outgoing reference, side tables included, in field order.
    #[must_use]
    pub fn references(&self) -> Vec<Reference> {
        let mut out = Vec::new();
        match self {
            Self::Controller(graph) => graph.collect_references(&mut out),
            Self::StateMachine(machine) => machine.collect_references(&mut out),
            Self::State(state) => state.collect_references(&mut out),
            Self::Transition(transition) => transition.collect_references(&mut out),
            Self::BlendTree(tree) => tree.collect_references(&mut out),
            Self::Clip(clip) => clip.collect_references(&mut out),
            Self::AvatarMask(_) | Self::Behaviour(_) | Self::Asset(_) => {}
        }
        out
    }

    /// Rewrite every plain reference field through `map`.
    ///
    /// Side-table associations are not touched; see
    /// [`Object::restore_associations`].
    pub fn remap_references(&mut self, map: &mut dyn FnMut(ObjectId) -> ObjectId) {
        match self {
            Self::Controller(graph) => graph.remap_references(map),
            Self::StateMachine(machine) => machine.remap_references(map),
            Self::State(state) => state.remap_references(map),
            Self::Transition(transition) => transition.remap_references(map),
            Self::BlendTree(tree) => tree.remap_references(map),
            Self::Clip(clip) => clip.remap_references(map),
            Self::AvatarMask(_) | Self::Behaviour(_) | Self::Asset(_) => {}
        }
    }

    /// Rewrite plain fields and side tables alike.
    pub fn remap_all(&mut self, map: &mut dyn FnMut(ObjectId) -> ObjectId) {
        if let Self::StateMachine(machine) = self {
            let original = machine.clone();
            machine.remap_references(map);
            machine.restore_associations(&original, map);
        } else {
            self.remap_references(map);
        }
    }

    /// Field-for-field copy without side-table associations.
    #[must_use]
    pub fn shallow_clone(&self) -> Self {
        let mut copy = self.clone();
        if let Self::StateMachine(machine) = &mut copy {
            machine.clear_associations();
        }
        copy
    }

    /// Re-derive side-table associations of `original` through `map`.
    pub fn restore_associations(
        &mut self,
        original: &Self,
        map: &mut dyn FnMut(ObjectId) -> ObjectId,
    ) {
        if let (Self::StateMachine(machine), Self::StateMachine(source)) = (self, original) {
            machine.restore_associations(source, map);
        }
    }
}

macro_rules! impl_from_variant {
    ($($variant:ident($ty:ty)),* $(,)?) => {
        $(
            impl From<$ty> for Object {
                fn from(value: $ty) -> Self {
                    Self::$variant(value)
                }
            }
        )*
    };
}

impl_from_variant!(
    Controller(StateGraph),
    StateMachine(StateMachine),
    State(State),
    Transition(Transition),
    BlendTree(BlendTree),
    Clip(Clip),
    AvatarMask(AvatarMask),
    Behaviour(Behaviour),
    Asset(Asset),
);

// =============================================================================
// TESTS
// =============================================================================
