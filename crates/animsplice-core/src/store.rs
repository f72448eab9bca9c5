//! # Object Store
//!
//! The arena every graph object lives in.
//!
//! Ids are allocated sequentially and never reused: the engine only ever
//! creates objects and rewires references, it never deletes. All data
//! structures use `BTreeMap` for deterministic ordering.

use crate::model::{
    AvatarMask, BlendTree, Clip, Object, State, StateGraph, StateMachine, Transition,
};
use crate::{ObjectId, ObjectKind, SpliceError};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

// =============================================================================
// STORE
// =============================================================================

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ObjectStore {
    objects: BTreeMap<ObjectId, Object>,
    /// Next available ObjectId
    next_id: u64,
}

macro_rules! typed_accessors {
    ($($get:ident, $get_mut:ident => $variant:ident($ty:ty);)*) => {
        $(
            #[doc = concat!("The `", stringify!($variant), "` stored under `id`.")]
            pub fn $get(&self, id: ObjectId) -> Result<&$ty, SpliceError> {
                match self.object(id)? {
                    Object::$variant(value) => Ok(value),
                    other => Err(SpliceError::mismatch(
                        id,
                        &[ObjectKind::$variant],
                        other.kind(),
                    )),
                }
            }

            pub fn $get_mut(&mut self, id: ObjectId) -> Result<&mut $ty, SpliceError> {
                match self.object_mut(id)? {
                    Object::$variant(value) => Ok(value),
                    other => Err(SpliceError::mismatch(
                        id,
                        &[ObjectKind::$variant],
                        other.kind(),
                    )),
                }
            }
        )*
    };
}

impl ObjectStore {
    /// Create a new empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Store an object under a fresh id.
    pub fn insert(&mut self, object: impl Into<Object>) -> ObjectId {
        let id = ObjectId(self.next_id);
        self.next_id = self.next_id.saturating_add(1);
        self.objects.insert(id, object.into());
        id
    }

    #[must_use]
    pub fn get(&self, id: ObjectId) -> Option<&Object> {
        self.objects.get(&id)
    }

    pub fn get_mut(&mut self, id: ObjectId) -> Option<&mut Object> {
        self.objects.get_mut(&id)
    }

    #[must_use]
    pub fn contains(&self, id: ObjectId) -> bool {
        self.objects.contains_key(&id)
    }

    /// Like [`get`](Self::get), but a missing id is an error.
    pub fn object(&self, id: ObjectId) -> Result<&Object, SpliceError> {
        self.objects.get(&id).ok_or(SpliceError::ObjectNotFound(id))
    }

    pub fn object_mut(&mut self, id: ObjectId) -> Result<&mut Object, SpliceError> {
        self.objects
            .get_mut(&id)
            .ok_or(SpliceError::ObjectNotFound(id))
    }

    /// Runtime kind of the object stored under `id`.
    pub fn kind_of(&self, id: ObjectId) -> Result<ObjectKind, SpliceError> {
        self.object(id).map(Object::kind)
    }

    typed_accessors! {
        controller, controller_mut => Controller(StateGraph);
        machine, machine_mut => StateMachine(StateMachine);
        state, state_mut => State(State);
        transition, transition_mut => Transition(Transition);
        blend_tree, blend_tree_mut => BlendTree(BlendTree);
        clip, clip_mut => Clip(Clip);
        mask, mask_mut => AvatarMask(AvatarMask);
    }

    /// Number of stored objects.
    #[must_use]
    pub fn len(&self) -> usize {
        self.objects.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }

    /// All objects in id order.
    pub fn iter(&self) -> impl Iterator<Item = (ObjectId, &Object)> {
        self.objects.iter().map(|(id, object)| (*id, object))
    }

    /// Get the next available ObjectId (for serialization).
    #[must_use]
    pub fn next_id(&self) -> u64 {
        self.next_id
    }

    /// Absorb every object of `other` under fresh ids.
    ///
    /// References between imported objects are remapped, side tables
    /// included. Returns the `other id -> new id` map.
    pub fn import(&mut self, other: &ObjectStore) -> BTreeMap<ObjectId, ObjectId> {
        let mapping: BTreeMap<ObjectId, ObjectId> = other
            .objects
            .keys()
            .map(|old| {
                let new = ObjectId(self.next_id);
                self.next_id = self.next_id.saturating_add(1);
                (*old, new)
            })
            .collect();

        for (old, object) in &other.objects {
            let mut copy = object.clone();
            copy.remap_all(&mut |id| mapping.get(&id).copied().unwrap_or(id));
            if let Some(new) = mapping.get(old) {
                self.objects.insert(*new, copy);
            }
        }

        tracing::debug!(imported = mapping.len(), "store import");
        mapping
    }

    /// Ids of every stored object reachable from `root`, `root` included.
    ///
    /// Dangling references are skipped.
    #[must_use]
    pub fn reachable_from(&self, root: ObjectId) -> BTreeSet<ObjectId> {
        let mut seen = BTreeSet::new();
        let mut stack = vec![root];
        while let Some(id) = stack.pop() {
            let Some(object) = self.objects.get(&id) else {
                continue;
            };
            if seen.insert(id) {
                stack.extend(object.references().into_iter().map(|r| r.id));
            }
        }
        seen
    }
}

// =============================================================================
// SERIALIZATION SUPPORT
// =============================================================================

/// Serializable representation of the store for persistence.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SerializableStore {
    pub objects: Vec<(ObjectId, Object)>,
    pub next_id: u64,
}

impl From<&ObjectStore> for SerializableStore {
    fn from(store: &ObjectStore) -> Self {
        Self {
            objects: store
                .objects
                .iter()
                .map(|(id, object)| (*id, object.clone()))
                .collect(),
            next_id: store.next_id,
        }
    }
}

impl From<SerializableStore> for ObjectStore {
    fn from(ss: SerializableStore) -> Self {
        let mut store = ObjectStore::new();
        for (id, object) in ss.objects {
            store.next_id = store.next_id.max(id.0.saturating_add(1));
            store.objects.insert(id, object);
        }
        store.next_id = store.next_id.max(ss.next_id);
        store
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Destination, Layer};

    #[test]
    fn reachability_follows_references() {
        let mut store = ObjectStore::new();
        let idle = store.insert(State::new("Idle"));
        let mut machine = StateMachine::new("Base");
        machine.add_state(idle);
        let machine = store.insert(machine);
        let orphan = store.insert(State::new("Orphan"));
        let mut graph = StateGraph::new("Fx");
        graph.layers.push(Layer::new("Base", machine));
        let graph = store.insert(graph);

        let reachable = store.reachable_from(graph);
        assert_eq!(reachable, BTreeSet::from([idle, machine, graph]));
        assert!(!reachable.contains(&orphan));
    }

    #[test]
    fn ids_are_sequential() {
        let mut store = ObjectStore::new();
        let a = store.insert(State::new("A"));
        let b = store.insert(State::new("B"));
        assert_eq!(a, ObjectId(0));
        assert_eq!(b, ObjectId(1));
        assert_eq!(store.next_id(), 2);
    }

    #[test]
    fn typed_access_reports_mismatch() {
        let mut store = ObjectStore::new();
        let state = store.insert(State::new("Idle"));

        assert_eq!(store.state(state).expect("state").name, "Idle");
        assert!(matches!(
            store.clip(state),
            Err(SpliceError::TypeMismatch {
                found: ObjectKind::State,
                ..
            })
        ));
        assert!(matches!(
            store.state(ObjectId(99)),
            Err(SpliceError::ObjectNotFound(ObjectId(99)))
        ));
    }

    #[test]
    fn import_remaps_references_and_side_tables() {
        let mut source = ObjectStore::new();
        let idle = source.insert(State::new("Idle"));
        let mut machine = StateMachine::new("Base");
        machine.add_state(idle);
        machine.default_state = Some(idle);
        let machine = source.insert(machine);
        let mut graph = StateGraph::new("Source");
        graph.layers.push(Layer::new("Base", machine));
        source.insert(graph);

        let mut dest = ObjectStore::new();
        dest.insert(Transition::new(Destination::Exit));
        let mapping = dest.import(&source);

        assert_eq!(dest.len(), 4);
        let new_machine = dest.machine(mapping[&machine]).expect("machine");
        assert_eq!(new_machine.default_state, Some(mapping[&idle]));
        assert_eq!(new_machine.states[0].state, mapping[&idle]);
        assert_ne!(mapping[&idle], idle);
    }

    #[test]
    fn serialization_roundtrip() {
        let mut store = ObjectStore::new();
        store.insert(Clip::new("Wave"));
        store.insert(State::new("Idle"));

        let restored = ObjectStore::from(SerializableStore::from(&store));
        assert_eq!(restored, store);
        assert_eq!(restored.next_id(), store.next_id());
    }
}
