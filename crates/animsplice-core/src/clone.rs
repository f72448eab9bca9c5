//! # Deep Clone & Reference Rewrite
//!
//! Copies an object and everything it transitively references, inside one
//! [`ObjectStore`].
//!
//! Three passes:
//! 1. Discovery: an explicit worklist and an id-keyed visited set walk every
//!    reachable reference. Only the root and allow-listed kinds are copied;
//!    other objects stay shared and are not descended into.
//! 2. Rewire: every copy's plain reference fields are pointed at the copies.
//! 3. Side tables: default states and child-machine transition lists are
//!    re-derived from the originals through the finished map.
//!
//! Two references to one original end up as two references to one copy.
//! Cycles terminate because each id is visited once. A reference whose
//! target has a kind its slot does not accept aborts the clone.

use crate::model::Object;
use crate::store::ObjectStore;
use crate::{ObjectId, ObjectKind, SpliceError};
use std::collections::{BTreeMap, BTreeSet};

// =============================================================================
// CLONE MAP
// =============================================================================

/// Result of a deep clone: the `original <-> clone` correspondence.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CloneMap {
    root: ObjectId,
    forward: BTreeMap<ObjectId, ObjectId>,
    reverse: BTreeMap<ObjectId, ObjectId>,
    /// `(original, clone)` in discovery order.
    order: Vec<(ObjectId, ObjectId)>,
}

impl CloneMap {
    fn new(original_root: ObjectId, clone_root: ObjectId) -> Self {
        let mut map = Self {
            root: clone_root,
            forward: BTreeMap::new(),
            reverse: BTreeMap::new(),
            order: Vec::new(),
        };
        map.record(original_root, clone_root);
        map
    }

    fn record(&mut self, original: ObjectId, clone: ObjectId) {
        self.forward.insert(original, clone);
        self.reverse.insert(clone, original);
        self.order.push((original, clone));
    }

    /// Clone of the root the run started from.
    #[must_use]
    pub fn root(&self) -> ObjectId {
        self.root
    }

    #[must_use]
    pub fn clone_of(&self, original: ObjectId) -> Option<ObjectId> {
        self.forward.get(&original).copied()
    }

    #[must_use]
    pub fn original_of(&self, clone: ObjectId) -> Option<ObjectId> {
        self.reverse.get(&clone).copied()
    }

    /// The clone of `id` if it was cloned, else `id` itself (shared).
    #[must_use]
    pub fn resolve(&self, id: ObjectId) -> ObjectId {
        self.clone_of(id).unwrap_or(id)
    }

    /// `(original, clone)` pairs in discovery order.
    pub fn clones(&self) -> impl Iterator<Item = (ObjectId, ObjectId)> + '_ {
        self.order.iter().copied()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.order.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }
}

// =============================================================================
// DEEP CLONE
// =============================================================================

/// Deep-clone configuration.
#[derive(Debug, Clone, Default)]
pub struct DeepClone {
    allowed: BTreeSet<ObjectKind>,
    name_prefix: String,
}

impl DeepClone {
    /// Copy objects of the `allowed` kinds; share everything else.
    #[must_use]
    pub fn new(allowed: impl IntoIterator<Item = ObjectKind>) -> Self {
        Self {
            allowed: allowed.into_iter().collect(),
            name_prefix: String::new(),
        }
    }

    /// Prefix the names of copies, except structural names and empty names.
    #[must_use]
    pub fn with_name_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.name_prefix = prefix.into();
        self
    }

    #[must_use]
    pub fn allows(&self, kind: ObjectKind) -> bool {
        self.allowed.contains(&kind)
    }

    pub fn run(&self, store: &mut ObjectStore, root: ObjectId) -> Result<CloneMap, SpliceError> {
        let discovered = self.discover(store, root)?;

        // Pass 1b: shallow copies, registered before any rewiring.
        let mut map: Option<CloneMap> = None;
        for original in discovered {
            let mut copy = store.object(original)?.shallow_clone();
            self.apply_prefix(&mut copy);
            let clone = store.insert(copy);
            match map.as_mut() {
                Some(map) => map.record(original, clone),
                None => map = Some(CloneMap::new(original, clone)),
            }
        }
        let map = map.ok_or(SpliceError::ObjectNotFound(root))?;

        // Pass 2: rewire plain reference fields.
        for (_, clone) in map.clones() {
            store
                .object_mut(clone)?
                .remap_references(&mut |id| map.resolve(id));
        }

        // Pass 3: side-table associations.
        for (original, clone) in map.clones() {
            let source = store.object(original)?;
            if source.kind() != ObjectKind::StateMachine {
                continue;
            }
            let source = source.clone();
            store
                .object_mut(clone)?
                .restore_associations(&source, &mut |id| map.resolve(id));
        }

        tracing::debug!(
            root = %root,
            clone = %map.root(),
            copied = map.len(),
            "deep clone finished"
        );
        Ok(map)
    }

    /// Pass 1a: every object to copy, in discovery order.
    fn discover(
        &self,
        store: &ObjectStore,
        root: ObjectId,
    ) -> Result<Vec<ObjectId>, SpliceError> {
        store.object(root)?;

        let mut visited = BTreeSet::from([root]);
        let mut stack = vec![root];
        let mut discovered = Vec::new();

        while let Some(current) = stack.pop() {
            discovered.push(current);
            let references = store.object(current)?.references();

            // Reverse push keeps discovery in field order.
            for reference in references.into_iter().rev() {
                let kind = store.kind_of(reference.id)?;
                if !reference.accepts_kind(kind) {
                    return Err(SpliceError::mismatch(reference.id, reference.accepts, kind));
                }
                if self.allows(kind) && visited.insert(reference.id) {
                    stack.push(reference.id);
                }
            }
        }
        Ok(discovered)
    }

    fn apply_prefix(&self, copy: &mut Object) {
        if self.name_prefix.is_empty()
            || copy.kind().name_is_structural()
            || copy.name().is_empty()
        {
            return;
        }
        let name = format!("{}{}", self.name_prefix, copy.name());
        copy.set_name(name);
    }
}

/// Deep-clone `root` and return the id of its copy.
pub fn deep_clone(
    store: &mut ObjectStore,
    root: ObjectId,
    allowed: &[ObjectKind],
    name_prefix: &str,
) -> Result<ObjectId, SpliceError> {
    DeepClone::new(allowed.iter().copied())
        .with_name_prefix(name_prefix)
        .run(store, root)
        .map(|map| map.root())
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{
        Asset, Binding, BlendTree, ChildMotion, Clip, Destination, ObjectCurve, State,
        StateMachine, Transition,
    };

    const GRAPH_KINDS: &[ObjectKind] = &[
        ObjectKind::StateMachine,
        ObjectKind::State,
        ObjectKind::Transition,
        ObjectKind::BlendTree,
        ObjectKind::Clip,
        ObjectKind::Behaviour,
    ];

    #[test]
    fn shared_object_stays_shared() {
        let mut store = ObjectStore::new();
        let tree = store.insert(BlendTree::new("Move", "Speed"));
        let a = store.insert(State::new("A").with_motion(tree));
        let b = store.insert(State::new("B").with_motion(tree));
        let mut machine = StateMachine::new("Base");
        machine.add_state(a);
        machine.add_state(b);
        let machine = store.insert(machine);

        let map = DeepClone::new(GRAPH_KINDS.iter().copied())
            .run(&mut store, machine)
            .expect("clone");

        let copy = store.machine(map.root()).expect("machine");
        let (ca, cb) = (copy.states[0].state, copy.states[1].state);
        let ma = store.state(ca).expect("a").motion;
        let mb = store.state(cb).expect("b").motion;

        assert_eq!(ma, mb);
        assert_ne!(ma, Some(tree));
        assert_eq!(map.original_of(ma.expect("motion")), Some(tree));
        assert_eq!(map.len(), 4);
    }

    #[test]
    fn cycles_terminate_and_are_reproduced() {
        let mut store = ObjectStore::new();
        let idle = store.insert(State::new("Idle"));
        let back = store.insert(Transition::new(Destination::State(idle)));
        store.state_mut(idle).expect("idle").transitions.push(back);

        let map = DeepClone::new(GRAPH_KINDS.iter().copied())
            .run(&mut store, idle)
            .expect("clone");

        let copy = store.state(map.root()).expect("state");
        let edge = store.transition(copy.transitions[0]).expect("edge");
        assert_eq!(edge.destination, Destination::State(map.root()));
        assert_ne!(map.root(), idle);
    }

    #[test]
    fn excluded_kinds_are_shared() {
        let mut store = ObjectStore::new();
        let material = store.insert(Asset::new("Red", "Material"));
        let mut clip = Clip::new("Swap");
        clip.set_object_curve(
            Binding::new("Body", "Renderer", "material"),
            ObjectCurve::constant(Some(material)),
        );
        let clip = store.insert(clip);

        let copy = deep_clone(&mut store, clip, GRAPH_KINDS, "").expect("clone");

        let (_, curve) = store
            .clip(copy)
            .expect("clip")
            .object_curves()
            .next()
            .expect("curve");
        assert_eq!(curve.keys[0].value, Some(material));
        assert_eq!(store.len(), 3);
    }

    #[test]
    fn type_mismatch_aborts() {
        let mut store = ObjectStore::new();
        let other = store.insert(State::new("NotAMotion"));
        let state = store.insert(State::new("Broken").with_motion(other));

        let err = deep_clone(&mut store, state, GRAPH_KINDS, "").expect_err("mismatch");
        assert!(matches!(
            err,
            SpliceError::TypeMismatch {
                found: ObjectKind::State,
                ..
            }
        ));
        assert!(err.is_data_corruption());
        assert_eq!(store.len(), 2);
    }

    #[test]
    fn dangling_reference_aborts() {
        let mut store = ObjectStore::new();
        let state = store.insert(State::new("Broken").with_motion(ObjectId(42)));
        assert!(matches!(
            deep_clone(&mut store, state, GRAPH_KINDS, ""),
            Err(SpliceError::ObjectNotFound(ObjectId(42)))
        ));
    }

    #[test]
    fn side_tables_point_at_copies() {
        let mut store = ObjectStore::new();
        let inner_state = store.insert(State::new("Inner"));
        let mut child = StateMachine::new("Child");
        child.add_state(inner_state);
        let child = store.insert(child);
        let jump = store.insert(Transition::new(Destination::State(inner_state)));
        let idle = store.insert(State::new("Idle"));
        let mut root = StateMachine::new("Root");
        root.add_state(idle);
        root.add_machine(child);
        root.default_state = Some(idle);
        root.set_transitions_from_machine(child, vec![jump]);
        let root = store.insert(root);

        let map = DeepClone::new(GRAPH_KINDS.iter().copied())
            .run(&mut store, root)
            .expect("clone");

        let copy = store.machine(map.root()).expect("root");
        let new_child = map.clone_of(child).expect("child");
        assert_eq!(copy.default_state, map.clone_of(idle));
        assert_eq!(
            copy.transitions_from_machine(new_child),
            &[map.clone_of(jump).expect("jump")]
        );
        let new_jump = store.transition(map.resolve(jump)).expect("jump");
        assert_eq!(new_jump.destination, Destination::State(map.resolve(inner_state)));
    }

    #[test]
    fn prefix_skips_structural_names() {
        let mut store = ObjectStore::new();
        let clip = store.insert(Clip::new("Wave"));
        let tree = store.insert({
            let mut tree = BlendTree::new("Blend", "Speed");
            tree.add_child(ChildMotion::new(clip, 0.0));
            tree
        });
        let state = store.insert(State::new("Idle").with_motion(tree));

        let map = DeepClone::new(GRAPH_KINDS.iter().copied())
            .with_name_prefix("Foo_")
            .run(&mut store, state)
            .expect("clone");

        assert_eq!(store.state(map.root()).expect("state").name, "Idle");
        assert_eq!(store.blend_tree(map.resolve(tree)).expect("tree").name, "Foo_Blend");
        assert_eq!(store.clip(map.resolve(clip)).expect("clip").name, "Foo_Wave");
        // Originals are untouched.
        assert_eq!(store.clip(clip).expect("clip").name, "Wave");
    }

    #[test]
    fn discovery_order_follows_fields() {
        let mut store = ObjectStore::new();
        let a = store.insert(State::new("A"));
        let b = store.insert(State::new("B"));
        let mut machine = StateMachine::new("Base");
        machine.add_state(b);
        machine.add_state(a);
        let machine = store.insert(machine);

        let map = DeepClone::new(GRAPH_KINDS.iter().copied())
            .run(&mut store, machine)
            .expect("clone");
        let originals: Vec<_> = map.clones().map(|(original, _)| original).collect();
        assert_eq!(originals, vec![machine, b, a]);
    }
}
