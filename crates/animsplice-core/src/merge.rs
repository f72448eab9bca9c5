//! # Graph Merge / Splice
//!
//! Incorporates a foreign state graph into a target graph inside one
//! [`ObjectStore`].
//!
//! - Parameters are renamed through the caller and created in the target if
//!   absent. The first declaration of a name wins; later ones are reused.
//! - Every source layer becomes a new target layer under a caller-renamed
//!   label. Re-running a merge therefore duplicates layers.
//! - Machines, states, transitions, blend trees and behaviours are copied.
//!   Clips go through the caller's clip rewrite.
//!
//! ## Transition retargeting
//!
//! Machines are copied top-down first, without transitions. Transitions are
//! then rebuilt children-before-parents by looking their destination up *by
//! name* in the copied structure: the current machine's states, then the
//! states of its descendants, then the states of each ancestor. The first
//! match wins. A transition whose destination has no counterpart is dropped
//! and reported, never an error.

use crate::clone::deep_clone;
use crate::condition::Dnf;
use crate::model::{
    Behaviour, BlendTree, ChildMachine, ChildState, Destination, Layer, MachineTransitions,
    Object, Parameter, State, StateMachine, Transition,
};
use crate::path::{rewrite_clip, RewritePath};
use crate::store::ObjectStore;
use crate::{ObjectId, ObjectKind, SpliceError};
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};

// =============================================================================
// CALLER HOOKS
// =============================================================================

/// Renaming and copying hooks consulted during a merge.
///
/// Every method has an identity default: layer and parameter names are kept,
/// clips are shared with the source, and blend trees are created empty.
pub trait MergeRewriter {
    fn layer_name(&mut self, name: &str) -> String {
        name.to_string()
    }

    fn parameter_name(&mut self, name: &str) -> String {
        name.to_string()
    }

    /// The clip the target should use in place of source clip `clip`.
    fn clip(
        &mut self,
        _store: &mut ObjectStore,
        clip: ObjectId,
    ) -> Result<ObjectId, SpliceError> {
        Ok(clip)
    }

    /// Create the blend tree a source tree named `name` is copied into.
    fn blend_tree(&mut self, store: &mut ObjectStore, name: &str) -> ObjectId {
        store.insert(BlendTree::new(name, ""))
    }
}

type NameFn<'a> = Box<dyn FnMut(&str) -> String + 'a>;
type ClipFn<'a> = Box<dyn FnMut(&mut ObjectStore, ObjectId) -> Result<ObjectId, SpliceError> + 'a>;

/// A [`MergeRewriter`] assembled from closures.
pub struct FnRewriter<'a> {
    layer: NameFn<'a>,
    parameter: NameFn<'a>,
    clip: Option<ClipFn<'a>>,
}

impl<'a> FnRewriter<'a> {
    #[must_use]
    pub fn new() -> Self {
        Self {
            layer: Box::new(|name: &str| name.to_string()),
            parameter: Box::new(|name: &str| name.to_string()),
            clip: None,
        }
    }

    #[must_use]
    pub fn with_layer(mut self, rename: impl FnMut(&str) -> String + 'a) -> Self {
        self.layer = Box::new(rename);
        self
    }

    #[must_use]
    pub fn with_parameter(mut self, rename: impl FnMut(&str) -> String + 'a) -> Self {
        self.parameter = Box::new(rename);
        self
    }

    #[must_use]
    pub fn with_clip(
        mut self,
        rewrite: impl FnMut(&mut ObjectStore, ObjectId) -> Result<ObjectId, SpliceError> + 'a,
    ) -> Self {
        self.clip = Some(Box::new(rewrite));
        self
    }

    /// Copy clips and rewrite their paths.
    #[must_use]
    pub fn with_path_rewrite<R: RewritePath + 'a>(self, mut rewrite: PathClipRewrite<R>) -> Self {
        self.with_clip(move |store, clip| rewrite.apply(store, clip))
    }
}

impl Default for FnRewriter<'_> {
    fn default() -> Self {
        Self::new()
    }
}

impl MergeRewriter for FnRewriter<'_> {
    fn layer_name(&mut self, name: &str) -> String {
        (self.layer)(name)
    }

    fn parameter_name(&mut self, name: &str) -> String {
        (self.parameter)(name)
    }

    fn clip(&mut self, store: &mut ObjectStore, clip: ObjectId) -> Result<ObjectId, SpliceError> {
        match self.clip.as_mut() {
            Some(rewrite) => rewrite(store, clip),
            None => Ok(clip),
        }
    }
}

/// Clip rewrite that deep-copies a clip and rewrites its binding paths.
pub struct PathClipRewrite<R> {
    rewriter: R,
    name_prefix: String,
}

impl<R: RewritePath> PathClipRewrite<R> {
    #[must_use]
    pub fn new(rewriter: R) -> Self {
        Self {
            rewriter,
            name_prefix: String::new(),
        }
    }

    #[must_use]
    pub fn with_name_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.name_prefix = prefix.into();
        self
    }

    /// Copy `clip` and rewrite the copy. Referenced assets stay shared.
    pub fn apply(
        &mut self,
        store: &mut ObjectStore,
        clip: ObjectId,
    ) -> Result<ObjectId, SpliceError> {
        let copy = deep_clone(store, clip, &[ObjectKind::Clip], &self.name_prefix)?;
        rewrite_clip(store.clip_mut(copy)?, &self.rewriter);
        Ok(copy)
    }
}

/// Answers whether an object is already known to persistent storage.
pub trait AssetRegistry {
    fn is_registered(&self, id: ObjectId) -> bool;
}

impl AssetRegistry for BTreeSet<ObjectId> {
    fn is_registered(&self, id: ObjectId) -> bool {
        self.contains(&id)
    }
}

// =============================================================================
// REPORT
// =============================================================================

/// A source transition that was not materialised.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DroppedTransition {
    pub transition: ObjectId,
    /// Name of the destination that had no counterpart.
    pub destination: String,
}

/// A source behaviour of a kind the engine does not model.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DroppedBehaviour {
    pub behaviour: ObjectId,
    pub type_name: String,
}

/// What a merge did to the target.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct MergeReport {
    /// Every object the merge created, in creation order.
    pub created: Vec<ObjectId>,
    pub layers_added: Vec<String>,
    pub parameters_added: Vec<String>,
    pub parameters_reused: Vec<String>,
    pub dropped_transitions: Vec<DroppedTransition>,
    pub dropped_behaviours: Vec<DroppedBehaviour>,
}

impl MergeReport {
    /// Created objects the registry does not know yet.
    #[must_use]
    pub fn unregistered(&self, registry: &dyn AssetRegistry) -> Vec<ObjectId> {
        self.created
            .iter()
            .copied()
            .filter(|id| !registry.is_registered(*id))
            .collect()
    }
}

// =============================================================================
// MERGER
// =============================================================================

/// Per-merge state shared by every layer.
struct Session<'r> {
    rewriter: &'r mut dyn MergeRewriter,
    /// Source name -> renamed, so a rename hook is consulted once per name.
    renames: BTreeMap<String, String>,
    /// Source motion -> its copy; shared motions are copied once.
    motions: BTreeMap<ObjectId, ObjectId>,
    report: MergeReport,
}

impl Session<'_> {
    fn parameter_name(&mut self, name: &str) -> String {
        if let Some(renamed) = self.renames.get(name) {
            return renamed.clone();
        }
        let renamed = self.rewriter.parameter_name(name);
        self.renames.insert(name.to_string(), renamed.clone());
        renamed
    }

    fn rename_optional(&mut self, name: Option<&str>) -> Option<String> {
        name.map(|name| self.parameter_name(name))
    }
}

/// Copied machine tree of one layer, keyed by source machine.
struct MachineEntry {
    copy: ObjectId,
    parent: Option<ObjectId>,
    /// `(name, copy)` of the machine's states, in order.
    states: Vec<(String, ObjectId)>,
    /// `(name, source child)` of the machine's child machines, in order.
    children: Vec<(String, ObjectId)>,
}

type MachineIndex = BTreeMap<ObjectId, MachineEntry>;

pub struct GraphMerger<'s> {
    store: &'s mut ObjectStore,
}

impl<'s> GraphMerger<'s> {
    pub fn new(store: &'s mut ObjectStore) -> Self {
        Self { store }
    }

    /// Merge controller `source` into controller `dest`.
    ///
    /// A failing layer aborts the merge with `LayerMerge` naming that layer.
    /// Layers merged before it stay in the target.
    pub fn merge(
        &mut self,
        source: ObjectId,
        dest: ObjectId,
        rewriter: &mut dyn MergeRewriter,
    ) -> Result<MergeReport, SpliceError> {
        let graph = self.store.controller(source)?.clone();
        self.store.controller(dest)?;
        let first_created = self.store.next_id();

        let mut session = Session {
            rewriter,
            renames: BTreeMap::new(),
            motions: BTreeMap::new(),
            report: MergeReport::default(),
        };

        for parameter in graph.parameters.iter() {
            let name = session.parameter_name(&parameter.name);
            let added = self.store.controller_mut(dest)?.add_parameter(Parameter {
                name: name.clone(),
                ..parameter.clone()
            });
            if added {
                session.report.parameters_added.push(name);
            } else {
                session.report.parameters_reused.push(name);
            }
        }

        for layer in &graph.layers {
            let merged = self
                .merge_layer(&mut session, layer)
                .map_err(|cause| SpliceError::LayerMerge {
                    layer: layer.name.clone(),
                    cause: Box::new(cause),
                })?;
            session.report.layers_added.push(merged.name.clone());
            self.store.controller_mut(dest)?.layers.push(merged);
        }

        let mut report = session.report;
        report.created = (first_created..self.store.next_id()).map(ObjectId).collect();

        tracing::info!(
            source = %source,
            dest = %dest,
            layers = report.layers_added.len(),
            parameters_added = report.parameters_added.len(),
            dropped_transitions = report.dropped_transitions.len(),
            "graph merged"
        );
        Ok(report)
    }

    fn merge_layer(
        &mut self,
        session: &mut Session<'_>,
        layer: &Layer,
    ) -> Result<Layer, SpliceError> {
        let machine = self.copy_machine_tree(session, layer.state_machine)?;
        Ok(Layer {
            name: session.rewriter.layer_name(&layer.name),
            state_machine: machine,
            ..layer.clone()
        })
    }

    // -------------------------------------------------------------------------
    // Structure
    // -------------------------------------------------------------------------

    /// Copy a machine tree: structure first, transitions afterwards.
    fn copy_machine_tree(
        &mut self,
        session: &mut Session<'_>,
        root: ObjectId,
    ) -> Result<ObjectId, SpliceError> {
        let root_name = self.store.machine(root)?.name.clone();
        let root_copy = self.store.insert(StateMachine::new(root_name));

        let mut index = MachineIndex::new();
        let mut preorder = Vec::new();
        let mut seen = BTreeSet::from([root]);
        let mut stack = vec![(root, root_copy, None)];

        while let Some((source, copy, parent)) = stack.pop() {
            let machine = self.store.machine(source)?.clone();
            let mut states = Vec::with_capacity(machine.states.len());
            let mut children = Vec::with_capacity(machine.machines.len());
            let mut copied = StateMachine {
                name: machine.name.clone(),
                any_state_position: machine.any_state_position,
                entry_position: machine.entry_position,
                exit_position: machine.exit_position,
                parent_machine_position: machine.parent_machine_position,
                ..StateMachine::default()
            };

            for child in &machine.states {
                let (name, state) = self.copy_state(session, child.state)?;
                copied.states.push(ChildState {
                    state,
                    position: child.position,
                });
                states.push((name, state));
            }

            let mut pending = Vec::new();
            for child in &machine.machines {
                if !seen.insert(child.machine) {
                    tracing::warn!(machine = %child.machine, "machine nested twice, skipping");
                    continue;
                }
                let name = self.store.machine(child.machine)?.name.clone();
                let child_copy = self.store.insert(StateMachine::new(name.clone()));
                copied.machines.push(ChildMachine {
                    machine: child_copy,
                    position: child.position,
                });
                children.push((name, child.machine));
                pending.push((child.machine, child_copy, Some(source)));
            }
            stack.extend(pending.into_iter().rev());

            copied.behaviours = self.copy_behaviours(session, &machine.behaviours)?;
            *self.store.machine_mut(copy)? = copied;

            index.insert(
                source,
                MachineEntry {
                    copy,
                    parent,
                    states,
                    children,
                },
            );
            preorder.push(source);
        }

        for source in preorder.iter().rev() {
            self.retarget_machine(session, &index, *source)?;
        }
        Ok(root_copy)
    }

    /// Copy a state without its transitions. Returns `(name, copy)`.
    fn copy_state(
        &mut self,
        session: &mut Session<'_>,
        id: ObjectId,
    ) -> Result<(String, ObjectId), SpliceError> {
        let state = self.store.state(id)?.clone();
        let motion = match state.motion {
            Some(motion) => Some(self.copy_motion(session, motion)?),
            None => None,
        };
        let behaviours = self.copy_behaviours(session, &state.behaviours)?;
        let copy = State {
            motion,
            behaviours,
            transitions: Vec::new(),
            speed_parameter: session.rename_optional(state.speed_parameter.as_deref()),
            cycle_offset_parameter: session
                .rename_optional(state.cycle_offset_parameter.as_deref()),
            mirror_parameter: session.rename_optional(state.mirror_parameter.as_deref()),
            time_parameter: session.rename_optional(state.time_parameter.as_deref()),
            ..state
        };
        let name = copy.name.clone();
        Ok((name, self.store.insert(copy)))
    }

    fn copy_motion(
        &mut self,
        session: &mut Session<'_>,
        id: ObjectId,
    ) -> Result<ObjectId, SpliceError> {
        if let Some(copy) = session.motions.get(&id) {
            return Ok(*copy);
        }
        match self.store.kind_of(id)? {
            ObjectKind::Clip => {
                let copy = session.rewriter.clip(self.store, id)?;
                session.motions.insert(id, copy);
                Ok(copy)
            }
            ObjectKind::BlendTree => self.copy_blend_tree(session, id),
            other => Err(SpliceError::mismatch(id, ObjectKind::MOTIONS, other)),
        }
    }

    fn copy_blend_tree(
        &mut self,
        session: &mut Session<'_>,
        id: ObjectId,
    ) -> Result<ObjectId, SpliceError> {
        let tree = self.store.blend_tree(id)?.clone();
        let copy = session.rewriter.blend_tree(self.store, &tree.name);
        let name = self.store.blend_tree(copy)?.name.clone();
        // Registered before the children so cycles resolve to this copy.
        session.motions.insert(id, copy);

        let mut copied = BlendTree { name, ..tree };
        copied.rename_parameters(&mut |parameter: &str| session.parameter_name(parameter));
        for child in &mut copied.children {
            if let Some(motion) = child.motion {
                child.motion = Some(self.copy_motion(session, motion)?);
            }
        }
        *self.store.blend_tree_mut(copy)? = copied;
        Ok(copy)
    }

    fn copy_behaviours(
        &mut self,
        session: &mut Session<'_>,
        ids: &[ObjectId],
    ) -> Result<Vec<ObjectId>, SpliceError> {
        let mut copies = Vec::with_capacity(ids.len());
        for id in ids {
            let behaviour: Behaviour = match self.store.object(*id)? {
                Object::Behaviour(behaviour) => behaviour.clone(),
                other => {
                    return Err(SpliceError::mismatch(
                        *id,
                        &[ObjectKind::Behaviour],
                        other.kind(),
                    ));
                }
            };
            match behaviour.rename_parameters(&mut |name: &str| session.parameter_name(name)) {
                Some(renamed) => copies.push(self.store.insert(renamed)),
                None => {
                    tracing::debug!(
                        behaviour = %id,
                        type_name = behaviour.type_name(),
                        "dropping unknown behaviour"
                    );
                    session.report.dropped_behaviours.push(DroppedBehaviour {
                        behaviour: *id,
                        type_name: behaviour.type_name().to_string(),
                    });
                }
            }
        }
        Ok(copies)
    }

    // -------------------------------------------------------------------------
    // Transitions
    // -------------------------------------------------------------------------

    fn retarget_machine(
        &mut self,
        session: &mut Session<'_>,
        index: &MachineIndex,
        source: ObjectId,
    ) -> Result<(), SpliceError> {
        let Some(entry) = index.get(&source) else {
            return Ok(());
        };
        let machine = self.store.machine(source)?.clone();

        for (child, (_, state_copy)) in machine.states.iter().zip(&entry.states) {
            let outgoing = self.store.state(child.state)?.transitions.clone();
            let transitions = self.copy_transitions(session, index, source, &outgoing)?;
            self.store.state_mut(*state_copy)?.transitions = transitions;
        }

        let entry_transitions =
            self.copy_transitions(session, index, source, &machine.entry_transitions)?;
        let any_state_transitions =
            self.copy_transitions(session, index, source, &machine.any_state_transitions)?;

        let mut machine_transitions = Vec::new();
        for side in &machine.machine_transitions {
            let transitions = self.copy_transitions(session, index, source, &side.transitions)?;
            match index.get(&side.machine) {
                Some(child) => machine_transitions.push(MachineTransitions {
                    machine: child.copy,
                    transitions,
                }),
                None => tracing::debug!(
                    machine = %side.machine,
                    "transitions from a machine outside the layer, skipping"
                ),
            }
        }

        let default_state = match machine.default_state {
            Some(id) => {
                let name = self.store.state(id)?.name.clone();
                find_state(index, source, &name)
            }
            None => None,
        };

        let copy = self.store.machine_mut(entry.copy)?;
        copy.entry_transitions = entry_transitions;
        copy.any_state_transitions = any_state_transitions;
        copy.machine_transitions = machine_transitions;
        copy.default_state = default_state;
        Ok(())
    }

    /// Copy the transitions `ids`, resolving destinations from `context`.
    fn copy_transitions(
        &mut self,
        session: &mut Session<'_>,
        index: &MachineIndex,
        context: ObjectId,
        ids: &[ObjectId],
    ) -> Result<Vec<ObjectId>, SpliceError> {
        let mut copies = Vec::with_capacity(ids.len());
        for id in ids {
            let transition = self.store.transition(*id)?.clone();
            let (destination, wanted) = match transition.destination {
                Destination::Exit => (Some(Destination::Exit), String::new()),
                Destination::State(target) => {
                    let name = self.store.state(target)?.name.clone();
                    (find_state(index, context, &name).map(Destination::State), name)
                }
                Destination::StateMachine(target) => {
                    let name = self.store.machine(target)?.name.clone();
                    (
                        find_machine(index, context, &name).map(Destination::StateMachine),
                        name,
                    )
                }
            };

            let Some(destination) = destination else {
                tracing::debug!(
                    transition = %id,
                    destination = %wanted,
                    "no counterpart for transition destination, dropping"
                );
                session.report.dropped_transitions.push(DroppedTransition {
                    transition: *id,
                    destination: wanted,
                });
                continue;
            };

            let conditions = transition
                .conditions
                .iter()
                .map(|condition| {
                    condition.renamed(&mut |name: &str| session.parameter_name(name))
                })
                .collect();
            copies.push(self.store.insert(Transition {
                destination,
                conditions,
                ..transition
            }));
        }
        Ok(copies)
    }
}

/// Source machines below `context`, depth first in child order.
fn descendants(index: &MachineIndex, context: ObjectId) -> Vec<ObjectId> {
    let mut out = Vec::new();
    let mut stack: Vec<ObjectId> = index
        .get(&context)
        .map(|entry| entry.children.iter().rev().map(|(_, id)| *id).collect())
        .unwrap_or_default();
    while let Some(current) = stack.pop() {
        out.push(current);
        if let Some(entry) = index.get(&current) {
            stack.extend(entry.children.iter().rev().map(|(_, id)| *id));
        }
    }
    out
}

fn ancestors(index: &MachineIndex, context: ObjectId) -> Vec<ObjectId> {
    let mut out = Vec::new();
    let mut current = index.get(&context).and_then(|entry| entry.parent);
    while let Some(id) = current {
        out.push(id);
        current = index.get(&id).and_then(|entry| entry.parent);
    }
    out
}

/// Copied state named `name`: own states, then descendants, then ancestors.
fn find_state(index: &MachineIndex, context: ObjectId, name: &str) -> Option<ObjectId> {
    std::iter::once(context)
        .chain(descendants(index, context))
        .chain(ancestors(index, context))
        .filter_map(|machine| index.get(&machine))
        .find_map(|entry| {
            entry
                .states
                .iter()
                .find(|(state, _)| state == name)
                .map(|(_, copy)| *copy)
        })
}

/// Copied child machine named `name`: own children, then descendants',
/// then ancestors'.
fn find_machine(index: &MachineIndex, context: ObjectId, name: &str) -> Option<ObjectId> {
    std::iter::once(context)
        .chain(descendants(index, context))
        .chain(ancestors(index, context))
        .filter_map(|machine| index.get(&machine))
        .find_map(|entry| {
            entry
                .children
                .iter()
                .find(|(child, _)| child == name)
                .and_then(|(_, source)| index.get(source))
                .map(|child| child.copy)
        })
}

// =============================================================================
// GUARDED TRANSITIONS
// =============================================================================

/// Where new transitions are attached.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransitionSource {
    State(ObjectId),
    /// The any-state list of a machine.
    AnyState(ObjectId),
    /// The entry list of a machine.
    Entry(ObjectId),
}

/// Materialise `guard` as transitions from `source` to `destination`.
///
/// The guard is simplified and each clause becomes one transition carrying
/// `template`'s timing and flags. A `false` guard adds nothing; a `true`
/// guard adds one unconditional transition.
pub fn add_guarded_transitions(
    store: &mut ObjectStore,
    source: TransitionSource,
    destination: Destination,
    guard: &Dnf,
    template: &Transition,
) -> Result<Vec<ObjectId>, SpliceError> {
    match source {
        TransitionSource::State(id) => {
            store.state(id)?;
        }
        TransitionSource::AnyState(id) | TransitionSource::Entry(id) => {
            store.machine(id)?;
        }
    }

    let created: Vec<ObjectId> = guard
        .simplify()
        .into_clauses()
        .into_iter()
        .map(|clause| {
            store.insert(Transition {
                destination,
                conditions: clause,
                ..template.clone()
            })
        })
        .collect();

    let list = match source {
        TransitionSource::State(id) => &mut store.state_mut(id)?.transitions,
        TransitionSource::AnyState(id) => &mut store.machine_mut(id)?.any_state_transitions,
        TransitionSource::Entry(id) => &mut store.machine_mut(id)?.entry_transitions,
    };
    list.extend(created.iter().copied());
    Ok(created)
}

// =============================================================================
// TESTS
// =============================================================================
