//! State machines, states and transitions.
//!
//! A machine owns its states and child machines by id. Besides the plain
//! reference lists it keeps two side tables, the default state and the
//! per-child-machine transition lists, which the clone engine re-derives
//! after rewiring instead of copying.

use crate::condition::{Condition, Dnf};
use crate::types::{ObjectId, ObjectKind};
use serde::{Deserialize, Serialize};

use super::Reference;

/// Editor position of a node inside its machine.
pub type Position = [f32; 3];

// =============================================================================
// STATE MACHINE
// =============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChildState {
    pub state: ObjectId,
    #[serde(default)]
    pub position: Position,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChildMachine {
    pub machine: ObjectId,
    #[serde(default)]
    pub position: Position,
}

/// Transitions leaving a child machine, keyed by that child.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MachineTransitions {
    pub machine: ObjectId,
    pub transitions: Vec<ObjectId>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StateMachine {
    pub name: String,
    pub states: Vec<ChildState>,
    pub machines: Vec<ChildMachine>,
    pub default_state: Option<ObjectId>,
    pub entry_transitions: Vec<ObjectId>,
    pub any_state_transitions: Vec<ObjectId>,
    pub machine_transitions: Vec<MachineTransitions>,
    pub behaviours: Vec<ObjectId>,
    pub any_state_position: Position,
    pub entry_position: Position,
    pub exit_position: Position,
    pub parent_machine_position: Position,
}

impl StateMachine {
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    pub fn add_state(&mut self, state: ObjectId) {
        self.states.push(ChildState {
            state,
            position: Position::default(),
        });
    }

    pub fn add_machine(&mut self, machine: ObjectId) {
        self.machines.push(ChildMachine {
            machine,
            position: Position::default(),
        });
    }

    /// Transitions leaving the given child machine.
    #[must_use]
    pub fn transitions_from_machine(&self, machine: ObjectId) -> &[ObjectId] {
        self.machine_transitions
            .iter()
            .find(|entry| entry.machine == machine)
            .map(|entry| entry.transitions.as_slice())
            .unwrap_or_default()
    }

    /// Replace the transitions leaving the given child machine.
    pub fn set_transitions_from_machine(&mut self, machine: ObjectId, transitions: Vec<ObjectId>) {
        match self
            .machine_transitions
            .iter_mut()
            .find(|entry| entry.machine == machine)
        {
            Some(entry) => entry.transitions = transitions,
            None => self.machine_transitions.push(MachineTransitions {
                machine,
                transitions,
            }),
        }
    }

    pub fn state_ids(&self) -> impl Iterator<Item = ObjectId> + '_ {
        self.states.iter().map(|child| child.state)
    }

    pub fn machine_ids(&self) -> impl Iterator<Item = ObjectId> + '_ {
        self.machines.iter().map(|child| child.machine)
    }

    pub(crate) fn collect_references(&self, out: &mut Vec<Reference>) {
        out.extend(
            self.state_ids()
                .map(|id| Reference::new(id, &[ObjectKind::State])),
        );
        out.extend(
            self.machine_ids()
                .map(|id| Reference::new(id, &[ObjectKind::StateMachine])),
        );
        for id in self
            .entry_transitions
            .iter()
            .chain(self.any_state_transitions.iter())
        {
            out.push(Reference::new(*id, &[ObjectKind::Transition]));
        }
        out.extend(
            self.behaviours
                .iter()
                .map(|id| Reference::new(*id, &[ObjectKind::Behaviour])),
        );
        // Side tables are followed too, so their targets get discovered.
        if let Some(id) = self.default_state {
            out.push(Reference::new(id, &[ObjectKind::State]));
        }
        for entry in &self.machine_transitions {
            out.push(Reference::new(entry.machine, &[ObjectKind::StateMachine]));
            out.extend(
                entry
                    .transitions
                    .iter()
                    .map(|id| Reference::new(*id, &[ObjectKind::Transition])),
            );
        }
    }

    pub(crate) fn remap_references(&mut self, map: &mut dyn FnMut(ObjectId) -> ObjectId) {
        for child in &mut self.states {
            child.state = map(child.state);
        }
        for child in &mut self.machines {
            child.machine = map(child.machine);
        }
        for id in self
            .entry_transitions
            .iter_mut()
            .chain(self.any_state_transitions.iter_mut())
            .chain(self.behaviours.iter_mut())
        {
            *id = map(*id);
        }
    }

    pub(crate) fn clear_associations(&mut self) {
        self.default_state = None;
        self.machine_transitions.clear();
    }

    /// Re-derive the side tables of `original` through `map`.
    pub(crate) fn restore_associations(
        &mut self,
        original: &Self,
        map: &mut dyn FnMut(ObjectId) -> ObjectId,
    ) {
        self.default_state = original.default_state.map(&mut *map);
        self.machine_transitions = original
            .machine_transitions
            .iter()
            .map(|entry| MachineTransitions {
                machine: map(entry.machine),
                transitions: entry.transitions.iter().map(|id| map(*id)).collect(),
            })
            .collect();
    }
}

// =============================================================================
// STATE
// =============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct State {
    pub name: String,
    pub motion: Option<ObjectId>,
    pub speed: f32,
    pub speed_parameter: Option<String>,
    pub cycle_offset: f32,
    pub cycle_offset_parameter: Option<String>,
    pub mirror: bool,
    pub mirror_parameter: Option<String>,
    pub time_parameter: Option<String>,
    pub write_default_values: bool,
    pub ik_on_feet: bool,
    pub tag: String,
    pub transitions: Vec<ObjectId>,
    pub behaviours: Vec<ObjectId>,
}

impl Default for State {
    fn default() -> Self {
        Self {
            name: String::new(),
            motion: None,
            speed: 1.0,
            speed_parameter: None,
            cycle_offset: 0.0,
            cycle_offset_parameter: None,
            mirror: false,
            mirror_parameter: None,
            time_parameter: None,
            write_default_values: true,
            ik_on_feet: false,
            tag: String::new(),
            transitions: Vec::new(),
            behaviours: Vec::new(),
        }
    }
}

impl State {
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_motion(mut self, motion: ObjectId) -> Self {
        self.motion = Some(motion);
        self
    }

    pub(crate) fn collect_references(&self, out: &mut Vec<Reference>) {
        if let Some(motion) = self.motion {
            out.push(Reference::new(motion, ObjectKind::MOTIONS));
        }
        out.extend(
            self.transitions
                .iter()
                .map(|id| Reference::new(*id, &[ObjectKind::Transition])),
        );
        out.extend(
            self.behaviours
                .iter()
                .map(|id| Reference::new(*id, &[ObjectKind::Behaviour])),
        );
    }

    pub(crate) fn remap_references(&mut self, map: &mut dyn FnMut(ObjectId) -> ObjectId) {
        self.motion = self.motion.map(&mut *map);
        for id in self.transitions.iter_mut().chain(self.behaviours.iter_mut()) {
            *id = map(*id);
        }
    }
}

// =============================================================================
// TRANSITION
// =============================================================================

/// Where a transition leads.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Destination {
    Exit,
    State(ObjectId),
    StateMachine(ObjectId),
}

impl Destination {
    #[must_use]
    pub fn object(self) -> Option<ObjectId> {
        match self {
            Self::Exit => None,
            Self::State(id) | Self::StateMachine(id) => Some(id),
        }
    }
}

/// Which transitions may interrupt an active transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum InterruptionSource {
    #[default]
    None,
    Source,
    Destination,
    SourceThenDestination,
    DestinationThenSource,
}

/// Duration and exit-time policy of a transition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TransitionTiming {
    pub has_exit_time: bool,
    pub exit_time: f32,
    pub has_fixed_duration: bool,
    pub duration: f32,
    pub offset: f32,
    pub interruption_source: InterruptionSource,
    pub ordered_interruption: bool,
    pub can_transition_to_self: bool,
}

impl Default for TransitionTiming {
    fn default() -> Self {
        Self {
            has_exit_time: false,
            exit_time: 0.0,
            has_fixed_duration: true,
            duration: 0.0,
            offset: 0.0,
            interruption_source: InterruptionSource::None,
            ordered_interruption: true,
            can_transition_to_self: false,
        }
    }
}

/// A guarded edge. One transition carries one conjunction of conditions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transition {
    #[serde(default)]
    pub name: String,
    pub destination: Destination,
    #[serde(default)]
    pub conditions: Vec<Condition>,
    #[serde(default)]
    pub timing: TransitionTiming,
    #[serde(default)]
    pub solo: bool,
    #[serde(default)]
    pub mute: bool,
}

impl Transition {
    /// An unconditional, instant transition.
    #[must_use]
    pub fn new(destination: Destination) -> Self {
        Self {
            name: String::new(),
            destination,
            conditions: Vec::new(),
            timing: TransitionTiming::default(),
            solo: false,
            mute: false,
        }
    }

    #[must_use]
    pub fn with_conditions(mut self, conditions: Vec<Condition>) -> Self {
        self.conditions = conditions;
        self
    }

    /// This edge's guard as a one-clause DNF.
    #[must_use]
    pub fn guard(&self) -> Dnf {
        Dnf::from_clauses(vec![self.conditions.clone()])
    }

    pub(crate) fn collect_references(&self, out: &mut Vec<Reference>) {
        match self.destination {
            Destination::Exit => {}
            Destination::State(id) => out.push(Reference::new(id, &[ObjectKind::State])),
            Destination::StateMachine(id) => {
                out.push(Reference::new(id, &[ObjectKind::StateMachine]));
            }
        }
    }

    pub(crate) fn remap_references(&mut self, map: &mut dyn FnMut(ObjectId) -> ObjectId) {
        self.destination = match self.destination {
            Destination::Exit => Destination::Exit,
            Destination::State(id) => Destination::State(map(id)),
            Destination::StateMachine(id) => Destination::StateMachine(map(id)),
        };
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn machine_transition_side_table() {
        let mut machine = StateMachine::new("Root");
        let child = ObjectId(7);
        assert!(machine.transitions_from_machine(child).is_empty());

        machine.set_transitions_from_machine(child, vec![ObjectId(8)]);
        machine.set_transitions_from_machine(child, vec![ObjectId(9), ObjectId(10)]);

        assert_eq!(
            machine.transitions_from_machine(child),
            &[ObjectId(9), ObjectId(10)]
        );
        assert_eq!(machine.machine_transitions.len(), 1);
    }

    #[test]
    fn associations_are_restored_through_map() {
        let mut original = StateMachine::new("Root");
        original.default_state = Some(ObjectId(1));
        original.set_transitions_from_machine(ObjectId(2), vec![ObjectId(3)]);

        let mut copy = original.clone();
        copy.clear_associations();
        assert!(copy.default_state.is_none());

        copy.restore_associations(&original, &mut |id| ObjectId(id.0 + 100));
        assert_eq!(copy.default_state, Some(ObjectId(101)));
        assert_eq!(copy.transitions_from_machine(ObjectId(102)), &[ObjectId(103)]);
    }

    #[test]
    fn state_defaults() {
        let state = State::new("Idle");
        assert_eq!(state.speed, 1.0);
        assert!(state.write_default_values);
        assert!(state.motion.is_none());
    }

    #[test]
    fn transition_guard_is_single_clause() {
        let transition = Transition::new(Destination::Exit)
            .with_conditions(vec![Condition::greater("Speed", 0.0)]);
        assert_eq!(transition.guard().clauses().len(), 1);
    }
}
