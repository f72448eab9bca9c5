//! # Property-Based Tests
//!
//! Algebraic laws of the guard algebra and determinism of the engine.

use animsplice_core::model::{
    Destination, Layer, Parameter, State, StateGraph, StateMachine, Transition,
};
use animsplice_core::{
    Assignment, Comparator, Condition, Dnf, FnRewriter, GraphMerger, ObjectStore,
    canonical_checksum,
};
use proptest::collection::vec;
use proptest::prelude::*;

// =============================================================================
// STRATEGIES
// =============================================================================

const PARAMETERS: [&str; 3] = ["a", "b", "c"];

fn comparator() -> impl Strategy<Value = Comparator> {
    prop_oneof![
        Just(Comparator::If),
        Just(Comparator::IfNot),
        Just(Comparator::Greater),
        Just(Comparator::Less),
        Just(Comparator::Equals),
        Just(Comparator::NotEqual),
    ]
}

fn condition() -> impl Strategy<Value = Condition> {
    (0usize..PARAMETERS.len(), comparator(), -3i8..=3).prop_map(|(p, comparator, t)| {
        Condition::new(PARAMETERS[p], comparator, f32::from(t))
    })
}

fn dnf() -> impl Strategy<Value = Dnf> {
    vec(vec(condition(), 0..4), 0..4).prop_map(Dnf::from_clauses)
}

fn assignment() -> impl Strategy<Value = Assignment> {
    vec(-4i8..=4, PARAMETERS.len()).prop_map(|values| {
        PARAMETERS
            .iter()
            .zip(values)
            .map(|(name, value)| (name.to_string(), f32::from(value)))
            .collect()
    })
}

// =============================================================================
// PROPERTY TESTS
// =============================================================================

proptest! {
    /// Simplifying twice changes nothing.
    #[test]
    fn simplify_is_idempotent(guard in dnf()) {
        let once = guard.simplify();
        prop_assert_eq!(once.simplify(), once);
    }

    /// Simplification never changes what a guard accepts.
    #[test]
    fn simplify_preserves_meaning(guard in dnf(), values in assignment()) {
        prop_assert_eq!(guard.simplify().evaluate(&values), guard.evaluate(&values));
    }

    /// Negation is the exact complement.
    #[test]
    fn negation_is_complement(guard in dnf(), values in assignment()) {
        prop_assert_eq!(guard.not().evaluate(&values), !guard.evaluate(&values));
    }

    /// Double negation restores the meaning of the guard.
    #[test]
    fn double_negation(guard in dnf(), values in assignment()) {
        prop_assert_eq!(guard.not().not().evaluate(&values), guard.evaluate(&values));
    }

    /// `and` and `or` agree with boolean conjunction and disjunction.
    #[test]
    fn connectives_are_pointwise(a in dnf(), b in dnf(), values in assignment()) {
        let left = a.evaluate(&values);
        let right = b.evaluate(&values);
        prop_assert_eq!(a.and(&b).evaluate(&values), left && right);
        prop_assert_eq!(a.or(&b).evaluate(&values), left || right);
    }

    /// The same merge on the same input produces the same store.
    #[test]
    fn merge_is_deterministic(
        state_count in 1usize..8,
        parameters in vec("[A-Z][a-z]{0,4}", 0..6),
    ) {
        let first = merged_store(state_count, &parameters);
        let second = merged_store(state_count, &parameters);
        prop_assert_eq!(
            canonical_checksum(&first).expect("first checksum"),
            canonical_checksum(&second).expect("second checksum")
        );
    }
}

/// A chain of `state_count` states guarded by the given parameters, merged
/// into an empty graph.
fn merged_store(state_count: usize, parameters: &[String]) -> ObjectStore {
    let mut store = ObjectStore::new();
    let mut graph = StateGraph::new("Source");
    for name in parameters {
        graph.parameters.insert_if_absent(Parameter::bool(name.as_str(), false));
    }

    let states: Vec<_> = (0..state_count)
        .map(|i| store.insert(State::new(format!("S{i}"))))
        .collect();
    for pair in states.windows(2) {
        let guard = parameters
            .iter()
            .map(|name| Condition::is_true(name.as_str()))
            .collect();
        let edge =
            store.insert(Transition::new(Destination::State(pair[1])).with_conditions(guard));
        store.state_mut(pair[0]).expect("state").transitions.push(edge);
    }

    let mut machine = StateMachine::new("Base");
    for state in &states {
        machine.add_state(*state);
    }
    let machine = store.insert(machine);
    graph.layers.push(Layer::new("Base", machine));
    let source = store.insert(graph);
    let dest = store.insert(StateGraph::new("Dest"));

    let mut rewriter = FnRewriter::new()
        .with_layer(|name| format!("Merged_{name}"))
        .with_parameter(|name| format!("Merged_{name}"));
    GraphMerger::new(&mut store)
        .merge(source, dest, &mut rewriter)
        .expect("merge");
    store
}
