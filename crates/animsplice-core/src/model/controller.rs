//! State graphs (controllers): the flat parameter namespace and the layer list.

use crate::types::{ObjectId, ObjectKind};
use serde::{Deserialize, Serialize};

use super::Reference;

// =============================================================================
// PARAMETERS
// =============================================================================

/// Type of a graph parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum ParameterType {
    Bool,
    Int,
    Float,
    Trigger,
}

/// A named, typed variable shared by every layer of a graph.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Parameter {
    pub name: String,
    #[serde(rename = "type")]
    pub ty: ParameterType,
    #[serde(default)]
    pub default_float: f32,
    #[serde(default)]
    pub default_int: i32,
    #[serde(default)]
    pub default_bool: bool,
}

impl Parameter {
    /// Create a parameter with zeroed defaults.
    #[must_use]
    pub fn new(name: impl Into<String>, ty: ParameterType) -> Self {
        Self {
            name: name.into(),
            ty,
            default_float: 0.0,
            default_int: 0,
            default_bool: false,
        }
    }

    #[must_use]
    pub fn float(name: impl Into<String>, default: f32) -> Self {
        Self {
            default_float: default,
            ..Self::new(name, ParameterType::Float)
        }
    }

    #[must_use]
    pub fn int(name: impl Into<String>, default: i32) -> Self {
        Self {
            default_int: default,
            ..Self::new(name, ParameterType::Int)
        }
    }

    #[must_use]
    pub fn bool(name: impl Into<String>, default: bool) -> Self {
        Self {
            default_bool: default,
            ..Self::new(name, ParameterType::Bool)
        }
    }
}

/// The flat parameter namespace of one graph, in declaration order.
///
/// Names are unique: inserting a name that already exists keeps the
/// existing declaration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ParameterTable {
    entries: Vec<Parameter>,
}

impl ParameterTable {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Parameter> {
        self.entries.iter().find(|p| p.name == name)
    }

    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    /// Insert unless a parameter with that name exists (first write wins).
    ///
    /// Returns `true` if the parameter was added.
    pub fn insert_if_absent(&mut self, parameter: Parameter) -> bool {
        if self.contains(&parameter.name) {
            return false;
        }
        self.entries.push(parameter);
        true
    }

    pub fn iter(&self) -> impl Iterator<Item = &Parameter> {
        self.entries.iter()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

// =============================================================================
// LAYERS
// =============================================================================

/// How a layer combines with the layers below it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum LayerBlending {
    #[default]
    Override,
    Additive,
}

/// One top-level layer: a root state machine plus layer-wide settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Layer {
    pub name: String,
    pub state_machine: ObjectId,
    #[serde(default)]
    pub avatar_mask: Option<ObjectId>,
    #[serde(default)]
    pub blending: LayerBlending,
    #[serde(default = "default_weight")]
    pub default_weight: f32,
    #[serde(default)]
    pub ik_pass: bool,
    #[serde(default = "no_synced_layer")]
    pub synced_layer_index: i32,
    #[serde(default)]
    pub synced_layer_affects_timing: bool,
}

fn default_weight() -> f32 {
    1.0
}

fn no_synced_layer() -> i32 {
    -1
}

impl Layer {
    /// A full-weight override layer without mask.
    #[must_use]
    pub fn new(name: impl Into<String>, state_machine: ObjectId) -> Self {
        Self {
            name: name.into(),
            state_machine,
            avatar_mask: None,
            blending: LayerBlending::Override,
            default_weight: default_weight(),
            ik_pass: false,
            synced_layer_index: no_synced_layer(),
            synced_layer_affects_timing: false,
        }
    }
}

// =============================================================================
// STATE GRAPH
// =============================================================================

/// A complete graph: parameters and layers.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StateGraph {
    pub name: String,
    #[serde(default)]
    pub parameters: ParameterTable,
    #[serde(default)]
    pub layers: Vec<Layer>,
}

impl StateGraph {
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn parameter(&self, name: &str) -> Option<&Parameter> {
        self.parameters.get(name)
    }

    /// Declare a parameter. Returns `false` if the name is already taken.
    pub fn add_parameter(&mut self, parameter: Parameter) -> bool {
        self.parameters.insert_if_absent(parameter)
    }

    pub(crate) fn collect_references(&self, out: &mut Vec<Reference>) {
        for layer in &self.layers {
            out.push(Reference::new(layer.state_machine, &[ObjectKind::StateMachine]));
            if let Some(mask) = layer.avatar_mask {
                out.push(Reference::new(mask, &[ObjectKind::AvatarMask]));
            }
        }
    }

    pub(crate) fn remap_references(&mut self, map: &mut dyn FnMut(ObjectId) -> ObjectId) {
        for layer in &mut self.layers {
            layer.state_machine = map(layer.state_machine);
            layer.avatar_mask = layer.avatar_mask.map(&mut *map);
        }
    }
}

// =============================================================================
// TESTS
// =============================================================================
