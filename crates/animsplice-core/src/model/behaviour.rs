//! State behaviours: side-effecting annotations attached to states and machines.
//!
//! Behaviours are a closed set. Each known kind knows which of its fields name
//! a parameter; anything the engine does not recognise is kept as
//! [`Behaviour::Unknown`] and is dropped when a graph is spliced.

use serde::{Deserialize, Serialize};

/// What a driver entry does to its target parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum DriverOperation {
    #[default]
    Set,
    Add,
    Random,
    Copy,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DriverEntry {
    pub operation: DriverOperation,
    /// Target parameter.
    pub name: String,
    /// Source parameter, used by `Copy`.
    pub source: String,
    pub value: f32,
    pub value_min: f32,
    pub value_max: f32,
    pub chance: f32,
    pub convert_range: bool,
    pub source_min: f32,
    pub source_max: f32,
    pub dest_min: f32,
    pub dest_max: f32,
}

impl Default for DriverEntry {
    fn default() -> Self {
        Self {
            operation: DriverOperation::Set,
            name: String::new(),
            source: String::new(),
            value: 0.0,
            value_min: 0.0,
            value_max: 1.0,
            chance: 1.0,
            convert_range: false,
            source_min: 0.0,
            source_max: 0.0,
            dest_min: 0.0,
            dest_max: 0.0,
        }
    }
}

impl DriverEntry {
    #[must_use]
    pub fn set(name: impl Into<String>, value: f32) -> Self {
        Self {
            name: name.into(),
            value,
            ..Self::default()
        }
    }

    #[must_use]
    pub fn copy(source: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            operation: DriverOperation::Copy,
            name: name.into(),
            source: source.into(),
            ..Self::default()
        }
    }
}

/// Which playable layer a layer-control behaviour targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum PlayableLayer {
    #[default]
    Action,
    Fx,
    Gesture,
    Additive,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Behaviour {
    /// Writes parameters when the owning state is entered.
    ParameterDriver {
        #[serde(default)]
        local_only: bool,
        #[serde(default)]
        debug_string: String,
        #[serde(default)]
        entries: Vec<DriverEntry>,
    },
    /// Fades a playable layer's weight.
    LayerControl {
        #[serde(default)]
        playable: PlayableLayer,
        #[serde(default)]
        layer: i32,
        #[serde(default)]
        goal_weight: f32,
        #[serde(default)]
        blend_duration: f32,
        #[serde(default)]
        debug_string: String,
    },
    LocomotionControl {
        #[serde(default)]
        disable_locomotion: bool,
    },
    /// A behaviour kind this engine does not model.
    Unknown { type_name: String },
}

impl Behaviour {
    /// Short kind label for diagnostics.
    #[must_use]
    pub fn type_name(&self) -> &str {
        match self {
            Self::ParameterDriver { .. } => "ParameterDriver",
            Self::LayerControl { .. } => "LayerControl",
            Self::LocomotionControl { .. } => "LocomotionControl",
            Self::Unknown { type_name } => type_name,
        }
    }

    /// Copy of this behaviour with every parameter-naming field renamed.
    ///
    /// Returns `None` for [`Behaviour::Unknown`].
    #[must_use]
    pub fn rename_parameters(&self, rename: &mut dyn FnMut(&str) -> String) -> Option<Self> {
        match self {
            Self::ParameterDriver {
                local_only,
                debug_string,
                entries,
            } => Some(Self::ParameterDriver {
                local_only: *local_only,
                debug_string: debug_string.clone(),
                entries: entries
                    .iter()
                    .map(|entry| {
                        let mut entry = entry.clone();
                        entry.name = rename(&entry.name);
                        if !entry.source.is_empty() {
                            entry.source = rename(&entry.source);
                        }
                        entry
                    })
                    .collect(),
            }),
            Self::LayerControl { .. } | Self::LocomotionControl { .. } => Some(self.clone()),
            Self::Unknown { .. } => None,
        }
    }
}
