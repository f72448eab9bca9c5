//! # Curve Store
//!
//! A clip is a flat mapping from curve bindings to curves, split into numeric
//! curves and object-reference curves. Writing a binding creates or fully
//! replaces its curve; removing a binding deletes it entirely. Bindings are
//! kept in key order, so iteration is deterministic.

use crate::types::{ObjectId, ObjectKind};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::Reference;

// =============================================================================
// BINDINGS & CURVES
// =============================================================================

/// Identifies one animatable property: `(objectPath, componentType, propertyName)`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Binding {
    /// `/`-joined path relative to the clip's root; empty for the root itself.
    pub path: String,
    pub component: String,
    pub property: String,
}

impl Binding {
    #[must_use]
    pub fn new(
        path: impl Into<String>,
        component: impl Into<String>,
        property: impl Into<String>,
    ) -> Self {
        Self {
            path: path.into(),
            component: component.into(),
            property: property.into(),
        }
    }

    /// Same property on a different object path.
    #[must_use]
    pub fn with_path(&self, path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            component: self.component.clone(),
            property: self.property.clone(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Keyframe {
    pub time: f32,
    pub value: f32,
    #[serde(default)]
    pub in_tangent: f32,
    #[serde(default)]
    pub out_tangent: f32,
}

/// Time -> float curve.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FloatCurve {
    pub keys: Vec<Keyframe>,
}

impl FloatCurve {
    /// A curve holding `value` from time zero.
    #[must_use]
    pub fn constant(value: f32) -> Self {
        Self {
            keys: vec![Keyframe {
                time: 0.0,
                value,
                in_tangent: 0.0,
                out_tangent: 0.0,
            }],
        }
    }

    /// Value of the first key, if any.
    #[must_use]
    pub fn first_value(&self) -> Option<f32> {
        self.keys.first().map(|k| k.value)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ObjectKeyframe {
    pub time: f32,
    pub value: Option<ObjectId>,
}

/// Time -> object reference curve.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ObjectCurve {
    pub keys: Vec<ObjectKeyframe>,
}

impl ObjectCurve {
    /// A curve holding `value` from time zero.
    #[must_use]
    pub fn constant(value: Option<ObjectId>) -> Self {
        Self {
            keys: vec![ObjectKeyframe { time: 0.0, value }],
        }
    }
}

/// Either kind of curve, borrowed.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum CurveRef<'a> {
    Float(&'a FloatCurve),
    Object(&'a ObjectCurve),
}

// =============================================================================
// CLIP
// =============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Clip {
    pub name: String,
    #[serde(default)]
    pub looping: bool,
    #[serde(default = "default_frame_rate")]
    pub frame_rate: f32,
    #[serde(default, with = "crate::formats::entries")]
    float_curves: BTreeMap<Binding, FloatCurve>,
    #[serde(default, with = "crate::formats::entries")]
    object_curves: BTreeMap<Binding, ObjectCurve>,
}

fn default_frame_rate() -> f32 {
    60.0
}

impl Default for Clip {
    fn default() -> Self {
        Self::new("")
    }
}

impl Clip {
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            looping: false,
            frame_rate: default_frame_rate(),
            float_curves: BTreeMap::new(),
            object_curves: BTreeMap::new(),
        }
    }

    // -- numeric curves -----------------------------------------------------

    #[must_use]
    pub fn float_curve(&self, binding: &Binding) -> Option<&FloatCurve> {
        self.float_curves.get(binding)
    }

    /// Create or fully replace a numeric curve. Returns the replaced curve.
    pub fn set_float_curve(&mut self, binding: Binding, curve: FloatCurve) -> Option<FloatCurve> {
        self.float_curves.insert(binding, curve)
    }

    pub fn remove_float_curve(&mut self, binding: &Binding) -> Option<FloatCurve> {
        self.float_curves.remove(binding)
    }

    pub fn float_curves(&self) -> impl Iterator<Item = (&Binding, &FloatCurve)> {
        self.float_curves.iter()
    }

    // -- object-reference curves -------------------------------------------

    #[must_use]
    pub fn object_curve(&self, binding: &Binding) -> Option<&ObjectCurve> {
        self.object_curves.get(binding)
    }

    /// Create or fully replace an object curve. Returns the replaced curve.
    pub fn set_object_curve(
        &mut self,
        binding: Binding,
        curve: ObjectCurve,
    ) -> Option<ObjectCurve> {
        self.object_curves.insert(binding, curve)
    }

    pub fn remove_object_curve(&mut self, binding: &Binding) -> Option<ObjectCurve> {
        self.object_curves.remove(binding)
    }

    pub fn object_curves(&self) -> impl Iterator<Item = (&Binding, &ObjectCurve)> {
        self.object_curves.iter()
    }

    // -- uniform access -----------------------------------------------------

    /// Look a binding up in either curve set.
    #[must_use]
    pub fn curve(&self, binding: &Binding) -> Option<CurveRef<'_>> {
        self.float_curves
            .get(binding)
            .map(CurveRef::Float)
            .or_else(|| self.object_curves.get(binding).map(CurveRef::Object))
    }

    /// Every binding, numeric first, each set in key order.
    pub fn bindings(&self) -> impl Iterator<Item = &Binding> {
        self.float_curves.keys().chain(self.object_curves.keys())
    }

    #[must_use]
    pub fn curve_count(&self) -> usize {
        self.float_curves.len().saturating_add(self.object_curves.len())
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.float_curves.is_empty() && self.object_curves.is_empty()
    }

    /// Remove and return all numeric curves in key order.
    pub fn take_float_curves(&mut self) -> Vec<(Binding, FloatCurve)> {
        std::mem::take(&mut self.float_curves).into_iter().collect()
    }

    /// Remove and return all object curves in key order.
    pub fn take_object_curves(&mut self) -> Vec<(Binding, ObjectCurve)> {
        std::mem::take(&mut self.object_curves).into_iter().collect()
    }

    pub(crate) fn collect_references(&self, out: &mut Vec<Reference>) {
        for curve in self.object_curves.values() {
            out.extend(
                curve
                    .keys
                    .iter()
                    .filter_map(|key| key.value)
                    .map(|id| Reference::new(id, &[ObjectKind::Asset])),
            );
        }
    }

    pub(crate) fn remap_references(&mut self, map: &mut dyn FnMut(ObjectId) -> ObjectId) {
        for curve in self.object_curves.values_mut() {
            for key in &mut curve.keys {
                key.value = key.value.map(&mut *map);
            }
        }
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn position_x(path: &str) -> Binding {
        Binding::new(path, "Transform", "m_LocalPosition.x")
    }

    #[test]
    fn write_replaces_whole_curve() {
        let mut clip = Clip::new("Wave");
        let binding = position_x("Arm");

        assert!(clip.set_float_curve(binding.clone(), FloatCurve::constant(1.0)).is_none());
        let previous = clip.set_float_curve(binding.clone(), FloatCurve::constant(2.0));

        assert_eq!(previous.and_then(|c| c.first_value()), Some(1.0));
        let current = clip.float_curve(&binding).expect("curve");
        assert_eq!(current.keys.len(), 1);
        assert_eq!(current.first_value(), Some(2.0));
    }

    #[test]
    fn remove_deletes_binding() {
        let mut clip = Clip::new("Wave");
        let binding = position_x("Arm");
        clip.set_float_curve(binding.clone(), FloatCurve::constant(1.0));

        assert!(clip.remove_float_curve(&binding).is_some());
        assert!(clip.curve(&binding).is_none());
        assert!(clip.is_empty());
    }

    #[test]
    fn numeric_and_object_curves_are_separate() {
        let mut clip = Clip::new("Swap");
        let material = Binding::new("Body", "SkinnedMeshRenderer", "m_Materials.Array.data[0]");
        clip.set_object_curve(material.clone(), ObjectCurve::constant(Some(ObjectId(4))));

        assert!(clip.float_curve(&material).is_none());
        assert!(matches!(clip.curve(&material), Some(CurveRef::Object(_))));
        assert_eq!(clip.curve_count(), 1);
    }

    #[test]
    fn bindings_iterate_in_key_order() {
        let mut clip = Clip::new("Order");
        clip.set_float_curve(position_x("b"), FloatCurve::constant(0.0));
        clip.set_float_curve(position_x("a"), FloatCurve::constant(0.0));

        let paths: Vec<_> = clip.bindings().map(|b| b.path.as_str()).collect();
        assert_eq!(paths, vec!["a", "b"]);
    }
}
