//! Blend trees: interior motion nodes blending children by float parameters.

use crate::types::{ObjectId, ObjectKind};
use serde::{Deserialize, Serialize};

use super::Reference;

/// Layout of a blend tree's blend space.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum BlendType {
    #[default]
    Simple1D,
    SimpleDirectional2D,
    FreeformDirectional2D,
    FreeformCartesian2D,
    /// Every child has its own weight parameter.
    Direct,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChildMotion {
    pub motion: Option<ObjectId>,
    pub threshold: f32,
    pub position: [f32; 2],
    pub time_scale: f32,
    pub cycle_offset: f32,
    /// Weight parameter, used by `BlendType::Direct` trees.
    pub direct_blend_parameter: Option<String>,
    pub mirror: bool,
}

impl Default for ChildMotion {
    fn default() -> Self {
        Self {
            motion: None,
            threshold: 0.0,
            position: [0.0, 0.0],
            time_scale: 1.0,
            cycle_offset: 0.0,
            direct_blend_parameter: None,
            mirror: false,
        }
    }
}

impl ChildMotion {
    #[must_use]
    pub fn new(motion: ObjectId, threshold: f32) -> Self {
        Self {
            motion: Some(motion),
            threshold,
            ..Self::default()
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BlendTree {
    pub name: String,
    pub blend_type: BlendType,
    pub blend_parameter: String,
    pub blend_parameter_y: String,
    pub min_threshold: f32,
    pub max_threshold: f32,
    pub use_automatic_thresholds: bool,
    pub children: Vec<ChildMotion>,
}

impl Default for BlendTree {
    fn default() -> Self {
        Self {
            name: String::new(),
            blend_type: BlendType::Simple1D,
            blend_parameter: String::new(),
            blend_parameter_y: String::new(),
            min_threshold: 0.0,
            max_threshold: 1.0,
            use_automatic_thresholds: false,
            children: Vec::new(),
        }
    }
}

impl BlendTree {
    #[must_use]
    pub fn new(name: impl Into<String>, blend_parameter: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            blend_parameter: blend_parameter.into(),
            ..Self::default()
        }
    }

    pub fn add_child(&mut self, child: ChildMotion) {
        self.children.push(child);
    }

    /// Rename every parameter this tree names (blend axes and direct weights).
    ///
    /// Empty names stay empty: an unused axis is not a parameter.
    pub fn rename_parameters(&mut self, rename: &mut dyn FnMut(&str) -> String) {
        for name in [&mut self.blend_parameter, &mut self.blend_parameter_y] {
            if !name.is_empty() {
                *name = rename(name);
            }
        }
        for child in &mut self.children {
            if let Some(parameter) = child.direct_blend_parameter.as_mut() {
                *parameter = rename(parameter);
            }
        }
    }

    pub(crate) fn collect_references(&self, out: &mut Vec<Reference>) {
        out.extend(
            self.children
                .iter()
                .filter_map(|child| child.motion)
                .map(|id| Reference::new(id, ObjectKind::MOTIONS)),
        );
    }

    pub(crate) fn remap_references(&mut self, map: &mut dyn FnMut(ObjectId) -> ObjectId) {
        for child in &mut self.children {
            child.motion = child.motion.map(&mut *map);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rename_skips_unused_axis() {
        let mut tree = BlendTree::new("Move", "Speed");
        let mut child = ChildMotion::new(ObjectId(1), 0.0);
        child.direct_blend_parameter = Some("Weight".into());
        tree.add_child(child);

        tree.rename_parameters(&mut |name| format!("Foo_{name}"));

        assert_eq!(tree.blend_parameter, "Foo_Speed");
        assert_eq!(tree.blend_parameter_y, "");
        assert_eq!(
            tree.children[0].direct_blend_parameter.as_deref(),
            Some("Foo_Weight")
        );
    }
}
