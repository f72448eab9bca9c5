//! Avatar masks: per-layer lists of transform paths.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MaskEntry {
    pub path: String,
    #[serde(default = "active")]
    pub active: bool,
}

fn active() -> bool {
    true
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AvatarMask {
    pub name: String,
    #[serde(default)]
    pub transforms: Vec<MaskEntry>,
}

impl AvatarMask {
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            transforms: Vec::new(),
        }
    }

    pub fn add(&mut self, path: impl Into<String>, active: bool) {
        self.transforms.push(MaskEntry {
            path: path.into(),
            active,
        });
    }

    #[must_use]
    pub fn is_active(&self, path: &str) -> Option<bool> {
        self.transforms
            .iter()
            .find(|entry| entry.path == path)
            .map(|entry| entry.active)
    }
}
