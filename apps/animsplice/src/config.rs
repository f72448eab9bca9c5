//! # Merge Configuration
//!
//! A merge is configured by a small TOML file:
//!
//! ```toml
//! layer_prefix = "Hat_"
//! parameter_prefix = "Hat_"
//! clip_name_prefix = "Hat_"
//! root_bindings_apply_to_avatar = true
//!
//! [[path_rule]]
//! from = "Armature"
//! to = "Hat/Armature"
//! ```
//!
//! Every field is optional. Clips are copied when there are path rules or a
//! clip name prefix; otherwise they are shared with the source.

use animsplice_core::{FnRewriter, PathClipRewrite, PathRewriter, SpliceError};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Maximum configuration file size (1 MB).
const MAX_CONFIG_FILE_SIZE: u64 = 1024 * 1024;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct MergeConfig {
    pub layer_prefix: String,
    pub parameter_prefix: String,
    pub clip_name_prefix: String,
    pub root_bindings_apply_to_avatar: bool,
    #[serde(rename = "path_rule")]
    pub path_rules: Vec<PathRuleConfig>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PathRuleConfig {
    pub from: String,
    pub to: String,
}

impl MergeConfig {
    pub fn from_toml(text: &str) -> Result<Self, SpliceError> {
        toml::from_str(text)
            .map_err(|e| SpliceError::DeserializationError(format!("Invalid merge config: {}", e)))
    }

    pub fn load(path: &Path) -> Result<Self, SpliceError> {
        let metadata = std::fs::metadata(path)
            .map_err(|e| SpliceError::IoError(format!("Cannot read config metadata: {}", e)))?;
        if metadata.len() > MAX_CONFIG_FILE_SIZE {
            return Err(SpliceError::DeserializationError(format!(
                "Config size {} bytes exceeds maximum allowed {} bytes",
                metadata.len(),
                MAX_CONFIG_FILE_SIZE
            )));
        }
        let text = std::fs::read_to_string(path)
            .map_err(|e| SpliceError::IoError(format!("Read config: {}", e)))?;
        Self::from_toml(&text)
    }

    /// The binding path rewriter described by the rules.
    pub fn path_rewriter(&self) -> PathRewriter {
        self.path_rules.iter().fold(
            PathRewriter::new().root_bindings_apply_to_avatar(self.root_bindings_apply_to_avatar),
            |rewriter, rule| rewriter.rule(rule.from.as_str(), rule.to.as_str()),
        )
    }

    /// Merge hooks: prefixes for names, clip copies when rules or a clip
    /// prefix are present.
    pub fn rewriter(&self) -> FnRewriter<'_> {
        let rewriter = FnRewriter::new()
            .with_layer(|name| format!("{}{}", self.layer_prefix, name))
            .with_parameter(|name| format!("{}{}", self.parameter_prefix, name));
        if self.path_rules.is_empty() && self.clip_name_prefix.is_empty() {
            return rewriter;
        }
        let clips = PathClipRewrite::new(self.path_rewriter())
            .with_name_prefix(self.clip_name_prefix.as_str());
        rewriter.with_path_rewrite(clips)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use animsplice_core::model::{Binding, Clip, FloatCurve};
    use animsplice_core::{MergeRewriter, ObjectStore, RewritePath};

    #[test]
    fn rules_keep_file_order() {
        let config = MergeConfig::from_toml(
            r#"
            [[path_rule]]
            from = "A"
            to = "B"

            [[path_rule]]
            from = "B/x"
            to = "C"
            "#,
        )
        .expect("parse");

        assert_eq!(config.path_rules.len(), 2);
        assert_eq!(config.path_rewriter().rewrite_path("A/x/y"), "C/y");
    }

    #[test]
    fn clip_prefix_without_rules_copies_clips() {
        let mut store = ObjectStore::new();
        let mut clip = Clip::new("Run");
        clip.set_float_curve(
            Binding::new("Armature/Hips", "Transform", "m_LocalPosition.y"),
            FloatCurve::constant(1.0),
        );
        let clip = store.insert(clip);

        let config = MergeConfig {
            clip_name_prefix: "Hat_".into(),
            ..MergeConfig::default()
        };
        let copy = config.rewriter().clip(&mut store, clip).expect("copy");
        assert_ne!(copy, clip);
        let copied = store.clip(copy).expect("copied clip");
        assert_eq!(copied.name, "Hat_Run");
        let paths: Vec<_> = copied.bindings().map(|b| b.path.as_str()).collect();
        assert_eq!(paths, vec!["Armature/Hips"]);

        let shared = MergeConfig::default().rewriter().clip(&mut store, clip).expect("share");
        assert_eq!(shared, clip);
    }

    #[test]
    fn unknown_keys_are_rejected() {
        assert!(MergeConfig::from_toml("layer_prefx = \"Hat_\"").is_err());
    }
}
