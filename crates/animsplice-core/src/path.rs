//! # Path Rewriter
//!
//! Rewrites the object paths of curve bindings and mask entries after objects
//! move within a hierarchy.
//!
//! Paths are `/`-delimited and relative to a root. [`join`] normalises them:
//! `.` and empty segments are dropped, `..` pops one segment, and a segment
//! list that starts with `/` discards everything accumulated before it.
//!
//! Two rewriters implement [`RewritePath`]:
//! - [`PathRewriter`]: an optional container prefix followed by ordered
//!   `(from, to)` prefix rules.
//! - [`NearestMatchRewriter`]: for clips authored against an unrelated
//!   hierarchy, anchors each path at the nearest ancestor under which it
//!   resolves to a real object.

use crate::model::{AvatarMask, Binding, Clip, MaskEntry};
use crate::primitives::{CURRENT_SEGMENT, PARENT_SEGMENT, PATH_SEPARATOR};
use crate::SpliceError;
use std::collections::BTreeSet;

// =============================================================================
// JOIN / NORMALISE
// =============================================================================

/// Join path fragments left to right and normalise the result.
///
/// A `..` with nothing left to pop (or whose predecessor is itself `..`) is
/// kept, so paths that escape the root stay distinguishable.
#[must_use]
pub fn join_all(parts: &[&str]) -> String {
    let mut segments: Vec<&str> = Vec::new();
    for part in parts {
        if part.starts_with(PATH_SEPARATOR) {
            segments.clear();
        }
        for segment in part.split(PATH_SEPARATOR) {
            match segment {
                "" | CURRENT_SEGMENT => {}
                PARENT_SEGMENT => match segments.last() {
                    Some(last) if *last != PARENT_SEGMENT => {
                        segments.pop();
                    }
                    _ => segments.push(PARENT_SEGMENT),
                },
                name => segments.push(name),
            }
        }
    }
    segments.join("/")
}

#[must_use]
pub fn join(base: &str, relative: &str) -> String {
    join_all(&[base, relative])
}

#[must_use]
pub fn normalize(path: &str) -> String {
    join_all(&[path])
}

/// The remainder of `path` below `prefix`, if `prefix` covers it.
fn strip_prefix<'a>(path: &'a str, prefix: &str) -> Option<&'a str> {
    if prefix.is_empty() {
        return Some(path);
    }
    match path.strip_prefix(prefix)? {
        "" => Some(""),
        rest => rest.strip_prefix(PATH_SEPARATOR),
    }
}

// =============================================================================
// OBJECT HIERARCHY
// =============================================================================

/// Read access to a tree of named objects, addressed by node index.
pub trait ObjectHierarchy {
    fn parent(&self, node: usize) -> Option<usize>;

    /// Name of `node`, or `None` if the node does not exist.
    fn name(&self, node: usize) -> Option<&str>;

    /// First child of `node` with the given name.
    fn child(&self, node: usize, name: &str) -> Option<usize>;

    fn contains(&self, node: usize) -> bool {
        self.name(node).is_some()
    }

    /// Resolve a relative path from `from`.
    fn find(&self, from: usize, path: &str) -> Option<usize> {
        if !self.contains(from) {
            return None;
        }
        let normalized = normalize(path);
        let mut current = from;
        for segment in normalized.split(PATH_SEPARATOR).filter(|s| !s.is_empty()) {
            current = if segment == PARENT_SEGMENT {
                self.parent(current)?
            } else {
                self.child(current, segment)?
            };
        }
        Some(current)
    }
}

#[derive(Debug, Clone)]
struct HierarchyEntry {
    name: String,
    parent: Option<usize>,
    children: Vec<usize>,
}

/// In-memory [`ObjectHierarchy`]. Node `0` is the root.
#[derive(Debug, Clone)]
pub struct Hierarchy {
    entries: Vec<HierarchyEntry>,
}

impl Hierarchy {
    pub const ROOT: usize = 0;

    #[must_use]
    pub fn new(root_name: impl Into<String>) -> Self {
        Self {
            entries: vec![HierarchyEntry {
                name: root_name.into(),
                parent: None,
                children: Vec::new(),
            }],
        }
    }

    pub fn add_child(
        &mut self,
        parent: usize,
        name: impl Into<String>,
    ) -> Result<usize, SpliceError> {
        let index = self.entries.len();
        self.entries
            .get_mut(parent)
            .ok_or(SpliceError::HierarchyNodeNotFound(parent))?
            .children
            .push(index);
        self.entries.push(HierarchyEntry {
            name: name.into(),
            parent: Some(parent),
            children: Vec::new(),
        });
        Ok(index)
    }

    /// Create every missing node along `path` below `from`. Returns the last.
    pub fn add_path(&mut self, from: usize, path: &str) -> Result<usize, SpliceError> {
        let mut current = from;
        for segment in normalize(path).split(PATH_SEPARATOR).filter(|s| !s.is_empty()) {
            current = match self.child(current, segment) {
                Some(existing) => existing,
                None => self.add_child(current, segment)?,
            };
        }
        Ok(current)
    }

    /// Path of `node` relative to the hierarchy root.
    pub fn path_of(&self, node: usize) -> Result<String, SpliceError> {
        relative_path(self, Self::ROOT, node)
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

impl ObjectHierarchy for Hierarchy {
    fn parent(&self, node: usize) -> Option<usize> {
        self.entries.get(node).and_then(|entry| entry.parent)
    }

    fn name(&self, node: usize) -> Option<&str> {
        self.entries.get(node).map(|entry| entry.name.as_str())
    }

    fn child(&self, node: usize, name: &str) -> Option<usize> {
        self.entries
            .get(node)?
            .children
            .iter()
            .copied()
            .find(|child| self.name(*child) == Some(name))
    }
}

/// Path from `root` down to `object`.
///
/// Fails with `NotAnAncestor` when `root` is neither `object` nor one of its
/// ancestors.
pub fn relative_path<H: ObjectHierarchy + ?Sized>(
    hierarchy: &H,
    root: usize,
    object: usize,
) -> Result<String, SpliceError> {
    let root_name = hierarchy
        .name(root)
        .ok_or(SpliceError::HierarchyNodeNotFound(root))?;
    let object_name = hierarchy
        .name(object)
        .ok_or(SpliceError::HierarchyNodeNotFound(object))?;

    let mut segments = Vec::new();
    let mut current = object;
    while current != root {
        let Some(parent) = hierarchy.parent(current) else {
            return Err(SpliceError::NotAnAncestor {
                root: root_name.to_string(),
                object: object_name.to_string(),
            });
        };
        segments.push(hierarchy.name(current).unwrap_or_default());
        current = parent;
    }
    segments.reverse();
    Ok(segments.join("/"))
}

// =============================================================================
// REWRITERS
// =============================================================================

/// Maps an object path to its new spelling.
pub trait RewritePath {
    fn rewrite_path(&self, path: &str) -> String;
}

impl<F: Fn(&str) -> String> RewritePath for F {
    fn rewrite_path(&self, path: &str) -> String {
        self(path)
    }
}

/// A `(from, to)` prefix rule. An absolute `to` re-roots the path.
///
/// Both sides are stored normalised, the same way matched paths are, so
/// `"A/B/"` and `"./A/B"` name the same prefix as `"A/B"`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathRule {
    pub from: String,
    pub to: String,
}

impl PathRule {
    #[must_use]
    pub fn new(from: impl Into<String>, to: impl Into<String>) -> Self {
        Self {
            from: normalize(&from.into()),
            to: normalize(&to.into()),
        }
    }
}

/// Container prefix plus ordered prefix rules.
///
/// For a path `p` the prefix is joined first; then every rule is tried in
/// registration order against the running result, so rules compose.
#[derive(Debug, Clone, Default)]
pub struct PathRewriter {
    rules: Vec<PathRule>,
    prefix: String,
    root_bindings_apply_to_avatar: bool,
}

impl PathRewriter {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Prefix every path with the location of `container` under `root`.
    pub fn with_container<H: ObjectHierarchy + ?Sized>(
        hierarchy: &H,
        container: usize,
        root: usize,
    ) -> Result<Self, SpliceError> {
        Ok(Self {
            prefix: relative_path(hierarchy, root, container)?,
            ..Self::default()
        })
    }

    #[must_use]
    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = prefix.into();
        self
    }

    #[must_use]
    pub fn rule(mut self, from: impl Into<String>, to: impl Into<String>) -> Self {
        self.add_rule(PathRule::new(from, to));
        self
    }

    pub fn add_rule(&mut self, rule: PathRule) {
        self.rules.push(PathRule::new(rule.from, rule.to));
    }

    /// Leave bindings on the root object (empty path) untouched.
    #[must_use]
    pub fn root_bindings_apply_to_avatar(mut self, exempt: bool) -> Self {
        self.root_bindings_apply_to_avatar = exempt;
        self
    }

    #[must_use]
    pub fn rules(&self) -> &[PathRule] {
        &self.rules
    }

    #[must_use]
    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// The reverse move: rules swapped and applied in reverse order.
    ///
    /// The container prefix is not invertible and is not carried over.
    #[must_use]
    pub fn inverse(&self) -> Self {
        Self {
            rules: self
                .rules
                .iter()
                .rev()
                .map(|rule| PathRule::new(rule.to.clone(), rule.from.clone()))
                .collect(),
            prefix: String::new(),
            root_bindings_apply_to_avatar: self.root_bindings_apply_to_avatar,
        }
    }
}

impl RewritePath for PathRewriter {
    fn rewrite_path(&self, path: &str) -> String {
        if path.is_empty() && self.root_bindings_apply_to_avatar {
            return String::new();
        }
        let mut current = join(&self.prefix, path);
        for rule in &self.rules {
            if let Some(rest) = strip_prefix(&current, &rule.from) {
                current = join(&rule.to, rest);
            }
        }
        current
    }
}

/// Find where `relative_path`, authored against `anchor`, lives under `root`.
///
/// Walks from `anchor` up to `root` and returns the first candidate that
/// resolves to an existing object. If none does, the path under `anchor`
/// itself is returned as a best effort.
pub fn find_nearest_matching_path<H: ObjectHierarchy + ?Sized>(
    hierarchy: &H,
    anchor: usize,
    root: usize,
    relative_path: &str,
) -> Result<String, SpliceError> {
    let rewriter = NearestMatchRewriter::new(hierarchy, anchor, root)?;
    Ok(rewriter.rewrite_path(relative_path))
}

/// Rewrites paths to the nearest ancestor of an anchor under which they resolve.
pub struct NearestMatchRewriter<'h, H: ObjectHierarchy + ?Sized> {
    hierarchy: &'h H,
    root: usize,
    /// Anchor first, root last.
    candidates: Vec<String>,
}

impl<'h, H: ObjectHierarchy + ?Sized> NearestMatchRewriter<'h, H> {
    pub fn new(hierarchy: &'h H, anchor: usize, root: usize) -> Result<Self, SpliceError> {
        let mut candidates = vec![relative_path(hierarchy, root, anchor)?];
        let mut current = anchor;
        while current != root {
            let Some(parent) = hierarchy.parent(current) else {
                break;
            };
            candidates.push(relative_path(hierarchy, root, parent)?);
            current = parent;
        }
        Ok(Self {
            hierarchy,
            root,
            candidates,
        })
    }
}

impl<H: ObjectHierarchy + ?Sized> RewritePath for NearestMatchRewriter<'_, H> {
    fn rewrite_path(&self, path: &str) -> String {
        for prefix in &self.candidates {
            let candidate = join(prefix, path);
            if self.hierarchy.find(self.root, &candidate).is_some() {
                return candidate;
            }
        }
        let fallback = join(self.candidates.first().map_or("", String::as_str), path);
        tracing::debug!(path, fallback = %fallback, "no ancestor resolves path, using anchor");
        fallback
    }
}

// =============================================================================
// APPLYING REWRITES
// =============================================================================

/// Outcome of rewriting one clip or mask.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RewriteReport {
    /// Entries whose path changed.
    pub rewritten: usize,
    /// Original bindings dropped because an earlier binding already took
    /// their rewritten spelling.
    pub collisions: Vec<Binding>,
    /// Mask paths dropped for the same reason.
    pub mask_collisions: Vec<String>,
}

impl RewriteReport {
    #[must_use]
    pub fn has_collisions(&self) -> bool {
        !self.collisions.is_empty() || !self.mask_collisions.is_empty()
    }
}

/// Anything whose entries are addressed by object path.
pub trait PathTarget {
    fn rewrite_paths(&mut self, rewriter: &dyn RewritePath) -> RewriteReport;
}

impl PathTarget for Clip {
    fn rewrite_paths(&mut self, rewriter: &dyn RewritePath) -> RewriteReport {
        rewrite_clip(self, rewriter)
    }
}

impl PathTarget for AvatarMask {
    fn rewrite_paths(&mut self, rewriter: &dyn RewritePath) -> RewriteReport {
        rewrite_mask(self, rewriter)
    }
}

/// Rewrite every numeric and object-reference binding of `clip`.
///
/// When two bindings land on the same spelling the first in key order wins.
pub fn rewrite_clip(clip: &mut Clip, rewriter: &dyn RewritePath) -> RewriteReport {
    let mut report = RewriteReport::default();

    for (binding, curve) in clip.take_float_curves() {
        let target = binding.with_path(rewriter.rewrite_path(&binding.path));
        if target.path != binding.path {
            report.rewritten = report.rewritten.saturating_add(1);
        }
        if clip.float_curve(&target).is_some() {
            report.collisions.push(binding);
        } else {
            clip.set_float_curve(target, curve);
        }
    }
    for (binding, curve) in clip.take_object_curves() {
        let target = binding.with_path(rewriter.rewrite_path(&binding.path));
        if target.path != binding.path {
            report.rewritten = report.rewritten.saturating_add(1);
        }
        if clip.object_curve(&target).is_some() {
            report.collisions.push(binding);
        } else {
            clip.set_object_curve(target, curve);
        }
    }

    if report.has_collisions() {
        tracing::warn!(
            clip = %clip.name,
            dropped = report.collisions.len(),
            "bindings collided after path rewrite"
        );
    }
    report
}

/// Rewrite every mask entry with the same rules as clips.
pub fn rewrite_mask(mask: &mut AvatarMask, rewriter: &dyn RewritePath) -> RewriteReport {
    let mut report = RewriteReport::default();
    let mut seen = BTreeSet::new();
    let entries = std::mem::take(&mut mask.transforms);

    for entry in entries {
        let path = rewriter.rewrite_path(&entry.path);
        if path != entry.path {
            report.rewritten = report.rewritten.saturating_add(1);
        }
        if seen.insert(path.clone()) {
            mask.transforms.push(MaskEntry {
                path,
                active: entry.active,
            });
        } else {
            report.mask_collisions.push(entry.path);
        }
    }

    if report.has_collisions() {
        tracing::warn!(
            mask = %mask.name,
            dropped = report.mask_collisions.len(),
            "mask entries collided after path rewrite"
        );
    }
    report
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ObjectId;
    use crate::model::{FloatCurve, ObjectCurve};

    fn avatar() -> Hierarchy {
        let mut hierarchy = Hierarchy::new("Avatar");
        hierarchy.add_path(Hierarchy::ROOT, "Armature/Hips/Spine").expect("add");
        hierarchy.add_path(Hierarchy::ROOT, "Body").expect("add");
        hierarchy.add_path(Hierarchy::ROOT, "Props/Hat/Brim").expect("add");
        hierarchy
    }

    #[test]
    fn join_normalises_segments() {
        assert_eq!(join("a/b", "c"), "a/b/c");
        assert_eq!(join("a/b", "./c//d"), "a/b/c/d");
        assert_eq!(join("a/b", "../c"), "a/c");
        assert_eq!(join("", ""), "");
        assert_eq!(join("a", "/x/y"), "x/y");
    }

    #[test]
    fn unpoppable_parent_segments_are_kept() {
        assert_eq!(normalize(".."), "..");
        assert_eq!(normalize("../../a"), "../../a");
        assert_eq!(join("a", "../../b"), "../b");
    }

    #[test]
    fn rule_matches_whole_segments_only() {
        let rewriter = PathRewriter::new().rule("A/B", "A/C");
        assert_eq!(rewriter.rewrite_path("A/B"), "A/C");
        assert_eq!(rewriter.rewrite_path("A/B/leaf"), "A/C/leaf");
        assert_eq!(rewriter.rewrite_path("A/Bx/leaf"), "A/Bx/leaf");
    }

    #[test]
    fn rules_compose_in_order() {
        let rewriter = PathRewriter::new().rule("A", "B").rule("B/x", "C");
        assert_eq!(rewriter.rewrite_path("A/x/y"), "C/y");
    }

    #[test]
    fn rule_prefixes_are_normalised() {
        for from in ["A/B/", "./A/B", "A//B", "A/x/../B"] {
            let rewriter = PathRewriter::new().rule(from, "A/C/");
            assert_eq!(rewriter.rewrite_path("A/B/leaf"), "A/C/leaf", "{from}");
            assert_eq!(rewriter.rules()[0].from, "A/B");
        }
        let inverse = PathRewriter::new().rule("Props/Hat", "/Head/Hat").inverse();
        assert_eq!(inverse.rewrite_path("Head/Hat/Brim"), "Props/Hat/Brim");
    }

    #[test]
    fn absolute_target_reroots() {
        let rewriter = PathRewriter::new()
            .with_prefix("Props")
            .rule("Props/Hat", "/Head/Hat");
        assert_eq!(rewriter.rewrite_path("Hat/Brim"), "Head/Hat/Brim");
    }

    #[test]
    fn root_bindings_exempt_only_when_asked() {
        let prefixed = PathRewriter::new().with_prefix("Props");
        assert_eq!(prefixed.rewrite_path(""), "Props");

        let exempt = prefixed.root_bindings_apply_to_avatar(true);
        assert_eq!(exempt.rewrite_path(""), "");
        assert_eq!(exempt.rewrite_path("Hat"), "Props/Hat");
    }

    #[test]
    fn inverse_restores_original_path() {
        let forward = PathRewriter::new().rule("A/B", "A/C");
        let moved = forward.rewrite_path("A/B/leaf");
        assert_eq!(moved, "A/C/leaf");
        assert_eq!(forward.inverse().rewrite_path(&moved), "A/B/leaf");
    }

    #[test]
    fn relative_path_requires_ancestry() {
        let hierarchy = avatar();
        let spine = hierarchy.find(Hierarchy::ROOT, "Armature/Hips/Spine").expect("spine");
        let body = hierarchy.find(Hierarchy::ROOT, "Body").expect("body");

        assert_eq!(hierarchy.path_of(spine).expect("path"), "Armature/Hips/Spine");
        assert_eq!(relative_path(&hierarchy, spine, spine).expect("self"), "");
        assert!(matches!(
            relative_path(&hierarchy, body, spine),
            Err(SpliceError::NotAnAncestor { .. })
        ));
        assert!(matches!(
            relative_path(&hierarchy, 0, 99),
            Err(SpliceError::HierarchyNodeNotFound(99))
        ));
    }

    #[test]
    fn with_container_prefixes_paths() {
        let hierarchy = avatar();
        let hat = hierarchy.find(Hierarchy::ROOT, "Props/Hat").expect("hat");
        let rewriter =
            PathRewriter::with_container(&hierarchy, hat, Hierarchy::ROOT).expect("rewriter");
        assert_eq!(rewriter.rewrite_path("Brim"), "Props/Hat/Brim");
    }

    #[test]
    fn nearest_match_walks_up_to_existing_object() {
        let hierarchy = avatar();
        let brim = hierarchy.find(Hierarchy::ROOT, "Props/Hat/Brim").expect("brim");

        // "Body" only exists under the root.
        let found = find_nearest_matching_path(&hierarchy, brim, Hierarchy::ROOT, "Body")
            .expect("path");
        assert_eq!(found, "Body");

        // Resolves directly below the anchor's parent.
        let found = find_nearest_matching_path(&hierarchy, brim, Hierarchy::ROOT, "Brim")
            .expect("path");
        assert_eq!(found, "Props/Hat/Brim");
    }

    #[test]
    fn nearest_match_falls_back_to_anchor() {
        let hierarchy = avatar();
        let hat = hierarchy.find(Hierarchy::ROOT, "Props/Hat").expect("hat");
        let found = find_nearest_matching_path(&hierarchy, hat, Hierarchy::ROOT, "Missing/Bone")
            .expect("path");
        assert_eq!(found, "Props/Hat/Missing/Bone");
    }

    #[test]
    fn clip_collisions_keep_first_binding() {
        let mut clip = Clip::new("Move");
        let a = Binding::new("A/leaf", "Transform", "x");
        let b = Binding::new("B/leaf", "Transform", "x");
        clip.set_float_curve(a.clone(), FloatCurve::constant(1.0));
        clip.set_float_curve(b.clone(), FloatCurve::constant(2.0));

        let report = rewrite_clip(&mut clip, &PathRewriter::new().rule("B", "A"));

        assert_eq!(report.collisions, vec![b]);
        assert_eq!(clip.curve_count(), 1);
        assert_eq!(
            clip.float_curve(&a).and_then(FloatCurve::first_value),
            Some(1.0)
        );
    }

    #[test]
    fn object_reference_curves_move_with_numeric_curves() {
        let material = ObjectId(7);
        let mut clip = Clip::new("Swap");
        clip.set_float_curve(
            Binding::new("Armature/Hips", "Transform", "m_LocalPosition.y"),
            FloatCurve::constant(0.5),
        );
        clip.set_object_curve(
            Binding::new("Armature/Body", "Renderer", "m_Materials.Array.data[0]"),
            ObjectCurve::constant(Some(material)),
        );

        let rewriter = PathRewriter::new().rule("Armature", "Hat/Armature");
        let report = rewrite_clip(&mut clip, &rewriter);

        assert_eq!(report.rewritten, 2);
        assert!(!report.has_collisions());
        let paths: Vec<_> = clip.bindings().map(|b| b.path.as_str()).collect();
        // Numeric bindings first, then object-reference bindings.
        assert_eq!(paths, vec!["Hat/Armature/Hips", "Hat/Armature/Body"]);

        let moved = Binding::new("Hat/Armature/Body", "Renderer", "m_Materials.Array.data[0]");
        let curve = clip.object_curve(&moved).expect("object curve moved");
        assert_eq!(curve.keys[0].value, Some(material));
        assert!(
            clip.object_curve(&Binding::new(
                "Armature/Body",
                "Renderer",
                "m_Materials.Array.data[0]"
            ))
            .is_none()
        );
    }

    #[test]
    fn masks_and_curves_use_the_same_rules() {
        let rewriter = PathRewriter::new().rule("Hat", "Props/Hat");
        let mut mask = AvatarMask::new("Upper");
        mask.add("Hat", true);
        mask.add("Props/Hat", false);
        mask.add("Body", true);

        let report = mask.rewrite_paths(&rewriter);

        let paths: Vec<_> = mask.transforms.iter().map(|e| e.path.as_str()).collect();
        assert_eq!(paths, vec!["Props/Hat", "Body"]);
        assert_eq!(report.mask_collisions, vec!["Props/Hat".to_string()]);
        assert_eq!(mask.is_active("Props/Hat"), Some(true));
    }
}
