//! # Formats
//!
//! Document shape shared by every on-disk encoding, plus serde helpers.
//! File I/O operations are in the app layer.

pub mod persistence;

use crate::store::{ObjectStore, SerializableStore};
use crate::{ObjectId, SpliceError};
use serde::{Deserialize, Serialize};

/// A store plus the controller it was saved for.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraphDocument {
    pub root: ObjectId,
    pub store: SerializableStore,
}

impl GraphDocument {
    #[must_use]
    pub fn new(store: &ObjectStore, root: ObjectId) -> Self {
        Self {
            root,
            store: SerializableStore::from(store),
        }
    }

    /// Like [`GraphDocument::new`], keeping only objects reachable from `root`.
    #[must_use]
    pub fn reachable(store: &ObjectStore, root: ObjectId) -> Self {
        let keep = store.reachable_from(root);
        let mut document = Self::new(store, root);
        document.store.objects.retain(|(id, _)| keep.contains(id));
        document
    }

    /// Rebuild the store. The root must be a controller.
    pub fn into_parts(self) -> Result<(ObjectStore, ObjectId), SpliceError> {
        let store = ObjectStore::from(self.store);
        store.controller(self.root)?;
        Ok((store, self.root))
    }
}

/// Serialize a `BTreeMap` as a sequence of `(key, value)` pairs.
///
/// Keeps struct-keyed maps representable in formats whose map keys must be
/// strings (JSON). Use with `#[serde(with = "crate::formats::entries")]`.
pub mod entries {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::collections::BTreeMap;

    pub fn serialize<K, V, S>(map: &BTreeMap<K, V>, serializer: S) -> Result<S::Ok, S::Error>
    where
        K: Serialize,
        V: Serialize,
        S: Serializer,
    {
        serializer.collect_seq(map.iter())
    }

    pub fn deserialize<'de, K, V, D>(deserializer: D) -> Result<BTreeMap<K, V>, D::Error>
    where
        K: Deserialize<'de> + Ord,
        V: Deserialize<'de>,
        D: Deserializer<'de>,
    {
        Vec::<(K, V)>::deserialize(deserializer).map(|pairs| pairs.into_iter().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{State, StateGraph};

    #[test]
    fn document_requires_controller_root() {
        let mut store = ObjectStore::new();
        let state = store.insert(State::new("Idle"));
        let graph = store.insert(StateGraph::new("Fx"));

        let (restored, root) = GraphDocument::new(&store, graph)
            .into_parts()
            .expect("controller root");
        assert_eq!(root, graph);
        assert_eq!(restored.len(), 2);

        let err = GraphDocument::new(&store, state).into_parts();
        assert!(matches!(err, Err(SpliceError::TypeMismatch { .. })));
    }

    #[test]
    fn reachable_document_drops_unrelated_objects() {
        let mut store = ObjectStore::new();
        store.insert(State::new("Stray"));
        let graph = store.insert(StateGraph::new("Fx"));

        let document = GraphDocument::reachable(&store, graph);
        assert_eq!(document.store.objects.len(), 1);
        assert_eq!(document.store.next_id, store.next_id());
    }
}
