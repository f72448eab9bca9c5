//! # CLI Command Implementations
//!
//! This module contains the actual implementations of CLI commands.

use crate::config::MergeConfig;
use crate::documents::{load_document, save_document};
use animsplice_core::{
    GraphDocument, GraphMerger, MergeReport, ObjectId, ObjectKind, ObjectStore, SpliceError,
    canonical_checksum, canonical_crypto_hash,
};
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::Path;

// =============================================================================
// MERGE COMMAND
// =============================================================================

/// Merge `source` into `dest` under `config`.
///
/// The source objects are imported into the destination's object space; the
/// returned document keeps only what the destination graph reaches.
pub fn merge_documents(
    source: GraphDocument,
    dest: GraphDocument,
    config: &MergeConfig,
) -> Result<(GraphDocument, MergeReport), SpliceError> {
    let (source_store, source_root) = source.into_parts()?;
    let (mut store, dest_root) = dest.into_parts()?;

    let mapping = store.import(&source_store);
    let source_root = mapping
        .get(&source_root)
        .copied()
        .ok_or(SpliceError::ObjectNotFound(source_root))?;

    let mut rewriter = config.rewriter();
    let report = GraphMerger::new(&mut store).merge(source_root, dest_root, &mut rewriter)?;

    Ok((GraphDocument::reachable(&store, dest_root), report))
}

/// Merge two documents on disk.
pub fn cmd_merge(
    source: &Path,
    dest: &Path,
    config: Option<&Path>,
    output: &Path,
    json_mode: bool,
    quiet: bool,
) -> Result<(), SpliceError> {
    let config = match config {
        Some(path) => MergeConfig::load(path)?,
        None => MergeConfig::default(),
    };
    let source_document = load_document(source)?;
    let dest_document = load_document(dest)?;

    let (merged, report) = merge_documents(source_document, dest_document, &config)?;
    for dropped in &report.dropped_transitions {
        tracing::warn!(
            transition = %dropped.transition,
            destination = %dropped.destination,
            "transition dropped: destination not found"
        );
    }
    let written = save_document(&merged, output)?;

    if json_mode {
        let output = serde_json::json!({
            "output": output.to_string_lossy(),
            "bytes": written,
            "report": report,
        });
        println!(
            "{}",
            serde_json::to_string_pretty(&output).unwrap_or_default()
        );
        return Ok(());
    }

    if !quiet {
        println!("Merged {:?} into {:?}", source, dest);
        println!();
        println!("Layers added:        {}", report.layers_added.join(", "));
        println!("Parameters added:    {}", report.parameters_added.len());
        println!("Parameters reused:   {}", report.parameters_reused.len());
        println!("Objects created:     {}", report.created.len());
        println!("Dropped transitions: {}", report.dropped_transitions.len());
        println!("Dropped behaviours:  {}", report.dropped_behaviours.len());
        println!();
    }
    println!("Wrote {} bytes to {:?}", written, output);

    Ok(())
}

// =============================================================================
// INSPECT COMMAND
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LayerSummary {
    pub name: String,
    pub machines: usize,
    pub states: usize,
    pub transitions: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GraphSummary {
    pub name: String,
    pub parameters: Vec<String>,
    pub layers: Vec<LayerSummary>,
    /// Stored objects per kind.
    pub objects: BTreeMap<String, usize>,
}

fn count_kind(store: &ObjectStore, root: ObjectId, kind: ObjectKind) -> usize {
    store
        .reachable_from(root)
        .into_iter()
        .filter(|id| store.kind_of(*id).ok() == Some(kind))
        .count()
}

pub fn summarize(document: GraphDocument) -> Result<GraphSummary, SpliceError> {
    let (store, root) = document.into_parts()?;
    let graph = store.controller(root)?;

    let layers = graph
        .layers
        .iter()
        .map(|layer| LayerSummary {
            name: layer.name.clone(),
            machines: count_kind(&store, layer.state_machine, ObjectKind::StateMachine),
            states: count_kind(&store, layer.state_machine, ObjectKind::State),
            transitions: count_kind(&store, layer.state_machine, ObjectKind::Transition),
        })
        .collect();

    let mut objects: BTreeMap<String, usize> = BTreeMap::new();
    for (_, object) in store.iter() {
        let count = objects.entry(object.kind().to_string()).or_default();
        *count = count.saturating_add(1);
    }

    Ok(GraphSummary {
        name: graph.name.clone(),
        parameters: graph.parameters.iter().map(|p| p.name.clone()).collect(),
        layers,
        objects,
    })
}

/// Show a summary of a document.
pub fn cmd_inspect(input: &Path, json_mode: bool) -> Result<(), SpliceError> {
    let summary = summarize(load_document(input)?)?;

    if json_mode {
        println!(
            "{}",
            serde_json::to_string_pretty(&summary).unwrap_or_default()
        );
        return Ok(());
    }

    println!("Graph: {}", summary.name);
    println!("==================");
    println!("Parameters: {}", summary.parameters.join(", "));
    println!();
    for layer in &summary.layers {
        println!(
            "Layer {:<24} machines: {:>4}  states: {:>5}  transitions: {:>5}",
            layer.name, layer.machines, layer.states, layer.transitions
        );
    }
    println!();
    for (kind, count) in &summary.objects {
        println!("{:<14} {}", kind, count);
    }

    Ok(())
}

// =============================================================================
// HASH COMMAND
// =============================================================================

/// Compute checksums of a document's store.
pub fn cmd_hash(input: &Path, json_mode: bool) -> Result<(), SpliceError> {
    let (store, root) = load_document(input)?.into_parts()?;
    let checksum = canonical_checksum(&store)?;
    let hash = canonical_crypto_hash(&store)?;

    if json_mode {
        let output = serde_json::json!({
            "root": root.0,
            "objects": store.len(),
            "checksum": checksum,
            "blake3": hash,
        });
        println!(
            "{}",
            serde_json::to_string_pretty(&output).unwrap_or_default()
        );
        return Ok(());
    }

    println!("Objects:  {}", store.len());
    println!("Checksum: {}", checksum);
    println!("BLAKE3:   {}", hash);

    Ok(())
}
