//! # Graph Documents on Disk
//!
//! Documents ending in `.json` are read and written as JSON; anything else
//! uses the binary `ASPL` format.

use animsplice_core::{GraphDocument, SpliceError, document_from_bytes, document_to_bytes};
use std::path::{Path, PathBuf};

/// Maximum document size accepted from disk (256 MB).
const MAX_DOCUMENT_FILE_SIZE: u64 = 256 * 1024 * 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentFormat {
    Json,
    Binary,
}

impl DocumentFormat {
    #[must_use]
    pub fn for_path(path: &Path) -> Self {
        match path.extension().and_then(|ext| ext.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("json") => Self::Json,
            _ => Self::Binary,
        }
    }
}

/// Canonicalize an input path and require a regular file.
fn validate_file_path(path: &Path) -> Result<PathBuf, SpliceError> {
    let canonical = path.canonicalize().map_err(|e| {
        SpliceError::IoError(format!("Invalid file path '{}': {}", path.display(), e))
    })?;
    if !canonical.is_file() {
        return Err(SpliceError::IoError(format!(
            "Path '{}' is not a regular file",
            path.display()
        )));
    }
    Ok(canonical)
}

fn validate_file_size(path: &Path, max_size: u64) -> Result<(), SpliceError> {
    let metadata = std::fs::metadata(path)
        .map_err(|e| SpliceError::IoError(format!("Cannot read file metadata: {}", e)))?;
    if metadata.len() > max_size {
        return Err(SpliceError::DeserializationError(format!(
            "File size {} bytes exceeds maximum allowed {} bytes",
            metadata.len(),
            max_size
        )));
    }
    Ok(())
}

pub fn decode_document(data: &[u8], format: DocumentFormat) -> Result<GraphDocument, SpliceError> {
    match format {
        DocumentFormat::Json => serde_json::from_slice(data).map_err(|e| {
            SpliceError::DeserializationError(format!("Invalid JSON document: {}", e))
        }),
        DocumentFormat::Binary => document_from_bytes(data),
    }
}

pub fn encode_document(
    document: &GraphDocument,
    format: DocumentFormat,
) -> Result<Vec<u8>, SpliceError> {
    match format {
        DocumentFormat::Json => serde_json::to_vec_pretty(document)
            .map_err(|e| SpliceError::SerializationError(e.to_string())),
        DocumentFormat::Binary => document_to_bytes(document),
    }
}

pub fn load_document(path: &Path) -> Result<GraphDocument, SpliceError> {
    let validated = validate_file_path(path)?;
    validate_file_size(&validated, MAX_DOCUMENT_FILE_SIZE)?;
    let data = std::fs::read(&validated)
        .map_err(|e| SpliceError::IoError(format!("Read file: {}", e)))?;
    tracing::debug!(path = %validated.display(), bytes = data.len(), "document read");
    decode_document(&data, DocumentFormat::for_path(path))
}

/// Write `document` and return the number of bytes written.
pub fn save_document(document: &GraphDocument, path: &Path) -> Result<usize, SpliceError> {
    let data = encode_document(document, DocumentFormat::for_path(path))?;
    std::fs::write(path, &data)
        .map_err(|e| SpliceError::IoError(format!("Write file: {}", e)))?;
    Ok(data.len())
}
