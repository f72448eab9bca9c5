//! # Persistence Format
//!
//! Binary serialization for graph documents.
//!
//! Format: Header (5 bytes) + postcard-serialized [`GraphDocument`].
//! - 4 bytes: Magic ("ASPL")
//! - 1 byte: Version
//!
//! Sizes and the header are validated before the payload is decoded.

use super::GraphDocument;
use crate::store::{ObjectStore, SerializableStore};
use crate::{primitives, SpliceError};

// =============================================================================
// FILE HEADER
// =============================================================================

/// The persistence header precedes all document data.
#[derive(Debug, Clone, Copy)]
pub struct PersistenceHeader {
    pub magic: [u8; 4],
    pub version: u8,
}

impl PersistenceHeader {
    /// Create a new header with current format version.
    #[must_use]
    pub fn new() -> Self {
        Self {
            magic: *primitives::MAGIC_BYTES,
            version: primitives::FORMAT_VERSION,
        }
    }

    pub fn validate(&self) -> Result<(), SpliceError> {
        if &self.magic != primitives::MAGIC_BYTES {
            return Err(SpliceError::DeserializationError(
                "Invalid magic bytes".to_string(),
            ));
        }
        if self.version != primitives::FORMAT_VERSION {
            return Err(SpliceError::DeserializationError(format!(
                "Unsupported version: {} (expected {})",
                self.version,
                primitives::FORMAT_VERSION
            )));
        }
        Ok(())
    }

    #[must_use]
    pub fn to_bytes(&self) -> [u8; primitives::HEADER_LEN] {
        let mut bytes = [0u8; primitives::HEADER_LEN];
        bytes[0..4].copy_from_slice(&self.magic);
        bytes[4] = self.version;
        bytes
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, SpliceError> {
        let Some(header) = bytes.get(..primitives::HEADER_LEN) else {
            return Err(SpliceError::DeserializationError(
                "Header too short".to_string(),
            ));
        };
        let mut magic = [0u8; 4];
        magic.copy_from_slice(&header[0..4]);
        Ok(Self {
            magic,
            version: header[4],
        })
    }
}

impl Default for PersistenceHeader {
    fn default() -> Self {
        Self::new()
    }
}

// =============================================================================
// SERIALIZATION FUNCTIONS
// =============================================================================

/// Serialize a document to bytes (header + payload).
pub fn document_to_bytes(document: &GraphDocument) -> Result<Vec<u8>, SpliceError> {
    let payload = postcard::to_stdvec(document)
        .map_err(|e| SpliceError::SerializationError(e.to_string()))?;

    let mut result = Vec::with_capacity(primitives::HEADER_LEN.saturating_add(payload.len()));
    result.extend_from_slice(&PersistenceHeader::new().to_bytes());
    result.extend_from_slice(&payload);
    Ok(result)
}

/// Deserialize a document from bytes.
///
/// Validates, in order, the minimum size, the maximum size and the header
/// before touching the payload.
pub fn document_from_bytes(bytes: &[u8]) -> Result<GraphDocument, SpliceError> {
    if bytes.len() < primitives::HEADER_LEN {
        return Err(SpliceError::DeserializationError(format!(
            "Data too short: minimum {} bytes required",
            primitives::HEADER_LEN
        )));
    }
    if bytes.len() > primitives::MAX_PAYLOAD_SIZE {
        return Err(SpliceError::DeserializationError(format!(
            "Data size {} bytes exceeds maximum allowed {} bytes",
            bytes.len(),
            primitives::MAX_PAYLOAD_SIZE
        )));
    }

    PersistenceHeader::from_bytes(bytes)?.validate()?;

    let payload = &bytes[primitives::HEADER_LEN..];
    postcard::from_bytes(payload).map_err(|e| {
        SpliceError::DeserializationError(format!("Failed to deserialize document: {}", e))
    })
}

// =============================================================================
// CHECKSUMS
// =============================================================================

fn canonical_bytes(store: &ObjectStore) -> Result<Vec<u8>, SpliceError> {
    postcard::to_stdvec(&SerializableStore::from(store))
        .map_err(|e| SpliceError::SerializationError(format!("Canonical encoding: {}", e)))
}

fn checksum_bytes(bytes: &[u8]) -> u64 {
    let mut hash = (bytes.len() as u64).rotate_left(3);
    for byte in bytes {
        hash = hash.rotate_left(7) ^ u64::from(*byte);
    }
    hash
}

/// Deterministic rotate-xor checksum of a store's canonical encoding.
///
/// Two stores with equal objects under equal ids have equal checksums. Not
/// collision resistant; see `canonical_crypto_hash`.
pub fn canonical_checksum(store: &ObjectStore) -> Result<u64, SpliceError> {
    canonical_bytes(store).map(|bytes| checksum_bytes(&bytes))
}

/// BLAKE3 hash of a store's canonical encoding, as 64 hex characters.
///
/// Only available with the `crypto-hash` feature enabled.
#[cfg(feature = "crypto-hash")]
pub fn canonical_crypto_hash(store: &ObjectStore) -> Result<String, SpliceError> {
    let bytes = canonical_bytes(store)?;
    Ok(blake3::hash(&bytes).to_hex().to_string())
}

// =============================================================================
// TESTS
// =============================================================================
