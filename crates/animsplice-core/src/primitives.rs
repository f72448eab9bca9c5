//! # Engine Primitives
//!
//! Hardcoded constants shared by the engine components.
//! These are compiled into the binary and are immutable at runtime.

/// Separator between segments of an object path.
pub const PATH_SEPARATOR: char = '/';

/// Path segment that leaves the current segment unchanged.
pub const CURRENT_SEGMENT: &str = ".";

/// Path segment that pops the previous segment.
pub const PARENT_SEGMENT: &str = "..";

/// Magic bytes for the binary document format header.
///
/// - File Header = Magic Bytes ("ASPL") + Version (u8) before payload.
pub const MAGIC_BYTES: &[u8; 4] = b"ASPL";

/// Current serialization format version.
///
/// Increment this when making breaking changes to the serialization format.
pub const FORMAT_VERSION: u8 = 1;

/// Length of the binary header (magic + version).
pub const HEADER_LEN: usize = 5;

/// Maximum allowed payload size for the binary format (256 MB).
///
/// Validated BEFORE attempting deserialization.
pub const MAX_PAYLOAD_SIZE: usize = 256 * 1024 * 1024;

// =============================================================================
// HOST COMPARATOR CODES
// =============================================================================

/// Raw comparator codes used by the host's serialized conditions.
pub mod comparator_codes {
    pub const IF: i32 = 1;
    pub const IF_NOT: i32 = 2;
    pub const GREATER: i32 = 3;
    pub const LESS: i32 = 4;
    pub const EQUALS: i32 = 6;
    pub const NOT_EQUAL: i32 = 7;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn magic_bytes_correct() {
        assert_eq!(MAGIC_BYTES, b"ASPL");
        assert_eq!(HEADER_LEN, MAGIC_BYTES.len() + 1);
    }
}
