//! Frame footer checksum.
//!
//! CRC-32 (IEEE) over the payload bytes only; header and footer are never
//! part of the checksummed region.

use super::wire_format::FOOTER_SIZE;

/// Compute the footer checksum of a payload.
#[inline]
pub fn compute_checksum(payload: &[u8]) -> u32 {
    crc32fast::hash(payload)
}

/// Check a 4-byte footer against a payload.
///
/// Returns `false` for a footer of the wrong size.
pub fn verify_footer(payload: &[u8], footer: &[u8]) -> bool {
    if footer.len() != FOOTER_SIZE {
        return false;
    }
    let expected = u32::from_ne_bytes([footer[0], footer[1], footer[2], footer[3]]);
    compute_checksum(payload) == expected
}
