//! The identifier hash: a stable 64-bit id derived from a fingerprint.

use md5::{Digest, Md5};

/// Computes the 16-character uppercase hex identifier for a fingerprint.
///
/// MD5 the fingerprint's UTF-8 bytes, take the last 8 digest bytes as a
/// big-endian `u64`, render as zero-padded uppercase hex. This is a stable
/// wire contract: downstream telemetry aggregation keys on this format, so
/// the algorithm must never change.
pub fn id(fingerprint: &[u8]) -> String {
    let digest = Md5::digest(fingerprint);
    let mut high = [0u8; 8];
    high.copy_from_slice(&digest[8..16]);
    let value = u64::from_be_bytes(high);
    format!("{value:016X}")
}
