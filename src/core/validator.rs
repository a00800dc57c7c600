//! Structural sanity check for key blobs returned by the API.

use crate::constants::{KEYS_END_MARKER, KEYS_START_MARKER};

/// True when `blob` carries both ServerAuth markers.
///
/// This does not parse authorized_keys syntax; it only catches error pages,
/// empty bodies, and truncated transfers before they reach disk.
pub fn validate(blob: &str) -> bool {
    blob.contains(KEYS_START_MARKER) && blob.contains(KEYS_END_MARKER)
}
