//! Build fingerprints
//!
//! The fingerprint of a request is the SHA-256 of the canonical JSON
//! serialization of its `TransformationOptions`. Field order is fixed by the
//! struct definition, so equal options always hash equally.

use crate::config::TransformationOptions;
use sha2::{Digest, Sha256};

/// Lowercase hex SHA-256 of the options' canonical JSON
pub fn fingerprint(options: &TransformationOptions) -> Result<String, serde_json::Error> {
    let canonical = serde_json::to_vec(options)?;
    Ok(format!("{:x}", Sha256::digest(&canonical)))
}
