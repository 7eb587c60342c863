// SPDX-License-Identifier: MIT OR Apache-2.0
#![deny(unsafe_code)]

//! Manifest validation utilities.

use std::fmt;

use crate::{Manifest, manifest_hash};

/// An individual validation failure found in a [`Manifest`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// The stored hash does not match the recomputed hash.
    InvalidHash {
        /// The recomputed hash value.
        expected: String,
        /// The stored hash value.
        actual: String,
    },
    /// A required field is missing or otherwise invalid.
    Invalid {
        /// Description of the problem.
        reason: String,
    },
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidHash { expected, actual } => {
                write!(f, "hash mismatch: expected {expected}, got {actual}")
            }
            Self::Invalid { reason } => write!(f, "invalid manifest: {reason}"),
        }
    }
}

impl std::error::Error for ValidationError {}

/// Validate a [`Manifest`] for internal consistency.
///
/// Returns `Ok(())` when the manifest passes every check, or `Err(errors)`
/// with every problem found (errors accumulate rather than short-circuit).
///
/// # Errors
///
/// Returns a `Vec<ValidationError>` listing every problem found in the manifest.
pub fn validate_manifest(manifest: &Manifest) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if manifest.created_at > chrono::Utc::now() {
        errors.push(ValidationError::Invalid {
            reason: "created_at is in the future".into(),
        });
    }

    if let Some(ref stored) = manifest.manifest_sha256 {
        match manifest_hash(manifest) {
            Ok(recomputed) => {
                if *stored != recomputed {
                    errors.push(ValidationError::InvalidHash {
                        expected: recomputed,
                        actual: stored.clone(),
                    });
                }
            }
            Err(e) => {
                errors.push(ValidationError::Invalid {
                    reason: format!("failed to recompute hash: {e}"),
                });
            }
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
