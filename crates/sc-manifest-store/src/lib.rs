// SPDX-License-Identifier: MIT OR Apache-2.0
#![deny(unsafe_code)]
#![warn(missing_docs)]
//! Persistent storage and querying for [`Manifest`] records.
//!
//! A `ManifestStore` is the durable counterpart of the Python original's
//! `Convoy.create_record` — one manifest file per stamp, named by
//! [`ManifestId`], written as pretty JSON and hash-verified on read.

use sc_core::{Manifest, ManifestId, manifest_hash};
use std::path::PathBuf;
use tracing::{debug, instrument};

/// Errors raised while persisting or retrieving manifests.
#[derive(Debug, thiserror::Error)]
pub enum ManifestStoreError {
    /// The requested manifest does not exist in the store.
    #[error("manifest not found: {0}")]
    NotFound(ManifestId),

    /// An I/O operation against the store's root directory failed.
    #[error("manifest store I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A manifest file on disk could not be parsed as JSON.
    #[error("failed to deserialize manifest: {0}")]
    Json(#[from] serde_json::Error),
}

/// Outcome of verifying every manifest in the store.
#[derive(Debug, Clone)]
pub struct ChainVerification {
    /// Number of manifests with a valid hash.
    pub valid_count: usize,
    /// Identifiers of manifests whose stored hash did not match.
    pub invalid_hashes: Vec<ManifestId>,
    /// `true` when every stored manifest hash is valid.
    pub is_valid: bool,
}

/// File-backed, append-mostly store for [`Manifest`] records.
#[derive(Debug, Clone)]
pub struct ManifestStore {
    root: PathBuf,
}

impl ManifestStore {
    /// Create a store rooted at the given directory. The directory is not
    /// created until the first write.
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Persist a manifest, computing its hash first if it is not already set.
    ///
    /// # Errors
    ///
    /// Returns [`ManifestStoreError::Io`] if the directory cannot be created
    /// or the file cannot be written.
    #[instrument(skip(self, manifest), fields(manifest_id = %manifest.id))]
    pub async fn save(&self, manifest: &Manifest) -> Result<PathBuf, ManifestStoreError> {
        let mut manifest = manifest.clone();
        if manifest.manifest_sha256.is_none() {
            manifest = manifest.with_hash().map_err(|e| {
                ManifestStoreError::Json(serde_json::Error::io(std::io::Error::other(
                    e.to_string(),
                )))
            })?;
        }
        let path = self.manifest_path(manifest.id);
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let json = serde_json::to_string_pretty(&manifest)?;
        tokio::fs::write(&path, json).await?;
        debug!(path = %path.display(), "manifest persisted");
        Ok(path)
    }

    /// Load a manifest by id.
    ///
    /// # Errors
    ///
    /// Returns [`ManifestStoreError::NotFound`] if the file is absent, or
    /// [`ManifestStoreError::Json`] if it cannot be parsed.
    pub async fn load(&self, id: ManifestId) -> Result<Manifest, ManifestStoreError> {
        let path = self.manifest_path(id);
        let json = tokio::fs::read_to_string(&path)
            .await
            .map_err(|e| match e.kind() {
                std::io::ErrorKind::NotFound => ManifestStoreError::NotFound(id),
                _ => ManifestStoreError::Io(e),
            })?;
        Ok(serde_json::from_str(&json)?)
    }

    /// List every manifest id currently in the store.
    ///
    /// # Errors
    ///
    /// Returns [`ManifestStoreError::Io`] if the store directory exists but
    /// cannot be read.
    pub async fn list(&self) -> Result<Vec<ManifestId>, ManifestStoreError> {
        let mut entries = match tokio::fs::read_dir(&self.root).await {
            Ok(d) => d,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(ManifestStoreError::Io(e)),
        };

        let mut ids = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            if let Some(stem) = path.file_stem().and_then(|s| s.to_str())
                && let Ok(uuid) = uuid::Uuid::parse_str(stem)
            {
                ids.push(ManifestId::from(uuid));
            }
        }
        ids.sort();
        Ok(ids)
    }

    /// Verify a single manifest's stored hash against its recomputed hash.
    ///
    /// # Errors
    ///
    /// Returns an error if the manifest cannot be loaded.
    pub async fn verify(&self, id: ManifestId) -> Result<bool, ManifestStoreError> {
        let manifest = self.load(id).await?;
        let computed = manifest_hash(&manifest)?;
        Ok(manifest.manifest_sha256.as_deref() == Some(&computed))
    }

    /// Verify every manifest currently stored.
    ///
    /// # Errors
    ///
    /// Returns an error if the store directory cannot be read or a manifest
    /// cannot be loaded.
    pub async fn verify_all(&self) -> Result<ChainVerification, ManifestStoreError> {
        let ids = self.list().await?;
        let mut valid_count = 0;
        let mut invalid_hashes = Vec::new();

        for id in ids {
            if self.verify(id).await? {
                valid_count += 1;
            } else {
                invalid_hashes.push(id);
            }
        }

        Ok(ChainVerification {
            valid_count,
            is_valid: invalid_hashes.is_empty(),
            invalid_hashes,
        })
    }

    fn manifest_path(&self, id: ManifestId) -> PathBuf {
        self.root.join(format!("{id}.json"))
    }
}
