//! Upload item validation and batch encoding
//!
//! Packages (identifier, content-type, payload) tuples into a single
//! encoded bundle ready for distributed storage. The actual erasure
//! coding is delegated to the storage network client; the contract here
//! is that encoding completes before registration may proceed and that
//! an encoding failure is fatal to the whole batch.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use bytes::Bytes;
use tracing::{debug, warn};

use crate::content_type::{ContentType, CONTENT_TYPE_TAG};
use crate::error::{Result, UploadError};
use crate::storage::{FlowFile, StorageNetwork, StoredFileInfo, WriteFlow};

/// One payload submitted for upload; immutable once submitted
#[derive(Debug, Clone)]
pub struct UploadItem {
    /// Identifier, unique within a batch
    pub identifier: String,
    /// Logical kind, carried as a tag on the stored file
    pub content_type: ContentType,
    /// Raw payload bytes
    pub payload: Bytes,
}

impl UploadItem {
    pub fn new(
        identifier: impl Into<String>,
        content_type: ContentType,
        payload: impl Into<Bytes>,
    ) -> Self {
        Self {
            identifier: identifier.into(),
            content_type,
            payload: payload.into(),
        }
    }

    /// Check per-item constraints
    pub fn validate(&self) -> Result<()> {
        if self.identifier.is_empty() {
            return Err(UploadError::InvalidInput("empty item identifier".to_string()));
        }
        if self.payload.is_empty() {
            return Err(UploadError::InvalidInput(format!(
                "empty payload for item {}",
                self.identifier
            )));
        }
        Ok(())
    }
}

/// Drop invalid items (empty identifier, empty payload, duplicate
/// identifier) before orchestration begins, warn-logging each one.
pub fn filter_valid(items: Vec<UploadItem>) -> Vec<UploadItem> {
    let mut seen = HashSet::new();
    items
        .into_iter()
        .filter(|item| {
            if let Err(e) = item.validate() {
                warn!(identifier = %item.identifier, error = %e, "Dropping invalid upload item");
                return false;
            }
            if !seen.insert(item.identifier.clone()) {
                warn!(identifier = %item.identifier, "Dropping duplicate item identifier");
                return false;
            }
            true
        })
        .collect()
}

/// Identifier and kind of one item in an encoded bundle, in batch order
#[derive(Debug, Clone)]
pub struct EncodedItem {
    pub identifier: String,
    pub content_type: ContentType,
}

/// Handle over an encoded batch, scoped to one orchestration run
///
/// Owns the network write flow and tracks its progress so that
/// out-of-order phases fail with `NotReady` instead of corrupting the
/// flow state.
pub struct EncodedBundle {
    flow: Box<dyn WriteFlow>,
    items: Vec<EncodedItem>,
    uploaded: bool,
}

impl std::fmt::Debug for EncodedBundle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EncodedBundle")
            .field("items", &self.items)
            .field("uploaded", &self.uploaded)
            .finish_non_exhaustive()
    }
}

impl EncodedBundle {
    /// Items in submission order
    pub fn items(&self) -> &[EncodedItem] {
        &self.items
    }

    pub fn item_count(&self) -> usize {
        self.items.len()
    }

    /// Whether shard data has been pushed to storage nodes
    pub fn is_uploaded(&self) -> bool {
        self.uploaded
    }

    pub(crate) fn flow_mut(&mut self) -> &mut dyn WriteFlow {
        &mut *self.flow
    }

    pub(crate) fn mark_uploaded(&mut self) {
        self.uploaded = true;
    }

    /// Stored files as reported by the flow after certification
    pub(crate) async fn list_files(&self) -> Result<Vec<StoredFileInfo>> {
        self.flow.list_files().await
    }
}

/// Encodes validated batches into bundles via the storage network
pub struct UploadEncoder {
    network: Arc<dyn StorageNetwork>,
}

impl UploadEncoder {
    pub fn new(network: Arc<dyn StorageNetwork>) -> Self {
        Self { network }
    }

    /// Encode a batch into a bundle
    ///
    /// Rejects empty batches and invalid items with `InvalidInput`.
    /// Order-preserving: the bundle's item list matches the input order.
    pub async fn encode(&self, items: &[UploadItem]) -> Result<EncodedBundle> {
        if items.is_empty() {
            return Err(UploadError::InvalidInput("empty upload batch".to_string()));
        }
        for item in items {
            item.validate()?;
        }

        let files = items
            .iter()
            .map(|item| {
                let mut tags = HashMap::new();
                tags.insert(CONTENT_TYPE_TAG.to_string(), item.content_type.tag().to_string());
                FlowFile {
                    identifier: item.identifier.clone(),
                    tags,
                    contents: item.payload.clone(),
                }
            })
            .collect();

        let mut flow = self.network.start_write_flow(files).await?;
        flow.encode().await?;

        debug!(items = items.len(), "Batch encoded");

        Ok(EncodedBundle {
            flow,
            items: items
                .iter()
                .map(|item| EncodedItem {
                    identifier: item.identifier.clone(),
                    content_type: item.content_type,
                })
                .collect(),
            uploaded: false,
        })
    }
}
