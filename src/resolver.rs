//! Bundle result resolution
//!
//! Given a bundle id, fetches the bundle, enumerates its constituent
//! files and resolves each file's (content-type tag, identifier, bytes)
//! triple concurrently. Per-file resolution may complete out of order;
//! the aggregate is joined before being handed back so a caller never
//! observes a partially populated result set. A missing or malformed
//! content-type tag degrades to an absent classification on that one
//! result instead of aborting the batch.

use std::sync::Arc;

use bytes::Bytes;
use futures::future;
use tracing::{debug, info, warn};

use crate::config::NetworkConfig;
use crate::content_type::{ContentType, CONTENT_TYPE_TAG};
use crate::error::{Result, UploadError};
use crate::storage::{StorageNetwork, StoredFile};

/// One stored file, reconstructed after a completed upload
#[derive(Debug, Clone)]
pub struct UploadResult {
    /// Bundle the file belongs to
    pub bundle_id: String,
    /// Classification from the content-type tag, absent if the tag was
    /// missing or unknown
    pub content_type: Option<ContentType>,
    /// File identifier, if the bundle recorded one
    pub identifier: Option<String>,
    /// Reconstructed payload bytes
    pub bytes: Bytes,
}

/// Resolves a stored bundle back into typed upload results
pub struct ResultResolver {
    network: Arc<dyn StorageNetwork>,
    config: NetworkConfig,
}

impl ResultResolver {
    pub fn new(network: Arc<dyn StorageNetwork>, config: NetworkConfig) -> Self {
        Self { network, config }
    }

    /// Fetch a bundle and resolve all of its files
    ///
    /// Fans out one resolution per file and joins them all; the result
    /// vector is only returned once every file has resolved.
    pub async fn resolve(&self, bundle_id: &str) -> Result<Vec<UploadResult>> {
        let bundle = tokio::time::timeout(self.config.request_timeout, self.network.get_bundle(bundle_id))
            .await
            .map_err(|_| UploadError::NetworkError("bundle fetch timed out".to_string()))??;

        let files = tokio::time::timeout(self.config.request_timeout, bundle.files())
            .await
            .map_err(|_| UploadError::NetworkError("bundle file listing timed out".to_string()))??;

        debug!(bundle_id = %bundle_id, files = files.len(), "Resolving bundle files");

        let resolutions = files
            .iter()
            .map(|file| self.resolve_file(bundle_id, file.as_ref()));
        let results: Vec<UploadResult> = future::join_all(resolutions)
            .await
            .into_iter()
            .collect::<Result<Vec<_>>>()?;

        info!(bundle_id = %bundle_id, results = results.len(), "Bundle resolved");
        Ok(results)
    }

    async fn resolve_file(&self, bundle_id: &str, file: &dyn StoredFile) -> Result<UploadResult> {
        let resolution = async {
            let content_type = match file.tags().await {
                Ok(tags) => {
                    let tag = tags.get(CONTENT_TYPE_TAG);
                    let content_type = tag.and_then(|t| ContentType::from_tag(t));
                    if content_type.is_none() {
                        warn!(
                            bundle_id = %bundle_id,
                            tag = ?tag,
                            "File has missing or unknown content-type tag"
                        );
                    }
                    content_type
                }
                Err(e) => {
                    warn!(bundle_id = %bundle_id, error = %e, "Tag resolution failed for file");
                    None
                }
            };

            let identifier = file.identifier().await?;
            let bytes = file.bytes().await?;

            Ok(UploadResult {
                bundle_id: bundle_id.to_string(),
                content_type,
                identifier,
                bytes,
            })
        };

        tokio::time::timeout(self.config.request_timeout, resolution)
            .await
            .map_err(|_| UploadError::NetworkError("file resolution timed out".to_string()))?
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;
    use crate::testing::{InMemoryStorageNetwork, SeedFile};

    fn tags_for(value: &str) -> HashMap<String, String> {
        let mut tags = HashMap::new();
        tags.insert(CONTENT_TYPE_TAG.to_string(), value.to_string());
        tags
    }

    #[tokio::test]
    async fn test_resolve_missing_bundle_is_an_error() {
        let network = Arc::new(InMemoryStorageNetwork::new());
        let resolver = ResultResolver::new(network, NetworkConfig::default());

        let err = resolver.resolve("no-such-bundle").await.unwrap_err();
        assert!(matches!(err, UploadError::NetworkError(_)));
    }

    #[tokio::test]
    async fn test_resolve_tolerates_bad_content_type_tags() {
        let network = Arc::new(InMemoryStorageNetwork::new());
        network.seed_bundle(
            "bundle-1",
            vec![
                SeedFile {
                    identifier: Some("a.txt".to_string()),
                    tags: tags_for("text/plain"),
                    bytes: Bytes::from_static(b"hello"),
                },
                SeedFile {
                    identifier: Some("b.bin".to_string()),
                    tags: tags_for("application/octet-stream"),
                    bytes: Bytes::from_static(b"\x00\x01"),
                },
                SeedFile {
                    identifier: None,
                    tags: HashMap::new(),
                    bytes: Bytes::from_static(b"untagged"),
                },
            ],
        );

        let resolver = ResultResolver::new(network, NetworkConfig::default());
        let results = resolver.resolve("bundle-1").await.unwrap();

        assert_eq!(results.len(), 3);
        assert_eq!(results[0].content_type, Some(ContentType::Text));
        assert_eq!(results[1].content_type, None);
        assert_eq!(results[2].content_type, None);
        assert_eq!(results[2].identifier, None);
        assert_eq!(&results[2].bytes[..], b"untagged");
    }
}
