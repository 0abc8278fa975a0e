//! Shard upload to storage nodes
//!
//! Pushes an encoded bundle's shard data to the network, tagged with
//! the register transaction digest as proof that on-chain storage has
//! been reserved and paid for. This is the step most exposed to partial
//! failure: a successful registration with a failed upload leaves an
//! orphaned on-chain reservation. No automatic retry happens here; the
//! error is surfaced and the caller decides.

use tracing::{info, warn};

use crate::config::NetworkConfig;
use crate::encoder::EncodedBundle;
use crate::error::{Result, UploadError};

/// Pushes encoded shard data to storage nodes
pub struct StorageUploader {
    config: NetworkConfig,
}

impl StorageUploader {
    pub fn new(config: NetworkConfig) -> Self {
        Self { config }
    }

    /// Upload the bundle's shards, authorized by the register digest
    ///
    /// Fails with `UploadRejected` when a node refuses (e.g. the digest
    /// is not yet visible on-chain) or `NetworkError` on transient
    /// failures and timeout.
    pub async fn upload(&self, bundle: &mut EncodedBundle, register_digest: &str) -> Result<()> {
        let items = bundle.item_count();

        let result = tokio::time::timeout(
            self.config.request_timeout,
            bundle.flow_mut().upload(register_digest),
        )
        .await
        .map_err(|_| UploadError::NetworkError("shard upload timed out".to_string()))?;

        match result {
            Ok(()) => {
                bundle.mark_uploaded();
                info!(register_digest = %register_digest, items, "Shard data uploaded");
                Ok(())
            }
            Err(e) => {
                warn!(register_digest = %register_digest, error = %e, "Shard upload failed");
                Err(e)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::content_type::ContentType;
    use crate::encoder::{UploadEncoder, UploadItem};
    use crate::testing::InMemoryStorageNetwork;

    async fn encoded_bundle(network: Arc<InMemoryStorageNetwork>) -> EncodedBundle {
        let encoder = UploadEncoder::new(network);
        encoder
            .encode(&[UploadItem::new("a.txt", ContentType::Text, "hello".as_bytes())])
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_upload_marks_bundle() {
        let network = Arc::new(InMemoryStorageNetwork::new());
        let mut bundle = encoded_bundle(Arc::clone(&network)).await;

        let uploader = StorageUploader::new(NetworkConfig::default());
        uploader.upload(&mut bundle, "digest-1").await.unwrap();
        assert!(bundle.is_uploaded());
    }

    #[tokio::test]
    async fn test_upload_failure_leaves_bundle_unmarked() {
        let network = Arc::new(InMemoryStorageNetwork::new());
        network.fail_uploads("node refused digest");
        let mut bundle = encoded_bundle(Arc::clone(&network)).await;

        let uploader = StorageUploader::new(NetworkConfig::default());
        let err = uploader.upload(&mut bundle, "digest-1").await.unwrap_err();
        assert!(matches!(err, UploadError::UploadRejected(_)));
        assert!(!bundle.is_uploaded());
    }
}
