//! Publisher-funded upload fallback
//!
//! A stateless alternative to the user-paid protocol: the publisher
//! service fronts the storage payment, so a single HTTP PUT stores the
//! payload without any wallet interaction. Used by callers without
//! storage tokens, and by the `wharf` CLI.

use bytes::Bytes;
use serde::Deserialize;
use tracing::{debug, info};

use crate::config::NetworkConfig;
use crate::content_type::ContentType;
use crate::error::{Result, UploadError};
use crate::ledger::Address;
use crate::resolver::UploadResult;

/// Identifier recorded on publisher-funded uploads
const PUBLISHER_UPLOAD_IDENTIFIER: &str = "user-upload.txt";

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PublisherResponse {
    newly_created: Option<NewlyCreated>,
    already_certified: Option<AlreadyCertified>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct NewlyCreated {
    blob_object: BlobObject,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct BlobObject {
    blob_id: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AlreadyCertified {
    blob_id: String,
}

/// Extract the blob id from a publisher response body
fn parse_publisher_response(body: &[u8]) -> Result<String> {
    let response: PublisherResponse = serde_json::from_slice(body)
        .map_err(|e| UploadError::UnexpectedResponseFormat(e.to_string()))?;

    if let Some(created) = response.newly_created {
        Ok(created.blob_object.blob_id)
    } else if let Some(certified) = response.already_certified {
        Ok(certified.blob_id)
    } else {
        Err(UploadError::UnexpectedResponseFormat(
            "response carries neither newlyCreated nor alreadyCertified".to_string(),
        ))
    }
}

/// HTTP client for the publisher's blob endpoint
pub struct PublisherClient {
    http: reqwest::Client,
    config: NetworkConfig,
}

impl PublisherClient {
    pub fn new(config: NetworkConfig) -> Self {
        let http = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()
            .expect("Failed to create HTTP client");

        Self { http, config }
    }

    /// Store a payload via the publisher
    ///
    /// `PUT {publisher_url}/v1/blobs?epochs=N&send_object_to=ADDR` with
    /// the raw payload as body. A non-200 status is fatal and carries
    /// the response body as detail.
    pub async fn upload_blob(
        &self,
        payload: Bytes,
        epochs: u32,
        send_object_to: &Address,
    ) -> Result<UploadResult> {
        if payload.is_empty() {
            return Err(UploadError::InvalidInput("empty payload".to_string()));
        }

        let url = format!(
            "{}/v1/blobs?epochs={}&send_object_to={}",
            self.config.publisher_url.trim_end_matches('/'),
            epochs,
            send_object_to
        );

        debug!(url = %url, size = payload.len(), "Publisher-funded upload");

        let response = self
            .http
            .put(&url)
            .body(payload)
            .send()
            .await
            .map_err(|e| UploadError::NetworkError(e.to_string()))?;

        let status = response.status();
        let body = response
            .bytes()
            .await
            .map_err(|e| UploadError::NetworkError(e.to_string()))?;

        if status != reqwest::StatusCode::OK {
            return Err(UploadError::UploadRejected(format!(
                "upload failed with status {}: {}",
                status.as_u16(),
                String::from_utf8_lossy(&body)
            )));
        }

        let blob_id = parse_publisher_response(&body)?;
        info!(blob_id = %blob_id, "Publisher stored blob");

        Ok(UploadResult {
            bundle_id: blob_id,
            content_type: Some(ContentType::Text),
            identifier: Some(PUBLISHER_UPLOAD_IDENTIFIER.to_string()),
            bytes: Bytes::new(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_newly_created() {
        let body = br#"{"newlyCreated":{"blobObject":{"blobId":"blob-123","size":5}}}"#;
        assert_eq!(parse_publisher_response(body).unwrap(), "blob-123");
    }

    #[test]
    fn test_parse_already_certified() {
        let body = br#"{"alreadyCertified":{"blobId":"blob-456","endEpoch":9}}"#;
        assert_eq!(parse_publisher_response(body).unwrap(), "blob-456");
    }

    #[test]
    fn test_parse_unknown_shape() {
        let body = br#"{"somethingElse":true}"#;
        assert!(matches!(
            parse_publisher_response(body),
            Err(UploadError::UnexpectedResponseFormat(_))
        ));

        assert!(matches!(
            parse_publisher_response(b"not json"),
            Err(UploadError::UnexpectedResponseFormat(_))
        ));
    }
}
